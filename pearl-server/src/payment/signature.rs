//! HMAC-SHA256 signing for gateway requests and webhook verification
//!
//! The provider signs the `data` object of every webhook with a shared
//! checksum key over the canonical `key=value&key=value` form (keys
//! sorted alphabetically, nulls as empty strings, nested values as
//! JSON). Outgoing payment-link requests carry the same signature
//! scheme over their own field set.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Canonicalize a JSON object into the provider's signing form.
///
/// Non-object values canonicalize to the empty string, which can never
/// match a real signature.
pub fn canonicalize(data: &serde_json::Value) -> String {
    let Some(map) = data.as_object() else {
        return String::new();
    };
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    let mut parts = Vec::with_capacity(keys.len());
    for key in keys {
        let value = match &map[key] {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            nested => serde_json::to_string(nested).unwrap_or_default(),
        };
        parts.push(format!("{key}={value}"));
    }
    parts.join("&")
}

/// Hex-encoded HMAC-SHA256 over an already-canonicalized payload.
pub fn sign(checksum_key: &str, payload: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(checksum_key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a webhook `data` object against its signature field.
///
/// Constant-time comparison via `Mac::verify_slice`; any mismatch (or a
/// malformed hex signature) is treated as tampering and the event must
/// be discarded by the caller.
pub fn verify_webhook(checksum_key: &str, data: &serde_json::Value, signature: &str) -> bool {
    let payload = canonicalize(data);
    let Ok(mut mac) = HmacSha256::new_from_slice(checksum_key.as_bytes()) else {
        return false;
    };
    mac.update(payload.as_bytes());

    let Ok(sig_bytes) = hex::decode(signature) else {
        return false;
    };
    mac.verify_slice(&sig_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonicalize_sorts_keys_and_maps_nulls() {
        let data = json!({
            "orderCode": 123,
            "amount": 108000,
            "description": "order 42",
            "counterAccountName": null,
        });
        assert_eq!(
            canonicalize(&data),
            "amount=108000&counterAccountName=&description=order 42&orderCode=123"
        );
    }

    #[test]
    fn canonicalize_non_object_is_empty() {
        assert_eq!(canonicalize(&json!("just a string")), "");
        assert_eq!(canonicalize(&json!(null)), "");
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let data = json!({ "orderCode": 9001, "amount": 250000 });
        let sig = sign("secret-key", &canonicalize(&data));
        assert!(verify_webhook("secret-key", &data, &sig));
    }

    #[test]
    fn tampered_amount_fails_verification() {
        let data = json!({ "orderCode": 9001, "amount": 250000 });
        let sig = sign("secret-key", &canonicalize(&data));

        let tampered = json!({ "orderCode": 9001, "amount": 1 });
        assert!(!verify_webhook("secret-key", &tampered, &sig));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let data = json!({ "orderCode": 9001, "amount": 250000 });
        let sig = sign("secret-key", &canonicalize(&data));
        assert!(!verify_webhook("other-key", &data, &sig));
    }

    #[test]
    fn garbage_signature_is_rejected_not_panicking() {
        let data = json!({ "orderCode": 9001 });
        assert!(!verify_webhook("secret-key", &data, "not-hex-at-all"));
        assert!(!verify_webhook("secret-key", &data, ""));
    }
}
