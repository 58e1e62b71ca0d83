//! Region-based shipping fee
//!
//! Pure function of (city, district, subtotal). Fees are flat per
//! region; orders over the free-shipping threshold ship free.

/// Subtotal at or above this ships free (VND).
pub const FREE_SHIPPING_THRESHOLD: i64 = 500_000;

/// Home city of the warehouse.
const HOME_CITY: &str = "Hồ Chí Minh";

/// Central districts of the home city (cheapest zone).
const CENTRAL_DISTRICTS: [&str; 5] = ["Quận 1", "Quận 3", "Quận 5", "Quận 10", "Phú Nhuận"];

/// Neighboring provinces served by the regional courier.
const NEARBY_CITIES: [&str; 3] = ["Bình Dương", "Đồng Nai", "Long An"];

pub fn shipping_fee(city: &str, district: &str, subtotal: i64) -> i64 {
    if subtotal >= FREE_SHIPPING_THRESHOLD {
        return 0;
    }
    if city == HOME_CITY {
        if CENTRAL_DISTRICTS.contains(&district) {
            return 15_000;
        }
        return 20_000;
    }
    if NEARBY_CITIES.contains(&city) {
        return 30_000;
    }
    40_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn central_district_is_cheapest() {
        assert_eq!(shipping_fee("Hồ Chí Minh", "Quận 1", 100_000), 15_000);
    }

    #[test]
    fn home_city_outskirts() {
        assert_eq!(shipping_fee("Hồ Chí Minh", "Củ Chi", 100_000), 20_000);
    }

    #[test]
    fn nearby_and_far_regions() {
        assert_eq!(shipping_fee("Bình Dương", "Thủ Dầu Một", 100_000), 30_000);
        assert_eq!(shipping_fee("Hà Nội", "Hoàn Kiếm", 100_000), 40_000);
    }

    #[test]
    fn free_shipping_over_threshold() {
        assert_eq!(shipping_fee("Hà Nội", "Hoàn Kiếm", 500_000), 0);
        assert_eq!(shipping_fee("Hà Nội", "Hoàn Kiếm", 499_999), 40_000);
    }
}
