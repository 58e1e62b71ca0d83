//! Data models shared between server and clients

pub mod order;
pub mod payment;
pub mod product;
pub mod staff;

pub use order::{
    Actor, ActorRole, AddressSnapshot, AssignRequest, CheckoutItem, CheckoutRequest,
    CheckoutResponse, ClaimRequest, HistoryEntry, InventoryFlags, Order, OrderAmounts, OrderItem,
    OrderStatus, PaymentMethod, UpdateItemVariantRequest, UpdateStatusRequest,
};
pub use payment::{PaymentLink, ProviderAck, ProviderPaymentStatus, WebhookPayload};
pub use product::{Product, ProductVariant};
pub use staff::{Staff, StaffShift};
