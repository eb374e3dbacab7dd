//! Domain model
pub mod order;

pub use order::{
    Address, AddressKind, Amount, FulfillmentStatus, NewOrder, Order, OrderItem, OrderStatus,
    Payment, PaymentStatus, Shipment, TransitionError,
};
