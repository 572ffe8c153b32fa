//! Domain models persisted by the checkout service.

pub mod donor;
pub mod order;

pub use donor::Donor;
pub use order::{Order, OrderItem};
