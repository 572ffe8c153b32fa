//! External service clients.

pub mod notifications;

pub use notifications::NotificationClient;
