//! HTTP middleware and extractors for the checkout service.

pub mod client_ip;

pub use client_ip::ClientIp;
