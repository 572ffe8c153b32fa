//! Core types for PledgeKit.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod reference;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use reference::{FundraiserRef, ProductRef, ReferenceError};
pub use status::*;
