//! Ports Layer
//!
//! Defines the interfaces (traits) for:
//! - Driving Ports (inbound) - API for the registration flow
//! - Driven Ports (outbound) - The authoritative user store

pub mod inbound;
pub mod outbound;

pub use inbound::{IndexStats, UsernameExistenceApi};
pub use outbound::{AuthoritativeStore, UsernameStream};
