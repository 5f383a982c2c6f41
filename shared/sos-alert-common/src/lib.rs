//! Shared types and utilities for the AEGIS SOS alert relay
//!
//! This library provides the wire payloads, the validated alert value and the
//! request validation used by both the relay server and the trigger client.

pub mod payloads;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use payloads::*;
pub use types::*;
pub use validation::{is_valid_email, ValidationError, ValidationResult};
