//! Wire and storage data model.
//!
//! # Responsibility
//! - Define the value, namespace and message types shared by every module.
//! - Keep JSON conversion at one boundary so store logic stays typed.
//!
//! # Invariants
//! - Decoding host payloads is total; malformed input becomes absent fields.
//! - Namespaces are a closed two-variant set.

pub mod message;
pub mod namespace;
pub mod value;
