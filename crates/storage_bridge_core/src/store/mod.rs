//! Namespaced in-memory stores.
//!
//! # Responsibility
//! - Hold the `sync` and `local` key/value mappings for the process lifetime.
//! - Provide whole-store-at-once mutations with per-namespace serialization.
//!
//! # Invariants
//! - Keys are unique; writes overwrite.
//! - No intermediate store state is observable by another caller.
//! - Stores are never destroyed, only cleared or mutated.

pub mod kv_store;
pub mod registry;
