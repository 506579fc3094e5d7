//! Storage message routing.
//!
//! # Responsibility
//! - Map inbound host messages onto store operations.
//! - Emit one change event per successful mutation.
//! - Answer correlated requests on the caller's reply channel.
//!
//! # Invariants
//! - Malformed requests are dropped silently: no response, no event.
//! - Responses are only sent when the request carried an `id`.
//! - Read-only requests never emit change events.
//! - Errors are never reported back to the calling script.

pub mod message_router;
