//! Tab-open relay.
//!
//! # Responsibility
//! - Validate URL strings sent by content scripts.
//! - Ask the host to open each valid URL as a background tab.
//!
//! # Invariants
//! - Invalid entries are skipped individually; the rest still open.
//! - Input order is preserved.
//! - Background requests are handled by one worker, in submission order.

pub mod tab_relay;
