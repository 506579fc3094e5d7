//! Core storage protocol for the extension storage bridge.
//! This crate is the single source of truth for protocol invariants.

pub mod config;
pub mod logging;
pub mod model;
pub mod notify;
pub mod relay;
pub mod router;
pub mod settings;
pub mod store;

pub use config::{BridgeConfig, ConfigError, LogLevel, SeedConfig, DEFAULT_FEATURE_FLAGS};
pub use logging::{init_logging, init_logging_from_config, logging_status};
pub use model::message::{
    ChangeEvent, ChangePayload, EnvelopeValues, MessageKind, MessageSink, OutboundMessage,
    RequestEnvelope,
};
pub use model::namespace::Namespace;
pub use model::value::{StoredValue, ValueMap};
pub use notify::{ChangeNotifier, SubscriptionId};
pub use relay::tab_relay::{parse_tab_urls, TabHost, TabOpenRelay, WindowHandle};
pub use router::message_router::{DropReason, MessageRouter, RouteOutcome};
pub use settings::{InMemorySettings, SettingsProvider};
pub use store::kv_store::Store;
pub use store::registry::NamespaceRegistry;
pub use url::Url;

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
