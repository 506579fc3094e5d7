//! Host-facing API for the native extension handler.
//!
//! # Responsibility
//! - Expose stable, use-case-level entry points to the extension handler.
//! - Track connected pages so storage changes reach every page.
//! - Decode raw `userInfo` JSON at the boundary.
//!
//! # Invariants
//! - Exported functions must not panic across the host boundary.
//! - Malformed input never produces a reply to the calling page.
//! - Return values are UTF-8 strings or plain enums with stable meaning.

use log::{info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use storage_bridge_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    BridgeConfig, DropReason, LogLevel, MessageRouter, MessageSink, Namespace, RequestEnvelope,
    RouteOutcome, SettingsProvider, SubscriptionId, TabHost,
};

/// Identifier of one connected page (tab or window surface).
pub type PageId = SubscriptionId;

/// Minimal health-check API for host smoke integration.
///
/// # Host contract
/// - Sync call, non-blocking.
/// - Never fails; always returns a UTF-8 string.
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version to the host.
///
/// # Host contract
/// - Sync call, non-blocking.
/// - Never fails; always returns a UTF-8 string.
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes bridge logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # Host contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
pub fn init_logging(level: String, log_dir: String) -> String {
    let level = match LogLevel::parse(&level) {
        Ok(level) => level,
        Err(err) => return err.to_string(),
    };
    let log_dir = log_dir.trim();
    if log_dir.is_empty() {
        return "log_dir cannot be empty".to_string();
    }
    match init_logging_inner(level, Path::new(log_dir)) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Storage bridge owned by the host process.
///
/// One instance per process; stores live as long as the bridge does.
pub struct HostBridge {
    router: MessageRouter,
    settings: Arc<dyn SettingsProvider>,
    pages: RwLock<BTreeMap<PageId, Arc<dyn MessageSink>>>,
}

impl HostBridge {
    /// Builds the bridge and seeds `sync` from config and settings.
    pub fn new(
        config: &BridgeConfig,
        settings: Arc<dyn SettingsProvider>,
        tab_host: Arc<dyn TabHost>,
    ) -> Self {
        let router = MessageRouter::seeded(&config.seed, settings.as_ref(), tab_host);
        info!(
            "event=bridge_ready module=host status=ok feature_flags={}",
            config.seed.feature_flags.len()
        );
        Self {
            router,
            settings,
            pages: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Registers a page and subscribes it to both namespaces.
    pub fn connect_page(&self, page: Arc<dyn MessageSink>) -> PageId {
        let page_id = self
            .router
            .notifier()
            .subscribe(&Namespace::ALL, Arc::clone(&page));
        self.pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(page_id, page);
        info!("event=page_connected module=host status=ok page={page_id}");
        page_id
    }

    /// Forgets a page; returns whether it was connected.
    pub fn disconnect_page(&self, page_id: PageId) -> bool {
        let removed = self
            .pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&page_id)
            .is_some();
        if removed {
            self.router.notifier().unsubscribe(page_id);
            info!("event=page_disconnected module=host status=ok page={page_id}");
        }
        removed
    }

    pub fn page_count(&self) -> usize {
        self.pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Handles one inbound message from a page with raw `userInfo` JSON.
    ///
    /// Empty input, `null`, invalid JSON and non-object payloads all count as
    /// "no payload" and are dropped silently.
    pub fn message_received(
        &self,
        page_id: PageId,
        name: &str,
        user_info_json: &str,
    ) -> RouteOutcome {
        let trimmed = user_info_json.trim();
        if trimmed.is_empty() {
            return self.message_received_value(page_id, name, None);
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => self.message_received_value(page_id, name, Some(&value)),
            Err(err) => {
                warn!(
                    "event=user_info_invalid module=host status=dropped line={} column={}",
                    err.line(),
                    err.column()
                );
                self.message_received_value(page_id, name, None)
            }
        }
    }

    /// Handles one inbound message with an already-parsed `userInfo` value.
    pub fn message_received_value(
        &self,
        page_id: PageId,
        name: &str,
        user_info: Option<&Value>,
    ) -> RouteOutcome {
        let Some(page) = self.page(page_id) else {
            warn!(
                "event=message_received module=host status=dropped reason=unknown_page \
                 page={page_id}"
            );
            return RouteOutcome::Dropped(DropReason::UnknownPage);
        };
        let envelope = user_info
            .and_then(Value::as_object)
            .map(RequestEnvelope::from_payload);
        self.router
            .handle_named(name, envelope.as_ref(), page.as_ref())
    }

    /// Current personal token, for the preferences GUI.
    pub fn personal_token(&self) -> String {
        self.settings.personal_token()
    }

    /// Persists a new personal token through the settings provider.
    ///
    /// The running `sync` store keeps its seeded value; scripts that want the
    /// new token read it after the next host start.
    pub fn set_personal_token(&self, token: &str) {
        self.settings.set_personal_token(token);
        info!(
            "event=personal_token_updated module=host status=ok empty={}",
            token.is_empty()
        );
    }

    /// Waits for background tab requests; returns the tabs opened.
    pub fn drain_tab_requests(&self) -> usize {
        self.router.relay().drain()
    }

    fn page(&self, page_id: PageId) -> Option<Arc<dyn MessageSink>> {
        self.pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&page_id)
            .cloned()
    }
}
