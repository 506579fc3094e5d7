//! Message router over the namespace registry.

use crate::config::SeedConfig;
use crate::model::message::{
    ChangeEvent, ChangePayload, EnvelopeValues, MessageKind, MessageSink, OutboundMessage,
    RequestEnvelope,
};
use crate::model::namespace::Namespace;
use crate::model::value::ValueMap;
use crate::notify::ChangeNotifier;
use crate::relay::tab_relay::{TabHost, TabOpenRelay};
use crate::settings::SettingsProvider;
use crate::store::kv_store::Store;
use crate::store::registry::NamespaceRegistry;
use log::{debug, warn};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Why a request was dropped without a response.
///
/// Only visible to the host for diagnostics; scripts never see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The host delivered no `userInfo` object.
    MissingPayload,
    MissingNamespace,
    /// `values` missing or of the wrong shape for the operation.
    MissingValues,
    MissingOpenUrls,
    /// The message came from a page the host never connected.
    UnknownPage,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingPayload => "missing_payload",
            Self::MissingNamespace => "missing_namespace",
            Self::MissingValues => "missing_values",
            Self::MissingOpenUrls => "missing_open_urls",
            Self::UnknownPage => "unknown_page",
        }
    }
}

impl Display for DropReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host-side result of routing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Operation applied and a correlated response was dispatched.
    Responded(MessageKind),
    /// Operation applied; no `id`, so no response.
    Completed(MessageKind),
    /// URLs handed to the tab relay.
    Relayed { submitted: usize },
    Dropped(DropReason),
    /// Message name outside the dispatch table.
    Unknown(String),
}

/// Routes storage messages to the namespace stores.
pub struct MessageRouter {
    registry: Arc<NamespaceRegistry>,
    notifier: Arc<ChangeNotifier>,
    relay: TabOpenRelay,
}

impl MessageRouter {
    pub fn new(
        registry: Arc<NamespaceRegistry>,
        notifier: Arc<ChangeNotifier>,
        relay: TabOpenRelay,
    ) -> Self {
        Self {
            registry,
            notifier,
            relay,
        }
    }

    /// Router over a freshly seeded registry and an empty notifier.
    pub fn seeded(
        seed: &SeedConfig,
        settings: &dyn SettingsProvider,
        tab_host: Arc<dyn TabHost>,
    ) -> Self {
        Self::new(
            Arc::new(NamespaceRegistry::seeded(seed, settings)),
            Arc::new(ChangeNotifier::new()),
            TabOpenRelay::new(tab_host),
        )
    }

    pub fn registry(&self) -> &NamespaceRegistry {
        &self.registry
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn relay(&self) -> &TabOpenRelay {
        &self.relay
    }

    /// Routes a message by its host name.
    pub fn handle_named(
        &self,
        name: &str,
        envelope: Option<&RequestEnvelope>,
        reply: &dyn MessageSink,
    ) -> RouteOutcome {
        match MessageKind::parse(name) {
            Some(kind) => self.handle(kind, envelope, reply),
            None => {
                warn!(
                    "event=message_unknown module=router status=ignored name_len={} has_payload={}",
                    name.len(),
                    envelope.is_some()
                );
                RouteOutcome::Unknown(name.to_string())
            }
        }
    }

    /// Routes one decoded request.
    pub fn handle(
        &self,
        kind: MessageKind,
        envelope: Option<&RequestEnvelope>,
        reply: &dyn MessageSink,
    ) -> RouteOutcome {
        let Some(envelope) = envelope else {
            return dropped(kind, DropReason::MissingPayload);
        };
        let result = match kind {
            MessageKind::Get => self.respond_get(envelope, reply),
            MessageKind::Set => self.respond_set(envelope, reply),
            MessageKind::Remove => self.respond_remove(envelope, reply),
            MessageKind::Clear => self.respond_clear(envelope, reply),
            MessageKind::Message => self.respond_message(envelope),
        };
        result.unwrap_or_else(|reason| dropped(kind, reason))
    }

    fn respond_get(
        &self,
        envelope: &RequestEnvelope,
        reply: &dyn MessageSink,
    ) -> Result<RouteOutcome, DropReason> {
        let namespace = self.namespace_of(envelope)?;
        let value = self
            .registry
            .project(namespace, envelope.keys.as_deref());
        debug!(
            "event=storage_get module=router status=ok namespace={} keys={}",
            namespace,
            value.len()
        );

        Ok(match envelope.id.clone() {
            Some(id) => {
                reply.dispatch(OutboundMessage::GetResponse { id, value });
                RouteOutcome::Responded(MessageKind::Get)
            }
            None => RouteOutcome::Completed(MessageKind::Get),
        })
    }

    fn respond_set(
        &self,
        envelope: &RequestEnvelope,
        reply: &dyn MessageSink,
    ) -> Result<RouteOutcome, DropReason> {
        let namespace = self.namespace_of(envelope)?;
        let Some(EnvelopeValues::Record(values)) = &envelope.values else {
            return Err(DropReason::MissingValues);
        };
        let keys = values.keys().cloned().collect::<Vec<_>>();

        self.mutate(namespace, |store| {
            let old = store.project(Some(keys.as_slice()));
            store.merge(values);
            (old, ChangePayload::Values(values.clone()))
        });
        Ok(acknowledge(MessageKind::Set, envelope, reply))
    }

    fn respond_remove(
        &self,
        envelope: &RequestEnvelope,
        reply: &dyn MessageSink,
    ) -> Result<RouteOutcome, DropReason> {
        let namespace = self.namespace_of(envelope)?;
        let Some(EnvelopeValues::Keys(keys)) = &envelope.values else {
            return Err(DropReason::MissingValues);
        };

        self.mutate(namespace, |store| {
            let old = store.project(Some(keys.as_slice()));
            store.retain_unlisted(keys);
            (old, ChangePayload::Keys(keys.clone()))
        });
        Ok(acknowledge(MessageKind::Remove, envelope, reply))
    }

    fn respond_clear(
        &self,
        envelope: &RequestEnvelope,
        reply: &dyn MessageSink,
    ) -> Result<RouteOutcome, DropReason> {
        let namespace = self.namespace_of(envelope)?;

        self.mutate(namespace, |store| {
            let old = store.replace(ValueMap::new());
            (old, ChangePayload::Values(ValueMap::new()))
        });
        Ok(acknowledge(MessageKind::Clear, envelope, reply))
    }

    fn respond_message(&self, envelope: &RequestEnvelope) -> Result<RouteOutcome, DropReason> {
        let urls = envelope
            .open_urls
            .clone()
            .ok_or(DropReason::MissingOpenUrls)?;
        let submitted = urls.len();
        self.relay.open_tabs(urls);
        Ok(RouteOutcome::Relayed { submitted })
    }

    fn namespace_of(&self, envelope: &RequestEnvelope) -> Result<Namespace, DropReason> {
        envelope
            .namespace
            .as_deref()
            .map(|raw| self.registry.resolve(raw))
            .ok_or(DropReason::MissingNamespace)
    }

    /// Applies one mutation and emits its change event under the namespace lock.
    fn mutate(
        &self,
        namespace: Namespace,
        apply: impl FnOnce(&mut Store) -> (ValueMap, ChangePayload),
    ) {
        self.registry.with_store(namespace, |store| {
            let (old, new) = apply(&mut *store);
            let event = ChangeEvent { namespace, old, new };
            debug!(
                "event=storage_mutation module=router status=ok namespace={} touched={} size={}",
                namespace,
                event.touched_keys().len(),
                store.len()
            );
            self.notifier.notify(&event);
        });
    }
}

fn acknowledge(
    kind: MessageKind,
    envelope: &RequestEnvelope,
    reply: &dyn MessageSink,
) -> RouteOutcome {
    match envelope.id.clone() {
        Some(id) => {
            reply.dispatch(OutboundMessage::SetResponse { id });
            RouteOutcome::Responded(kind)
        }
        None => RouteOutcome::Completed(kind),
    }
}

fn dropped(kind: MessageKind, reason: DropReason) -> RouteOutcome {
    debug!(
        "event=message_dropped module=router status=dropped kind={} reason={}",
        kind.as_str(),
        reason
    );
    RouteOutcome::Dropped(reason)
}

#[cfg(test)]
mod tests {
    use super::{DropReason, MessageRouter, RouteOutcome};
    use crate::config::SeedConfig;
    use crate::model::message::{
        ChangePayload, MessageKind, MessageSink, OutboundMessage, RequestEnvelope,
    };
    use crate::model::namespace::Namespace;
    use crate::model::value::{StoredValue, ValueMap};
    use crate::relay::tab_relay::{TabHost, WindowHandle};
    use crate::settings::InMemorySettings;
    use std::sync::{Arc, Mutex};
    use url::Url;

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<OutboundMessage>>,
    }

    impl RecordingSink {
        fn take(&self) -> Vec<OutboundMessage> {
            std::mem::take(&mut *self.messages.lock().expect("sink lock"))
        }
    }

    impl MessageSink for RecordingSink {
        fn dispatch(&self, message: OutboundMessage) {
            self.messages.lock().expect("sink lock").push(message);
        }
    }

    struct NoWindowHost;

    impl TabHost for NoWindowHost {
        fn active_window(&self) -> Option<WindowHandle> {
            None
        }

        fn open_background_tab(&self, _window: WindowHandle, _url: &Url) {}
    }

    fn router() -> MessageRouter {
        MessageRouter::seeded(
            &SeedConfig::default(),
            &InMemorySettings::new(),
            Arc::new(NoWindowHost),
        )
    }

    fn record(pairs: &[(&str, StoredValue)]) -> ValueMap {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn set_emits_pre_image_then_acknowledges() {
        let router = router();
        let reply = RecordingSink::default();
        let observer = Arc::new(RecordingSink::default());
        router
            .notifier()
            .subscribe(&[Namespace::Local], observer.clone());

        let first = RequestEnvelope::new()
            .with_namespace("local")
            .with_record(record(&[("a", StoredValue::Number(1.0))]));
        assert_eq!(
            router.handle(MessageKind::Set, Some(&first), &reply),
            RouteOutcome::Completed(MessageKind::Set)
        );

        let second = RequestEnvelope::new()
            .with_id("r2")
            .with_namespace("local")
            .with_record(record(&[("a", StoredValue::Number(2.0))]));
        assert_eq!(
            router.handle(MessageKind::Set, Some(&second), &reply),
            RouteOutcome::Responded(MessageKind::Set)
        );

        assert_eq!(
            reply.take(),
            vec![OutboundMessage::SetResponse {
                id: "r2".to_string()
            }]
        );
        let events = observer.take();
        assert_eq!(events.len(), 2);
        let OutboundMessage::StorageChange(event) = &events[1] else {
            panic!("observer should receive storage-change");
        };
        assert_eq!(event.old, record(&[("a", StoredValue::Number(1.0))]));
        assert_eq!(
            event.new,
            ChangePayload::Values(record(&[("a", StoredValue::Number(2.0))]))
        );
    }

    #[test]
    fn remove_reports_removed_keys_and_answers_with_set_response() {
        let router = router();
        let reply = RecordingSink::default();
        let observer = Arc::new(RecordingSink::default());
        router.notifier().subscribe(&Namespace::ALL, observer.clone());
        router.registry().merge(
            Namespace::Local,
            &record(&[("a", StoredValue::Bool(true)), ("b", StoredValue::Bool(false))]),
        );

        let request = RequestEnvelope::new()
            .with_id("rm")
            .with_namespace("local")
            .with_key_list(["a", "ghost"]);
        router.handle(MessageKind::Remove, Some(&request), &reply);

        assert_eq!(
            router.registry().read(Namespace::Local),
            record(&[("b", StoredValue::Bool(false))])
        );
        assert_eq!(reply.take()[0].name(), "set-response");
        let events = observer.take();
        let OutboundMessage::StorageChange(event) = &events[0] else {
            panic!("observer should receive storage-change");
        };
        assert_eq!(event.old, record(&[("a", StoredValue::Bool(true))]));
        assert_eq!(
            event.new,
            ChangePayload::Keys(vec!["a".to_string(), "ghost".to_string()])
        );
    }

    #[test]
    fn malformed_requests_are_dropped_silently() {
        let router = router();
        let reply = RecordingSink::default();
        let observer = Arc::new(RecordingSink::default());
        router.notifier().subscribe(&Namespace::ALL, observer.clone());

        let cases = [
            (MessageKind::Get, None, DropReason::MissingPayload),
            (
                MessageKind::Set,
                Some(RequestEnvelope::new().with_id("x").with_namespace("sync")),
                DropReason::MissingValues,
            ),
            (
                MessageKind::Set,
                Some(
                    RequestEnvelope::new()
                        .with_id("x")
                        .with_namespace("sync")
                        .with_key_list(["a"]),
                ),
                DropReason::MissingValues,
            ),
            (
                MessageKind::Remove,
                Some(
                    RequestEnvelope::new()
                        .with_id("x")
                        .with_namespace("sync")
                        .with_record(ValueMap::new()),
                ),
                DropReason::MissingValues,
            ),
            (
                MessageKind::Clear,
                Some(RequestEnvelope::new().with_id("x")),
                DropReason::MissingNamespace,
            ),
            (
                MessageKind::Message,
                Some(RequestEnvelope::new().with_id("x")),
                DropReason::MissingOpenUrls,
            ),
        ];

        for (kind, envelope, reason) in cases {
            assert_eq!(
                router.handle(kind, envelope.as_ref(), &reply),
                RouteOutcome::Dropped(reason),
                "kind={kind:?}"
            );
        }
        assert!(reply.take().is_empty());
        assert!(observer.take().is_empty());
        assert_eq!(router.registry().read(Namespace::Sync).len(), 1);
    }

    #[test]
    fn unknown_message_names_are_ignored() {
        let router = router();
        let reply = RecordingSink::default();
        let envelope = RequestEnvelope::new().with_id("x").with_namespace("sync");

        let outcome = router.handle_named("reload", Some(&envelope), &reply);
        assert_eq!(outcome, RouteOutcome::Unknown("reload".to_string()));
        assert!(reply.take().is_empty());
    }

    #[test]
    fn get_never_emits_change_events() {
        let router = router();
        let reply = RecordingSink::default();
        let observer = Arc::new(RecordingSink::default());
        router.notifier().subscribe(&Namespace::ALL, observer.clone());

        let request = RequestEnvelope::new().with_id("g").with_namespace("sync");
        assert_eq!(
            router.handle(MessageKind::Get, Some(&request), &reply),
            RouteOutcome::Responded(MessageKind::Get)
        );
        assert!(observer.take().is_empty());
        assert_eq!(reply.take()[0].name(), "get-response");
    }

    #[test]
    fn message_hands_urls_to_relay() {
        let router = router();
        let reply = RecordingSink::default();
        let request = RequestEnvelope::new().with_open_urls(["https://example.com", "nope"]);

        assert_eq!(
            router.handle(MessageKind::Message, Some(&request), &reply),
            RouteOutcome::Relayed { submitted: 2 }
        );
        assert_eq!(router.relay().drain(), 0);
        assert!(reply.take().is_empty());
    }
}
