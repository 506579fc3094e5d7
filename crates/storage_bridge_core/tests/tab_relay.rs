use serde_json::json;
use std::sync::{Arc, Mutex};
use storage_bridge_core::{
    InMemorySettings, MessageRouter, MessageSink, OutboundMessage, RequestEnvelope, RouteOutcome,
    SeedConfig, TabHost, TabOpenRelay, Url, WindowHandle,
};

struct RecordingHost {
    window: Option<WindowHandle>,
    opened: Mutex<Vec<String>>,
}

impl RecordingHost {
    fn with_window(id: u64) -> Self {
        Self {
            window: Some(WindowHandle::new(id)),
            opened: Mutex::new(Vec::new()),
        }
    }

    fn opened(&self) -> Vec<String> {
        self.opened.lock().expect("host lock").clone()
    }
}

impl TabHost for RecordingHost {
    fn active_window(&self) -> Option<WindowHandle> {
        self.window
    }

    fn open_background_tab(&self, _window: WindowHandle, url: &Url) {
        self.opened.lock().expect("host lock").push(url.to_string());
    }
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<OutboundMessage>>,
}

impl MessageSink for RecordingSink {
    fn dispatch(&self, message: OutboundMessage) {
        self.messages.lock().expect("sink lock").push(message);
    }
}

#[test]
fn opens_valid_urls_in_order_and_skips_invalid_ones() {
    let host = Arc::new(RecordingHost::with_window(1));
    let relay = TabOpenRelay::new(host.clone());

    relay.open_tabs(vec![
        "https://example.com".to_string(),
        "not a url".to_string(),
        "https://a.b".to_string(),
    ]);

    assert_eq!(relay.drain(), 2);
    assert_eq!(
        host.opened(),
        vec!["https://example.com/".to_string(), "https://a.b/".to_string()]
    );
}

#[test]
fn message_request_relays_without_responding() {
    let host = Arc::new(RecordingHost::with_window(3));
    let router = MessageRouter::seeded(
        &SeedConfig::default(),
        &InMemorySettings::new(),
        host.clone(),
    );
    let reply = RecordingSink::default();
    let payload = json!({
        "id": "ignored",
        "openUrls": ["https://github.com/notifications", "::", "https://github.com/pulls"],
    });
    let envelope = RequestEnvelope::from_payload(payload.as_object().expect("object payload"));

    let outcome = router.handle_named("message", Some(&envelope), &reply);

    assert_eq!(outcome, RouteOutcome::Relayed { submitted: 3 });
    assert_eq!(router.relay().drain(), 2);
    assert_eq!(
        host.opened(),
        vec![
            "https://github.com/notifications".to_string(),
            "https://github.com/pulls".to_string(),
        ]
    );
    assert!(reply.messages.lock().expect("sink lock").is_empty());
}

#[test]
fn drain_accumulates_across_background_requests() {
    let host = Arc::new(RecordingHost::with_window(5));
    let relay = TabOpenRelay::new(host.clone());

    relay.open_tabs(vec!["https://one.example".to_string()]);
    relay.open_tabs(vec!["https://two.example".to_string()]);
    relay.open_tabs(vec!["bogus".to_string()]);

    assert_eq!(relay.drain(), 2);
    assert_eq!(relay.drain(), 0);
    assert_eq!(host.opened().len(), 2);
}
