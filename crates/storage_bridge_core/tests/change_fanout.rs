use std::sync::{Arc, Mutex};
use std::thread;
use storage_bridge_core::{
    ChangePayload, InMemorySettings, MessageKind, MessageRouter, MessageSink, Namespace,
    OutboundMessage, RequestEnvelope, SeedConfig, StoredValue, TabHost, Url, ValueMap,
    WindowHandle,
};

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

fn set_request(id: Option<&str>, namespace: &str, key: &str, value: f64) -> RequestEnvelope {
    let mut values = ValueMap::new();
    values.insert(key.to_string(), StoredValue::Number(value));
    let envelope = RequestEnvelope::new()
        .with_namespace(namespace)
        .with_record(values);
    match id {
        Some(id) => envelope.with_id(id),
        None => envelope,
    }
}

#[test]
fn change_events_reach_every_connected_page_not_only_the_caller() {
    let router = router();
    let caller = Arc::new(RecordingSink::default());
    let other_tab = Arc::new(RecordingSink::default());
    let other_window = Arc::new(RecordingSink::default());
    for page in [&caller, &other_tab, &other_window] {
        router.notifier().subscribe(&Namespace::ALL, page.clone());
    }

    router.handle(
        MessageKind::Set,
        Some(&set_request(Some("s1"), "sync", "theme", 1.0)),
        caller.as_ref(),
    );

    let caller_messages = caller.take();
    assert_eq!(
        caller_messages
            .iter()
            .map(OutboundMessage::name)
            .collect::<Vec<_>>(),
        vec!["storage-change", "set-response"]
    );
    for page in [&other_tab, &other_window] {
        let messages = page.take();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].name(), "storage-change");
    }
}

#[test]
fn disconnected_pages_stop_receiving_events() {
    let router = router();
    let reply = RecordingSink::default();
    let page = Arc::new(RecordingSink::default());
    let subscription = router.notifier().subscribe(&Namespace::ALL, page.clone());

    router.handle(
        MessageKind::Set,
        Some(&set_request(None, "local", "a", 1.0)),
        &reply,
    );
    assert!(router.notifier().unsubscribe(subscription));
    router.handle(
        MessageKind::Set,
        Some(&set_request(None, "local", "a", 2.0)),
        &reply,
    );

    assert_eq!(page.take().len(), 1);
}

#[test]
fn concurrent_sets_on_one_namespace_are_linearizable() {
    const WRITERS: usize = 8;
    const WRITES_PER_WRITER: usize = 50;

    let router = Arc::new(router());
    let observer = Arc::new(RecordingSink::default());
    router
        .notifier()
        .subscribe(&[Namespace::Local], observer.clone());

    let workers = (0..WRITERS)
        .map(|writer| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                let reply = RecordingSink::default();
                for step in 0..WRITES_PER_WRITER {
                    let key = format!("writer-{writer}");
                    router.handle(
                        MessageKind::Set,
                        Some(&set_request(None, "local", &key, step as f64)),
                        &reply,
                    );
                    router.handle(
                        MessageKind::Set,
                        Some(&set_request(None, "local", "shared", step as f64)),
                        &reply,
                    );
                }
            })
        })
        .collect::<Vec<_>>();
    for worker in workers {
        worker.join().expect("writer thread should finish");
    }

    let events = observer.take();
    assert_eq!(events.len(), WRITERS * WRITES_PER_WRITER * 2);

    // Replaying events in delivery order must reproduce the final store.
    let mut replayed = ValueMap::new();
    for message in &events {
        let OutboundMessage::StorageChange(event) = message else {
            panic!("observer should only receive storage-change");
        };
        for (key, old) in &event.old {
            assert_eq!(replayed.get(key), Some(old), "pre-image must match replay");
        }
        let ChangePayload::Values(values) = &event.new else {
            panic!("set should report submitted values");
        };
        replayed.extend(values.clone());
    }
    assert_eq!(replayed, router.registry().read(Namespace::Local));
    for writer in 0..WRITERS {
        assert_eq!(
            replayed[&format!("writer-{writer}")],
            StoredValue::Number((WRITES_PER_WRITER - 1) as f64)
        );
    }
}

#[test]
fn namespaces_do_not_share_subscribers_or_state() {
    let router = router();
    let reply = RecordingSink::default();
    let sync_page = Arc::new(RecordingSink::default());
    router
        .notifier()
        .subscribe(&[Namespace::Sync], sync_page.clone());

    router.handle(
        MessageKind::Set,
        Some(&set_request(None, "local", "a", 1.0)),
        &reply,
    );
    assert!(sync_page.take().is_empty());
    assert_eq!(router.registry().read(Namespace::Sync).len(), 1);
}
