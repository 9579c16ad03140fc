//! End-to-end sync rounds between engines and the in-memory service,
//! over the full JSON wire path.

use podsync_engine::{HttpTransport, RetryConfig, SyncConfig, SyncEngine};
use podsync_protocol::{
    ActionKind, DataClass, DeviceId, DeviceType, EpisodeAction, PlayPosition, Winner,
};
use podsync_server::{LoopbackServer, RemoteService};
use podsync_store::{FileStore, MemoryStore, StateStore};
use std::sync::Arc;

const X: &str = "https://feeds.example.org/x.xml";
const Y: &str = "https://feeds.example.org/y.xml";
const Z: &str = "https://feeds.example.org/z.xml";

type LoopbackEngine<S> = SyncEngine<HttpTransport<LoopbackServer>, S>;

fn engine_for(service: &Arc<RemoteService>, name: &str) -> LoopbackEngine<MemoryStore> {
    engine_with_store(service, name, Arc::new(MemoryStore::new()))
}

fn engine_with_store<S: StateStore>(
    service: &Arc<RemoteService>,
    name: &str,
    store: Arc<S>,
) -> LoopbackEngine<S> {
    let transport = HttpTransport::new(LoopbackServer::new(Arc::clone(service)));
    let config = SyncConfig::new(DeviceId::new(name), "loopback://sync")
        .with_retry(RetryConfig::no_retry());
    SyncEngine::new(config, Arc::new(transport), store)
}

#[test]
fn empty_sync_is_idempotent() {
    let service = Arc::new(RemoteService::new());
    let engine = engine_for(&service, "laptop");

    let first = engine.sync().unwrap();
    assert!(first.is_noop());

    let second = engine.sync().unwrap();
    assert!(second.is_noop());
    assert!(service.subscribed().is_empty());
}

#[test]
fn two_devices_converge() {
    let service = Arc::new(RemoteService::new());
    let laptop = engine_for(&service, "laptop");
    let phone = engine_for(&service, "phone");

    laptop.subscribe(X).unwrap();
    laptop.subscribe(Y).unwrap();
    laptop.sync().unwrap();

    phone.subscribe(Z).unwrap();
    let phone_report = phone.sync().unwrap();
    assert_eq!(phone_report.added, 2); // X and Y arrived from the laptop

    let laptop_report = laptop.sync().unwrap();
    assert_eq!(laptop_report.added, 1); // Z arrived from the phone

    let laptop_view = laptop.subscriptions().unwrap();
    let phone_view = phone.subscriptions().unwrap();
    for url in [X, Y, Z] {
        assert!(laptop_view.is_subscribed(url));
        assert!(phone_view.is_subscribed(url));
        assert!(service.subscribed().contains(url));
    }
}

#[test]
fn unsubscribe_propagates_between_devices() {
    let service = Arc::new(RemoteService::new());
    let laptop = engine_for(&service, "laptop");
    let phone = engine_for(&service, "phone");

    laptop.subscribe(X).unwrap();
    laptop.sync().unwrap();
    phone.sync().unwrap();
    assert!(phone.subscriptions().unwrap().is_subscribed(X));

    laptop.unsubscribe(X).unwrap();
    laptop.sync().unwrap();

    let report = phone.sync().unwrap();
    assert_eq!(report.removed, 1);
    assert!(!phone.subscriptions().unwrap().is_subscribed(X));
}

#[test]
fn churn_collapses_to_the_net_effect_on_the_wire() {
    let service = Arc::new(RemoteService::new());
    let engine = engine_for(&service, "laptop");

    for _ in 0..20 {
        engine.subscribe(X).unwrap();
        engine.unsubscribe(X).unwrap();
    }
    engine.subscribe(X).unwrap();
    engine.sync().unwrap();

    // The server saw exactly one change, not forty-one.
    let fetched = service.fetch(&DeviceId::new("observer"), DataClass::Subscriptions, None);
    assert_eq!(fetched.changes.len(), 1);
    assert!(service.subscribed().contains(X));
}

#[test]
fn remote_wins_older_local_change_with_a_conflict_note() {
    let service = Arc::new(RemoteService::new());
    let laptop = engine_for(&service, "laptop");
    let phone = engine_for(&service, "phone");

    laptop.subscribe(X).unwrap();
    laptop.sync().unwrap();
    phone.sync().unwrap();

    // Phone unsubscribes offline; laptop re-asserts the subscription later
    // (the server clock has advanced past the phone's pending change).
    phone.unsubscribe(X).unwrap();
    laptop.unsubscribe(X).unwrap();
    laptop.sync().unwrap();
    laptop.subscribe(X).unwrap();
    laptop.sync().unwrap();

    let report = phone.sync().unwrap();
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].winner, Winner::Remote);
    assert!(phone.subscriptions().unwrap().is_subscribed(X));
    assert!(service.subscribed().contains(X));
}

#[test]
fn action_logs_union_across_devices() {
    let service = Arc::new(RemoteService::new());
    let laptop = engine_for(&service, "laptop");
    let phone = engine_for(&service, "phone");

    laptop
        .record_action_now(X, "e1", ActionKind::Download, None)
        .unwrap();
    laptop.record_play(X, "e1", PlayPosition::at(120)).unwrap();
    laptop.sync().unwrap();

    phone
        .record_action_now(X, "e2", ActionKind::Download, None)
        .unwrap();
    let phone_report = phone.sync().unwrap();
    assert_eq!(phone_report.actions_pulled, 2);
    assert_eq!(phone_report.actions_pushed, 1);

    laptop.sync().unwrap();
    assert_eq!(laptop.actions().unwrap().len(), 3);
    assert_eq!(phone.actions().unwrap().len(), 3);
    assert_eq!(service.actions().len(), 3);
}

#[test]
fn ambiguous_send_failure_converges_without_duplicates() {
    let service = Arc::new(RemoteService::new());
    let engine = engine_for(&service, "laptop");

    engine.subscribe(X).unwrap();
    service.fail_next_send_after_apply("response lost");

    // The send applies on the server but the ack never arrives; the engine
    // refetches from the old cursor, sees its own change, and commits.
    let report = engine.sync().unwrap();
    assert!(report.conflicts.is_empty());
    assert!(engine.subscriptions().unwrap().is_subscribed(X));
    assert!(service.subscribed().contains(X));

    // One change on the server, not two.
    let fetched = service.fetch(&DeviceId::new("observer"), DataClass::Subscriptions, None);
    assert_eq!(fetched.changes.len(), 1);

    // And the next sync is a clean no-op.
    assert!(engine.sync().unwrap().is_noop());
}

#[test]
fn ambiguous_action_send_is_deduplicated_by_the_server() {
    let service = Arc::new(RemoteService::new());
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with_store(&service, "laptop", Arc::clone(&store));

    engine
        .record_action_now(X, "e1", ActionKind::Play, Some(PlayPosition::at(30)))
        .unwrap();
    service.fail_next_send_after_apply("response lost");

    engine.sync().unwrap();
    assert_eq!(service.actions().len(), 1);
    assert!(store.pending(DataClass::EpisodeActions).unwrap().is_empty());
}

#[test]
fn state_survives_a_restart_between_syncs() {
    let service = Arc::new(RemoteService::new());
    let dir = tempfile::tempdir().unwrap();

    {
        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        let engine = engine_with_store(&service, "laptop", store);
        engine.subscribe(X).unwrap();
        engine.sync().unwrap();
    }

    // Another device adds a feed while we are "off".
    service.seed_subscription(Y, true);

    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let engine = engine_with_store(&service, "laptop", store);
    let report = engine.sync().unwrap();

    // Only the incremental change came down; X was already committed.
    assert_eq!(report.added, 1);
    let view = engine.subscriptions().unwrap();
    assert!(view.is_subscribed(X));
    assert!(view.is_subscribed(Y));
}

#[test]
fn device_registration_reaches_the_service() {
    let service = Arc::new(RemoteService::new());
    let transport = HttpTransport::new(LoopbackServer::new(Arc::clone(&service)));
    let config = SyncConfig::new(DeviceId::new("phone"), "loopback://sync")
        .with_device_type(DeviceType::Mobile)
        .with_retry(RetryConfig::no_retry());
    let engine = SyncEngine::new(config, Arc::new(transport), Arc::new(MemoryStore::new()));

    engine.register().unwrap();
    // Subsequent syncs keep the registered kind.
    engine.sync().unwrap();

    assert_eq!(
        service.device_type(&DeviceId::new("phone")),
        Some(DeviceType::Mobile)
    );
}

#[test]
fn cursor_never_regresses_across_rounds() {
    let service = Arc::new(RemoteService::new());
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with_store(&service, "laptop", Arc::clone(&store));

    engine.subscribe(X).unwrap();
    engine.sync().unwrap();
    let after_first = store.cursor(DataClass::Subscriptions).unwrap().unwrap();

    service.seed_subscription(Y, true);
    engine.sync().unwrap();
    let after_second = store.cursor(DataClass::Subscriptions).unwrap().unwrap();

    assert!(after_second >= after_first);
}
