use slipway_core::{Engine, StateLock};
use slipway_provider::{MockPlatform, ObjectKind, PlatformClient, PlatformFactory, PlatformObject, ProviderSettings};
use slipway_schema::{Container, Network, Resource};
use slipway_store::{Journal, JournalOp, ResourceRecord, ResourceState, StateLayout, StateStore};
use std::path::Path;
use std::sync::Arc;

fn engine(state: &Path, mock: &Arc<MockPlatform>) -> Engine {
    let factory = PlatformFactory::new(mock.clone(), ProviderSettings::new(state, state));
    Engine::new(state, Box::new(factory))
}

fn initialized(state: &Path) -> (StateLayout, Journal) {
    let layout = StateLayout::new(state);
    layout.initialize().unwrap();
    let journal = Journal::new(&layout);
    journal.initialize().unwrap();
    (layout, journal)
}

#[test]
fn interrupted_create_is_recorded_as_failed() {
    let state = tempfile::tempdir().unwrap();
    let (_layout, journal) = initialized(state.path());
    let app = Resource::Container(Container::new("app", "nginx"));
    journal.begin(JournalOp::Create, &app, 0).unwrap();

    let mock = Arc::new(MockPlatform::new());
    let engine = engine(state.path(), &mock);

    let record = engine.inspect("container.app").unwrap();
    assert_eq!(record.state, ResourceState::CreateFailed);
    assert_eq!(record.last_error.as_deref(), Some("create was interrupted"));
    assert!(journal.list_incomplete().unwrap().is_empty());
}

#[test]
fn interrupted_create_can_be_destroyed() {
    let state = tempfile::tempdir().unwrap();
    let (_layout, journal) = initialized(state.path());
    let net = Resource::Network(Network::new("net", "10.0.0.0/16"));
    journal.begin(JournalOp::Create, &net, 0).unwrap();

    // The crash happened after the platform call went through.
    let mock = Arc::new(MockPlatform::new());
    mock.ensure(&PlatformObject::new(ObjectKind::Network, "net").with("subnet", "10.0.0.0/16"))
        .unwrap();

    let engine = engine(state.path(), &mock);
    let report = engine.destroy_recorded().unwrap();
    assert_eq!(report.destroyed.len(), 1);
    assert!(!mock.contains(ObjectKind::Network, "net"));
    assert!(engine.list().unwrap().is_empty());
}

#[test]
fn interrupted_destroy_keeps_record() {
    let state = tempfile::tempdir().unwrap();
    let (layout, journal) = initialized(state.path());
    let store = StateStore::new(layout);
    let net = Resource::Network(Network::new("net", "10.0.0.0/16"));
    store
        .put(&ResourceRecord::new(net.clone(), ResourceState::Created, 0))
        .unwrap();
    journal.begin(JournalOp::Destroy, &net, 0).unwrap();

    let mock = Arc::new(MockPlatform::new());
    let engine = engine(state.path(), &mock);

    let record = engine.inspect("network.net").unwrap();
    assert_eq!(record.state, ResourceState::Created);
    assert_eq!(record.last_error.as_deref(), Some("destroy was interrupted"));
}

#[test]
fn recovery_waits_for_the_state_lock() {
    let state = tempfile::tempdir().unwrap();
    let (layout, journal) = initialized(state.path());
    journal
        .begin(
            JournalOp::Create,
            &Resource::Container(Container::new("app", "nginx")),
            0,
        )
        .unwrap();

    let mock = Arc::new(MockPlatform::new());
    {
        let _lock = StateLock::acquire(&layout).unwrap();
        let engine = engine(state.path(), &mock);
        assert_eq!(journal.list_incomplete().unwrap().len(), 1);
        assert!(engine.inspect("container.app").is_err());
    }

    let engine = engine(state.path(), &mock);
    assert!(journal.list_incomplete().unwrap().is_empty());
    assert_eq!(
        engine.inspect("container.app").unwrap().state,
        ResourceState::CreateFailed
    );
}

#[test]
fn uninitialized_state_is_left_untouched() {
    let state = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockPlatform::new());
    let engine = engine(state.path(), &mock);

    assert!(engine.list().unwrap().is_empty());
    assert!(!engine.state_layout().is_initialized());
}
