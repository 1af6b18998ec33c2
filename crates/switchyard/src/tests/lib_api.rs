//! Tests that exercise the crate's public re-exports.

use std::sync::Arc;

use rstest::rstest;

use switchyard_config::Config;

use crate::{
    AdapterState, DispatchStatus, FailureKind, Identity, Reply, Request, StaticConfigLoader,
    UserFailure, WireReply, bootstrap_with, sync_servant,
};

use super::support::{HealthEvent, REPLY_TIMEOUT, RecordingHealthReporter, reply_probe};

#[rstest]
fn communicator_reexport_creates_serving_adapters() {
    let config = Config {
        discovery_enabled: false,
        ..Config::default()
    };
    let reporter = Arc::new(RecordingHealthReporter::default());
    let communicator = bootstrap_with(&StaticConfigLoader::new(config), reporter.clone())
        .expect("bootstrap should succeed");

    let adapter = communicator
        .create_object_adapter("api")
        .expect("create adapter");
    adapter
        .add(
            Identity::new("ledger", "accounts"),
            sync_servant(|request| match request.operation() {
                "balance" => Ok(b"42".to_vec()),
                other => Err(UserFailure::new(format!("unknown operation {other}"))),
            }),
        )
        .expect("register servant");
    adapter.activate().expect("activate");

    let (sink, replies) = reply_probe();
    let request = Request::new(Identity::new("ledger", "accounts"), "audit");
    assert_eq!(adapter.dispatch(request, sink), DispatchStatus::Completed);
    let reply = replies.recv_timeout(REPLY_TIMEOUT).expect("reply");
    assert_eq!(reply.failure_kind(), Some(FailureKind::Application));
    assert_eq!(
        WireReply::from(Reply::Success(b"42".to_vec())),
        WireReply::Success {
            payload: b"42".to_vec()
        }
    );

    communicator.shutdown();
    assert_eq!(adapter.state(), AdapterState::Deactivated);
    assert!(
        reporter
            .events()
            .contains(&HealthEvent::AdapterDeactivated("api".to_owned()))
    );
}
