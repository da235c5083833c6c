//! First-boot registration and identity persistence.

use plantops::app::controller::Flow;
use plantops::app::events::AppEvent;
use plantops::app::model::RestartReason;
use plantops::app::ports::{HttpError, StorageError};
use plantops::error::ProvisionError;

use crate::mocks::*;

fn first_boot(http: MockHttp) -> Rig {
    Rig::new(
        MockLink::provisioned(),
        MockStorage::default(),
        http,
        MockBroker::default(),
    )
}

#[test]
fn first_boot_registers_and_persists() {
    let mut rig = first_boot(MockHttp::registered());

    assert_eq!(rig.boot(), Flow::Continue);

    let requests = rig.http.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "http://192.168.1.100:8000/api/devices/register");
    let body: serde_json::Value = serde_json::from_str(&requests[0].1).unwrap();
    assert_eq!(body["mac_address"], MAC_STR);
    assert_eq!(body["firmware_version"], TEST_VERSION);

    assert_eq!(rig.storage.get("device_id").as_deref(), Some("dev-42"));
    assert_eq!(rig.storage.get("mqtt_user").as_deref(), Some("node42"));
    assert_eq!(rig.storage.get("mqtt_pass").as_deref(), Some("s3cret"));
    assert!(rig.sink.contains(&AppEvent::Registered));
    assert_eq!(rig.broker.handshake_count(), 1);
}

#[test]
fn device_id_is_written_last() {
    let mut rig = first_boot(MockHttp::registered());
    rig.boot();

    assert_eq!(
        rig.storage.ops(),
        vec![
            StorageOp::Write("mqtt_user".into()),
            StorageOp::Write("mqtt_pass".into()),
            StorageOp::Write("device_id".into()),
        ]
    );
}

#[test]
fn http_200_is_accepted() {
    let mut rig = first_boot(MockHttp::responding(
        200,
        r#"{"device_id":"dev-7","mqtt_username":"u7","mqtt_password":"p7","extra":true}"#,
    ));

    assert_eq!(rig.boot(), Flow::Continue);
    assert_eq!(rig.controller.identity().device_id(), "dev-7");
}

#[test]
fn error_status_restarts_without_persisting() {
    let mut rig = first_boot(MockHttp::responding(500, "oops"));

    assert_eq!(rig.boot(), Flow::Restart(RestartReason::RegistrationFailed));

    assert!(rig
        .sink
        .contains(&AppEvent::ProvisioningFailed(ProvisionError::Status(500))));
    assert!(rig.storage.ops().is_empty());
    assert_eq!(rig.clock.restarts, vec![RestartReason::RegistrationFailed]);
    assert_eq!(rig.clock.delays, vec![30_000]);
    assert_eq!(rig.broker.handshake_count(), 0);
}

#[test]
fn transport_failure_restarts() {
    let mut rig = first_boot(MockHttp::with(Err(HttpError::Timeout)));

    assert_eq!(rig.boot(), Flow::Restart(RestartReason::RegistrationFailed));
    assert!(rig.sink.contains(&AppEvent::ProvisioningFailed(
        ProvisionError::Transport(HttpError::Timeout)
    )));
    assert_eq!(rig.http.requests().len(), 1);
}

#[test]
fn malformed_body_restarts() {
    let mut rig = first_boot(MockHttp::responding(201, "<html>not json</html>"));

    assert_eq!(rig.boot(), Flow::Restart(RestartReason::RegistrationFailed));
    assert!(rig
        .sink
        .contains(&AppEvent::ProvisioningFailed(ProvisionError::MalformedBody)));
}

#[test]
fn empty_credential_is_rejected() {
    let mut rig = first_boot(MockHttp::responding(
        201,
        r#"{"device_id":"dev-1","mqtt_username":"u","mqtt_password":""}"#,
    ));

    assert_eq!(rig.boot(), Flow::Restart(RestartReason::RegistrationFailed));
    assert!(rig
        .sink
        .contains(&AppEvent::ProvisioningFailed(ProvisionError::IncompleteResponse)));
    assert!(rig.storage.get("device_id").is_none());
}

#[test]
fn failed_persist_rolls_back_and_restarts() {
    let mut rig = first_boot(MockHttp::registered());
    rig.storage.fail_writes_to("device_id");

    assert_eq!(rig.boot(), Flow::Restart(RestartReason::PersistFailed));

    assert!(rig.storage.get("mqtt_user").is_none());
    assert!(rig.storage.get("mqtt_pass").is_none());
    assert!(rig.storage.get("device_id").is_none());
    assert_eq!(
        rig.storage.ops(),
        vec![
            StorageOp::Write("mqtt_user".into()),
            StorageOp::Write("mqtt_pass".into()),
            StorageOp::Delete("mqtt_user".into()),
            StorageOp::Delete("mqtt_pass".into()),
        ]
    );
    assert!(rig.sink.contains(&AppEvent::ProvisioningFailed(ProvisionError::Storage(
        StorageError::Full
    ))));
    assert_eq!(rig.broker.handshake_count(), 0);
}

#[test]
fn incomplete_record_is_cleared_and_reregistered() {
    let storage = MockStorage::default();
    storage.seed("device_id", "stale");
    let mut rig = Rig::new(
        MockLink::provisioned(),
        storage,
        MockHttp::registered(),
        MockBroker::default(),
    );

    assert_eq!(rig.boot(), Flow::Continue);

    assert!(rig
        .sink
        .contains(&AppEvent::ProvisioningFailed(ProvisionError::IncompleteRecord)));
    assert_eq!(
        rig.storage.ops().first(),
        Some(&StorageOp::EraseNamespace("plantops".into()))
    );
    assert_eq!(rig.http.requests().len(), 1);
    assert_eq!(rig.storage.get("device_id").as_deref(), Some("dev-42"));
}

#[test]
fn second_boot_restores_what_first_boot_persisted() {
    let storage = MockStorage::default();
    let mut first = Rig::new(
        MockLink::provisioned(),
        storage.clone(),
        MockHttp::registered(),
        MockBroker::default(),
    );
    assert_eq!(first.boot(), Flow::Continue);

    let mut second = Rig::new(
        MockLink::provisioned(),
        storage,
        MockHttp::responding(500, ""),
        MockBroker::default(),
    );
    assert_eq!(second.boot(), Flow::Continue);

    assert!(second.http.requests().is_empty());
    assert!(second.sink.contains(&AppEvent::IdentityRestored));
    assert_eq!(second.controller.identity(), first.controller.identity());
}
