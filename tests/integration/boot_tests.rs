//! Boot sequence: link bring-up, identity restore, broker session.

use plantops::app::controller::Flow;
use plantops::app::events::AppEvent;
use plantops::app::model::{ConnectivityState, RestartReason, SessionState};

use crate::mocks::*;

#[test]
fn boot_with_stored_identity_skips_registration() {
    let mut rig = Rig::provisioned();

    assert_eq!(rig.boot(), Flow::Continue);

    assert!(rig.http.requests().is_empty());
    assert!(rig.sink.contains(&AppEvent::IdentityRestored));
    assert_eq!(rig.controller.identity().device_id(), "dev-42");
    assert_eq!(rig.controller.identity().hardware_address(), MAC_STR);
    assert_eq!(rig.controller.session().state(), SessionState::Connected);
    assert!(rig.clock.restarts.is_empty());
}

#[test]
fn boot_events_are_ordered() {
    let mut rig = Rig::provisioned();
    rig.boot();

    assert_eq!(
        rig.sink.events.first(),
        Some(&AppEvent::Booting { firmware_version: TEST_VERSION })
    );
    assert_eq!(rig.sink.events.last(), Some(&AppEvent::Ready));

    let link_up = rig
        .sink
        .events
        .iter()
        .position(|e| {
            *e == AppEvent::LinkChanged {
                from: ConnectivityState::Connecting,
                to: ConnectivityState::Connected,
            }
        })
        .expect("link came up");
    let restored = rig
        .sink
        .events
        .iter()
        .position(|e| *e == AppEvent::IdentityRestored)
        .expect("identity restored");
    let session_up = rig
        .sink
        .events
        .iter()
        .position(|e| {
            *e == AppEvent::SessionChanged {
                from: SessionState::Connecting,
                to: SessionState::Connected,
            }
        })
        .expect("session came up");
    assert!(link_up < restored && restored < session_up);
}

#[test]
fn boot_binds_broker_to_identity() {
    let mut rig = Rig::provisioned();
    rig.boot();

    let broker = rig.broker.0.borrow();
    assert_eq!(
        broker.configured,
        Some(Configured {
            host: "192.168.1.100".into(),
            port: 8883,
            buffer_bytes: 512,
        })
    );
    assert_eq!(
        broker.handshakes,
        vec![(
            String::from("plantops-dev-42"),
            String::from("node42"),
            String::from("s3cret"),
        )]
    );
    drop(broker);

    assert_eq!(rig.controller.session().telemetry_topic(), "devices/dev-42/telemetry");
    assert_eq!(rig.controller.session().heartbeat_topic(), "devices/dev-42/heartbeat");
}

#[test]
fn boot_without_link_restarts_once() {
    let mut rig = Rig::new(
        MockLink::fresh(false),
        MockStorage::with_identity("dev-42", "node42", "s3cret"),
        MockHttp::registered(),
        MockBroker::default(),
    );

    assert_eq!(rig.boot(), Flow::Restart(RestartReason::NoConnectivity));

    assert_eq!(rig.clock.restarts, vec![RestartReason::NoConnectivity]);
    assert_eq!(rig.clock.delays, vec![30_000]);
    assert_eq!(
        rig.link.state().portal_runs,
        vec![("PlantOps-Sensor".to_string(), 180)]
    );
    assert!(rig.http.requests().is_empty());
    assert_eq!(rig.broker.handshake_count(), 0);
    assert!(!rig.sink.contains(&AppEvent::Ready));
    assert!(rig
        .sink
        .contains(&AppEvent::Restarting(RestartReason::NoConnectivity)));
}

#[test]
fn failed_stored_credentials_fall_back_to_portal() {
    let link = MockLink::provisioned();
    {
        let mut s = link.0.borrow_mut();
        s.stored_connects = false;
        s.portal_connects = true;
    }
    let mut rig = Rig::new(
        link,
        MockStorage::with_identity("dev-42", "node42", "s3cret"),
        MockHttp::registered(),
        MockBroker::default(),
    );

    assert_eq!(rig.boot(), Flow::Continue);

    assert_eq!(rig.link.state().portal_runs.len(), 1);
    assert!(rig.sink.contains(&AppEvent::LinkChanged {
        from: ConnectivityState::Connecting,
        to: ConnectivityState::ProvisioningPortalActive,
    }));
    assert_eq!(rig.controller.connectivity().status(), ConnectivityState::Connected);
}

#[test]
fn broker_failure_at_boot_is_not_fatal() {
    let mut rig = Rig::new(
        MockLink::provisioned(),
        MockStorage::with_identity("dev-42", "node42", "s3cret"),
        MockHttp::registered(),
        MockBroker::refusing(-2),
    );

    assert_eq!(rig.boot(), Flow::Continue);

    assert!(rig.sink.contains(&AppEvent::SessionConnectFailed(-2)));
    assert!(rig.sink.contains(&AppEvent::Ready));
    assert_eq!(rig.controller.session().state(), SessionState::Disconnected);
    assert_eq!(rig.controller.session().last_error_code(), Some(-2));
    assert!(rig.clock.restarts.is_empty());
}

#[test]
fn sensor_init_failure_is_not_fatal() {
    let mut rig = Rig::provisioned();
    rig.sensors.init_ok = false;

    assert_eq!(rig.boot(), Flow::Continue);
    assert!(rig.sink.contains(&AppEvent::Ready));
}
