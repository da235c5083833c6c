//! Factory reset via a long hold on the reset input.

use plantops::app::controller::Flow;
use plantops::app::events::AppEvent;
use plantops::app::model::RestartReason;

use crate::mocks::*;

fn assert_wiped(rig: &Rig) {
    assert!(rig.storage.get("device_id").is_none());
    assert!(rig.storage.get("mqtt_user").is_none());
    assert!(rig.storage.get("mqtt_pass").is_none());
    assert!(rig.link.state().erased);
    assert!(!rig.controller.identity().is_provisioned());
}

#[test]
fn hold_past_threshold_wipes_and_restarts() {
    let mut rig = Rig::booted();
    rig.run_until(1_000);
    rig.button.pressed = true;

    let flow = rig.run_until(30_000);

    assert_eq!(flow, Flow::Restart(RestartReason::FactoryReset));
    // First pressed sample at 1.1 s; fires once the hold exceeds 10 s.
    assert_eq!(rig.clock.now_ms, 11_200);
    assert_eq!(rig.clock.restarts, vec![RestartReason::FactoryReset]);
    assert!(rig
        .storage
        .ops()
        .contains(&StorageOp::EraseNamespace("plantops".into())));
    assert!(rig.sink.contains(&AppEvent::FactoryReset));
    assert!(rig
        .sink
        .contains(&AppEvent::Restarting(RestartReason::FactoryReset)));
    assert_wiped(&rig);
}

#[test]
fn hold_of_exactly_the_threshold_does_not_fire() {
    let mut rig = Rig::booted();
    rig.run_until(1_000);
    rig.button.pressed = true;
    assert_eq!(rig.run_until(11_100), Flow::Continue);

    rig.button.pressed = false;
    assert_eq!(rig.run_until(20_000), Flow::Continue);

    assert!(!rig.sink.contains(&AppEvent::FactoryReset));
    assert!(rig.clock.restarts.is_empty());
    assert_eq!(rig.storage.get("device_id").as_deref(), Some("dev-42"));
}

#[test]
fn release_restarts_the_hold_timer() {
    let mut rig = Rig::booted();
    rig.run_until(1_000);
    rig.button.pressed = true;
    rig.run_until(6_000);

    rig.button.pressed = false;
    rig.run_until(6_100);

    rig.button.pressed = true;
    let flow = rig.run_until(30_000);

    assert_eq!(flow, Flow::Restart(RestartReason::FactoryReset));
    assert_eq!(rig.clock.now_ms, 16_300);
}

#[test]
fn short_presses_are_ignored() {
    let mut rig = Rig::booted();
    for _ in 0..20 {
        rig.button.pressed = true;
        rig.run_until(rig.clock.now_ms + 2_000);
        rig.button.pressed = false;
        rig.run_until(rig.clock.now_ms + 200);
    }

    assert!(rig.clock.restarts.is_empty());
    assert!(!rig.link.state().erased);
}

#[test]
fn reset_works_while_offline() {
    let mut rig = Rig::new(
        MockLink::provisioned(),
        MockStorage::with_identity("dev-42", "node42", "s3cret"),
        MockHttp::registered(),
        MockBroker::refusing(-2),
    );
    assert_eq!(rig.boot(), Flow::Continue);
    rig.link.0.borrow_mut().reconnect_succeeds = false;
    rig.link.set_up(false);

    rig.button.pressed = true;
    let flow = rig.run_until(120_000);

    assert_eq!(flow, Flow::Restart(RestartReason::FactoryReset));
    assert_wiped(&rig);
}
