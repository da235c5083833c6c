//! Steady-state loop: periodic publishing, session health, link recovery.

use plantops::app::controller::Flow;
use plantops::app::events::AppEvent;
use plantops::app::model::{ConnectivityState, SessionState};
use plantops::app::ports::BrokerError;
use plantops::error::PublishError;

use crate::mocks::*;

// ── Telemetry and heartbeat ───────────────────────────────────

#[test]
fn nothing_is_published_before_the_first_interval() {
    let mut rig = Rig::booted();
    assert_eq!(rig.run_until(59_900), Flow::Continue);

    assert!(rig.broker.topics().is_empty());
    assert_eq!(rig.sensors.reads, 0);
}

#[test]
fn telemetry_published_on_interval() {
    let mut rig = Rig::booted();
    rig.run_until(60_000);

    let telemetry = rig.broker.published_to("/telemetry");
    assert_eq!(telemetry.len(), 1);
    let t = &telemetry[0];
    assert_eq!(t["timestamp"].as_u64(), Some(60_000));
    assert_eq!(t["temperature"].as_f64(), Some(21.5));
    assert_eq!(t["humidity"].as_f64(), Some(44.0));
    assert_eq!(t["soil_moisture"].as_f64(), Some(37.5));
    assert_eq!(t["light_level"].as_f64(), Some(820.0));
    assert!(rig.broker.topics().contains(&"devices/dev-42/telemetry".to_string()));
    assert_eq!(rig.sensors.reads, 1);
}

#[test]
fn heartbeat_carries_uptime_and_rssi() {
    let mut rig = Rig::booted();
    rig.run_until(60_000);

    let heartbeat = rig.broker.published_to("/heartbeat");
    assert_eq!(heartbeat.len(), 1);
    assert_eq!(heartbeat[0]["timestamp"].as_u64(), Some(60_000));
    assert_eq!(heartbeat[0]["uptime"].as_u64(), Some(60));
    assert_eq!(heartbeat[0]["rssi"].as_i64(), Some(-61));
    assert!(rig.sink.contains(&AppEvent::HeartbeatPublished {
        uptime_s: 60,
        rssi: -61
    }));
}

#[test]
fn publishes_repeat_every_interval() {
    let mut rig = Rig::booted();
    rig.run_until(180_000);

    assert_eq!(rig.broker.published_to("/telemetry").len(), 3);
    assert_eq!(rig.broker.published_to("/heartbeat").len(), 3);
}

#[test]
fn invalid_reading_is_never_published() {
    let mut rig = Rig::booted();
    rig.sensors.reading.valid = false;
    rig.run_until(60_000);

    assert!(rig.broker.published_to("/telemetry").is_empty());
    assert_eq!(rig.sink.count(|e| *e == AppEvent::TelemetrySkipped), 1);
    assert_eq!(rig.broker.published_to("/heartbeat").len(), 1);
}

#[test]
fn sensors_are_not_sampled_without_a_session() {
    let mut rig = Rig::booted();
    rig.broker.set_reply(Err(-2));
    rig.broker.drop_session();
    rig.run_until(60_000);

    assert_eq!(rig.sensors.reads, 0);
    assert!(rig.broker.topics().is_empty());
    assert!(rig
        .sink
        .contains(&AppEvent::PublishFailed(PublishError::NotConnected)));
}

#[test]
fn late_tick_fires_each_task_once() {
    let mut rig = Rig::booted();
    rig.clock.advance(300_000);
    assert_eq!(rig.tick(), Flow::Continue);

    assert_eq!(rig.broker.published_to("/telemetry").len(), 1);
    assert_eq!(rig.broker.published_to("/heartbeat").len(), 1);

    rig.clock.advance(100);
    rig.tick();
    assert_eq!(rig.broker.published_to("/telemetry").len(), 1);
    assert_eq!(rig.broker.published_to("/heartbeat").len(), 1);

    // Next firing is one interval after the late tick, not on the old grid.
    rig.run_until(359_900);
    assert_eq!(rig.broker.published_to("/telemetry").len(), 1);
    rig.run_until(360_000);
    assert_eq!(rig.broker.published_to("/telemetry").len(), 2);
}

// ── Broker session health ─────────────────────────────────────

#[test]
fn reconnects_are_spaced_by_backoff() {
    let mut rig = Rig::booted();
    assert_eq!(rig.broker.handshake_count(), 1);

    rig.run_until(1_000);
    rig.broker.set_reply(Err(-4));
    rig.broker.drop_session();
    rig.run_until(12_000);

    // Boot handshake at 0, retries at 5 s and 10 s.
    assert_eq!(rig.broker.handshake_count(), 3);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::SessionConnectFailed(-4)), 2);
    assert_eq!(rig.controller.session().state(), SessionState::Disconnected);
    assert_eq!(rig.controller.session().last_error_code(), Some(-4));

    rig.broker.set_reply(Ok(()));
    rig.run_until(15_000);
    assert_eq!(rig.broker.handshake_count(), 4);
    assert_eq!(rig.controller.session().state(), SessionState::Connected);
    assert_eq!(rig.controller.session().last_error_code(), None);
}

#[test]
fn session_loss_is_reported() {
    let mut rig = Rig::booted();
    rig.run_until(1_000);
    rig.broker.set_reply(Err(-2));
    rig.broker.drop_session();
    rig.run_until(1_100);

    assert!(rig.sink.contains(&AppEvent::SessionChanged {
        from: SessionState::Connected,
        to: SessionState::Disconnected,
    }));
}

#[test]
fn publish_failure_does_not_force_a_reconnect() {
    let mut rig = Rig::booted();
    rig.broker.0.borrow_mut().publish_ok = false;
    rig.run_until(60_000);

    assert!(rig.sink.contains(&AppEvent::PublishFailed(PublishError::Transport(
        BrokerError::PublishRejected
    ))));
    assert_eq!(rig.broker.handshake_count(), 1);
    assert_eq!(rig.controller.session().state(), SessionState::Connected);
}

#[test]
fn broker_is_serviced_every_tick() {
    let mut rig = Rig::booted();
    rig.run_until(1_000);
    assert_eq!(rig.broker.0.borrow().services, 10);
}

// ── Link recovery ─────────────────────────────────────────────

#[test]
fn link_loss_is_noticed_on_the_next_tick() {
    let mut rig = Rig::booted();
    rig.run_until(1_000);
    rig.link.set_up(false);
    rig.run_until(1_100);

    assert_eq!(rig.controller.connectivity().status(), ConnectivityState::Disconnected);
    assert!(rig.sink.contains(&AppEvent::LinkChanged {
        from: ConnectivityState::Connected,
        to: ConnectivityState::Disconnected,
    }));
    assert_eq!(rig.link.state().reconnect_requests, 0);
}

#[test]
fn recheck_blocks_for_the_reconnect_wait() {
    let mut rig = Rig::booted();
    rig.link.0.borrow_mut().reconnect_succeeds = false;
    rig.run_until(1_000);
    rig.link.set_up(false);
    rig.run_until(5_000);

    assert_eq!(rig.link.state().reconnect_requests, 1);
    assert_eq!(rig.clock.delays, vec![5_000]);
    assert_eq!(rig.clock.now_ms, 10_000);
    assert_eq!(rig.controller.connectivity().status(), ConnectivityState::Disconnected);

    rig.link.0.borrow_mut().reconnect_succeeds = true;
    rig.clock.advance(100);
    rig.tick();
    assert_eq!(rig.link.state().reconnect_requests, 2);
    assert_eq!(rig.controller.connectivity().status(), ConnectivityState::Connected);
}

#[test]
fn first_recheck_after_a_drop_runs_on_the_next_tick() {
    let mut rig = Rig::booted();
    rig.run_until(30_000);
    rig.link.set_up(false);

    rig.clock.advance(100);
    assert_eq!(rig.tick(), Flow::Continue);

    assert_eq!(rig.link.state().reconnect_requests, 1);
    assert_eq!(rig.clock.delays, vec![5_000]);
    assert_eq!(rig.controller.connectivity().status(), ConnectivityState::Connected);
}

#[test]
fn driver_side_recovery_needs_no_reconnect() {
    let mut rig = Rig::booted();
    rig.run_until(1_000);
    rig.link.set_up(false);
    rig.run_until(1_100);
    rig.link.set_up(true);
    rig.run_until(1_200);

    assert_eq!(rig.controller.connectivity().status(), ConnectivityState::Connected);
    assert_eq!(rig.link.state().reconnect_requests, 0);
    assert!(rig.clock.delays.is_empty());
}

#[test]
fn healthy_link_is_never_probed() {
    let mut rig = Rig::booted();
    rig.run_until(30_000);

    assert_eq!(rig.link.state().reconnect_requests, 0);
    assert!(rig.clock.delays.is_empty());
}
