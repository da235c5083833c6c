//! Outbound application events.
//!
//! The [`LifecycleController`](super::controller::LifecycleController) emits
//! these through the [`EventSink`](super::ports::EventSink) port.  Adapters
//! on the other side decide what to do with them; on the device they go to
//! the serial log, in tests they are recorded and asserted on.

use crate::error::{ProvisionError, PublishError};

use super::model::{ConnectivityState, RestartReason, SensorReading, SessionState};

/// Structured events emitted by the lifecycle core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Boot sequence started.
    Booting { firmware_version: &'static str },

    /// The link state machine moved.
    LinkChanged { from: ConnectivityState, to: ConnectivityState },

    /// Persisted identity restored; registration skipped.
    IdentityRestored,

    /// Backend registration succeeded and the identity was persisted.
    Registered,

    /// Registration or identity restore failed.
    ProvisioningFailed(ProvisionError),

    /// The broker session state machine moved.
    SessionChanged { from: SessionState, to: SessionState },

    /// A broker handshake failed with the transport's code.
    SessionConnectFailed(i32),

    /// Telemetry snapshot published.
    TelemetryPublished(SensorReading),

    /// Telemetry cycle skipped because the reading was invalid.
    TelemetrySkipped,

    /// Heartbeat published.
    HeartbeatPublished { uptime_s: u64, rssi: i8 },

    /// A publish attempt failed.
    PublishFailed(PublishError),

    /// Boot finished; steady state begins.
    Ready,

    /// The reset input was held past the threshold.
    FactoryReset,

    /// The controller is about to restart the process.
    Restarting(RestartReason),
}
