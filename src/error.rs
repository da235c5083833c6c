//! Domain error types for the PlantOps sensor firmware.
//!
//! Port-level errors (link, storage, HTTP, broker) live next to their traits
//! in [`crate::app::ports`].  The types here describe failures of the
//! lifecycle operations built on top of those ports.  All variants are `Copy`
//! so they can be carried in [`AppEvent`](crate::app::events::AppEvent)s
//! without allocation.
//!
//! Restart is not an error: see [`RestartReason`](crate::app::model::RestartReason).

use core::fmt;

use crate::app::ports::{BrokerError, HttpError, StorageError};

// ---------------------------------------------------------------------------
// Provisioning errors
// ---------------------------------------------------------------------------

/// Why a registration exchange or identity load did not produce an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionError {
    /// The request never got an HTTP response.
    Transport(HttpError),
    /// The backend answered with something other than 200/201.
    Status(u16),
    /// Response body was not the expected JSON object.
    MalformedBody,
    /// Response parsed but a credential field was missing, empty or too long.
    IncompleteResponse,
    /// Durable storage refused a read or write.
    Storage(StorageError),
    /// `device_id` is stored but a credential key is missing.
    IncompleteRecord,
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Status(code) => write!(f, "backend returned HTTP {code}"),
            Self::MalformedBody => write!(f, "malformed response body"),
            Self::IncompleteResponse => write!(f, "response missing identity fields"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::IncompleteRecord => write!(f, "persisted identity incomplete"),
        }
    }
}

impl From<HttpError> for ProvisionError {
    fn from(e: HttpError) -> Self {
        Self::Transport(e)
    }
}

impl From<StorageError> for ProvisionError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Publish errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// Session is not in the Connected state.
    NotConnected,
    /// Encoded frame would not fit the transport buffer.
    BufferTooSmall { needed: usize, capacity: usize },
    /// Payload could not be encoded.
    Serialization,
    /// The transport refused the message.
    Transport(BrokerError),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "session not connected"),
            Self::BufferTooSmall { needed, capacity } => {
                write!(f, "frame of {needed} bytes exceeds {capacity} byte buffer")
            }
            Self::Serialization => write!(f, "payload serialization failed"),
            Self::Transport(e) => write!(f, "transport: {e}"),
        }
    }
}

impl From<BrokerError> for PublishError {
    fn from(e: BrokerError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC read returned an error.
    AdcReadFailed,
    /// One-wire bus timed out or checksum mismatched.
    BusTimeout,
    /// I²C transaction NACKed or failed.
    I2cFailed,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// Probe was never brought up.
    NotInitialised,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::BusTimeout => write!(f, "one-wire bus timeout"),
            Self::I2cFailed => write!(f, "I2C transaction failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::NotInitialised => write!(f, "probe not initialised"),
        }
    }
}

impl std::error::Error for ProvisionError {}
impl std::error::Error for PublishError {}
impl std::error::Error for SensorError {}
