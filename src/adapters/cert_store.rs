//! Broker trust anchor.
//!
//! The broker presents a server certificate signed by the PlantOps CA.
//! The CA is compiled into the image (`certs/plantops_ca.pem`) and
//! handed to mbedTLS as a NUL-terminated PEM string; there are no client
//! certificates.

use log::info;

/// Maximum trust-anchor size (PEM format, includes headers).
const MAX_CERT_SIZE: usize = 4096;

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// The PlantOps CA, NUL-terminated for mbedTLS.
pub const PLANTOPS_CA_PEM: &str = concat!(include_str!("../../certs/plantops_ca.pem"), "\0");

/// Errors from trust-anchor checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertStoreError {
    /// No certificate material at all.
    Empty,
    /// Missing the PEM armour lines.
    NotPem,
    /// mbedTLS needs a trailing NUL.
    NotTerminated,
    /// Larger than any CA we ship.
    TooLarge,
}

impl core::fmt::Display for CertStoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Empty => write!(f, "CA certificate empty"),
            Self::NotPem => write!(f, "CA certificate is not PEM"),
            Self::NotTerminated => write!(f, "CA certificate not NUL-terminated"),
            Self::TooLarge => write!(f, "CA certificate exceeds {} bytes", MAX_CERT_SIZE),
        }
    }
}

/// Check that `pem` is a single NUL-terminated PEM certificate.
pub fn validate_ca_pem(pem: &str) -> Result<(), CertStoreError> {
    if pem.trim_end_matches('\0').trim().is_empty() {
        return Err(CertStoreError::Empty);
    }
    if pem.len() > MAX_CERT_SIZE {
        return Err(CertStoreError::TooLarge);
    }
    let Some(body) = pem.strip_suffix('\0') else {
        return Err(CertStoreError::NotTerminated);
    };
    let body = body.trim();
    if !body.starts_with(PEM_BEGIN) || !body.ends_with(PEM_END) {
        return Err(CertStoreError::NotPem);
    }
    info!("MQTT: CA certificate {}B", pem.len());
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────
