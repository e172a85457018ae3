//! SMTP implementation of the `Transport` capability.
//!
//! # Responsibility
//! - Authenticate against the configured relay and submit pre-formatted
//!   envelopes.
//!
//! # Invariants
//! - Port 465 uses implicit TLS; every other port requires STARTTLS.
//! - DATA is sent with CRLF line endings only, so the codec can dot-stuff
//!   body lines that start with `.`.
//! - Credentials never appear in log events.

use super::envelope::{Envelope, Transport, TransportError};
use lettre::address::{Address, Envelope as SmtpEnvelope};
use lettre::transport::smtp::authentication::Credentials;
use lettre::Transport as _;
use log::debug;

const IMPLICIT_TLS_PORT: u16 = 465;

/// Relay connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Blocking SMTP transport.
pub struct SmtpTransport {
    inner: lettre::SmtpTransport,
}

impl SmtpTransport {
    /// Builds a relay transport; no connection is opened until the first send.
    ///
    /// # Errors
    /// - Returns an error when TLS parameters cannot be built for `host`.
    pub fn new(settings: &SmtpSettings) -> Result<Self, TransportError> {
        let builder = if settings.port == IMPLICIT_TLS_PORT {
            lettre::SmtpTransport::relay(&settings.host)
        } else {
            lettre::SmtpTransport::starttls_relay(&settings.host)
        }
        .map_err(|err| TransportError::with_source("cannot configure smtp relay", err))?;

        let inner = builder
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();

        debug!(
            "event=smtp_config module=delivery status=ok host={} port={}",
            settings.host, settings.port
        );
        Ok(Self { inner })
    }
}

impl Transport for SmtpTransport {
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let from: Address = envelope
            .from_address
            .parse()
            .map_err(|err| TransportError::with_source("invalid sender address", err))?;
        let to: Address = envelope
            .to_address
            .parse()
            .map_err(|err| TransportError::with_source("invalid recipient address", err))?;
        let smtp_envelope = SmtpEnvelope::new(Some(from), vec![to])
            .map_err(|err| TransportError::with_source("invalid smtp envelope", err))?;

        self.inner
            .send_raw(&smtp_envelope, &crlf_line_endings(&envelope.to_wire()))
            .map(|_| ())
            .map_err(|err| TransportError::with_source("smtp send failed", err))
    }
}

/// Rewrites bare `\n` as `\r\n`; existing CRLF pairs are left alone.
fn crlf_line_endings(wire: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(wire.len() + wire.len() / 16);
    let mut previous = None;
    for &byte in wire {
        if byte == b'\n' && previous != Some(b'\r') {
            out.push(b'\r');
        }
        out.push(byte);
        previous = Some(byte);
    }
    out
}
