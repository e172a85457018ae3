//! Segment delivery with a bounded retry budget.
//!
//! # Responsibility
//! - Format segments into envelopes and hand them to a `Transport`.
//! - Retry failed sends sequentially up to a fixed attempt count.
//!
//! # Invariants
//! - One attempt completes before the next begins.
//! - Every failed attempt is logged; none aborts the loop early.
//! - After exhausting the budget the last transport error is returned.

pub mod envelope;
pub mod smtp;
pub mod subject;

pub use envelope::{Envelope, MailIdentity, Transport, TransportError};

use crate::model::note::Segment;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::num::NonZeroU32;
use std::time::Duration;

/// Default number of send attempts per segment.
pub const DEFAULT_MAX_ATTEMPTS: NonZeroU32 = match NonZeroU32::new(5) {
    Some(attempts) => attempts,
    None => unreachable!(),
};

/// Attempt budget and pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: NonZeroU32,
    /// Sleep between consecutive attempts. Zero means retry immediately.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::ZERO,
        }
    }
}

/// Successful delivery of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Segment delivery failure.
#[derive(Debug)]
pub enum DeliveryError {
    /// Every attempt failed; `last` is the final attempt's error.
    Exhausted { attempts: u32, last: TransportError },
}

impl Display for DeliveryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted { attempts, last } => {
                write!(f, "delivery failed after {attempts} attempts: {last}")
            }
        }
    }
}

impl Error for DeliveryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
        }
    }
}

/// Sends note segments to one fixed inbox.
pub struct DeliveryClient<T: Transport> {
    transport: T,
    identity: MailIdentity,
}

impl<T: Transport> DeliveryClient<T> {
    pub fn new(transport: T, identity: MailIdentity) -> Self {
        Self {
            transport,
            identity,
        }
    }

    pub fn identity(&self) -> &MailIdentity {
        &self.identity
    }

    /// Makes a single delivery attempt.
    pub fn send(&self, segment: &Segment) -> Result<(), TransportError> {
        let envelope = Envelope::for_segment(segment, &self.identity);
        self.transport.send(&envelope)
    }

    /// Attempts delivery up to `max_attempts` times with no pause.
    pub fn send_with_retry(
        &self,
        segment: &Segment,
        max_attempts: NonZeroU32,
    ) -> DeliveryResult<DeliveryReceipt> {
        self.send_with_policy(
            segment,
            &RetryPolicy {
                max_attempts,
                delay: Duration::ZERO,
            },
        )
    }

    /// Attempts delivery following `policy`.
    ///
    /// # Errors
    /// - Returns `DeliveryError::Exhausted` carrying the last transport error
    ///   once every attempt has failed.
    pub fn send_with_policy(
        &self,
        segment: &Segment,
        policy: &RetryPolicy,
    ) -> DeliveryResult<DeliveryReceipt> {
        self.send_observed(segment, policy, |_, _| {})
    }

    /// Same as `send_with_policy`, calling `on_failure` with the attempt
    /// number and error of every failed attempt, the last one included.
    pub fn send_observed<F>(
        &self,
        segment: &Segment,
        policy: &RetryPolicy,
        mut on_failure: F,
    ) -> DeliveryResult<DeliveryReceipt>
    where
        F: FnMut(u32, &TransportError),
    {
        let max_attempts = policy.max_attempts.get();
        let mut attempt = 1;
        loop {
            match self.send(segment) {
                Ok(()) => {
                    info!(
                        "event=deliver module=delivery status=ok attempt={attempt} bytes={}",
                        segment.text.len()
                    );
                    return Ok(DeliveryReceipt { attempts: attempt });
                }
                Err(err) if attempt >= max_attempts => {
                    on_failure(attempt, &err);
                    warn!(
                        "event=deliver module=delivery status=error attempt={attempt} max_attempts={max_attempts} error={err}"
                    );
                    return Err(DeliveryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                Err(err) => {
                    on_failure(attempt, &err);
                    warn!(
                        "event=deliver module=delivery status=retry attempt={attempt} max_attempts={max_attempts} error={err}"
                    );
                }
            }
            if !policy.delay.is_zero() {
                std::thread::sleep(policy.delay);
            }
            attempt += 1;
        }
    }
}
