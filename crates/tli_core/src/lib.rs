//! Core logic for tli: capture a note in the terminal, record it in a local
//! history log, and forward it to the Things inbox by email.
//! This crate is the single source of truth for business invariants.

pub mod capture;
pub mod config;
pub mod delivery;
pub mod history;
pub mod logging;
pub mod model;
pub mod split;
pub mod workflow;

pub use capture::{CaptureError, CaptureOutcome, InteractiveCapture, InterruptSignal};
pub use config::{AppPaths, ConfigError, TliConfig};
pub use delivery::smtp::{SmtpSettings, SmtpTransport};
pub use delivery::{
    DeliveryClient, DeliveryError, DeliveryReceipt, Envelope, MailIdentity, RetryPolicy,
    Transport, TransportError,
};
pub use history::{FileHistoryStore, HistoryError, HistoryResult, HistoryStore};
pub use logging::{init_logging, LogSettings, LoggingError};
pub use model::note::{Note, Record, Segment};
pub use split::{split, DEFAULT_MAX_SEGMENT_SIZE};
pub use workflow::{NoteWorkflow, SegmentReport, WorkflowError, WorkflowOutcome, WorkflowReport};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
