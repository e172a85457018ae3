//! Capture → persist → split → deliver orchestration.
//!
//! # Responsibility
//! - Drive one `todo` invocation through its state machine.
//! - Fold per-segment delivery outcomes into a report.
//!
//! # Invariants
//! - Canceled captures never reach the history store.
//! - Exactly one history append per completed capture, before any delivery.
//! - A persistence failure stops the workflow before delivery.
//! - A failed segment never prevents later segments from being attempted.

use crate::capture::{CaptureError, CaptureOutcome, InteractiveCapture};
use crate::delivery::{DeliveryClient, DeliveryError, DeliveryReceipt, RetryPolicy, Transport};
use crate::history::{HistoryError, HistoryStore};
use crate::model::note::{Note, Record};
use crate::split::split;
use chrono::Utc;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{BufRead, Write};
use std::num::NonZeroUsize;

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Fatal workflow failure.
#[derive(Debug)]
pub enum WorkflowError {
    EmptyTitle,
    Capture(CaptureError),
    /// The note could not be recorded, so delivery was not attempted.
    Persistence(HistoryError),
}

impl Display for WorkflowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "note title cannot be empty"),
            Self::Capture(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "cannot save your note: {err}"),
        }
    }
}

impl Error for WorkflowError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::EmptyTitle => None,
            Self::Capture(err) => Some(err),
            Self::Persistence(err) => Some(err),
        }
    }
}

impl From<CaptureError> for WorkflowError {
    fn from(value: CaptureError) -> Self {
        Self::Capture(value)
    }
}

/// Delivery outcome of one segment.
#[derive(Debug)]
pub struct SegmentReport {
    pub title: String,
    /// `attempt N: error` for every failed attempt, in order.
    pub failed_attempts: Vec<String>,
    pub outcome: Result<DeliveryReceipt, DeliveryError>,
}

/// Summary of a completed run.
#[derive(Debug)]
pub struct WorkflowReport {
    /// The record appended to history.
    pub record: Record,
    /// One entry per segment, in delivery order.
    pub segments: Vec<SegmentReport>,
}

impl WorkflowReport {
    pub fn delivered(&self) -> usize {
        self.segments.iter().filter(|s| s.outcome.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SegmentReport> {
        self.segments.iter().filter(|s| s.outcome.is_err())
    }

    pub fn all_delivered(&self) -> bool {
        self.segments.iter().all(|s| s.outcome.is_ok())
    }
}

#[derive(Debug)]
pub enum WorkflowOutcome {
    Canceled,
    Done(WorkflowReport),
}

/// Orchestrates one note from capture to delivery.
pub struct NoteWorkflow<H: HistoryStore, T: Transport> {
    history: H,
    delivery: DeliveryClient<T>,
    retry: RetryPolicy,
    max_segment_size: NonZeroUsize,
}

impl<H: HistoryStore, T: Transport> NoteWorkflow<H, T> {
    pub fn new(
        history: H,
        delivery: DeliveryClient<T>,
        retry: RetryPolicy,
        max_segment_size: NonZeroUsize,
    ) -> Self {
        Self {
            history,
            delivery,
            retry,
            max_segment_size,
        }
    }

    /// Captures a note for `title`, records it and delivers its segments.
    ///
    /// # Errors
    /// - `WorkflowError::EmptyTitle` for a blank title.
    /// - `WorkflowError::Capture` when prompting fails.
    /// - `WorkflowError::Persistence` when history append fails; no delivery
    ///   is attempted in that case.
    pub async fn run<R, W>(
        &self,
        title: &str,
        capture: InteractiveCapture<R, W>,
    ) -> WorkflowResult<WorkflowOutcome>
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        if title.trim().is_empty() {
            return Err(WorkflowError::EmptyTitle);
        }

        match capture.capture(title).await? {
            CaptureOutcome::Canceled => {
                info!("event=workflow module=workflow status=canceled");
                Ok(WorkflowOutcome::Canceled)
            }
            CaptureOutcome::Completed(note) => {
                self.record_and_deliver(&note).map(WorkflowOutcome::Done)
            }
        }
    }

    /// Persists `note` then delivers every segment.
    pub fn record_and_deliver(&self, note: &Note) -> WorkflowResult<WorkflowReport> {
        let record = Record::from_note(note, Utc::now());
        self.history
            .append(&record)
            .map_err(WorkflowError::Persistence)?;

        let segments = split(&record.title, &record.body, self.max_segment_size);
        let total = segments.len();
        let reports: Vec<SegmentReport> = segments
            .into_iter()
            .enumerate()
            .map(|(index, segment)| {
                let mut failed_attempts = Vec::new();
                let outcome = self.delivery.send_observed(&segment, &self.retry, |attempt, err| {
                    failed_attempts.push(format!("attempt {attempt}: {err}"));
                });
                if let Err(err) = &outcome {
                    warn!(
                        "event=workflow_segment module=workflow status=error segment={}/{total} error={err}",
                        index + 1
                    );
                }
                SegmentReport {
                    title: segment.title,
                    failed_attempts,
                    outcome,
                }
            })
            .collect();

        let report = WorkflowReport {
            record,
            segments: reports,
        };
        info!(
            "event=workflow module=workflow status=done segments={total} delivered={}",
            report.delivered()
        );
        Ok(report)
    }
}
