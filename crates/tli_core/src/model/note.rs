//! Note, segment and history record domain model.
//!
//! # Responsibility
//! - Define the transient capture unit (`Note`) and its deliverable slices
//!   (`Segment`).
//! - Define the durable history representation (`Record`).
//!
//! # Invariants
//! - A `Note` is immutable once capture completes.
//! - One `Record` exists per completed capture, never per segment.
//! - `Record::body` is the note body joined with `\n`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A captured title plus multi-line body awaiting persistence and delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    title: String,
    body: Vec<String>,
}

impl Note {
    /// Creates a note from a title and ordered body lines.
    pub fn new(title: impl Into<String>, body: Vec<String>) -> Self {
        Self {
            title: title.into(),
            body,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &[String] {
        &self.body
    }

    /// Returns body lines joined with `\n`, the form used for persistence
    /// and splitting.
    pub fn joined_body(&self) -> String {
        self.body.join("\n")
    }
}

/// A size-bounded, transmittable slice of a note body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Note title, suffixed with ` (n)` when the note was split.
    pub title: String,
    pub text: String,
}

/// Durable, append-only history entry for one captured note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Capture completion instant.
    pub time: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

impl Record {
    /// Builds the history record for a completed note.
    pub fn from_note(note: &Note, time: DateTime<Utc>) -> Self {
        Self {
            time,
            title: note.title.clone(),
            body: note.joined_body(),
        }
    }
}
