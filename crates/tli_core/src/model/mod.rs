//! Domain model for captured notes and their durable history.
//!
//! # Responsibility
//! - Define the transient capture and delivery shapes.
//! - Define the append-only history record.

pub mod note;
