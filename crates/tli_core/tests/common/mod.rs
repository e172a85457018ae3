//! Shared fakes for capture, history and transport tests.
#![allow(dead_code)]

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use tli_core::{
    Envelope, HistoryError, HistoryResult, HistoryStore, InterruptSignal, Record, Transport,
    TransportError,
};
use tokio::sync::oneshot;

/// Input stream fed line by line from the test; blocks until data arrives
/// and reports end-of-input once the sender is dropped.
pub struct ChannelInput {
    rx: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl ChannelInput {
    pub fn new() -> (mpsc::Sender<Vec<u8>>, io::BufReader<Self>) {
        let (tx, rx) = mpsc::channel();
        let input = Self {
            rx,
            pending: Vec::new(),
        };
        (tx, io::BufReader::new(input))
    }
}

impl Read for ChannelInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv() {
                Ok(chunk) => self.pending = chunk,
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

/// Clonable in-memory sink for prompts.
#[derive(Clone, Default)]
pub struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn never_interrupted() -> InterruptSignal {
    Box::pin(std::future::pending())
}

/// Interrupt signal fired by sending on the returned handle.
pub fn manual_interrupt() -> (oneshot::Sender<()>, InterruptSignal) {
    let (tx, rx) = oneshot::channel();
    let signal: InterruptSignal = Box::pin(async move {
        let _ = rx.await;
    });
    (tx, signal)
}

/// Transport that fails a configurable number of attempts and records every
/// envelope it was handed.
#[derive(Default)]
pub struct FakeTransport {
    fail_first: usize,
    fail_always: bool,
    fail_body_prefix: Option<String>,
    attempts: AtomicUsize,
    sent: Mutex<Vec<Envelope>>,
}

impl FakeTransport {
    pub fn reliable() -> Self {
        Self::default()
    }

    pub fn failing_first(k: usize) -> Self {
        Self {
            fail_first: k,
            ..Self::default()
        }
    }

    pub fn always_failing() -> Self {
        Self {
            fail_always: true,
            ..Self::default()
        }
    }

    pub fn failing_bodies_starting_with(prefix: &str) -> Self {
        Self {
            fail_body_prefix: Some(prefix.to_string()),
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Envelopes of successful sends, in order.
    pub fn delivered(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let body_rejected = self
            .fail_body_prefix
            .as_deref()
            .is_some_and(|prefix| envelope.body.starts_with(prefix));
        if self.fail_always || attempt <= self.fail_first || body_rejected {
            return Err(TransportError::new(format!("attempt {attempt} refused")));
        }
        self.sent.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

/// History store whose appends always fail.
#[derive(Default)]
pub struct BrokenHistory {
    pub appends: AtomicUsize,
}

impl HistoryStore for BrokenHistory {
    fn append(&self, _record: &Record) -> HistoryResult<()> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        Err(HistoryError::Io(io::Error::new(
            io::ErrorKind::Other,
            "disk full",
        )))
    }

    fn read_tail(&self, _n: usize) -> HistoryResult<Vec<Record>> {
        Ok(Vec::new())
    }
}
