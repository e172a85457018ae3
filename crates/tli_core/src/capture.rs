//! Cancellable, line-oriented interactive note capture.
//!
//! # Responsibility
//! - Prompt for and read body lines on a dedicated reader thread.
//! - Race incoming lines against an external interrupt signal.
//! - Produce exactly one outcome per call: a completed `Note` or `Canceled`.
//!
//! # Invariants
//! - Line and interrupt producers feed one single-consumer event channel.
//! - End-of-input is treated exactly like an interrupt.
//! - No partial body is returned on cancellation.

use crate::model::note::Note;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::io::{self, BufRead, BufReader, Write};
use std::pin::Pin;
use tokio::sync::mpsc;

/// Banner written once before the first prompt.
pub const CAPTURE_BANNER: &str = "(Enter an empty line to complete; Ctrl+C/Ctrl+D to cancel)";
/// Prompt written before every line read.
pub const CAPTURE_PROMPT: &str = "> ";

// Room for a queued line plus a pending interrupt.
const EVENT_CHANNEL_CAPACITY: usize = 8;

/// Future that resolves when the user asks to abort capture.
pub type InterruptSignal = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Capture failure that is not a user cancellation.
#[derive(Debug)]
pub enum CaptureError {
    /// Writing the instructional banner failed.
    Output(io::Error),
}

impl Display for CaptureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Output(err) => write!(f, "failed to write capture prompt: {err}"),
        }
    }
}

impl Error for CaptureError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Output(err) => Some(err),
        }
    }
}

impl From<io::Error> for CaptureError {
    fn from(value: io::Error) -> Self {
        Self::Output(value)
    }
}

/// Result of one capture call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Completed(Note),
    Canceled,
}

#[derive(Debug)]
enum CaptureEvent {
    Line(String),
    Finished,
    Interrupted,
}

/// Interactive capture bound to an input stream, a prompt sink and an
/// interrupt source.
pub struct InteractiveCapture<R, W> {
    input: R,
    output: W,
    interrupt: InterruptSignal,
}

impl InteractiveCapture<BufReader<io::Stdin>, io::Stdout> {
    /// Capture from the process stdin/stdout, cancelled by Ctrl+C.
    ///
    /// Must be called inside a tokio runtime.
    pub fn stdio() -> Self {
        Self::new(
            BufReader::new(io::stdin()),
            io::stdout(),
            terminal_interrupt(),
        )
    }
}

/// Ctrl+C as an `InterruptSignal`. The handler is installed before this
/// returns, so an early Ctrl+C cancels instead of killing the process.
#[cfg(unix)]
fn terminal_interrupt() -> InterruptSignal {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::interrupt()) {
        Ok(mut sigint) => Box::pin(async move {
            let _ = sigint.recv().await;
        }),
        Err(err) => {
            // Without a handler, Ctrl+D is the only way out.
            warn!("event=capture_signal module=capture status=error error={err}");
            Box::pin(std::future::pending())
        }
    }
}

#[cfg(not(unix))]
fn terminal_interrupt() -> InterruptSignal {
    Box::pin(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("event=capture_signal module=capture status=error error={err}");
            std::future::pending::<()>().await;
        }
    })
}

impl<R, W> InteractiveCapture<R, W>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    pub fn new(input: R, output: W, interrupt: InterruptSignal) -> Self {
        Self {
            input,
            output,
            interrupt,
        }
    }

    /// Reads body lines for `title` until an empty line, an interrupt or
    /// end-of-input.
    ///
    /// # Errors
    /// - Returns `CaptureError::Output` when the banner cannot be written.
    pub async fn capture(self, title: &str) -> CaptureResult<CaptureOutcome> {
        let Self {
            input,
            mut output,
            interrupt,
        } = self;

        writeln!(output, "{CAPTURE_BANNER}")?;
        output.flush()?;

        let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let interrupt_tx = tx.clone();
        let watcher = tokio::spawn(async move {
            interrupt.await;
            let _ = interrupt_tx.send(CaptureEvent::Interrupted).await;
        });

        // Detached: stdin reads cannot be cancelled, so the thread is
        // abandoned on interrupt and exits on its next failed send.
        std::thread::spawn(move || read_lines(input, output, tx));

        let mut body = Vec::new();
        let outcome = loop {
            match rx.recv().await {
                Some(CaptureEvent::Line(line)) => body.push(line),
                Some(CaptureEvent::Finished) => {
                    break CaptureOutcome::Completed(Note::new(title, body));
                }
                Some(CaptureEvent::Interrupted) | None => break CaptureOutcome::Canceled,
            }
        };
        watcher.abort();

        match &outcome {
            CaptureOutcome::Completed(note) => info!(
                "event=capture module=capture status=ok lines={}",
                note.body().len()
            ),
            CaptureOutcome::Canceled => {
                info!("event=capture module=capture status=canceled")
            }
        }
        Ok(outcome)
    }
}

fn read_lines<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    tx: mpsc::Sender<CaptureEvent>,
) {
    loop {
        if write!(output, "{CAPTURE_PROMPT}")
            .and_then(|()| output.flush())
            .is_err()
        {
            debug!("event=capture_prompt module=capture status=error");
        }

        let mut line = String::new();
        let event = match input.read_line(&mut line) {
            Ok(0) => CaptureEvent::Interrupted,
            Ok(_) => {
                trim_line_ending(&mut line);
                if line.is_empty() {
                    CaptureEvent::Finished
                } else {
                    CaptureEvent::Line(line)
                }
            }
            Err(err) => {
                warn!("event=capture_read module=capture status=error error={err}");
                CaptureEvent::Interrupted
            }
        };

        let last = !matches!(event, CaptureEvent::Line(_));
        if tx.blocking_send(event).is_err() || last {
            return;
        }
    }
}

fn trim_line_ending(line: &mut String) {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
}
