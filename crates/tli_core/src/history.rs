//! Append-only note history log.
//!
//! # Responsibility
//! - Append one YAML document per captured note.
//! - Read the log front-to-back and return a bounded tail.
//!
//! # Invariants
//! - Each document is introduced by a `---` marker line and ends with `\n`;
//!   an append after an unterminated fragment starts on a fresh line.
//! - An append either lands completely or the file is restored to its prior
//!   length and the error is returned.
//! - Decode failures are fatal unless they sit at the very end of the file
//!   (trailing blank documents, or an unterminated final document left by an
//!   interrupted append).

use crate::model::note::Record;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const DOCUMENT_MARKER: &str = "---";

pub type HistoryResult<T> = Result<T, HistoryError>;

/// History log failure.
#[derive(Debug)]
pub enum HistoryError {
    /// The log file does not exist yet.
    NotFound(PathBuf),
    Io(io::Error),
    Encode(serde_yaml::Error),
    /// A document before the end of the file could not be decoded.
    Corrupted {
        document: usize,
        source: serde_yaml::Error,
    },
    /// A blank document appeared before the end of the file.
    EmptyDocument { document: usize },
}

impl Display for HistoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "history file not found: {}", path.display()),
            Self::Io(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "cannot encode history record: {err}"),
            Self::Corrupted { document, source } => {
                write!(f, "corrupted history file at document {document}: {source}")
            }
            Self::EmptyDocument { document } => {
                write!(f, "corrupted history file: document {document} is empty")
            }
        }
    }
}

impl Error for HistoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::Corrupted { source, .. } => Some(source),
            Self::NotFound(_) | Self::EmptyDocument { .. } => None,
        }
    }
}

impl From<io::Error> for HistoryError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Durable record log contract.
pub trait HistoryStore {
    /// Appends one record to the end of the log.
    fn append(&self, record: &Record) -> HistoryResult<()>;

    /// Returns every record in append order when `n == 0`; otherwise the
    /// last `n` records, newest first.
    fn read_tail(&self, n: usize) -> HistoryResult<Vec<Record>>;
}

impl<H: HistoryStore + ?Sized> HistoryStore for &H {
    fn append(&self, record: &Record) -> HistoryResult<()> {
        (**self).append(record)
    }

    fn read_tail(&self, n: usize) -> HistoryResult<Vec<Record>> {
        (**self).read_tail(n)
    }
}

/// History log stored as consecutive YAML documents in one file.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    path: PathBuf,
}

impl FileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for FileHistoryStore {
    fn append(&self, record: &Record) -> HistoryResult<()> {
        let mut document = encode_document(record)?;
        let mut file = open_for_append(&self.path)?;
        let previous_len = file.metadata()?.len();
        if previous_len > 0 && !ends_with_newline(&mut file, previous_len)? {
            // Keep the marker on its own line after an interrupted append.
            document.insert(0, '\n');
        }

        if let Err(err) = file
            .write_all(document.as_bytes())
            .and_then(|()| file.sync_all())
        {
            if let Err(rollback) = file.set_len(previous_len) {
                error!(
                    "event=history_append module=history status=error error_code=rollback_failed error={rollback}"
                );
            }
            error!("event=history_append module=history status=error error={err}");
            return Err(err.into());
        }

        info!(
            "event=history_append module=history status=ok bytes={}",
            document.len()
        );
        Ok(())
    }

    fn read_tail(&self, n: usize) -> HistoryResult<Vec<Record>> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(HistoryError::NotFound(self.path.clone()));
            }
            Err(err) => return Err(err.into()),
        };

        let records = decode_log(&data)?;
        Ok(tail(records, n))
    }
}

fn encode_document(record: &Record) -> HistoryResult<String> {
    let yaml = serde_yaml::to_string(record).map_err(HistoryError::Encode)?;
    let mut document = String::with_capacity(yaml.len() + 8);
    document.push_str(DOCUMENT_MARKER);
    document.push('\n');
    document.push_str(&yaml);
    if !document.ends_with('\n') {
        document.push('\n');
    }
    Ok(document)
}

fn open_for_append(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).read(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

fn ends_with_newline(file: &mut File, len: u64) -> io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Decodes every document in `data`, front to back.
pub(crate) fn decode_log(data: &str) -> HistoryResult<Vec<Record>> {
    let documents = split_documents(data);
    let Some(last) = documents.iter().rposition(|doc| !doc.trim().is_empty()) else {
        return Ok(Vec::new());
    };
    let unterminated = !data.ends_with('\n');

    let mut records = Vec::with_capacity(last + 1);
    for (index, document) in documents.iter().enumerate().take(last + 1) {
        if document.trim().is_empty() {
            // A file starts with a marker, so the first chunk is normally blank.
            if index == 0 {
                continue;
            }
            return Err(HistoryError::EmptyDocument { document: index });
        }

        match serde_yaml::from_str::<Record>(document) {
            Ok(record) => records.push(record),
            Err(err) if index == last && unterminated => {
                warn!(
                    "event=history_read module=history status=partial document={index} error={err}"
                );
            }
            Err(err) => {
                error!(
                    "event=history_read module=history status=error document={index} error={err}"
                );
                return Err(HistoryError::Corrupted {
                    document: index,
                    source: err,
                });
            }
        }
    }
    Ok(records)
}

fn split_documents(data: &str) -> Vec<&str> {
    let mut documents = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    for line in data.split_inclusive('\n') {
        if line.trim_end_matches(['\n', '\r']) == DOCUMENT_MARKER {
            documents.push(&data[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }
    documents.push(&data[start..]);
    documents
}

fn tail(mut records: Vec<Record>, n: usize) -> Vec<Record> {
    if n == 0 {
        return records;
    }
    let keep = n.min(records.len());
    let mut newest = records.split_off(records.len() - keep);
    newest.reverse();
    newest
}
