//! Mail envelope construction and the transport capability.
//!
//! # Responsibility
//! - Turn a segment plus sender/recipient identity into a wire message.
//! - Define the `Transport` seam the delivery client sends through.

use super::subject::encode_subject;
use crate::model::note::Segment;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const CONTENT_TYPE: &str = "text/plain; charset=\"UTF-8\"";

/// Sender and recipient identity shared by every envelope of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailIdentity {
    /// Display name in the `From` header.
    pub from_display: String,
    pub from_address: String,
    pub to_address: String,
}

/// Fully formatted message handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Already RFC 2047 encoded.
    pub subject: String,
    pub from_display: String,
    pub from_address: String,
    pub to_address: String,
    pub content_type: String,
    pub body: String,
}

impl Envelope {
    /// Builds the envelope for one segment.
    pub fn for_segment(segment: &Segment, identity: &MailIdentity) -> Self {
        Self {
            subject: encode_subject(&segment.title),
            from_display: identity.from_display.clone(),
            from_address: identity.from_address.clone(),
            to_address: identity.to_address.clone(),
            content_type: CONTENT_TYPE.to_string(),
            body: segment.text.clone(),
        }
    }

    /// Renders headers (CRLF terminated), a blank line and the raw body.
    pub fn to_wire(&self) -> Vec<u8> {
        format!(
            "Subject: {}\r\nFrom: {} <{}>\r\nTo: {}\r\nContent-Type: {}\r\n\r\n{}",
            self.subject,
            self.from_display,
            self.from_address,
            self.to_address,
            self.content_type,
            self.body
        )
        .into_bytes()
    }
}

/// Error reported by a transport for one send attempt.
#[derive(Debug)]
pub struct TransportError {
    message: String,
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {source}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn Error + 'static))
    }
}

/// Send primitive the delivery client invokes for every attempt.
pub trait Transport {
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        (**self).send(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::{Envelope, MailIdentity};
    use crate::model::note::Segment;

    fn identity() -> MailIdentity {
        MailIdentity {
            from_display: "Ada".to_string(),
            from_address: "ada@example.com".to_string(),
            to_address: "add-to-things@things.example".to_string(),
        }
    }

    #[test]
    fn wire_format_has_crlf_headers_and_blank_line() {
        let segment = Segment {
            title: "Groceries".to_string(),
            text: "milk\neggs".to_string(),
        };
        let envelope = Envelope::for_segment(&segment, &identity());
        let wire = String::from_utf8(envelope.to_wire()).unwrap();
        assert_eq!(
            wire,
            "Subject: Groceries\r\n\
             From: Ada <ada@example.com>\r\n\
             To: add-to-things@things.example\r\n\
             Content-Type: text/plain; charset=\"UTF-8\"\r\n\
             \r\n\
             milk\neggs"
        );
    }

    #[test]
    fn subject_is_encoded_when_title_has_specials() {
        let segment = Segment {
            title: "Buy milk, eggs".to_string(),
            text: String::new(),
        };
        let envelope = Envelope::for_segment(&segment, &identity());
        assert!(envelope.subject.starts_with("=?UTF-8?B?"));
    }
}
