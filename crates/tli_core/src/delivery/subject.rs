//! RFC 2047 encoded-word handling for mail subjects.
//!
//! # Responsibility
//! - Pick the `B` or `Q` scheme for a note title and encode it.
//! - Decode encoded subjects back to text.
//!
//! # Invariants
//! - Titles containing display-name specials always use `B` encoding.
//! - Every encoded word is at most 75 characters and holds whole UTF-8
//!   characters.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Characters that must not appear unencoded inside an encoded word in a
/// display name (RFC 2047 section 5.3).
pub const DISPLAY_NAME_SPECIALS: &str = "\"#$%&'(),.:;<>@[]^`{|}~";

const CHARSET: &str = "UTF-8";
const MAX_ENCODED_WORD_LEN: usize = 75;
// "=?UTF-8?X?" + "?="
const ENCODED_WORD_OVERHEAD: usize = CHARSET.len() + 7;
const MAX_PAYLOAD_LEN: usize = MAX_ENCODED_WORD_LEN - ENCODED_WORD_OVERHEAD;

/// Encoded-word scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordEncoding {
    /// Base64, safe for any byte sequence.
    B,
    /// Quoted-printable variant for headers.
    Q,
}

impl WordEncoding {
    fn tag(self) -> char {
        match self {
            Self::B => 'B',
            Self::Q => 'Q',
        }
    }
}

/// Returns the scheme used for `title`.
pub fn subject_encoding(title: &str) -> WordEncoding {
    if title.contains(|c: char| DISPLAY_NAME_SPECIALS.contains(c)) {
        WordEncoding::B
    } else {
        WordEncoding::Q
    }
}

/// Encodes `title` for the `Subject` header.
pub fn encode_subject(title: &str) -> String {
    match subject_encoding(title) {
        WordEncoding::B => encode_words(title, WordEncoding::B),
        WordEncoding::Q if is_plain_phrase(title) => title.to_string(),
        WordEncoding::Q => encode_words(title, WordEncoding::Q),
    }
}

/// Decodes a header value made of encoded words and plain text.
///
/// Whitespace between two adjacent encoded words is dropped, as RFC 2047
/// requires. Malformed words are kept verbatim.
pub fn decode_subject(value: &str) -> String {
    let mut decoded = String::with_capacity(value.len());
    let mut pending_space = String::new();
    let mut previous_was_word = false;

    for token in value.split_inclusive(' ') {
        let word = token.trim_end_matches(' ');
        let trailing = &token[word.len()..];
        match decode_word(word) {
            Some(text) => {
                if !previous_was_word {
                    decoded.push_str(&pending_space);
                }
                decoded.push_str(&text);
                previous_was_word = true;
            }
            None => {
                decoded.push_str(&pending_space);
                decoded.push_str(word);
                previous_was_word = false;
            }
        }
        pending_space = trailing.to_string();
    }
    decoded.push_str(&pending_space);
    decoded
}

fn is_plain_phrase(text: &str) -> bool {
    text.bytes().all(|b| b == b'\t' || (b' '..=b'~').contains(&b))
}

fn encode_words(text: &str, encoding: WordEncoding) -> String {
    let mut words = Vec::new();
    let mut payload = String::new();
    let mut chunk_start = 0;
    let mut chunk_len = 0;

    for (index, ch) in text.char_indices() {
        let candidate = &text[chunk_start..index + ch.len_utf8()];
        if encoded_len(candidate, encoding) > MAX_PAYLOAD_LEN && chunk_len > 0 {
            words.push(wrap(&text[chunk_start..index], encoding, &mut payload));
            chunk_start = index;
        }
        chunk_len = index + ch.len_utf8() - chunk_start;
    }
    if chunk_start < text.len() || words.is_empty() {
        words.push(wrap(&text[chunk_start..], encoding, &mut payload));
    }
    words.join(" ")
}

fn wrap(chunk: &str, encoding: WordEncoding, payload: &mut String) -> String {
    payload.clear();
    match encoding {
        WordEncoding::B => payload.push_str(&STANDARD.encode(chunk.as_bytes())),
        WordEncoding::Q => q_encode_into(chunk, payload),
    }
    format!("=?{CHARSET}?{}?{payload}?=", encoding.tag())
}

fn encoded_len(chunk: &str, encoding: WordEncoding) -> usize {
    match encoding {
        WordEncoding::B => chunk.len().div_ceil(3) * 4,
        WordEncoding::Q => chunk
            .bytes()
            .map(|b| if q_literal(b) || b == b' ' { 1 } else { 3 })
            .sum(),
    }
}

fn q_literal(b: u8) -> bool {
    (b'!'..=b'~').contains(&b) && b != b'=' && b != b'?' && b != b'_'
}

fn q_encode_into(chunk: &str, out: &mut String) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    for b in chunk.bytes() {
        if b == b' ' {
            out.push('_');
        } else if q_literal(b) {
            out.push(char::from(b));
        } else {
            out.push('=');
            out.push(char::from(HEX[usize::from(b >> 4)]));
            out.push(char::from(HEX[usize::from(b & 0x0f)]));
        }
    }
}

fn decode_word(word: &str) -> Option<String> {
    let inner = word.strip_prefix("=?")?.strip_suffix("?=")?;
    let mut parts = inner.splitn(3, '?');
    let charset = parts.next()?;
    let scheme = parts.next()?;
    let payload = parts.next()?;
    if !charset.eq_ignore_ascii_case("utf-8") && !charset.eq_ignore_ascii_case("us-ascii") {
        return None;
    }

    let bytes = match scheme {
        "B" | "b" => STANDARD.decode(payload).ok()?,
        "Q" | "q" => q_decode(payload)?,
        _ => return None,
    };
    String::from_utf8(bytes).ok()
}

fn q_decode(payload: &str) -> Option<Vec<u8>> {
    let raw = payload.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut index = 0;
    while index < raw.len() {
        match raw[index] {
            b'_' => {
                out.push(b' ');
                index += 1;
            }
            b'=' => {
                let hex = payload.get(index + 1..index + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                index += 3;
            }
            other => {
                out.push(other);
                index += 1;
            }
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::{
        decode_subject, encode_subject, subject_encoding, WordEncoding, MAX_ENCODED_WORD_LEN,
    };

    #[test]
    fn specials_select_b_encoding() {
        assert_eq!(subject_encoding("Buy milk, eggs"), WordEncoding::B);
        assert_eq!(subject_encoding("Email bob@example.com"), WordEncoding::B);
        assert_eq!(subject_encoding("Buy milk"), WordEncoding::Q);
        assert_eq!(subject_encoding("Café au lait"), WordEncoding::Q);
    }

    #[test]
    fn b_encoded_subject_round_trips() {
        let encoded = encode_subject("Buy milk, eggs");
        assert_eq!(encoded, "=?UTF-8?B?QnV5IG1pbGssIGVnZ3M=?=");
        assert_eq!(decode_subject(&encoded), "Buy milk, eggs");
    }

    #[test]
    fn plain_ascii_q_subject_is_left_readable() {
        let encoded = encode_subject("Buy milk");
        assert_eq!(encoded, "Buy milk");
        assert_eq!(decode_subject(&encoded), "Buy milk");
    }

    #[test]
    fn non_ascii_q_subject_is_encoded() {
        let encoded = encode_subject("Café au lait");
        assert_eq!(encoded, "=?UTF-8?Q?Caf=C3=A9_au_lait?=");
        assert_eq!(decode_subject(&encoded), "Café au lait");
    }

    #[test]
    fn long_subject_is_split_into_bounded_words() {
        let title = "Réserver, le restaurant pour l'anniversaire de grand-mère à Noël!".repeat(2);
        let encoded = encode_subject(&title);
        assert!(encoded
            .split(' ')
            .all(|word| word.len() <= MAX_ENCODED_WORD_LEN && word.starts_with("=?UTF-8?B?")));
        assert!(encoded.contains(' '));
        assert_eq!(decode_subject(&encoded), title);
    }

    #[test]
    fn long_q_subject_splits_on_char_boundaries() {
        let title = "ééééééééééééééééééééééééééééé";
        let encoded = encode_subject(title);
        assert!(encoded
            .split(' ')
            .all(|word| word.len() <= MAX_ENCODED_WORD_LEN));
        assert_eq!(decode_subject(&encoded), title);
    }

    #[test]
    fn decode_keeps_plain_text_around_words() {
        assert_eq!(
            decode_subject("Re: =?UTF-8?Q?caf=C3=A9?= now"),
            "Re: café now"
        );
    }
}
