//! Size-bounded splitting of note bodies into deliverable segments.
//!
//! # Responsibility
//! - Slice a joined note body into consecutive byte ranges no larger than
//!   the configured segment size.
//! - Number segment titles when more than one segment is produced.
//!
//! # Invariants
//! - Bodies strictly shorter than `max_size` yield one segment with the
//!   title unchanged.
//! - Concatenating segment texts in order reproduces the body exactly.
//! - Cuts never land inside a UTF-8 code point.

use crate::model::note::Segment;
use std::num::NonZeroUsize;

/// Default segment size in bytes.
pub const DEFAULT_MAX_SEGMENT_SIZE: NonZeroUsize = match NonZeroUsize::new(2000) {
    Some(size) => size,
    None => unreachable!(),
};

/// Splits `body` into segments of at most `max_size` bytes.
///
/// Chunking ignores word and line boundaries. A cut that would fall inside a
/// multi-byte character moves back to the previous char boundary; when that
/// would leave the chunk empty (`max_size` smaller than the character) it
/// moves forward instead, so every chunk is non-empty and valid UTF-8.
pub fn split(title: &str, body: &str, max_size: NonZeroUsize) -> Vec<Segment> {
    let max_size = max_size.get();
    if body.len() < max_size {
        return vec![Segment {
            title: title.to_string(),
            text: body.to_string(),
        }];
    }

    let mut segments = Vec::with_capacity(body.len().div_ceil(max_size));
    let mut start = 0;
    while start < body.len() {
        let end = chunk_end(body, start, max_size);
        segments.push(Segment {
            title: format!("{title} ({})", segments.len() + 1),
            text: body[start..end].to_string(),
        });
        start = end;
    }
    segments
}

fn chunk_end(body: &str, start: usize, max_size: usize) -> usize {
    let limit = start.saturating_add(max_size).min(body.len());
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    if end > start {
        return end;
    }

    end = limit;
    while !body.is_char_boundary(end) {
        end += 1;
    }
    end
}
