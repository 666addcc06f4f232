//! Locating the marker region inside a body.
//!
//! A marker is written as `\n\n<!-- probot = <payload> -->`. When reading,
//! the blank line before the comment may also use `\r\n` endings, since
//! hosts rewrite line endings of stored text. The payload never spans
//! lines: it runs from the opening delimiter to the last [`MARKER_CLOSE`]
//! before the next `\n` or `\r`. Compact JSON escapes both, so an encoded
//! payload always fits on one line. Only the location is computed here;
//! parsing the payload is left to [`crate::codec`].

use std::ops::Range;

/// Opening delimiter of the marker, including the blank line before it.
pub const MARKER_OPEN: &str = "\n\n<!-- probot = ";

/// The comment opening that follows the blank line.
const MARKER_TAG: &str = "<!-- probot = ";

/// Closing delimiter of the marker.
pub const MARKER_CLOSE: &str = " -->";

/// Byte offsets of one marker occurrence within a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerRegion {
    start: usize,
    end: usize,
    payload_start: usize,
    payload_end: usize,
}

impl MarkerRegion {
    /// Byte range of the whole marker, delimiters included.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Byte range of the payload between the delimiters.
    #[must_use]
    pub fn payload_range(&self) -> Range<usize> {
        self.payload_start..self.payload_end
    }

    /// Returns the payload text of this region within `body`.
    ///
    /// `body` must be the string the region was located in.
    #[must_use]
    pub fn payload<'a>(&self, body: &'a str) -> &'a str {
        &body[self.payload_range()]
    }

    /// Returns `body` with this region cut out.
    #[must_use]
    pub fn strip(&self, body: &str) -> String {
        let mut prose = String::with_capacity(body.len() - (self.end - self.start));
        prose.push_str(&body[..self.start]);
        prose.push_str(&body[self.end..]);
        prose
    }
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r')
}

/// Start of the blank line (two `\n` or `\r\n` terminators) that ends
/// right at `tag_start`, if there is one.
fn blank_line_start(body: &str, tag_start: usize) -> Option<usize> {
    let before = body[..tag_start].as_bytes();
    let mut start = before.len();
    for _ in 0..2 {
        start = start.checked_sub(1).filter(|&i| before[i] == b'\n')?;
        if start > 0 && before[start - 1] == b'\r' {
            start -= 1;
        }
    }
    Some(start)
}

/// Finds every marker-shaped region in `body`, in order of appearance.
#[must_use]
pub fn find_all(body: &str) -> Vec<MarkerRegion> {
    let mut regions = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = body[cursor..].find(MARKER_TAG) {
        let tag_start = cursor + offset;
        // Tags not preceded by a blank line are prose.
        let Some(start) = blank_line_start(body, tag_start) else {
            cursor = tag_start + 1;
            continue;
        };
        let payload_start = tag_start + MARKER_TAG.len();
        let line = &body[payload_start..];
        let line_end = line.find(is_line_terminator).unwrap_or(line.len());

        match line[..line_end].rfind(MARKER_CLOSE) {
            Some(close) => {
                let payload_end = payload_start + close;
                let end = payload_end + MARKER_CLOSE.len();
                regions.push(MarkerRegion {
                    start,
                    end,
                    payload_start,
                    payload_end,
                });
                cursor = end;
            }
            // An opening without a close on its line is prose.
            None => cursor = tag_start + 1,
        }
    }

    regions
}

/// Locates the authoritative marker in `body`.
///
/// When the body holds more than one marker-shaped region, the last one
/// wins. Earlier look-alikes are left in place as prose.
#[must_use]
pub fn locate(body: &str) -> Option<MarkerRegion> {
    let regions = find_all(body);
    if regions.len() > 1 {
        tracing::debug!(
            count = regions.len(),
            "Multiple metadata markers found, using the last one"
        );
    }
    regions.last().copied()
}
