//! Line-level SSE grammar.
//!
//! [`find_eol`] splits raw bytes into lines, [`classify_line`] turns a decoded
//! line into an [`EventLine`], and [`FrameParser`] accumulates lines into
//! [`Event`]s following the
//! [HTML Living Standard](https://html.spec.whatwg.org/multipage/server-sent-events.html)
//! interpretation rules.

use core::time::Duration;

use super::{
    constants::{COLON, CR, DEFAULT_EVENT_TYPE, LF},
    event::{Event, Frame},
};

/// Finds the next end-of-line in `bytes`.
///
/// Returns `(line_end, remainder_start)`: the non-inclusive end of the line
/// and the inclusive start of the remainder. Returns `None` if more data is
/// needed (e.g. buffer ends with a lone CR that could be part of a CRLF pair).
pub(crate) fn find_eol(bytes: &[u8]) -> Option<(usize, usize)> {
    let first_match = memchr::memchr2(CR, LF, bytes)?;

    match bytes[first_match] {
        LF => Some((first_match, first_match + 1)),
        _ => {
            if first_match + 1 >= bytes.len() {
                return None; // need more data to see if it's CRLF or just CR
            }

            if bytes[first_match + 1] == LF {
                Some((first_match, first_match + 2))
            } else {
                Some((first_match, first_match + 1))
            }
        }
    }
}

/// Field names with a meaning in the event-stream grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldName {
    Event,
    Data,
    Id,
    Retry,
    Ignored,
}

impl FieldName {
    fn from_name(name: &str) -> Self {
        match name {
            "event" => Self::Event,
            "data" => Self::Data,
            "id" => Self::Id,
            "retry" => Self::Retry,
            _ => Self::Ignored,
        }
    }
}

/// A single classified line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventLine<'a> {
    /// Blank line, terminates the pending record.
    Empty,
    /// Comment line (starts with `:`).
    Comment,
    /// `name: value` line.
    Field {
        field_name: FieldName,
        field_value: &'a str,
    },
    /// A line without a colon.
    NoColon,
}

pub(crate) fn classify_line(line: &str) -> EventLine<'_> {
    if line.is_empty() {
        return EventLine::Empty;
    }

    match memchr::memchr(COLON, line.as_bytes()) {
        Some(0) => EventLine::Comment,
        Some(colon_pos) => {
            let value = &line[colon_pos + 1..];
            // Strip exactly one leading space if present.
            let value = value.strip_prefix(' ').unwrap_or(value);
            EventLine::Field {
                field_name: FieldName::from_name(&line[..colon_pos]),
                field_value: value,
            }
        }
        None => EventLine::NoColon,
    }
}

/// Fields accumulated between two blank lines.
#[derive(Debug, Default, Clone)]
struct PendingRecord {
    event_type: Option<String>,
    id: Option<String>,
    data_lines: Vec<String>,
}

impl PendingRecord {
    /// Flush into an [`Event`], resetting the record. Records without any
    /// `data` line are dropped.
    fn dispatch(&mut self) -> Option<Event> {
        let record = std::mem::take(self);
        if record.data_lines.is_empty() {
            return None;
        }

        let mut data = record.data_lines.join("\n");
        if data.ends_with('\n') {
            data.pop();
        }

        Some(Event {
            event_type: record
                .event_type
                .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string()),
            data,
            id: record.id,
        })
    }
}

/// Incremental SSE record parser operating on already-decoded lines.
///
/// Feed lines with [`push_line`](Self::push_line) in arrival order. The parser
/// never performs I/O; pending state is simply dropped together with the
/// parser when the stream ends.
#[derive(Debug, Default, Clone)]
pub struct FrameParser {
    pending: PendingRecord,
}

impl FrameParser {
    /// Create an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one line (without its terminator).
    ///
    /// Returns a [`Frame::Event`] when a blank line completes a record that
    /// holds at least one `data` line, or a [`Frame::Retry`] for a `retry`
    /// field with a positive integer value.
    pub fn push_line(&mut self, line: &str) -> Option<Frame> {
        match classify_line(line) {
            EventLine::Empty => self.pending.dispatch().map(Frame::Event),
            EventLine::Comment | EventLine::NoColon => None,
            EventLine::Field {
                field_name,
                field_value,
            } => match field_name {
                FieldName::Event => {
                    self.pending.event_type = Some(field_value.to_string());
                    None
                }
                FieldName::Data => {
                    self.pending.data_lines.push(field_value.to_string());
                    None
                }
                FieldName::Id => {
                    self.pending.id = Some(field_value.to_string());
                    None
                }
                FieldName::Retry => match field_value.parse::<u64>() {
                    Ok(ms) if ms > 0 => Some(Frame::Retry(Duration::from_millis(ms))),
                    _ => None,
                },
                FieldName::Ignored => None,
            },
        }
    }

    /// Returns `true` if a record has started accumulating fields.
    pub fn has_pending(&self) -> bool {
        !self.pending.data_lines.is_empty()
            || self.pending.event_type.is_some()
            || self.pending.id.is_some()
    }

    /// Discard the pending record.
    pub fn reset(&mut self) {
        self.pending = PendingRecord::default();
    }
}

/// Parse a sequence of lines lazily into frames.
pub fn parse_lines<'a, I>(lines: I) -> impl Iterator<Item = Frame> + 'a
where
    I: IntoIterator<Item = &'a str>,
    I::IntoIter: 'a,
{
    let mut parser = FrameParser::new();
    lines
        .into_iter()
        .filter_map(move |line| parser.push_line(line))
}
