//! Common constants used across the SSE parser.

/// Newline byte
pub(crate) const LF: u8 = b'\n';
/// Carriage return byte
pub(crate) const CR: u8 = b'\r';
/// Field separator / comment marker
pub(crate) const COLON: u8 = b':';

/// UTF-8 encoding of U+FEFF, skipped once at the start of a stream.
pub(crate) const BOM: &[u8] = "\u{FEFF}".as_bytes();

/// Default event type when a record carries no `event` field.
pub const DEFAULT_EVENT_TYPE: &str = "message";
