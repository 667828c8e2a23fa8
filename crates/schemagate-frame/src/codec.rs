use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::envelope::Response;
use crate::error::Result;

/// Default maximum frame size: 1 MiB.
pub const DEFAULT_MAX_FRAME: usize = 1024 * 1024;

/// One unit produced by the line decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A complete, whitespace-trimmed, non-blank line without its `\n`.
    Frame(Bytes),
    /// A line longer than the limit. Its bytes have been (or will be) dropped.
    Oversized,
}

/// Splits a byte stream into newline-delimited lines.
///
/// Partial lines stay buffered across calls. A line that grows past the
/// limit is reported as [`Line::Oversized`] as soon as that is known, and
/// the rest of it is discarded up to the next `\n` without buffering it.
#[derive(Debug, Clone)]
pub struct LineDecoder {
    max_line: usize,
    discarding: bool,
}

impl LineDecoder {
    pub fn new(max_line: usize) -> Self {
        Self {
            max_line,
            discarding: false,
        }
    }

    /// Decode the next line from `src`.
    ///
    /// Returns `None` when `src` holds no complete line yet.
    pub fn decode(&mut self, src: &mut BytesMut) -> Option<Line> {
        loop {
            if self.discarding {
                match find_newline(src) {
                    Some(pos) => {
                        src.advance(pos + 1);
                        self.discarding = false;
                    }
                    None => {
                        src.clear();
                        return None;
                    }
                }
            }

            match find_newline(src) {
                Some(pos) => {
                    let raw = src.split_to(pos + 1).freeze();
                    match self.classify(raw.slice(..pos)) {
                        Some(line) => return Some(line),
                        None => continue,
                    }
                }
                None => {
                    if trimmed_len(src) > self.max_line {
                        src.clear();
                        self.discarding = true;
                        return Some(Line::Oversized);
                    }
                    return None;
                }
            }
        }
    }

    /// Flush whatever remains once the stream has ended.
    ///
    /// A trailing line without `\n` is still delivered.
    pub fn decode_eof(&mut self, src: &mut BytesMut) -> Option<Line> {
        if let Some(line) = self.decode(src) {
            return Some(line);
        }
        if self.discarding {
            self.discarding = false;
            src.clear();
            return None;
        }
        let rest = src.split().freeze();
        self.classify(rest)
    }

    fn classify(&self, raw: Bytes) -> Option<Line> {
        let trimmed = trim_ascii(raw);
        if trimmed.is_empty() {
            None
        } else if trimmed.len() > self.max_line {
            Some(Line::Oversized)
        } else {
            Some(Line::Frame(trimmed))
        }
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME)
    }
}

/// Serialize a response as a single `\n`-terminated line.
pub fn encode_response(response: &Response, dst: &mut BytesMut) -> Result<()> {
    let mut writer = dst.writer();
    serde_json::to_writer(&mut writer, response)?;
    let dst = writer.into_inner();
    dst.put_u8(b'\n');
    Ok(())
}

fn find_newline(src: &[u8]) -> Option<usize> {
    src.iter().position(|b| *b == b'\n')
}

fn trimmed_len(src: &[u8]) -> usize {
    let start = src.iter().position(|b| !b.is_ascii_whitespace());
    match start {
        Some(start) => src.len() - start,
        None => 0,
    }
}

fn trim_ascii(raw: Bytes) -> Bytes {
    let start = raw
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(raw.len());
    let end = raw
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |pos| pos + 1);
    raw.slice(start..end.max(start))
}

/// Configuration for line readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum line length in bytes. Default: 1 MiB.
    pub max_frame_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::outcome::Outcome;

    fn frame(text: &str) -> Option<Line> {
        Some(Line::Frame(Bytes::copy_from_slice(text.as_bytes())))
    }

    #[test]
    fn splits_complete_lines_and_keeps_partial() {
        let mut decoder = LineDecoder::new(64);
        let mut buf = BytesMut::from(&b"{\"a\":1}\n{\"b\""[..]);

        assert_eq!(decoder.decode(&mut buf), frame("{\"a\":1}"));
        assert_eq!(decoder.decode(&mut buf), None);

        buf.extend_from_slice(b":2}\n");
        assert_eq!(decoder.decode(&mut buf), frame("{\"b\":2}"));
        assert!(buf.is_empty());
    }

    #[test]
    fn blank_lines_are_skipped_and_lines_trimmed() {
        let mut decoder = LineDecoder::new(64);
        let mut buf = BytesMut::from(&b"\n   \r\n  {\"x\":true}\r\n"[..]);
        assert_eq!(decoder.decode(&mut buf), frame("{\"x\":true}"));
        assert_eq!(decoder.decode(&mut buf), None);
    }

    #[test]
    fn oversized_partial_line_is_reported_without_newline() {
        let mut decoder = LineDecoder::new(8);
        let mut buf = BytesMut::from(&b"0123456789"[..]);

        assert_eq!(decoder.decode(&mut buf), Some(Line::Oversized));
        assert!(buf.is_empty());

        // Remainder of the long line is dropped, the next one survives.
        buf.extend_from_slice(b"abcdef\n{}\n");
        assert_eq!(decoder.decode(&mut buf), frame("{}"));
    }

    #[test]
    fn oversized_complete_line_is_reported() {
        let mut decoder = LineDecoder::new(4);
        let mut buf = BytesMut::from(&b"123456\nok\n"[..]);
        assert_eq!(decoder.decode(&mut buf), Some(Line::Oversized));
        assert_eq!(decoder.decode(&mut buf), frame("ok"));
    }

    #[test]
    fn eof_flushes_trailing_line() {
        let mut decoder = LineDecoder::new(64);
        let mut buf = BytesMut::from(&b"{\"last\":1}"[..]);
        assert_eq!(decoder.decode(&mut buf), None);
        assert_eq!(decoder.decode_eof(&mut buf), frame("{\"last\":1}"));
        assert_eq!(decoder.decode_eof(&mut buf), None);
    }

    #[test]
    fn encode_response_appends_newline() {
        let mut dst = BytesMut::new();
        let response = Response::result(json!(1), Outcome::success());
        encode_response(&response, &mut dst).unwrap();

        assert_eq!(dst.last(), Some(&b'\n'));
        let parsed: serde_json::Value = serde_json::from_slice(&dst[..dst.len() - 1]).unwrap();
        assert_eq!(parsed["result"]["ok"], json!(true));
        assert_eq!(parsed["protocolVersion"], json!("2.0"));
    }
}
