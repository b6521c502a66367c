//! Shared helpers for htmlrip tests: chunked readers for streaming parity
//! and TOML fixture cases.

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use serde::Deserialize;

/// A reader handing out at most `chunk` bytes per call, so stream decoding
/// sees every split point a slow network read could produce.
pub struct ChunkedReader<'a> {
    bytes: &'a [u8],
    chunk: usize,
    pos: usize,
}

impl<'a> ChunkedReader<'a> {
    pub fn new(bytes: &'a [u8], chunk: usize) -> Self {
        assert!(chunk > 0, "chunk size must be positive");
        Self {
            bytes,
            chunk,
            pos: 0,
        }
    }
}

impl Read for ChunkedReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.bytes[self.pos..];
        let n = remaining.len().min(self.chunk).min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// A reader that fails after yielding `ok` bytes.
pub struct FailingReader<'a> {
    bytes: &'a [u8],
    ok: usize,
    pos: usize,
}

impl<'a> FailingReader<'a> {
    pub fn new(bytes: &'a [u8], ok: usize) -> Self {
        Self { bytes, ok, pos: 0 }
    }
}

impl Read for FailingReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.ok {
            return Err(io::Error::other("reader failed on purpose"));
        }
        let end = self.ok.min(self.bytes.len());
        let n = (end - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
        self.pos += n;
        if n == 0 {
            self.pos = self.ok;
        }
        Ok(n)
    }
}

/// Make control characters visible in assertion output.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            ch if ch.is_control() => {
                let _ = write!(out, "\\u{{{:04X}}}", ch as u32);
            }
            ch => out.push(ch),
        }
    }
    out
}

/// Render the first differing line of two line lists with a little
/// surrounding context. Empty when the lists are equal.
pub fn diff_lines(expected: &[String], actual: &[String]) -> String {
    let Some(at) = (0..expected.len().max(actual.len()))
        .find(|&i| expected.get(i) != actual.get(i))
    else {
        return String::new();
    };
    let line = |lines: &[String], i: usize| {
        lines
            .get(i)
            .map_or_else(|| "<missing>".to_string(), |l| escape_text(l))
    };
    let mut out = String::new();
    let _ = writeln!(out, "lines differ from line {}:", at + 1);
    let end = (at + 3).min(expected.len().max(actual.len()));
    for i in at.saturating_sub(2)..end {
        let marker = if i == at { '>' } else { ' ' };
        let _ = writeln!(out, "{marker} {:>4} expected: {}", i + 1, line(expected, i));
        let _ = writeln!(out, "{marker} {:>4}   actual: {}", i + 1, line(actual, i));
    }
    let _ = writeln!(
        out,
        "expected {} lines, actual {} lines",
        expected.len(),
        actual.len()
    );
    out
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Html,
    Xml,
}

/// One input/expected-output pair from a fixture file.
#[derive(Clone, Debug, Deserialize)]
pub struct ParseCase {
    pub name: String,
    pub input: String,
    pub expected: String,
    #[serde(default)]
    pub mode: Mode,
}

#[derive(Deserialize)]
struct CaseFile {
    #[serde(rename = "case", default)]
    cases: Vec<ParseCase>,
}

/// Load the `[[case]]` tables of a TOML fixture file.
pub fn load_cases(path: &Path) -> Vec<ParseCase> {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read fixture file {path:?}: {err}"));
    let file: CaseFile = toml::from_str(&content)
        .unwrap_or_else(|err| panic!("failed to parse fixture file {path:?}: {err}"));
    assert!(!file.cases.is_empty(), "fixture file {path:?} has no cases");
    file.cases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunked_reader_respects_chunk_size() {
        let mut reader = ChunkedReader::new(b"abcdefg", 3);
        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn failing_reader_errors_after_budget() {
        let mut reader = FailingReader::new(b"abcdef", 4);
        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert!(reader.read(&mut buf).is_err());
    }

    #[test]
    fn diff_points_at_first_mismatch() {
        let a = vec!["x".to_string(), "y".to_string()];
        let b = vec!["x".to_string(), "z\n".to_string()];
        assert!(diff_lines(&a, &a).is_empty());
        let diff = diff_lines(&a, &b);
        assert!(diff.contains("from line 2"));
        assert!(diff.contains("z\\n"));
    }

    #[test]
    fn cases_parse_from_toml() {
        let file: CaseFile = toml::from_str(
            r#"
            [[case]]
            name = "a"
            input = "<a/>"
            expected = "<a/>"

            [[case]]
            name = "b"
            input = "<B/>"
            expected = "<B/>"
            mode = "xml"
            "#,
        )
        .unwrap();
        assert_eq!(file.cases.len(), 2);
        assert_eq!(file.cases[0].mode, Mode::Html);
        assert_eq!(file.cases[1].mode, Mode::Xml);
    }
}
