//! Character stream over any byte reader.
//!
//! Bytes are pulled in fixed-size chunks and decoded incrementally as UTF-8;
//! invalid sequences become U+FFFD and raise the encoding flag once the
//! reader moves past them, instead of failing the read. CR and CRLF are
//! reported as a single LF.

use std::io::{self, Read};

use memchr::{memchr2, memchr3};
use tools::utf8::Utf8Decoder;

const CHUNK_SIZE: usize = 8 * 1024;

pub struct MarkupInput<R> {
    reader: Option<R>,
    decoder: Utf8Decoder,
    chunk: Vec<u8>,
    // Decoded text not yet consumed starts at `pos`.
    text: String,
    pos: usize,
    // Previous char was a CR, so a directly following LF is swallowed.
    skip_lf: bool,
    // Offsets in `text` of replacement chars not yet read past.
    invalid_at: Vec<usize>,
    encoding_errors: usize,
}

impl<R: Read> MarkupInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            decoder: Utf8Decoder::new(),
            chunk: vec![0; CHUNK_SIZE],
            text: String::new(),
            pos: 0,
            skip_lf: false,
            invalid_at: Vec::new(),
            encoding_errors: 0,
        }
    }

    /// Make sure unconsumed text is buffered. `Ok(false)` at end of stream.
    fn fill(&mut self) -> io::Result<bool> {
        if self.pos < self.text.len() {
            return Ok(true);
        }
        self.encoding_errors += self.invalid_at.len();
        self.invalid_at.clear();
        self.text.clear();
        self.pos = 0;

        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Ok(false);
            };
            let n = match reader.read(&mut self.chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if n == 0 {
                self.decoder.finish(&mut self.text);
                self.reader = None;
            } else {
                self.decoder.push(&mut self.text, &self.chunk[..n]);
            }

            let invalid = self.decoder.take_invalid();
            if !invalid.is_empty() {
                log::debug!(
                    target: "htmlrip.input",
                    "replaced {} invalid utf-8 sequence(s)",
                    invalid.len()
                );
                self.invalid_at.extend(invalid);
            }
            if !self.text.is_empty() {
                return Ok(true);
            }
        }
    }

    // Drop an LF left over from a CR at the previous position.
    fn settle_crlf(&mut self) -> io::Result<bool> {
        if !self.fill()? {
            return Ok(false);
        }
        if self.skip_lf {
            self.skip_lf = false;
            if self.text.as_bytes()[self.pos] == b'\n' {
                self.pos += 1;
                return self.fill();
            }
        }
        Ok(true)
    }

    pub fn read_char(&mut self) -> io::Result<Option<char>> {
        if !self.settle_crlf()? {
            return Ok(None);
        }
        let Some(ch) = self.text[self.pos..].chars().next() else {
            return Ok(None);
        };
        self.pos += ch.len_utf8();
        if ch == '\r' {
            self.skip_lf = true;
            return Ok(Some('\n'));
        }
        Ok(Some(ch))
    }

    pub fn peek_char(&mut self) -> io::Result<Option<char>> {
        if !self.settle_crlf()? {
            return Ok(None);
        }
        Ok(self.text[self.pos..]
            .chars()
            .next()
            .map(|ch| if ch == '\r' { '\n' } else { ch }))
    }

    /// Read up to and including the first `delim` (or `interrupt`), pushing
    /// everything before it onto `out`.
    ///
    /// Returns the byte that stopped the read, or `None` when the stream
    /// ended first. Both stop bytes must be ASCII.
    pub fn read_to_char(
        &mut self,
        delim: u8,
        mut out: Option<&mut String>,
        interrupt: Option<u8>,
    ) -> io::Result<Option<u8>> {
        debug_assert!(delim.is_ascii() && interrupt.is_none_or(|b| b.is_ascii()));
        let stops_on_lf = delim == b'\n' || interrupt == Some(b'\n');

        loop {
            if !self.settle_crlf()? {
                return Ok(None);
            }
            let rest = &self.text[self.pos..];
            let bytes = rest.as_bytes();
            let hit = match interrupt {
                Some(other) => memchr3(delim, other, b'\r', bytes),
                None => memchr2(delim, b'\r', bytes),
            };

            let Some(i) = hit else {
                if let Some(out) = out.as_deref_mut() {
                    out.push_str(rest);
                }
                self.pos = self.text.len();
                continue;
            };

            if let Some(out) = out.as_deref_mut() {
                out.push_str(&rest[..i]);
            }
            let stop = bytes[i];
            self.pos += i + 1;

            if stop == b'\r' {
                self.skip_lf = true;
                if stops_on_lf {
                    return Ok(Some(b'\n'));
                }
                if let Some(out) = out.as_deref_mut() {
                    out.push('\n');
                }
                continue;
            }
            return Ok(Some(stop));
        }
    }

    // Replacement chars already read past.
    fn passed_invalid(&self) -> usize {
        self.invalid_at.partition_point(|&at| at < self.pos)
    }

    /// Whether invalid UTF-8 has been read since the flag was last taken.
    /// Replacements still ahead of the read position do not count yet.
    pub fn encoding_error(&self) -> bool {
        self.encoding_errors > 0 || self.passed_invalid() > 0
    }

    /// Read and reset the encoding flag.
    pub fn take_encoding_error(&mut self) -> bool {
        let passed = self.passed_invalid();
        self.invalid_at.drain(..passed);
        std::mem::take(&mut self.encoding_errors) + passed > 0
    }

    /// Release the reader. Later reads report end of stream.
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            log::trace!(target: "htmlrip.input", "closed markup input");
        }
        self.text.clear();
        self.invalid_at.clear();
        self.pos = 0;
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none() && self.pos >= self.text.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rip_test_support::ChunkedReader;

    fn input(s: &str) -> MarkupInput<&[u8]> {
        MarkupInput::new(s.as_bytes())
    }

    #[test]
    fn crlf_and_cr_read_as_lf() {
        let mut inp = input("a\r\nb\rc\n");
        let mut chars = String::new();
        while let Some(ch) = inp.read_char().unwrap() {
            chars.push(ch);
        }
        assert_eq!(chars, "a\nb\nc\n");
    }

    #[test]
    fn read_to_char_consumes_the_delimiter() {
        let mut inp = input("hello<b>");
        let mut out = String::new();
        assert_eq!(inp.read_to_char(b'<', Some(&mut out), None).unwrap(), Some(b'<'));
        assert_eq!(out, "hello");
        assert_eq!(inp.peek_char().unwrap(), Some('b'));
    }

    #[test]
    fn read_to_char_stops_on_interrupt() {
        let mut inp = input("name=value>");
        let mut out = String::new();
        assert_eq!(
            inp.read_to_char(b'>', Some(&mut out), Some(b'=')).unwrap(),
            Some(b'=')
        );
        assert_eq!(out, "name");
    }

    #[test]
    fn read_to_char_normalizes_line_breaks_in_output() {
        let mut inp = input("a\r\nb\r\nc<");
        let mut out = String::new();
        assert_eq!(inp.read_to_char(b'<', Some(&mut out), None).unwrap(), Some(b'<'));
        assert_eq!(out, "a\nb\nc");

        let mut inp = input("line\r\nnext");
        let mut out = String::new();
        assert_eq!(inp.read_to_char(b'\n', Some(&mut out), None).unwrap(), Some(b'\n'));
        assert_eq!(out, "line");
        assert_eq!(inp.read_char().unwrap(), Some('n'));
    }

    #[test]
    fn end_of_stream_returns_none_with_partial_output() {
        let mut inp = input("no delimiter");
        let mut out = String::new();
        assert_eq!(inp.read_to_char(b'<', Some(&mut out), None).unwrap(), None);
        assert_eq!(out, "no delimiter");
        assert_eq!(inp.read_char().unwrap(), None);
    }

    #[test]
    fn chunk_boundaries_do_not_split_characters() {
        let text = "caf\u{E9} \u{1F600} <x>";
        for size in 1..=5 {
            let mut inp = MarkupInput::new(ChunkedReader::new(text.as_bytes(), size));
            let mut out = String::new();
            assert_eq!(inp.read_to_char(b'<', Some(&mut out), None).unwrap(), Some(b'<'));
            assert_eq!(out, "caf\u{E9} \u{1F600} ", "chunk size {size}");
            assert!(!inp.encoding_error());
        }
    }

    #[test]
    fn crlf_split_across_chunks_is_one_line_break() {
        let mut inp = MarkupInput::new(ChunkedReader::new(b"a\r\nb", 2));
        let mut chars = String::new();
        while let Some(ch) = inp.read_char().unwrap() {
            chars.push(ch);
        }
        assert_eq!(chars, "a\nb");
    }

    #[test]
    fn invalid_utf8_sets_the_flag() {
        let mut inp = MarkupInput::new(&b"ok \xFF here"[..]);
        let mut out = String::new();
        inp.read_to_char(b'<', Some(&mut out), None).unwrap();
        assert_eq!(out, "ok \u{FFFD} here");
        assert!(inp.encoding_error());
        assert!(inp.take_encoding_error());
        assert!(!inp.encoding_error());
    }

    #[test]
    fn encoding_flag_waits_until_the_bad_byte_is_read() {
        let mut inp = MarkupInput::new(&b"first<second \xE9 end<"[..]);
        let mut out = String::new();
        inp.read_to_char(b'<', Some(&mut out), None).unwrap();
        assert_eq!(out, "first");
        // The whole input is buffered, but the bad byte is still ahead.
        assert!(!inp.encoding_error());
        assert!(!inp.take_encoding_error());

        out.clear();
        inp.read_to_char(b'<', Some(&mut out), None).unwrap();
        assert_eq!(out, "second \u{FFFD} end");
        assert!(inp.take_encoding_error());
        assert!(!inp.take_encoding_error());
    }

    #[test]
    fn encoding_flag_survives_a_buffer_refill() {
        let mut inp = MarkupInput::new(ChunkedReader::new(b"a\xFFb<c", 2));
        let mut out = String::new();
        inp.read_to_char(b'<', Some(&mut out), None).unwrap();
        assert_eq!(out, "a\u{FFFD}b");
        assert!(inp.encoding_error());
        assert_eq!(inp.read_char().unwrap(), Some('c'));
        assert!(inp.take_encoding_error());
    }

    #[test]
    fn close_ends_the_stream() {
        let mut inp = input("abc");
        assert_eq!(inp.read_char().unwrap(), Some('a'));
        inp.close();
        inp.close();
        assert_eq!(inp.read_char().unwrap(), None);
        assert!(inp.is_closed());
    }
}
