//! Incremental UTF-8 decoding for streaming byte sources.
//!
//! Multi-byte characters split across chunk boundaries are carried over to
//! the next push. Invalid sequences are replaced with U+FFFD and their
//! offsets in the output are recorded, so a reader can tell which part of
//! the text hit an encoding problem without failing.

/// Stateful decoder: feed it chunks with [`Utf8Decoder::push`] and flush it
/// with [`Utf8Decoder::finish`] once the source is exhausted.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    // Incomplete UTF-8 suffix from the previous chunk (at most 3 bytes).
    carry: Vec<u8>,
    // Byte offsets in the output text of each inserted U+FFFD.
    invalid: Vec<usize>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes` onto the end of `text`.
    pub fn push(&mut self, text: &mut String, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }

        let mut remaining = bytes;
        while !self.carry.is_empty() && !remaining.is_empty() {
            let expected_len = utf8_seq_len(self.carry[0]);
            if expected_len == 0 {
                self.invalid.push(text.len());
                text.push('\u{FFFD}');
                self.carry.clear();
                break;
            }

            let needed = expected_len.saturating_sub(self.carry.len());
            if remaining.len() < needed {
                self.carry.extend_from_slice(remaining);
                return;
            }

            let mut scratch = [0u8; 8];
            let carry_len = self.carry.len();
            scratch[..carry_len].copy_from_slice(&self.carry);
            scratch[carry_len..carry_len + needed].copy_from_slice(&remaining[..needed]);
            self.carry.clear();
            self.decode(text, &scratch[..carry_len + needed]);
            remaining = &remaining[needed..];
        }

        if !remaining.is_empty() {
            self.decode(text, remaining);
        }
    }

    /// Flush any carried bytes (lossy) so the stream is never silently
    /// truncated. A dangling partial sequence counts as invalid.
    pub fn finish(&mut self, text: &mut String) {
        if self.carry.is_empty() {
            return;
        }
        self.invalid.push(text.len());
        text.push_str(&String::from_utf8_lossy(&self.carry));
        self.carry.clear();
    }

    /// Output offsets of the invalid sequences replaced since the last call,
    /// in order.
    pub fn take_invalid(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.invalid)
    }

    pub fn has_carry(&self) -> bool {
        !self.carry.is_empty()
    }

    fn decode(&mut self, text: &mut String, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            match std::str::from_utf8(bytes) {
                Ok(s) => {
                    text.push_str(s);
                    break;
                }
                Err(e) => {
                    let (valid, rest) = bytes.split_at(e.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));

                    match e.error_len() {
                        Some(len) => {
                            self.invalid.push(text.len());
                            text.push('\u{FFFD}');
                            bytes = &rest[len..];
                        }
                        None => {
                            self.carry.extend_from_slice(rest);
                            break;
                        }
                    }
                }
            }
        }
    }
}

fn utf8_seq_len(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_multibyte_across_chunks() {
        let mut text = String::new();
        let mut decoder = Utf8Decoder::new();

        decoder.push(&mut text, &[0xC3]);
        assert_eq!(text, "");
        assert!(decoder.has_carry());

        decoder.push(&mut text, &[0x97]);
        assert_eq!(text, "\u{D7}");
        assert!(!decoder.has_carry());
        assert!(decoder.take_invalid().is_empty());
    }

    #[test]
    fn resolves_carry_and_decodes_remaining_bytes() {
        let mut text = String::new();
        let mut decoder = Utf8Decoder::new();

        // First two bytes of U+1F600 (F0 9F 98 80).
        decoder.push(&mut text, &[0xF0, 0x9F]);
        assert_eq!(text, "");

        decoder.push(&mut text, &[0x98, 0x80, b'!']);
        assert_eq!(text, "\u{1F600}!");
        assert!(!decoder.has_carry());
    }

    #[test]
    fn invalid_bytes_are_located_and_replaced() {
        let mut text = String::new();
        let mut decoder = Utf8Decoder::new();

        decoder.push(&mut text, &[b'a', 0xFF, b'b', 0xFE]);
        assert_eq!(text, "a\u{FFFD}b\u{FFFD}");
        assert_eq!(decoder.take_invalid(), vec![1, 5]);
        assert!(decoder.take_invalid().is_empty());

        decoder.push(&mut text, b"ok");
        decoder.push(&mut text, &[0xC3, b'x']);
        assert_eq!(&text[8..], "ok\u{FFFD}x");
        assert_eq!(decoder.take_invalid(), vec![10]);
    }

    #[test]
    fn dangling_suffix_is_flushed_as_invalid() {
        let mut text = String::new();
        let mut decoder = Utf8Decoder::new();

        // First 2 bytes of U+20AC (E2 82 AC).
        decoder.push(&mut text, &[0xE2, 0x82]);
        assert_eq!(text, "");

        decoder.finish(&mut text);
        assert_eq!(text, "\u{FFFD}");
        assert_eq!(decoder.take_invalid(), vec![0]);
    }
}
