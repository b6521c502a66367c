//! Character references, whitespace normalization and XML escaping.
//!
//! Decoding is narrow on purpose: a small named table plus well-formed,
//! semicolon-terminated numeric references. Anything else passes through
//! unchanged so malformed input never loses characters.

use std::borrow::Cow;

use memchr::memchr;

const NAMED_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{00A0}'),
    ("copy", '\u{00A9}'),
    ("reg", '\u{00AE}'),
    ("trade", '\u{2122}'),
    ("mdash", '\u{2014}'),
    ("ndash", '\u{2013}'),
    ("hellip", '\u{2026}'),
    ("laquo", '\u{00AB}'),
    ("raquo", '\u{00BB}'),
    ("lsquo", '\u{2018}'),
    ("rsquo", '\u{2019}'),
    ("ldquo", '\u{201C}'),
    ("rdquo", '\u{201D}'),
    ("middot", '\u{00B7}'),
    ("bull", '\u{2022}'),
];

const MAX_NAME_LEN: usize = 6;
const MAX_HEX_DIGITS: usize = 6; // 0x10FFFF
const MAX_DEC_DIGITS: usize = 7; // 1114111

/// Decode character references in `s`, borrowing when there are none.
pub fn decode_entities(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    let Some(first) = memchr(b'&', bytes) else {
        return Cow::Borrowed(s);
    };

    let mut out = String::with_capacity(s.len());
    out.push_str(&s[..first]);
    let mut i = first;

    while i < bytes.len() {
        if bytes[i] != b'&' {
            let next = memchr(b'&', &bytes[i..]).map_or(bytes.len(), |rel| i + rel);
            out.push_str(&s[i..next]);
            i = next;
            continue;
        }

        match decode_reference(s, i) {
            Some((ch, end)) => {
                out.push(ch);
                i = end;
            }
            None => {
                out.push('&');
                i += 1;
            }
        }
    }

    Cow::Owned(out)
}

// Decode the reference starting at the `&` at `start`, returning the char
// and the index just past its `;`.
fn decode_reference(s: &str, start: usize) -> Option<(char, usize)> {
    let bytes = s.as_bytes();
    let body = start + 1;

    if bytes.get(body) == Some(&b'#') {
        let (digits_start, radix, max_digits) = match bytes.get(body + 1) {
            Some(b'x' | b'X') => (body + 2, 16, MAX_HEX_DIGITS),
            _ => (body + 1, 10, MAX_DEC_DIGITS),
        };
        let end = scan_digits(bytes, digits_start, max_digits, radix == 16)?;
        let value = u32::from_str_radix(&s[digits_start..end], radix).ok()?;
        return char::from_u32(value).map(|ch| (ch, end + 1));
    }

    let window = &bytes[body..bytes.len().min(body + MAX_NAME_LEN + 1)];
    let semi = memchr(b';', window)?;
    let name = &s[body..body + semi];
    NAMED_ENTITIES
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, ch)| (*ch, body + semi + 1))
}

// Bounded scan so adversarial digit runs stay linear.
fn scan_digits(bytes: &[u8], start: usize, max_digits: usize, hex: bool) -> Option<usize> {
    let mut j = start;
    while j < bytes.len() {
        let b = bytes[j];
        if b == b';' {
            return (j > start).then_some(j);
        }
        if j - start == max_digits {
            return None;
        }
        let ok = if hex {
            b.is_ascii_hexdigit()
        } else {
            b.is_ascii_digit()
        };
        if !ok {
            return None;
        }
        j += 1;
    }
    None
}

/// Trim `s` and collapse every run of whitespace (including no-break
/// spaces) to a single ASCII space.
pub fn hypertrim(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s.split(char::is_whitespace).filter(|word| !word.is_empty()) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Decode references first so `&nbsp;` runs collapse too, then hypertrim.
pub fn fix_text(s: &str) -> String {
    hypertrim(&decode_entities(s))
}

/// Append `s` to `out` with XML escaping. Control characters below 0x20
/// other than tab are written as hex character references.
pub fn escape_xml(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' => out.push('\t'),
            ch if (ch as u32) < 0x20 => {
                use std::fmt::Write;
                let _ = write!(out, "&#x{:X};", ch as u32);
            }
            ch => out.push(ch),
        }
    }
}
