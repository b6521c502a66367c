//! Tag-level lexer: turns a character stream into start/end tag, comment,
//! script and style events, with the text in between read separately.

use std::io::{self, Read};
use std::sync::Arc;

use crate::config::MarkupTables;
use crate::entities::{decode_entities, fix_text, hypertrim};
use crate::input::MarkupInput;
use crate::types::{Comment, Script, Style, Tag};

/// Lexer behavior switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LexerOptions {
    /// Fold tag and attribute names to lowercase and honor backslash
    /// escapes inside quoted attribute values.
    pub common_case: bool,
    pub keep_comments: bool,
    /// Read `<script>` and `<style>` bodies raw up to their end tag.
    pub special_script_logic: bool,
}

impl LexerOptions {
    pub fn html() -> Self {
        Self {
            common_case: true,
            keep_comments: false,
            special_script_logic: true,
        }
    }

    pub fn xml() -> Self {
        Self {
            common_case: false,
            keep_comments: true,
            special_script_logic: false,
        }
    }
}

impl Default for LexerOptions {
    fn default() -> Self {
        Self::html()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagEvent {
    Start(Tag),
    End(String),
    Comment(Comment),
    Script(Script),
    Style(Style),
    EndOfStream,
}

#[derive(Clone, Debug)]
pub struct TagLexer {
    options: LexerOptions,
    tables: Arc<MarkupTables>,
}

impl TagLexer {
    pub fn new(options: LexerOptions, tables: Arc<MarkupTables>) -> Self {
        Self { options, tables }
    }

    pub fn html() -> Self {
        Self::new(LexerOptions::html(), Arc::new(MarkupTables::html()))
    }

    pub fn xml() -> Self {
        Self::new(LexerOptions::xml(), Arc::new(MarkupTables::xml()))
    }

    pub fn options(&self) -> LexerOptions {
        self.options
    }

    pub fn tables(&self) -> &Arc<MarkupTables> {
        &self.tables
    }

    pub fn common_case(&self) -> bool {
        self.options.common_case
    }

    /// Collect raw text up to the next `<` (consumed). `Ok(false)` when the
    /// stream ended instead.
    pub fn read_text<R: Read>(
        &self,
        input: &mut MarkupInput<R>,
        buf: &mut String,
    ) -> io::Result<bool> {
        Ok(input.read_to_char(b'<', Some(buf), None)?.is_some())
    }

    /// Read one markup construct following a `<`.
    ///
    /// `Ok(None)` means the construct carried nothing worth reporting (an
    /// empty tag, a processing instruction, an ignored comment).
    pub fn read_tag<R: Read>(
        &self,
        input: &mut MarkupInput<R>,
        force_ignore_comments: bool,
    ) -> io::Result<Option<TagEvent>> {
        let Some(first) = input.read_char()? else {
            return Ok(Some(TagEvent::EndOfStream));
        };

        match first {
            '>' => Ok(None),
            '!' | '?' => {
                let mut body = String::from(first);
                read_comment_body(input, &mut body)?;
                let keep =
                    first == '!' && self.options.keep_comments && !force_ignore_comments;
                if !keep {
                    return Ok(None);
                }
                let text = hypertrim(&body);
                Ok((!text.is_empty()).then(|| TagEvent::Comment(Comment::new(text))))
            }
            '/' => {
                let mut raw = String::new();
                input.read_to_char(b'>', Some(&mut raw), None)?;
                let text = fix_text(&raw);
                let Some(name) = text.split(' ').next().filter(|name| !name.is_empty()) else {
                    return Ok(None);
                };
                let name = if self.options.common_case {
                    name.to_ascii_lowercase()
                } else {
                    name.to_string()
                };
                Ok(Some(TagEvent::End(name)))
            }
            _ => {
                let mut raw = String::from(first);
                self.read_to_tag_end(input, &mut raw)?;
                let text = hypertrim(&raw);
                if text.is_empty() {
                    return Ok(None);
                }
                if self.options.special_script_logic
                    && let Some(event) = read_raw_body(input, &text)?
                {
                    return Ok(Some(event));
                }

                let mut tag = parse_tag(&text, self.options.common_case);
                if tag.name().is_empty() {
                    return Ok(None);
                }
                if self.tables.is_optional_end_tag(tag.name()) {
                    tag.set_self_terminating();
                }
                Ok(Some(TagEvent::Start(tag)))
            }
        }
    }

    // Read to the closing `>` of a start tag, skipping over any `>` inside
    // quoted attribute values.
    fn read_to_tag_end<R: Read>(
        &self,
        input: &mut MarkupInput<R>,
        raw: &mut String,
    ) -> io::Result<()> {
        while input.read_to_char(b'>', Some(&mut *raw), Some(b'='))? == Some(b'=') {
            raw.push('=');
            let Some(quote) = input.read_char()? else {
                break;
            };
            if quote == '>' {
                break;
            }
            raw.push(quote);
            if quote != '"' && quote != '\'' {
                continue;
            }

            let quote = quote as u8;
            let stop = if self.options.common_case {
                loop {
                    match input.read_to_char(quote, Some(&mut *raw), Some(b'\\'))? {
                        Some(b'\\') => {
                            raw.push('\\');
                            match input.read_char()? {
                                Some(escaped) => raw.push(escaped),
                                None => break None,
                            }
                        }
                        other => break other,
                    }
                }
            } else {
                input.read_to_char(quote, Some(&mut *raw), None)?
            };
            if stop == Some(quote) {
                raw.push(quote as char);
            }
        }
        Ok(())
    }
}

// `<!-- ... -->` may contain `>`; other declarations end at the first `>`.
fn read_comment_body<R: Read>(input: &mut MarkupInput<R>, body: &mut String) -> io::Result<()> {
    let Some(c1) = input.read_char()? else {
        return Ok(());
    };
    if c1 == '>' {
        return Ok(());
    }
    body.push(c1);
    let Some(c2) = input.read_char()? else {
        return Ok(());
    };
    if c2 == '>' {
        return Ok(());
    }
    body.push(c2);

    if c1 != '-' || c2 != '-' {
        input.read_to_char(b'>', Some(&mut *body), None)?;
        return Ok(());
    }

    while input.read_to_char(b'>', Some(&mut *body), None)?.is_some() {
        if body.len() >= 5 && body.ends_with("--") {
            break;
        }
        body.push('>');
    }
    Ok(())
}

// Raw `<script>`/`<style>` bodies. `text` is the trimmed start tag content.
fn read_raw_body<R: Read>(input: &mut MarkupInput<R>, text: &str) -> io::Result<Option<TagEvent>> {
    let kind = if opens_raw_element(text, "script") {
        "script"
    } else if opens_raw_element(text, "style") {
        "style"
    } else {
        return Ok(None);
    };

    let mut body = String::new();
    if !text.ends_with('/') {
        let end_tag = format!("</{kind}");
        while input.read_to_char(b'>', Some(&mut body), None)?.is_some() {
            if ends_with_ignore_ascii_case(&body, &end_tag) {
                body.truncate(body.len() - end_tag.len());
                break;
            }
            body.push('>');
        }
    }

    let body = hypertrim(&body);
    Ok(Some(if kind == "script" {
        TagEvent::Script(Script::new(body))
    } else {
        TagEvent::Style(Style::new(body))
    }))
}

fn opens_raw_element(text: &str, name: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= name.len()
        && bytes[..name.len()].eq_ignore_ascii_case(name.as_bytes())
        && matches!(bytes.get(name.len()), None | Some(b' ') | Some(b'/'))
}

fn ends_with_ignore_ascii_case(haystack: &str, suffix: &str) -> bool {
    let hay = haystack.as_bytes();
    hay.len() >= suffix.len() && hay[hay.len() - suffix.len()..].eq_ignore_ascii_case(suffix.as_bytes())
}

/// Build a tag from trimmed start-tag content such as `a href="x" /`.
pub fn parse_tag(text: &str, common_case: bool) -> Tag {
    let (body, self_terminating) = match text.strip_suffix('/') {
        Some(body) => (body.trim_end(), true),
        None => (text, false),
    };
    let (name, rest) = match body.find(' ') {
        Some(pos) => (&body[..pos], &body[pos + 1..]),
        None => (body, ""),
    };

    let mut tag = Tag::new(fix_text(name), common_case);
    for (key, value) in AttributeIter::new(rest, common_case) {
        let key = fix_text(key);
        if !key.is_empty() {
            tag.set_attribute(key, decode_entities(value));
        }
    }
    if self_terminating {
        tag.set_self_terminating();
    }
    tag
}

// Splits `k=v k2="v 2" bare k3='x'` into key/value pairs with quotes removed.
struct AttributeIter<'a> {
    rest: &'a str,
    backslash_escapes: bool,
}

impl<'a> AttributeIter<'a> {
    fn new(rest: &'a str, backslash_escapes: bool) -> Self {
        Self {
            rest,
            backslash_escapes,
        }
    }
}

impl<'a> Iterator for AttributeIter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let s = self.rest.trim_start();
        if s.is_empty() {
            self.rest = s;
            return None;
        }

        let key_end = s.find([' ', '=']).unwrap_or(s.len());
        let key = &s[..key_end];
        if s.as_bytes().get(key_end) != Some(&b'=') {
            self.rest = &s[key_end..];
            return Some((key, ""));
        }

        let value_start = key_end + 1;
        let after = &s[value_start..];
        let (value, consumed) = match after.as_bytes().first() {
            None | Some(b' ') => ("", 0),
            Some(&quote) if quote == b'"' || quote == b'\'' => {
                let inner = &after[1..];
                match find_unescaped(inner, quote, self.backslash_escapes) {
                    Some(end) => (&inner[..end], end + 2),
                    None => (inner, after.len()),
                }
            }
            Some(_) => {
                let end = after.find(' ').unwrap_or(after.len());
                (&after[..end], end)
            }
        };
        self.rest = &after[consumed..];
        Some((key, value))
    }
}

fn find_unescaped(s: &str, quote: u8, backslash_escapes: bool) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut from = 0;
    while let Some(rel) = memchr::memchr(quote, &bytes[from..]) {
        let pos = from + rel;
        if backslash_escapes && pos > 0 && bytes[pos - 1] == b'\\' {
            from = pos + 1;
            continue;
        }
        return Some(pos);
    }
    None
}
