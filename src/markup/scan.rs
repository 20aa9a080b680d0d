//! Tag tokenizer over raw markup bytes.
//!
//! The scanner only recognises tags; text between them is never copied.
//! Comments, doctypes and processing instructions are skipped. Attribute
//! values may be double-quoted, single-quoted, unquoted (`filepos=0001234`)
//! or missing altogether.

use std::borrow::Cow;
use std::ops::Range;

use memchr::memchr;

/// One attribute of a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr<'a> {
    pub name: &'a [u8],
    pub value: &'a [u8],
    /// Span of the whole attribute (`name="value"`) in the scanned buffer.
    pub span: Range<usize>,
}

impl Attr<'_> {
    pub fn value_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.value)
    }

    /// Parse the value as an unsigned integer, ignoring leading zeros.
    pub fn value_usize(&self) -> Option<usize> {
        std::str::from_utf8(self.value).ok()?.trim().parse().ok()
    }
}

/// A start, end or empty-element tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag<'a> {
    pub name: &'a [u8],
    pub attrs: Vec<Attr<'a>>,
    /// Span from `<` to `>` inclusive.
    pub span: Range<usize>,
    pub is_end: bool,
    pub self_closing: bool,
}

impl<'a> Tag<'a> {
    /// Case-insensitive tag name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.as_bytes())
    }

    /// Case-insensitive attribute lookup.
    pub fn attr(&self, name: &str) -> Option<&Attr<'a>> {
        self.attrs
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name.as_bytes()))
    }

    pub fn attr_str(&self, name: &str) -> Option<Cow<'_, str>> {
        self.attr(name).map(Attr::value_str)
    }
}

/// Iterator over the tags of a buffer, in document order.
pub struct TagScanner<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TagScanner<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Skip past the next occurrence of `needle`, or to the end.
    fn skip_past(&mut self, needle: &[u8]) {
        self.pos = memchr::memmem::find(&self.data[self.pos..], needle)
            .map(|i| self.pos + i + needle.len())
            .unwrap_or(self.data.len());
    }

    fn parse_tag(&mut self, start: usize) -> Option<Tag<'a>> {
        let data = self.data;
        let mut i = start + 1;
        let is_end = data.get(i) == Some(&b'/');
        if is_end {
            i += 1;
        }

        let name_start = i;
        while i < data.len() && is_name_byte(data[i]) {
            i += 1;
        }
        if i == name_start {
            return None;
        }
        let name = &data[name_start..i];

        let mut attrs = Vec::new();
        let mut self_closing = false;
        loop {
            while i < data.len() && data[i].is_ascii_whitespace() {
                i += 1;
            }
            match data.get(i) {
                None => return None,
                Some(b'>') => break,
                Some(b'/') => {
                    i += 1;
                    if data.get(i) == Some(&b'>') {
                        self_closing = true;
                        break;
                    }
                    continue;
                }
                Some(_) => {}
            }

            let attr_start = i;
            while i < data.len() && !matches!(data[i], b'=' | b'>' | b'/') && !data[i].is_ascii_whitespace() {
                i += 1;
            }
            let attr_name = &data[attr_start..i];
            if attr_name.is_empty() {
                // stray '=' or similar junk
                i += 1;
                continue;
            }

            let mut j = i;
            while j < data.len() && data[j].is_ascii_whitespace() {
                j += 1;
            }
            if data.get(j) != Some(&b'=') {
                attrs.push(Attr {
                    name: attr_name,
                    value: &[],
                    span: attr_start..i,
                });
                continue;
            }
            j += 1;
            while j < data.len() && data[j].is_ascii_whitespace() {
                j += 1;
            }

            let (value, end) = match data.get(j) {
                Some(&q @ (b'"' | b'\'')) => {
                    let close = memchr(q, &data[j + 1..])? + j + 1;
                    (&data[j + 1..close], close + 1)
                }
                _ => {
                    let mut k = j;
                    while k < data.len() && data[k] != b'>' && !data[k].is_ascii_whitespace() {
                        k += 1;
                    }
                    (&data[j..k], k)
                }
            };
            attrs.push(Attr {
                name: attr_name,
                value,
                span: attr_start..end,
            });
            i = end;
        }

        self.pos = i + 1;
        Some(Tag {
            name,
            attrs,
            span: start..i + 1,
            is_end,
            self_closing,
        })
    }
}

impl<'a> Iterator for TagScanner<'a> {
    type Item = Tag<'a>;

    fn next(&mut self) -> Option<Tag<'a>> {
        loop {
            let start = self.pos + memchr(b'<', self.data.get(self.pos..)?)?;
            let rest = &self.data[start..];

            if rest.starts_with(b"<!--") {
                self.pos = start + 4;
                self.skip_past(b"-->");
                continue;
            }
            if rest.starts_with(b"<!") || rest.starts_with(b"<?") {
                self.pos = start + 2;
                self.skip_past(b">");
                continue;
            }

            match self.parse_tag(start) {
                Some(tag) => return Some(tag),
                None => self.pos = start + 1,
            }
        }
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b':' | b'-' | b'_' | b'.')
}

/// Replace tags in `input`.
///
/// `f` sees every tag and returns the replacement text for its span, or
/// `None` to keep it unchanged.
pub fn rewrite_tags(input: &str, mut f: impl FnMut(&Tag<'_>) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    let mut last = 0;
    for tag in TagScanner::new(input.as_bytes()) {
        if let Some(replacement) = f(&tag) {
            out.push_str(&input[last..tag.span.start]);
            out.push_str(&replacement);
            last = tag.span.end;
        }
    }
    out.push_str(&input[last..]);
    out
}

/// Re-render a start tag taken from `input`.
///
/// Attributes named in `remove` or `set` are dropped from their original
/// position; `set` pairs are appended with their values escaped. All other
/// attributes keep their original text.
pub fn render_tag(tag: &Tag<'_>, input: &str, remove: &[&str], set: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(tag.span.len() + 32);
    out.push('<');
    out.push_str(&String::from_utf8_lossy(tag.name));
    for attr in &tag.attrs {
        let dropped = remove
            .iter()
            .chain(set.iter().map(|(name, _)| name))
            .any(|name| attr.name.eq_ignore_ascii_case(name.as_bytes()));
        if !dropped {
            out.push(' ');
            out.push_str(&input[attr.span.clone()]);
        }
    }
    for (name, value) in set {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attr_into(value, &mut out);
        out.push('"');
    }
    out.push_str(if tag.self_closing { "/>" } else { ">" });
    out
}

fn escape_attr_into(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(c),
        }
    }
}
