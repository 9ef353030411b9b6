//! Reconciliation of inline images against uploaded artifacts
//!
//! Rich-text editors embed pasted images as `data:` URIs. The same images are
//! uploaded alongside the content as separate files. Reconciliation walks the
//! `<img>` elements of the content in document order and hands each inline
//! source the next stored path; inline images left without a stored path are
//! dropped from the document. Non-inline images are never touched.
//!
//! Content is scanned token by token the way an HTML tokenizer reads it.
//! Comments, declarations and the bodies of `<script>`/`<style>` are not
//! elements, and a quote only opens a value right after `name=`. Everything
//! but the affected `<img>` tags is copied through verbatim, and malformed
//! markup never produces an error.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    /// One markup token: a comment, a bogus comment (`<!...>`, `<?...>`,
    /// `</ ...>`), or a start or end tag running to its `>` or end of input.
    static ref TOKEN_RE: Regex = Regex::new(
        r#"(?s)<!--(?:>|->|.*?(?:-->|$))|<[!?][^>]*>?|</[^A-Za-z>][^>]*>?|<(?P<close>/)?(?P<name>[A-Za-z][^\s/>]*)(?:[\s/]+|[^\s/>][^\s/>=]*(?:\s*=\s*(?:"[^"]*"?|'[^']*'?|[^\s>]*))?)*(?:>|$)"#
    ).unwrap();

    /// One attribute after a tag name: name, optionally `=` and a value.
    static ref ATTRIBUTE_RE: Regex = Regex::new(
        r#"[\s/]*([^\s/>][^\s/>=]*)(?:\s*=\s*(?:"([^"]*)"?|'([^']*)'?|([^\s>]*)))?"#
    ).unwrap();

    static ref CHAR_REF_RE: Regex = Regex::new(
        r"&(?:#[xX]([0-9A-Fa-f]+);?|#([0-9]+);?|([A-Za-z][A-Za-z0-9]*);)"
    ).unwrap();
}

/// Elements whose body is text rather than markup
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Output of [`reconcile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Content with inline sources rewritten or removed
    pub content: String,
    /// Every stored path for the request: the consumed ones (now referenced
    /// from `content`) followed by the unconsumed ones
    pub images: Vec<String>,
    /// Number of inline images pointed at a stored path
    pub rewritten: usize,
    /// Number of inline images removed for lack of a stored path
    pub removed: usize,
}

/// A start tag found in the content
struct StartTag<'c> {
    start: usize,
    end: usize,
    name: &'c str,
    text: &'c str,
    /// Offset in `text` where the attributes begin
    attributes_at: usize,
}

/// Byte range of a `src` attribute inside a tag, with its raw value
struct SrcAttribute<'t> {
    start: usize,
    end: usize,
    value: &'t str,
}

/// Start tags of a document in order, skipping comments and raw text
struct StartTags<'c> {
    content: &'c str,
    pos: usize,
}

impl<'c> StartTags<'c> {
    fn new(content: &'c str) -> Self {
        Self { content, pos: 0 }
    }
}

impl<'c> Iterator for StartTags<'c> {
    type Item = StartTag<'c>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(caps) = TOKEN_RE.captures_at(self.content, self.pos) {
            let whole = caps.get(0)?;
            self.pos = whole.end();

            let Some(name) = caps.name("name") else {
                continue;
            };
            if caps.name("close").is_some() {
                continue;
            }

            let name = name.as_str();
            if RAW_TEXT_ELEMENTS.iter().any(|raw| raw.eq_ignore_ascii_case(name)) {
                self.pos = raw_text_end(self.content, self.pos, name);
            }
            return Some(StartTag {
                start: whole.start(),
                end: whole.end(),
                name,
                text: whole.as_str(),
                attributes_at: 1 + name.len(),
            });
        }
        self.pos = self.content.len();
        None
    }
}

impl<'c> StartTag<'c> {
    fn is_img(&self) -> bool {
        self.name.eq_ignore_ascii_case("img")
    }

    /// The first `src` attribute. `None` for a bare `src` with no value.
    fn src(&self) -> Option<SrcAttribute<'c>> {
        let text: &'c str = self.text;
        let attributes = &text[self.attributes_at..];
        for caps in ATTRIBUTE_RE.captures_iter(attributes) {
            let name = caps.get(1)?;
            if !name.as_str().eq_ignore_ascii_case("src") {
                continue;
            }
            let value = caps.get(2).or_else(|| caps.get(3)).or_else(|| caps.get(4))?;
            let whole = caps.get(0)?;
            return Some(SrcAttribute {
                start: self.attributes_at + name.start(),
                end: self.attributes_at + whole.end(),
                value: value.as_str(),
            });
        }
        None
    }

    /// The `src` of an `<img>` carrying an inline source
    fn inline_src(&self) -> Option<SrcAttribute<'c>> {
        if !self.is_img() {
            return None;
        }
        self.src().filter(|src| is_inline_source(src.value))
    }
}

/// Rewrite inline `<img>` sources in `content` to the `stored` paths, in
/// document order.
pub fn reconcile(content: &str, stored: Vec<String>) -> Reconciled {
    let mut output = String::with_capacity(content.len());
    let mut remaining = stored.iter();
    let mut rewritten = 0;
    let mut removed = 0;
    let mut last = 0;

    for tag in StartTags::new(content) {
        let Some(src) = tag.inline_src() else {
            continue;
        };

        output.push_str(&content[last..tag.start]);
        match remaining.next() {
            Some(path) => {
                output.push_str(&tag.text[..src.start]);
                output.push_str("src=\"");
                output.push_str(&escape_attribute(path));
                output.push('"');
                output.push_str(&tag.text[src.end..]);
                rewritten += 1;
            }
            None => removed += 1,
        }
        last = tag.end;
    }
    output.push_str(&content[last..]);

    if rewritten + removed > 0 {
        tracing::debug!(
            rewritten,
            removed,
            unconsumed = stored.len() - rewritten,
            "reconciled inline images"
        );
    }

    Reconciled {
        content: output,
        images: stored,
        rewritten,
        removed,
    }
}

/// Whether `content` still carries an inline image source
pub fn has_inline_images(content: &str) -> bool {
    StartTags::new(content).any(|tag| tag.inline_src().is_some())
}

/// Offset of the `</name` closing a raw-text element, or end of input
fn raw_text_end(content: &str, from: usize, name: &str) -> usize {
    let bytes = content.as_bytes();
    let mut at = from;
    while let Some(offset) = content[at..].find("</") {
        let close = at + offset;
        let after = close + 2 + name.len();
        let same_name = bytes
            .get(close + 2..after)
            .is_some_and(|n| n.eq_ignore_ascii_case(name.as_bytes()));
        let terminated = bytes
            .get(after)
            .map_or(true, |b| b.is_ascii_whitespace() || *b == b'/' || *b == b'>');
        if same_name && terminated {
            return close;
        }
        at = close + 2;
    }
    content.len()
}

/// A `data:` URL once character references are decoded and the URL
/// whitespace rules applied (leading controls trimmed, tabs and newlines
/// dropped)
fn is_inline_source(value: &str) -> bool {
    let decoded = decode_char_refs(value);
    let mut chars = decoded
        .trim_start_matches(|c: char| c <= ' ')
        .chars()
        .filter(|c| !matches!(*c, '\t' | '\n' | '\r'));
    "data:"
        .chars()
        .all(|expected| chars.next().is_some_and(|c| c.eq_ignore_ascii_case(&expected)))
}

/// Decode numeric character references and the ASCII named ones
fn decode_char_refs(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }
    CHAR_REF_RE.replace_all(value, |caps: &Captures<'_>| {
        let numeric = caps
            .get(1)
            .map(|hex| u32::from_str_radix(hex.as_str(), 16))
            .or_else(|| caps.get(2).map(|dec| dec.as_str().parse::<u32>()));
        match numeric {
            Some(code) => code
                .ok()
                .filter(|c| *c != 0)
                .and_then(char::from_u32)
                .unwrap_or('\u{FFFD}')
                .to_string(),
            None => caps
                .get(3)
                .and_then(|name| named_char_ref(name.as_str()))
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string()),
        }
    })
}

fn named_char_ref(name: &str) -> Option<char> {
    let c = match name {
        "amp" | "AMP" => '&',
        "lt" | "LT" => '<',
        "gt" | "GT" => '>',
        "quot" | "QUOT" => '"',
        "apos" => '\'',
        "colon" => ':',
        "semi" => ';',
        "comma" => ',',
        "period" => '.',
        "sol" => '/',
        "num" => '#',
        "excl" => '!',
        "lpar" => '(',
        "rpar" => ')',
        "Tab" => '\t',
        "NewLine" => '\n',
        "nbsp" => '\u{a0}',
        _ => return None,
    };
    Some(c)
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
