use super::*;
use crate::dom::Dom;
use std::collections::HashMap;

const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Start tags that end an open `p`.
const PARAGRAPH_CLOSERS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "div",
    "dl",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "ul",
];

const LIST_SCOPES: &[&str] = &["ul", "ol", "menu"];

pub(crate) fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Builds a [`Dom`] from an HTML document or fragment.
///
/// A forgiving fixture parser, not an HTML5 tree builder: an end tag closes
/// up to the nearest open element of that name and is ignored otherwise,
/// `li` and `p` close implicitly, `script`/`style` bodies are raw text,
/// comments and declarations are dropped.
pub(crate) fn parse_html(html: &str) -> Result<Dom> {
    let mut cursor = HtmlCursor { html, pos: 0 };
    let mut builder = TreeBuilder::new();

    while !cursor.at_end() {
        if cursor.eat("<!--") {
            cursor
                .skip_past("-->")
                .ok_or_else(|| Error::HtmlParse("unclosed HTML comment".into()))?;
        } else if cursor.eat("</") {
            let name = cursor.end_tag()?;
            builder.close(&name);
        } else if cursor.eat("<!") {
            cursor
                .skip_past(">")
                .ok_or_else(|| Error::HtmlParse("unclosed declaration".into()))?;
        } else if cursor.at_start_tag() {
            let tag = cursor.start_tag()?;
            let raw = !tag.self_closing && RAW_TEXT_TAGS.contains(&tag.name.as_str());
            let name = tag.name.clone();
            let node = builder.open(tag);
            if raw {
                let body = cursor.raw_text(&name)?;
                builder.raw_text(node, body);
            }
        } else {
            builder.text(decode_entities(cursor.text()));
        }
    }

    Ok(builder.dom)
}

struct StartTag {
    name: String,
    attrs: HashMap<String, String>,
    self_closing: bool,
}

struct TreeBuilder {
    dom: Dom,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    fn new() -> Self {
        let dom = Dom::new();
        let open = vec![dom.root()];
        Self { dom, open }
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or_else(|| self.dom.root())
    }

    fn current_is(&self, name: &str) -> bool {
        self.open.len() > 1 && self.dom.tag_name(self.current()) == Some(name)
    }

    fn open(&mut self, tag: StartTag) -> NodeId {
        if tag.name == "li" {
            self.close_open_list_item();
        }
        if PARAGRAPH_CLOSERS.contains(&tag.name.as_str()) && self.current_is("p") {
            self.open.pop();
        }

        let stays_open = !tag.self_closing
            && !is_void_tag(&tag.name)
            && !RAW_TEXT_TAGS.contains(&tag.name.as_str());
        let node = self.dom.create_element(self.current(), tag.name, tag.attrs);
        if stays_open {
            self.open.push(node);
        }
        node
    }

    fn close_open_list_item(&mut self) {
        for index in (1..self.open.len()).rev() {
            match self.dom.tag_name(self.open[index]) {
                Some("li") => {
                    self.open.truncate(index);
                    return;
                }
                Some(tag) if LIST_SCOPES.contains(&tag) => return,
                _ => {}
            }
        }
    }

    fn close(&mut self, name: &str) {
        let found = self
            .open
            .iter()
            .skip(1)
            .rposition(|node| self.dom.tag_name(*node) == Some(name));
        if let Some(index) = found {
            self.open.truncate(index + 1);
        }
    }

    fn text(&mut self, text: String) {
        if !text.is_empty() {
            let parent = self.current();
            self.dom.create_text(parent, text);
        }
    }

    fn raw_text(&mut self, node: NodeId, body: &str) {
        if !body.is_empty() {
            self.dom.create_text(node, body.to_string());
        }
    }
}

struct HtmlCursor<'a> {
    html: &'a str,
    pos: usize,
}

impl<'a> HtmlCursor<'a> {
    fn rest(&self) -> &'a str {
        &self.html[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.html.len()
    }

    fn peek(&self) -> Option<u8> {
        self.html.as_bytes().get(self.pos).copied()
    }

    fn eat(&mut self, prefix: &str) -> bool {
        let hit = self.rest().starts_with(prefix);
        if hit {
            self.pos += prefix.len();
        }
        hit
    }

    fn skip_past(&mut self, needle: &str) -> Option<()> {
        let at = self.rest().find(needle)?;
        self.pos += at + needle.len();
        Some(())
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn at_start_tag(&self) -> bool {
        self.peek() == Some(b'<')
            && self
                .html
                .as_bytes()
                .get(self.pos + 1)
                .is_some_and(u8::is_ascii_alphabetic)
    }

    /// Tag or attribute name, lowercased.
    fn name(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':'))
        {
            self.pos += 1;
        }
        self.html[start..self.pos].to_ascii_lowercase()
    }

    /// Character data up to the next tag, comment or declaration. A `<` that
    /// opens none of those is kept as text.
    fn text(&mut self) -> &'a str {
        let start = self.pos;
        let mut from = start + usize::from(self.peek() == Some(b'<'));
        let end = loop {
            let Some(at) = self.html[from..].find('<').map(|at| from + at) else {
                break self.html.len();
            };
            let opens = self
                .html
                .as_bytes()
                .get(at + 1)
                .is_some_and(|b| b.is_ascii_alphabetic() || matches!(b, b'/' | b'!'));
            if opens {
                break at;
            }
            from = at + 1;
        };
        self.pos = end;
        &self.html[start..end]
    }

    /// Called after `</`.
    fn end_tag(&mut self) -> Result<String> {
        self.skip_whitespace();
        let name = self.name();
        self.skip_past(">")
            .ok_or_else(|| Error::HtmlParse(format!("unclosed end tag </{name}")))?;
        Ok(name)
    }

    fn start_tag(&mut self) -> Result<StartTag> {
        self.pos += 1;
        let name = self.name();
        let mut attrs = HashMap::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(Error::HtmlParse(format!("unclosed start tag <{name}"))),
                Some(b'>') => {
                    self.pos += 1;
                    return Ok(StartTag {
                        name,
                        attrs,
                        self_closing: false,
                    });
                }
                Some(b'/') if self.rest().starts_with("/>") => {
                    self.pos += 2;
                    return Ok(StartTag {
                        name,
                        attrs,
                        self_closing: true,
                    });
                }
                Some(b) if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':') => {
                    let attr = self.name();
                    self.skip_whitespace();
                    let value = if self.eat("=") {
                        self.skip_whitespace();
                        self.attr_value()?
                    } else {
                        String::new()
                    };
                    // First occurrence wins, as in browsers.
                    attrs.entry(attr).or_insert(value);
                }
                // Stray quotes, slashes and the like.
                Some(_) => self.pos += 1,
            }
        }
    }

    fn attr_value(&mut self) -> Result<String> {
        if let Some(quote @ (b'"' | b'\'')) = self.peek() {
            self.pos += 1;
            let len = self
                .rest()
                .find(char::from(quote))
                .ok_or_else(|| Error::HtmlParse("unclosed quoted attribute value".into()))?;
            let raw = &self.rest()[..len];
            self.pos += len + 1;
            return Ok(decode_entities(raw));
        }
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| !b.is_ascii_whitespace() && b != b'>')
        {
            self.pos += 1;
        }
        Ok(decode_entities(&self.html[start..self.pos]))
    }

    /// Body of a raw-text element up to its end tag, which is consumed too.
    fn raw_text(&mut self, name: &str) -> Result<&'a str> {
        let needle = format!("</{name}");
        let at = self
            .rest()
            .to_ascii_lowercase()
            .find(&needle)
            .ok_or_else(|| Error::HtmlParse(format!("unclosed <{name}>")))?;
        let body = &self.rest()[..at];
        self.pos += at + 2;
        self.end_tag()?;
        Ok(body)
    }
}

fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp + 1..];
        let len = rest
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '#'))
            .unwrap_or(rest.len());
        match decode_entity(&rest[..len]) {
            Some(ch) => {
                out.push(ch);
                rest = &rest[len..];
                rest = rest.strip_prefix(';').unwrap_or(rest);
            }
            // Unknown references stay literal.
            None => out.push('&'),
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        return char::from_u32(code);
    }
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        _ => return None,
    };
    Some(ch)
}
