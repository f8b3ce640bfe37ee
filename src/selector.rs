use super::*;

/// One compound step: `tag#id.class[attr=value]`, every part optional but
/// at least one present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, String)>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches<D: Document + ?Sized>(&self, doc: &D, node: NodeId) -> bool {
        let Some(tag) = doc.tag_name(node) else {
            return false;
        };
        if self.tag.as_deref().is_some_and(|want| want != tag) {
            return false;
        }
        if self
            .id
            .as_deref()
            .is_some_and(|id| doc.attribute(node, "id") != Some(id))
        {
            return false;
        }
        let classes = doc.attribute(node, "class").unwrap_or_default();
        self.classes
            .iter()
            .all(|class| classes.split_ascii_whitespace().any(|have| have == class))
            && self
                .attrs
                .iter()
                .all(|(name, value)| doc.attribute(node, name) == Some(value.as_str()))
    }
}

/// A parsed selector list such as `li, article`, `#feed a` or
/// `a[href="/story/1"]`.
///
/// Compounds take a type, an id, classes and `[attr=value]` equality tests,
/// and are joined by whitespace (descendant). Anything else, including
/// other attribute operators, child or sibling combinators and
/// pseudo-classes, is rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    groups: Vec<Vec<Compound>>,
}

impl Selector {
    pub fn parse(selector: &str) -> Result<Self> {
        let source = selector.trim();
        let groups = SelectorScanner::new(source)
            .groups()
            .ok_or_else(|| Error::UnsupportedSelector(selector.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            groups,
        })
    }

    /// Matches any element whose tag is one of `tags`.
    pub fn any_tag(tags: &[&str]) -> Self {
        let groups = tags
            .iter()
            .map(|tag| {
                vec![Compound {
                    tag: Some(tag.to_ascii_lowercase()),
                    ..Compound::default()
                }]
            })
            .collect();
        Self {
            source: tags.join(", "),
            groups,
        }
    }

    /// `tag[attr="value"]` built without going through the parser, so any
    /// value (quotes, brackets) is matched verbatim.
    pub fn tag_with_attr_eq(tag: &str, attr: &str, value: &str) -> Self {
        Self::single(
            format!("{tag}[{attr}={value:?}]"),
            Compound {
                tag: Some(tag.to_ascii_lowercase()),
                attrs: vec![(attr.to_ascii_lowercase(), value.to_string())],
                ..Compound::default()
            },
        )
    }

    /// `[attr="value"]` on any element.
    pub fn attr_eq(attr: &str, value: &str) -> Self {
        Self::single(
            format!("[{attr}={value:?}]"),
            Compound {
                attrs: vec![(attr.to_ascii_lowercase(), value.to_string())],
                ..Compound::default()
            },
        )
    }

    fn single(source: String, compound: Compound) -> Self {
        Self {
            source,
            groups: vec![vec![compound]],
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches<D: Document + ?Sized>(&self, doc: &D, node: NodeId) -> bool {
        self.groups
            .iter()
            .any(|chain| matches_descendant_chain(doc, node, chain))
    }
}

/// The last compound must match `node`; each earlier one must match some
/// ancestor above the previous hit. Taking the nearest hit is enough with
/// only descendant combinators.
fn matches_descendant_chain<D: Document + ?Sized>(
    doc: &D,
    node: NodeId,
    chain: &[Compound],
) -> bool {
    let Some((subject, ancestors)) = chain.split_last() else {
        return false;
    };
    if !subject.matches(doc, node) {
        return false;
    }
    let mut cursor = doc.parent_element(node);
    for compound in ancestors.iter().rev() {
        loop {
            let Some(current) = cursor else {
                return false;
            };
            cursor = doc.parent_element(current);
            if compound.matches(doc, current) {
                break;
            }
        }
    }
    true
}

struct SelectorScanner<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> SelectorScanner<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos).copied()
    }

    fn at_whitespace(&self) -> bool {
        self.peek().is_some_and(|b| b.is_ascii_whitespace())
    }

    fn skip_whitespace(&mut self) {
        while self.at_whitespace() {
            self.pos += 1;
        }
    }

    fn groups(mut self) -> Option<Vec<Vec<Compound>>> {
        let mut groups = Vec::new();
        let mut chain = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some(b',') => {
                    if chain.is_empty() {
                        return None;
                    }
                    groups.push(std::mem::take(&mut chain));
                    self.pos += 1;
                }
                Some(_) => {
                    chain.push(self.compound()?);
                    if !(self.at_whitespace() || matches!(self.peek(), None | Some(b','))) {
                        return None;
                    }
                }
            }
        }
        if chain.is_empty() {
            return None;
        }
        groups.push(chain);
        Some(groups)
    }

    fn ident(&mut self) -> Option<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            self.pos += 1;
        }
        (self.pos > start).then(|| self.source[start..self.pos].to_string())
    }

    fn compound(&mut self) -> Option<Compound> {
        let mut compound = Compound::default();
        if self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
            compound.tag = Some(self.ident()?.to_ascii_lowercase());
        }
        loop {
            match self.peek() {
                Some(b'#') => {
                    self.pos += 1;
                    let id = self.ident()?;
                    if compound.id.replace(id).is_some() {
                        return None;
                    }
                }
                Some(b'.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some(b'[') => {
                    self.pos += 1;
                    compound.attrs.push(self.attr_eq()?);
                }
                _ => break,
            }
        }
        (!compound.is_empty()).then_some(compound)
    }

    /// `name=value]`, `name="value"]` or `name='value']`; the opening
    /// bracket is already consumed.
    fn attr_eq(&mut self) -> Option<(String, String)> {
        self.skip_whitespace();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_whitespace();
        if self.peek() != Some(b'=') {
            return None;
        }
        self.pos += 1;
        self.skip_whitespace();
        let value = match self.peek()? {
            quote @ (b'"' | b'\'') => {
                let start = self.pos + 1;
                let len = self.source[start..].find(char::from(quote))?;
                self.pos = start + len + 1;
                self.source[start..start + len].to_string()
            }
            _ => self.ident()?,
        };
        self.skip_whitespace();
        if self.peek() != Some(b']') {
            return None;
        }
        self.pos += 1;
        Some((name, value))
    }
}
