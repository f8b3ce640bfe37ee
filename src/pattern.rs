use super::*;
use crate::regex::{Regex, RegexBuilder, escape};
use std::borrow::Cow;

const DEFAULT_BACKTRACK_LIMIT: usize = 1_000_000;

const DEFAULT_ENTRIES: &[(&[&str], &str)] = &[
    (
        &["donald j. trump", "donald j trump", "donald trump", "trump"],
        "Orange Man",
    ),
    (&["elon musk", "elon", "musk"], "Some Guy"),
    (&["robert f. kennedy", "rfk", "kennedy"], "Worm Brain"),
    (&["j.d. vance", "jd vance", "vance"], "Sofa King"),
    (&["make america great again", "maga"], "Death Cult"),
];

/// One match-and-replace rule.
///
/// The matcher only fires on whole words: a hit must not be preceded or
/// followed by an ASCII letter, and letters compare case-insensitively.
#[derive(Debug, Clone)]
pub struct PatternEntry {
    matcher: Regex,
    replacement: String,
}

impl PatternEntry {
    /// Builds an entry matching any of `aliases` as literal phrases.
    pub fn from_aliases(aliases: &[&str], replacement: &str) -> Result<Self> {
        if aliases.is_empty() || aliases.iter().any(|alias| alias.trim().is_empty()) {
            return Err(Error::PatternCompile {
                pattern: aliases.join("|"),
                message: "aliases must be non-empty".into(),
            });
        }
        let alternation = aliases
            .iter()
            .map(|alias| escape(alias.trim()))
            .collect::<Vec<Cow<'_, str>>>()
            .join("|");
        Self::from_pattern(&alternation, replacement)
    }

    /// Builds an entry from a regex alternation body. The body is wrapped in
    /// the word-boundary guards, so it must not carry its own.
    pub fn from_pattern(body: &str, replacement: &str) -> Result<Self> {
        let source = format!("(?<![a-z])({body})(?![a-z])");
        let matcher = RegexBuilder::new(&source)
            .case_insensitive(true)
            .backtrack_limit(DEFAULT_BACKTRACK_LIMIT)
            .build()
            .map_err(|err| Error::PatternCompile {
                pattern: source.clone(),
                message: err.to_string(),
            })?;
        Ok(Self {
            matcher,
            replacement: replacement.to_string(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.matcher.as_str()
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// A matcher that errors out at runtime (backtrack limit) counts as a
    /// miss.
    pub fn is_match(&self, text: &str) -> bool {
        self.matcher.is_match(text).unwrap_or(false)
    }

    pub fn rewrite<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.matcher
            .replace_all_literal(text, &self.replacement)
            .unwrap_or(Cow::Borrowed(text))
    }
}

/// Ordered list of [`PatternEntry`] values.
#[derive(Debug, Clone)]
pub struct PatternTable {
    entries: Vec<PatternEntry>,
}

impl PatternTable {
    pub fn builder() -> PatternTableBuilder {
        PatternTableBuilder::default()
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The five stock entries, in rewrite order.
    pub fn stock() -> Result<Self> {
        DEFAULT_ENTRIES
            .iter()
            .fold(Self::builder(), |builder, (aliases, replacement)| {
                builder.entry(aliases, replacement)
            })
            .build()
    }

    pub fn from_entries(entries: Vec<PatternEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, entry: PatternEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// True when at least one entry matches. Stops at the first hit.
    pub fn matches_any(&self, text: Option<&str>) -> bool {
        let text = text.unwrap_or_default();
        if text.is_empty() {
            return false;
        }
        self.entries.iter().any(|entry| entry.is_match(text))
    }

    /// Applies every entry in table order, each one to the output of the
    /// previous.
    pub fn rewrite_all(&self, text: Option<&str>) -> String {
        let mut out = text.unwrap_or_default().to_string();
        for entry in &self.entries {
            if let Cow::Owned(next) = entry.rewrite(&out) {
                out = next;
            }
        }
        out
    }
}

impl Default for PatternTable {
    /// Same as [`PatternTable::stock`].
    ///
    /// # Panics
    ///
    /// Only if a stock alias stops compiling, which
    /// `stock_table_compiles` in the unit tests rules out.
    fn default() -> Self {
        Self::stock().unwrap_or_else(|err| panic!("stock pattern table failed to compile: {err}"))
    }
}

#[derive(Debug, Default)]
pub struct PatternTableBuilder {
    pending: Vec<PendingEntry>,
}

#[derive(Debug)]
enum PendingEntry {
    Aliases {
        aliases: Vec<String>,
        replacement: String,
    },
    Pattern {
        body: String,
        replacement: String,
    },
}

impl PatternTableBuilder {
    pub fn entry(mut self, aliases: &[&str], replacement: &str) -> Self {
        self.pending.push(PendingEntry::Aliases {
            aliases: aliases.iter().map(|alias| alias.to_string()).collect(),
            replacement: replacement.to_string(),
        });
        self
    }

    pub fn raw_entry(mut self, body: &str, replacement: &str) -> Self {
        self.pending.push(PendingEntry::Pattern {
            body: body.to_string(),
            replacement: replacement.to_string(),
        });
        self
    }

    pub fn build(self) -> Result<PatternTable> {
        let mut entries = Vec::with_capacity(self.pending.len());
        for pending in self.pending {
            let entry = match pending {
                PendingEntry::Aliases {
                    aliases,
                    replacement,
                } => {
                    let aliases = aliases.iter().map(String::as_str).collect::<Vec<_>>();
                    PatternEntry::from_aliases(&aliases, &replacement)?
                }
                PendingEntry::Pattern { body, replacement } => {
                    PatternEntry::from_pattern(&body, &replacement)?
                }
            };
            entries.push(entry);
        }
        Ok(PatternTable { entries })
    }
}
