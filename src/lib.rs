//! Mutation-driven, idempotent DOM rewriting engine.
//!
//! `memory_hole` scans a document for text and images that match a table of
//! name/phrase patterns, rewrites them in place, neutralizes the links that
//! lead to the same destination and flags the list item or article around
//! each match. Every node it touches carries a processed marker, so the
//! passes can be re-run after every batch of document mutations without
//! rewriting anything twice.
//!
//! The document, mutation notifications, task deferral and the confirmation
//! prompt are host capabilities described by the traits in [`host`]. The
//! crate ships an arena [`Dom`] and a deterministic [`Page`] host that drives
//! the engine the way a browser event loop would.

use std::error::Error as StdError;
use std::fmt;

mod config;
mod dom;
mod engine;
mod expansion;
pub mod host;
mod html;
mod marker;
mod media_pass;
mod monitor;
mod page;
mod pattern;
mod regex;
mod selector;
mod text_pass;
mod trace;
mod walker;

pub use config::HoleConfig;
pub use dom::Dom;
pub use engine::{MemoryHole, PassReport, initialize};
pub use expansion::ClickOutcome;
pub use host::{
    ConfirmPrompt, DeferredTask, Document, Listener, MutationKind, MutationRecord,
    MutationSource, NodeId, NodeKind, ObserverId, ObserverInit, TaskScheduler,
};
pub use monitor::{ChangeMonitor, MonitorState};
pub use page::{HostAction, Navigation, Page, PendingTask, TaskCallback};
pub use pattern::{PatternEntry, PatternTable, PatternTableBuilder};
pub use selector::Selector;
pub use trace::TraceCategory;
pub use walker::{FilterResult, TreeWalker, WhatToShow};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    UnsupportedSelector(String),
    SelectorNotFound(String),
    PatternCompile {
        pattern: String,
        message: String,
    },
    HostRuntime(String),
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::PatternCompile { pattern, message } => {
                write!(f, "pattern compile error for {pattern}: {message}")
            }
            Self::HostRuntime(msg) => write!(f, "host runtime error: {msg}"),
            Self::AssertionFailed {
                selector,
                expected,
                actual,
                dom_snippet,
            } => write!(
                f,
                "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
            ),
        }
    }
}

impl StdError for Error {}
