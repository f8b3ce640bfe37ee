//! Capabilities the engine consumes from its host environment.
//!
//! A host provides a mutable document tree ([`Document`]), a way to subscribe
//! to tree mutations ([`MutationSource`]), a way to run work after the current
//! task settles ([`TaskScheduler`]) and a blocking yes/no prompt
//! ([`ConfirmPrompt`]). [`crate::Dom`] and [`crate::Page`] are the in-crate
//! implementations.

use crate::Result;
use crate::selector::Selector;

/// Opaque handle to a node of a host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element,
    Text,
}

/// Event listeners the engine attaches to document nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Listener {
    /// Capture-phase click interceptor on a neutralized link.
    HoledLinkRestore,
}

impl Listener {
    pub fn event_type(self) -> &'static str {
        match self {
            Self::HoledLinkRestore => "click",
        }
    }

    pub fn capture(self) -> bool {
        match self {
            Self::HoledLinkRestore => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(usize);

impl ObserverId {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Which mutations an observer wants to hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObserverInit {
    pub child_list: bool,
    pub subtree: bool,
    pub attributes: bool,
    pub character_data: bool,
}

impl ObserverInit {
    pub fn child_list_subtree() -> Self {
        Self {
            child_list: true,
            subtree: true,
            ..Self::default()
        }
    }

    pub fn wants(&self, kind: &MutationKind) -> bool {
        match kind {
            MutationKind::ChildList => self.child_list,
            MutationKind::Attributes { .. } => self.attributes,
            MutationKind::CharacterData => self.character_data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    Attributes { name: String },
    CharacterData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
}

impl MutationRecord {
    pub fn child_list(target: NodeId, added_nodes: Vec<NodeId>, removed_nodes: Vec<NodeId>) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
            added_nodes,
            removed_nodes,
        }
    }
}

/// Work a [`TaskScheduler`] hands back to the engine when it comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredTask {
    Rescan,
}

/// A queryable, mutable document tree.
///
/// Lookups on a node the host no longer knows about return `None`/`false`;
/// writes return an error. The engine treats both as "skip this node".
pub trait Document {
    fn root(&self) -> NodeId;

    fn node_kind(&self, node: NodeId) -> Option<NodeKind>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn first_child(&self, node: NodeId) -> Option<NodeId>;

    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;

    /// Lowercase tag name, `None` for non-elements.
    fn tag_name(&self, node: NodeId) -> Option<&str>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<()>;

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<()>;

    /// Character data of a text node.
    fn text(&self, node: NodeId) -> Option<&str>;

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<()>;

    /// Out-of-band processed flag. Never serialized, never cleared.
    fn is_processed(&self, node: NodeId) -> bool;

    fn set_processed(&mut self, node: NodeId) -> Result<()>;

    fn add_listener(&mut self, node: NodeId, listener: Listener) -> Result<()>;

    fn remove_listener(&mut self, node: NodeId, listener: Listener) -> Result<bool>;

    fn has_listener(&self, node: NodeId, listener: Listener) -> bool;

    fn is_element(&self, node: NodeId) -> bool {
        matches!(self.node_kind(node), Some(NodeKind::Element))
    }

    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node).filter(|parent| self.is_element(*parent))
    }

    /// Nearest inclusive ancestor element matching `selector`.
    fn closest(&self, node: NodeId, selector: &Selector) -> Option<NodeId> {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if selector.matches(self, current) {
                return Some(current);
            }
            cursor = self.parent_element(current);
        }
        None
    }

    /// Every element under the root matching `selector`, in document order.
    fn query_selector_all(&self, selector: &Selector) -> Vec<NodeId> {
        let root = self.root();
        let mut matched = Vec::new();
        let mut stack = Vec::new();
        let mut child = self.first_child(root);
        while let Some(node) = child {
            stack.push(node);
            child = self.next_sibling(node);
        }
        stack.reverse();

        while let Some(node) = stack.pop() {
            if selector.matches(self, node) {
                matched.push(node);
            }
            let mut children = Vec::new();
            let mut child = self.first_child(node);
            while let Some(current) = child {
                children.push(current);
                child = self.next_sibling(current);
            }
            stack.extend(children.into_iter().rev());
        }
        matched
    }
}

/// Mutation-notification subscription.
pub trait MutationSource {
    fn observe(&mut self, target: NodeId, init: ObserverInit) -> Result<ObserverId>;
}

/// Task deferral: run a task later, after the current work and any pending
/// notifications have settled.
pub trait TaskScheduler {
    fn defer(&mut self, task: DeferredTask, delay_ms: i64);
}

/// Synchronous, blocking yes/no question to the user.
pub trait ConfirmPrompt {
    fn confirm(&mut self, message: &str) -> bool;
}
