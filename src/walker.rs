use super::*;

/// Node kinds a [`TreeWalker`] hands to its filter. Other kinds are skipped
/// without consulting the filter, so their children are still visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhatToShow {
    Text,
    Element,
    All,
}

impl WhatToShow {
    fn shows(self, kind: NodeKind) -> bool {
        match self {
            Self::Text => kind == NodeKind::Text,
            Self::Element => kind == NodeKind::Element,
            Self::All => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    /// Yield the node.
    Accept,
    /// Do not yield the node, but descend into it.
    Skip,
    /// Do not yield the node nor anything below it.
    Reject,
}

/// Pre-order, filtered walk over the subtree under `root`.
///
/// The walker holds no snapshot: each step starts from the current node and
/// reads the live tree, so nodes inserted ahead of the cursor are visited and
/// the filter may mutate the node it is looking at.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    root: NodeId,
    current: NodeId,
    what_to_show: WhatToShow,
}

impl TreeWalker {
    pub fn new(root: NodeId, what_to_show: WhatToShow) -> Self {
        Self {
            root,
            current: root,
            what_to_show,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn current_node(&self) -> NodeId {
        self.current
    }

    fn filter<D, F>(&self, doc: &D, node: NodeId, filter: &mut F) -> FilterResult
    where
        D: Document + ?Sized,
        F: FnMut(&D, NodeId) -> FilterResult,
    {
        match doc.node_kind(node) {
            Some(kind) if self.what_to_show.shows(kind) => filter(doc, node),
            _ => FilterResult::Skip,
        }
    }

    /// Advances to the next accepted node in document order.
    pub fn next_node<D, F>(&mut self, doc: &D, filter: &mut F) -> Option<NodeId>
    where
        D: Document + ?Sized,
        F: FnMut(&D, NodeId) -> FilterResult,
    {
        let mut node = self.current;
        let mut result = FilterResult::Accept;

        loop {
            while result != FilterResult::Reject {
                let Some(child) = doc.first_child(node) else {
                    break;
                };
                node = child;
                result = self.filter(doc, node, filter);
                if result == FilterResult::Accept {
                    self.current = node;
                    return Some(node);
                }
            }

            let mut cursor = Some(node);
            let mut sibling = None;
            while let Some(current) = cursor {
                if current == self.root {
                    return None;
                }
                if let Some(next) = doc.next_sibling(current) {
                    sibling = Some(next);
                    break;
                }
                cursor = doc.parent(current);
            }

            // Walked off a detached subtree.
            node = sibling?;
            result = self.filter(doc, node, filter);
            if result == FilterResult::Accept {
                self.current = node;
                return Some(node);
            }
        }
    }
}
