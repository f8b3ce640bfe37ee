use super::*;
use crate::html::{is_void_tag, parse_html};
use std::collections::HashMap;

const DUMP_STACK_SIZE: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Position in `parent.children`; meaningless while detached.
    index_in_parent: usize,
    pub(crate) node_type: NodeType,
    processed: bool,
    listeners: Vec<Listener>,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: HashMap<String, String>,
}

/// Arena-backed document tree.
///
/// Nodes are never freed: a removed node keeps its id, its data and its
/// processed flag, and simply stops being reachable from the root. Every
/// tree, attribute and character-data change made through the public API is
/// appended to a mutation log that a host drains with
/// [`Dom::take_mutation_records`]. Nodes built by the HTML parser are not
/// logged.
#[derive(Debug, Clone)]
pub struct Dom {
    nodes: Vec<Node>,
    root: NodeId,
    mutation_log: Vec<MutationRecord>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    pub fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            index_in_parent: 0,
            node_type: NodeType::Document,
            processed: false,
            listeners: Vec::new(),
        };
        Self {
            nodes: vec![root],
            root: NodeId::from_index(0),
            mutation_log: Vec::new(),
        }
    }

    pub fn from_html(html: &str) -> Result<Self> {
        parse_html(html)
    }

    fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(node_id.index())
    }

    fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node_id.index())
    }

    fn create_node(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        let index_in_parent = parent
            .and_then(|parent_id| self.node(parent_id))
            .map_or(0, |parent| parent.children.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            index_in_parent,
            node_type,
            processed: false,
            listeners: Vec::new(),
        });
        if let Some(parent_id) = parent {
            if let Some(parent) = self.node_mut(parent_id) {
                parent.children.push(id);
            }
        }
        id
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: HashMap<String, String>,
    ) -> NodeId {
        let element = Element { tag_name, attrs };
        self.create_node(Some(parent), NodeType::Element(element))
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(Some(parent), NodeType::Text(text))
    }

    pub fn create_detached_element(&mut self, tag_name: &str) -> NodeId {
        let element = Element {
            tag_name: tag_name.to_ascii_lowercase(),
            attrs: HashMap::new(),
        };
        self.create_node(None, NodeType::Element(element))
    }

    pub fn create_detached_text(&mut self, text: &str) -> NodeId {
        self.create_node(None, NodeType::Text(text.to_string()))
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&Element> {
        match &self.node(node_id)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node_id: NodeId) -> Option<&mut Element> {
        match &mut self.node_mut(node_id)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn children(&self, node_id: NodeId) -> &[NodeId] {
        self.node(node_id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    fn can_have_children(&self, node_id: NodeId) -> bool {
        matches!(
            self.node(node_id).map(|n| &n.node_type),
            Some(NodeType::Document | NodeType::Element(_))
        )
    }

    pub fn is_descendant_of(&self, node_id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = Document::parent(self, node_id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = Document::parent(self, current);
        }
        false
    }

    pub fn is_connected(&self, node_id: NodeId) -> bool {
        node_id == self.root || self.is_descendant_of(node_id, self.root)
    }

    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        let selector = Selector::attr_eq("id", id);
        self.query_selector_all(&selector).into_iter().next()
    }

    /// Moves `child` under `parent` as its last child.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if !self.can_have_children(parent) {
            return Err(Error::HostRuntime(
                "appendChild target cannot have children".into(),
            ));
        }
        if self.node(child).is_none() || child == self.root {
            return Err(Error::HostRuntime("appendChild child is not insertable".into()));
        }
        if child == parent || self.is_descendant_of(parent, child) {
            return Err(Error::HostRuntime(
                "appendChild would create a cycle".into(),
            ));
        }

        self.detach(child);
        let index_in_parent = self.children(parent).len();
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
            node.index_in_parent = index_in_parent;
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        self.mutation_log
            .push(MutationRecord::child_list(parent, vec![child], Vec::new()));
        Ok(())
    }

    /// Detaches `node` from its parent. Removing a detached node is a no-op.
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<()> {
        if node_id == self.root {
            return Err(Error::HostRuntime("cannot remove the document".into()));
        }
        if self.node(node_id).is_none() {
            return Err(Error::HostRuntime("remove target does not exist".into()));
        }
        self.detach(node_id);
        Ok(())
    }

    fn detach(&mut self, node_id: NodeId) {
        let Some((parent, index)) = self
            .node(node_id)
            .and_then(|node| Some((node.parent?, node.index_in_parent)))
        else {
            return;
        };
        let following = match self.node_mut(parent) {
            Some(parent_node) if parent_node.children.get(index) == Some(&node_id) => {
                parent_node.children.remove(index);
                parent_node.children[index..].to_vec()
            }
            _ => Vec::new(),
        };
        for (offset, sibling) in following.into_iter().enumerate() {
            if let Some(sibling) = self.node_mut(sibling) {
                sibling.index_in_parent = index + offset;
            }
        }
        if let Some(node) = self.node_mut(node_id) {
            node.parent = None;
        }
        self.mutation_log
            .push(MutationRecord::child_list(parent, Vec::new(), vec![node_id]));
    }

    /// Parses `html` and appends the resulting nodes to `parent`.
    pub fn insert_html(&mut self, parent: NodeId, html: &str) -> Result<Vec<NodeId>> {
        if !self.can_have_children(parent) {
            return Err(Error::HostRuntime(
                "insertAdjacentHTML target cannot have children".into(),
            ));
        }
        let fragment = parse_html(html)?;
        let mut added = Vec::new();
        for child in fragment.children(fragment.root).to_vec() {
            added.push(self.clone_subtree_from_dom(&fragment, child, parent)?);
        }
        if !added.is_empty() {
            self.mutation_log
                .push(MutationRecord::child_list(parent, added.clone(), Vec::new()));
        }
        Ok(added)
    }

    fn clone_subtree_from_dom(
        &mut self,
        source: &Dom,
        source_node: NodeId,
        parent: NodeId,
    ) -> Result<NodeId> {
        let node_type = match source.node(source_node).map(|node| &node.node_type) {
            Some(NodeType::Element(element)) => NodeType::Element(element.clone()),
            Some(NodeType::Text(text)) => NodeType::Text(text.clone()),
            Some(NodeType::Document) | None => {
                return Err(Error::HostRuntime(
                    "cannot clone a document node into the tree".into(),
                ));
            }
        };

        let node = self.create_node(Some(parent), node_type);
        for child in source.children(source_node).to_vec() {
            self.clone_subtree_from_dom(source, child, node)?;
        }
        Ok(node)
    }

    /// Replaces every child of `node_id` with a single text node.
    pub fn set_text_content(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        if self.element(node_id).is_none() {
            return Err(Error::HostRuntime(
                "textContent target is not an element".into(),
            ));
        }
        let removed = self
            .node_mut(node_id)
            .map(|node| std::mem::take(&mut node.children))
            .unwrap_or_default();
        for child in &removed {
            if let Some(node) = self.node_mut(*child) {
                node.parent = None;
            }
        }
        let mut added = Vec::new();
        if !value.is_empty() {
            added.push(self.create_text(node_id, value.to_string()));
        }
        if !added.is_empty() || !removed.is_empty() {
            self.mutation_log
                .push(MutationRecord::child_list(node_id, added, removed));
        }
        Ok(())
    }

    pub fn text_content(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node_id, &mut out);
        out
    }

    fn collect_text(&self, node_id: NodeId, out: &mut String) {
        let Some(node) = self.node(node_id) else {
            return;
        };
        match &node.node_type {
            NodeType::Text(text) => out.push_str(text),
            NodeType::Document | NodeType::Element(_) => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    pub fn take_mutation_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutation_log)
    }

    pub fn has_pending_mutation_records(&self) -> bool {
        !self.mutation_log.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Serializes the connected tree. Attributes are written in name order;
    /// the processed flag and listeners are not part of the output.
    pub fn to_html(&self) -> String {
        self.dump_node(self.root)
    }

    pub fn dump_node(&self, node_id: NodeId) -> String {
        stacker::grow(DUMP_STACK_SIZE, || {
            let mut out = String::new();
            self.dump_into(node_id, &mut out);
            out
        })
    }

    fn dump_into(&self, node_id: NodeId, out: &mut String) {
        let Some(node) = self.node(node_id) else {
            return;
        };
        match &node.node_type {
            NodeType::Document => {
                for child in &node.children {
                    self.dump_into(*child, out);
                }
            }
            NodeType::Text(text) => push_escaped_text(out, text),
            NodeType::Element(element) => {
                out.push('<');
                out.push_str(&element.tag_name);
                let mut attrs = element.attrs.iter().collect::<Vec<_>>();
                attrs.sort_by(|a, b| a.0.cmp(b.0));
                for (k, v) in attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    push_escaped_attr(out, v);
                    out.push('"');
                }
                out.push('>');
                if is_void_tag(&element.tag_name) {
                    return;
                }
                for child in &node.children {
                    self.dump_into(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.tag_name);
                out.push('>');
            }
        }
    }
}

fn push_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn push_escaped_attr(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

impl Document for Dom {
    fn root(&self) -> NodeId {
        self.root
    }

    fn node_kind(&self, node: NodeId) -> Option<NodeKind> {
        Some(match self.node(node)?.node_type {
            NodeType::Document => NodeKind::Document,
            NodeType::Element(_) => NodeKind::Element,
            NodeType::Text(_) => NodeKind::Text,
        })
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.children.first().copied()
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let node = self.node(node)?;
        self.node(node.parent?)?
            .children
            .get(node.index_in_parent + 1)
            .copied()
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|element| element.tag_name.as_str())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?
            .attrs
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<()> {
        let name = name.to_ascii_lowercase();
        let element = self
            .element_mut(node)
            .ok_or_else(|| Error::HostRuntime("setAttribute target is not an element".into()))?;
        element.attrs.insert(name.clone(), value.to_string());
        self.mutation_log.push(MutationRecord {
            kind: MutationKind::Attributes { name },
            target: node,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
        });
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<()> {
        let name = name.to_ascii_lowercase();
        let element = self.element_mut(node).ok_or_else(|| {
            Error::HostRuntime("removeAttribute target is not an element".into())
        })?;
        if element.attrs.remove(&name).is_some() {
            self.mutation_log.push(MutationRecord {
                kind: MutationKind::Attributes { name },
                target: node,
                added_nodes: Vec::new(),
                removed_nodes: Vec::new(),
            });
        }
        Ok(())
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match &self.node(node)?.node_type {
            NodeType::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<()> {
        match self.node_mut(node).map(|node| &mut node.node_type) {
            Some(NodeType::Text(data)) => {
                *data = text.to_string();
            }
            _ => {
                return Err(Error::HostRuntime(
                    "character data target is not a text node".into(),
                ));
            }
        }
        self.mutation_log.push(MutationRecord {
            kind: MutationKind::CharacterData,
            target: node,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
        });
        Ok(())
    }

    fn is_processed(&self, node: NodeId) -> bool {
        self.node(node).is_some_and(|node| node.processed)
    }

    fn set_processed(&mut self, node: NodeId) -> Result<()> {
        let node = self
            .node_mut(node)
            .ok_or_else(|| Error::HostRuntime("processed marker target does not exist".into()))?;
        node.processed = true;
        Ok(())
    }

    fn add_listener(&mut self, node: NodeId, listener: Listener) -> Result<()> {
        let node = self
            .node_mut(node)
            .ok_or_else(|| Error::HostRuntime("addEventListener target does not exist".into()))?;
        // Re-registering the same callback for the same capture flag is a no-op.
        if !node.listeners.contains(&listener) {
            node.listeners.push(listener);
        }
        Ok(())
    }

    fn remove_listener(&mut self, node: NodeId, listener: Listener) -> Result<bool> {
        let node = self.node_mut(node).ok_or_else(|| {
            Error::HostRuntime("removeEventListener target does not exist".into())
        })?;
        let before = node.listeners.len();
        node.listeners.retain(|existing| *existing != listener);
        Ok(node.listeners.len() != before)
    }

    fn has_listener(&self, node: NodeId, listener: Listener) -> bool {
        self.node(node)
            .is_some_and(|node| node.listeners.contains(&listener))
    }
}
