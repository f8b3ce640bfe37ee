use super::*;

pub(crate) fn is_processed<D: Document + ?Sized>(doc: &D, node: NodeId) -> bool {
    doc.is_processed(node)
}

/// Sets the processed flag. Returns false if the node is gone.
pub(crate) fn mark_processed<D: Document + ?Sized>(doc: &mut D, node: NodeId) -> bool {
    doc.set_processed(node).is_ok()
}

/// Writes the visible marker attribute on an element. Non-elements and
/// elements that already carry the marker are left alone.
pub(crate) fn apply_hole_marker<D: Document + ?Sized>(
    doc: &mut D,
    node: NodeId,
    config: &HoleConfig,
) -> bool {
    if !doc.is_element(node) {
        return false;
    }
    if doc.attribute(node, config.marker_attribute()) == Some(config.marker_value()) {
        return false;
    }
    doc.set_attribute(node, config.marker_attribute(), config.marker_value())
        .is_ok()
}

/// Visible marker plus processed flag, once. Returns true only for the call
/// that actually claimed the node.
pub(crate) fn apply_holing_scope<D: Document + ?Sized>(
    doc: &mut D,
    node: NodeId,
    config: &HoleConfig,
) -> bool {
    if is_processed(doc, node) || doc.node_kind(node).is_none() {
        return false;
    }
    apply_hole_marker(doc, node, config);
    mark_processed(doc, node)
}
