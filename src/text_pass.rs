use super::*;
use crate::engine::PassContext;
use crate::expansion::expand_hole_scope;
use crate::marker::{is_processed, mark_processed};

/// Rewrites every unprocessed text node that matches the pattern table.
///
/// Processed nodes are skipped, non-matching ones are rejected and left
/// unmarked so a later table or content change can still pick them up.
pub(crate) fn run_text_pass<D: Document + ?Sized>(doc: &mut D, ctx: &mut PassContext<'_>) {
    let table = ctx.table;
    let mut filter = |doc: &D, node: NodeId| {
        if is_processed(doc, node) {
            FilterResult::Skip
        } else if table.matches_any(doc.text(node)) {
            FilterResult::Accept
        } else {
            FilterResult::Reject
        }
    };

    let mut walker = TreeWalker::new(doc.root(), WhatToShow::Text);
    while let Some(node) = walker.next_node(&*doc, &mut filter) {
        rewrite_text_node(doc, node, ctx);
    }
}

fn rewrite_text_node<D: Document + ?Sized>(doc: &mut D, node: NodeId, ctx: &mut PassContext<'_>) {
    let Some(current) = doc.text(node).map(str::to_string) else {
        return;
    };
    let rewritten = ctx.table.rewrite_all(Some(current.as_str()));
    if rewritten != current && doc.set_text(node, &rewritten).is_err() {
        return;
    }
    if !mark_processed(doc, node) {
        return;
    }
    ctx.report.text_nodes += 1;
    ctx.trace.line(TraceCategory::Passes, || {
        format!("[pass] text node={} {current:?} -> {rewritten:?}", node.index())
    });

    if let Some(parent) = doc.parent_element(node) {
        expand_hole_scope(doc, parent, ctx);
    }
}
