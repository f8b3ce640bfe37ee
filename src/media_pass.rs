use super::*;
use crate::engine::PassContext;
use crate::expansion::expand_hole_scope;
use crate::marker::{apply_holing_scope, is_processed};

/// Flags every unprocessed image whose `src` or `alt` matches.
///
/// The walk only skips, never rejects: images nested under a processed
/// element are still reached.
pub(crate) fn run_media_pass<D: Document + ?Sized>(doc: &mut D, ctx: &mut PassContext<'_>) {
    let table = ctx.table;
    let config = ctx.config;
    let image_tag = config.image_tag();
    let mut filter = |doc: &D, node: NodeId| {
        if is_processed(doc, node) || doc.tag_name(node) != Some(image_tag) {
            return FilterResult::Skip;
        }
        if table.matches_any(doc.attribute(node, "src"))
            || table.matches_any(doc.attribute(node, "alt"))
        {
            FilterResult::Accept
        } else {
            FilterResult::Skip
        }
    };

    let mut walker = TreeWalker::new(doc.root(), WhatToShow::Element);
    while let Some(image) = walker.next_node(&*doc, &mut filter) {
        if !apply_holing_scope(doc, image, config) {
            continue;
        }
        ctx.report.images += 1;
        ctx.trace.line(TraceCategory::Passes, || {
            let via = if table.matches_any(doc.attribute(image, "src")) {
                "src"
            } else {
                "alt"
            };
            format!("[pass] image node={} via={via}", image.index())
        });
        expand_hole_scope(doc, image, ctx);
    }
}
