use super::*;
use crate::engine::PassContext;
use crate::marker::{apply_holing_scope, is_processed};
use crate::trace::TraceState;

/// Result of a click on a neutralized link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The user confirmed; the original destination is back.
    Restored,
    /// The user declined, or the link could not be fully restored and may
    /// still carry its stored destination or click listener.
    Kept,
    /// The node carries no stored destination; nothing was asked.
    NotHoled,
}

/// Spreads a match at `node` to the links that share its destination and to
/// its enclosing container.
pub(crate) fn expand_hole_scope<D: Document + ?Sized>(
    doc: &mut D,
    node: NodeId,
    ctx: &mut PassContext<'_>,
) {
    hole_matching_links(doc, node, ctx);
    flag_container(doc, node, ctx);
}

fn hole_matching_links<D: Document + ?Sized>(
    doc: &mut D,
    node: NodeId,
    ctx: &mut PassContext<'_>,
) {
    let config = ctx.config;
    let Some(link) = doc.closest(node, config.link_selector()) else {
        return;
    };
    if doc.attribute(link, config.original_href_attribute()).is_some() {
        // Still holed: its href is the placeholder, not a destination.
        ctx.trace.line(TraceCategory::Expansion, || {
            format!("[expand] link already holed node={}", link.index())
        });
        return;
    }
    let Some(href) = doc
        .attribute(link, "href")
        .filter(|href| !href.is_empty() && *href != config.placeholder_href())
        .map(str::to_string)
    else {
        return;
    };

    let targets = doc
        .query_selector_all(config.link_selector())
        .into_iter()
        .filter(|candidate| {
            doc.attribute(*candidate, "href") == Some(href.as_str())
                && !is_processed(&*doc, *candidate)
        })
        .collect::<Vec<_>>();

    let mut holed = 0usize;
    for target in targets {
        if hole_link(doc, target, &href, config) {
            holed += 1;
        }
    }
    ctx.report.links += holed;
    ctx.trace.line(TraceCategory::Expansion, || {
        format!("[expand] links href={href} holed={holed}")
    });
}

fn hole_link<D: Document + ?Sized>(
    doc: &mut D,
    link: NodeId,
    href: &str,
    config: &HoleConfig,
) -> bool {
    if doc
        .set_attribute(link, config.original_href_attribute(), href)
        .is_err()
    {
        return false;
    }
    if doc
        .set_attribute(link, "href", config.placeholder_href())
        .is_err()
    {
        return false;
    }
    if doc.add_listener(link, Listener::HoledLinkRestore).is_err() {
        return false;
    }
    apply_holing_scope(doc, link, config)
}

fn flag_container<D: Document + ?Sized>(doc: &mut D, node: NodeId, ctx: &mut PassContext<'_>) {
    let config = ctx.config;
    let Some(container) = doc.closest(node, config.container_selector()) else {
        return;
    };
    if apply_holing_scope(doc, container, config) {
        ctx.report.containers += 1;
        ctx.trace.line(TraceCategory::Expansion, || {
            let tag = doc.tag_name(container).unwrap_or_default();
            format!("[expand] container <{tag}> node={}", container.index())
        });
    }
}

/// Click interception for a neutralized link. The caller always suppresses
/// the default navigation, whatever the outcome.
pub(crate) fn handle_holed_link_click<D, P>(
    doc: &mut D,
    link: NodeId,
    prompt: &mut P,
    config: &HoleConfig,
    trace: &mut TraceState,
) -> ClickOutcome
where
    D: Document + ?Sized,
    P: ConfirmPrompt + ?Sized,
{
    let Some(original) = doc
        .attribute(link, config.original_href_attribute())
        .map(str::to_string)
    else {
        return ClickOutcome::NotHoled;
    };

    if !prompt.confirm(config.restore_prompt()) {
        trace.line(TraceCategory::Expansion, || {
            format!("[expand] restore declined href={original}")
        });
        return ClickOutcome::Kept;
    }

    if doc.set_attribute(link, "href", &original).is_err() {
        return ClickOutcome::Kept;
    }
    let cleared = doc
        .remove_attribute(link, config.original_href_attribute())
        .is_ok();
    let unhooked = doc.remove_listener(link, Listener::HoledLinkRestore).is_ok();
    if !(cleared && unhooked) {
        trace.line(TraceCategory::Expansion, || {
            format!("[expand] restore incomplete href={original} cleared={cleared} unhooked={unhooked}")
        });
        return ClickOutcome::Kept;
    }
    trace.line(TraceCategory::Expansion, || {
        format!("[expand] restored href={original}")
    });
    ClickOutcome::Restored
}
