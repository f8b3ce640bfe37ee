use super::*;

const STORY_FEED: &str = r#"
    <ul id="feed">
      <li id="item-1"><a id="headline" href="/story/123">Trump wins the vote</a></li>
      <li id="item-2"><a id="thumb" href="/story/123"><img src="/img/crowd.png"></a></li>
      <li id="item-3"><a id="more" href="/story/123">Read more</a></li>
      <li id="item-4"><a id="other" href="/story/456">Weather report</a></li>
    </ul>
    "#;

struct ScriptedPrompt {
    answers: Vec<bool>,
    asked: Vec<String>,
}

impl ConfirmPrompt for ScriptedPrompt {
    fn confirm(&mut self, message: &str) -> bool {
        self.asked.push(message.to_string());
        if self.answers.is_empty() {
            false
        } else {
            self.answers.remove(0)
        }
    }
}

#[test]
fn every_link_to_the_same_destination_is_holed() -> Result<()> {
    let mut dom = Dom::from_html(STORY_FEED)?;
    let mut engine = quiet_engine();

    let report = engine.rescan(&mut dom);
    assert_eq!(report.links, 3);
    for id in ["headline", "thumb", "more"] {
        let link = node(&dom, id)?;
        assert_eq!(dom.attribute(link, "href"), Some("#"), "{id}");
        assert_eq!(dom.attribute(link, "data-original-href"), Some("/story/123"));
        assert_eq!(dom.attribute(link, "data-memoryholed"), Some("true"));
        assert!(dom.has_listener(link, Listener::HoledLinkRestore));
        assert!(dom.is_processed(link));
    }

    let other = node(&dom, "other")?;
    assert_eq!(dom.attribute(other, "href"), Some("/story/456"));
    assert_eq!(dom.attribute(other, "data-original-href"), None);
    assert!(!dom.has_listener(other, Listener::HoledLinkRestore));
    Ok(())
}

#[test]
fn only_the_matching_item_container_is_flagged() -> Result<()> {
    let mut dom = Dom::from_html(STORY_FEED)?;
    let mut engine = quiet_engine();

    let report = engine.rescan(&mut dom);
    assert_eq!(report.containers, 1);
    assert!(dom.is_processed(node(&dom, "item-1")?));
    for id in ["item-2", "item-3", "item-4"] {
        let item = node(&dom, id)?;
        assert!(!dom.is_processed(item), "{id}");
        assert_eq!(dom.attribute(item, "data-memoryholed"), None);
    }
    Ok(())
}

#[test]
fn nearest_container_wins_over_outer_article() -> Result<()> {
    let html = r#"
        <article id="outer">
          <ul><li id="inner">Vance said</li></ul>
        </article>
        "#;
    let mut dom = Dom::from_html(html)?;
    let mut engine = quiet_engine();

    engine.rescan(&mut dom);
    assert!(dom.is_processed(node(&dom, "inner")?));
    assert!(!dom.is_processed(node(&dom, "outer")?));
    Ok(())
}

#[test]
fn links_without_destination_are_not_propagated() -> Result<()> {
    let html = r#"
        <a id="empty" href="">Trump</a>
        <a id="bare">Musk</a>
        <a id="sibling" href="">Elsewhere</a>
        "#;
    let mut dom = Dom::from_html(html)?;
    let mut engine = quiet_engine();

    let report = engine.rescan(&mut dom);
    assert_eq!(report.text_nodes, 2);
    assert_eq!(report.links, 0);
    for id in ["empty", "bare", "sibling"] {
        let link = node(&dom, id)?;
        assert_eq!(dom.attribute(link, "data-original-href"), None, "{id}");
        assert!(!dom.is_processed(link));
    }
    Ok(())
}

#[test]
fn late_text_inside_holed_link_does_not_spread_to_placeholder_links() -> Result<()> {
    let html = r##"
        <a id="top" href="#">Back to top</a>
        <p><a id="story" href="/s/1">Trump</a></p>
        "##;
    let mut dom = Dom::from_html(html)?;
    let mut engine = quiet_engine();
    engine.rescan(&mut dom);

    let story = node(&dom, "story")?;
    assert_eq!(dom.attribute(story, "href"), Some("#"));
    dom.insert_html(story, "<span> and Musk</span>")?;

    let report = engine.rescan(&mut dom);
    assert_eq!(report.text_nodes, 1);
    assert_eq!(report.links, 0);
    let top = node(&dom, "top")?;
    assert_eq!(dom.attribute(top, "data-original-href"), None);
    assert!(!dom.has_listener(top, Listener::HoledLinkRestore));
    Ok(())
}

#[test]
fn late_text_inside_restored_link_holes_new_duplicates() -> Result<()> {
    let html = r#"<p><a id="story" href="/story/1">Trump</a></p><div id="sidebar"></div>"#;
    let mut dom = Dom::from_html(html)?;
    let mut engine = quiet_engine();
    engine.rescan(&mut dom);

    let story = node(&dom, "story")?;
    let mut prompt = ScriptedPrompt {
        answers: vec![true],
        asked: Vec::new(),
    };
    assert_eq!(
        engine.handle_click(&mut dom, story, &mut prompt),
        ClickOutcome::Restored
    );

    let sidebar = node(&dom, "sidebar")?;
    dom.insert_html(sidebar, r#"<a id="dup" href="/story/1">Related</a>"#)?;
    dom.insert_html(story, "<span> and Musk</span>")?;

    let report = engine.rescan(&mut dom);
    assert_eq!(report.text_nodes, 1);
    assert_eq!(report.links, 1);
    let dup = node(&dom, "dup")?;
    assert_eq!(dom.attribute(dup, "href"), Some("#"));
    assert_eq!(dom.attribute(dup, "data-original-href"), Some("/story/1"));
    assert!(dom.has_listener(dup, Listener::HoledLinkRestore));
    // The restored link itself stays restored.
    assert_eq!(dom.attribute(story, "href"), Some("/story/1"));
    Ok(())
}

/// Delegates to a [`Dom`] but refuses to drop click listeners.
struct StuckListeners {
    dom: Dom,
}

impl Document for StuckListeners {
    fn root(&self) -> NodeId {
        self.dom.root()
    }

    fn node_kind(&self, node: NodeId) -> Option<NodeKind> {
        self.dom.node_kind(node)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        Document::parent(&self.dom, node)
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.dom.first_child(node)
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.dom.next_sibling(node)
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.dom.tag_name(node)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.dom.attribute(node, name)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<()> {
        self.dom.set_attribute(node, name, value)
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<()> {
        self.dom.remove_attribute(node, name)
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        self.dom.text(node)
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<()> {
        self.dom.set_text(node, text)
    }

    fn is_processed(&self, node: NodeId) -> bool {
        self.dom.is_processed(node)
    }

    fn set_processed(&mut self, node: NodeId) -> Result<()> {
        self.dom.set_processed(node)
    }

    fn add_listener(&mut self, node: NodeId, listener: Listener) -> Result<()> {
        self.dom.add_listener(node, listener)
    }

    fn remove_listener(&mut self, _node: NodeId, _listener: Listener) -> Result<bool> {
        Err(Error::HostRuntime("listener registry is read-only".into()))
    }

    fn has_listener(&self, node: NodeId, listener: Listener) -> bool {
        self.dom.has_listener(node, listener)
    }
}

#[test]
fn incomplete_restore_is_reported_as_kept() -> Result<()> {
    let mut doc = StuckListeners {
        dom: Dom::from_html(STORY_FEED)?,
    };
    let mut engine = quiet_engine();
    engine.enable_trace(true);
    engine.rescan(&mut doc);
    engine.take_trace_logs();

    let headline = node(&doc.dom, "headline")?;
    let mut prompt = ScriptedPrompt {
        answers: vec![true],
        asked: Vec::new(),
    };
    let outcome = engine.handle_click(&mut doc, headline, &mut prompt);

    assert_eq!(outcome, ClickOutcome::Kept);
    assert!(doc.dom.has_listener(headline, Listener::HoledLinkRestore));
    let logs = engine.take_trace_logs();
    assert!(logs.iter().any(|line| {
        line == "[expand] restore incomplete href=/story/123 cleared=true unhooked=false"
    }));
    Ok(())
}

#[test]
fn click_handler_restores_on_confirmation() -> Result<()> {
    let mut dom = Dom::from_html(STORY_FEED)?;
    let mut engine = quiet_engine();
    engine.rescan(&mut dom);

    let headline = node(&dom, "headline")?;
    let mut prompt = ScriptedPrompt {
        answers: vec![true],
        asked: Vec::new(),
    };
    let outcome = engine.handle_click(&mut dom, headline, &mut prompt);

    assert_eq!(outcome, ClickOutcome::Restored);
    assert_eq!(prompt.asked, vec!["Restore Link?".to_string()]);
    assert_eq!(dom.attribute(headline, "href"), Some("/story/123"));
    assert_eq!(dom.attribute(headline, "data-original-href"), None);
    assert!(!dom.has_listener(headline, Listener::HoledLinkRestore));
    // Still processed, still visibly marked.
    assert!(dom.is_processed(headline));
    assert_eq!(dom.attribute(headline, "data-memoryholed"), Some("true"));

    let more = node(&dom, "more")?;
    assert_eq!(dom.attribute(more, "href"), Some("#"));
    Ok(())
}

#[test]
fn click_handler_keeps_link_when_declined() -> Result<()> {
    let mut dom = Dom::from_html(STORY_FEED)?;
    let mut engine = quiet_engine();
    engine.rescan(&mut dom);

    let thumb = node(&dom, "thumb")?;
    let mut prompt = ScriptedPrompt {
        answers: vec![false],
        asked: Vec::new(),
    };
    let before = dom.to_html();
    let outcome = engine.handle_click(&mut dom, thumb, &mut prompt);

    assert_eq!(outcome, ClickOutcome::Kept);
    assert_eq!(prompt.asked.len(), 1);
    assert_eq!(dom.to_html(), before);
    assert!(dom.has_listener(thumb, Listener::HoledLinkRestore));
    Ok(())
}

#[test]
fn click_handler_ignores_links_without_stored_destination() -> Result<()> {
    let mut dom = Dom::from_html(STORY_FEED)?;
    let mut engine = quiet_engine();
    engine.rescan(&mut dom);

    let other = node(&dom, "other")?;
    let mut prompt = ScriptedPrompt {
        answers: vec![true],
        asked: Vec::new(),
    };
    assert_eq!(
        engine.handle_click(&mut dom, other, &mut prompt),
        ClickOutcome::NotHoled
    );
    assert!(prompt.asked.is_empty());
    Ok(())
}

#[test]
fn page_click_restores_then_navigates() -> Result<()> {
    let mut page = Page::from_html(STORY_FEED)?;
    page.set_trace_stderr(false);
    page.enqueue_confirm_response(true);

    page.click("#headline")?;
    assert_eq!(page.take_confirm_messages(), vec!["Restore Link?".to_string()]);
    page.assert_attribute("#headline", "href", Some("/story/123"))?;
    page.assert_attribute("#headline", "data-original-href", None)?;
    assert!(page.take_navigations().is_empty());

    page.click("#headline")?;
    assert!(page.take_confirm_messages().is_empty());
    let navigations = page.take_navigations();
    assert_eq!(navigations.len(), 1);
    assert_eq!(navigations[0].href, "/story/123");
    assert_eq!(navigations[0].link, page.select_one("#headline")?);
    Ok(())
}

#[test]
fn page_click_on_image_inside_holed_link_is_intercepted() -> Result<()> {
    let mut page = Page::from_html(STORY_FEED)?;
    page.set_trace_stderr(false);

    // Default response declines.
    page.click("#thumb img")?;
    assert_eq!(page.take_confirm_messages().len(), 1);
    assert!(page.take_navigations().is_empty());
    page.assert_attribute("#thumb", "href", Some("#"))?;
    page.assert_attribute("#thumb", "data-original-href", Some("/story/123"))?;

    page.set_default_confirm_response(true);
    page.click("#thumb img")?;
    page.assert_attribute("#thumb", "href", Some("/story/123"))?;
    assert!(page.take_navigations().is_empty());
    Ok(())
}

#[test]
fn page_click_on_untouched_link_navigates() -> Result<()> {
    let mut page = Page::from_html(STORY_FEED)?;
    page.set_trace_stderr(false);

    page.click("#other")?;
    assert!(page.take_confirm_messages().is_empty());
    let navigations = page.take_navigations();
    assert_eq!(navigations.len(), 1);
    assert_eq!(navigations[0].href, "/story/456");
    Ok(())
}

#[test]
fn restored_link_is_not_holed_again_by_later_rescans() -> Result<()> {
    let mut page = Page::from_html(STORY_FEED)?;
    page.set_trace_stderr(false);
    page.enqueue_confirm_response(true);
    page.click("#more")?;

    page.append_html("#feed", r#"<li><a href="/story/777">Musk again</a></li>"#)?;
    page.flush()?;

    page.assert_attribute("#more", "href", Some("/story/123"))?;
    page.assert_attribute("#headline", "href", Some("#"))?;
    page.assert_attribute("a[data-original-href='/story/777']", "href", Some("#"))?;
    Ok(())
}

#[test]
fn custom_config_changes_marker_and_placeholder() -> Result<()> {
    let config = HoleConfig::default()
        .with_marker("data-hidden", "yes")
        .with_placeholder_href("javascript:void(0)")
        .with_original_href_attribute("data-was")
        .with_container_selector("section, li")?;
    let mut engine = MemoryHole::new(PatternTable::default(), config);
    engine.set_trace_stderr(false);

    let html = r#"<section id="box"><a id="link" href="/x">Trump</a></section>"#;
    let mut dom = Dom::from_html(html)?;
    engine.rescan(&mut dom);

    let link = node(&dom, "link")?;
    assert_eq!(dom.attribute(link, "href"), Some("javascript:void(0)"));
    assert_eq!(dom.attribute(link, "data-was"), Some("/x"));
    assert_eq!(dom.attribute(link, "data-hidden"), Some("yes"));
    assert_eq!(dom.attribute(link, "data-memoryholed"), None);
    assert_eq!(dom.attribute(node(&dom, "box")?, "data-hidden"), Some("yes"));
    Ok(())
}
