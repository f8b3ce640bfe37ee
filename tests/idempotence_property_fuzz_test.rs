use memory_hole::{Dom, HoleConfig, HostAction, MemoryHole, MonitorState, Page, PatternTable};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::{FileFailurePersistence, TestCaseError, TestCaseResult};

const IDEMPOTENCE_PROPTEST_REGRESSION_FILE: &str =
    "tests/proptest-regressions/idempotence_property_fuzz_test.txt";
const DEFAULT_IDEMPOTENCE_PROPTEST_CASES: u32 = 128;

const MATCHING_WORDS: &[&str] = &[
    "Trump",
    "trump",
    "Donald Trump",
    "Elon Musk",
    "musk",
    "RFK",
    "Kennedy",
    "J.D. Vance",
    "vance",
    "MAGA",
];

const NEAR_MISS_WORDS: &[&str] = &[
    "trumpet",
    "trumped",
    "muskrat",
    "musket",
    "magazine",
    "elongated",
    "advance",
    "relevance",
    "kennedyesque",
    "rfkx",
];

const NEUTRAL_WORDS: &[&str] = &["the", "news", "today", "42", "read", "more", "-", "weather"];

const HREFS: &[&str] = &["/story/1", "/story/2", "/post/7", ""];
const IMAGE_SOURCES: &[&str] = &["/img/cat.png", "/img/vance.jpg", "/img/trumpet.png"];

#[derive(Clone, Debug)]
enum Block {
    Paragraph(String),
    ListItem { href: Option<&'static str>, text: String },
    Article { text: String, image: Option<&'static str> },
    LinkedImage { href: &'static str, src: &'static str, alt: String },
}

fn env_proptest_cases(var_name: &str, default_cases: u32) -> u32 {
    std::env::var(var_name)
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default_cases)
}

fn idempotence_proptest_cases() -> u32 {
    std::env::var("MEMORY_HOLE_IDEMPOTENCE_PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or_else(|| {
            env_proptest_cases(
                "MEMORY_HOLE_PROPTEST_CASES",
                DEFAULT_IDEMPOTENCE_PROPTEST_CASES,
            )
        })
}

fn word_strategy(pool: &'static [&'static str]) -> BoxedStrategy<&'static str> {
    proptest::sample::select(pool).boxed()
}

fn sentence_strategy() -> BoxedStrategy<String> {
    vec(
        prop_oneof![
            2 => word_strategy(MATCHING_WORDS),
            3 => word_strategy(NEAR_MISS_WORDS),
            5 => word_strategy(NEUTRAL_WORDS),
        ],
        1..=6,
    )
    .prop_map(|words| words.join(" "))
    .boxed()
}

fn near_miss_sentence_strategy() -> BoxedStrategy<String> {
    vec(
        prop_oneof![
            1 => word_strategy(NEAR_MISS_WORDS),
            1 => word_strategy(NEUTRAL_WORDS),
        ],
        1..=6,
    )
    .prop_map(|words| words.join(" "))
    .boxed()
}

fn block_strategy(sentences: BoxedStrategy<String>) -> BoxedStrategy<Block> {
    prop_oneof![
        2 => sentences.clone().prop_map(Block::Paragraph),
        3 => (proptest::option::of(word_strategy(HREFS)), sentences.clone())
            .prop_map(|(href, text)| Block::ListItem { href, text }),
        2 => (sentences.clone(), proptest::option::of(word_strategy(IMAGE_SOURCES)))
            .prop_map(|(text, image)| Block::Article { text, image }),
        1 => (word_strategy(HREFS), word_strategy(IMAGE_SOURCES), sentences)
            .prop_map(|(href, src, alt)| Block::LinkedImage { href, src, alt }),
    ]
    .boxed()
}

fn render_block(block: &Block) -> String {
    match block {
        Block::Paragraph(text) => format!("<p>{text}</p>"),
        Block::ListItem {
            href: Some(href),
            text,
        } => format!(r#"<li><a href="{href}">{text}</a></li>"#),
        Block::ListItem { href: None, text } => format!("<li><span>{text}</span></li>"),
        Block::Article { text, image } => match image {
            Some(src) => format!(r#"<article><img src="{src}"><p>{text}</p></article>"#),
            None => format!("<article><p>{text}</p></article>"),
        },
        Block::LinkedImage { href, src, alt } => {
            format!(r#"<div><a href="{href}"><img src="{src}" alt="{alt}"></a></div>"#)
        }
    }
}

fn render_document(blocks: &[Block]) -> String {
    let body = blocks.iter().map(render_block).collect::<String>();
    format!(r#"<main id="feed">{body}</main>"#)
}

fn document_strategy() -> BoxedStrategy<Vec<Block>> {
    vec(block_strategy(sentence_strategy()), 1..=12).boxed()
}

fn near_miss_document_strategy() -> BoxedStrategy<Vec<Block>> {
    vec(block_strategy(near_miss_sentence_strategy()), 1..=12)
        .prop_map(|blocks| {
            blocks
                .into_iter()
                .map(|block| match block {
                    Block::Article { text, .. } => Block::Article { text, image: None },
                    Block::LinkedImage { href, alt, .. } => Block::LinkedImage {
                        href,
                        src: "/img/cat.png",
                        alt,
                    },
                    other => other,
                })
                .collect()
        })
        .boxed()
}

fn fail(err: memory_hole::Error) -> TestCaseError {
    TestCaseError::fail(format!("{err:?}"))
}

fn quiet_engine() -> MemoryHole {
    let mut engine = MemoryHole::new(PatternTable::default(), HoleConfig::default());
    engine.set_trace_stderr(false);
    engine
}

fn assert_second_rescan_is_a_no_op(blocks: &[Block]) -> TestCaseResult {
    let html = render_document(blocks);
    let mut dom = Dom::from_html(&html).map_err(fail)?;
    let mut engine = quiet_engine();

    engine.rescan(&mut dom);
    let after_first = dom.to_html();

    let second = engine.rescan(&mut dom);
    prop_assert!(
        second.is_empty(),
        "second rescan touched nodes: {second:?}, html={html}"
    );
    prop_assert_eq!(dom.to_html(), after_first);
    Ok(())
}

fn assert_near_misses_are_untouched(blocks: &[Block]) -> TestCaseResult {
    let html = render_document(blocks);
    let pristine = Dom::from_html(&html).map_err(fail)?.to_html();
    let mut dom = Dom::from_html(&html).map_err(fail)?;
    let mut engine = quiet_engine();

    let report = engine.rescan(&mut dom);
    prop_assert!(report.is_empty(), "near misses were rewritten: {report:?}, html={html}");
    prop_assert_eq!(dom.to_html(), pristine);
    Ok(())
}

fn assert_streamed_content_settles(initial: &[Block], appended: &[Block]) -> TestCaseResult {
    let mut page = Page::from_html(&render_document(initial)).map_err(fail)?;
    page.set_trace_stderr(false);

    for (step, block) in appended.iter().enumerate() {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            page.schedule(
                (step as i64 % 3) * 5,
                HostAction::AppendHtml {
                    selector: "#feed".into(),
                    html: render_block(block),
                },
            );
            page.flush()
        }));
        match outcome {
            Err(_) => {
                prop_assert!(false, "append panicked at step {step}: {block:?}");
            }
            Ok(Err(error)) => {
                prop_assert!(
                    false,
                    "append returned error at step {step}: {block:?}, error={error:?}"
                );
            }
            Ok(Ok(())) => {}
        }
        prop_assert_eq!(page.engine().monitor_state(), MonitorState::Idle);
        prop_assert!(page.pending_tasks().is_empty());
    }

    prop_assert!(page.engine().rescans() <= appended.len() + 1);
    let settled = page.to_html();
    let mut dom = Dom::from_html(&settled).map_err(fail)?;
    let mut engine = quiet_engine();
    let report = engine.rescan(&mut dom);
    prop_assert_eq!(
        report.text_nodes,
        0,
        "rewritten text still matches: {}",
        settled
    );
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: idempotence_proptest_cases(),
        failure_persistence: Some(Box::new(
            FileFailurePersistence::Direct(IDEMPOTENCE_PROPTEST_REGRESSION_FILE),
        )),
        .. ProptestConfig::default()
    })]

    #[test]
    fn second_rescan_never_changes_the_document(blocks in document_strategy()) {
        assert_second_rescan_is_a_no_op(&blocks)?;
    }

    #[test]
    fn near_miss_words_are_never_rewritten(blocks in near_miss_document_strategy()) {
        assert_near_misses_are_untouched(&blocks)?;
    }

    #[test]
    fn streamed_content_settles_without_errors(
        initial in document_strategy(),
        appended in document_strategy(),
    ) {
        assert_streamed_content_settles(&initial, &appended)?;
    }
}
