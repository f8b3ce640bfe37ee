use super::*;
use std::collections::VecDeque;

const DISPATCH_STACK_SIZE: usize = 32 * 1024 * 1024;
const DEFAULT_TIMER_STEP_LIMIT: usize = 10_000;
const SNIPPET_CHAR_LIMIT: usize = 200;

/// Page-script work a test queues on the virtual clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAction {
    AppendHtml {
        selector: String,
        html: String,
    },
    Remove {
        selector: String,
    },
    SetText {
        selector: String,
        text: String,
    },
    SetAttribute {
        selector: String,
        name: String,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCallback {
    /// Handed over by the engine through [`TaskScheduler::defer`].
    Engine(DeferredTask),
    /// Queued by [`Page::schedule`].
    Host(HostAction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTask {
    pub id: i64,
    pub due_at: i64,
    pub order: i64,
    pub callback: TaskCallback,
}

/// A click that reached a link's default action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub link: NodeId,
    pub href: String,
}

#[derive(Debug, Clone)]
struct ScheduledTask {
    id: i64,
    due_at: i64,
    order: i64,
    callback: TaskCallback,
}

#[derive(Debug)]
struct SchedulerState {
    task_queue: Vec<ScheduledTask>,
    now_ms: i64,
    timer_step_limit: usize,
    next_task_id: i64,
    next_task_order: i64,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self {
            task_queue: Vec::new(),
            now_ms: 0,
            timer_step_limit: DEFAULT_TIMER_STEP_LIMIT,
            next_task_id: 1,
            next_task_order: 0,
        }
    }
}

impl SchedulerState {
    fn push(&mut self, callback: TaskCallback, delay_ms: i64) -> i64 {
        let id = self.next_task_id;
        self.next_task_id += 1;
        let order = self.next_task_order;
        self.next_task_order += 1;
        self.task_queue.push(ScheduledTask {
            id,
            due_at: self.now_ms.saturating_add(delay_ms.max(0)),
            order,
            callback,
        });
        id
    }

    fn next_task_index(&self, due_limit: Option<i64>) -> Option<usize> {
        self.task_queue
            .iter()
            .enumerate()
            .filter(|(_, task)| due_limit.is_none_or(|limit| task.due_at <= limit))
            .min_by_key(|(_, task)| (task.due_at, task.order))
            .map(|(idx, _)| idx)
    }
}

impl TaskScheduler for SchedulerState {
    fn defer(&mut self, task: DeferredTask, delay_ms: i64) {
        self.push(TaskCallback::Engine(task), delay_ms);
    }
}

#[derive(Debug, Clone)]
struct ObserverRegistration {
    id: ObserverId,
    target: NodeId,
    init: ObserverInit,
}

#[derive(Debug, Default)]
struct ObserverRegistry {
    registrations: Vec<ObserverRegistration>,
}

impl ObserverRegistry {
    /// Splits a drained mutation log into per-observer batches, keeping the
    /// log order. Observers with nothing relevant get no batch.
    fn route(&self, dom: &Dom, records: &[MutationRecord]) -> Vec<(ObserverId, Vec<MutationRecord>)> {
        self.registrations
            .iter()
            .filter_map(|registration| {
                let batch = records
                    .iter()
                    .filter(|record| {
                        registration.init.wants(&record.kind)
                            && (record.target == registration.target
                                || (registration.init.subtree
                                    && dom.is_descendant_of(record.target, registration.target)))
                    })
                    .cloned()
                    .collect::<Vec<_>>();
                (!batch.is_empty()).then_some((registration.id, batch))
            })
            .collect()
    }
}

impl MutationSource for ObserverRegistry {
    fn observe(&mut self, target: NodeId, init: ObserverInit) -> Result<ObserverId> {
        if !(init.child_list || init.attributes || init.character_data) {
            return Err(Error::HostRuntime(
                "observe requires at least one of childList, attributes, characterData".into(),
            ));
        }
        let id = ObserverId::from_index(self.registrations.len());
        self.registrations.push(ObserverRegistration { id, target, init });
        Ok(id)
    }
}

#[derive(Debug, Default)]
struct PlatformMockState {
    confirm_responses: VecDeque<bool>,
    default_confirm_response: bool,
    confirm_messages: Vec<String>,
}

impl ConfirmPrompt for PlatformMockState {
    fn confirm(&mut self, message: &str) -> bool {
        self.confirm_messages.push(message.to_string());
        self.confirm_responses
            .pop_front()
            .unwrap_or(self.default_confirm_response)
    }
}

/// Deterministic single-page host for a [`MemoryHole`].
///
/// Every host action (appending markup, removing nodes, timers, clicks) is
/// followed by a mutation checkpoint that hands child-list batches to the
/// engine, which in turn queues its rescans on the page's virtual clock.
/// Nothing runs until a test advances that clock.
#[derive(Debug)]
pub struct Page {
    dom: Dom,
    engine: MemoryHole,
    observers: ObserverRegistry,
    scheduler: SchedulerState,
    platform_mocks: PlatformMockState,
    navigations: Vec<Navigation>,
}

impl Page {
    /// Loads `html` and starts the stock engine on it.
    pub fn from_html(html: &str) -> Result<Self> {
        Self::with_engine(
            html,
            MemoryHole::new(PatternTable::stock()?, HoleConfig::default()),
        )
    }

    /// Loads `html` and starts `engine` on it. Trace settings made on the
    /// engine beforehand cover the initial pass.
    pub fn with_engine(html: &str, engine: MemoryHole) -> Result<Self> {
        let dom = Dom::from_html(html)?;
        let mut page = Self {
            dom,
            engine,
            observers: ObserverRegistry::default(),
            scheduler: SchedulerState::default(),
            platform_mocks: PlatformMockState::default(),
            navigations: Vec::new(),
        };
        page.engine.attach(&mut page.dom, &mut page.observers)?;
        page.run_mutation_checkpoint();
        Ok(page)
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn engine(&self) -> &MemoryHole {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut MemoryHole {
        &mut self.engine
    }

    pub fn to_html(&self) -> String {
        self.dom.to_html()
    }

    pub fn append_html(&mut self, selector: &str, html: &str) -> Result<()> {
        self.apply_host_action(HostAction::AppendHtml {
            selector: selector.to_string(),
            html: html.to_string(),
        })
    }

    pub fn remove(&mut self, selector: &str) -> Result<()> {
        self.apply_host_action(HostAction::Remove {
            selector: selector.to_string(),
        })
    }

    /// Replaces the children of the matched element, like assigning
    /// `textContent`.
    pub fn set_text(&mut self, selector: &str, text: &str) -> Result<()> {
        self.apply_host_action(HostAction::SetText {
            selector: selector.to_string(),
            text: text.to_string(),
        })
    }

    pub fn set_attribute(&mut self, selector: &str, name: &str, value: &str) -> Result<()> {
        self.apply_host_action(HostAction::SetAttribute {
            selector: selector.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        })
    }

    /// Queues `action` to run `delay_ms` from now. Negative delays run at
    /// the current time.
    pub fn schedule(&mut self, delay_ms: i64, action: HostAction) -> i64 {
        let id = self.scheduler.push(TaskCallback::Host(action), delay_ms);
        let now_ms = self.scheduler.now_ms;
        self.engine.trace_mut().line(TraceCategory::Timers, || {
            format!("[timer] schedule id={id} delay_ms={delay_ms} now_ms={now_ms}")
        });
        id
    }

    fn apply_host_action(&mut self, action: HostAction) -> Result<()> {
        match action {
            HostAction::AppendHtml { selector, html } => {
                let parent = self.select_one(&selector)?;
                self.dom.insert_html(parent, &html)?;
            }
            HostAction::Remove { selector } => {
                let target = self.select_one(&selector)?;
                self.dom.remove_node(target)?;
            }
            HostAction::SetText { selector, text } => {
                let target = self.select_one(&selector)?;
                self.dom.set_text_content(target, &text)?;
            }
            HostAction::SetAttribute {
                selector,
                name,
                value,
            } => {
                let target = self.select_one(&selector)?;
                self.dom.set_attribute(target, &name, &value)?;
            }
        }
        self.run_mutation_checkpoint();
        Ok(())
    }

    fn run_mutation_checkpoint(&mut self) {
        let records = self.dom.take_mutation_records();
        if records.is_empty() {
            return;
        }
        for (observer, batch) in self.observers.route(&self.dom, &records) {
            self.engine
                .handle_mutations(observer, &batch, &mut self.scheduler);
        }
    }

    /// Dispatches a click at the first element matching `selector`.
    ///
    /// Capture listeners on the path from the document down to the target
    /// run first; a neutralized link always cancels the default action.
    /// Otherwise the nearest `a[href]` ancestor-or-self is navigated and
    /// recorded.
    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        stacker::grow(DISPATCH_STACK_SIZE, || self.dispatch_click(target))
    }

    fn dispatch_click(&mut self, target: NodeId) -> Result<()> {
        let mut path = Vec::new();
        let mut cursor = Some(target);
        while let Some(node) = cursor {
            path.push(node);
            cursor = Document::parent(&self.dom, node);
        }
        path.reverse();

        let mut default_prevented = false;
        for node in path {
            if !self.dom.has_listener(node, Listener::HoledLinkRestore) {
                continue;
            }
            let outcome = self
                .engine
                .handle_click(&mut self.dom, node, &mut self.platform_mocks);
            default_prevented = true;
            self.engine.trace_mut().line(TraceCategory::Expansion, || {
                format!("[expand] click node={} outcome={outcome:?}", node.index())
            });
        }
        self.run_mutation_checkpoint();

        if default_prevented {
            return Ok(());
        }
        let link_selector = Selector::any_tag(&["a"]);
        if let Some(link) = self.dom.closest(target, &link_selector) {
            if let Some(href) = self.dom.attribute(link, "href") {
                self.navigations.push(Navigation {
                    link,
                    href: href.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn now_ms(&self) -> i64 {
        self.scheduler.now_ms
    }

    pub fn pending_tasks(&self) -> Vec<PendingTask> {
        let mut tasks = self
            .scheduler
            .task_queue
            .iter()
            .map(|task| PendingTask {
                id: task.id,
                due_at: task.due_at,
                order: task.order,
                callback: task.callback.clone(),
            })
            .collect::<Vec<_>>();
        tasks.sort_by_key(|task| (task.due_at, task.order));
        tasks
    }

    pub fn set_timer_step_limit(&mut self, max_steps: usize) -> Result<()> {
        if max_steps == 0 {
            return Err(Error::HostRuntime(
                "set_timer_step_limit requires at least 1 step".into(),
            ));
        }
        self.scheduler.timer_step_limit = max_steps;
        Ok(())
    }

    pub fn advance_time(&mut self, delta_ms: i64) -> Result<()> {
        if delta_ms < 0 {
            return Err(Error::HostRuntime(
                "advance_time requires non-negative milliseconds".into(),
            ));
        }
        let from = self.scheduler.now_ms;
        self.scheduler.now_ms = self.scheduler.now_ms.saturating_add(delta_ms);
        let ran = self.run_task_queue(Some(self.scheduler.now_ms), false)?;
        let to = self.scheduler.now_ms;
        self.engine.trace_mut().line(TraceCategory::Timers, || {
            format!("[timer] advance delta_ms={delta_ms} from={from} to={to} ran_due={ran}")
        });
        Ok(())
    }

    /// Runs every task due at the current time, including tasks they queue
    /// for the same instant.
    pub fn run_due_timers(&mut self) -> Result<usize> {
        let ran = self.run_task_queue(Some(self.scheduler.now_ms), false)?;
        let now_ms = self.scheduler.now_ms;
        self.engine.trace_mut().line(TraceCategory::Timers, || {
            format!("[timer] run_due now_ms={now_ms} ran={ran}")
        });
        Ok(ran)
    }

    /// Runs the queue dry, moving the clock forward as needed.
    pub fn flush(&mut self) -> Result<()> {
        let from = self.scheduler.now_ms;
        let ran = self.run_task_queue(None, true)?;
        let to = self.scheduler.now_ms;
        self.engine.trace_mut().line(TraceCategory::Timers, || {
            format!("[timer] flush from={from} to={to} ran={ran}")
        });
        Ok(())
    }

    pub fn run_next_timer(&mut self) -> Result<bool> {
        let Some(next_idx) = self.scheduler.next_task_index(None) else {
            self.engine
                .trace_mut()
                .line(TraceCategory::Timers, || "[timer] run_next none".into());
            return Ok(false);
        };
        let task = self.scheduler.task_queue.remove(next_idx);
        if task.due_at > self.scheduler.now_ms {
            self.scheduler.now_ms = task.due_at;
        }
        self.execute_task(task)?;
        Ok(true)
    }

    fn run_task_queue(&mut self, due_limit: Option<i64>, advance_clock: bool) -> Result<usize> {
        let mut steps = 0usize;
        while let Some(next_idx) = self.scheduler.next_task_index(due_limit) {
            steps += 1;
            if steps > self.scheduler.timer_step_limit {
                return Err(self.timer_step_limit_error(steps, due_limit));
            }
            let task = self.scheduler.task_queue.remove(next_idx);
            if advance_clock && task.due_at > self.scheduler.now_ms {
                self.scheduler.now_ms = task.due_at;
            }
            self.execute_task(task)?;
        }
        Ok(steps)
    }

    fn timer_step_limit_error(&self, steps: usize, due_limit: Option<i64>) -> Error {
        let due_limit_desc = due_limit
            .map(|value| value.to_string())
            .unwrap_or_else(|| "none".into());
        let next_task_desc = self
            .scheduler
            .next_task_index(due_limit)
            .and_then(|idx| self.scheduler.task_queue.get(idx))
            .map(|task| {
                format!(
                    "id={},due_at={},order={},callback={:?}",
                    task.id, task.due_at, task.order, task.callback
                )
            })
            .unwrap_or_else(|| "none".into());

        Error::HostRuntime(format!(
            "task queue exceeded max steps (possible self-rescheduling action): limit={}, steps={steps}, now_ms={}, due_limit={due_limit_desc}, pending_tasks={}, next_task={next_task_desc}",
            self.scheduler.timer_step_limit,
            self.scheduler.now_ms,
            self.scheduler.task_queue.len(),
        ))
    }

    fn execute_task(&mut self, task: ScheduledTask) -> Result<()> {
        let now_ms = self.scheduler.now_ms;
        self.engine.trace_mut().line(TraceCategory::Timers, || {
            format!(
                "[timer] run id={} due_at={} now_ms={now_ms} callback={:?}",
                task.id, task.due_at, task.callback
            )
        });
        match task.callback {
            TaskCallback::Engine(deferred) => {
                self.engine.run_deferred(deferred, &mut self.dom);
                self.run_mutation_checkpoint();
            }
            TaskCallback::Host(action) => self.apply_host_action(action)?,
        }
        Ok(())
    }

    pub fn enqueue_confirm_response(&mut self, accepted: bool) {
        self.platform_mocks.confirm_responses.push_back(accepted);
    }

    pub fn set_default_confirm_response(&mut self, accepted: bool) {
        self.platform_mocks.default_confirm_response = accepted;
    }

    pub fn take_confirm_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.platform_mocks.confirm_messages)
    }

    pub fn take_navigations(&mut self) -> Vec<Navigation> {
        std::mem::take(&mut self.navigations)
    }

    pub fn enable_trace(&mut self, enabled: bool) {
        self.engine.enable_trace(enabled);
    }

    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.engine.set_trace_stderr(enabled);
    }

    pub fn set_trace_category(&mut self, category: TraceCategory, enabled: bool) {
        self.engine.set_trace_category(category, enabled);
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        self.engine.set_trace_log_limit(max_entries)
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        self.engine.take_trace_logs()
    }

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.text_content(target);
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    /// `expected == None` asserts the attribute is absent.
    pub fn assert_attribute(
        &self,
        selector: &str,
        name: &str,
        expected: Option<&str>,
    ) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.attribute(target, name);
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: format!("{name}={expected:?}"),
                actual: format!("{name}={actual:?}"),
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_processed(&self, selector: &str, expected: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.is_processed(target);
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: format!("processed={expected}"),
                actual: format!("processed={actual}"),
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        let _ = self.select_one(selector)?;
        Ok(())
    }

    pub fn text(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.text_content(target))
    }

    pub fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let target = self.select_one(selector)?;
        Ok(self.dom.attribute(target, name).map(str::to_string))
    }

    pub fn count(&self, selector: &str) -> Result<usize> {
        let selector = Selector::parse(selector)?;
        Ok(self.dom.query_selector_all(&selector).len())
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.dump_node(target))
    }

    pub fn select_one(&self, selector: &str) -> Result<NodeId> {
        let parsed = Selector::parse(selector)?;
        self.dom
            .query_selector_all(&parsed)
            .into_iter()
            .next()
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    fn node_snippet(&self, node_id: NodeId) -> String {
        truncate_chars(&self.dom.dump_node(node_id), SNIPPET_CHAR_LIMIT)
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    let mut out = String::new();
    for (count, ch) in value.chars().enumerate() {
        if count >= max_chars {
            out.push_str("...");
            break;
        }
        out.push(ch);
    }
    out
}
