use super::*;
use crate::expansion::handle_holed_link_click;
use crate::media_pass::run_media_pass;
use crate::monitor::BatchOutcome;
use crate::text_pass::run_text_pass;
use crate::trace::TraceState;

/// What one or more passes changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub text_nodes: usize,
    pub images: usize,
    pub links: usize,
    pub containers: usize,
}

impl PassReport {
    pub fn merge(&mut self, other: PassReport) {
        self.text_nodes += other.text_nodes;
        self.images += other.images;
        self.links += other.links;
        self.containers += other.containers;
    }

    pub fn total(&self) -> usize {
        self.text_nodes + self.images + self.links + self.containers
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

pub(crate) struct PassContext<'a> {
    pub(crate) table: &'a PatternTable,
    pub(crate) config: &'a HoleConfig,
    pub(crate) trace: &'a mut TraceState,
    pub(crate) report: PassReport,
}

/// The rewriting engine.
///
/// It owns the pattern table, the configuration, the change monitor and the
/// trace log. It holds no references into the document: every per-node fact
/// (processed flag, markers, listeners) lives on the document itself, so the
/// same engine can be pointed at any [`Document`].
#[derive(Debug, Default)]
pub struct MemoryHole {
    table: PatternTable,
    config: HoleConfig,
    monitor: ChangeMonitor,
    trace: TraceState,
    totals: PassReport,
    rescans: usize,
}

/// Builds an engine with the stock table, subscribes it to `observer` and
/// runs one pass over `document`.
pub fn initialize<D, O>(document: &mut D, observer: &mut O) -> Result<MemoryHole>
where
    D: Document + ?Sized,
    O: MutationSource + ?Sized,
{
    let mut engine = MemoryHole::new(PatternTable::stock()?, HoleConfig::default());
    engine.attach(document, observer)?;
    Ok(engine)
}

impl MemoryHole {
    pub fn new(table: PatternTable, config: HoleConfig) -> Self {
        Self {
            table,
            config,
            monitor: ChangeMonitor::new(),
            trace: TraceState::default(),
            totals: PassReport::default(),
            rescans: 0,
        }
    }

    pub fn table(&self) -> &PatternTable {
        &self.table
    }

    /// Table edits only affect nodes that are not processed yet.
    pub fn table_mut(&mut self) -> &mut PatternTable {
        &mut self.table
    }

    pub fn config(&self) -> &HoleConfig {
        &self.config
    }

    pub fn monitor(&self) -> &ChangeMonitor {
        &self.monitor
    }

    pub fn monitor_state(&self) -> MonitorState {
        self.monitor.state()
    }

    /// Everything changed since the engine was created.
    pub fn totals(&self) -> PassReport {
        self.totals
    }

    pub fn rescans(&self) -> usize {
        self.rescans
    }

    /// Subscribes the change monitor to the document root, then runs one
    /// synchronous rescan for content that is already there.
    pub fn attach<D, O>(&mut self, document: &mut D, observer: &mut O) -> Result<PassReport>
    where
        D: Document + ?Sized,
        O: MutationSource + ?Sized,
    {
        let root = document.root();
        let id = self.monitor.observe(observer, root)?;
        self.trace.line(TraceCategory::Monitor, || {
            format!("[monitor] observe root={} observer={}", root.index(), id.index())
        });
        Ok(self.rescan(document))
    }

    /// Runs the text pass, then the media pass.
    pub fn rescan<D: Document + ?Sized>(&mut self, document: &mut D) -> PassReport {
        self.rescans += 1;
        let rescan = self.rescans;
        self.trace
            .line(TraceCategory::Passes, || format!("[pass] start rescan={rescan}"));

        let mut ctx = PassContext {
            table: &self.table,
            config: &self.config,
            trace: &mut self.trace,
            report: PassReport::default(),
        };
        run_text_pass(document, &mut ctx);
        if ctx.config.scan_media() {
            run_media_pass(document, &mut ctx);
        }
        let report = ctx.report;

        self.trace.line(TraceCategory::Passes, || {
            format!(
                "[pass] done rescan={rescan} text={} images={} links={} containers={}",
                report.text_nodes, report.images, report.links, report.containers
            )
        });
        self.totals.merge(report);
        report
    }

    /// Feeds one delivered mutation batch to the change monitor. Returns
    /// true if a rescan was scheduled.
    pub fn handle_mutations<S: TaskScheduler + ?Sized>(
        &mut self,
        observer: ObserverId,
        records: &[MutationRecord],
        scheduler: &mut S,
    ) -> bool {
        let outcome = self.monitor.notify(observer, records, scheduler);
        self.trace.line(TraceCategory::Monitor, || {
            let decision = match outcome {
                BatchOutcome::Scheduled => "scheduled",
                BatchOutcome::Coalesced => "coalesced",
                BatchOutcome::Ignored => "ignored",
            };
            format!(
                "[monitor] batch observer={} records={} {decision}",
                observer.index(),
                records.len()
            )
        });
        outcome == BatchOutcome::Scheduled
    }

    /// Runs a task this engine handed to a [`TaskScheduler`].
    pub fn run_deferred<D: Document + ?Sized>(
        &mut self,
        task: DeferredTask,
        document: &mut D,
    ) -> PassReport {
        match task {
            DeferredTask::Rescan => {
                let was_scheduled = self.monitor.begin_rescan();
                self.trace.line(TraceCategory::Monitor, || {
                    format!("[monitor] deferred rescan scheduled={was_scheduled}")
                });
                self.rescan(document)
            }
        }
    }

    /// Click on a node carrying [`Listener::HoledLinkRestore`].
    pub fn handle_click<D, P>(
        &mut self,
        document: &mut D,
        link: NodeId,
        prompt: &mut P,
    ) -> ClickOutcome
    where
        D: Document + ?Sized,
        P: ConfirmPrompt + ?Sized,
    {
        handle_holed_link_click(document, link, prompt, &self.config, &mut self.trace)
    }

    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace.enabled = enabled;
    }

    pub fn set_trace_category(&mut self, category: TraceCategory, enabled: bool) {
        self.trace.set_category(category, enabled);
    }

    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.trace.to_stderr = enabled;
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        self.trace.set_log_limit(max_entries)
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        self.trace.take_logs()
    }

    pub(crate) fn trace_mut(&mut self) -> &mut TraceState {
        &mut self.trace
    }
}
