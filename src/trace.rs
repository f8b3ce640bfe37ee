use super::*;
use std::collections::VecDeque;

const DEFAULT_TRACE_LOG_LIMIT: usize = 10_000;

/// Groups of trace lines that can be switched off independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceCategory {
    /// `[pass]` lines: pass start/finish and per-node rewrites.
    Passes,
    /// `[expand]` lines: link holing, restores and container flags.
    Expansion,
    /// `[monitor]` lines: mutation batches and scheduling decisions.
    Monitor,
    /// `[timer]` lines from the page task queue.
    Timers,
}

#[derive(Debug)]
pub(crate) struct TraceState {
    pub(crate) enabled: bool,
    pub(crate) passes: bool,
    pub(crate) expansion: bool,
    pub(crate) monitor: bool,
    pub(crate) timers: bool,
    pub(crate) logs: VecDeque<String>,
    pub(crate) log_limit: usize,
    pub(crate) to_stderr: bool,
}

impl Default for TraceState {
    fn default() -> Self {
        Self {
            enabled: false,
            passes: true,
            expansion: true,
            monitor: true,
            timers: true,
            logs: VecDeque::new(),
            log_limit: DEFAULT_TRACE_LOG_LIMIT,
            to_stderr: true,
        }
    }
}

impl TraceState {
    pub(crate) fn category_enabled(&self, category: TraceCategory) -> bool {
        self.enabled
            && match category {
                TraceCategory::Passes => self.passes,
                TraceCategory::Expansion => self.expansion,
                TraceCategory::Monitor => self.monitor,
                TraceCategory::Timers => self.timers,
            }
    }

    pub(crate) fn set_category(&mut self, category: TraceCategory, enabled: bool) {
        match category {
            TraceCategory::Passes => self.passes = enabled,
            TraceCategory::Expansion => self.expansion = enabled,
            TraceCategory::Monitor => self.monitor = enabled,
            TraceCategory::Timers => self.timers = enabled,
        }
    }

    /// Records `line` if its category is on. The closure keeps formatting
    /// off the hot path while tracing is disabled.
    pub(crate) fn line(&mut self, category: TraceCategory, line: impl FnOnce() -> String) {
        if self.category_enabled(category) {
            self.push(line());
        }
    }

    fn push(&mut self, line: String) {
        if self.to_stderr {
            eprintln!("{line}");
        }
        if self.logs.len() >= self.log_limit {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
    }

    pub(crate) fn take_logs(&mut self) -> Vec<String> {
        self.logs.drain(..).collect()
    }

    pub(crate) fn set_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::HostRuntime(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        self.log_limit = max_entries;
        while self.logs.len() > self.log_limit {
            self.logs.pop_front();
        }
        Ok(())
    }
}
