use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorState {
    #[default]
    Idle,
    /// A deferred rescan is queued; further batches fold into it.
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BatchOutcome {
    Scheduled,
    Coalesced,
    Ignored,
}

/// Single-slot debounce between mutation batches and rescans.
///
/// At most one [`DeferredTask::Rescan`] is outstanding at any time. The slot
/// frees up when the host runs that task, not when the rescan finishes, so a
/// batch arriving after the task started always gets a fresh rescan.
#[derive(Debug, Clone, Default)]
pub struct ChangeMonitor {
    state: MonitorState,
    observer: Option<ObserverId>,
    batches_seen: usize,
    rescans_scheduled: usize,
}

impl ChangeMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn observer(&self) -> Option<ObserverId> {
        self.observer
    }

    pub fn batches_seen(&self) -> usize {
        self.batches_seen
    }

    pub fn rescans_scheduled(&self) -> usize {
        self.rescans_scheduled
    }

    /// Subscribes to child-list changes anywhere under `root`.
    pub fn observe<O: MutationSource + ?Sized>(
        &mut self,
        source: &mut O,
        root: NodeId,
    ) -> Result<ObserverId> {
        let id = source.observe(root, ObserverInit::child_list_subtree())?;
        self.observer = Some(id);
        Ok(id)
    }

    pub(crate) fn notify<S: TaskScheduler + ?Sized>(
        &mut self,
        observer: ObserverId,
        records: &[MutationRecord],
        scheduler: &mut S,
    ) -> BatchOutcome {
        if self.observer != Some(observer) || records.is_empty() {
            return BatchOutcome::Ignored;
        }
        self.batches_seen += 1;
        match self.state {
            MonitorState::Scheduled => BatchOutcome::Coalesced,
            MonitorState::Idle => {
                scheduler.defer(DeferredTask::Rescan, 0);
                self.state = MonitorState::Scheduled;
                self.rescans_scheduled += 1;
                BatchOutcome::Scheduled
            }
        }
    }

    /// Frees the slot. Returns false if no rescan was outstanding.
    pub(crate) fn begin_rescan(&mut self) -> bool {
        std::mem::replace(&mut self.state, MonitorState::Idle) == MonitorState::Scheduled
    }
}
