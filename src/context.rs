//! [`EngineContext`]: the mutable run state a node's `eval`/`start`/`stop`
//! methods see. Merges the clock, the dirty-node tracking and the pending
//! scheduled-wakeup queue, mirroring how the source keeps these together in
//! one place rather than threading three separate handles through the call
//! stack.

use crate::queue::TimeQueue;
use crate::scheduler::NodeScheduler;
use crate::time::Time;
use std::cell::RefCell;

/// How the graph advances its clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// The clock tracks the wall clock; push sources may arrive from other threads.
    RealTime,
    /// The clock only ever advances to the next scheduled or pushed time; no
    /// wall-clock waiting.
    Simulation { start: Time },
}

impl RunMode {
    pub fn start_time(&self) -> Time {
        match self {
            RunMode::RealTime => Time::now(),
            RunMode::Simulation { start } => *start,
        }
    }
}

/// How long a run should continue.
#[derive(Clone, Copy, Debug)]
pub enum RunFor {
    Duration(std::time::Duration),
    Cycles(u32),
    Forever,
}

impl RunFor {
    pub fn done(&self, cycle: u32, elapsed: Time) -> bool {
        match self {
            RunFor::Cycles(n) => cycle > *n,
            RunFor::Duration(d) => elapsed >= Time::from(*d),
            RunFor::Forever => false,
        }
    }
}

type AfterEvalCallback = Box<dyn FnOnce()>;

/// Context passed to every node during `start`, `eval` and `stop`. Owns the
/// clock, the rank-ordered ready set and the queue of future wakeups.
pub struct EngineContext {
    time: Time,
    start_time: Time,
    is_last_cycle: bool,
    run_mode: RunMode,
    current_node_index: Option<usize>,
    ranks: Vec<usize>,
    node_dirty: Vec<bool>,
    node_ticked: Vec<bool>,
    dirty_by_rank: Vec<Vec<usize>>,
    pending: TimeQueue<usize>,
    after_eval: Vec<AfterEvalCallback>,
    schedulers: Vec<RefCell<NodeScheduler>>,
}

impl EngineContext {
    pub(crate) fn new(run_mode: RunMode) -> Self {
        let start_time = run_mode.start_time();
        Self {
            time: start_time,
            start_time,
            is_last_cycle: false,
            run_mode,
            current_node_index: None,
            ranks: Vec::new(),
            node_dirty: Vec::new(),
            node_ticked: Vec::new(),
            dirty_by_rank: Vec::new(),
            pending: TimeQueue::new(),
            after_eval: Vec::new(),
            schedulers: Vec::new(),
        }
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn elapsed(&self) -> Time {
        self.time - self.start_time
    }

    pub fn start_time(&self) -> Time {
        self.start_time
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn is_last_cycle(&self) -> bool {
        self.is_last_cycle
    }

    /// The index of the node currently executing `start`/`eval`/`stop`.
    /// Panics outside of those calls, mirroring the source's use of an
    /// `Option` that's only ever unwrapped by code invoked from `apply_nodes`.
    pub fn current_node_index(&self) -> usize {
        self.current_node_index
            .expect("current_node_index read outside of a node callback")
    }

    /// Whether `node_index` produced output during the current cycle.
    pub fn ticked(&self, node_index: usize) -> bool {
        self.node_ticked[node_index]
    }

    /// Mark `node_index` ready to be cycled during the current instant. Cheap
    /// to call redundantly: a node already marked dirty this cycle is a no-op.
    pub fn mark_dirty(&mut self, node_index: usize) {
        if !self.node_dirty[node_index] {
            let rank = self.ranks[node_index];
            self.dirty_by_rank[rank].push(node_index);
            self.node_dirty[node_index] = true;
        }
    }

    /// Schedule the current node to be cycled again at `when`, regardless of
    /// whether any input changes by then. `tag` lets repeated calls replace a
    /// prior wakeup instead of stacking up (§4.2's scheduler semantics).
    pub fn schedule_self(&mut self, tag: &str, when: Time) {
        let idx = self.current_node_index();
        self.schedule_node(idx, tag, when);
    }

    pub(crate) fn schedule_node(&mut self, node_index: usize, tag: &str, when: Time) {
        let current = self.time;
        let became_head = self.schedulers[node_index]
            .borrow_mut()
            .schedule(tag, when, current);
        if became_head {
            self.pending.push(node_index, when);
        }
    }

    /// Cancel the current node's pending wakeup for `tag` (or the earliest
    /// one, if `tag` is `None`).
    pub fn un_schedule_self(&mut self, tag: Option<&str>) {
        let idx = self.current_node_index();
        self.schedulers[idx].borrow_mut().un_schedule(tag);
    }

    pub(crate) fn is_scheduled_now(&self, node_index: usize) -> bool {
        self.schedulers[node_index].borrow().is_scheduled_now(self.time)
    }

    pub(crate) fn advance_scheduler(&self, node_index: usize) -> Option<Time> {
        self.schedulers[node_index].borrow_mut().advance(self.time)
    }

    /// Re-insert `node_index` into the global pending-wakeup queue at
    /// `when`, without touching its own [`NodeScheduler`]'s entries (used
    /// when that scheduler already has the next entry queued and we just
    /// need the graph to know when to next look at it).
    pub(crate) fn requeue_pending(&mut self, node_index: usize, when: Time) {
        self.pending.push(node_index, when);
    }

    /// Register a callback to run once, after the current instant's
    /// evaluation has fully drained. Used to clear per-instant bookkeeping
    /// such as a [`crate::ts::set::TssOutput`]'s added/removed deltas.
    pub fn after_eval(&mut self, callback: impl FnOnce() + 'static) {
        self.after_eval.push(Box::new(callback));
    }

    pub(crate) fn register_nodes(&mut self, ranks: Vec<usize>) {
        let n = ranks.len();
        let max_rank = ranks.iter().copied().max().map(|r| r + 1).unwrap_or(0);
        self.ranks = ranks;
        self.node_dirty = vec![false; n];
        self.node_ticked = vec![false; n];
        self.dirty_by_rank = vec![Vec::new(); max_rank];
        self.schedulers = (0..n).map(|_| RefCell::new(NodeScheduler::new())).collect();
    }

    pub(crate) fn set_current_node(&mut self, index: Option<usize>) {
        self.current_node_index = index;
    }

    pub(crate) fn set_ticked(&mut self, index: usize) {
        self.node_ticked[index] = true;
    }

    pub(crate) fn set_time(&mut self, time: Time) {
        self.time = time;
    }

    pub(crate) fn set_last_cycle(&mut self, last: bool) {
        self.is_last_cycle = last;
    }

    pub(crate) fn next_scheduled_time(&self) -> Option<Time> {
        self.pending.next_time()
    }

    pub(crate) fn drain_due(&mut self, current_time: Time) -> Vec<usize> {
        self.pending.drain_due(current_time)
    }

    pub(crate) fn dirty_ranks(&self) -> usize {
        self.dirty_by_rank.len()
    }

    pub(crate) fn take_rank(&mut self, rank: usize) -> Vec<usize> {
        std::mem::take(&mut self.dirty_by_rank[rank])
    }

    pub(crate) fn run_after_eval(&mut self) {
        for cb in self.after_eval.drain(..) {
            cb();
        }
    }

    pub(crate) fn reset_for_next_instant(&mut self) {
        for t in self.node_ticked.iter_mut() {
            *t = false;
        }
        for d in self.node_dirty.iter_mut() {
            *d = false;
        }
    }
}
