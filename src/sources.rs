//! The two source node kinds the engine itself provides (§4.4): a push
//! source fed from outside the graph, possibly from another thread, and a
//! pull-generator source that resumes a `(time, value)` state machine.

use crate::context::{EngineContext, RunMode};
use crate::error::{EngineError, Result as EngineResult};
use crate::node::{MutableNode, NodeKind, NodeSignature};
use crate::node_id::NodeId;
use crate::scheduler::UNTAGGED;
use crate::ts::scalar::{new_output, OutputHandle};
use crate::time::Time;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A handle cloned out to other threads (or the external wiring layer) to
/// feed values into a [`PushSourceNode`]. Enqueueing after the source has
/// stopped is an error rather than silently dropped, per the fail-fast
/// policy.
pub struct PushSender<T> {
    queue: Arc<Mutex<VecDeque<(Time, T)>>>,
    stopped: Arc<AtomicBool>,
    node_id: NodeId,
}

impl<T> Clone for PushSender<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            stopped: self.stopped.clone(),
            node_id: self.node_id.clone(),
        }
    }
}

impl<T> PushSender<T> {
    pub fn enqueue(&self, time: Time, value: T) -> EngineResult<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(EngineError::EnqueueOnStopped(self.node_id.clone()));
        }
        self.queue.lock().unwrap().push_back((time, value));
        Ok(())
    }
}

/// A source node whose values arrive asynchronously. Queued `(time, value)`
/// pairs due at or before the current instant are drained on `cycle`; if any
/// remain, the node reschedules itself for the earliest of them.
pub struct PushSourceNode<T: Clone + 'static> {
    output: OutputHandle<T>,
    queue: Arc<Mutex<VecDeque<(Time, T)>>>,
    stopped: Arc<AtomicBool>,
    node_id: NodeId,
}

impl<T: Clone + 'static> PushSourceNode<T> {
    pub fn new(node_id: NodeId) -> (Self, PushSender<T>) {
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let stopped = Arc::new(AtomicBool::new(false));
        let node = Self {
            output: new_output(),
            queue: queue.clone(),
            stopped: stopped.clone(),
            node_id: node_id.clone(),
        };
        let sender = PushSender {
            queue,
            stopped,
            node_id,
        };
        (node, sender)
    }

    pub fn output(&self) -> OutputHandle<T> {
        self.output.clone()
    }

    fn earliest_queued(&self) -> Option<Time> {
        self.queue.lock().unwrap().front().map(|(t, _)| *t)
    }
}

impl<T: Clone + 'static> MutableNode for PushSourceNode<T> {
    fn cycle(&mut self, ctx: &mut EngineContext) -> EngineResult<bool> {
        let now = ctx.time();
        let mut ticked = false;
        loop {
            let due = {
                let mut q = self.queue.lock().unwrap();
                match q.front() {
                    Some((t, _)) if *t <= now => q.pop_front(),
                    _ => None,
                }
            };
            match due {
                Some((_, value)) => {
                    self.output.borrow_mut().set(value, ctx);
                    ticked = true;
                }
                None => break,
            }
        }
        if let Some(next) = self.earliest_queued() {
            ctx.schedule_self(UNTAGGED, next);
        }
        Ok(ticked)
    }

    fn start(&mut self, ctx: &mut EngineContext) -> EngineResult<()> {
        if let Some(next) = self.earliest_queued() {
            ctx.schedule_self(UNTAGGED, next);
        }
        Ok(())
    }

    fn stop(&mut self, _ctx: &mut EngineContext) -> EngineResult<()> {
        self.stopped.store(true, Ordering::Release);
        Ok(())
    }

    fn signature(&self) -> NodeSignature {
        NodeSignature::new(NodeKind::PushSource, "PushSourceNode".to_string())
    }
}

/// A function resumed each time it's called: given `None` (first call) or
/// `Some(previous_value)`, returns the next `(time, value)` to emit, or
/// `None` to stop generating. Boxed so a pull source can be built from any
/// closure, matching how the rest of the engine takes node behaviour as
/// plain Rust functions rather than a bespoke DSL.
pub type GeneratorFn<T> = Box<dyn FnMut(Option<&T>, Time) -> Option<(Time, T)>>;

/// A source node that pulls its next value from a resumable generator
/// function rather than waiting on external pushes. Useful for deterministic
/// historical-mode inputs built without a harness.
pub struct PullGeneratorNode<T: Clone + 'static> {
    output: OutputHandle<T>,
    generator: GeneratorFn<T>,
    last_value: Option<T>,
    /// The next `(time, value)` pulled from `generator` but not yet applied.
    /// Pulling ahead to know when to reschedule would otherwise discard
    /// whichever pair wasn't due yet, so the pulled pair is cached here
    /// instead of being pulled again.
    pending: Option<(Time, T)>,
}

impl<T: Clone + 'static> PullGeneratorNode<T> {
    pub fn new(generator: GeneratorFn<T>) -> Self {
        Self {
            output: new_output(),
            generator,
            last_value: None,
            pending: None,
        }
    }

    pub fn output(&self) -> OutputHandle<T> {
        self.output.clone()
    }

    fn pull(&mut self, now: Time) {
        if self.pending.is_none() {
            self.pending = (self.generator)(self.last_value.as_ref(), now);
        }
    }
}

impl<T: Clone + 'static> MutableNode for PullGeneratorNode<T> {
    fn cycle(&mut self, ctx: &mut EngineContext) -> EngineResult<bool> {
        let now = ctx.time();
        self.pull(now);
        match self.pending.take() {
            Some((when, value)) if when <= now => {
                self.last_value = Some(value.clone());
                self.output.borrow_mut().set(value, ctx);
                self.pull(now);
                if let Some((next, _)) = &self.pending {
                    ctx.schedule_self(UNTAGGED, (*next).max(now + Time::MIN_TD));
                }
                Ok(true)
            }
            Some((when, value)) => {
                self.pending = Some((when, value));
                ctx.schedule_self(UNTAGGED, when);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn start(&mut self, ctx: &mut EngineContext) -> EngineResult<()> {
        let now = ctx.time();
        self.pull(now);
        if let Some((when, _)) = &self.pending {
            ctx.schedule_self(UNTAGGED, (*when).max(now + Time::MIN_TD));
        }
        Ok(())
    }

    fn signature(&self) -> NodeSignature {
        NodeSignature::new(NodeKind::PullSource, "PullGeneratorNode".to_string())
    }
}
