//! TS<T>: a single scalar time-series value.

use super::TimeSeries;
use crate::context::EngineContext;
use crate::time::Time;
use std::cell::RefCell;
use std::rc::Rc;

/// The producing half of a scalar time-series. Owned by the node that
/// computes it; shared with subscribing inputs via [`OutputHandle`].
pub struct ScalarOutput<T: Clone + 'static> {
    value: Option<T>,
    last_modified_time: Time,
    subscribers: Vec<usize>,
}

impl<T: Clone + 'static> Default for ScalarOutput<T> {
    fn default() -> Self {
        Self {
            value: None,
            last_modified_time: Time::MIN_DT,
            subscribers: Vec::new(),
        }
    }
}

impl<T: Clone + 'static> ScalarOutput<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a new value at the current time and wake every active
    /// subscriber.
    pub fn set(&mut self, value: T, ctx: &mut EngineContext) {
        self.value = Some(value);
        self.last_modified_time = ctx.time();
        for &sub in &self.subscribers {
            ctx.mark_dirty(sub);
        }
    }

    pub fn value(&self) -> &T {
        self.value.as_ref().expect("read of an invalid TS output")
    }

    /// For a scalar, the delta applied this tick is the whole value.
    pub fn delta_value(&self) -> &T {
        self.value()
    }

    pub(crate) fn subscribe(&mut self, node_index: usize) {
        if !self.subscribers.contains(&node_index) {
            self.subscribers.push(node_index);
        }
    }

    pub(crate) fn unsubscribe(&mut self, node_index: usize) {
        self.subscribers.retain(|&ix| ix != node_index);
    }
}

impl<T: Clone + 'static> TimeSeries for ScalarOutput<T> {
    fn valid(&self) -> bool {
        self.value.is_some()
    }

    fn last_modified_time(&self) -> Time {
        self.last_modified_time
    }
}

pub type OutputHandle<T> = Rc<RefCell<ScalarOutput<T>>>;

pub fn new_output<T: Clone + 'static>() -> OutputHandle<T> {
    Rc::new(RefCell::new(ScalarOutput::new()))
}

/// The consuming half of a scalar time-series. Binds to an [`OutputHandle`];
/// becoming active registers with that output so its modifications wake the
/// owning node (§4.2's "active-inputs" gating).
pub struct ScalarInput<T: Clone + 'static> {
    bound: Option<OutputHandle<T>>,
    active: bool,
    owner: usize,
}

impl<T: Clone + 'static> ScalarInput<T> {
    pub fn new(owner: usize) -> Self {
        Self {
            bound: None,
            active: false,
            owner,
        }
    }

    pub fn bind(&mut self, output: OutputHandle<T>) {
        self.unbind();
        if self.active {
            output.borrow_mut().subscribe(self.owner);
        }
        self.bound = Some(output);
    }

    pub fn unbind(&mut self) {
        if let Some(out) = self.bound.take() {
            if self.active {
                out.borrow_mut().unsubscribe(self.owner);
            }
        }
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    pub fn make_active(&mut self) {
        if !self.active {
            self.active = true;
            if let Some(out) = &self.bound {
                out.borrow_mut().subscribe(self.owner);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn value(&self) -> T {
        self.bound
            .as_ref()
            .expect("read of an unbound TS input")
            .borrow()
            .value()
            .clone()
    }

    pub fn delta_value(&self) -> T {
        self.value()
    }
}

impl<T: Clone + 'static> TimeSeries for ScalarInput<T> {
    fn valid(&self) -> bool {
        self.bound.as_ref().map(|o| o.borrow().valid()).unwrap_or(false)
    }

    fn last_modified_time(&self) -> Time {
        self.bound
            .as_ref()
            .map(|o| o.borrow().last_modified_time())
            .unwrap_or(Time::MIN_DT)
    }
}
