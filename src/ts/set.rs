//! TSS<T>: an unordered collection with per-instant added/removed deltas.
//!
//! Unlike a scalar, a set's "delta" isn't the whole value — it's which
//! elements were added and removed since the last tick. Those lists must be
//! empty again once the instant has fully drained, so every mutation
//! registers an [`EngineContext::after_eval`] callback (once per tick) that
//! clears them.

use super::TimeSeries;
use crate::context::EngineContext;
use crate::time::Time;
use indexmap::IndexSet;
use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

pub struct TssOutput<T: Hash + Eq + Clone + 'static> {
    items: IndexSet<T>,
    added: Vec<T>,
    removed: Vec<T>,
    last_modified_time: Time,
    ever_written: bool,
    subscribers: Vec<usize>,
    clear_pending: bool,
}

impl<T: Hash + Eq + Clone + 'static> Default for TssOutput<T> {
    fn default() -> Self {
        Self {
            items: IndexSet::new(),
            added: Vec::new(),
            removed: Vec::new(),
            last_modified_time: Time::MIN_DT,
            ever_written: false,
            subscribers: Vec::new(),
            clear_pending: false,
        }
    }
}

impl<T: Hash + Eq + Clone + 'static> TssOutput<T> {
    pub fn items(&self) -> &IndexSet<T> {
        &self.items
    }

    pub fn added(&self) -> &[T] {
        &self.added
    }

    pub fn removed(&self) -> &[T] {
        &self.removed
    }

    pub fn contains(&self, value: &T) -> bool {
        self.items.contains(value)
    }

    fn clear_deltas(&mut self) {
        self.added.clear();
        self.removed.clear();
        self.clear_pending = false;
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

impl<T: Hash + Eq + Clone + 'static> TimeSeries for TssOutput<T> {
    fn valid(&self) -> bool {
        self.ever_written
    }

    fn last_modified_time(&self) -> Time {
        self.last_modified_time
    }
}

pub type SetOutputHandle<T> = Rc<RefCell<TssOutput<T>>>;

pub fn new_set_output<T: Hash + Eq + Clone + 'static>() -> SetOutputHandle<T> {
    Rc::new(RefCell::new(TssOutput::default()))
}

fn schedule_clear<T: Hash + Eq + Clone + 'static>(
    handle: &SetOutputHandle<T>,
    ctx: &mut EngineContext,
) {
    let mut out = handle.borrow_mut();
    out.last_modified_time = ctx.time();
    out.ever_written = true;
    if !out.clear_pending {
        out.clear_pending = true;
        let h = handle.clone();
        ctx.after_eval(move || h.borrow_mut().clear_deltas());
    }
}

/// Insert `value`; returns `false` (no-op) if already present.
pub fn tss_add<T: Hash + Eq + Clone + 'static>(
    handle: &SetOutputHandle<T>,
    value: T,
    ctx: &mut EngineContext,
) -> bool {
    let inserted = {
        let mut out = handle.borrow_mut();
        if out.items.insert(value.clone()) {
            out.added.push(value);
            true
        } else {
            false
        }
    };
    if inserted {
        schedule_clear(handle, ctx);
        let subs = handle.borrow().subscribers.clone();
        for sub in subs {
            ctx.mark_dirty(sub);
        }
    }
    inserted
}

/// Remove `value`; returns `false` (no-op) if not present.
pub fn tss_remove<T: Hash + Eq + Clone + 'static>(
    handle: &SetOutputHandle<T>,
    value: &T,
    ctx: &mut EngineContext,
) -> bool {
    let removed = {
        let mut out = handle.borrow_mut();
        if out.items.shift_remove(value) {
            out.removed.push(value.clone());
            true
        } else {
            false
        }
    };
    if removed {
        schedule_clear(handle, ctx);
        let subs = handle.borrow().subscribers.clone();
        for sub in subs {
            ctx.mark_dirty(sub);
        }
    }
    removed
}

pub struct TssInput<T: Hash + Eq + Clone + 'static> {
    bound: Option<SetOutputHandle<T>>,
    active: bool,
    owner: usize,
}

impl<T: Hash + Eq + Clone + 'static> TssInput<T> {
    pub fn new(owner: usize) -> Self {
        Self {
            bound: None,
            active: false,
            owner,
        }
    }

    pub fn bind(&mut self, output: SetOutputHandle<T>) {
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

    pub fn make_active(&mut self) {
        if !self.active {
            self.active = true;
            if let Some(out) = &self.bound {
                out.borrow_mut().subscribe(self.owner);
            }
        }
    }

    fn out(&self) -> std::cell::Ref<'_, TssOutput<T>> {
        self.bound.as_ref().expect("read of an unbound TSS input").borrow()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.out().contains(value)
    }

    pub fn added(&self) -> Vec<T> {
        self.out().added().to_vec()
    }

    pub fn removed(&self) -> Vec<T> {
        self.out().removed().to_vec()
    }

    pub fn items(&self) -> IndexSet<T> {
        self.out().items().clone()
    }
}

impl<T: Hash + Eq + Clone + 'static> TimeSeries for TssInput<T> {
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
