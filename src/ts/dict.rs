//! TSD<K, V>: a dynamic dictionary of scalar children, keyed by `K`.
//!
//! Keys can be added and removed as the graph runs (unlike [`super::bundle`]'s
//! fixed shape). A `TsdOutput` keeps a [`super::set::TssOutput`] peer tracking
//! just the key set, so a consumer that only cares about membership can bind
//! to that directly rather than the whole dict. `added_keys`/`removed_items`
//! mirror `TssOutput`'s added/removed convention and clear the same way, via
//! an [`EngineContext::after_eval`] callback.
//!
//! A bound `TsdInput` materializes one [`ScalarInput`] child per key and
//! keeps that set in step with the output's membership by registering itself
//! as a key observer (source's `add_key_observer`/`on_key_added`/
//! `on_key_removed`): when a key appears the input gets a freshly bound
//! child, when a key disappears the child is moved into `removed_items` so a
//! node can still read its last value during the tick it vanished.

use super::scalar::{new_output, OutputHandle, ScalarInput, ScalarOutput};
use super::set::{new_set_output, tss_add, tss_remove, SetOutputHandle};
use super::TimeSeries;
use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use crate::node_id::NodeId;
use crate::time::Time;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::hash::Hash;
use std::rc::{Rc, Weak};

/// A value that may delete the key it's assigned to, mirroring the source's
/// `REMOVE`/`REMOVE_IF_EXISTS` sentinels for the `value = {...}` apply path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DictUpdate<V> {
    Set(V),
    Remove,
    RemoveIfExists,
}

/// One entry of a dict's delta this tick: either a modified child's new
/// value, or a key that was removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DictDelta<V> {
    Value(V),
    Remove,
}

pub struct TsdOutput<K: Hash + Eq + Clone + 'static, V: Clone + 'static> {
    children: IndexMap<K, OutputHandle<V>>,
    key_set: SetOutputHandle<K>,
    removed_items: Vec<(K, V)>,
    last_modified_time: Time,
    ever_written: bool,
    subscribers: Vec<usize>,
    clear_pending: bool,
    key_observers: Vec<Weak<RefCell<TsdInputState<K, V>>>>,
}

impl<K: Hash + Eq + Clone + 'static, V: Clone + 'static> Default for TsdOutput<K, V> {
    fn default() -> Self {
        Self {
            children: IndexMap::new(),
            key_set: new_set_output(),
            removed_items: Vec::new(),
            last_modified_time: Time::MIN_DT,
            ever_written: false,
            subscribers: Vec::new(),
            clear_pending: false,
            key_observers: Vec::new(),
        }
    }
}

impl<K: Hash + Eq + Clone + 'static, V: Clone + 'static> TsdOutput<K, V> {
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.children.keys()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.children.contains_key(key)
    }

    pub fn child(&self, key: &K) -> Option<OutputHandle<V>> {
        self.children.get(key).cloned()
    }

    /// The key-set peer: the same membership, as a `TSS<K>`.
    pub fn key_set(&self) -> SetOutputHandle<K> {
        self.key_set.clone()
    }

    pub fn added_keys(&self) -> Vec<K> {
        self.key_set.borrow().added().to_vec()
    }

    pub fn removed_items(&self) -> &[(K, V)] {
        &self.removed_items
    }

    /// Modified children this tick, chained with `(key, Remove)` for every
    /// key removed this tick — the source's `delta_value` for a TSD.
    pub fn delta_value(&self, now: Time) -> Vec<(K, DictDelta<V>)> {
        let mut out: Vec<(K, DictDelta<V>)> = self
            .children
            .iter()
            .filter(|(_, child)| child.borrow().modified(now))
            .map(|(k, child)| (k.clone(), DictDelta::Value(child.borrow().value().clone())))
            .collect();
        out.extend(
            self.removed_items
                .iter()
                .map(|(k, _)| (k.clone(), DictDelta::Remove)),
        );
        out
    }

    fn clear_deltas(&mut self) {
        self.removed_items.clear();
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

    fn add_key_observer(&mut self, observer: &Rc<RefCell<TsdInputState<K, V>>>) {
        self.key_observers.push(Rc::downgrade(observer));
    }

    fn remove_key_observer(&mut self, observer: &Rc<RefCell<TsdInputState<K, V>>>) {
        self.key_observers.retain(|weak| match weak.upgrade() {
            Some(o) => !Rc::ptr_eq(&o, observer),
            None => false,
        });
    }

    fn notify_key_added(&self, key: &K) {
        let Some(child) = self.children.get(key) else {
            return;
        };
        for weak in &self.key_observers {
            if let Some(observer) = weak.upgrade() {
                TsdInputState::on_key_added(&observer, key, child);
            }
        }
    }

    fn notify_key_removed(&self, key: &K) {
        for weak in &self.key_observers {
            if let Some(observer) = weak.upgrade() {
                TsdInputState::on_key_removed(&observer, key);
            }
        }
    }
}

impl<K: Hash + Eq + Clone + 'static, V: Clone + 'static> TimeSeries for TsdOutput<K, V> {
    fn valid(&self) -> bool {
        self.ever_written
    }

    fn last_modified_time(&self) -> Time {
        self.last_modified_time
    }
}

pub type DictOutputHandle<K, V> = Rc<RefCell<TsdOutput<K, V>>>;

pub fn new_dict_output<K: Hash + Eq + Clone + 'static, V: Clone + 'static>() -> DictOutputHandle<K, V> {
    Rc::new(RefCell::new(TsdOutput::default()))
}

fn schedule_clear<K: Hash + Eq + Clone + 'static, V: Clone + 'static>(
    handle: &DictOutputHandle<K, V>,
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

/// Set `key`'s value, creating the entry (and the corresponding key-set
/// member and key-observer notification) if it doesn't already exist.
pub fn tsd_set<K: Hash + Eq + Clone + 'static, V: Clone + 'static>(
    handle: &DictOutputHandle<K, V>,
    key: K,
    value: V,
    ctx: &mut EngineContext,
) {
    let is_new = !handle.borrow().children.contains_key(&key);
    let child = {
        let mut out = handle.borrow_mut();
        out.children
            .entry(key.clone())
            .or_insert_with(|| Rc::new(RefCell::new(ScalarOutput::default())))
            .clone()
    };
    child.borrow_mut().set(value, ctx);
    if is_new {
        tss_add(&handle.borrow().key_set(), key.clone(), ctx);
    }
    schedule_clear(handle, ctx);
    if is_new {
        handle.borrow().notify_key_added(&key);
    }
    let subs = handle.borrow().subscribers.clone();
    for sub in subs {
        ctx.mark_dirty(sub);
    }
}

/// Apply a mapping update: [`DictUpdate::Set`] behaves like [`tsd_set`],
/// [`DictUpdate::Remove`] like [`tsd_remove`], and [`DictUpdate::RemoveIfExists`]
/// is a no-op rather than a [`EngineError::KeyError`] when the key is absent —
/// the source's `value = {...}` apply path for a mapping containing
/// `REMOVE`/`REMOVE_IF_EXISTS` sentinels.
pub fn tsd_apply<K: Hash + Eq + Clone + 'static, V: Clone + 'static>(
    handle: &DictOutputHandle<K, V>,
    key: K,
    update: DictUpdate<V>,
    node: NodeId,
    ctx: &mut EngineContext,
) -> Result<()> {
    match update {
        DictUpdate::Set(value) => {
            tsd_set(handle, key, value, ctx);
            Ok(())
        }
        DictUpdate::Remove => tsd_remove(handle, &key, node, ctx),
        DictUpdate::RemoveIfExists => {
            if handle.borrow().contains_key(&key) {
                tsd_remove(handle, &key, node, ctx)
            } else {
                Ok(())
            }
        }
    }
}

/// Remove `key`. Fails with [`EngineError::KeyError`] if the key isn't
/// present, matching the source's behaviour for deleting an absent entry.
pub fn tsd_remove<K: Hash + Eq + Clone + 'static, V: Clone + 'static>(
    handle: &DictOutputHandle<K, V>,
    key: &K,
    node: NodeId,
    ctx: &mut EngineContext,
) -> Result<()> {
    let removed_child = handle.borrow_mut().children.shift_remove(key);
    let Some(child) = removed_child else {
        return Err(EngineError::KeyError(node));
    };
    let last_value = child.borrow().value().clone();
    {
        let mut out = handle.borrow_mut();
        out.removed_items.push((key.clone(), last_value));
    }
    tss_remove(&handle.borrow().key_set(), key, ctx);
    schedule_clear(handle, ctx);
    handle.borrow().notify_key_removed(key);
    let subs = handle.borrow().subscribers.clone();
    for sub in subs {
        ctx.mark_dirty(sub);
    }
    Ok(())
}

/// The key-tracking state shared between a `TsdInput` and the output(s) it
/// has registered itself with as a key observer. Split out from `TsdInput`
/// itself (rather than folding into it directly) because the observer
/// protocol needs a stable `Rc` to hand the output a `Weak` back-reference,
/// while the rest of this crate's inputs are plain owned structs.
struct TsdInputState<K: Hash + Eq + Clone + 'static, V: Clone + 'static> {
    bound: Option<DictOutputHandle<K, V>>,
    active: bool,
    owner: usize,
    children: IndexMap<K, ScalarInput<V>>,
    removed_items: Vec<(K, V)>,
}

impl<K: Hash + Eq + Clone + 'static, V: Clone + 'static> TsdInputState<K, V> {
    fn on_key_added(this: &Rc<RefCell<Self>>, key: &K, child: &OutputHandle<V>) {
        let mut state = this.borrow_mut();
        let owner = state.owner;
        let active = state.active;
        let mut input = ScalarInput::new(owner);
        input.bind(child.clone());
        if active {
            input.make_active();
        }
        state.children.insert(key.clone(), input);
    }

    fn on_key_removed(this: &Rc<RefCell<Self>>, key: &K) {
        let mut state = this.borrow_mut();
        if let Some(mut input) = state.children.shift_remove(key) {
            if input.valid() {
                let value = input.value();
                state.removed_items.push((key.clone(), value));
            }
            input.unbind();
        }
    }
}

/// The consuming half of a `TSD<K, V>`. Bound to a [`DictOutputHandle`];
/// materializes a [`ScalarInput`] per existing key at bind time and keeps
/// that set current via the key-observer protocol as keys come and go.
pub struct TsdInput<K: Hash + Eq + Clone + 'static, V: Clone + 'static> {
    state: Rc<RefCell<TsdInputState<K, V>>>,
}

impl<K: Hash + Eq + Clone + 'static, V: Clone + 'static> TsdInput<K, V> {
    pub fn new(owner: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(TsdInputState {
                bound: None,
                active: false,
                owner,
                children: IndexMap::new(),
                removed_items: Vec::new(),
            })),
        }
    }

    pub fn bind(&mut self, output: DictOutputHandle<K, V>) {
        self.unbind();
        let active = self.state.borrow().active;
        let owner = self.state.borrow().owner;
        let existing: Vec<(K, OutputHandle<V>)> = output
            .borrow()
            .keys()
            .map(|k| (k.clone(), output.borrow().child(k).unwrap()))
            .collect();
        {
            let mut state = self.state.borrow_mut();
            for (k, child) in existing {
                let mut input = ScalarInput::new(owner);
                input.bind(child);
                if active {
                    input.make_active();
                }
                state.children.insert(k, input);
            }
            state.bound = Some(output.clone());
        }
        output.borrow_mut().add_key_observer(&self.state);
        if active {
            output.borrow_mut().subscribe(owner);
        }
    }

    pub fn unbind(&mut self) {
        let bound = self.state.borrow_mut().bound.take();
        if let Some(out) = bound {
            out.borrow_mut().remove_key_observer(&self.state);
            let active = self.state.borrow().active;
            if active {
                let owner = self.state.borrow().owner;
                out.borrow_mut().unsubscribe(owner);
            }
            let mut state = self.state.borrow_mut();
            let children = std::mem::take(&mut state.children);
            for (k, mut input) in children {
                if input.valid() {
                    state.removed_items.push((k, input.value()));
                }
                input.unbind();
            }
        }
    }

    pub fn make_active(&mut self) {
        let mut state = self.state.borrow_mut();
        if !state.active {
            state.active = true;
            for input in state.children.values_mut() {
                input.make_active();
            }
            if let Some(out) = &state.bound {
                out.borrow_mut().subscribe(state.owner);
            }
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.state.borrow().children.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let state = self.state.borrow();
        let input = state.children.get(key)?;
        input.valid().then(|| input.value())
    }

    pub fn keys(&self) -> Vec<K> {
        self.state.borrow().children.keys().cloned().collect()
    }

    pub fn added_keys(&self) -> Vec<K> {
        self.state
            .borrow()
            .bound
            .as_ref()
            .map(|out| out.borrow().added_keys())
            .unwrap_or_default()
    }

    pub fn removed_items(&self) -> Vec<(K, V)> {
        self.state.borrow().removed_items.clone()
    }

    /// The valid children, by key.
    pub fn value(&self) -> IndexMap<K, V> {
        self.state
            .borrow()
            .children
            .iter()
            .filter(|(_, input)| input.valid())
            .map(|(k, input)| (k.clone(), input.value()))
            .collect()
    }

    /// Modified children this tick, chained with `(key, Remove)` for every
    /// key removed this tick.
    pub fn delta_value(&self, now: Time) -> Vec<(K, DictDelta<V>)> {
        let state = self.state.borrow();
        let mut out: Vec<(K, DictDelta<V>)> = state
            .children
            .iter()
            .filter(|(_, input)| input.modified(now))
            .map(|(k, input)| (k.clone(), DictDelta::Value(input.value())))
            .collect();
        out.extend(
            state
                .removed_items
                .iter()
                .map(|(k, _)| (k.clone(), DictDelta::Remove)),
        );
        out
    }
}

impl<K: Hash + Eq + Clone + 'static, V: Clone + 'static> TimeSeries for TsdInput<K, V> {
    fn valid(&self) -> bool {
        self.state
            .borrow()
            .bound
            .as_ref()
            .map(|o| o.borrow().valid())
            .unwrap_or(false)
    }

    fn last_modified_time(&self) -> Time {
        self.state
            .borrow()
            .bound
            .as_ref()
            .map(|o| o.borrow().last_modified_time())
            .unwrap_or(Time::MIN_DT)
    }
}
