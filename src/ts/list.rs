//! TSL<T>: a fixed-length ordered list of identically-typed children.

use super::scalar::{OutputHandle, ScalarInput, ScalarOutput};
use super::TimeSeries;
use crate::context::EngineContext;
use crate::time::Time;

/// An ordered, fixed-length vector of scalar outputs, indexed 0..len.
pub struct TslOutput<T: Clone + 'static> {
    children: Vec<ScalarOutput<T>>,
}

impl<T: Clone + 'static> TslOutput<T> {
    pub fn new(len: usize) -> Self {
        Self {
            children: (0..len).map(|_| ScalarOutput::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn at(&self, index: usize) -> &ScalarOutput<T> {
        &self.children[index]
    }

    pub fn set(&mut self, index: usize, value: T, ctx: &mut EngineContext) {
        self.children[index].set(value, ctx);
    }

    /// Indices modified at `now`, in order.
    pub fn modified_indices(&self, now: Time) -> Vec<usize> {
        self.children
            .iter()
            .enumerate()
            .filter(|(_, c)| c.modified(now))
            .map(|(i, _)| i)
            .collect()
    }
}

impl<T: Clone + 'static> TimeSeries for TslOutput<T> {
    fn valid(&self) -> bool {
        !self.children.is_empty() && self.children.iter().all(|c| c.valid())
    }

    fn last_modified_time(&self) -> Time {
        self.children
            .iter()
            .map(|c| c.last_modified_time())
            .max()
            .unwrap_or(Time::MIN_DT)
    }
}

/// An ordered, fixed-length vector of scalar inputs.
pub struct TslInput<T: Clone + 'static> {
    children: Vec<ScalarInput<T>>,
}

impl<T: Clone + 'static> TslInput<T> {
    pub fn new(owner: usize, len: usize) -> Self {
        Self {
            children: (0..len).map(|_| ScalarInput::new(owner)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn at(&self, index: usize) -> &ScalarInput<T> {
        &self.children[index]
    }

    pub fn bind(&mut self, index: usize, output: OutputHandle<T>) {
        self.children[index].bind(output);
    }

    pub fn unbind(&mut self, index: usize) {
        self.children[index].unbind();
    }

    pub fn make_active(&mut self) {
        for c in &mut self.children {
            c.make_active();
        }
    }

    pub fn values(&self) -> Vec<T> {
        self.children.iter().map(|c| c.value()).collect()
    }

    pub fn modified_indices(&self, now: Time) -> Vec<usize> {
        self.children
            .iter()
            .enumerate()
            .filter(|(_, c)| c.modified(now))
            .map(|(i, _)| i)
            .collect()
    }
}

impl<T: Clone + 'static> TimeSeries for TslInput<T> {
    fn valid(&self) -> bool {
        !self.children.is_empty() && self.children.iter().all(|c| c.valid())
    }

    fn last_modified_time(&self) -> Time {
        self.children
            .iter()
            .map(|c| c.last_modified_time())
            .max()
            .unwrap_or(Time::MIN_DT)
    }
}
