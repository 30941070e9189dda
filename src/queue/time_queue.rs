use super::value_at::ValueAt;
use crate::time::Time;
use derive_new::new;
use priority_queue::PriorityQueue;
use std::cmp::{Eq, Reverse};
use std::hash::Hash;

/// Queue of `T` ordered by due time, used to track pending node wakeups at
/// the graph level.
#[derive(new, Default)]
pub(crate) struct TimeQueue<T: Hash + Eq> {
    #[new(default)]
    queue: PriorityQueue<ValueAt<T>, Reverse<Time>>,
}

impl<T: Hash + Eq + Clone> TimeQueue<T> {
    pub fn next_time(&self) -> Option<Time> {
        self.queue.peek().map(|(_, Reverse(t))| *t)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn push(&mut self, value: T, time: Time) {
        self.queue.push(ValueAt::new(value, time), Reverse(time));
    }

    /// Pop and return every entry due at or before `current_time`.
    pub fn drain_due(&mut self, current_time: Time) -> Vec<T> {
        let mut due = Vec::new();
        while let Some((_, Reverse(t))) = self.queue.peek() {
            if *t <= current_time {
                due.push(self.queue.pop().unwrap().0.value);
            } else {
                break;
            }
        }
        due
    }

    /// Remove a previously pushed `(value, time)` pair, if present.
    pub fn remove(&mut self, value: &T, time: Time) {
        self.queue.remove(&ValueAt::new(value.clone(), time));
    }
}
