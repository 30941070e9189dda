//! Per-node future wakeups, with tag-based replace/cancel semantics (§4.2).

use crate::time::Time;
use priority_queue::PriorityQueue;
use std::cmp::Reverse;

/// An empty tag is used for untagged wakeups; distinct tags coexist, each with at
/// most one pending entry.
pub const UNTAGGED: &str = "";

/// A sorted set of `(time, tag)` entries, one per node. Scheduling the same tag
/// again replaces its previous entry rather than adding a second wakeup.
#[derive(Default)]
pub struct NodeScheduler {
    entries: PriorityQueue<String, Reverse<Time>>,
}

impl NodeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The earliest pending wakeup, or `None` if nothing is scheduled.
    pub fn next_time(&self) -> Option<Time> {
        self.entries.peek().map(|(_, Reverse(t))| *t)
    }

    pub fn is_scheduled_now(&self, current_time: Time) -> bool {
        self.next_time() == Some(current_time)
    }

    /// Schedule (or reschedule) `tag` for `when`. Returns `true` if this becomes
    /// the new head, i.e. the graph should be told to wake this node at `when`.
    /// No-op (and returns `false`) if `when` is not strictly after `current_time`,
    /// matching the source's "schedule must move forward" rule.
    pub fn schedule(&mut self, tag: impl Into<String>, when: Time, current_time: Time) -> bool {
        if when <= current_time {
            return false;
        }
        let was_head = self.next_time();
        self.entries.push(tag.into(), Reverse(when));
        self.next_time() != was_head && self.next_time() == Some(when)
    }

    /// Remove `tag`'s entry, or the head entry if `tag` is `None`.
    pub fn un_schedule(&mut self, tag: Option<&str>) -> Option<Time> {
        match tag {
            Some(tag) => self.entries.remove(tag).map(|(_, Reverse(t))| t),
            None => self.entries.pop().map(|(_, Reverse(t))| t),
        }
    }

    /// Pop every entry due at or before `current_time`. Returns the new head
    /// (if any) so the caller can reschedule the node at that time.
    pub fn advance(&mut self, current_time: Time) -> Option<Time> {
        while let Some((_, Reverse(t))) = self.entries.peek() {
            if *t <= current_time {
                self.entries.pop();
            } else {
                break;
            }
        }
        self.next_time()
    }
}
