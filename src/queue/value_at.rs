use crate::time::Time;
use derive_new::new;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};

/// A value paired with the time it's due. Wrapping `T` this way (rather than
/// keying the queue on `T` directly) stops `PriorityQueue` from silently
/// dropping a push of a value already present at a different time.
#[derive(Debug, Clone, new, Default)]
pub(crate) struct ValueAt<T> {
    pub value: T,
    pub time: Time,
}

impl<T: Hash> Hash for ValueAt<T> {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.value.hash(state);
        self.time.hash(state);
    }
}

impl<T: PartialEq> PartialEq for ValueAt<T> {
    fn eq(&self, other: &Self) -> bool {
        T::eq(&self.value, &other.value) && Time::eq(&self.time, &other.time)
    }
}

impl<T: PartialEq> Eq for ValueAt<T> {}
