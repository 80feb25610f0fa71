//! Fixed-capacity ring with independent oldest/newest cursors.

use std::iter::FusedIterator;

/// A fixed-capacity circular sequence of pre-allocated slots.
///
/// Occupied slots run from the `oldest` cursor up to (but excluding) the
/// `next` cursor, wrapping around the end of the storage. When both cursors
/// coincide the ring is either empty or full; the `full` flag tells which.
///
/// Slots are never dropped or reallocated while the ring lives. Advancing
/// claims the slot after the newest one, retiring releases the oldest one,
/// and the caller is responsible for resetting slot contents.
#[derive(Debug)]
pub struct Ring<T> {
    slots: Box<[T]>,
    oldest: usize,
    next: usize,
    full: bool,
}

impl<T> Ring<T> {
    /// Create an empty ring backed by the given slots.
    ///
    /// # Panics
    ///
    /// Panics if `slots` is empty.
    pub fn new(slots: Vec<T>) -> Self {
        assert!(!slots.is_empty(), "ring requires at least one slot");
        Self {
            slots: slots.into_boxed_slice(),
            oldest: 0,
            next: 0,
            full: false,
        }
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of currently occupied slots.
    pub fn len(&self) -> usize {
        if self.full {
            self.capacity()
        } else {
            (self.next + self.capacity() - self.oldest) % self.capacity()
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.full && self.oldest == self.next
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Move the newest cursor forward by `n` slots.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `n` slots are free: the newest cursor would
    /// overwrite a slot that has not been retired yet.
    pub fn advance(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let free = self.capacity() - self.len();
        if n > free {
            panic!("ring newest cursor overran oldest: advancing {n} slots with {free} free");
        }
        self.next = (self.next + n) % self.capacity();
        if self.next == self.oldest {
            self.full = true;
        }
    }

    /// Move the oldest cursor forward by `n` slots, releasing them.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `n` slots are occupied.
    pub fn retire(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let occupied = self.len();
        if n > occupied {
            panic!("ring oldest cursor overran newest: retiring {n} slots with {occupied} occupied");
        }
        self.oldest = (self.oldest + n) % self.capacity();
        self.full = false;
    }

    /// The most recently claimed slot, or `None` if the ring is empty.
    pub fn newest(&self) -> Option<&T> {
        let index = self.newest_index()?;
        Some(&self.slots[index])
    }

    pub fn newest_mut(&mut self) -> Option<&mut T> {
        let index = self.newest_index()?;
        Some(&mut self.slots[index])
    }

    /// The next slot to be retired, or `None` if the ring is empty.
    pub fn oldest(&self) -> Option<&T> {
        if self.is_empty() {
            None
        } else {
            Some(&self.slots[self.oldest])
        }
    }

    pub fn oldest_mut(&mut self) -> Option<&mut T> {
        if self.is_empty() {
            None
        } else {
            Some(&mut self.slots[self.oldest])
        }
    }

    /// Visit the occupied slots from oldest to newest.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            slots: &self.slots,
            pos: self.oldest,
            remaining: self.len(),
        }
    }

    fn newest_index(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some((self.next + self.capacity() - 1) % self.capacity())
        }
    }
}

impl<'a, T> IntoIterator for &'a Ring<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Chronological traversal over the occupied slots of a [`Ring`].
#[derive(Debug)]
pub struct Iter<'a, T> {
    slots: &'a [T],
    pos: usize,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = &self.slots[self.pos];
        self.pos = (self.pos + 1) % self.slots.len();
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}
