use crate::constants::queue::{DEFAULT_MIN_CAPACITY, INITIAL_CAPACITY};
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use log::debug;

/// Growable ring buffer backing the UART receive path
///
/// Capacity is always a power of two so every wraparound is a mask. The
/// buffer doubles when full and only shrinks to a quarter once occupancy
/// drops to an eighth, never going below `min_capacity`.
///
/// Slots freed by a pop are overwritten with `T::default()`, so a removed
/// element is never reachable through the storage again.
#[derive(Clone)]
pub struct CircularQueue<T> {
    storage: Vec<T>,     // Slot array, len() is the capacity
    begin: usize,        // Oldest element
    end: usize,          // Next free slot
    length: usize,       // Live elements
    min_capacity: usize, // Shrink floor
    empty_value: T,      // Written into vacated slots
}

impl<T: Copy + Default> CircularQueue<T> {
    pub fn new() -> Self {
        Self::with_min_capacity(DEFAULT_MIN_CAPACITY)
    }

    /// Creates an empty queue that never shrinks below `min_capacity` slots
    pub fn with_min_capacity(min_capacity: usize) -> Self {
        let empty_value = T::default();
        Self {
            storage: vec![empty_value; INITIAL_CAPACITY],
            begin: 0,
            end: 0,
            length: 0,
            min_capacity,
            empty_value,
        }
    }

    /// Drops every element and returns to the initial buffer
    pub fn reset(&mut self) {
        self.storage = vec![self.empty_value; INITIAL_CAPACITY];
        self.begin = 0;
        self.end = 0;
        self.length = 0;
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn min_capacity(&self) -> usize {
        self.min_capacity
    }

    #[inline]
    fn mask(&self) -> usize {
        self.storage.len() - 1
    }

    /// Element at logical position `index`, counted from the oldest.
    ///
    /// The caller guarantees `index < len()`; only debug builds check it.
    #[inline]
    pub fn get(&self, index: usize) -> T {
        debug_assert!(index < self.length, "index {} out of {}", index, self.length);
        self.storage[(self.begin + index) & self.mask()]
    }

    pub fn front(&self) -> Option<T> {
        if self.length == 0 {
            None
        } else {
            Some(self.get(0))
        }
    }

    pub fn back(&self) -> Option<T> {
        if self.length == 0 {
            None
        } else {
            Some(self.get(self.length - 1))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.length).map(move |i| self.get(i))
    }

    /// Appends at the tail, returns the new length
    pub fn push_back(&mut self, value: T) -> usize {
        self.grow_if_full();
        self.storage[self.end] = value;
        self.end = (self.end + 1) & self.mask();
        self.length += 1;
        self.length
    }

    /// Prepends at the head, returns the new length
    pub fn push_front(&mut self, value: T) -> usize {
        self.grow_if_full();
        self.begin = (self.begin + self.mask()) & self.mask();
        self.storage[self.begin] = value;
        self.length += 1;
        self.length
    }

    pub fn pop_back(&mut self) -> Option<T> {
        if self.length == 0 {
            return None;
        }
        self.shrink_if_sparse();
        self.length -= 1;
        self.end = (self.end + self.mask()) & self.mask();
        Some(core::mem::replace(
            &mut self.storage[self.end],
            self.empty_value,
        ))
    }

    pub fn pop_front(&mut self) -> Option<T> {
        if self.length == 0 {
            return None;
        }
        self.shrink_if_sparse();
        self.length -= 1;
        let value = core::mem::replace(&mut self.storage[self.begin], self.empty_value);
        self.begin = (self.begin + 1) & self.mask();
        Some(value)
    }

    fn grow_if_full(&mut self) {
        if self.length == self.capacity() {
            self.resize(self.capacity() * 2);
        }
    }

    fn shrink_if_sparse(&mut self) {
        let candidate = self.capacity() / 4;
        if self.length <= candidate / 2 && candidate >= self.min_capacity {
            self.resize(candidate);
        }
    }

    /// Moves the live elements into a fresh buffer starting at slot 0
    fn resize(&mut self, new_capacity: usize) {
        debug!(
            "Resizing queue from {} to {} slots ({} live)",
            self.capacity(),
            new_capacity,
            self.length
        );
        let mut storage = vec![self.empty_value; new_capacity];

        // Non-wrapped run first, then whatever wrapped around to slot 0
        let head = core::cmp::min(self.length, self.capacity() - self.begin);
        storage[..head].copy_from_slice(&self.storage[self.begin..self.begin + head]);
        storage[head..self.length].copy_from_slice(&self.storage[..self.length - head]);

        self.storage = storage;
        self.begin = 0;
        self.end = self.length & (new_capacity - 1);
    }
}

impl<T: fmt::Display + Copy + Default> CircularQueue<T> {
    /// Renders the elements oldest first
    pub fn to_joined_string(&self, separator: &str) -> String {
        use core::fmt::Write;

        let mut out = String::new();
        for (i, value) in self.iter().enumerate() {
            if i > 0 {
                out.push_str(separator);
            }
            // Writing into a String cannot fail
            let _ = write!(out, "{}", value);
        }
        out
    }
}

impl<T: Copy + Default> Default for CircularQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Display + Copy + Default> fmt::Display for CircularQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_joined_string(","))
    }
}

impl<T: fmt::Debug + Copy + Default> fmt::Debug for CircularQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
