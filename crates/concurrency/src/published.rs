//! Atomically published immutable values
//!
//! A [`Published`] cell holds an `Arc` to an immutable value tagged with a
//! generation number. Readers clone the `Arc` once and keep using that
//! snapshot; a writer builds a complete new value and swaps the pointer.
//! Nothing is ever mutated in place.

use parking_lot::RwLock;
use std::ops::Deref;
use std::sync::Arc;

/// One published value and its generation
#[derive(Debug)]
pub struct PublishedValue<T> {
    generation: u64,
    value: T,
}

impl<T> PublishedValue<T> {
    /// Generation this value was published at (starts at 0)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Borrow the value
    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T> Deref for PublishedValue<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Cell swapping whole immutable values
#[derive(Debug)]
pub struct Published<T> {
    current: RwLock<Arc<PublishedValue<T>>>,
}

impl<T> Published<T> {
    /// Create a cell at generation 0
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(PublishedValue {
                generation: 0,
                value,
            })),
        }
    }

    /// Take a reference to the current value
    pub fn load(&self) -> Arc<PublishedValue<T>> {
        Arc::clone(&self.current.read())
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    /// Replace the value and return the new generation
    pub fn publish(&self, value: T) -> u64 {
        let mut current = self.current.write();
        let generation = current.generation + 1;
        *current = Arc::new(PublishedValue { generation, value });
        generation
    }
}

impl<T: Default> Default for Published<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
