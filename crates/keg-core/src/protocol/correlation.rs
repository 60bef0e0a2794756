//! Thread-safe correlation id counter for outbound commands.
//!
//! Every command the gateway writes to a device carries a 16-bit correlation
//! id.  The device echoes it in its response frame, which lets a reader match
//! acknowledgements to the commands that caused them.
//!
//! Ids start at 1 and wrap from 65535 back to 1.  Zero is never handed out:
//! devices treat it as "no correlation".
//!
//! # Thread safety
//!
//! The counter is an `AtomicU16` advanced with a compare-and-swap loop
//! (`fetch_update`), so many tasks can take ids concurrently without two of
//! them receiving the same value in the same cycle.

use std::sync::atomic::{AtomicU16, Ordering};

/// Monotonic, wrapping source of non-zero correlation ids.
///
/// Owned by whoever dispatches commands and injected where needed, so tests
/// can seed it with [`CorrelationCounter::starting_at`].
///
/// # Examples
///
/// ```rust
/// use keg_core::protocol::CorrelationCounter;
///
/// let counter = CorrelationCounter::new();
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.next(), 2);
/// ```
#[derive(Debug)]
pub struct CorrelationCounter {
    /// The id the next call to [`next`](Self::next) will return.
    inner: AtomicU16,
}

impl CorrelationCounter {
    /// Creates a counter whose first id is 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates a counter whose first id is `first`.  A seed of 0 is treated as 1.
    pub fn starting_at(first: u16) -> Self {
        Self {
            inner: AtomicU16::new(first.max(1)),
        }
    }

    /// Returns the next correlation id and advances the counter.
    ///
    /// `Relaxed` ordering is enough: ids only need to be unique, they do not
    /// publish any other memory.
    pub fn next(&self) -> u16 {
        // The closure never returns `None`, so `fetch_update` cannot fail;
        // both arms carry the previous value.
        match self
            .inner
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| Some(successor(id)))
        {
            Ok(id) | Err(id) => id,
        }
    }

    /// Returns the id the next call to [`next`](Self::next) would produce.
    pub fn peek(&self) -> u16 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for CorrelationCounter {
    fn default() -> Self {
        Self::new()
    }
}

fn successor(id: u16) -> u16 {
    if id == u16::MAX {
        1
    } else {
        id + 1
    }
}
