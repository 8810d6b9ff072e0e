use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out the block index of every allocation.
///
/// Each call to [`BlockIndexGenerator::next`] returns a value no other caller has
/// seen, no matter how many threads share the generator. Values start at zero and
/// never go down for an observing thread, but nothing ties them to wall-clock order
/// across threads.
#[derive(Debug, Default)]
pub struct BlockIndexGenerator {
    counter: AtomicU64,
}

impl BlockIndexGenerator {
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Returns a fresh index and advances the counter by one.
    #[inline]
    pub fn next(&self) -> u64 {
        // Only uniqueness matters, no other memory is published through the counter.
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of indices handed out so far.
    #[inline]
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}
