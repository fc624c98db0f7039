//! Pipeline identifier allocation

use std::sync::{Mutex, PoisonError};

/// Hands out pipeline identifiers: 0, 1, 2, ...
///
/// Guarded by its own lock, independent of the registry lock.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: Mutex<u64>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an identifier no previous call has returned
    pub fn allocate(&self) -> u64 {
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        let id = *next;
        *next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_sequential_allocation_starts_at_zero() {
        let ids = IdAllocator::new();
        assert_eq!(ids.allocate(), 0);
        assert_eq!(ids.allocate(), 1);
        assert_eq!(ids.allocate(), 2);
    }

    #[test]
    fn test_concurrent_allocation_is_contiguous() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 250;

        let ids = IdAllocator::new();
        // Advance the allocator so the run does not start at zero
        for _ in 0..5 {
            ids.allocate();
        }

        let allocated: Vec<u64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| scope.spawn(|| (0..PER_THREAD).map(|_| ids.allocate()).collect::<Vec<_>>()))
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect()
        });

        let distinct: BTreeSet<u64> = allocated.iter().copied().collect();
        assert_eq!(distinct.len(), THREADS * PER_THREAD);
        let expected: BTreeSet<u64> = (5..5 + (THREADS * PER_THREAD) as u64).collect();
        assert_eq!(distinct, expected);
    }
}
