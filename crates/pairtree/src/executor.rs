//! Implements the rayon backend for building subtrees concurrently

use pairtree_internal::Executor;

/// Builds the 2 subtrees of any cell holding at least `min_parallel_len`
/// points with [`rayon::join`].
///
/// Smaller subtrees are built on the current thread: below some size, the
/// bookkeeping of handing work to the thread-pool costs more than building
/// the subtree. The resulting tree is identical either way.
#[derive(Clone, Copy, Debug)]
pub struct RayonExecutor {
    min_parallel_len: usize,
}

impl RayonExecutor {
    pub fn new(min_parallel_len: usize) -> Self {
        RayonExecutor {
            // a cell with 0 or 1 points is never split
            min_parallel_len: min_parallel_len.max(2),
        }
    }

    pub fn min_parallel_len(&self) -> usize {
        self.min_parallel_len
    }
}

impl Executor for RayonExecutor {
    fn should_fork(&self, n_points: usize) -> bool {
        n_points >= self.min_parallel_len
    }

    fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        rayon::join(a, b)
    }
}
