//! Fork/join abstraction used while building trees
//!
//! Once a cell's points are partitioned, the 2 halves are disjoint and their
//! subtrees can be built independently. The [`Executor`] decides whether the
//! 2 builds actually run concurrently. Whatever it decides, the resulting
//! tree is the same: no decision made during construction depends on the
//! order in which subtrees are built.
//!
//! The backend that uses threads lives in the public crate (this crate
//! doesn't depend on a threading library).

pub trait Executor: Sync {
    /// whether the subtrees of a cell holding `n_points` points should be
    /// built via [`Executor::join`]
    fn should_fork(&self, n_points: usize) -> bool;

    /// execute `a` and `b`, potentially in parallel, and return both results
    fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send;
}

/// Builds everything on the calling thread
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialExecutor;

impl Executor for SerialExecutor {
    fn should_fork(&self, _n_points: usize) -> bool {
        false
    }

    fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        (a(), b())
    }
}
