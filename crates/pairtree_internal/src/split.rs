//! Strategies for partitioning the points of a cell into 2 children
//!
//! Every strategy first picks the axis with the largest spread (`max - min`)
//! and then decides where along that axis to divide the points. The
//! partition is performed in-place on a slice of points; the return value is
//! the index of the first point in the right-hand group.
//!
//! Where a strategy selects an order statistic, ties are broken by the
//! point's input index so that the outcome never depends on how the
//! points happen to be stored on entry.

use crate::data::{DataClass, Point};
use crate::metric::{Coords, Metric};
use core::cmp::Ordering;
use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rand_xoshiro::rand_core::SeedableRng;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SplitMethod {
    /// split at the midpoint of the bounding range of the axis
    Middle,
    /// split at the positional median along the axis
    Median,
    /// split at the centroid along the axis
    #[default]
    Mean,
    /// split at a rank drawn uniformly at random
    Random,
}

impl SplitMethod {
    /// all known methods, ordered by their integer selector
    pub const ALL: [SplitMethod; 4] = [
        SplitMethod::Middle,
        SplitMethod::Median,
        SplitMethod::Mean,
        SplitMethod::Random,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SplitMethod::Middle => "middle",
            SplitMethod::Median => "median",
            SplitMethod::Mean => "mean",
            SplitMethod::Random => "random",
        }
    }

    /// look up a method from the integer selector used across the
    /// handle-based entry points (0 = middle, 1 = median, 2 = mean,
    /// 3 = random)
    pub fn from_selector(selector: i32) -> Option<SplitMethod> {
        usize::try_from(selector)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// look up a method by (case-insensitive) name. "midpoint" is accepted
    /// as an alias for "middle"
    pub fn from_name(name: &str) -> Option<SplitMethod> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("midpoint") {
            return Some(SplitMethod::Middle);
        }
        Self::ALL
            .iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
            .copied()
    }
}

/// Parameters for a single split
pub(crate) struct SplitContext<'a, P: Coords> {
    pub(crate) method: SplitMethod,
    pub(crate) centroid: &'a P,
    pub(crate) seed: u64,
    /// offset of the slice of points within the full point storage
    pub(crate) offset: usize,
}

/// returns the axis with the largest spread and that spread
fn widest_axis<D: DataClass, M: Metric>(points: &[Point<D, M>]) -> (usize, f64, f64, f64) {
    let mut best = (0, 0.0, 0.0, f64::NEG_INFINITY);
    for axis in 0..M::Position::N_AXES {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for p in points {
            let v = p.pos().axis(axis);
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if hi - lo > best.3 {
            best = (axis, lo, hi, hi - lo);
        }
    }
    let (axis, lo, hi, _) = best;
    (axis, lo, hi, hi - lo)
}

#[inline(always)]
fn cmp_along<D: DataClass, M: Metric>(axis: usize, a: &Point<D, M>, b: &Point<D, M>) -> Ordering {
    a.pos()
        .axis(axis)
        .total_cmp(&b.pos().axis(axis))
        .then(a.index().cmp(&b.index()))
}

/// order-statistic selection: afterwards the `k` smallest points (along
/// `axis`) occupy `points[..k]`
fn select_rank<D: DataClass, M: Metric>(points: &mut [Point<D, M>], axis: usize, k: usize) -> usize {
    points.select_nth_unstable_by(k, |a, b| cmp_along(axis, a, b));
    k
}

/// stable partition: points with a coordinate `<= value` go left, otherwise
/// the relative order of points is preserved
fn partition_at<D: DataClass, M: Metric>(points: &mut [Point<D, M>], axis: usize, value: f64) -> usize {
    let (left, right): (Vec<Point<D, M>>, Vec<Point<D, M>>) =
        points.iter().partition(|p| p.pos().axis(axis) <= value);
    let mid = left.len();
    points[..mid].copy_from_slice(&left);
    points[mid..].copy_from_slice(&right);
    mid
}

/// mixes the seed with the location of a subtree so that each subtree draws
/// from an independent stream, regardless of the order subtrees get built in
fn subtree_seed(seed: u64, offset: usize, len: usize) -> u64 {
    // splitmix64 finalizer
    let mut z = seed
        ^ (offset as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (len as u64).rotate_left(32);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Partition `points` (which must hold at least 2 elements) in-place and
/// return the index of the first point in the right-hand group.
///
/// The returned index always lies in `1..points.len()`.
pub(crate) fn split_points<D: DataClass, M: Metric>(
    points: &mut [Point<D, M>],
    ctx: &SplitContext<'_, M::Position>,
) -> usize {
    let n = points.len();
    debug_assert!(n >= 2);

    let (axis, lo, hi, spread) = widest_axis(points);
    if spread <= 0.0 || !spread.is_finite() {
        // every point is coincident; any split is as good as another
        return n / 2;
    }

    let mid = match ctx.method {
        SplitMethod::Median => select_rank(points, axis, n / 2),
        SplitMethod::Mean => partition_at(points, axis, ctx.centroid.axis(axis)),
        SplitMethod::Middle => partition_at(points, axis, 0.5 * (lo + hi)),
        SplitMethod::Random => {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(subtree_seed(ctx.seed, ctx.offset, n));
            let k = rng.random_range(1..n);
            select_rank(points, axis, k)
        }
    };

    if mid == 0 || mid == n {
        // the split value fell outside of the points (this can happen for a
        // renormalized spherical centroid or from roundoff)
        select_rank(points, axis, n / 2)
    } else {
        mid
    }
}
