//! Cells: the nodes of a binary space-partitioning tree
//!
//! # Construction
//! A tree is built top-down over a mutable slice of points:
//! 1. aggregate the points of the slice (weighted centroid, total weight,
//!    weighted sum of the observable) and measure the enclosing size
//! 2. if the slice is small enough (or holds few enough points) the cell
//!    becomes a leaf
//! 3. otherwise the slice is partitioned in-place (see [`crate::split`]),
//!    each half is built recursively, and the cell takes ownership of both
//!    children
//!
//! Because partitioning happens in-place, the points owned by any cell
//! always form a contiguous range of the point storage. A cell only records
//! that range; the storage itself belongs to whoever drives the build.
//!
//! # Size
//! The enclosing size of a cell is the exact maximum distance between the
//! cell's centroid and any point it owns. Consequently, every owned point
//! lies within `size` of `pos` (with equality for the farthest point).
//!
//! # Aggregation order
//! Every cell computes its aggregate directly from the points it owns (in
//! storage order) with compensated summation. A parent's totals therefore
//! equal the sum of its children's totals to within a few ulps, regardless
//! of how the points were partitioned. The root sees the points in input
//! order, so its total weight is reproduced bit-for-bit by every split
//! method.

use crate::data::{DataClass, Point};
use crate::executor::Executor;
use crate::metric::{Coords, Metric};
use crate::split::{SplitContext, SplitMethod, split_points};
use crate::sum::NeumaierSum;
use core::ops::Range;

/// The largest number of axes used by any [`Metric`]'s position type
const MAX_AXES: usize = 3;

/// Summary statistics of a set of points
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aggregate<D: DataClass, M: Metric> {
    pos: M::Position,
    w: f64,
    wsum: D::Value,
}

impl<D: DataClass, M: Metric> Aggregate<D, M> {
    /// Aggregate a non-empty slice of points
    pub fn from_points(points: &[Point<D, M>]) -> Self {
        debug_assert!(!points.is_empty());
        debug_assert!(M::Position::N_AXES <= MAX_AXES);

        let mut w = NeumaierSum::new();
        let mut wpos = [NeumaierSum::new(); MAX_AXES];
        // only used when the total weight is 0
        let mut pos = [NeumaierSum::new(); MAX_AXES];
        let mut accum = D::Accum::default();

        for p in points {
            let weight = p.w();
            w.add(weight);
            for axis in 0..M::Position::N_AXES {
                let coord = p.pos().axis(axis);
                wpos[axis].add(weight * coord);
                pos[axis].add(coord);
            }
            D::consume(&mut accum, p.value(), weight);
        }

        let w = w.value();
        let mean = if w > 0.0 {
            M::Position::from_fn(|axis| wpos[axis].value() / w)
        } else {
            let n = points.len() as f64;
            M::Position::from_fn(|axis| pos[axis].value() / n)
        };

        Aggregate {
            pos: M::finish_centroid(mean, points[0].pos()),
            w,
            wsum: D::finish(&accum),
        }
    }

    pub fn pos(&self) -> &M::Position {
        &self.pos
    }

    pub fn w(&self) -> f64 {
        self.w
    }

    pub fn wsum(&self) -> &D::Value {
        &self.wsum
    }
}

/// the squared distance from `center` to the farthest of `points`
///
/// A NaN distance (from a non-finite centroid) is propagated rather than
/// discarded.
fn size_sq_about<D: DataClass, M: Metric>(center: &M::Position, points: &[Point<D, M>]) -> f64 {
    points
        .iter()
        .map(|p| M::distance_sq(center, p.pos()))
        .fold(0.0, |acc, d| if acc.is_nan() || d <= acc { acc } else { d })
}

/// Relative margin applied to the whole-cell tests of the near queries.
///
/// A cell is only accepted (or pruned) as a whole when every point it owns
/// is within (or beyond) the separation by more than this margin, so those
/// tests never disagree with the per-point test.
const NEAR_MARGIN: f64 = 1e-12;

/// Parameters that control tree construction
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BuildParams {
    /// cells no larger than this (squared) size are never split
    pub min_size_sq: f64,
    /// when set, top-level cells larger than this (squared) size are split
    /// into separate trees
    pub max_top_size_sq: Option<f64>,
    /// cells holding no more than this many points are never split
    pub leaf_size: usize,
    pub split_method: SplitMethod,
    /// seeds [`SplitMethod::Random`]
    pub seed: u64,
}

/// A node of the tree
#[derive(Clone, Debug)]
pub struct Cell<D: DataClass, M: Metric> {
    data: Aggregate<D, M>,
    size_sq: f64,
    size: f64,
    start: usize,
    n: usize,
    level: usize,
    children: Option<Box<[Cell<D, M>; 2]>>,
}

fn check_weight_conservation(w: f64, w_left: f64, w_right: f64) -> Result<(), &'static str> {
    let tol = 1e-9 * w.abs().max(1.0);
    if (w - (w_left + w_right)).abs() <= tol {
        Ok(())
    } else {
        Err("a cell's weight doesn't match the sum of its children's weights")
    }
}

impl<D: DataClass, M: Metric> Cell<D, M> {
    /// Build the tree over `points`.
    ///
    /// `points` gets reordered in-place. `offset` is the index of
    /// `points[0]` within the full point storage (the ranges reported by
    /// [`Cell::range`] are relative to that storage).
    pub fn build<E: Executor>(
        points: &mut [Point<D, M>],
        offset: usize,
        params: &BuildParams,
        exec: &E,
    ) -> Result<Self, &'static str> {
        Self::build_at(points, offset, 0, params, exec)
    }

    fn build_at<E: Executor>(
        points: &mut [Point<D, M>],
        offset: usize,
        level: usize,
        params: &BuildParams,
        exec: &E,
    ) -> Result<Self, &'static str> {
        if points.is_empty() {
            return Err("can't build a cell from 0 points");
        }
        let data = Aggregate::from_points(points);
        let size_sq = size_sq_about(data.pos(), points);
        Self::build_from(points, offset, level, data, size_sq, params, exec)
    }

    fn build_from<E: Executor>(
        points: &mut [Point<D, M>],
        offset: usize,
        level: usize,
        data: Aggregate<D, M>,
        size_sq: f64,
        params: &BuildParams,
        exec: &E,
    ) -> Result<Self, &'static str> {
        if size_sq.is_nan() {
            return Err("a cell's centroid isn't finite (the weighted sums overflowed)");
        }
        let n = points.len();
        let mut cell = Cell {
            data,
            size_sq,
            size: size_sq.sqrt(),
            start: offset,
            n,
            level,
            children: None,
        };
        if n <= params.leaf_size || size_sq <= params.min_size_sq {
            return Ok(cell);
        }

        let ctx = SplitContext {
            method: params.split_method,
            centroid: cell.data.pos(),
            seed: params.seed,
            offset,
        };
        let mid = split_points(points, &ctx);
        if mid == 0 || mid >= n {
            return Err("a split produced an empty child");
        }

        let (left_points, right_points) = points.split_at_mut(mid);
        let mut build_left = || Self::build_at(left_points, offset, level + 1, params, exec);
        let mut build_right =
            || Self::build_at(right_points, offset + mid, level + 1, params, exec);
        let (left, right) = if exec.should_fork(n) {
            exec.join(build_left, build_right)
        } else {
            (build_left(), build_right())
        };
        let (left, right) = (left?, right?);

        check_weight_conservation(cell.w(), left.w(), right.w())?;
        cell.children = Some(Box::new([left, right]));
        Ok(cell)
    }

    /// the weighted centroid
    pub fn pos(&self) -> &M::Position {
        self.data.pos()
    }

    /// the total weight
    pub fn w(&self) -> f64 {
        self.data.w()
    }

    /// the weighted sum of the observable, `Σ wᵢ vᵢ`
    pub fn wsum(&self) -> &D::Value {
        self.data.wsum()
    }

    /// the weighted mean of the observable (`None` when the total weight is
    /// 0)
    pub fn mean_value(&self) -> Option<D::Value> {
        if self.w() > 0.0 {
            Some(D::scale(self.wsum(), 1.0 / self.w()))
        } else {
            None
        }
    }

    /// every owned point lies within this distance of [`Cell::pos`]
    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn size_sq(&self) -> f64 {
        self.size_sq
    }

    /// the number of points owned by this cell
    pub fn n(&self) -> usize {
        self.n
    }

    /// the range of the point storage holding the points owned by this cell
    pub fn range(&self) -> Range<usize> {
        self.start..(self.start + self.n)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn children(&self) -> Option<&[Cell<D, M>; 2]> {
        self.children.as_deref()
    }

    pub fn left(&self) -> Option<&Cell<D, M>> {
        self.children().map(|c| &c[0])
    }

    pub fn right(&self) -> Option<&Cell<D, M>> {
        self.children().map(|c| &c[1])
    }

    /// The number of ancestors of this cell.
    ///
    /// When the top level is split into a forest, the splits that separated
    /// the top-level cells are counted too. The level is always measured
    /// from the root of the single tree that would have been built without
    /// the top-level cap.
    pub fn level(&self) -> usize {
        self.level
    }

    /// the number of edges on the longest path from this cell to a leaf
    pub fn depth(&self) -> usize {
        match self.children() {
            None => 0,
            Some([left, right]) => 1 + left.depth().max(right.depth()),
        }
    }

    /// pre-order iteration over this cell and all of its descendants
    pub fn iter(&self) -> CellIter<'_, D, M> {
        CellIter { stack: vec![self] }
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Cell<D, M>> {
        self.iter().filter(|c| c.is_leaf())
    }

    /// Count the points within distance `sep` of `pos`.
    ///
    /// `points` must be the storage the tree was built over.
    pub fn count_near(&self, points: &[Point<D, M>], pos: &M::Position, sep: f64) -> usize {
        let mut count = 0;
        self.visit_near(points, pos, sep, &mut |hit| match hit {
            NearHit::Range(range) => count += range.len(),
            NearHit::Point(_) => count += 1,
        });
        count
    }

    /// Push the input index of every point within distance `sep` of `pos`
    /// onto `out`.
    pub fn get_near(
        &self,
        points: &[Point<D, M>],
        pos: &M::Position,
        sep: f64,
        out: &mut Vec<usize>,
    ) {
        self.visit_near(points, pos, sep, &mut |hit| match hit {
            NearHit::Range(range) => out.extend(points[range].iter().map(|p| p.index())),
            NearHit::Point(p) => out.push(p.index()),
        });
    }

    /// Walk the tree, pruning any cell that lies entirely beyond `sep` and
    /// reporting any cell that lies entirely within `sep` as a whole.
    fn visit_near<'p>(
        &self,
        points: &'p [Point<D, M>],
        pos: &M::Position,
        sep: f64,
        on_hit: &mut impl FnMut(NearHit<'p, D, M>),
    ) {
        if !(sep >= 0.0) {
            return;
        }
        let sep_sq = sep * sep;
        let d_sq = M::distance_sq(self.pos(), pos);
        let d = d_sq.sqrt();
        let (inner, outer) = (d - self.size, d + self.size);
        if inner > 0.0 && inner * inner > sep_sq * (1.0 + NEAR_MARGIN) {
            return;
        }
        if outer * outer <= sep_sq * (1.0 - NEAR_MARGIN) {
            on_hit(NearHit::Range(self.range()));
            return;
        }
        match self.children() {
            Some([left, right]) => {
                left.visit_near(points, pos, sep, on_hit);
                right.visit_near(points, pos, sep, on_hit);
            }
            None => {
                for p in &points[self.range()] {
                    if M::distance_sq(p.pos(), pos) <= sep_sq {
                        on_hit(NearHit::Point(p));
                    }
                }
            }
        }
    }
}

enum NearHit<'p, D: DataClass, M: Metric> {
    /// a range of storage that lies entirely within the separation
    Range(Range<usize>),
    /// a single point that was checked directly
    Point(&'p Point<D, M>),
}

/// See [`Cell::iter`]
pub struct CellIter<'a, D: DataClass, M: Metric> {
    stack: Vec<&'a Cell<D, M>>,
}

impl<'a, D: DataClass, M: Metric> Iterator for CellIter<'a, D, M> {
    type Item = &'a Cell<D, M>;

    fn next(&mut self) -> Option<Self::Item> {
        let cell = self.stack.pop()?;
        if let Some([left, right]) = cell.children() {
            self.stack.push(right);
            self.stack.push(left);
        }
        Some(cell)
    }
}

/// Build one or more trees over `points`.
///
/// When `params.max_top_size_sq` is `None`, this produces a single tree.
/// Otherwise, candidate roots larger than that size are split, and each half
/// becomes a candidate root. The trees are returned in storage order.
pub fn build_forest<D: DataClass, M: Metric, E: Executor>(
    points: &mut [Point<D, M>],
    params: &BuildParams,
    exec: &E,
) -> Result<Vec<Cell<D, M>>, &'static str> {
    if points.is_empty() {
        return Err("can't build a cell from 0 points");
    }
    let mut out = Vec::new();
    setup_top_level(points, 0, 0, params, exec, &mut out)?;
    Ok(out)
}

fn setup_top_level<D: DataClass, M: Metric, E: Executor>(
    points: &mut [Point<D, M>],
    offset: usize,
    level: usize,
    params: &BuildParams,
    exec: &E,
    out: &mut Vec<Cell<D, M>>,
) -> Result<(), &'static str> {
    let data = Aggregate::from_points(points);
    let size_sq = size_sq_about(data.pos(), points);
    match params.max_top_size_sq {
        Some(max_sq) if size_sq > max_sq && points.len() > params.leaf_size => {
            let ctx = SplitContext {
                method: params.split_method,
                centroid: data.pos(),
                seed: params.seed,
                offset,
            };
            let mid = split_points(points, &ctx);
            if mid == 0 || mid >= points.len() {
                return Err("a split produced an empty child");
            }
            let (left, right) = points.split_at_mut(mid);
            setup_top_level(left, offset, level + 1, params, exec, out)?;
            setup_top_level(right, offset + mid, level + 1, params, exec, out)
        }
        _ => {
            out.push(Cell::build_from(points, offset, level, data, size_sq, params, exec)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Count, Scalar};
    use crate::executor::SerialExecutor;
    use crate::metric::{Flat, Position};

    fn params(min_size_sq: f64) -> BuildParams {
        BuildParams {
            min_size_sq,
            max_top_size_sq: None,
            leaf_size: 1,
            split_method: SplitMethod::Median,
            seed: 0,
        }
    }

    fn unit_square() -> Vec<Point<Count, Flat>> {
        [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]
            .iter()
            .enumerate()
            .map(|(i, c)| Point::new(Position(*c), (), 1.0, i))
            .collect()
    }

    #[test]
    fn single_point_is_a_leaf() {
        let mut points = vec![Point::<Scalar, Flat>::new(Position([1.0, 2.0]), 3.0, 2.0, 0)];
        let cell = Cell::build(&mut points, 0, &params(0.0), &SerialExecutor).unwrap();
        assert!(cell.is_leaf());
        assert_eq!(cell.size(), 0.0);
        assert_eq!(cell.w(), 2.0);
        assert_eq!(*cell.wsum(), 6.0);
        assert_eq!(cell.mean_value(), Some(3.0));
        assert_eq!(*cell.pos(), Position([1.0, 2.0]));
    }

    #[test]
    fn unit_square_fully_split() {
        let mut points = unit_square();
        let cell = Cell::build(&mut points, 0, &params(0.0), &SerialExecutor).unwrap();
        assert_eq!(cell.w(), 4.0);
        assert_eq!(cell.leaves().count(), 4);
        assert_eq!(cell.iter().count(), 7);
        assert_eq!(cell.depth(), 2);
        assert_eq!(*cell.pos(), Position([0.5, 0.5]));
        assert!((cell.size() - 0.5_f64.sqrt()).abs() < 1e-15);
        for leaf in cell.leaves() {
            assert_eq!(leaf.n(), 1);
            assert_eq!(leaf.size(), 0.0);
        }
    }

    #[test]
    fn large_min_size_makes_a_single_leaf() {
        let mut points = unit_square();
        let cell = Cell::build(&mut points, 0, &params(1.0), &SerialExecutor).unwrap();
        assert!(cell.is_leaf());
        assert_eq!(cell.n(), 4);
        assert_eq!(cell.range(), 0..4);
    }

    #[test]
    fn children_cover_parent_range() {
        let mut points = unit_square();
        let cell = Cell::build(&mut points, 0, &params(0.0), &SerialExecutor).unwrap();
        for c in cell.iter() {
            if let Some([left, right]) = c.children() {
                assert_eq!(left.range().start, c.range().start);
                assert_eq!(left.range().end, right.range().start);
                assert_eq!(right.range().end, c.range().end);
            }
        }
    }

    #[test]
    fn zero_weight_centroid_is_unweighted_mean() {
        let mut points: Vec<Point<Count, Flat>> = vec![
            Point::new(Position([0.0, 0.0]), (), 0.0, 0),
            Point::new(Position([2.0, 4.0]), (), 0.0, 1),
        ];
        let cell = Cell::build(&mut points, 0, &params(0.0), &SerialExecutor).unwrap();
        assert_eq!(*cell.pos(), Position([1.0, 2.0]));
        assert_eq!(cell.w(), 0.0);
        assert_eq!(cell.mean_value(), None);
    }

    #[test]
    fn forest_caps_top_level_size() {
        let mut points = unit_square();
        let p = BuildParams {
            max_top_size_sq: Some(0.3),
            ..params(0.0)
        };
        let cells = build_forest(&mut points, &p, &SerialExecutor).unwrap();
        assert_eq!(cells.len(), 2);
        assert!(cells.iter().all(|c| c.size_sq() <= 0.3));
        assert_eq!(cells[0].range(), 0..2);
        assert_eq!(cells[1].range(), 2..4);
        // both roots sit below the top-level split
        assert!(cells.iter().all(|c| c.level() == 1 && c.depth() == 1));
        assert!(cells.iter().flat_map(|c| c.leaves()).all(|c| c.level() == 2));
    }

    #[test]
    fn forest_levels_match_single_tree() {
        let mut single_points = unit_square();
        let single = Cell::build(&mut single_points, 0, &params(0.0), &SerialExecutor).unwrap();

        let mut forest_points = unit_square();
        let p = BuildParams {
            max_top_size_sq: Some(0.3),
            ..params(0.0)
        };
        let forest = build_forest(&mut forest_points, &p, &SerialExecutor).unwrap();
        let forest_depth = forest.iter().map(|c| c.level() + c.depth()).max();
        assert_eq!(forest_depth, Some(single.depth()));
        assert_eq!(
            single_points.iter().map(|p| p.index()).collect::<Vec<_>>(),
            forest_points.iter().map(|p| p.index()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn size_propagates_nan() {
        let points: Vec<Point<Count, Flat>> = unit_square();
        let center = Position([f64::NAN, 0.5]);
        assert!(size_sq_about(&center, &points).is_nan());
        let center = Position([0.5, 0.5]);
        assert_eq!(size_sq_about(&center, &points), 0.5);
    }

    #[test]
    fn overflowing_sums_are_rejected() {
        let coords = [[1e308, 0.0], [1e308, 0.0], [-1e308, 0.0], [0.0, 1.0]];
        let mut points: Vec<Point<Count, Flat>> = coords
            .iter()
            .enumerate()
            .map(|(i, c)| Point::new(Position(*c), (), 1.0, i))
            .collect();
        assert!(Cell::build(&mut points, 0, &params(0.0), &SerialExecutor).is_err());
        assert!(build_forest(&mut points, &params(0.0), &SerialExecutor).is_err());
    }

    #[test]
    fn near_queries_agree_with_point_test_on_boundaries() {
        // a lattice produces many points lying exactly on the query radius
        let mut points: Vec<Point<Count, Flat>> = (0..15)
            .flat_map(|i| (0..15).map(move |j| [i as f64, j as f64]))
            .enumerate()
            .map(|(i, c)| Point::new(Position(c), (), 1.0, i))
            .collect();
        let cell = Cell::build(&mut points, 0, &params(0.0), &SerialExecutor).unwrap();
        for center in [Position([7.0, 7.0]), Position([3.0, 4.0]), Position([0.5, 6.0])] {
            for sep in [1.0, 2.0_f64.sqrt(), 2.0, 5.0_f64.sqrt(), 5.0, 50.0_f64.sqrt()] {
                let mut expected: Vec<usize> = points
                    .iter()
                    .filter(|p| Flat::distance_sq(p.pos(), &center) <= sep * sep)
                    .map(|p| p.index())
                    .collect();
                expected.sort();
                let mut near = Vec::new();
                cell.get_near(&points, &center, sep, &mut near);
                near.sort();
                assert_eq!(near, expected, "center = {center:?}, sep = {sep}");
                assert_eq!(cell.count_near(&points, &center, sep), expected.len());
            }
        }
        assert_eq!(cell.count_near(&points, &Position([7.0, 7.0]), -1.0), 0);
    }

    #[test]
    fn near_queries() {
        let mut points = unit_square();
        let cell = Cell::build(&mut points, 0, &params(0.0), &SerialExecutor).unwrap();
        let origin = Position([0.0, 0.0]);
        assert_eq!(cell.count_near(&points, &origin, 0.5), 1);
        assert_eq!(cell.count_near(&points, &origin, 1.0), 3);
        assert_eq!(cell.count_near(&points, &origin, 2.0), 4);

        let mut near = Vec::new();
        cell.get_near(&points, &origin, 1.0, &mut near);
        near.sort();
        assert_eq!(near, vec![0, 1, 2]);
    }

    #[test]
    fn weight_conservation_check() {
        assert!(check_weight_conservation(3.0, 1.0, 2.0).is_ok());
        assert!(check_weight_conservation(3.0, 1.0, 1.0).is_err());
    }
}
