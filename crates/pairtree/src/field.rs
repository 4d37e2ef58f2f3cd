//! The [`Field`] type: a validated catalog of points & the trees built over
//! them.
//!
//! A [`Field`] is built in 3 steps:
//! 1. every input array of the [`Catalog`] is validated. Nothing is
//!    allocated until all of the input has been checked, so a failure never
//!    leaves a partially constructed tree behind.
//! 2. the arrays are converted to [`Point`]s (angular coordinates are
//!    converted to unit vectors along the way)
//! 3. the tree(s) are built over the points (see
//!    [`pairtree_internal::build_forest`])
//!
//! After construction, a [`Field`] is immutable.

use crate::config::FieldConfig;
use crate::error::Error;
use crate::executor::RayonExecutor;
use core::f64::consts::{FRAC_PI_2, PI};
use ndarray::ArrayView1;
use pairtree_internal::{
    Cell, CoordSystem, DataClass, Executor, Metric, NeumaierSum, Point, build_forest,
};
use tracing::{debug, debug_span, warn};

/// The names of the 2 positional input arrays
fn coord_names(coord: CoordSystem) -> [&'static str; 2] {
    match coord {
        CoordSystem::Flat => ["x", "y"],
        CoordSystem::Sphere => ["ra", "dec"],
    }
}

/// A collection of parallel arrays describing a catalog of objects.
///
/// A catalog holds:
/// - 2 positional arrays. These are `(x, y)` for flat coordinates or
///   `(ra, dec)` for spherical coordinates.
/// - 0 or more observable arrays. Their number & order must match
///   [`DataClass::COMPONENT_NAMES`] for the data class of the field built
///   from the catalog.
/// - an optional weight array. When no weights are provided, every weight is
///   1.0, i.e., weights are just counts.
///
/// The arrays can be arbitrary (possibly strided) 1D views. Nothing is
/// checked until a [`Field`] is built.
#[derive(Clone, Debug)]
pub struct Catalog<'a> {
    coords: [ArrayView1<'a, f64>; 2],
    values: Vec<ArrayView1<'a, f64>>,
    weights: Option<ArrayView1<'a, f64>>,
}

impl<'a> Catalog<'a> {
    pub fn new(coord0: ArrayView1<'a, f64>, coord1: ArrayView1<'a, f64>) -> Self {
        Catalog {
            coords: [coord0, coord1],
            values: Vec::new(),
            weights: None,
        }
    }

    pub fn from_slices(coord0: &'a [f64], coord1: &'a [f64]) -> Self {
        Self::new(ArrayView1::from(coord0), ArrayView1::from(coord1))
    }

    /// append an observable component
    pub fn with_values(mut self, component: ArrayView1<'a, f64>) -> Self {
        self.values.push(component);
        self
    }

    pub fn with_value_slice(self, component: &'a [f64]) -> Self {
        self.with_values(ArrayView1::from(component))
    }

    pub fn with_weights(mut self, weights: ArrayView1<'a, f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_weight_slice(self, weights: &'a [f64]) -> Self {
        self.with_weights(ArrayView1::from(weights))
    }

    /// the weight of the `i`th object
    fn weight(&self, i: usize) -> f64 {
        if let Some(ref weights) = self.weights {
            weights[i]
        } else {
            1.0
        }
    }
}

const OVERFLOW_REQUIREMENT: &str =
    "must be small enough that the weighted sums over the catalog stay finite";

/// Checks everything about a catalog that can be checked before we allocate
/// anything.
fn validate_catalog<D: DataClass, M: Metric>(
    catalog: &Catalog,
    nobj: usize,
    config: &FieldConfig,
) -> Result<(), Error> {
    if M::COORD == CoordSystem::Sphere {
        let unit = config.angle_unit();
        if unit.to_radians(config.maxsep()) > PI {
            return Err(Error::separation_range(
                config.minsep(),
                config.maxsep(),
                "angular separations can't exceed 180 degrees",
            ));
        }
    }

    let n_components = D::COMPONENT_NAMES.len();
    if catalog.values.len() != n_components {
        return Err(Error::variant(D::KIND, n_components, catalog.values.len()));
    }

    if nobj == 0 {
        return Err(Error::empty());
    }

    let names = coord_names(M::COORD);
    for (name, coord) in names.iter().zip(catalog.coords.iter()) {
        if coord.len() != nobj {
            return Err(Error::length(*name, nobj, coord.len()));
        }
    }
    for (name, values) in D::COMPONENT_NAMES.iter().zip(catalog.values.iter()) {
        if values.len() != nobj {
            return Err(Error::length(*name, nobj, values.len()));
        }
    }
    if let Some(ref weights) = catalog.weights {
        if weights.len() != nobj {
            return Err(Error::length("w", nobj, weights.len()));
        }
    }

    // check record-by-record so that we report the first offending record.
    //
    // Cell aggregates sum `w`, `w * coord` (or just `coord` when the total
    // weight is 0) and `w * value` over subsets of the records. Every such
    // partial sum is bounded by the corresponding sum of magnitudes, so we
    // require those to stay finite.
    let unit = config.angle_unit();
    let mut w_total = 0.0;
    let mut weighted_coord_totals = [0.0; 2];
    let mut coord_totals = [0.0; 2];
    let mut value_totals = vec![0.0; n_components];
    for i in 0..nobj {
        for (name, coord) in names.iter().zip(catalog.coords.iter()) {
            if !coord[i].is_finite() {
                return Err(Error::invalid_value(*name, i, coord[i], "must be finite"));
            }
        }
        if M::COORD == CoordSystem::Sphere {
            let dec = catalog.coords[1][i];
            // a tiny tolerance for values converted from other units
            if unit.to_radians(dec).abs() > FRAC_PI_2 * (1.0 + 1e-12) {
                return Err(Error::invalid_value(
                    names[1],
                    i,
                    dec,
                    "must lie between -90 and +90 degrees",
                ));
            }
        }
        for (name, values) in D::COMPONENT_NAMES.iter().zip(catalog.values.iter()) {
            if !values[i].is_finite() {
                return Err(Error::invalid_value(*name, i, values[i], "must be finite"));
            }
        }
        let w = catalog.weight(i);
        if !w.is_finite() {
            return Err(Error::invalid_value("w", i, w, "must be finite"));
        } else if w < 0.0 {
            return Err(Error::invalid_value("w", i, w, "must be non-negative"));
        }

        w_total += w;
        if !w_total.is_finite() {
            return Err(Error::invalid_value("w", i, w, OVERFLOW_REQUIREMENT));
        }
        // spherical positions are unit vectors, so the weight total bounds them
        if M::COORD == CoordSystem::Flat {
            for axis in 0..2 {
                let c = catalog.coords[axis][i];
                weighted_coord_totals[axis] += (w * c).abs();
                coord_totals[axis] += c.abs();
                if !(weighted_coord_totals[axis].is_finite() && coord_totals[axis].is_finite()) {
                    return Err(Error::invalid_value(names[axis], i, c, OVERFLOW_REQUIREMENT));
                }
            }
        }
        let components = D::COMPONENT_NAMES.iter().zip(catalog.values.iter());
        for ((name, values), total) in components.zip(value_totals.iter_mut()) {
            *total += w * values[i].abs();
            if !total.is_finite() {
                return Err(Error::invalid_value(*name, i, values[i], OVERFLOW_REQUIREMENT));
            }
        }
    }
    Ok(())
}

/// convert a validated catalog to points
fn make_points<D: DataClass, M: Metric>(
    catalog: &Catalog,
    nobj: usize,
    config: &FieldConfig,
) -> Vec<Point<D, M>> {
    let unit = config.angle_unit();
    let to_tree_coord = |c: f64| match M::COORD {
        CoordSystem::Flat => c,
        CoordSystem::Sphere => unit.to_radians(c),
    };
    let mut components = vec![0.0; D::COMPONENT_NAMES.len()];
    let mut points = Vec::with_capacity(nobj);
    for i in 0..nobj {
        for (component, values) in components.iter_mut().zip(catalog.values.iter()) {
            *component = values[i];
        }
        let pos = M::make_position(
            to_tree_coord(catalog.coords[0][i]),
            to_tree_coord(catalog.coords[1][i]),
        );
        points.push(Point::new(
            pos,
            D::from_components(&components),
            catalog.weight(i),
            i,
        ));
    }
    points
}

/// A catalog of points & the tree(s) built over it.
///
/// The field owns all of its points and every cell. The points are stored
/// in the order produced by partitioning: the points owned by any cell form
/// a contiguous range (see [`Field::points_of`]).
#[derive(Debug)]
pub struct Field<D: DataClass, M: Metric> {
    points: Vec<Point<D, M>>,
    cells: Vec<Cell<D, M>>,
    config: FieldConfig,
}

impl<D: DataClass, M: Metric> Field<D, M> {
    /// Build a field from the first `nobj` entries of `catalog`.
    ///
    /// Subtrees are built concurrently on rayon's thread-pool (see
    /// [`FieldConfig::parallel_threshold`]).
    pub fn new(catalog: &Catalog, nobj: usize, config: &FieldConfig) -> Result<Self, Error> {
        let exec = RayonExecutor::new(config.parallel_threshold());
        Self::new_with_executor(catalog, nobj, config, &exec)
    }

    /// Build a field, driving construction with the specified [`Executor`]
    pub fn new_with_executor(
        catalog: &Catalog,
        nobj: usize,
        config: &FieldConfig,
        exec: &impl Executor,
    ) -> Result<Self, Error> {
        let span = debug_span!(
            "build_field",
            data = D::KIND.name(),
            coords = M::COORD.name(),
            nobj
        );
        let _guard = span.enter();

        if let Err(err) = validate_catalog::<D, M>(catalog, nobj, config) {
            warn!(%err, "rejected field input");
            return Err(err);
        }

        let mut points = make_points::<D, M>(catalog, nobj, config);
        let params = config.build_params(M::COORD);
        let cells = build_forest(&mut points, &params, exec).map_err(Error::internal)?;

        let field = Field {
            points,
            cells,
            config: config.clone(),
        };
        debug!(
            n_top = field.n_top(),
            n_cells = field.n_cells(),
            n_leaves = field.n_leaves(),
            max_depth = field.max_depth(),
            split_method = config.split_method().name(),
            "built field"
        );
        Ok(field)
    }

    /// the number of top-level cells
    pub fn n_top(&self) -> usize {
        self.cells.len()
    }

    /// the top-level cells
    pub fn cells(&self) -> &[Cell<D, M>] {
        &self.cells
    }

    /// the number of input objects
    pub fn n_obj(&self) -> usize {
        self.points.len()
    }

    /// all points, in storage order
    pub fn points(&self) -> &[Point<D, M>] {
        &self.points
    }

    /// the points owned by `cell` (which must belong to this field)
    pub fn points_of(&self, cell: &Cell<D, M>) -> &[Point<D, M>] {
        &self.points[cell.range()]
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    /// the sum of the weights of the top-level cells
    pub fn total_weight(&self) -> f64 {
        let mut sum = NeumaierSum::new();
        self.cells.iter().for_each(|c| sum.add(c.w()));
        sum.value()
    }

    /// iterate over every cell of every tree (each tree in pre-order)
    pub fn iter_cells(&self) -> impl Iterator<Item = &Cell<D, M>> {
        self.cells.iter().flat_map(|c| c.iter())
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Cell<D, M>> {
        self.iter_cells().filter(|c| c.is_leaf())
    }

    pub fn n_cells(&self) -> usize {
        self.iter_cells().count()
    }

    pub fn n_leaves(&self) -> usize {
        self.leaves().count()
    }

    /// The number of edges on the longest path from the root to a leaf (a
    /// tree made of a single leaf has a depth of 0).
    ///
    /// For a forest, the path starts at the root of the single tree that
    /// would have been built without the top-level cap (see
    /// [`Cell::level`]). Consequently, enabling
    /// [`crate::FieldBuilder::top_level_forest`] never changes the depth.
    pub fn max_depth(&self) -> usize {
        self.cells
            .iter()
            .map(|c| c.level() + c.depth())
            .max()
            .unwrap_or(0)
    }

    /// Count the objects within distance `sep` of `pos`.
    ///
    /// `sep` is a tree distance (a chord length for spherical coordinates,
    /// see [`pairtree_internal::Sphere::angle_to_chord`]).
    pub fn count_near(&self, pos: &M::Position, sep: f64) -> usize {
        self.cells
            .iter()
            .map(|c| c.count_near(&self.points, pos, sep))
            .sum()
    }

    /// The input indices of the objects within distance `sep` of `pos`, in
    /// ascending order.
    pub fn get_near(&self, pos: &M::Position, sep: f64) -> Vec<usize> {
        let mut out = Vec::new();
        for c in &self.cells {
            c.get_near(&self.points, pos, sep, &mut out);
        }
        out.sort_unstable();
        out
    }
}
