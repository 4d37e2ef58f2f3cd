//! Configuration of tree construction
//!
//! A [`FieldConfig`] is always produced by a [`FieldBuilder`], which checks
//! every parameter. A [`FieldConfig`] is therefore known to be valid
//! (independent of the catalog it gets used with).
//!
//! # Size thresholds
//! The splitting parameter `b` bounds the size of a cell relative to the
//! separation range:
//! - a cell whose size doesn't exceed `minsep * b / (2 + 3b)` is never
//!   split, see [`FieldConfig::min_size`]
//! - when [`FieldBuilder::top_level_forest`] is enabled, no top-level cell
//!   is larger than `maxsep * b` (any larger cell would always need to be
//!   opened for separations within the range of interest), see
//!   [`FieldConfig::max_top_size`]
//!
//! For spherical coordinates, `minsep` and `maxsep` are angles expressed in
//! the configured [`AngleUnit`]. Tree distances on the sphere are chord
//! lengths between unit vectors, so both thresholds are derived from the
//! corresponding chords.

use crate::Error;
use pairtree_internal::{BuildParams, CoordSystem, SplitMethod, Sphere};

/// The default seed used by [`SplitMethod::Random`]
pub const DEFAULT_SEED: u64 = 0x5EED_CE11_7EE5_u64;

/// The default number of points below which subtrees are built on a single
/// thread
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 2048;

/// Units of angular input (right ascension, declination & angular
/// separations)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AngleUnit {
    #[default]
    Radians,
    Degrees,
    Hours,
    Arcmin,
    Arcsec,
}

impl AngleUnit {
    /// the number of radians in 1 unit
    pub fn radians_per_unit(&self) -> f64 {
        use core::f64::consts::PI;
        match self {
            AngleUnit::Radians => 1.0,
            AngleUnit::Degrees => PI / 180.0,
            AngleUnit::Hours => PI / 12.0,
            AngleUnit::Arcmin => PI / (180.0 * 60.0),
            AngleUnit::Arcsec => PI / (180.0 * 3600.0),
        }
    }

    pub fn to_radians(&self, value: f64) -> f64 {
        value * self.radians_per_unit()
    }
}

#[derive(Clone, Debug)]
enum SplitSpec {
    Method(SplitMethod),
    Name(String),
    Selector(i32),
}

fn split_method_choices() -> Vec<String> {
    SplitMethod::ALL
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{} ({i})", m.name()))
        .collect()
}

impl SplitSpec {
    fn resolve(&self) -> Result<SplitMethod, Error> {
        match self {
            SplitSpec::Method(m) => Ok(*m),
            SplitSpec::Name(name) => SplitMethod::from_name(name)
                .ok_or_else(|| Error::split_method(name.clone(), split_method_choices())),
            SplitSpec::Selector(selector) => SplitMethod::from_selector(*selector)
                .ok_or_else(|| Error::split_method(selector.to_string(), split_method_choices())),
        }
    }
}

/// A validated configuration for constructing a [`crate::Field`]
#[derive(Clone, Debug, PartialEq)]
pub struct FieldConfig {
    minsep: f64,
    maxsep: f64,
    b: f64,
    split_method: SplitMethod,
    leaf_size: usize,
    top_level_forest: bool,
    seed: u64,
    angle_unit: AngleUnit,
    parallel_threshold: usize,
}

impl FieldConfig {
    pub fn builder() -> FieldBuilder {
        FieldBuilder::new()
    }

    pub fn minsep(&self) -> f64 {
        self.minsep
    }

    pub fn maxsep(&self) -> f64 {
        self.maxsep
    }

    pub fn b(&self) -> f64 {
        self.b
    }

    pub fn split_method(&self) -> SplitMethod {
        self.split_method
    }

    pub fn leaf_size(&self) -> usize {
        self.leaf_size
    }

    pub fn top_level_forest(&self) -> bool {
        self.top_level_forest
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn angle_unit(&self) -> AngleUnit {
        self.angle_unit
    }

    pub fn parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }

    /// The separation range expressed as a tree distance in `coord`.
    ///
    /// This is the identity for flat coordinates. For spherical coordinates,
    /// the angles are converted to chord lengths between unit vectors.
    pub fn tree_separation_range(&self, coord: CoordSystem) -> (f64, f64) {
        match coord {
            CoordSystem::Flat => (self.minsep, self.maxsep),
            CoordSystem::Sphere => (
                Sphere::angle_to_chord(self.angle_unit.to_radians(self.minsep)),
                Sphere::angle_to_chord(self.angle_unit.to_radians(self.maxsep)),
            ),
        }
    }

    /// cells no larger than this (in tree distance units) are never split
    pub fn min_size(&self, coord: CoordSystem) -> f64 {
        let (minsep, _) = self.tree_separation_range(coord);
        minsep * self.b / (2.0 + 3.0 * self.b)
    }

    /// the largest size (in tree distance units) of a top-level cell, if the
    /// number of top-level cells isn't fixed at 1
    pub fn max_top_size(&self, coord: CoordSystem) -> Option<f64> {
        if self.top_level_forest && self.b > 0.0 {
            let (_, maxsep) = self.tree_separation_range(coord);
            Some(maxsep * self.b)
        } else {
            None
        }
    }

    pub(crate) fn build_params(&self, coord: CoordSystem) -> BuildParams {
        let min_size = self.min_size(coord);
        BuildParams {
            min_size_sq: min_size * min_size,
            max_top_size_sq: self.max_top_size(coord).map(|s| s * s),
            leaf_size: self.leaf_size,
            split_method: self.split_method,
            seed: self.seed,
        }
    }
}

/// Builds a [`FieldConfig`]
///
/// # Example
/// ```
/// use pairtree::{FieldBuilder, SplitMethod};
/// let config = FieldBuilder::new()
///     .separation(0.1, 2.0)
///     .b(0.05)
///     .split_method(SplitMethod::Median)
///     .build()
///     .unwrap();
/// assert_eq!(config.leaf_size(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct FieldBuilder {
    separation: Option<(f64, f64)>,
    b: Option<f64>,
    split: SplitSpec,
    leaf_size: usize,
    top_level_forest: bool,
    seed: u64,
    angle_unit: AngleUnit,
    parallel_threshold: usize,
}

impl Default for FieldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldBuilder {
    pub fn new() -> Self {
        FieldBuilder {
            separation: None,
            b: None,
            split: SplitSpec::Method(SplitMethod::default()),
            leaf_size: 1,
            top_level_forest: false,
            seed: DEFAULT_SEED,
            angle_unit: AngleUnit::default(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// the range of separations that will be of interest downstream
    /// (required)
    pub fn separation(mut self, minsep: f64, maxsep: f64) -> Self {
        self.separation = Some((minsep, maxsep));
        self
    }

    /// the splitting parameter (required)
    pub fn b(mut self, b: f64) -> Self {
        self.b = Some(b);
        self
    }

    pub fn split_method(mut self, method: SplitMethod) -> Self {
        self.split = SplitSpec::Method(method);
        self
    }

    /// specify the split method by name (resolved by [`FieldBuilder::build`])
    pub fn split_method_name(mut self, name: &str) -> Self {
        self.split = SplitSpec::Name(name.to_owned());
        self
    }

    /// specify the split method by its integer selector (resolved by
    /// [`FieldBuilder::build`])
    pub fn split_method_selector(mut self, selector: i32) -> Self {
        self.split = SplitSpec::Selector(selector);
        self
    }

    /// cells holding no more than this many points become leaves
    pub fn leaf_size(mut self, leaf_size: usize) -> Self {
        self.leaf_size = leaf_size;
        self
    }

    /// allow the field to hold multiple top-level cells
    pub fn top_level_forest(mut self, flag: bool) -> Self {
        self.top_level_forest = flag;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn angle_unit(mut self, unit: AngleUnit) -> Self {
        self.angle_unit = unit;
        self
    }

    /// subtrees holding fewer points than this are built on a single thread
    pub fn parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn build(self) -> Result<FieldConfig, Error> {
        let Some((minsep, maxsep)) = self.separation else {
            return Err(Error::parameter(
                "separation",
                "<unset>".to_owned(),
                "must be specified",
            ));
        };
        if !(minsep.is_finite() && maxsep.is_finite()) {
            return Err(Error::separation_range(minsep, maxsep, "both must be finite"));
        } else if minsep <= 0.0 {
            return Err(Error::separation_range(minsep, maxsep, "minsep must be positive"));
        } else if minsep >= maxsep {
            return Err(Error::separation_range(
                minsep,
                maxsep,
                "minsep must be smaller than maxsep",
            ));
        }

        let Some(b) = self.b else {
            return Err(Error::parameter("b", "<unset>".to_owned(), "must be specified"));
        };
        if !(b.is_finite() && b >= 0.0) {
            return Err(Error::parameter(
                "b",
                b.to_string(),
                "must be finite and non-negative",
            ));
        }

        if self.leaf_size == 0 {
            return Err(Error::parameter("leaf_size", "0".to_owned(), "must be positive"));
        }

        let split_method = self.split.resolve()?;

        Ok(FieldConfig {
            minsep,
            maxsep,
            b,
            split_method,
            leaf_size: self.leaf_size,
            top_level_forest: self.top_level_forest,
            seed: self.seed,
            angle_unit: self.angle_unit,
            parallel_threshold: self.parallel_threshold,
        })
    }
}
