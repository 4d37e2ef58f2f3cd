//! Coordinate systems and the distances measured in them.
//!
//! A [`Metric`] is never instantiated: it's a type-level tag that picks the
//! position representation and the distance function used while building
//! (and later traversing) a tree. There are only 2 of them:
//! - [`Flat`]: 2D cartesian positions with the usual euclidean distance
//! - [`Sphere`]: positions on the unit sphere. The input is an angular pair
//!   (ra, dec) that we convert to a 3D unit-vector. Distances are chord
//!   lengths between unit vectors, which increase monotonically with the
//!   great-circle separation (so a separation range expressed as chords
//!   prunes exactly the same pairs as one expressed as angles).

use core::fmt::Debug;

/// Identifies the coordinate system of a [`Metric`] at runtime
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoordSystem {
    Flat,
    Sphere,
}

impl CoordSystem {
    pub fn name(&self) -> &'static str {
        match self {
            CoordSystem::Flat => "flat",
            CoordSystem::Sphere => "sphere",
        }
    }
}

/// A position with `N` cartesian components
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position<const N: usize>(pub [f64; N]);

/// Operations we need from a position type to partition & aggregate points
pub trait Coords: Copy + Debug + PartialEq + Send + Sync + 'static {
    /// number of cartesian axes a position is represented with
    const N_AXES: usize;

    /// the component along axis `i`
    fn axis(&self, i: usize) -> f64;

    /// construct a position from a function of the axis index
    fn from_fn(f: impl FnMut(usize) -> f64) -> Self;
}

impl<const N: usize> Coords for Position<N> {
    const N_AXES: usize = N;

    #[inline(always)]
    fn axis(&self, i: usize) -> f64 {
        self.0[i]
    }

    fn from_fn(f: impl FnMut(usize) -> f64) -> Self {
        Position(core::array::from_fn(f))
    }
}

#[inline(always)]
fn squared_diff_norm<const N: usize>(a: &Position<N>, b: &Position<N>) -> f64 {
    let mut sum = 0.0;
    for k in 0..N {
        let diff = a.0[k] - b.0[k];
        sum += diff * diff;
    }
    sum
}

/// The distance/coordinate strategy used by a tree.
pub trait Metric: Copy + Debug + Send + Sync + 'static {
    type Position: Coords;

    const COORD: CoordSystem;

    /// Construct a position from the 2 input coordinates.
    ///
    /// For [`Flat`] these are `(x, y)`. For [`Sphere`] these are
    /// `(ra, dec)` in radians.
    fn make_position(c0: f64, c1: f64) -> Self::Position;

    /// squared distance between 2 positions
    fn distance_sq(a: &Self::Position, b: &Self::Position) -> f64;

    fn distance(a: &Self::Position, b: &Self::Position) -> f64 {
        Self::distance_sq(a, b).sqrt()
    }

    /// Map the weighted mean of a set of positions to the position that we
    /// actually use as the centroid.
    ///
    /// `fallback` is used when `mean` can't be mapped (e.g. it lies at the
    /// center of the unit sphere).
    fn finish_centroid(mean: Self::Position, fallback: &Self::Position) -> Self::Position;
}

/// 2D cartesian coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flat;

impl Metric for Flat {
    type Position = Position<2>;

    const COORD: CoordSystem = CoordSystem::Flat;

    fn make_position(x: f64, y: f64) -> Position<2> {
        Position([x, y])
    }

    #[inline(always)]
    fn distance_sq(a: &Position<2>, b: &Position<2>) -> f64 {
        squared_diff_norm(a, b)
    }

    fn finish_centroid(mean: Position<2>, _fallback: &Position<2>) -> Position<2> {
        mean
    }
}

/// Positions on the unit sphere
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sphere;

impl Sphere {
    /// The great-circle angle (in radians) between 2 unit vectors
    pub fn angular_distance(a: &Position<3>, b: &Position<3>) -> f64 {
        Self::chord_to_angle(squared_diff_norm(a, b).sqrt())
    }

    /// convert a chord length between 2 unit vectors to the angle they
    /// subtend
    pub fn chord_to_angle(chord: f64) -> f64 {
        // clamp guards against chords a hair above 2 from roundoff
        2.0 * (0.5 * chord).min(1.0).asin()
    }

    /// convert an angle (in radians) to the chord length between 2 unit
    /// vectors separated by that angle
    pub fn angle_to_chord(angle: f64) -> f64 {
        2.0 * (0.5 * angle).sin()
    }
}

impl Metric for Sphere {
    type Position = Position<3>;

    const COORD: CoordSystem = CoordSystem::Sphere;

    fn make_position(ra: f64, dec: f64) -> Position<3> {
        let (sin_ra, cos_ra) = ra.sin_cos();
        let (sin_dec, cos_dec) = dec.sin_cos();
        Position([cos_dec * cos_ra, cos_dec * sin_ra, sin_dec])
    }

    #[inline(always)]
    fn distance_sq(a: &Position<3>, b: &Position<3>) -> f64 {
        squared_diff_norm(a, b)
    }

    fn finish_centroid(mean: Position<3>, fallback: &Position<3>) -> Position<3> {
        let norm = squared_diff_norm(&mean, &Position([0.0; 3])).sqrt();
        if norm > 0.0 {
            Position([mean.0[0] / norm, mean.0[1] / norm, mean.0[2] / norm])
        } else {
            *fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::{FRAC_PI_2, PI, SQRT_2};

    #[test]
    fn flat_distance() {
        let a = Flat::make_position(0.0, 0.0);
        let b = Flat::make_position(3.0, 4.0);
        assert_eq!(Flat::distance_sq(&a, &b), 25.0);
        assert_eq!(Flat::distance(&a, &b), 5.0);
    }

    #[test]
    fn sphere_quarter_circle() {
        let a = Sphere::make_position(0.0, 0.0);
        let b = Sphere::make_position(FRAC_PI_2, 0.0);
        assert!((Sphere::distance(&a, &b) - SQRT_2).abs() < 1e-15);
        assert!((Sphere::angular_distance(&a, &b) - FRAC_PI_2).abs() < 1e-15);
    }

    #[test]
    fn sphere_positions_are_unit_vectors() {
        for &(ra, dec) in &[(0.3, -1.2), (5.9, 0.7), (PI, FRAC_PI_2)] {
            let p = Sphere::make_position(ra, dec);
            let norm_sq: f64 = p.0.iter().map(|c| c * c).sum();
            assert!((norm_sq - 1.0).abs() < 1e-14);
        }
    }

    #[test]
    fn chord_angle_roundtrip_is_monotonic() {
        let mut prev = -1.0;
        for i in 0..=100 {
            let angle = PI * (i as f64) / 100.0;
            let chord = Sphere::angle_to_chord(angle);
            assert!(chord > prev);
            assert!((Sphere::chord_to_angle(chord) - angle).abs() < 1e-12);
            prev = chord;
        }
    }

    #[test]
    fn sphere_centroid_renormalized() {
        let a = Sphere::make_position(0.0, 0.0);
        let b = Sphere::make_position(FRAC_PI_2, 0.0);
        let mean = Position([0.5 * (a.0[0] + b.0[0]), 0.5 * (a.0[1] + b.0[1]), 0.0]);
        let c = Sphere::finish_centroid(mean, &a);
        assert!((c.0[0] - 0.5 * SQRT_2).abs() < 1e-15);
        assert!((c.0[1] - 0.5 * SQRT_2).abs() < 1e-15);

        // antipodal points average to the origin
        let fallback = Sphere::finish_centroid(Position([0.0; 3]), &b);
        assert_eq!(fallback, b);
    }
}
