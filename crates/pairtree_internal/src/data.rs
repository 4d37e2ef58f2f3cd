//! The observables that points carry & the points themselves
//!
//! Every point has a position and a weight. The [`DataClass`] determines
//! what else comes along:
//! - [`Count`]: nothing (used for density/count statistics)
//! - [`Scalar`]: a single real value (e.g. a convergence field)
//! - [`Spin2`]: a pair of reals (e.g. the 2 components of a shear field)
//!
//! A cell aggregates the observable of its points as the weighted sum
//! `Σ wᵢ vᵢ`. That sum has the same shape as a single value, so a
//! [`DataClass`] uses [`DataClass::Value`] for both.

use crate::metric::Metric;
use crate::sum::NeumaierSum;
use core::fmt::Debug;

/// Identifies a [`DataClass`] at runtime
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataKind {
    Count,
    Scalar,
    Spin2,
}

impl DataKind {
    pub fn name(&self) -> &'static str {
        match self {
            DataKind::Count => "count",
            DataKind::Scalar => "scalar",
            DataKind::Spin2 => "spin-2",
        }
    }
}

pub trait DataClass: Copy + Debug + Send + Sync + 'static {
    /// the observable carried by a single point (or a weighted sum of them)
    type Value: Copy + Debug + PartialEq + Send + Sync;

    /// running state used to accumulate `Σ wᵢ vᵢ`
    type Accum: Clone + Default;

    const KIND: DataKind;

    /// names of the real-valued components, in the order they are passed to
    /// [`DataClass::from_components`]
    const COMPONENT_NAMES: &'static [&'static str];

    /// Construct a value from its components.
    ///
    /// `components` must have `Self::COMPONENT_NAMES.len()` elements.
    fn from_components(components: &[f64]) -> Self::Value;

    /// consume the value and weight to update `accum`
    fn consume(accum: &mut Self::Accum, value: &Self::Value, weight: f64);

    /// the weighted sum tracked by `accum`
    fn finish(accum: &Self::Accum) -> Self::Value;

    fn scale(value: &Self::Value, factor: f64) -> Self::Value;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Count;

impl DataClass for Count {
    type Value = ();
    type Accum = ();

    const KIND: DataKind = DataKind::Count;
    const COMPONENT_NAMES: &'static [&'static str] = &[];

    fn from_components(_components: &[f64]) {}

    fn consume(_accum: &mut (), _value: &(), _weight: f64) {}

    fn finish(_accum: &()) {}

    fn scale(_value: &(), _factor: f64) {}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Scalar;

impl DataClass for Scalar {
    type Value = f64;
    type Accum = NeumaierSum;

    const KIND: DataKind = DataKind::Scalar;
    const COMPONENT_NAMES: &'static [&'static str] = &["k"];

    fn from_components(components: &[f64]) -> f64 {
        components[0]
    }

    #[inline(always)]
    fn consume(accum: &mut NeumaierSum, value: &f64, weight: f64) {
        accum.add(weight * value);
    }

    fn finish(accum: &NeumaierSum) -> f64 {
        accum.value()
    }

    fn scale(value: &f64, factor: f64) -> f64 {
        value * factor
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Spin2;

impl DataClass for Spin2 {
    type Value = [f64; 2];
    type Accum = [NeumaierSum; 2];

    const KIND: DataKind = DataKind::Spin2;
    const COMPONENT_NAMES: &'static [&'static str] = &["g1", "g2"];

    fn from_components(components: &[f64]) -> [f64; 2] {
        [components[0], components[1]]
    }

    #[inline(always)]
    fn consume(accum: &mut [NeumaierSum; 2], value: &[f64; 2], weight: f64) {
        accum[0].add(weight * value[0]);
        accum[1].add(weight * value[1]);
    }

    fn finish(accum: &[NeumaierSum; 2]) -> [f64; 2] {
        [accum[0].value(), accum[1].value()]
    }

    fn scale(value: &[f64; 2], factor: f64) -> [f64; 2] {
        [value[0] * factor, value[1] * factor]
    }
}

/// A single input record.
///
/// Points are never modified after construction. Tree construction only
/// moves them around in storage, so each point remembers the index of the
/// record it was built from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point<D: DataClass, M: Metric> {
    pos: M::Position,
    value: D::Value,
    w: f64,
    index: usize,
}

impl<D: DataClass, M: Metric> Point<D, M> {
    pub fn new(pos: M::Position, value: D::Value, w: f64, index: usize) -> Self {
        Point {
            pos,
            value,
            w,
            index,
        }
    }

    pub fn pos(&self) -> &M::Position {
        &self.pos
    }

    pub fn value(&self) -> &D::Value {
        &self.value
    }

    pub fn w(&self) -> f64 {
        self.w
    }

    /// index of the input record this point was constructed from
    pub fn index(&self) -> usize {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin2_accumulation() {
        let mut accum = <Spin2 as DataClass>::Accum::default();
        Spin2::consume(&mut accum, &[0.1, -0.2], 2.0);
        Spin2::consume(&mut accum, &[0.3, 0.4], 1.0);
        let sum = Spin2::finish(&accum);
        assert!((sum[0] - 0.5).abs() < 1e-15);
        assert!((sum[1] - 0.0).abs() < 1e-15);
        assert_eq!(Spin2::scale(&[1.0, 2.0], 0.5), [0.5, 1.0]);
    }

    #[test]
    fn component_names_match_arity() {
        assert_eq!(Count::COMPONENT_NAMES.len(), 0);
        assert_eq!(Scalar::from_components(&[4.0]), 4.0);
        assert_eq!(Spin2::from_components(&[1.0, 2.0]), [1.0, 2.0]);
    }
}
