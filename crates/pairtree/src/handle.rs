//! The flat entry points for building fields behind an opaque handle.
//!
//! Each combination of data class & coordinate system gets its own
//! constructor. They all produce a [`FieldHandle`], which can be inspected,
//! downcast to the concrete [`Field`] & finally released with [`destroy`].
//!
//! The weights are always optional. When they are omitted, every object has
//! a weight of 1.

use crate::config::FieldConfig;
use crate::error::Error;
use crate::field::{Catalog, Field};
use pairtree_internal::{Count, CoordSystem, DataKind, Flat, Scalar, Sphere, Spin2};
use tracing::debug;

#[derive(Debug)]
enum AnyField {
    CountFlat(Field<Count, Flat>),
    CountSphere(Field<Count, Sphere>),
    ScalarFlat(Field<Scalar, Flat>),
    ScalarSphere(Field<Scalar, Sphere>),
    Spin2Flat(Field<Spin2, Flat>),
    Spin2Sphere(Field<Spin2, Sphere>),
}

// dispatch an expression over every variant of AnyField
macro_rules! with_field {
    ($any:expr, $f:ident => $body:expr) => {
        match $any {
            AnyField::CountFlat($f) => $body,
            AnyField::CountSphere($f) => $body,
            AnyField::ScalarFlat($f) => $body,
            AnyField::ScalarSphere($f) => $body,
            AnyField::Spin2Flat($f) => $body,
            AnyField::Spin2Sphere($f) => $body,
        }
    };
}

/// An owned, type-erased [`Field`].
#[derive(Debug)]
pub struct FieldHandle {
    field: AnyField,
}

mod sealed {
    pub trait Sealed {}
}

/// Implemented by the `(data class, metric)` pairs that a [`FieldHandle`]
/// can hold. This trait is sealed.
pub trait FieldVariant: sealed::Sealed {
    type Data: pairtree_internal::DataClass;
    type Metric: pairtree_internal::Metric;

    #[doc(hidden)]
    fn wrap(field: Field<Self::Data, Self::Metric>) -> FieldHandle;

    #[doc(hidden)]
    fn get(handle: &FieldHandle) -> Option<&Field<Self::Data, Self::Metric>>;
}

macro_rules! impl_field_variant {
    ($data:ty, $metric:ty, $variant:ident) => {
        impl sealed::Sealed for ($data, $metric) {}

        impl FieldVariant for ($data, $metric) {
            type Data = $data;
            type Metric = $metric;

            fn wrap(field: Field<$data, $metric>) -> FieldHandle {
                FieldHandle {
                    field: AnyField::$variant(field),
                }
            }

            fn get(handle: &FieldHandle) -> Option<&Field<$data, $metric>> {
                match handle.field {
                    AnyField::$variant(ref field) => Some(field),
                    _ => None,
                }
            }
        }
    };
}

impl_field_variant!(Count, Flat, CountFlat);
impl_field_variant!(Count, Sphere, CountSphere);
impl_field_variant!(Scalar, Flat, ScalarFlat);
impl_field_variant!(Scalar, Sphere, ScalarSphere);
impl_field_variant!(Spin2, Flat, Spin2Flat);
impl_field_variant!(Spin2, Sphere, Spin2Sphere);

impl FieldHandle {
    /// the number of top-level cells
    pub fn n_top(&self) -> usize {
        with_field!(&self.field, f => f.n_top())
    }

    pub fn n_obj(&self) -> usize {
        with_field!(&self.field, f => f.n_obj())
    }

    pub fn total_weight(&self) -> f64 {
        with_field!(&self.field, f => f.total_weight())
    }

    pub fn data_kind(&self) -> DataKind {
        match self.field {
            AnyField::CountFlat(_) | AnyField::CountSphere(_) => DataKind::Count,
            AnyField::ScalarFlat(_) | AnyField::ScalarSphere(_) => DataKind::Scalar,
            AnyField::Spin2Flat(_) | AnyField::Spin2Sphere(_) => DataKind::Spin2,
        }
    }

    pub fn coord_system(&self) -> CoordSystem {
        match self.field {
            AnyField::CountFlat(_) | AnyField::ScalarFlat(_) | AnyField::Spin2Flat(_) => {
                CoordSystem::Flat
            }
            AnyField::CountSphere(_) | AnyField::ScalarSphere(_) | AnyField::Spin2Sphere(_) => {
                CoordSystem::Sphere
            }
        }
    }

    /// Access the concrete field, e.g. `handle.field::<(Scalar, Flat)>()`.
    ///
    /// Returns `None` when the handle holds a different combination.
    pub fn field<V: FieldVariant>(&self) -> Option<&Field<V::Data, V::Metric>> {
        V::get(self)
    }
}

fn build<V: FieldVariant>(
    catalog: Catalog,
    nobj: usize,
    config: &FieldConfig,
) -> Result<FieldHandle, Error> {
    Field::<V::Data, V::Metric>::new(&catalog, nobj, config).map(V::wrap)
}

fn catalog<'a>(c0: &'a [f64], c1: &'a [f64], w: Option<&'a [f64]>) -> Catalog<'a> {
    let catalog = Catalog::from_slices(c0, c1);
    match w {
        Some(w) => catalog.with_weight_slice(w),
        None => catalog,
    }
}

/// Build a count field from cartesian positions
pub fn build_count_field_flat(
    x: &[f64],
    y: &[f64],
    w: Option<&[f64]>,
    nobj: usize,
    config: &FieldConfig,
) -> Result<FieldHandle, Error> {
    build::<(Count, Flat)>(catalog(x, y, w), nobj, config)
}

/// Build a count field from angular positions (in `config.angle_unit()`)
pub fn build_count_field_sphere(
    ra: &[f64],
    dec: &[f64],
    w: Option<&[f64]>,
    nobj: usize,
    config: &FieldConfig,
) -> Result<FieldHandle, Error> {
    build::<(Count, Sphere)>(catalog(ra, dec, w), nobj, config)
}

pub fn build_scalar_field_flat(
    x: &[f64],
    y: &[f64],
    k: &[f64],
    w: Option<&[f64]>,
    nobj: usize,
    config: &FieldConfig,
) -> Result<FieldHandle, Error> {
    build::<(Scalar, Flat)>(catalog(x, y, w).with_value_slice(k), nobj, config)
}

pub fn build_scalar_field_sphere(
    ra: &[f64],
    dec: &[f64],
    k: &[f64],
    w: Option<&[f64]>,
    nobj: usize,
    config: &FieldConfig,
) -> Result<FieldHandle, Error> {
    build::<(Scalar, Sphere)>(catalog(ra, dec, w).with_value_slice(k), nobj, config)
}

pub fn build_spin2_field_flat(
    x: &[f64],
    y: &[f64],
    g1: &[f64],
    g2: &[f64],
    w: Option<&[f64]>,
    nobj: usize,
    config: &FieldConfig,
) -> Result<FieldHandle, Error> {
    let catalog = catalog(x, y, w).with_value_slice(g1).with_value_slice(g2);
    build::<(Spin2, Flat)>(catalog, nobj, config)
}

/// Build a spin-2 field from angular positions.
///
/// The shear components are aggregated as plain weighted sums (they are
/// not parallel-transported to the centroid of a cell).
pub fn build_spin2_field_sphere(
    ra: &[f64],
    dec: &[f64],
    g1: &[f64],
    g2: &[f64],
    w: Option<&[f64]>,
    nobj: usize,
    config: &FieldConfig,
) -> Result<FieldHandle, Error> {
    let catalog = catalog(ra, dec, w).with_value_slice(g1).with_value_slice(g2);
    build::<(Spin2, Sphere)>(catalog, nobj, config)
}

/// Release a field & everything it owns.
pub fn destroy(handle: FieldHandle) {
    debug!(
        data = handle.data_kind().name(),
        coords = handle.coord_system().name(),
        n_obj = handle.n_obj(),
        "destroying field"
    );
    drop(handle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldBuilder;

    #[test]
    fn downcast() {
        let config = FieldBuilder::new().separation(1.0, 10.0).b(0.1).build().unwrap();
        let x = [0.0, 3.0];
        let k = [1.0, 2.0];
        let handle = build_scalar_field_flat(&x, &x, &k, None, 2, &config).unwrap();
        assert_eq!(handle.data_kind(), DataKind::Scalar);
        assert_eq!(handle.coord_system(), CoordSystem::Flat);
        assert!(handle.field::<(Scalar, Sphere)>().is_none());
        assert!(handle.field::<(Count, Flat)>().is_none());
        let field = handle.field::<(Scalar, Flat)>().unwrap();
        assert_eq!(field.cells()[0].wsum(), &3.0);
        destroy(handle);
    }
}
