/*!
Builds hierarchical spatial indices (ball trees) over catalogs of points,
for accelerating the estimation of two-point statistics.

# Overview

A [`Field`] owns a catalog of points & a forest of [`Cell`]s built over
them. Each point carries a position, a non-negative weight & (depending on
the data class) an observable:
- [`Count`]: nothing (only positions & weights matter)
- [`Scalar`]: a single real value, `k`
- [`Spin2`]: a 2-component value, `(g1, g2)`

Positions are either cartesian ([`Flat`]) or angular ([`Sphere`]).

Every cell records the weighted centroid of its points, their total
weight, the weighted sum of their observables & its size (the largest
distance from the centroid to any of its points). Cells are split
recursively until they are small relative to the separations of interest,
which is controlled by the separation range & the accuracy knob `b` of a
[`FieldConfig`].

```
use pairtree::{Catalog, Count, Field, FieldBuilder, Flat};

let config = FieldBuilder::new()
    .separation(1.0, 10.0)
    .b(0.1)
    .build()
    .unwrap();
let x = [0.0, 4.0, 8.0];
let y = [0.0, 3.0, 0.0];
let field = Field::<Count, Flat>::new(&Catalog::from_slices(&x, &y), 3, &config).unwrap();
assert_eq!(field.total_weight(), 3.0);
```

The flat constructors (e.g. [`build_scalar_field_flat`]) produce a
type-erased [`FieldHandle`] instead.

# Developer Guide

The tree machinery itself lives in [`pairtree_internal`]. This crate holds
input validation, configuration & the rayon backend.

*/

#![deny(rustdoc::broken_intra_doc_links)]

mod config;
mod error;
mod executor;
mod field;
mod handle;

pub use config::{
    AngleUnit, DEFAULT_PARALLEL_THRESHOLD, DEFAULT_SEED, FieldBuilder, FieldConfig,
};
pub use error::{Error, ErrorCategory};
pub use executor::RayonExecutor;
pub use field::{Catalog, Field};
pub use handle::{
    FieldHandle, FieldVariant, build_count_field_flat, build_count_field_sphere,
    build_scalar_field_flat, build_scalar_field_sphere, build_spin2_field_flat,
    build_spin2_field_sphere, destroy,
};
pub use pairtree_internal::{
    Aggregate, Cell, CellIter, CoordSystem, Coords, Count, DataClass, DataKind, Executor, Flat,
    Metric, Point, Position, Scalar, SerialExecutor, Sphere, Spin2, SplitMethod,
};
