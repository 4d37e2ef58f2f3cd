/*!
Internal machinery for building the spatial trees used to estimate
two-point statistics.

This crate holds the tree core: coordinate systems ([`Metric`]), the
observables carried by points ([`DataClass`]), the strategies for
partitioning points ([`SplitMethod`]) and the recursive construction of
[`Cell`]s. Input validation, configuration and the public container type
live in the `pairtree` crate.

Errors reported by this crate are `&'static str`. They indicate violated
invariants (i.e. bugs), not bad input: the public crate validates
everything before a build starts.
*/

mod cell;
mod data;
mod executor;
mod metric;
mod split;
mod sum;

pub use cell::{Aggregate, BuildParams, Cell, CellIter, build_forest};
pub use data::{Count, DataClass, DataKind, Point, Scalar, Spin2};
pub use executor::{Executor, SerialExecutor};
pub use metric::{CoordSystem, Coords, Flat, Metric, Position, Sphere};
pub use split::SplitMethod;
pub use sum::NeumaierSum;
