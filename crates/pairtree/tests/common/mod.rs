// the reason this is named mod.rs has to do with some complexities of how
// testing is handled
//
// we are following the advice of the rust book
// https://doc.rust-lang.org/book/ch11-03-test-organization.html#submodules-in-integration-tests

#![allow(dead_code)]

use core::f64::consts::PI;
use pairtree::Catalog;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

// based on numpy!
// https://numpy.org/doc/stable/reference/generated/numpy.isclose.html
pub fn isclose(actual: f64, ref_val: f64, rtol: f64, atol: f64) -> bool {
    let actual_nan = actual.is_nan();
    let ref_nan = ref_val.is_nan();
    if actual_nan || ref_nan {
        actual_nan && ref_nan
    } else {
        (actual - ref_val).abs() <= (atol + rtol * ref_val.abs())
    }
}

/// installs a subscriber so that `RUST_LOG=pairtree=debug cargo test` shows
/// the build logs
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A randomly generated catalog. Every array has the same length.
pub struct RandomCatalog {
    pub c0: Vec<f64>,
    pub c1: Vec<f64>,
    pub k: Vec<f64>,
    pub g1: Vec<f64>,
    pub g2: Vec<f64>,
    pub w: Vec<f64>,
}

impl RandomCatalog {
    fn generate(
        n: usize,
        seed: u64,
        mut position: impl FnMut(&mut Xoshiro256PlusPlus) -> (f64, f64),
    ) -> Self {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut out = RandomCatalog {
            c0: Vec::with_capacity(n),
            c1: Vec::with_capacity(n),
            k: Vec::with_capacity(n),
            g1: Vec::with_capacity(n),
            g2: Vec::with_capacity(n),
            w: Vec::with_capacity(n),
        };
        for _ in 0..n {
            let (c0, c1) = position(&mut rng);
            out.c0.push(c0);
            out.c1.push(c1);
            out.k.push(rng.random_range(-1.0..1.0));
            out.g1.push(rng.random_range(-0.3..0.3));
            out.g2.push(rng.random_range(-0.3..0.3));
            out.w.push(rng.random_range(0.5..2.0));
        }
        out
    }

    /// positions uniformly distributed over `[0, width) x [0, width)`
    pub fn flat(n: usize, width: f64, seed: u64) -> Self {
        Self::generate(n, seed, |rng| {
            (rng.random_range(0.0..width), rng.random_range(0.0..width))
        })
    }

    /// positions (in radians) uniformly distributed over a patch of the
    /// sphere centered on the equator
    pub fn sphere(n: usize, half_width: f64, seed: u64) -> Self {
        assert!(half_width < PI / 2.0);
        Self::generate(n, seed, |rng| {
            (
                rng.random_range(-half_width..half_width),
                rng.random_range(-half_width..half_width),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.c0.len()
    }

    pub fn weighted_catalog(&self) -> Catalog<'_> {
        Catalog::from_slices(&self.c0, &self.c1).with_weight_slice(&self.w)
    }

    pub fn scalar_catalog(&self) -> Catalog<'_> {
        self.weighted_catalog().with_value_slice(&self.k)
    }

    pub fn spin2_catalog(&self) -> Catalog<'_> {
        self.weighted_catalog()
            .with_value_slice(&self.g1)
            .with_value_slice(&self.g2)
    }

    /// the sum of the weights, in input order
    pub fn total_weight(&self) -> f64 {
        self.w.iter().sum()
    }
}
