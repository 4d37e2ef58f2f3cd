/// A running sum that tracks the low-order bits lost to roundoff
/// (Neumaier's variant of Kahan summation).
///
/// Cell aggregates are accumulated with this type so that the totals are
/// insensitive (to within a couple ulps) to the order that points happen to
/// be stored in after partitioning.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NeumaierSum {
    sum: f64,
    compensation: f64,
}

impl NeumaierSum {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn add(&mut self, val: f64) {
        let t = self.sum + val;
        if self.sum.abs() >= val.abs() {
            self.compensation += (self.sum - t) + val;
        } else {
            self.compensation += (val - t) + self.sum;
        }
        self.sum = t;
    }

    #[inline(always)]
    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}
