//! Counters reported by an integration call.

use crate::Float;

/// Work done by one call that advanced a probability vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IntegrationStats {
    /// The number of derivative evaluations
    pub nfev: usize,
    /// The number of accepted sub-steps
    pub naccpt: usize,
    /// The number of rejected sub-steps
    pub nrejct: usize,
    /// The number of lineage renormalizations folded into the log accumulator
    pub nrenorm: usize,
    /// The largest accepted sub-step
    pub h_max_taken: Float,
    /// The last accepted sub-step
    pub h_last: Float,
}

impl IntegrationStats {
    /// Total sub-step attempts.
    pub fn nstep(&self) -> usize {
        self.naccpt + self.nrejct
    }

    /// Fold the counters of a later call into these.
    pub fn merge(&mut self, other: &IntegrationStats) {
        self.nfev += other.nfev;
        self.naccpt += other.naccpt;
        self.nrejct += other.nrejct;
        self.nrenorm += other.nrenorm;
        self.h_max_taken = self.h_max_taken.max(other.h_max_taken);
        if other.naccpt > 0 {
            self.h_last = other.h_last;
        }
    }
}
