//! Runtime-sized kernel for any number of states.

use crate::{Float, rates::Rates};

use super::{Kernel, Variant};

/// Kernel whose state count is only known at run time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dynamic {
    states: usize,
}

impl Dynamic {
    pub fn new(states: usize) -> Self {
        Self { states }
    }
}

impl Kernel for Dynamic {
    fn states(&self) -> usize {
        self.states
    }

    fn variant(&self) -> Variant {
        Variant::Dynamic
    }

    fn derivative(
        &self,
        rates: Rates<'_>,
        lineages: usize,
        p: &[Float],
        dp: &mut [Float],
        sums: &mut [Float],
    ) {
        let n = self.states;
        let body = n * lineages;
        let m = rates.migration;
        let c = rates.coalescent;

        sums.fill(0.0);
        for lin in p[..body].chunks_exact(n) {
            for j in 0..n {
                sums[j] += lin[j];
            }
        }

        let mut log_rate = 0.0;
        for (lin, d) in p[..body].chunks_exact(n).zip(dp[..body].chunks_exact_mut(n)) {
            let mut coal = 0.0;
            for j in 0..n {
                coal += c[j] * (sums[j] - lin[j]) * lin[j];
            }
            for j in 0..n {
                d[j] = lin[j] * (coal - c[j] * (sums[j] - lin[j]));
            }
            for j in 0..n {
                for k in j + 1..n {
                    let migrates = lin[k] * m[k * n + j] - lin[j] * m[j * n + k];
                    d[j] += migrates;
                    d[k] -= migrates;
                }
            }
            log_rate += coal;
        }
        dp[body] = -0.5 * log_rate;
    }
}
