//! Right-hand side of the structured-coalescent master equation.
//!
//! For lineage `i` in state `j`, with `S_j` the summed probability of all
//! lineages being in state `j`:
//!
//! ```text
//! pi_i    = sum_j C_j (S_j - p_ij) p_ij
//! dp_ij   = p_ij (pi_i - C_j (S_j - p_ij))
//!         + sum_{k != j} (p_ik M_kj - p_ij M_jk)
//! dp_last = -1/2 sum_i pi_i
//! ```
//!
//! The lineage probabilities are kept conditional on no coalescence having
//! happened; the trailing entry accumulates the log-probability of that
//! condition.

mod dynamic;
mod fixed;

pub use dynamic::Dynamic;
pub use fixed::Fixed;

use crate::{Float, rates::Rates};

/// Evaluates `dp/dt` for a probability vector.
///
/// Implementations must agree to floating-point accuracy; they differ only
/// in how the state dimension is known (compile time or run time).
pub trait Kernel: Send + Sync {
    /// Number of states this kernel handles.
    fn states(&self) -> usize;

    fn variant(&self) -> Variant;

    /// Fill `dp[..states * lineages + 1]` with the derivative at `p`.
    /// `sums` is scratch storage of length `states`.
    fn derivative(
        &self,
        rates: Rates<'_>,
        lineages: usize,
        p: &[Float],
        dp: &mut [Float],
        sums: &mut [Float],
    );
}

/// Which implementation an integrator selected at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Const-generic kernel for the given state count.
    Fixed(usize),
    /// Runtime-sized kernel.
    Dynamic,
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINEAGES: usize = 3;

    fn rates_for(states: usize) -> (Vec<Float>, Vec<Float>) {
        let mut migration = vec![0.0; states * states];
        for from in 0..states {
            for to in 0..states {
                if from != to {
                    migration[from * states + to] = 0.05 * (1 + from + 2 * to) as Float;
                }
            }
        }
        let coalescent = (0..states).map(|j| 0.5 + 0.25 * j as Float).collect();
        (migration, coalescent)
    }

    fn probabilities(states: usize) -> Vec<Float> {
        let mut p = vec![0.0; states * LINEAGES + 1];
        for i in 0..LINEAGES {
            let lin = &mut p[i * states..(i + 1) * states];
            let total: Float = (0..states).map(|j| (1 + (i + j) % states) as Float).sum();
            for (j, v) in lin.iter_mut().enumerate() {
                *v = (1 + (i + j) % states) as Float / total;
            }
        }
        p
    }

    fn both<const N: usize>() -> (Vec<Float>, Vec<Float>) {
        let (migration, coalescent) = rates_for(N);
        let rates = Rates::new(N, &migration, &coalescent).unwrap();
        let p = probabilities(N);
        let mut sums = vec![0.0; N];
        let mut fixed = vec![0.0; p.len()];
        let mut dynamic = vec![0.0; p.len()];
        Fixed::<N>.derivative(rates, LINEAGES, &p, &mut fixed, &mut sums);
        Dynamic::new(N).derivative(rates, LINEAGES, &p, &mut dynamic, &mut sums);
        (fixed, dynamic)
    }

    #[test]
    fn fixed_and_dynamic_derivatives_agree() {
        fn check((a, b): (Vec<Float>, Vec<Float>)) {
            for (x, y) in a.iter().zip(&b) {
                assert!((x - y).abs() <= 1e-14, "{x} != {y}");
            }
        }
        check(both::<2>());
        check(both::<3>());
        check(both::<4>());
        check(both::<5>());
        check(both::<6>());
        check(both::<7>());
        check(both::<8>());
        check(both::<9>());
        check(both::<10>());
    }

    #[test]
    fn lineage_mass_is_conserved_by_the_derivative() {
        let (dp, _) = both::<4>();
        for lin in dp[..4 * LINEAGES].chunks_exact(4) {
            let total: Float = lin.iter().sum();
            assert!(total.abs() < 1e-12, "lineage derivative sums to {total}");
        }
        assert!(dp[4 * LINEAGES] < 0.0);
    }

    #[test]
    fn single_lineage_never_coalesces() {
        let migration = [0.0, 0.1, 0.1, 0.0];
        let coalescent = [1.0, 1.0];
        let rates = Rates::new(2, &migration, &coalescent).unwrap();
        let p = [1.0, 0.0, 0.0];
        let mut dp = [0.0; 3];
        let mut sums = [0.0; 2];
        Fixed::<2>.derivative(rates, 1, &p, &mut dp, &mut sums);
        assert_eq!(dp[0], -0.1);
        assert_eq!(dp[1], 0.1);
        assert_eq!(dp[2], 0.0);
    }

    #[test]
    fn co_located_pair_coalesces_at_the_state_rate() {
        let migration = [0.0; 4];
        let coalescent = [2.0, 1.0];
        let rates = Rates::new(2, &migration, &coalescent).unwrap();
        let p = [1.0, 0.0, 1.0, 0.0, 0.0];
        let mut dp = [0.0; 5];
        let mut sums = [0.0; 2];
        Dynamic::new(2).derivative(rates, 2, &p, &mut dp, &mut sums);
        assert_eq!(&dp[..4], &[0.0; 4]);
        assert_eq!(dp[4], -2.0);
    }
}
