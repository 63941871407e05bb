//! Const-generic kernel for small state counts.
//!
//! Rates and per-lineage values are copied into stack arrays of length
//! `N`, so every inner loop has a compile-time trip count and is unrolled
//! by the optimizer. The arithmetic is performed in the same order as
//! [`super::Dynamic`].

use crate::{Float, rates::Rates};

use super::{Kernel, Variant};

/// Kernel specialised for exactly `N` states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Fixed<const N: usize>;

impl<const N: usize> Kernel for Fixed<N> {
    fn states(&self) -> usize {
        N
    }

    fn variant(&self) -> Variant {
        Variant::Fixed(N)
    }

    fn derivative(
        &self,
        rates: Rates<'_>,
        lineages: usize,
        p: &[Float],
        dp: &mut [Float],
        _sums: &mut [Float],
    ) {
        let body = N * lineages;

        let mut m = [[0.0; N]; N];
        for (row, src) in m.iter_mut().zip(rates.migration.chunks_exact(N)) {
            row.copy_from_slice(src);
        }
        let mut c = [0.0; N];
        c.copy_from_slice(rates.coalescent);

        let mut sums = [0.0; N];
        for lin in p[..body].chunks_exact(N) {
            for j in 0..N {
                sums[j] += lin[j];
            }
        }

        let mut log_rate = 0.0;
        for (lin, d) in p[..body].chunks_exact(N).zip(dp[..body].chunks_exact_mut(N)) {
            let mut x = [0.0; N];
            x.copy_from_slice(lin);

            let mut coal = 0.0;
            for j in 0..N {
                coal += c[j] * (sums[j] - x[j]) * x[j];
            }
            let mut out = [0.0; N];
            for j in 0..N {
                out[j] = x[j] * (coal - c[j] * (sums[j] - x[j]));
            }
            for j in 0..N {
                for k in j + 1..N {
                    let migrates = x[k] * m[k][j] - x[j] * m[j][k];
                    out[j] += migrates;
                    out[k] -= migrates;
                }
            }
            d.copy_from_slice(&out);
            log_rate += coal;
        }
        dp[body] = -0.5 * log_rate;
    }
}
