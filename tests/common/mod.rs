//! Shared problem builders and a fixed-step reference integrator.

#![allow(dead_code)]

use lineage_ode::Float;
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Rates, lineage count and starting vector for one test case.
#[derive(Clone, Debug)]
pub struct Problem {
    pub states: usize,
    pub lineages: usize,
    pub migration: Vec<Float>,
    pub coalescent: Vec<Float>,
    pub p0: Vec<Float>,
}

impl Problem {
    /// Seeded random rates and normalized lineage probabilities.
    pub fn random(states: usize, lineages: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut migration = vec![0.0; states * states];
        for from in 0..states {
            for to in 0..states {
                if from != to {
                    migration[from * states + to] = rng.random_range(0.0..0.5);
                }
            }
        }
        let coalescent = (0..states).map(|_| rng.random_range(0.1..2.0)).collect();

        let mut p0 = vec![0.0; states * lineages + 1];
        for lin in p0[..states * lineages].chunks_exact_mut(states) {
            for v in lin.iter_mut() {
                *v = rng.random_range(0.01..1.0);
            }
            let total: Float = lin.iter().sum();
            for v in lin.iter_mut() {
                *v /= total;
            }
        }
        Self {
            states,
            lineages,
            migration,
            coalescent,
            p0,
        }
    }

    /// Symmetric two-state problem with every lineage starting in state 0.
    pub fn two_deme(migration: Float, coalescent: Float, lineages: usize) -> Self {
        let mut p0 = vec![0.0; 2 * lineages + 1];
        for i in 0..lineages {
            p0[2 * i] = 1.0;
        }
        Self {
            states: 2,
            lineages,
            migration: vec![0.0, migration, migration, 0.0],
            coalescent: vec![coalescent, coalescent],
            p0,
        }
    }

    pub fn reference(&self, duration: Float, steps: usize) -> Vec<Float> {
        rk4_reference(self, duration, steps)
    }
}

/// Master equation written out term by term.
pub fn master_equation(problem: &Problem, p: &[Float], dp: &mut [Float]) {
    let n = problem.states;
    let m = |from: usize, to: usize| problem.migration[from * n + to];
    let c = &problem.coalescent;

    let sums: Vec<Float> = (0..n)
        .map(|j| (0..problem.lineages).map(|i| p[i * n + j]).sum())
        .collect();

    let mut total_coal = 0.0;
    for i in 0..problem.lineages {
        let pi: Float = (0..n)
            .map(|j| c[j] * (sums[j] - p[i * n + j]) * p[i * n + j])
            .sum();
        total_coal += pi;
        for j in 0..n {
            let x = p[i * n + j];
            let inflow: Float = (0..n).filter(|&k| k != j).map(|k| p[i * n + k] * m(k, j)).sum();
            let outflow: Float = (0..n).filter(|&k| k != j).map(|k| x * m(j, k)).sum();
            dp[i * n + j] = inflow - outflow + x * (pi - c[j] * (sums[j] - x));
        }
    }
    dp[n * problem.lineages] = -0.5 * total_coal;
}

/// Classical RK4 with `steps` equal steps.
pub fn rk4_reference(problem: &Problem, duration: Float, steps: usize) -> Vec<Float> {
    let len = problem.p0.len();
    let h = duration / steps as Float;
    let mut y = problem.p0.clone();
    let mut k1 = vec![0.0; len];
    let mut k2 = vec![0.0; len];
    let mut k3 = vec![0.0; len];
    let mut k4 = vec![0.0; len];
    let mut yt = vec![0.0; len];

    for _ in 0..steps {
        master_equation(problem, &y, &mut k1);
        for i in 0..len {
            yt[i] = y[i] + 0.5 * h * k1[i];
        }
        master_equation(problem, &yt, &mut k2);
        for i in 0..len {
            yt[i] = y[i] + 0.5 * h * k2[i];
        }
        master_equation(problem, &yt, &mut k3);
        for i in 0..len {
            yt[i] = y[i] + h * k3[i];
        }
        master_equation(problem, &yt, &mut k4);
        for i in 0..len {
            y[i] += h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
        }
    }
    y
}

pub fn max_abs_diff(a: &[Float], b: &[Float]) -> Float {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, Float::max)
}
