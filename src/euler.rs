//! Adaptive second-order Euler stepper.
//!
//! Each sub-step of size `h` is taken twice from the same start point: once
//! as a single explicit Euler step and once as two Euler half steps. The
//! difference between the two estimates is the local error indicator, and
//! the Richardson extrapolation `2 * y_two - y_full` (the explicit midpoint
//! rule) is the accepted value. Rejected sub-steps are halved down to the
//! configured floor; accepted ones may grow the next step up to `max_step`.
//!
//! The error bound holds per sub-step only. The global error over a call is
//! larger and is not estimated.

use tracing::{trace, warn};

use crate::{
    Float,
    buffer::StateBuffer,
    error::Error,
    kernel::{Kernel, Variant},
    observer::StepObserver,
    rates::Rates,
    result::IntegrationStats,
    settings::Settings,
};

/// Object-safe interface over the monomorphized steppers, so an integrator
/// can pick its kernel at setup and keep one handle type.
pub(crate) trait Propagator: Send + Sync {
    fn variant(&self) -> Variant;

    fn settings(&self) -> &Settings;

    /// Advance `p` in place by `duration`. `p.len()` must equal
    /// `states * lineages + 1` and fit the buffers; the caller validates.
    /// On error `p` is left as it was passed in.
    fn propagate(
        &mut self,
        rates: Rates<'_>,
        lineages: usize,
        duration: Float,
        p: &mut [Float],
        observer: Option<&mut dyn StepObserver>,
    ) -> Result<IntegrationStats, Error>;
}

/// Adaptive stepper driven by kernel `K`.
pub(crate) struct Euler<K: Kernel> {
    kernel: K,
    settings: Settings,
    buffer: StateBuffer,
}

impl<K: Kernel> Euler<K> {
    pub(crate) fn new(kernel: K, settings: Settings, max_lineages: usize) -> Self {
        let buffer = StateBuffer::new(kernel.states(), max_lineages);
        Self {
            kernel,
            settings,
            buffer,
        }
    }
}

impl<K: Kernel> Propagator for Euler<K> {
    fn variant(&self) -> Variant {
        self.kernel.variant()
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn propagate(
        &mut self,
        rates: Rates<'_>,
        lineages: usize,
        duration: Float,
        p: &mut [Float],
        mut observer: Option<&mut dyn StepObserver>,
    ) -> Result<IntegrationStats, Error> {
        let mut stats = IntegrationStats::default();
        if duration == 0.0 {
            return Ok(stats);
        }

        let n = self.kernel.states();
        let len = p.len();
        let body = len - 1;
        debug_assert_eq!(len, n * lineages + 1);
        debug_assert!(len <= self.buffer.capacity());

        let kernel = &self.kernel;
        let s = &self.settings;
        let buf = &mut self.buffer;

        // Steps run on the working copy; `p` is only written on success.
        buf.y[..len].copy_from_slice(p);

        let mut elapsed: Float = 0.0;
        let mut h = duration.min(s.max_step);
        let mut rejections = 0;

        kernel.derivative(rates, lineages, &buf.y[..len], &mut buf.dp0[..len], &mut buf.sums);
        stats.nfev += 1;

        loop {
            let remaining = duration - elapsed;
            let last = h >= remaining;
            let step = if last { remaining } else { h };
            let half = 0.5 * step;

            // Two half steps from y.
            for i in 0..len {
                buf.y_half[i] = buf.y[i] + half * buf.dp0[i];
            }
            kernel.derivative(
                rates,
                lineages,
                &buf.y_half[..len],
                &mut buf.dp_half[..len],
                &mut buf.sums,
            );
            stats.nfev += 1;

            let mut err: Float = 0.0;
            let mut admissible = true;
            for i in 0..len {
                let y0 = buf.y[i];
                let y_full = y0 + step * buf.dp0[i];
                let y_two = buf.y_half[i] + half * buf.dp_half[i];
                let y = 2.0 * y_two - y_full;
                buf.y_new[i] = y;
                let sk = 1.0 + y0.abs().max(y.abs());
                err = err.max((y_two - y_full).abs() / sk);
                if !y.is_finite() || (i < body && y < -s.epsilon) {
                    admissible = false;
                }
            }
            err /= s.epsilon;

            if !(admissible && err <= 1.0) {
                stats.nrejct += 1;
                rejections += 1;
                trace!(elapsed, step, err, admissible, "sub-step rejected");
                if step <= s.min_step {
                    warn!(elapsed, step, err, "integration did not converge");
                    return Err(Error::NotConverged { elapsed, step });
                }
                if rejections >= s.max_rejections {
                    warn!(max_rejections = s.max_rejections, elapsed, step, "rejection limit exceeded");
                    return Err(Error::RejectionLimitExceeded {
                        max_rejections: s.max_rejections,
                        elapsed,
                    });
                }
                h = (0.5 * step).max(s.min_step);
                continue;
            }

            // Accepted.
            rejections = 0;
            std::mem::swap(&mut buf.y, &mut buf.y_new);
            stats.nrenorm += renormalize(&mut buf.y[..len], n, s.renormalization_threshold);
            stats.naccpt += 1;
            stats.h_max_taken = stats.h_max_taken.max(step);
            stats.h_last = step;

            let t_old = elapsed;
            elapsed = if last { duration } else { elapsed + step };
            if let Some(obs) = observer.as_mut() {
                obs.on_step(t_old, elapsed, &buf.y[..len], step);
            }
            if last || elapsed >= duration {
                break;
            }

            if err < 0.5 {
                let fac = (s.safety_factor * err.powf(-0.5)).min(s.scale_max);
                h = (step * fac.max(1.0)).min(s.max_step);
            }

            kernel.derivative(rates, lineages, &buf.y[..len], &mut buf.dp0[..len], &mut buf.sums);
            stats.nfev += 1;
        }

        p.copy_from_slice(&buf.y[..len]);
        Ok(stats)
    }
}

/// Clamp round-off negatives to zero and rescale every lineage whose total
/// probability left `1 ± threshold`, adding `ln(mass)` to the trailing
/// accumulator. Returns the number of lineages rescaled.
pub(crate) fn renormalize(p: &mut [Float], states: usize, threshold: Float) -> usize {
    let body = p.len() - 1;
    let (probs, log_norm) = p.split_at_mut(body);
    let mut count = 0;
    for lin in probs.chunks_exact_mut(states) {
        for v in lin.iter_mut() {
            if *v < 0.0 {
                *v = 0.0;
            }
        }
        let mass: Float = lin.iter().sum();
        if mass > 0.0 && (mass - 1.0).abs() > threshold {
            for v in lin.iter_mut() {
                *v /= mass;
            }
            log_norm[0] += mass.ln();
            count += 1;
        }
    }
    if count > 0 {
        trace!(count, "lineages renormalized");
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{Dynamic, Fixed};

    fn two_deme(settings: Settings) -> Euler<Fixed<2>> {
        Euler::new(Fixed::<2>, settings, 4)
    }

    #[test]
    fn zero_duration_is_a_no_op() {
        let mut e = two_deme(Settings::default());
        let m = [0.0, 0.3, 0.1, 0.0];
        let c = [1.0, 2.0];
        let rates = Rates::new(2, &m, &c).unwrap();
        let mut p = [0.25, 0.75, 0.5, 0.5, -1.5];
        let before = p;
        let stats = e.propagate(rates, 2, 0.0, &mut p, None).unwrap();
        assert_eq!(p, before);
        assert_eq!(stats.nfev, 0);
    }

    #[test]
    fn lands_exactly_on_duration() {
        let mut e = two_deme(Settings::new(1e-6, 0.3));
        let m = [0.0, 0.1, 0.1, 0.0];
        let c = [1.0, 1.0];
        let rates = Rates::new(2, &m, &c).unwrap();
        let mut p = [1.0, 0.0, 0.0];
        let mut last_t = 0.0;
        let mut observer = |_: Float, t: Float, _: &[Float], _: Float| last_t = t;
        e.propagate(rates, 1, 1.0, &mut p, Some(&mut observer)).unwrap();
        assert_eq!(last_t, 1.0);
    }

    #[test]
    fn stiff_rates_force_rejections_but_stay_non_negative() {
        let mut e = Euler::new(Dynamic::new(3), Settings::new(1e-6, 10.0), 2);
        let m = [0.0, 50.0, 5.0, 20.0, 0.0, 40.0, 1.0, 60.0, 0.0];
        let c = [3.0, 0.5, 1.0];
        let rates = Rates::new(3, &m, &c).unwrap();
        let mut p = [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let stats = e.propagate(rates, 2, 2.0, &mut p, None).unwrap();
        assert!(stats.nrejct > 0);
        assert!(p[..6].iter().all(|&v| v >= 0.0));
        for lin in p[..6].chunks_exact(3) {
            let mass: Float = lin.iter().sum();
            assert!((mass - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn renormalize_folds_mass_into_accumulator() {
        let mut p = [0.25, 0.25, 0.6, 0.4, 0.0];
        let count = renormalize(&mut p, 2, 1e-8);
        assert_eq!(count, 1);
        assert_eq!(&p[..2], &[0.5, 0.5]);
        assert!((p[4] - (0.5 as Float).ln()).abs() < 1e-15);
    }

    #[test]
    fn renormalize_clamps_round_off_negatives() {
        let mut p = [1.0, -1e-18, 0.0];
        renormalize(&mut p, 2, 1e-8);
        assert_eq!(&p[..2], &[1.0, 0.0]);
    }

    #[test]
    fn minimum_step_floor_reports_non_convergence() {
        let settings = Settings::builder()
            .epsilon(1e-12)
            .max_step(1.0)
            .min_step(0.5)
            .build();
        let mut e = two_deme(settings);
        let m = [0.0, 1000.0, 1000.0, 0.0];
        let c = [1.0, 1.0];
        let rates = Rates::new(2, &m, &c).unwrap();
        let mut p = [1.0, 0.0, 0.0];
        let err = e.propagate(rates, 1, 1.0, &mut p, None).unwrap_err();
        assert!(matches!(err, Error::NotConverged { .. }));
        assert!(err.is_numerical());
    }

    #[test]
    fn consecutive_rejections_are_capped() {
        let settings = Settings::builder().max_rejections(3).build();
        let mut e = two_deme(settings);
        let m = [0.0, 1000.0, 1000.0, 0.0];
        let c = [1.0, 1.0];
        let rates = Rates::new(2, &m, &c).unwrap();
        let mut p = [1.0, 0.0, 0.0];
        let err = e.propagate(rates, 1, 1.0, &mut p, None).unwrap_err();
        assert!(matches!(
            err,
            Error::RejectionLimitExceeded { max_rejections: 3, .. }
        ));
        assert!(err.is_numerical());
    }

    #[test]
    fn accepted_steps_do_not_count_against_the_rejection_cap() {
        let settings = Settings::builder().max_step(1e-3).max_rejections(5).build();
        let mut e = two_deme(settings);
        let m = [0.0, 0.1, 0.1, 0.0];
        let c = [1.0, 1.0];
        let rates = Rates::new(2, &m, &c).unwrap();
        let mut p = [1.0, 0.0, 0.0];
        let stats = e.propagate(rates, 1, 20.0, &mut p, None).unwrap();
        assert!(stats.naccpt >= 20_000);
        let expected = 0.5 + 0.5 * (-4.0 as Float).exp();
        assert!((p[0] - expected).abs() < 1e-6);
    }

    /// Drives the accumulator along `y' = y^2`, which blows up at `t = 1`
    /// after plenty of accepted steps.
    struct BlowUp;

    impl Kernel for BlowUp {
        fn states(&self) -> usize {
            2
        }

        fn variant(&self) -> Variant {
            Variant::Dynamic
        }

        fn derivative(
            &self,
            _rates: Rates<'_>,
            lineages: usize,
            p: &[Float],
            dp: &mut [Float],
            _sums: &mut [Float],
        ) {
            let body = 2 * lineages;
            dp[..body].fill(0.0);
            dp[body] = p[body] * p[body];
        }
    }

    #[test]
    fn failed_call_leaves_the_vector_untouched() {
        let settings = Settings::builder().max_step(0.1).min_step(1e-6).build();
        let mut e = Euler::new(BlowUp, settings, 1);
        let m = [0.0, 0.0, 0.0, 0.0];
        let c = [0.0, 0.0];
        let rates = Rates::new(2, &m, &c).unwrap();
        let mut p = [1.0, 0.0, 1.0];
        let mut accepted = 0;
        let mut observer = |_: Float, _: Float, _: &[Float], _: Float| accepted += 1;
        let err = e
            .propagate(rates, 1, 2.0, &mut p, Some(&mut observer))
            .unwrap_err();
        assert!(matches!(err, Error::NotConverged { elapsed, .. } if elapsed > 0.5 && elapsed < 1.0));
        assert!(accepted > 0);
        assert_eq!(p, [1.0, 0.0, 1.0]);

        // The instance stays usable after a failure.
        let stats = e.propagate(rates, 1, 0.5, &mut p, None).unwrap();
        assert!(stats.naccpt > 0);
        assert!((p[2] - 2.0).abs() < 1e-3);
    }
}
