//! Hook executed after each accepted sub-step.

use crate::Float;

/// Observer of accepted sub-steps.
///
/// Called once per accepted sub-step with the sub-step start `t_old` and
/// end `t` (both relative to the start of the call), the probability
/// vector at `t` after renormalization, and the step size `h`. Observers
/// cannot alter or stop the integration.
///
/// Any `FnMut(Float, Float, &[Float], Float)` closure is an observer; annotate
/// the slice parameter so the closure accepts any lifetime:
///
/// ```
/// use lineage_ode::{Float, Integrator, Settings};
///
/// let mut integrator = Integrator::setup(1, 2, Settings::new(1e-6, 0.1)).unwrap();
/// integrator.init(&[0.0, 0.1, 0.1, 0.0], &[1.0, 1.0], 1).unwrap();
///
/// let mut p = [1.0, 0.0, 0.0];
/// let mut largest: Float = 0.0;
/// let mut steps = 0;
/// integrator
///     .calculate_values_observed(1.0, &mut p, &mut |_: Float, _: Float, _: &[Float], h: Float| {
///         largest = largest.max(h);
///         steps += 1;
///     })
///     .unwrap();
/// assert!(steps >= 10);
/// assert!(largest <= 0.1);
/// ```
pub trait StepObserver {
    fn on_step(&mut self, t_old: Float, t: Float, p: &[Float], h: Float);
}

impl<F> StepObserver for F
where
    F: FnMut(Float, Float, &[Float], Float),
{
    fn on_step(&mut self, t_old: Float, t: Float, p: &[Float], h: Float) {
        (*self)(t_old, t, p, h)
    }
}
