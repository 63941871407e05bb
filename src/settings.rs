//! Settings for the adaptive stepper

use bon::Builder;

use crate::{Float, error::Error};

#[derive(Builder, Clone, Debug, PartialEq)]
/// Settings for the adaptive second-order Euler stepper.
///
/// # Example
///
/// ```
/// use lineage_ode::Settings;
///
/// let settings = Settings::builder().epsilon(1e-8).max_step(0.05).build();
/// assert_eq!(settings.max_rejections, 1_000);
/// ```
pub struct Settings {
    /// Target bound on the local error of a single sub-step. Default is 1e-6.
    #[builder(default = 1e-6)]
    pub epsilon: Float,
    /// Maximal sub-step size. Default is 1.0.
    #[builder(default = 1.0)]
    pub max_step: Float,
    /// Step size floor. A sub-step that still fails the error test at this
    /// size aborts the call with [`Error::NotConverged`]. Default is 1e-12.
    #[builder(default = 1e-12)]
    pub min_step: Float,
    /// Safety factor in step-size growth. Default is 0.9.
    #[builder(default = 0.9)]
    pub safety_factor: Float,
    /// Upper bound on hnew/hold after an accepted step. Default is 4.0.
    #[builder(default = 4.0)]
    pub scale_max: Float,
    /// A lineage whose total probability drifts further than this from 1
    /// is rescaled, with the factor moved into the log accumulator.
    /// Default is 1e-8.
    #[builder(default = 1e-8)]
    pub renormalization_threshold: Float,
    /// Maximum number of consecutive rejections while completing one
    /// sub-step. The count restarts after every accepted sub-step; accepted
    /// sub-steps are not limited. Default is 1,000.
    #[builder(default = 1_000)]
    pub max_rejections: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::builder().build()
    }
}

impl Settings {
    /// Shorthand for the two parameters every caller sets.
    pub fn new(epsilon: Float, max_step: Float) -> Self {
        Settings::builder().epsilon(epsilon).max_step(max_step).build()
    }

    /// Check every parameter, returning the first violation.
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.epsilon > 0.0 && self.epsilon < 1.0) {
            return Err(Error::EpsilonOutOfRange(self.epsilon));
        }
        if !(self.min_step > 0.0 && self.max_step >= self.min_step) {
            return Err(Error::InvalidStepBounds {
                min_step: self.min_step,
                max_step: self.max_step,
            });
        }
        if self.safety_factor >= 1.0 || self.safety_factor <= 1e-4 || self.safety_factor.is_nan() {
            return Err(Error::SafetyFactorOutOfRange(self.safety_factor));
        }
        if !(self.scale_max > 1.0) || self.scale_max.is_infinite() {
            return Err(Error::ScaleMaxOutOfRange(self.scale_max));
        }
        if !(self.renormalization_threshold >= 0.0 && self.renormalization_threshold < 1.0) {
            return Err(Error::RenormalizationThresholdOutOfRange(
                self.renormalization_threshold,
            ));
        }
        if self.max_rejections == 0 {
            return Err(Error::MaxRejectionsMustBePositive(self.max_rejections));
        }
        Ok(())
    }
}
