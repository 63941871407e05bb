//! Errors for the lineage-state integrator

use crate::Float;

/// Broad classification of an [`Error`].
///
/// Configuration errors are detected at the call boundary before any
/// integration happens. Numerical errors are raised from inside an
/// integration call when the adaptive stepper cannot make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Numerical,
}

/// Errors returned by the integrator entry points.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Fewer than two states were requested.
    UnsupportedStates(usize),
    /// `max_lineages` must be at least one.
    ZeroLineageCapacity,
    EpsilonOutOfRange(Float),
    /// `min_step` must be positive and not larger than `max_step`.
    InvalidStepBounds { min_step: Float, max_step: Float },
    SafetyFactorOutOfRange(Float),
    ScaleMaxOutOfRange(Float),
    RenormalizationThresholdOutOfRange(Float),
    MaxRejectionsMustBePositive(usize),
    MigrationLength { expected: usize, got: usize },
    CoalescentLength { expected: usize, got: usize },
    IndicatorLength { expected: usize, got: usize },
    EndTimesLength { expected: usize, got: usize },
    /// A rate is negative, NaN or infinite.
    InvalidRate { index: usize, value: Float },
    EmptySchedule,
    /// Epoch end times must be non-decreasing.
    UnorderedEpochs { index: usize },
    TooManyLineages { lineages: usize, max_lineages: usize },
    /// Probability vector length does not equal `states * lineages + 1`.
    VectorLength { expected: usize, got: usize },
    NonFiniteProbability { index: usize, value: Float },
    InvalidDuration(Float),
    InvalidStartTime(Float),
    RatesNotInitialized,
    NoSchedule,
    /// The local error could not be brought under tolerance at the
    /// minimum step size.
    NotConverged { elapsed: Float, step: Float },
    /// A single sub-step was rejected `max_rejections` times in a row.
    RejectionLimitExceeded { max_rejections: usize, elapsed: Float },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotConverged { .. } | Error::RejectionLimitExceeded { .. } => ErrorKind::Numerical,
            _ => ErrorKind::Configuration,
        }
    }

    pub fn is_numerical(&self) -> bool {
        self.kind() == ErrorKind::Numerical
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnsupportedStates(v) => write!(f, "states must be at least 2 (got {})", v),
            Error::ZeroLineageCapacity => write!(f, "max_lineages must be positive"),
            Error::EpsilonOutOfRange(v) => write!(f, "epsilon must be in (0, 1) (got {})", v),
            Error::InvalidStepBounds { min_step, max_step } => write!(
                f,
                "step bounds must satisfy 0 < min_step <= max_step (got min_step = {}, max_step = {})",
                min_step, max_step
            ),
            Error::SafetyFactorOutOfRange(v) => write!(f, "safety_factor must be in (1e-4, 1.0) (got {})", v),
            Error::ScaleMaxOutOfRange(v) => write!(f, "scale_max must be greater than 1 (got {})", v),
            Error::RenormalizationThresholdOutOfRange(v) => {
                write!(f, "renormalization_threshold must be in [0, 1) (got {})", v)
            }
            Error::MaxRejectionsMustBePositive(v) => write!(f, "max_rejections must be positive (got {})", v),
            Error::MigrationLength { expected, got } => {
                write!(f, "migration rates must have {} entries (got {})", expected, got)
            }
            Error::CoalescentLength { expected, got } => {
                write!(f, "coalescent rates must have {} entries (got {})", expected, got)
            }
            Error::IndicatorLength { expected, got } => {
                write!(f, "rate indicators must have {} entries (got {})", expected, got)
            }
            Error::EndTimesLength { expected, got } => {
                write!(f, "epoch end times must have {} entries (got {})", expected, got)
            }
            Error::InvalidRate { index, value } => {
                write!(f, "rate at index {} must be finite and non-negative (got {})", index, value)
            }
            Error::EmptySchedule => write!(f, "rate schedule must contain at least one epoch"),
            Error::UnorderedEpochs { index } => {
                write!(f, "epoch end time at index {} is earlier than its predecessor", index)
            }
            Error::TooManyLineages { lineages, max_lineages } => {
                write!(f, "lineages ({}) exceeds max_lineages ({})", lineages, max_lineages)
            }
            Error::VectorLength { expected, got } => {
                write!(f, "probability vector must have {} entries (got {})", expected, got)
            }
            Error::NonFiniteProbability { index, value } => {
                write!(f, "probability vector entry {} is not finite (got {})", index, value)
            }
            Error::InvalidDuration(v) => write!(f, "duration must be finite and non-negative (got {})", v),
            Error::InvalidStartTime(v) => write!(f, "start time must be finite (got {})", v),
            Error::RatesNotInitialized => write!(f, "rates must be installed with init before integrating"),
            Error::NoSchedule => write!(f, "no rate schedule installed; call set_up_dynamics first"),
            Error::NotConverged { elapsed, step } => write!(
                f,
                "integration did not converge at t = {} (step {} reached the minimum step size)",
                elapsed, step
            ),
            Error::RejectionLimitExceeded { max_rejections, elapsed } => write!(
                f,
                "sub-step rejected {} times in a row (stopped at t = {})",
                max_rejections, elapsed
            ),
        }
    }
}

impl std::error::Error for Error {}
