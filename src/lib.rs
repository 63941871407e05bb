//! Adaptive second-order integrator for structured-coalescent lineage state
//! probabilities.
//!
//! An [`Integrator`] advances the vector `p` of per-lineage state
//! probabilities (plus a trailing log-normalization entry) under migration
//! between states and coalescence within states. Rates can be installed
//! directly with [`Integrator::init`] or looked up per epoch from a
//! [`RateSchedule`].

mod buffer;
mod error;
mod euler;
mod integrator;
mod kernel;
mod observer;
mod rates;
mod result;
mod settings;

pub mod prelude;

#[cfg(feature = "python")]
mod python;

pub use error::{Error, ErrorKind};
pub use integrator::Integrator;
pub use kernel::Variant;
pub use observer::StepObserver;
pub use rates::{RateSchedule, Rates};
pub use result::IntegrationStats;
pub use settings::Settings;

// Prevent selecting two incompatible float precision features at once.
#[cfg(all(feature = "f32", feature = "f64"))]
compile_error!(
    "features 'f32' and 'f64' cannot both be enabled; pick exactly one Float precision feature"
);

/// Floating-point type used throughout; `f64` unless the `f32` feature is on.
#[cfg(feature = "f32")]
pub type Float = f32;
#[cfg(not(feature = "f32"))]
pub type Float = f64;
