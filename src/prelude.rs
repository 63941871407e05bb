//! Convenient prelude: import the most commonly used types.
//!
//! ```rust
//! use lineage_ode::prelude::*;
//! ```
//!
//! Re-exports included:
//! - The handle and its configuration: `Integrator`, `Settings`, `Variant`.
//! - Rate data: `Rates`, `RateSchedule`.
//! - Call results: `IntegrationStats`, `StepObserver`, `Error`, `ErrorKind`.
//! - The crate-wide `Float` type.

pub use crate::{
    Float,
    error::{Error, ErrorKind},
    integrator::Integrator,
    kernel::Variant,
    observer::StepObserver,
    rates::{RateSchedule, Rates},
    result::IntegrationStats,
    settings::Settings,
};
