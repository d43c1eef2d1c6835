//! Missing value imputation.
//!
//! Provides per-series linear interpolation by year.

mod interpolation;

pub use interpolation::{Fill, ImputationOutcome, LinearInterpolator};
