//! Transforms producing new patches from existing ones

pub mod findiff;
pub mod strain;

pub use findiff::FinDiff;
pub use strain::{velocity_to_strain_rate, velocity_to_strain_rate_with, StrainRateOptions};
