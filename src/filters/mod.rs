//! Pure pixel-transform kernels and the offloaded filter execution context.

pub mod adjustments;
pub mod duotone;
pub mod worker;

pub use adjustments::apply_adjustments;
pub use duotone::{DuotoneLut, apply_duotone};
pub use worker::FilterWorker;
