//! Tessel: a buffer-level tensor IR and its lowering to structured loops.
//!
//! The IR lives in [`tessel_ir`]; lowerings live in [`tessel_lower`]. This
//! crate ties them together behind a name-based pass registry.

pub mod pipeline;

pub use pipeline::{PassInfo, PipelineError, registered_passes, run_pass, run_pipeline};
pub use tessel_ir as ir;
pub use tessel_lower as lower;
