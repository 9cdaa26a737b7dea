//! In-place rewrite infrastructure.
//!
//! Patterns build replacement ops directly in the `IrContext` and record
//! the replacement on a `PatternRewriter`; the `PatternApplicator` then
//! swaps it into the original op's block position.

pub mod applicator;
pub mod conversion_target;
pub mod pattern;
pub mod rewriter;

pub use applicator::{ApplyResult, PatternApplicator};
pub use conversion_target::{ConversionTarget, IllegalOp, LegalityCheck};
pub use pattern::RewritePattern;
pub use rewriter::PatternRewriter;
