//! Rewrite pattern trait.

use super::rewriter::PatternRewriter;
use crate::context::IrContext;
use crate::refs::OpRef;

/// A pattern that can match and transform an operation.
///
/// # Return Value
///
/// Return `true` if the pattern matched and recorded a mutation via the
/// rewriter. Return `false` if the pattern does not apply; in that case any
/// ops it created must be left detached, and the IR reachable from the root
/// must be unchanged. Diagnostics may be emitted either way.
pub trait RewritePattern {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter,
    ) -> bool;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
