//! PatternRewriter: records what a pattern wants done to the current op.

use crate::context::IrContext;
use crate::diagnostic::Diagnostic;
use crate::location::Location;
use crate::refs::{OpRef, ValueRef};

/// Rewriter interface for patterns.
///
/// Patterns record a replacement here; the `PatternApplicator` applies it
/// after the pattern returns. Diagnostics are kept whether or not the
/// pattern matched.
#[derive(Default)]
pub struct PatternRewriter {
    replacement: Option<OpRef>,
    diagnostics: Vec<Diagnostic>,
}

impl PatternRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current operation with a new, detached one.
    ///
    /// Old results are replaced 1:1 by the new op's results, the new op
    /// takes the old op's position, and the old op is destroyed.
    pub fn replace_op(&mut self, new_op: OpRef) {
        debug_assert!(
            self.replacement.is_none(),
            "replace_op called twice for the same operation"
        );
        self.replacement = Some(new_op);
    }

    /// Report an error at `location`. Does not by itself make the match fail.
    pub fn emit_error(&mut self, location: Location, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(location, message));
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Consume the rewriter, splitting the recorded replacement from diagnostics.
    pub(crate) fn finish(self) -> (Option<OpRef>, Vec<Diagnostic>) {
        (self.replacement, self.diagnostics)
    }
}

/// Swap `new_op` into `original_op`'s place and destroy `original_op`.
pub(crate) fn apply_replacement(ctx: &mut IrContext, original_op: OpRef, new_op: OpRef) {
    let old_results: Vec<ValueRef> = ctx.op_results(original_op).to_vec();
    let new_results: Vec<ValueRef> = ctx.op_results(new_op).to_vec();
    debug_assert_eq!(
        old_results.len(),
        new_results.len(),
        "replace_op: result count mismatch ({} vs {})",
        old_results.len(),
        new_results.len()
    );
    for (&old_v, &new_v) in old_results.iter().zip(&new_results) {
        ctx.replace_all_uses(old_v, new_v);
    }

    if let Some(block) = ctx.op(original_op).parent_block {
        ctx.swap_op_in_block(block, original_op, new_op);
    }
    ctx.remove_op(original_op);
}
