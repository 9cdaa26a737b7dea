//! PatternApplicator: a single program-order walk applying rewrite patterns.
//!
//! Each operation present when its block is first visited is offered to the
//! patterns in registration order; the first pattern that records a
//! replacement wins. Operations created by rewrites are not revisited.

use super::conversion_target::{ConversionTarget, IllegalOp};
use super::pattern::RewritePattern;
use super::rewriter::{self, PatternRewriter};
use crate::context::IrContext;
use crate::diagnostic::Diagnostic;
use crate::refs::{BlockRef, OpRef, RegionRef};

/// Result of applying rewrite patterns.
#[derive(Debug, Default)]
pub struct ApplyResult {
    /// Number of operations replaced.
    pub total_changes: usize,
    /// Diagnostics emitted by patterns, matched or not.
    pub diagnostics: Vec<Diagnostic>,
}

impl ApplyResult {
    /// Verify that no illegal operations remain under `root`.
    pub fn verify(
        &self,
        ctx: &IrContext,
        root: RegionRef,
        target: &ConversionTarget,
    ) -> Result<(), Vec<IllegalOp>> {
        let illegal = target.verify(ctx, root);
        if illegal.is_empty() {
            Ok(())
        } else {
            Err(illegal)
        }
    }
}

/// Applies rewrite patterns to every operation nested in a region.
#[derive(Default)]
pub struct PatternApplicator {
    patterns: Vec<Box<dyn RewritePattern>>,
}

impl PatternApplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rewrite pattern. Patterns are tried in the order added.
    pub fn add_pattern(mut self, pattern: impl RewritePattern + 'static) -> Self {
        self.patterns.push(Box::new(pattern));
        self
    }

    pub fn num_patterns(&self) -> usize {
        self.patterns.len()
    }

    /// Apply patterns and verify the result.
    ///
    /// On failure the rewrites already made stay in place.
    pub fn apply(
        &self,
        ctx: &mut IrContext,
        root: RegionRef,
        target: &ConversionTarget,
    ) -> Result<ApplyResult, (ApplyResult, Vec<IllegalOp>)> {
        let result = self.apply_partial(ctx, root);
        match result.verify(ctx, root, target) {
            Ok(()) => Ok(result),
            Err(illegal) => Err((result, illegal)),
        }
    }

    /// Apply patterns without verification.
    pub fn apply_partial(&self, ctx: &mut IrContext, root: RegionRef) -> ApplyResult {
        let mut result = ApplyResult::default();
        self.visit_region(ctx, root, &mut result);
        result
    }

    fn visit_region(&self, ctx: &mut IrContext, region: RegionRef, result: &mut ApplyResult) {
        let blocks: Vec<BlockRef> = ctx.region(region).blocks.to_vec();
        for block in blocks {
            self.visit_block(ctx, block, result);
        }
    }

    fn visit_block(&self, ctx: &mut IrContext, block: BlockRef, result: &mut ApplyResult) {
        // Snapshot the ops in this block
        let ops: Vec<OpRef> = ctx.block(block).ops.to_vec();

        for op in ops {
            if ctx.op(op).parent_block != Some(block) {
                continue;
            }

            let regions: Vec<RegionRef> = ctx.op(op).regions.to_vec();
            for region in regions {
                self.visit_region(ctx, region, result);
            }

            if ctx.op(op).parent_block != Some(block) {
                continue;
            }

            tracing::trace!(op = %ctx.op(op).full_name(), "visiting");
            for pattern in &self.patterns {
                let mut rw = PatternRewriter::new();
                let matched = pattern.match_and_rewrite(ctx, op, &mut rw);
                let (replacement, diagnostics) = rw.finish();
                result.diagnostics.extend(diagnostics);
                if let (true, Some(new_op)) = (matched, replacement) {
                    tracing::debug!(pattern = pattern.name(), %op, %new_op, "rewrote");
                    rewriter::apply_replacement(ctx, op, new_op);
                    result.total_changes += 1;
                    break;
                }
            }
        }
    }
}
