//! Legalize `lhlo` buffer ops into `linalg` generic parallel loops.
//!
//! Element-wise ops become `linalg.generic` with identity maps and a body
//! produced by a [`ScalarOpDelegate`]. `broadcast_in_dim` becomes a copy
//! loop reading its source through a broadcast map, and `iota` becomes an
//! `indexed_generic` writing a converted loop coordinate.
//!
//! ```text
//! lhlo.add %a, %b, %out : memref<2x2xf32>
//!   =>
//! linalg.generic {indexing_maps = [id, id, id], n_views = [2, 1]} %a, %b, %out {
//!   ^bb0(%x: f32, %y: f32, %z: f32):
//!     %s = arith.addf %x, %y
//!     linalg.yield %s
//! }
//! ```

mod body;
mod indexing;
mod patterns;
mod scalar;

use std::rc::Rc;

use tessel_ir::dialect::core::Module;
use tessel_ir::dialect::func::Func;
use tessel_ir::dialect::lhlo::PointwiseOp;
use tessel_ir::rewrite::{ConversionTarget, PatternApplicator};
use tessel_ir::validation::debug_assert_valid;
use tessel_ir::walk::collect_typed;
use tessel_ir::{Diagnostic, IrContext, RegionRef};

pub use indexing::{broadcast_map, identity_map};
pub use patterns::{BroadcastInDimPattern, IotaPattern, PointwisePattern};
pub use scalar::{ScalarOpDelegate, StandardScalarOps};

use crate::errors::LoweringError;

pub const PASS_NAME: &str = "lhlo-legalize-to-linalg";
pub const PASS_DESCRIPTION: &str = "Legalize from LHLO dialect to Linalg dialect";

/// Reported when a buffer operand has an unknown extent or rank.
pub const STATIC_SHAPE_MESSAGE: &str = "lhlo to linalg conversion expects statically shaped args";

/// Outcome of a successful lowering.
#[derive(Clone, Debug, Default)]
pub struct LoweringReport {
    /// Number of `lhlo` ops replaced.
    pub converted: usize,
    /// Diagnostics from declined matches.
    pub diagnostics: Vec<Diagnostic>,
}

/// The `lhlo-legalize-to-linalg` pass.
#[derive(Clone)]
pub struct LegalizeToLinalg {
    delegate: Rc<dyn ScalarOpDelegate>,
    verify_legality: bool,
}

impl Default for LegalizeToLinalg {
    fn default() -> Self {
        Self::new()
    }
}

impl LegalizeToLinalg {
    /// Standard scalar ops, failing if any `lhlo` op survives.
    pub fn new() -> Self {
        Self {
            delegate: Rc::new(StandardScalarOps),
            verify_legality: true,
        }
    }

    pub fn with_delegate(mut self, delegate: Rc<dyn ScalarOpDelegate>) -> Self {
        self.delegate = delegate;
        self
    }

    /// Skip the final legality check and keep whatever could be lowered.
    pub fn partial(mut self) -> Self {
        self.verify_legality = false;
        self
    }

    /// `lhlo` is illegal; the loop, scalar and container dialects are legal.
    pub fn conversion_target() -> ConversionTarget {
        ConversionTarget::new()
            .illegal_dialect("lhlo")
            .legal_dialect("linalg")
            .legal_dialect("arith")
            .legal_dialect("func")
            .legal_dialect("core")
    }

    fn applicator(&self) -> PatternApplicator {
        let applicator = PatternApplicator::new()
            .add_pattern(BroadcastInDimPattern)
            .add_pattern(IotaPattern);
        PointwiseOp::ALL.into_iter().fold(applicator, |acc, op| {
            acc.add_pattern(PointwisePattern::new(op, Rc::clone(&self.delegate)))
        })
    }

    /// Lower a single function body.
    pub fn run_on_function(
        &self,
        ctx: &mut IrContext,
        func: Func,
    ) -> Result<LoweringReport, LoweringError> {
        let body = func.body(ctx)?;
        let mut report = LoweringReport::default();
        self.lower_region(ctx, body, &mut report);
        self.check_legality(ctx, body, report)
    }

    /// Lower every top-level `func.func` of `module`.
    pub fn run_on_module(
        &self,
        ctx: &mut IrContext,
        module: Module,
    ) -> Result<LoweringReport, LoweringError> {
        let module_body = module.body(ctx)?;
        let mut report = LoweringReport::default();
        for func in collect_typed::<Func>(ctx, module_body) {
            let body = func.body(ctx)?;
            let converted = self.lower_region(ctx, body, &mut report);
            tracing::debug!(
                function = %func.sym_name(ctx).map(|s| s.to_string()).unwrap_or_default(),
                converted,
                "lowered function"
            );
            debug_assert_valid(ctx, module_body, PASS_NAME);
        }
        self.check_legality(ctx, module_body, report)
    }

    fn lower_region(
        &self,
        ctx: &mut IrContext,
        region: RegionRef,
        report: &mut LoweringReport,
    ) -> usize {
        let result = self.applicator().apply_partial(ctx, region);
        report.converted += result.total_changes;
        report.diagnostics.extend(result.diagnostics);
        result.total_changes
    }

    fn check_legality(
        &self,
        ctx: &IrContext,
        root: RegionRef,
        report: LoweringReport,
    ) -> Result<LoweringReport, LoweringError> {
        if !self.verify_legality {
            return Ok(report);
        }
        let remaining = Self::conversion_target().verify(ctx, root);
        if remaining.is_empty() {
            return Ok(report);
        }
        for op in &remaining {
            tracing::warn!(%op, pass = PASS_NAME, "illegal operation remains");
        }
        Err(LoweringError::IllegalOperations {
            remaining,
            diagnostics: report.diagnostics,
        })
    }
}
