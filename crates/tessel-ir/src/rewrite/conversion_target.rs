//! Conversion target: which operations may remain after a conversion.

use std::collections::HashSet;
use std::ops::ControlFlow;

use crate::context::IrContext;
use crate::refs::{OpRef, RegionRef};
use crate::symbol::Symbol;
use crate::walk::{self, WalkAction};

/// Result of a legality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegalityCheck {
    Legal,
    Illegal,
}

/// Legality rules for a conversion.
///
/// After pattern application, `verify()` walks a region and reports every
/// operation that is still illegal.
#[derive(Default)]
pub struct ConversionTarget {
    legal_dialects: HashSet<Symbol>,
    illegal_dialects: HashSet<Symbol>,
    legal_ops: HashSet<(Symbol, Symbol)>,
    illegal_ops: HashSet<(Symbol, Symbol)>,
}

impl ConversionTarget {
    /// Create an empty target; everything is legal by default.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn legal_dialect(mut self, dialect: &str) -> Self {
        self.legal_dialects.insert(Symbol::from_dynamic(dialect));
        self
    }

    pub fn illegal_dialect(mut self, dialect: &str) -> Self {
        self.illegal_dialects.insert(Symbol::from_dynamic(dialect));
        self
    }

    pub fn legal_op(mut self, dialect: &str, op_name: &str) -> Self {
        self.legal_ops
            .insert((Symbol::from_dynamic(dialect), Symbol::from_dynamic(op_name)));
        self
    }

    pub fn illegal_op(mut self, dialect: &str, op_name: &str) -> Self {
        self.illegal_ops
            .insert((Symbol::from_dynamic(dialect), Symbol::from_dynamic(op_name)));
        self
    }

    /// Check if a specific operation is legal.
    ///
    /// Op rules take precedence over dialect rules; anything unmentioned is legal.
    pub fn is_legal(&self, ctx: &IrContext, op: OpRef) -> LegalityCheck {
        let data = ctx.op(op);
        let key = (data.dialect, data.name);

        if self.legal_ops.contains(&key) {
            return LegalityCheck::Legal;
        }
        if self.illegal_ops.contains(&key) {
            return LegalityCheck::Illegal;
        }
        if self.legal_dialects.contains(&data.dialect) {
            return LegalityCheck::Legal;
        }
        if self.illegal_dialects.contains(&data.dialect) {
            return LegalityCheck::Illegal;
        }
        LegalityCheck::Legal
    }

    /// Every illegal operation nested in `region`, in program order.
    pub fn verify(&self, ctx: &IrContext, region: RegionRef) -> Vec<IllegalOp> {
        let mut illegal = Vec::new();

        let _ = walk::walk_region::<()>(ctx, region, &mut |op| {
            if self.is_legal(ctx, op) == LegalityCheck::Illegal {
                let data = ctx.op(op);
                illegal.push(IllegalOp {
                    op,
                    dialect: data.dialect,
                    name: data.name,
                });
            }
            ControlFlow::Continue(WalkAction::Advance)
        });

        illegal
    }
}

/// An illegal operation found during verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IllegalOp {
    pub op: OpRef,
    pub dialect: Symbol,
    pub name: Symbol,
}

impl std::fmt::Display for IllegalOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{} ({})", self.dialect, self.name, self.op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{BlockData, OperationDataBuilder};
    use crate::location::{Location, Span};

    #[test]
    fn op_rules_override_dialect_rules() {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern("target.lhlo".to_owned());
        let loc = Location::new(path, Span::new(0, 0));
        let keep = OperationDataBuilder::new(loc, "lhlo".into(), "keep".into()).create(&mut ctx);
        let drop = OperationDataBuilder::new(loc, "lhlo".into(), "drop".into()).create(&mut ctx);
        let other = OperationDataBuilder::new(loc, "misc".into(), "op".into()).create(&mut ctx);
        let block = ctx.create_block(BlockData::new(loc, []));
        for op in [keep, drop, other] {
            ctx.push_op(block, op);
        }
        let region = ctx.create_single_block_region(loc, block);

        let target = ConversionTarget::new()
            .illegal_dialect("lhlo")
            .legal_op("lhlo", "keep");

        assert_eq!(target.is_legal(&ctx, keep), LegalityCheck::Legal);
        assert_eq!(target.is_legal(&ctx, other), LegalityCheck::Legal);
        let illegal = target.verify(&ctx, region);
        assert_eq!(illegal.len(), 1);
        assert_eq!(illegal[0].op, drop);
        assert_eq!(illegal[0].to_string(), format!("lhlo.drop ({drop})"));
    }
}
