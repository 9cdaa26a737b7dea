//! Value integrity and use-chain validation.
//!
//! 1. **Scope validation**: every operand in a function references a value
//!    defined within that function's region tree.
//! 2. **Use-chain consistency**: the use-chains stored in `IrContext` match
//!    the actual operands of every reachable operation.

use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use std::ops::ControlFlow;

use crate::context::IrContext;
use crate::dialect::func::Func;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, OpRef, RegionRef, ValueDef, ValueRef};
use crate::walk::{self, WalkAction};

/// An operand that refers to a value outside its function.
#[derive(Debug)]
pub struct StaleValueError {
    pub function_name: String,
    pub consumer_op: String,
    pub operand_index: usize,
    pub stale_value_description: String,
}

impl fmt::Display for StaleValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stale value in @{}: operand #{} of {} references {}",
            self.function_name, self.operand_index, self.consumer_op, self.stale_value_description,
        )
    }
}

#[derive(Debug)]
pub struct UseChainError {
    pub message: String,
}

impl fmt::Display for UseChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Default)]
pub struct ValidationResult {
    pub stale_errors: Vec<StaleValueError>,
    pub use_chain_errors: Vec<UseChainError>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.stale_errors.is_empty() && self.use_chain_errors.is_empty()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "validation passed");
        }
        if !self.stale_errors.is_empty() {
            writeln!(f, "{} stale value(s) found:", self.stale_errors.len())?;
            for err in &self.stale_errors {
                writeln!(f, "  - {err}")?;
            }
        }
        if !self.use_chain_errors.is_empty() {
            writeln!(
                f,
                "{} use-chain error(s) found:",
                self.use_chain_errors.len()
            )?;
            for err in &self.use_chain_errors {
                writeln!(f, "  - {err}")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Scope validation
// ============================================================================

fn collect_defined_in_region(ctx: &IrContext, region: RegionRef, defined: &mut HashSet<ValueRef>) {
    for &block in &ctx.region(region).blocks {
        defined.extend(ctx.block_args(block).iter().copied());
        for &op in &ctx.block(block).ops {
            defined.extend(ctx.op_results(op).iter().copied());
            for &nested in &ctx.op(op).regions {
                collect_defined_in_region(ctx, nested, defined);
            }
        }
    }
}

fn describe_value(ctx: &IrContext, v: ValueRef) -> String {
    match ctx.value_def(v) {
        ValueDef::OpResult(op, idx) => format!("result #{idx} of {}", ctx.op(op).full_name()),
        ValueDef::BlockArg(block, idx) => format!("block arg #{idx} of {block}"),
    }
}

/// Check every `func.func` nested in `root`.
pub fn validate_value_integrity(ctx: &IrContext, root: RegionRef) -> ValidationResult {
    let mut errors = Vec::new();

    let _ = walk::walk_region::<Infallible>(ctx, root, &mut |op| {
        let Ok(func) = Func::from_op(ctx, op) else {
            return ControlFlow::Continue(WalkAction::Advance);
        };
        let fn_name = func
            .sym_name(ctx)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "<unnamed>".to_string());

        let mut defined = HashSet::new();
        for &region in &ctx.op(op).regions {
            collect_defined_in_region(ctx, region, &mut defined);
        }
        for &region in &ctx.op(op).regions {
            let _ = walk::walk_region::<Infallible>(ctx, region, &mut |inner| {
                for (i, &operand) in ctx.op_operands(inner).iter().enumerate() {
                    if !defined.contains(&operand) {
                        errors.push(StaleValueError {
                            function_name: fn_name.clone(),
                            consumer_op: ctx.op(inner).full_name(),
                            operand_index: i,
                            stale_value_description: describe_value(ctx, operand),
                        });
                    }
                }
                ControlFlow::Continue(WalkAction::Advance)
            });
        }
        ControlFlow::Continue(WalkAction::Skip)
    });

    ValidationResult {
        stale_errors: errors,
        use_chain_errors: vec![],
    }
}

// ============================================================================
// Use-chain consistency
// ============================================================================

/// Check both directions: every operand has a use-chain entry, and every
/// use-chain entry of a reachable value points at a real operand.
pub fn validate_use_chains(ctx: &IrContext, root: RegionRef) -> ValidationResult {
    let mut errors = Vec::new();

    let mut actual_uses: HashSet<(ValueRef, OpRef, u32)> = HashSet::new();
    let mut reachable: HashSet<ValueRef> = HashSet::new();
    collect_block_args(ctx, root, &mut reachable);

    let _ = walk::walk_region::<Infallible>(ctx, root, &mut |op| {
        for (idx, &operand) in ctx.op_operands(op).iter().enumerate() {
            actual_uses.insert((operand, op, idx as u32));
            reachable.insert(operand);
        }
        reachable.extend(ctx.op_results(op).iter().copied());
        ControlFlow::Continue(WalkAction::Advance)
    });

    for &(val, op, idx) in &actual_uses {
        let found = ctx
            .uses(val)
            .iter()
            .any(|u| u.user == op && u.operand_index == idx);
        if !found {
            errors.push(UseChainError {
                message: format!(
                    "operand #{idx} of {} ({op}) uses {val} but no use-chain entry exists",
                    ctx.op(op).full_name(),
                ),
            });
        }
    }

    for &val in &reachable {
        for u in ctx.uses(val) {
            let user_attached = ctx.op(u.user).parent_block.is_some();
            if user_attached && !actual_uses.contains(&(val, u.user, u.operand_index)) {
                errors.push(UseChainError {
                    message: format!(
                        "use-chain entry for {val} claims use by {} operand #{}, but no such operand exists",
                        u.user, u.operand_index,
                    ),
                });
            }
        }
    }

    ValidationResult {
        stale_errors: vec![],
        use_chain_errors: errors,
    }
}

fn collect_block_args(ctx: &IrContext, region: RegionRef, values: &mut HashSet<ValueRef>) {
    for &block in &ctx.region(region).blocks {
        collect_block_values(ctx, block, values);
    }
}

fn collect_block_values(ctx: &IrContext, block: BlockRef, values: &mut HashSet<ValueRef>) {
    values.extend(ctx.block_args(block).iter().copied());
    for &op in &ctx.block(block).ops {
        for &region in &ctx.op(op).regions {
            collect_block_args(ctx, region, values);
        }
    }
}

/// Run both validations and combine results.
pub fn validate_all(ctx: &IrContext, root: RegionRef) -> ValidationResult {
    let scope = validate_value_integrity(ctx, root);
    let uses = validate_use_chains(ctx, root);
    ValidationResult {
        stale_errors: scope.stale_errors,
        use_chain_errors: uses.use_chain_errors,
    }
}

/// Debug-only validation that panics on any error.
///
/// Only runs under `cfg!(debug_assertions)`.
pub fn debug_assert_valid(ctx: &IrContext, root: RegionRef, pass_name: &str) {
    if !cfg!(debug_assertions) {
        return;
    }
    let result = validate_all(ctx, root);
    if !result.is_ok() {
        panic!("IR validation failed after `{pass_name}`:\n{result}");
    }
}
