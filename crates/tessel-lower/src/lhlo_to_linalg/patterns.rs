//! Rewrite patterns turning `lhlo` ops into `linalg` generic loops.
//!
//! Each pattern first plans the rewrite without touching the IR, then builds
//! a detached structured op, verifies it and records it as the replacement.
//! A plan that fails is logged and the source op is kept as is.

use std::rc::Rc;

use smallvec::SmallVec;

use tessel_ir::dialect::core::{self, MemRefType, ScalarKind};
use tessel_ir::dialect::lhlo::{self, PointwiseKind, PointwiseOp};
use tessel_ir::dialect::linalg::{self, StructuredParts};
use tessel_ir::rewrite::{PatternRewriter, RewritePattern};
use tessel_ir::{AffineMap, DialectOp, IrContext, OpRef, TypeRef, ValueRef};

use super::STATIC_SHAPE_MESSAGE;
use super::body;
use super::indexing::{broadcast_map, identity_map};
use super::scalar::ScalarOpDelegate;
use crate::errors::MatchFailure;

/// A buffer operand with every extent known.
#[derive(Clone, Debug)]
struct StaticBuffer {
    element: TypeRef,
    shape: SmallVec<[u64; 4]>,
}

impl StaticBuffer {
    fn rank(&self) -> usize {
        self.shape.len()
    }
}

fn static_buffer(
    ctx: &IrContext,
    value: ValueRef,
    index: usize,
) -> Result<StaticBuffer, MatchFailure> {
    let ty = ctx.value_ty(value);
    let Some(memref) = MemRefType::from_type(ctx, ty) else {
        if ctx
            .types
            .is_dialect(ty, core::DIALECT_NAME(), core::UNRANKED_MEMREF())
        {
            return Err(MatchFailure::NotStaticallyShaped(index));
        }
        return Err(MatchFailure::NotBuffer(index));
    };
    let shape = memref
        .static_shape()
        .ok_or(MatchFailure::NotStaticallyShaped(index))?;
    Ok(StaticBuffer {
        element: memref.element,
        shape,
    })
}

fn numeric_element(
    ctx: &IrContext,
    buffer: &StaticBuffer,
    index: usize,
) -> Result<(), MatchFailure> {
    match ScalarKind::of(ctx, buffer.element) {
        Some(kind) if kind.is_int_or_float() => Ok(()),
        _ => Err(MatchFailure::NonNumericElement(index)),
    }
}

/// Log a declined match, surfacing the failures users need to see.
fn decline(
    ctx: &IrContext,
    op: OpRef,
    rewriter: &mut PatternRewriter,
    pattern: &'static str,
    failure: MatchFailure,
) -> bool {
    tracing::debug!(pattern, %op, op_name = %ctx.op(op).full_name(), reason = %failure, "declined");
    if failure.is_reported() {
        rewriter.emit_error(ctx.op(op).location, STATIC_SHAPE_MESSAGE);
    }
    false
}

/// Verify a freshly built structured op and record it as the replacement.
///
/// A malformed op is destroyed and the source op is left untouched.
fn commit(
    ctx: &mut IrContext,
    source: OpRef,
    built: OpRef,
    rewriter: &mut PatternRewriter,
    pattern: &'static str,
) -> Result<(), MatchFailure> {
    if let Err(err) = linalg::verify_structured(ctx, built) {
        tracing::error!(pattern, %source, %built, error = %err, "built op failed verification");
        ctx.remove_op(built);
        return Err(err.into());
    }
    rewriter.replace_op(built);
    Ok(())
}

// ============================================================================
// Element-wise ops
// ============================================================================

/// Lowers one element-wise `lhlo` op to `linalg.generic`.
pub struct PointwisePattern {
    op: PointwiseOp,
    delegate: Rc<dyn ScalarOpDelegate>,
}

struct PointwisePlan {
    kind: PointwiseKind,
    operands: SmallVec<[ValueRef; 4]>,
    element_types: SmallVec<[TypeRef; 4]>,
    rank: usize,
}

impl PointwisePattern {
    pub fn new(op: PointwiseOp, delegate: Rc<dyn ScalarOpDelegate>) -> Self {
        Self { op, delegate }
    }

    fn plan(&self, ctx: &IrContext, op: OpRef) -> Result<PointwisePlan, MatchFailure> {
        let operands: SmallVec<[ValueRef; 4]> = ctx.op_operands(op).iter().copied().collect();
        let expected = self.op.num_inputs() + 1;
        if operands.len() != expected {
            return Err(MatchFailure::OperandCount {
                expected,
                actual: operands.len(),
            });
        }

        let mut buffers: SmallVec<[StaticBuffer; 4]> = SmallVec::with_capacity(operands.len());
        for (index, &value) in operands.iter().enumerate() {
            buffers.push(static_buffer(ctx, value, index)?);
        }

        let rank = buffers[buffers.len() - 1].rank();
        if rank == 0 {
            return Err(MatchFailure::ZeroRank);
        }
        for (index, buffer) in buffers.iter().enumerate() {
            if buffer.rank() != rank {
                return Err(MatchFailure::RankMismatch {
                    operand: index,
                    expected: rank,
                    actual: buffer.rank(),
                });
            }
            numeric_element(ctx, buffer, index)?;
        }

        let kind = PointwiseKind::resolve(ctx, op, self.op)?;
        Ok(PointwisePlan {
            kind,
            element_types: buffers.iter().map(|b| b.element).collect(),
            operands,
            rank,
        })
    }

    fn build(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        plan: PointwisePlan,
    ) -> Result<OpRef, MatchFailure> {
        let location = ctx.op(op).location;
        let body = body::pointwise_body(
            ctx,
            location,
            self.delegate.as_ref(),
            plan.kind,
            &plan.element_types,
        )?;
        let (inputs, outputs) = plan.operands.split_at(plan.operands.len() - 1);
        let maps = (0..plan.operands.len())
            .map(|_| identity_map(plan.rank))
            .collect();
        let parts = StructuredParts {
            inputs,
            outputs,
            indexing_maps: maps,
            num_loops: plan.rank as u32,
        };
        Ok(linalg::generic(ctx, location, parts, body).op_ref())
    }
}

impl RewritePattern for PointwisePattern {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter,
    ) -> bool {
        if !self.op.matches(ctx, op) {
            return false;
        }
        let result = self
            .plan(ctx, op)
            .and_then(|plan| self.build(ctx, op, plan))
            .and_then(|built| commit(ctx, op, built, rewriter, self.name()));
        match result {
            Ok(()) => true,
            Err(failure) => decline(ctx, op, rewriter, self.name(), failure),
        }
    }

    fn name(&self) -> &'static str {
        "PointwisePattern"
    }
}

// ============================================================================
// broadcast_in_dim
// ============================================================================

/// Lowers `lhlo.broadcast_in_dim` to a copy loop reading the source through
/// a broadcast map.
pub struct BroadcastInDimPattern;

struct BroadcastPlan {
    source: ValueRef,
    output: ValueRef,
    source_element: TypeRef,
    output_element: TypeRef,
    maps: Vec<AffineMap>,
    num_loops: usize,
}

impl BroadcastInDimPattern {
    fn plan(ctx: &IrContext, op: lhlo::BroadcastInDim) -> Result<BroadcastPlan, MatchFailure> {
        let actual = ctx.op_operands(op.op_ref()).len();
        if actual != 2 {
            return Err(MatchFailure::OperandCount {
                expected: 2,
                actual,
            });
        }
        let source = op.operand(ctx);
        let output = op.output(ctx);
        let source_buffer = static_buffer(ctx, source, 0)?;
        let output_buffer = static_buffer(ctx, output, 1)?;

        let num_loops = output_buffer.rank();
        let dims = op.broadcast_dimensions(ctx)?;
        let source_map = broadcast_map(&source_buffer.shape, dims.as_deref(), num_loops)?;

        Ok(BroadcastPlan {
            source,
            output,
            source_element: source_buffer.element,
            output_element: output_buffer.element,
            maps: vec![source_map, identity_map(num_loops)],
            num_loops,
        })
    }

    fn build(ctx: &mut IrContext, op: OpRef, plan: BroadcastPlan) -> OpRef {
        let location = ctx.op(op).location;
        let body = body::broadcast_body(ctx, location, plan.source_element, plan.output_element);
        let parts = StructuredParts {
            inputs: &[plan.source],
            outputs: &[plan.output],
            indexing_maps: plan.maps,
            num_loops: plan.num_loops as u32,
        };
        linalg::generic(ctx, location, parts, body).op_ref()
    }
}

impl RewritePattern for BroadcastInDimPattern {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter,
    ) -> bool {
        let Ok(broadcast) = lhlo::BroadcastInDim::from_op(ctx, op) else {
            return false;
        };
        let result = Self::plan(ctx, broadcast)
            .map(|plan| Self::build(ctx, op, plan))
            .and_then(|built| commit(ctx, op, built, rewriter, self.name()));
        match result {
            Ok(()) => true,
            Err(failure) => decline(ctx, op, rewriter, self.name(), failure),
        }
    }

    fn name(&self) -> &'static str {
        "BroadcastInDimPattern"
    }
}

// ============================================================================
// iota
// ============================================================================

/// Lowers `lhlo.iota` to an indexed loop writing a loop coordinate.
pub struct IotaPattern;

struct IotaPlan {
    output: ValueRef,
    element: TypeRef,
    rank: usize,
    dimension: usize,
}

impl IotaPattern {
    fn plan(ctx: &IrContext, op: lhlo::Iota) -> Result<IotaPlan, MatchFailure> {
        let actual = ctx.op_operands(op.op_ref()).len();
        if actual != 1 {
            return Err(MatchFailure::OperandCount {
                expected: 1,
                actual,
            });
        }
        let output = op.output(ctx);
        let buffer = static_buffer(ctx, output, 0)?;
        numeric_element(ctx, &buffer, 0)?;

        let dim = op.iota_dimension(ctx)?;
        let rank = buffer.rank();
        if dim >= rank as u64 {
            return Err(MatchFailure::IotaDimensionOutOfRange { dim, rank });
        }
        Ok(IotaPlan {
            output,
            element: buffer.element,
            rank,
            dimension: dim as usize,
        })
    }

    fn build(ctx: &mut IrContext, op: OpRef, plan: IotaPlan) -> Result<OpRef, MatchFailure> {
        let location = ctx.op(op).location;
        let body = body::iota_body(ctx, location, plan.rank, plan.dimension, plan.element)?;
        let parts = StructuredParts {
            inputs: &[],
            outputs: &[plan.output],
            indexing_maps: vec![identity_map(plan.rank)],
            num_loops: plan.rank as u32,
        };
        Ok(linalg::indexed_generic(ctx, location, parts, body).op_ref())
    }
}

impl RewritePattern for IotaPattern {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter,
    ) -> bool {
        let Ok(iota) = lhlo::Iota::from_op(ctx, op) else {
            return false;
        };
        let result = Self::plan(ctx, iota)
            .and_then(|plan| Self::build(ctx, op, plan))
            .and_then(|built| commit(ctx, op, built, rewriter, self.name()));
        match result {
            Ok(()) => true,
            Err(failure) => decline(ctx, op, rewriter, self.name(), failure),
        }
    }

    fn name(&self) -> &'static str {
        "IotaPattern"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lhlo_to_linalg::scalar::StandardScalarOps;
    use tessel_ir::{BlockData, Location, Span};

    struct Harness {
        ctx: IrContext,
        loc: Location,
    }

    impl Harness {
        fn new() -> Self {
            let mut ctx = IrContext::new();
            let path = ctx.paths.intern("patterns.lhlo".to_owned());
            Harness {
                ctx,
                loc: Location::new(path, Span::new(4, 20)),
            }
        }

        fn values(&mut self, types: &[TypeRef]) -> Vec<ValueRef> {
            let block = self
                .ctx
                .create_block(BlockData::new(self.loc, types.iter().copied()));
            self.ctx.block_args(block).to_vec()
        }

        fn run(&mut self, pattern: &dyn RewritePattern, op: OpRef) -> (bool, PatternRewriter) {
            let mut rewriter = PatternRewriter::new();
            let matched = pattern.match_and_rewrite(&mut self.ctx, op, &mut rewriter);
            (matched, rewriter)
        }
    }

    fn pointwise(op: PointwiseOp) -> PointwisePattern {
        PointwisePattern::new(op, Rc::new(StandardScalarOps))
    }

    #[test]
    fn pointwise_ignores_other_ops() {
        let mut h = Harness::new();
        let f32_ty = core::float(&mut h.ctx, 32);
        let buf = core::memref(&mut h.ctx, f32_ty, &[4]);
        let v = h.values(&[buf, buf, buf]);
        let sub = lhlo::sub(&mut h.ctx, h.loc, v[0], v[1], v[2]);

        let (matched, rewriter) = h.run(&pointwise(PointwiseOp::Add), sub.op_ref());
        assert!(!matched);
        assert!(rewriter.diagnostics().is_empty());
    }

    #[test]
    fn pointwise_rank_mismatch_declines_quietly() {
        let mut h = Harness::new();
        let f32_ty = core::float(&mut h.ctx, 32);
        let a = core::memref(&mut h.ctx, f32_ty, &[2, 2]);
        let b = core::memref(&mut h.ctx, f32_ty, &[4]);
        let v = h.values(&[a, b, a]);
        let add = lhlo::add(&mut h.ctx, h.loc, v[0], v[1], v[2]);

        let pattern = pointwise(PointwiseOp::Add);
        let (matched, rewriter) = h.run(&pattern, add.op_ref());
        assert!(!matched);
        assert!(rewriter.diagnostics().is_empty());
        assert!(matches!(
            pattern.plan(&h.ctx, add.op_ref()),
            Err(MatchFailure::RankMismatch {
                operand: 1,
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn pointwise_rejects_scalar_buffers() {
        let mut h = Harness::new();
        let f32_ty = core::float(&mut h.ctx, 32);
        let scalar_buf = core::memref(&mut h.ctx, f32_ty, &[]);
        let v = h.values(&[scalar_buf, scalar_buf]);
        let exp = lhlo::exp(&mut h.ctx, h.loc, v[0], v[1]);

        let pattern = pointwise(PointwiseOp::Exp);
        assert!(matches!(
            pattern.plan(&h.ctx, exp.op_ref()),
            Err(MatchFailure::ZeroRank)
        ));
    }

    #[test]
    fn pointwise_index_elements_decline_quietly() {
        let mut h = Harness::new();
        let index_ty = core::index(&mut h.ctx);
        let buf = core::memref(&mut h.ctx, index_ty, &[2]);
        let v = h.values(&[buf, buf, buf]);
        let add = lhlo::add(&mut h.ctx, h.loc, v[0], v[1], v[2]);

        let pattern = pointwise(PointwiseOp::Add);
        assert!(matches!(
            pattern.plan(&h.ctx, add.op_ref()),
            Err(MatchFailure::NonNumericElement(0))
        ));
        let (matched, rewriter) = h.run(&pattern, add.op_ref());
        assert!(!matched);
        assert!(rewriter.diagnostics().is_empty());
        assert_eq!(h.ctx.uses(v[0]).len(), 1);
    }

    #[test]
    fn compare_into_wider_int_fails_verification() {
        let mut h = Harness::new();
        let f32_ty = core::float(&mut h.ctx, 32);
        let i8_ty = core::int(&mut h.ctx, 8);
        let input = core::memref(&mut h.ctx, f32_ty, &[2]);
        let output = core::memref(&mut h.ctx, i8_ty, &[2]);
        let v = h.values(&[input, input, output]);
        let direction = lhlo::ComparisonDirection::Lt;
        let cmp = lhlo::compare(&mut h.ctx, h.loc, v[0], v[1], v[2], direction);

        let (matched, rewriter) = h.run(&pointwise(PointwiseOp::Compare), cmp.op_ref());
        assert!(!matched);
        assert!(rewriter.diagnostics().is_empty());
        assert_eq!(h.ctx.uses(v[2]).len(), 1);
        assert_eq!(h.ctx.uses(v[2])[0].user, cmp.op_ref());
    }

    #[test]
    fn dynamic_extent_reports_diagnostic() {
        let mut h = Harness::new();
        let f32_ty = core::float(&mut h.ctx, 32);
        let dims = [core::Dim::Dynamic, core::Dim::Fixed(2)];
        let dynamic = core::memref_with_dims(&mut h.ctx, f32_ty, &dims);
        let v = h.values(&[dynamic, dynamic, dynamic]);
        let mul = lhlo::mul(&mut h.ctx, h.loc, v[0], v[1], v[2]);

        let (matched, rewriter) = h.run(&pointwise(PointwiseOp::Mul), mul.op_ref());
        assert!(!matched);
        let diagnostics = rewriter.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_error());
        assert_eq!(diagnostics[0].message, STATIC_SHAPE_MESSAGE);
        assert_eq!(diagnostics[0].location, h.loc);
    }

    #[test]
    fn tensor_operand_is_not_a_buffer() {
        let mut h = Harness::new();
        let f32_ty = core::float(&mut h.ctx, 32);
        let tensor = core::tensor(&mut h.ctx, f32_ty, &[2]);
        let buf = core::memref(&mut h.ctx, f32_ty, &[2]);
        let v = h.values(&[tensor, buf]);
        assert!(matches!(
            static_buffer(&h.ctx, v[0], 0),
            Err(MatchFailure::NotBuffer(0))
        ));
        assert_eq!(static_buffer(&h.ctx, v[1], 1).unwrap().shape.as_slice(), &[2]);
    }

    #[test]
    fn delegate_refusal_declines() {
        let mut h = Harness::new();
        let i32_ty = core::int(&mut h.ctx, 32);
        let buf = core::memref(&mut h.ctx, i32_ty, &[3]);
        let v = h.values(&[buf, buf]);
        let exp = lhlo::exp(&mut h.ctx, h.loc, v[0], v[1]);

        let (matched, rewriter) = h.run(&pointwise(PointwiseOp::Exp), exp.op_ref());
        assert!(!matched);
        assert!(rewriter.diagnostics().is_empty());
        // No generic op was left holding uses of the buffers.
        assert_eq!(h.ctx.uses(v[0]).len(), 1);
        assert_eq!(h.ctx.uses(v[0])[0].user, exp.op_ref());
    }

    #[test]
    fn iota_rejects_out_of_range_dimension() {
        let mut h = Harness::new();
        let f32_ty = core::float(&mut h.ctx, 32);
        let buf = core::memref(&mut h.ctx, f32_ty, &[2, 3]);
        let v = h.values(&[buf]);
        let iota = lhlo::iota(&mut h.ctx, h.loc, v[0], 2);

        assert!(matches!(
            IotaPattern::plan(&h.ctx, iota),
            Err(MatchFailure::IotaDimensionOutOfRange { dim: 2, rank: 2 })
        ));
        let (matched, _) = h.run(&IotaPattern, iota.op_ref());
        assert!(!matched);
    }

    #[test]
    fn broadcast_records_verified_replacement() {
        let mut h = Harness::new();
        let f32_ty = core::float(&mut h.ctx, 32);
        let src = core::memref(&mut h.ctx, f32_ty, &[4]);
        let dst = core::memref(&mut h.ctx, f32_ty, &[3, 4]);
        let v = h.values(&[src, dst]);
        let op = lhlo::broadcast_in_dim(&mut h.ctx, h.loc, v[0], v[1], Some(&[1]));

        let mut rewriter = PatternRewriter::new();
        assert!(BroadcastInDimPattern.match_and_rewrite(&mut h.ctx, op.op_ref(), &mut rewriter));

        let built: Vec<OpRef> = h
            .ctx
            .uses(v[0])
            .iter()
            .map(|u| u.user)
            .filter(|&user| user != op.op_ref())
            .collect();
        assert_eq!(built.len(), 1);
        assert!(h.ctx.op_is(built[0], "linalg", "generic"));
        assert_eq!(h.ctx.op(built[0]).parent_block, None);
        assert_eq!(linalg::verify_structured(&h.ctx, built[0]), Ok(()));
    }
}
