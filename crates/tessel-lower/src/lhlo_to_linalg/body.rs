//! Loop bodies for the generated structured ops.
//!
//! Every builder returns a fresh single-block region whose block takes one
//! scalar per operand (after the loop coordinates for the indexed flavor)
//! and ends in `linalg.yield`.

use tessel_ir::dialect::arith;
use tessel_ir::dialect::core::{self, ScalarKind};
use tessel_ir::dialect::lhlo::PointwiseKind;
use tessel_ir::dialect::linalg;
use tessel_ir::{BlockData, DialectOp, IrContext, Location, RegionRef, TypeRef};

use super::scalar::ScalarOpDelegate;
use crate::errors::MatchFailure;

/// Body applying `kind` to the input elements.
///
/// `element_types` holds one entry per operand, output last. The output
/// element is passed but never read.
pub fn pointwise_body(
    ctx: &mut IrContext,
    location: Location,
    delegate: &dyn ScalarOpDelegate,
    kind: PointwiseKind,
    element_types: &[TypeRef],
) -> Result<RegionRef, MatchFailure> {
    let Some((&result_ty, input_types)) = element_types.split_last() else {
        return Err(MatchFailure::OperandCount {
            expected: 1,
            actual: 0,
        });
    };
    delegate.check(ctx, kind, &[result_ty], input_types)?;

    let block = ctx.create_block(BlockData::new(location, element_types.iter().copied()));
    let args = ctx.block_args(block);
    let inputs = args[..args.len() - 1].to_vec();

    let ops = delegate.emit(ctx, location, kind, &[result_ty], &inputs)?;
    let Some(&last) = ops.last() else {
        return Err(MatchFailure::OperandCount {
            expected: 1,
            actual: 0,
        });
    };
    for &op in &ops {
        ctx.push_op(block, op);
    }
    let values = ctx.op_results(last).to_vec();
    let terminator = linalg::r#yield(ctx, location, values);
    ctx.push_op(block, terminator.op_ref());
    Ok(ctx.create_single_block_region(location, block))
}

/// Body forwarding the source element to the output.
pub fn broadcast_body(
    ctx: &mut IrContext,
    location: Location,
    source_element: TypeRef,
    result_element: TypeRef,
) -> RegionRef {
    let block = ctx.create_block(BlockData::new(location, [source_element, result_element]));
    let source = ctx.block_arg(block, 0);
    let terminator = linalg::r#yield(ctx, location, [source]);
    ctx.push_op(block, terminator.op_ref());
    ctx.create_single_block_region(location, block)
}

/// Body yielding loop coordinate `dimension` converted to `element`.
///
/// Integer elements take an `index_cast`; float elements take an
/// `index_cast` to the integer of the same width followed by `sitofp`.
pub fn iota_body(
    ctx: &mut IrContext,
    location: Location,
    num_loops: usize,
    dimension: usize,
    element: TypeRef,
) -> Result<RegionRef, MatchFailure> {
    let kind = match ScalarKind::of(ctx, element) {
        Some(kind @ (ScalarKind::Int(_) | ScalarKind::Float(_))) => kind,
        _ => return Err(MatchFailure::NonNumericElement(0)),
    };
    if dimension >= num_loops {
        return Err(MatchFailure::IotaDimensionOutOfRange {
            dim: dimension as u64,
            rank: num_loops,
        });
    }

    let index_ty = core::index(ctx);
    let arg_types = std::iter::repeat_n(index_ty, num_loops).chain([element]);
    let block = ctx.create_block(BlockData::new(location, arg_types));
    let coordinate = ctx.block_arg(block, dimension as u32);

    let value = match kind {
        ScalarKind::Float(bits) => {
            let int_ty = core::int(ctx, bits);
            let cast = arith::index_cast(ctx, location, coordinate, int_ty);
            ctx.push_op(block, cast.op_ref());
            let cast_value = cast.result(ctx);
            let convert = arith::sitofp(ctx, location, cast_value, element);
            ctx.push_op(block, convert.op_ref());
            convert.result(ctx)
        }
        _ => {
            let cast = arith::index_cast(ctx, location, coordinate, element);
            ctx.push_op(block, cast.op_ref());
            cast.result(ctx)
        }
    };
    let terminator = linalg::r#yield(ctx, location, [value]);
    ctx.push_op(block, terminator.op_ref());
    Ok(ctx.create_single_block_region(location, block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ScalarLoweringError;
    use crate::lhlo_to_linalg::scalar::StandardScalarOps;
    use smallvec::SmallVec;
    use tessel_ir::{BlockRef, OpRef, Span, ValueRef};

    fn ctx() -> (IrContext, Location) {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern("body.lhlo".to_owned());
        (ctx, Location::new(path, Span::new(0, 0)))
    }

    fn op_names(ctx: &IrContext, region: RegionRef) -> Vec<String> {
        let block = ctx.region(region).blocks[0];
        ctx.block(block)
            .ops
            .iter()
            .map(|&op| ctx.op(op).full_name())
            .collect()
    }

    #[test]
    fn pointwise_body_yields_delegate_result() {
        let (mut ctx, loc) = ctx();
        let f32_ty = core::float(&mut ctx, 32);
        let region = pointwise_body(
            &mut ctx,
            loc,
            &StandardScalarOps,
            PointwiseKind::Add,
            &[f32_ty, f32_ty, f32_ty],
        )
        .unwrap();
        assert_eq!(op_names(&ctx, region), vec!["arith.addf", "linalg.yield"]);

        let block = ctx.region(region).blocks[0];
        let ops = ctx.block(block).ops.to_vec();
        let args = ctx.block_args(block).to_vec();
        assert_eq!(ctx.op_operands(ops[0]), &args[..2]);
        assert_eq!(ctx.op_operands(ops[1]), ctx.op_results(ops[0]));
    }

    #[test]
    fn pointwise_body_propagates_delegate_refusal() {
        let (mut ctx, loc) = ctx();
        let i32_ty = core::int(&mut ctx, 32);
        let err = pointwise_body(
            &mut ctx,
            loc,
            &StandardScalarOps,
            PointwiseKind::Exp,
            &[i32_ty, i32_ty],
        )
        .unwrap_err();
        assert!(matches!(err, MatchFailure::Delegate(_)));
    }

    fn block_number(block: BlockRef) -> usize {
        block.to_string()["block".len()..].parse().unwrap()
    }

    #[test]
    fn refused_body_allocates_no_block() {
        let (mut ctx, loc) = ctx();
        let i32_ty = core::int(&mut ctx, 32);
        let before = ctx.create_block(BlockData::new(loc, []));
        for _ in 0..3 {
            let refused = pointwise_body(
                &mut ctx,
                loc,
                &StandardScalarOps,
                PointwiseKind::Exp,
                &[i32_ty, i32_ty],
            );
            assert!(refused.is_err());
        }
        let after = ctx.create_block(BlockData::new(loc, []));
        assert_eq!(block_number(after), block_number(before) + 1);
    }

    struct RefusesUpFront;

    impl ScalarOpDelegate for RefusesUpFront {
        fn check(
            &self,
            _ctx: &IrContext,
            kind: PointwiseKind,
            _result_types: &[TypeRef],
            arg_types: &[TypeRef],
        ) -> Result<(), ScalarLoweringError> {
            Err(ScalarLoweringError::Arity {
                kind,
                expected: 0,
                actual: arg_types.len(),
            })
        }

        fn emit(
            &self,
            _ctx: &mut IrContext,
            _location: Location,
            _kind: PointwiseKind,
            _result_types: &[TypeRef],
            _args: &[ValueRef],
        ) -> Result<SmallVec<[OpRef; 2]>, ScalarLoweringError> {
            panic!("emit must not run after a failed check")
        }
    }

    #[test]
    fn check_runs_before_emit() {
        let (mut ctx, loc) = ctx();
        let f32_ty = core::float(&mut ctx, 32);
        let err = pointwise_body(
            &mut ctx,
            loc,
            &RefusesUpFront,
            PointwiseKind::Add,
            &[f32_ty, f32_ty, f32_ty],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MatchFailure::Delegate(ScalarLoweringError::Arity { actual: 2, .. })
        ));
    }

    #[test]
    fn broadcast_body_yields_source() {
        let (mut ctx, loc) = ctx();
        let f32_ty = core::float(&mut ctx, 32);
        let region = broadcast_body(&mut ctx, loc, f32_ty, f32_ty);
        let block = ctx.region(region).blocks[0];
        let yield_op = ctx.block(block).ops[0];
        assert_eq!(ctx.op_operands(yield_op), &[ctx.block_arg(block, 0)]);
    }

    #[test]
    fn iota_body_converts_coordinate() {
        let (mut ctx, loc) = ctx();
        let f32_ty = core::float(&mut ctx, 32);
        let i64_ty = core::int(&mut ctx, 64);

        let float_body = iota_body(&mut ctx, loc, 2, 1, f32_ty).unwrap();
        assert_eq!(
            op_names(&ctx, float_body),
            vec!["arith.index_cast", "arith.sitofp", "linalg.yield"]
        );
        let block = ctx.region(float_body).blocks[0];
        let cast = ctx.block(block).ops[0];
        assert_eq!(ctx.op_operands(cast), &[ctx.block_arg(block, 1)]);
        let i32_ty = core::int(&mut ctx, 32);
        assert_eq!(ctx.op_result_types(cast), &[i32_ty]);

        let int_body = iota_body(&mut ctx, loc, 2, 0, i64_ty).unwrap();
        assert_eq!(
            op_names(&ctx, int_body),
            vec!["arith.index_cast", "linalg.yield"]
        );
    }

    #[test]
    fn iota_body_rejects_bad_dimension_and_element() {
        let (mut ctx, loc) = ctx();
        let f32_ty = core::float(&mut ctx, 32);
        let index_ty = core::index(&mut ctx);
        assert_eq!(
            iota_body(&mut ctx, loc, 2, 2, f32_ty),
            Err(MatchFailure::IotaDimensionOutOfRange { dim: 2, rank: 2 })
        );
        assert_eq!(
            iota_body(&mut ctx, loc, 2, 0, index_ty),
            Err(MatchFailure::NonNumericElement(0))
        );
    }
}
