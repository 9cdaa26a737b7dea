//! Scalar semantics of element-wise ops.
//!
//! A [`ScalarOpDelegate`] turns one [`PointwiseKind`] into the `arith` ops
//! that compute a single element. [`StandardScalarOps`] is the default.

use smallvec::{SmallVec, smallvec};

use tessel_ir::dialect::arith::{self, CmpFPredicate, CmpIPredicate};
use tessel_ir::dialect::core::ScalarKind;
use tessel_ir::dialect::lhlo::{ComparisonDirection, PointwiseKind};
use tessel_ir::printer::print_type;
use tessel_ir::{DialectOp, IrContext, Location, OpRef, TypeRef, ValueRef};

use crate::errors::ScalarLoweringError;

/// Creates the detached scalar ops realizing `kind`.
///
/// The ops are returned in execution order; the results of the last one
/// correspond 1:1 to `result_types`.
pub trait ScalarOpDelegate {
    /// Decide from types alone whether `emit` can realize `kind`.
    ///
    /// Runs before the loop body is allocated. A refusal here leaves the IR
    /// untouched, while a refusal from `emit` strands the body block.
    fn check(
        &self,
        _ctx: &IrContext,
        _kind: PointwiseKind,
        _result_types: &[TypeRef],
        _arg_types: &[TypeRef],
    ) -> Result<(), ScalarLoweringError> {
        Ok(())
    }

    fn emit(
        &self,
        ctx: &mut IrContext,
        location: Location,
        kind: PointwiseKind,
        result_types: &[TypeRef],
        args: &[ValueRef],
    ) -> Result<SmallVec<[OpRef; 2]>, ScalarLoweringError>;
}

/// Lowers every element-wise kind to `arith` ops.
///
/// Integers are treated as signed. Floats use ordered comparisons.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardScalarOps;

fn expected_arity(kind: PointwiseKind) -> usize {
    match kind {
        PointwiseKind::Exp => 1,
        PointwiseKind::Select => 3,
        _ => 2,
    }
}

fn float_predicate(direction: ComparisonDirection) -> CmpFPredicate {
    match direction {
        ComparisonDirection::Eq => CmpFPredicate::Oeq,
        ComparisonDirection::Ne => CmpFPredicate::One,
        ComparisonDirection::Lt => CmpFPredicate::Olt,
        ComparisonDirection::Le => CmpFPredicate::Ole,
        ComparisonDirection::Gt => CmpFPredicate::Ogt,
        ComparisonDirection::Ge => CmpFPredicate::Oge,
    }
}

fn int_predicate(direction: ComparisonDirection) -> CmpIPredicate {
    match direction {
        ComparisonDirection::Eq => CmpIPredicate::Eq,
        ComparisonDirection::Ne => CmpIPredicate::Ne,
        ComparisonDirection::Lt => CmpIPredicate::Slt,
        ComparisonDirection::Le => CmpIPredicate::Sle,
        ComparisonDirection::Gt => CmpIPredicate::Sgt,
        ComparisonDirection::Ge => CmpIPredicate::Sge,
    }
}

/// `cmp(lhs, rhs) ? lhs : rhs`
fn compare_and_select(
    ctx: &mut IrContext,
    location: Location,
    element: ScalarKind,
    direction: ComparisonDirection,
    lhs: ValueRef,
    rhs: ValueRef,
    result_ty: TypeRef,
) -> SmallVec<[OpRef; 2]> {
    let cmp = if element.is_float() {
        arith::cmpf(ctx, location, float_predicate(direction), lhs, rhs).op_ref()
    } else {
        arith::cmpi(ctx, location, int_predicate(direction), lhs, rhs).op_ref()
    };
    let cond = ctx.op_result(cmp, 0);
    let select = arith::select(ctx, location, cond, lhs, rhs, result_ty);
    smallvec![cmp, select.op_ref()]
}

/// Result type and element kind of a supported `kind`, or why it is not.
fn classify(
    ctx: &IrContext,
    kind: PointwiseKind,
    result_types: &[TypeRef],
    arg_types: &[TypeRef],
) -> Result<(TypeRef, ScalarKind), ScalarLoweringError> {
    let &[result_ty] = result_types else {
        return Err(ScalarLoweringError::ResultCount {
            kind,
            actual: result_types.len(),
        });
    };
    let expected = expected_arity(kind);
    if arg_types.len() != expected {
        return Err(ScalarLoweringError::Arity {
            kind,
            expected,
            actual: arg_types.len(),
        });
    }

    // Comparisons produce i1, so their element type comes from the inputs.
    let element_ty = match kind {
        PointwiseKind::Compare(_) => arg_types[0],
        _ => result_ty,
    };
    let element = ScalarKind::of(ctx, element_ty).filter(|e| e.is_int_or_float());
    match (kind, element) {
        (PointwiseKind::And, Some(e)) if e.is_float() => {}
        (PointwiseKind::Exp, Some(e)) if !e.is_float() => {}
        (_, Some(e)) => return Ok((result_ty, e)),
        (_, None) => {}
    }
    Err(ScalarLoweringError::UnsupportedElement {
        kind,
        element: print_type(ctx, element_ty),
    })
}

impl ScalarOpDelegate for StandardScalarOps {
    fn check(
        &self,
        ctx: &IrContext,
        kind: PointwiseKind,
        result_types: &[TypeRef],
        arg_types: &[TypeRef],
    ) -> Result<(), ScalarLoweringError> {
        classify(ctx, kind, result_types, arg_types).map(|_| ())
    }

    fn emit(
        &self,
        ctx: &mut IrContext,
        location: Location,
        kind: PointwiseKind,
        result_types: &[TypeRef],
        args: &[ValueRef],
    ) -> Result<SmallVec<[OpRef; 2]>, ScalarLoweringError> {
        let arg_types: SmallVec<[TypeRef; 3]> = args.iter().map(|&a| ctx.value_ty(a)).collect();
        let (result_ty, element) = classify(ctx, kind, result_types, &arg_types)?;
        let is_float = element.is_float();

        let single = |op: OpRef| -> SmallVec<[OpRef; 2]> { smallvec![op] };
        let ops = match kind {
            PointwiseKind::Add if is_float => {
                single(arith::addf(ctx, location, args[0], args[1], result_ty).op_ref())
            }
            PointwiseKind::Add => {
                single(arith::addi(ctx, location, args[0], args[1], result_ty).op_ref())
            }
            PointwiseKind::Sub if is_float => {
                single(arith::subf(ctx, location, args[0], args[1], result_ty).op_ref())
            }
            PointwiseKind::Sub => {
                single(arith::subi(ctx, location, args[0], args[1], result_ty).op_ref())
            }
            PointwiseKind::Mul if is_float => {
                single(arith::mulf(ctx, location, args[0], args[1], result_ty).op_ref())
            }
            PointwiseKind::Mul => {
                single(arith::muli(ctx, location, args[0], args[1], result_ty).op_ref())
            }
            PointwiseKind::Div if is_float => {
                single(arith::divf(ctx, location, args[0], args[1], result_ty).op_ref())
            }
            PointwiseKind::Div => {
                single(arith::divsi(ctx, location, args[0], args[1], result_ty).op_ref())
            }
            PointwiseKind::And => {
                single(arith::andi(ctx, location, args[0], args[1], result_ty).op_ref())
            }
            PointwiseKind::Exp => single(arith::exp(ctx, location, args[0], result_ty).op_ref()),
            PointwiseKind::Compare(direction) if is_float => single(
                arith::cmpf(ctx, location, float_predicate(direction), args[0], args[1]).op_ref(),
            ),
            PointwiseKind::Compare(direction) => single(
                arith::cmpi(ctx, location, int_predicate(direction), args[0], args[1]).op_ref(),
            ),
            PointwiseKind::Max => compare_and_select(
                ctx,
                location,
                element,
                ComparisonDirection::Gt,
                args[0],
                args[1],
                result_ty,
            ),
            PointwiseKind::Min => compare_and_select(
                ctx,
                location,
                element,
                ComparisonDirection::Lt,
                args[0],
                args[1],
                result_ty,
            ),
            PointwiseKind::Select => single(
                arith::select(ctx, location, args[0], args[1], args[2], result_ty).op_ref(),
            ),
        };
        Ok(ops)
    }
}
