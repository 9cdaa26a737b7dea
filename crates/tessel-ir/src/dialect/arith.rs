//! Arith dialect: scalar ops for loop bodies.

use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::refs::{TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

use super::core;

crate::symbols! {
    DIALECT_NAME => "arith",
    ATTR_PREDICATE => "predicate",
}

crate::dialect_ops! {
    AddF => ("arith", "addf"),
    AddI => ("arith", "addi"),
    SubF => ("arith", "subf"),
    SubI => ("arith", "subi"),
    MulF => ("arith", "mulf"),
    MulI => ("arith", "muli"),
    DivF => ("arith", "divf"),
    DivSI => ("arith", "divsi"),
    AndI => ("arith", "andi"),
    /// Float comparison producing `core.i1`.
    CmpF => ("arith", "cmpf"),
    /// Signed integer comparison producing `core.i1`.
    CmpI => ("arith", "cmpi"),
    /// `arith.select cond, on_true, on_false`
    Select => ("arith", "select"),
    Exp => ("arith", "exp"),
    /// Index to signless integer.
    IndexCast => ("arith", "index_cast"),
    /// Signed integer to float.
    SIToFP => ("arith", "sitofp"),
}

macro_rules! single_result {
    ($($op:ident),*) => {
        $(
            impl $op {
                pub fn result(&self, ctx: &IrContext) -> ValueRef {
                    ctx.op_result(self.0, 0)
                }
            }
        )*
    };
}

single_result!(
    AddF, AddI, SubF, SubI, MulF, MulI, DivF, DivSI, AndI, CmpF, CmpI, Select, Exp, IndexCast,
    SIToFP
);

macro_rules! binary_constructors {
    ($($fn_name:ident => $op:ident, $name:literal;)*) => {
        $(
            pub fn $fn_name(
                ctx: &mut IrContext,
                location: Location,
                lhs: ValueRef,
                rhs: ValueRef,
                result_ty: TypeRef,
            ) -> $op {
                let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new($name))
                    .operands([lhs, rhs])
                    .result(result_ty)
                    .create(ctx);
                $op(op)
            }
        )*
    };
}

binary_constructors! {
    addf => AddF, "addf";
    addi => AddI, "addi";
    subf => SubF, "subf";
    subi => SubI, "subi";
    mulf => MulF, "mulf";
    muli => MulI, "muli";
    divf => DivF, "divf";
    divsi => DivSI, "divsi";
    andi => AndI, "andi";
}

pub fn cmpf(
    ctx: &mut IrContext,
    location: Location,
    predicate: CmpFPredicate,
    lhs: ValueRef,
    rhs: ValueRef,
) -> CmpF {
    let i1 = core::int(ctx, 1);
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("cmpf"))
        .operands([lhs, rhs])
        .result(i1)
        .attr(ATTR_PREDICATE(), Attribute::Symbol(Symbol::new(predicate.as_str())))
        .create(ctx);
    CmpF(op)
}

pub fn cmpi(
    ctx: &mut IrContext,
    location: Location,
    predicate: CmpIPredicate,
    lhs: ValueRef,
    rhs: ValueRef,
) -> CmpI {
    let i1 = core::int(ctx, 1);
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("cmpi"))
        .operands([lhs, rhs])
        .result(i1)
        .attr(ATTR_PREDICATE(), Attribute::Symbol(Symbol::new(predicate.as_str())))
        .create(ctx);
    CmpI(op)
}

pub fn select(
    ctx: &mut IrContext,
    location: Location,
    cond: ValueRef,
    on_true: ValueRef,
    on_false: ValueRef,
    result_ty: TypeRef,
) -> Select {
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("select"))
        .operands([cond, on_true, on_false])
        .result(result_ty)
        .create(ctx);
    Select(op)
}

fn unary(
    ctx: &mut IrContext,
    location: Location,
    name: &'static str,
    input: ValueRef,
    result_ty: TypeRef,
) -> crate::refs::OpRef {
    OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new(name))
        .operand(input)
        .result(result_ty)
        .create(ctx)
}

pub fn exp(ctx: &mut IrContext, location: Location, input: ValueRef, result_ty: TypeRef) -> Exp {
    Exp(unary(ctx, location, "exp", input, result_ty))
}

pub fn index_cast(
    ctx: &mut IrContext,
    location: Location,
    input: ValueRef,
    result_ty: TypeRef,
) -> IndexCast {
    IndexCast(unary(ctx, location, "index_cast", input, result_ty))
}

pub fn sitofp(
    ctx: &mut IrContext,
    location: Location,
    input: ValueRef,
    result_ty: TypeRef,
) -> SIToFP {
    SIToFP(unary(ctx, location, "sitofp", input, result_ty))
}

/// Ordered float comparison predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpFPredicate {
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
}

impl CmpFPredicate {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpFPredicate::Oeq => "oeq",
            CmpFPredicate::One => "one",
            CmpFPredicate::Olt => "olt",
            CmpFPredicate::Ole => "ole",
            CmpFPredicate::Ogt => "ogt",
            CmpFPredicate::Oge => "oge",
        }
    }
}

/// Signed integer comparison predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpIPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl CmpIPredicate {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpIPredicate::Eq => "eq",
            CmpIPredicate::Ne => "ne",
            CmpIPredicate::Slt => "slt",
            CmpIPredicate::Sle => "sle",
            CmpIPredicate::Sgt => "sgt",
            CmpIPredicate::Sge => "sge",
        }
    }
}
