//! LHLO dialect: element-wise ops over buffers.
//!
//! Every op writes into its last operand and produces no results. Inputs
//! come first, in the order listed for each constructor.

use smallvec::SmallVec;

use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::ops::ConversionError;
use crate::refs::{OpRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

crate::symbols! {
    DIALECT_NAME => "lhlo",
    ATTR_COMPARISON_DIRECTION => "comparison_direction",
    ATTR_BROADCAST_DIMENSIONS => "broadcast_dimensions",
    ATTR_IOTA_DIMENSION => "iota_dimension",
}

crate::dialect_ops! {
    Add => ("lhlo", "add"),
    And => ("lhlo", "and"),
    /// `lhlo.compare {comparison_direction = @LT}`
    Compare => ("lhlo", "compare"),
    Div => ("lhlo", "div"),
    Exp => ("lhlo", "exp"),
    Max => ("lhlo", "max"),
    Min => ("lhlo", "min"),
    Mul => ("lhlo", "mul"),
    /// `lhlo.select pred, on_true, on_false, out`
    Select => ("lhlo", "select"),
    Sub => ("lhlo", "sub"),
    /// `lhlo.broadcast_in_dim operand, out {broadcast_dimensions = [..]}`
    BroadcastInDim => ("lhlo", "broadcast_in_dim"),
    /// `lhlo.iota out {iota_dimension = n}`
    Iota => ("lhlo", "iota"),
}

fn create(
    ctx: &mut IrContext,
    location: Location,
    name: &'static str,
    operands: impl IntoIterator<Item = ValueRef>,
) -> OpRef {
    OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new(name))
        .operands(operands)
        .create(ctx)
}

pub fn add(
    ctx: &mut IrContext,
    location: Location,
    lhs: ValueRef,
    rhs: ValueRef,
    out: ValueRef,
) -> Add {
    Add(create(ctx, location, "add", [lhs, rhs, out]))
}

pub fn and(
    ctx: &mut IrContext,
    location: Location,
    lhs: ValueRef,
    rhs: ValueRef,
    out: ValueRef,
) -> And {
    And(create(ctx, location, "and", [lhs, rhs, out]))
}

pub fn div(
    ctx: &mut IrContext,
    location: Location,
    lhs: ValueRef,
    rhs: ValueRef,
    out: ValueRef,
) -> Div {
    Div(create(ctx, location, "div", [lhs, rhs, out]))
}

pub fn max(
    ctx: &mut IrContext,
    location: Location,
    lhs: ValueRef,
    rhs: ValueRef,
    out: ValueRef,
) -> Max {
    Max(create(ctx, location, "max", [lhs, rhs, out]))
}

pub fn min(
    ctx: &mut IrContext,
    location: Location,
    lhs: ValueRef,
    rhs: ValueRef,
    out: ValueRef,
) -> Min {
    Min(create(ctx, location, "min", [lhs, rhs, out]))
}

pub fn mul(
    ctx: &mut IrContext,
    location: Location,
    lhs: ValueRef,
    rhs: ValueRef,
    out: ValueRef,
) -> Mul {
    Mul(create(ctx, location, "mul", [lhs, rhs, out]))
}

pub fn sub(
    ctx: &mut IrContext,
    location: Location,
    lhs: ValueRef,
    rhs: ValueRef,
    out: ValueRef,
) -> Sub {
    Sub(create(ctx, location, "sub", [lhs, rhs, out]))
}

pub fn exp(ctx: &mut IrContext, location: Location, input: ValueRef, out: ValueRef) -> Exp {
    Exp(create(ctx, location, "exp", [input, out]))
}

pub fn compare(
    ctx: &mut IrContext,
    location: Location,
    lhs: ValueRef,
    rhs: ValueRef,
    out: ValueRef,
    direction: ComparisonDirection,
) -> Compare {
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("compare"))
        .operands([lhs, rhs, out])
        .attr(ATTR_COMPARISON_DIRECTION(), Attribute::Symbol(direction.symbol()))
        .create(ctx);
    Compare(op)
}

pub fn select(
    ctx: &mut IrContext,
    location: Location,
    pred: ValueRef,
    on_true: ValueRef,
    on_false: ValueRef,
    out: ValueRef,
) -> Select {
    Select(create(ctx, location, "select", [pred, on_true, on_false, out]))
}

/// `broadcast_dimensions` may be omitted; such an op is left alone by lowering.
pub fn broadcast_in_dim(
    ctx: &mut IrContext,
    location: Location,
    operand: ValueRef,
    out: ValueRef,
    broadcast_dimensions: Option<&[u64]>,
) -> BroadcastInDim {
    let mut builder =
        OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("broadcast_in_dim"))
            .operands([operand, out]);
    if let Some(dims) = broadcast_dimensions {
        builder = builder.attr(
            ATTR_BROADCAST_DIMENSIONS(),
            Attribute::List(dims.iter().map(|&d| Attribute::IntBits(d)).collect()),
        );
    }
    BroadcastInDim(builder.create(ctx))
}

pub fn iota(ctx: &mut IrContext, location: Location, out: ValueRef, iota_dimension: u64) -> Iota {
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("iota"))
        .operand(out)
        .attr(ATTR_IOTA_DIMENSION(), Attribute::IntBits(iota_dimension))
        .create(ctx);
    Iota(op)
}

impl Compare {
    pub fn direction(&self, ctx: &IrContext) -> Result<ComparisonDirection, ConversionError> {
        let attr = ctx
            .op(self.0)
            .attributes
            .get(&ATTR_COMPARISON_DIRECTION())
            .ok_or(ConversionError::MissingAttribute("comparison_direction"))?;
        attr.as_symbol()
            .and_then(ComparisonDirection::from_symbol)
            .ok_or(ConversionError::WrongAttributeType("comparison_direction"))
    }
}

impl BroadcastInDim {
    pub fn operand(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn output(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[1]
    }

    /// `Ok(None)` when the attribute is absent.
    pub fn broadcast_dimensions(
        &self,
        ctx: &IrContext,
    ) -> Result<Option<SmallVec<[u64; 4]>>, ConversionError> {
        match ctx.op(self.0).attributes.get(&ATTR_BROADCAST_DIMENSIONS()) {
            None => Ok(None),
            Some(attr) => attr
                .as_u64_list()
                .map(Some)
                .ok_or(ConversionError::WrongAttributeType("broadcast_dimensions")),
        }
    }
}

impl Iota {
    pub fn output(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn iota_dimension(&self, ctx: &IrContext) -> Result<u64, ConversionError> {
        ctx.op(self.0)
            .attributes
            .get(&ATTR_IOTA_DIMENSION())
            .ok_or(ConversionError::MissingAttribute("iota_dimension"))?
            .as_u64()
            .ok_or(ConversionError::WrongAttributeType("iota_dimension"))
    }
}

// ============================================================================
// Comparison direction
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComparisonDirection {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonDirection::Eq => "EQ",
            ComparisonDirection::Ne => "NE",
            ComparisonDirection::Lt => "LT",
            ComparisonDirection::Le => "LE",
            ComparisonDirection::Gt => "GT",
            ComparisonDirection::Ge => "GE",
        }
    }

    pub fn symbol(self) -> Symbol {
        Symbol::new(self.as_str())
    }

    pub fn from_symbol(sym: Symbol) -> Option<Self> {
        sym.with_str(|s| match s {
            "EQ" => Some(ComparisonDirection::Eq),
            "NE" => Some(ComparisonDirection::Ne),
            "LT" => Some(ComparisonDirection::Lt),
            "LE" => Some(ComparisonDirection::Le),
            "GT" => Some(ComparisonDirection::Gt),
            "GE" => Some(ComparisonDirection::Ge),
            _ => None,
        })
    }
}

// ============================================================================
// Pointwise classification
// ============================================================================

/// The element-wise ops, by name only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointwiseOp {
    Add,
    And,
    Compare,
    Div,
    Exp,
    Max,
    Min,
    Mul,
    Select,
    Sub,
}

impl PointwiseOp {
    pub const ALL: [PointwiseOp; 10] = [
        PointwiseOp::Add,
        PointwiseOp::And,
        PointwiseOp::Compare,
        PointwiseOp::Div,
        PointwiseOp::Exp,
        PointwiseOp::Max,
        PointwiseOp::Min,
        PointwiseOp::Mul,
        PointwiseOp::Select,
        PointwiseOp::Sub,
    ];

    pub fn op_name(self) -> &'static str {
        match self {
            PointwiseOp::Add => "add",
            PointwiseOp::And => "and",
            PointwiseOp::Compare => "compare",
            PointwiseOp::Div => "div",
            PointwiseOp::Exp => "exp",
            PointwiseOp::Max => "max",
            PointwiseOp::Min => "min",
            PointwiseOp::Mul => "mul",
            PointwiseOp::Select => "select",
            PointwiseOp::Sub => "sub",
        }
    }

    /// Number of buffer inputs, not counting the output.
    pub fn num_inputs(self) -> usize {
        match self {
            PointwiseOp::Exp => 1,
            PointwiseOp::Select => 3,
            _ => 2,
        }
    }

    pub fn matches(self, ctx: &IrContext, op: OpRef) -> bool {
        ctx.op_is(op, "lhlo", self.op_name())
    }
}

/// The scalar computation an element-wise op performs, with any op
/// attributes that change its meaning resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointwiseKind {
    Add,
    And,
    Compare(ComparisonDirection),
    Div,
    Exp,
    Max,
    Min,
    Mul,
    Select,
    Sub,
}

impl PointwiseKind {
    /// Resolve the kind of `op`, which must be the element-wise op `which`.
    pub fn resolve(
        ctx: &IrContext,
        op: OpRef,
        which: PointwiseOp,
    ) -> Result<Self, ConversionError> {
        use crate::ops::DialectOp;

        if !which.matches(ctx, op) {
            return Err(ConversionError::WrongOperation {
                expected: which.op_name(),
                actual: ctx.op(op).full_name(),
            });
        }
        Ok(match which {
            PointwiseOp::Add => PointwiseKind::Add,
            PointwiseOp::And => PointwiseKind::And,
            PointwiseOp::Compare => {
                PointwiseKind::Compare(Compare::from_op(ctx, op)?.direction(ctx)?)
            }
            PointwiseOp::Div => PointwiseKind::Div,
            PointwiseOp::Exp => PointwiseKind::Exp,
            PointwiseOp::Max => PointwiseKind::Max,
            PointwiseOp::Min => PointwiseKind::Min,
            PointwiseOp::Mul => PointwiseKind::Mul,
            PointwiseOp::Select => PointwiseKind::Select,
            PointwiseOp::Sub => PointwiseKind::Sub,
        })
    }
}
