//! Linalg dialect: generic parallel-loop ops over buffers.
//!
//! A structured op carries operands `inputs ++ outputs`, one indexing map
//! per operand, one iterator type per loop and a single-block body. The
//! body takes one scalar per operand (preceded by one `core.index` per
//! loop for `indexed_generic`) and ends in `linalg.yield`.

use derive_more::Display;
use smallvec::SmallVec;

use crate::affine::AffineMap;
use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::ops::{ConversionError, DialectOp, single_region};
use crate::refs::{BlockRef, OpRef, RegionRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

use super::core::{MemRefType, ScalarKind};

crate::symbols! {
    DIALECT_NAME => "linalg",
    ATTR_INDEXING_MAPS => "indexing_maps",
    ATTR_ITERATOR_TYPES => "iterator_types",
    ATTR_N_VIEWS => "n_views",
}

pub const PARALLEL: &str = "parallel";

crate::dialect_ops! {
    /// `linalg.generic`
    Generic => ("linalg", "generic"),
    /// `linalg.generic` whose body also receives the loop coordinates.
    IndexedGeneric => ("linalg", "indexed_generic"),
    /// `linalg.yield`: body terminator.
    Yield => ("linalg", "yield"),
}

/// Operands and attributes shared by both structured op flavors.
pub struct StructuredParts<'a> {
    pub inputs: &'a [ValueRef],
    pub outputs: &'a [ValueRef],
    pub indexing_maps: Vec<AffineMap>,
    pub num_loops: u32,
}

fn create_structured(
    ctx: &mut IrContext,
    location: Location,
    name: &'static str,
    parts: StructuredParts<'_>,
    body: RegionRef,
) -> OpRef {
    let maps = parts
        .indexing_maps
        .into_iter()
        .map(Attribute::AffineMap)
        .collect();
    let iterators = (0..parts.num_loops)
        .map(|_| Attribute::String(PARALLEL.to_owned()))
        .collect();
    let n_views = vec![
        Attribute::IntBits(parts.inputs.len() as u64),
        Attribute::IntBits(parts.outputs.len() as u64),
    ];
    OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new(name))
        .operands(parts.inputs.iter().copied())
        .operands(parts.outputs.iter().copied())
        .attr(ATTR_INDEXING_MAPS(), Attribute::List(maps))
        .attr(ATTR_ITERATOR_TYPES(), Attribute::List(iterators))
        .attr(ATTR_N_VIEWS(), Attribute::List(n_views))
        .region(body)
        .create(ctx)
}

pub fn generic(
    ctx: &mut IrContext,
    location: Location,
    parts: StructuredParts<'_>,
    body: RegionRef,
) -> Generic {
    Generic(create_structured(ctx, location, "generic", parts, body))
}

pub fn indexed_generic(
    ctx: &mut IrContext,
    location: Location,
    parts: StructuredParts<'_>,
    body: RegionRef,
) -> IndexedGeneric {
    IndexedGeneric(create_structured(
        ctx,
        location,
        "indexed_generic",
        parts,
        body,
    ))
}

pub fn r#yield(
    ctx: &mut IrContext,
    location: Location,
    values: impl IntoIterator<Item = ValueRef>,
) -> Yield {
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("yield"))
        .operands(values)
        .create(ctx);
    Yield(op)
}

// ============================================================================
// Accessors
// ============================================================================

/// Read-only view over either structured op flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StructuredOp {
    op: OpRef,
    indexed: bool,
}

impl StructuredOp {
    pub fn from_op(ctx: &IrContext, op: OpRef) -> Option<Self> {
        if Generic::matches(ctx, op) {
            Some(Self { op, indexed: false })
        } else if IndexedGeneric::matches(ctx, op) {
            Some(Self { op, indexed: true })
        } else {
            None
        }
    }

    pub fn op_ref(&self) -> OpRef {
        self.op
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// `(n_inputs, n_outputs)`.
    pub fn n_views(&self, ctx: &IrContext) -> Result<(usize, usize), ConversionError> {
        let list = ctx
            .op(self.op)
            .attributes
            .get(&ATTR_N_VIEWS())
            .ok_or(ConversionError::MissingAttribute("n_views"))?
            .as_u64_list()
            .ok_or(ConversionError::WrongAttributeType("n_views"))?;
        match list.as_slice() {
            [n_in, n_out] => Ok((*n_in as usize, *n_out as usize)),
            _ => Err(ConversionError::WrongAttributeType("n_views")),
        }
    }

    pub fn inputs<'a>(&self, ctx: &'a IrContext) -> Result<&'a [ValueRef], ConversionError> {
        let (n_in, _) = self.n_views(ctx)?;
        let operands = ctx.op_operands(self.op);
        operands
            .get(..n_in)
            .ok_or(ConversionError::WrongOperandCount {
                expected: n_in,
                actual: operands.len(),
            })
    }

    pub fn outputs<'a>(&self, ctx: &'a IrContext) -> Result<&'a [ValueRef], ConversionError> {
        let (n_in, _) = self.n_views(ctx)?;
        let operands = ctx.op_operands(self.op);
        operands
            .get(n_in..)
            .ok_or(ConversionError::WrongOperandCount {
                expected: n_in,
                actual: operands.len(),
            })
    }

    pub fn indexing_maps(&self, ctx: &IrContext) -> Result<Vec<AffineMap>, ConversionError> {
        ctx.op(self.op)
            .attributes
            .get(&ATTR_INDEXING_MAPS())
            .ok_or(ConversionError::MissingAttribute("indexing_maps"))?
            .as_list()
            .ok_or(ConversionError::WrongAttributeType("indexing_maps"))?
            .iter()
            .map(|a| match a {
                Attribute::AffineMap(m) => Ok(m.clone()),
                _ => Err(ConversionError::WrongAttributeType("indexing_maps")),
            })
            .collect()
    }

    pub fn iterator_types(&self, ctx: &IrContext) -> Result<Vec<String>, ConversionError> {
        ctx.op(self.op)
            .attributes
            .get(&ATTR_ITERATOR_TYPES())
            .ok_or(ConversionError::MissingAttribute("iterator_types"))?
            .as_list()
            .ok_or(ConversionError::WrongAttributeType("iterator_types"))?
            .iter()
            .map(|a| match a {
                Attribute::String(s) => Ok(s.clone()),
                _ => Err(ConversionError::WrongAttributeType("iterator_types")),
            })
            .collect()
    }

    pub fn body_block(&self, ctx: &IrContext) -> Result<BlockRef, ConversionError> {
        let region = single_region(ctx, self.op)?;
        ctx.region(region)
            .blocks
            .first()
            .copied()
            .ok_or(ConversionError::MissingRegion)
    }
}

// ============================================================================
// Verification
// ============================================================================

/// A structural defect in a `linalg.generic` / `linalg.indexed_generic`.
#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum StructuredOpError {
    #[display("not a structured op")]
    NotStructured,
    #[display("{_0}")]
    Malformed(ConversionError),
    #[display("n_views ({n_in}, {n_out}) does not cover {operands} operands")]
    ViewCountMismatch {
        n_in: usize,
        n_out: usize,
        operands: usize,
    },
    #[display("{maps} indexing maps for {operands} operands")]
    MapCountMismatch { maps: usize, operands: usize },
    #[display("iterator type `{_0}` is not parallel")]
    NonParallelIterator(String),
    #[display("operand {_0} is not a ranked buffer")]
    OperandNotBuffer(usize),
    #[display("map {index} has {actual} dims, loop rank is {expected}")]
    MapDimMismatch {
        index: usize,
        expected: u32,
        actual: u32,
    },
    #[display("map {index} has {actual} results, operand rank is {expected}")]
    MapResultMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[display("map {_0} references a loop coordinate out of range")]
    MapDimOutOfRange(usize),
    #[display("body has {actual} arguments, expected {expected}")]
    BodyArgCount { expected: usize, actual: usize },
    #[display("body argument {_0} has the wrong type")]
    BodyArgType(usize),
    #[display("body does not end in linalg.yield")]
    MissingYield,
    #[display("linalg.yield has {actual} operands, expected {expected}")]
    YieldCount { expected: usize, actual: usize },
    #[display("yielded value {_0} does not match its output element type")]
    YieldType(usize),
}

impl std::error::Error for StructuredOpError {}

impl From<ConversionError> for StructuredOpError {
    fn from(err: ConversionError) -> Self {
        StructuredOpError::Malformed(err)
    }
}

/// Check the structural invariants of a generic parallel-loop op.
pub fn verify_structured(ctx: &IrContext, op: OpRef) -> Result<(), StructuredOpError> {
    let structured = StructuredOp::from_op(ctx, op).ok_or(StructuredOpError::NotStructured)?;
    let operands = ctx.op_operands(op);

    let (n_in, n_out) = structured.n_views(ctx)?;
    if n_in + n_out != operands.len() {
        return Err(StructuredOpError::ViewCountMismatch {
            n_in,
            n_out,
            operands: operands.len(),
        });
    }

    let maps = structured.indexing_maps(ctx)?;
    if maps.len() != operands.len() {
        return Err(StructuredOpError::MapCountMismatch {
            maps: maps.len(),
            operands: operands.len(),
        });
    }

    let iterators = structured.iterator_types(ctx)?;
    if let Some(bad) = iterators.iter().find(|it| it.as_str() != PARALLEL) {
        return Err(StructuredOpError::NonParallelIterator(bad.clone()));
    }
    let num_loops = iterators.len() as u32;

    let mut element_types: SmallVec<[_; 4]> = SmallVec::with_capacity(operands.len());
    for (index, (&operand, map)) in operands.iter().zip(&maps).enumerate() {
        let buffer = MemRefType::from_type(ctx, ctx.value_ty(operand))
            .ok_or(StructuredOpError::OperandNotBuffer(index))?;
        if map.num_dims() != num_loops {
            return Err(StructuredOpError::MapDimMismatch {
                index,
                expected: num_loops,
                actual: map.num_dims(),
            });
        }
        if map.num_results() != buffer.rank() {
            return Err(StructuredOpError::MapResultMismatch {
                index,
                expected: buffer.rank(),
                actual: map.num_results(),
            });
        }
        if !map.dims_in_range() {
            return Err(StructuredOpError::MapDimOutOfRange(index));
        }
        element_types.push(buffer.element);
    }

    let block = structured.body_block(ctx)?;
    let args = &ctx.block(block).arg_types;
    let num_index_args = if structured.is_indexed() {
        num_loops as usize
    } else {
        0
    };
    let expected = num_index_args + element_types.len();
    if args.len() != expected {
        return Err(StructuredOpError::BodyArgCount {
            expected,
            actual: args.len(),
        });
    }
    for (i, &arg_ty) in args.iter().enumerate() {
        let ok = if i < num_index_args {
            ScalarKind::of(ctx, arg_ty) == Some(ScalarKind::Index)
        } else {
            arg_ty == element_types[i - num_index_args]
        };
        if !ok {
            return Err(StructuredOpError::BodyArgType(i));
        }
    }

    let terminator = match ctx.block(block).ops.last() {
        Some(&last) if Yield::matches(ctx, last) => last,
        _ => return Err(StructuredOpError::MissingYield),
    };
    let yielded = ctx.op_operands(terminator);
    if yielded.len() != n_out {
        return Err(StructuredOpError::YieldCount {
            expected: n_out,
            actual: yielded.len(),
        });
    }
    for (k, &value) in yielded.iter().enumerate() {
        if ctx.value_ty(value) != element_types[n_in + k] {
            return Err(StructuredOpError::YieldType(k));
        }
    }
    Ok(())
}
