//! Core dialect: the module container and builtin types.
//!
//! Types:
//! - `core.i{bits}` - integer (e.g. `core.i32`)
//! - `core.f{bits}` - floating point (e.g. `core.f32`)
//! - `core.index` - loop coordinate
//! - `core.memref(elem) {shape = [..]}` - ranked buffer; `unit` marks a dynamic extent
//! - `core.unranked_memref(elem)` - buffer of unknown rank
//! - `core.tensor(elem) {shape = [..]}` - value-semantic tensor

use smallvec::SmallVec;

use crate::context::{BlockData, IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::ops::{ConversionError, single_region};
use crate::refs::{BlockRef, RegionRef, TypeRef};
use crate::symbol::Symbol;
use crate::types::{Attribute, TypeDataBuilder};

crate::symbols! {
    DIALECT_NAME => "core",
    ATTR_SYM_NAME => "sym_name",
    ATTR_SHAPE => "shape",
    INDEX => "index",
    MEMREF => "memref",
    UNRANKED_MEMREF => "unranked_memref",
    TENSOR => "tensor",
}

crate::dialect_ops! {
    /// `core.module`: top-level container with a single-block body.
    Module => ("core", "module"),
}

/// Create an empty `core.module` named `name`.
pub fn module(ctx: &mut IrContext, location: Location, name: Symbol) -> Module {
    let block = ctx.create_block(BlockData::new(location, []));
    let body = ctx.create_single_block_region(location, block);
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("module"))
        .attr(ATTR_SYM_NAME(), Attribute::Symbol(name))
        .region(body)
        .create(ctx);
    Module(op)
}

impl Module {
    pub fn body(&self, ctx: &IrContext) -> Result<RegionRef, ConversionError> {
        single_region(ctx, self.0)
    }

    pub fn first_block(&self, ctx: &IrContext) -> Option<BlockRef> {
        let body = self.body(ctx).ok()?;
        ctx.region(body).blocks.first().copied()
    }
}

// ============================================================================
// Type constructors
// ============================================================================

/// A buffer extent: known at compile time or dynamic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dim {
    Fixed(u64),
    Dynamic,
}

pub fn int(ctx: &mut IrContext, bits: u32) -> TypeRef {
    let name = Symbol::from_dynamic(&format!("i{bits}"));
    ctx.types
        .intern(TypeDataBuilder::new(DIALECT_NAME(), name).build())
}

pub fn float(ctx: &mut IrContext, bits: u32) -> TypeRef {
    let name = Symbol::from_dynamic(&format!("f{bits}"));
    ctx.types
        .intern(TypeDataBuilder::new(DIALECT_NAME(), name).build())
}

pub fn index(ctx: &mut IrContext) -> TypeRef {
    ctx.types
        .intern(TypeDataBuilder::new(DIALECT_NAME(), INDEX()).build())
}

/// Statically shaped buffer.
pub fn memref(ctx: &mut IrContext, element: TypeRef, shape: &[u64]) -> TypeRef {
    let dims: SmallVec<[Dim; 4]> = shape.iter().map(|&n| Dim::Fixed(n)).collect();
    memref_with_dims(ctx, element, &dims)
}

/// Buffer whose extents may be dynamic.
pub fn memref_with_dims(ctx: &mut IrContext, element: TypeRef, dims: &[Dim]) -> TypeRef {
    ctx.types.intern(
        TypeDataBuilder::new(DIALECT_NAME(), MEMREF())
            .param(element)
            .attr(ATTR_SHAPE(), shape_attr(dims))
            .build(),
    )
}

pub fn unranked_memref(ctx: &mut IrContext, element: TypeRef) -> TypeRef {
    ctx.types.intern(
        TypeDataBuilder::new(DIALECT_NAME(), UNRANKED_MEMREF())
            .param(element)
            .build(),
    )
}

pub fn tensor(ctx: &mut IrContext, element: TypeRef, shape: &[u64]) -> TypeRef {
    let dims: SmallVec<[Dim; 4]> = shape.iter().map(|&n| Dim::Fixed(n)).collect();
    ctx.types.intern(
        TypeDataBuilder::new(DIALECT_NAME(), TENSOR())
            .param(element)
            .attr(ATTR_SHAPE(), shape_attr(&dims))
            .build(),
    )
}

fn shape_attr(dims: &[Dim]) -> Attribute {
    Attribute::List(
        dims.iter()
            .map(|d| match d {
                Dim::Fixed(n) => Attribute::IntBits(*n),
                Dim::Dynamic => Attribute::Unit,
            })
            .collect(),
    )
}

// ============================================================================
// Type views
// ============================================================================

/// A ranked buffer type viewed as element plus extents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemRefType {
    pub element: TypeRef,
    pub shape: SmallVec<[Dim; 4]>,
}

impl MemRefType {
    /// View `ty` as a ranked buffer. Returns `None` for anything else,
    /// including unranked buffers and tensors.
    pub fn from_type(ctx: &IrContext, ty: TypeRef) -> Option<Self> {
        let data = ctx.types.get(ty);
        if data.dialect != DIALECT_NAME() || data.name != MEMREF() {
            return None;
        }
        let element = *data.params.first()?;
        let shape = data
            .attrs
            .get(&ATTR_SHAPE())?
            .as_list()?
            .iter()
            .map(|a| match a {
                Attribute::IntBits(n) => Some(Dim::Fixed(*n)),
                Attribute::Unit => Some(Dim::Dynamic),
                _ => None,
            })
            .collect::<Option<_>>()?;
        Some(Self { element, shape })
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Extents, if every one is known.
    pub fn static_shape(&self) -> Option<SmallVec<[u64; 4]>> {
        self.shape
            .iter()
            .map(|d| match d {
                Dim::Fixed(n) => Some(*n),
                Dim::Dynamic => None,
            })
            .collect()
    }
}

/// Scalar type classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Int(u32),
    Float(u32),
    Index,
}

impl ScalarKind {
    pub fn of(ctx: &IrContext, ty: TypeRef) -> Option<Self> {
        let data = ctx.types.get(ty);
        if data.dialect != DIALECT_NAME() || !data.params.is_empty() {
            return None;
        }
        data.name.with_str(|name| {
            if name == "index" {
                return Some(ScalarKind::Index);
            }
            if let Some(bits) = name.strip_prefix('i') {
                return bits.parse().ok().map(ScalarKind::Int);
            }
            if let Some(bits) = name.strip_prefix('f') {
                return bits.parse().ok().map(ScalarKind::Float);
            }
            None
        })
    }

    pub fn is_int_or_float(self) -> bool {
        matches!(self, ScalarKind::Int(_) | ScalarKind::Float(_))
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarKind::Float(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Span;

    fn ctx() -> (IrContext, Location) {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern("core.lhlo".to_owned());
        (ctx, Location::new(path, Span::new(0, 0)))
    }

    #[test]
    fn scalar_kinds() {
        let (mut ctx, _) = ctx();
        let i1 = int(&mut ctx, 1);
        let f16 = float(&mut ctx, 16);
        let idx = index(&mut ctx);
        let buf = memref(&mut ctx, f16, &[2]);
        assert_eq!(ScalarKind::of(&ctx, i1), Some(ScalarKind::Int(1)));
        assert_eq!(ScalarKind::of(&ctx, f16), Some(ScalarKind::Float(16)));
        assert_eq!(ScalarKind::of(&ctx, idx), Some(ScalarKind::Index));
        assert!(!ScalarKind::Index.is_int_or_float());
        assert_eq!(ScalarKind::of(&ctx, buf), None);
    }

    #[test]
    fn memref_views() {
        let (mut ctx, _) = ctx();
        let f32_ty = float(&mut ctx, 32);
        let fixed = memref(&mut ctx, f32_ty, &[2, 3]);
        let dynamic = memref_with_dims(&mut ctx, f32_ty, &[Dim::Fixed(2), Dim::Dynamic]);
        let unranked = unranked_memref(&mut ctx, f32_ty);
        let t = tensor(&mut ctx, f32_ty, &[2, 3]);

        let view = MemRefType::from_type(&ctx, fixed).unwrap();
        assert_eq!(view.rank(), 2);
        assert_eq!(view.element, f32_ty);
        assert_eq!(view.static_shape().unwrap().as_slice(), &[2, 3]);

        let view = MemRefType::from_type(&ctx, dynamic).unwrap();
        assert_eq!(view.shape.as_slice(), &[Dim::Fixed(2), Dim::Dynamic]);
        assert_eq!(view.static_shape(), None);

        assert_eq!(MemRefType::from_type(&ctx, unranked), None);
        assert_eq!(MemRefType::from_type(&ctx, t), None);
    }

    #[test]
    fn module_body_starts_empty() {
        let (mut ctx, loc) = ctx();
        let m = module(&mut ctx, loc, Symbol::new("m"));
        let block = m.first_block(&ctx).unwrap();
        assert!(ctx.block(block).ops.is_empty());
    }
}
