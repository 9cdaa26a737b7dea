//! Func dialect.

use crate::context::{BlockData, IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::ops::{ConversionError, single_region};
use crate::refs::{BlockRef, RegionRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

crate::symbols! {
    DIALECT_NAME => "func",
    ATTR_SYM_NAME => "sym_name",
}

crate::dialect_ops! {
    /// `func.func`: a named function whose entry block arguments are its parameters.
    Func => ("func", "func"),
    /// `func.return`
    Return => ("func", "return"),
}

/// Create a `func.func` with an empty entry block taking `params`.
pub fn func(ctx: &mut IrContext, location: Location, name: Symbol, params: &[TypeRef]) -> Func {
    let entry = ctx.create_block(BlockData::new(location, params.iter().copied()));
    let body = ctx.create_single_block_region(location, entry);
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("func"))
        .attr(ATTR_SYM_NAME(), Attribute::Symbol(name))
        .region(body)
        .create(ctx);
    Func(op)
}

pub fn r#return(
    ctx: &mut IrContext,
    location: Location,
    values: impl IntoIterator<Item = ValueRef>,
) -> Return {
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("return"))
        .operands(values)
        .create(ctx);
    Return(op)
}

impl Func {
    pub fn sym_name(&self, ctx: &IrContext) -> Option<Symbol> {
        ctx.op(self.0).attr("sym_name").and_then(Attribute::as_symbol)
    }

    pub fn body(&self, ctx: &IrContext) -> Result<RegionRef, ConversionError> {
        single_region(ctx, self.0)
    }

    pub fn entry_block(&self, ctx: &IrContext) -> Result<BlockRef, ConversionError> {
        let body = self.body(ctx)?;
        ctx.region(body)
            .blocks
            .first()
            .copied()
            .ok_or(ConversionError::MissingRegion)
    }
}
