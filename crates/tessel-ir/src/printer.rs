//! Text printer for debugging and snapshot tests.
//!
//! ```text
//! core.module {sym_name = @m} {
//!   func.func @add(%0: core.memref(core.f32) {shape = [2, 2]}, ..) {
//!     linalg.generic %0, %1, %2 {indexing_maps = [..], ..} {
//!       ^bb1(%3: core.f32, %4: core.f32, %5: core.f32):
//!         %6 = arith.addf %3, %4 : core.f32
//!         linalg.yield %6
//!     }
//!     func.return
//!   }
//! }
//! ```
//!
//! Attributes are printed sorted by name so output is stable across runs.

use std::collections::HashMap;
use std::fmt::{self, Write};

use crate::context::IrContext;
use crate::refs::*;
use crate::symbol::Symbol;
use crate::types::Attribute;

struct PrintState<'a> {
    ctx: &'a IrContext,
    value_names: HashMap<ValueRef, String>,
    block_labels: HashMap<BlockRef, String>,
    next_value_num: usize,
    next_block_num: usize,
}

impl<'a> PrintState<'a> {
    fn new(ctx: &'a IrContext) -> Self {
        Self {
            ctx,
            value_names: HashMap::new(),
            block_labels: HashMap::new(),
            next_value_num: 0,
            next_block_num: 0,
        }
    }

    fn assign_value_name(&mut self, v: ValueRef) -> String {
        let name = format!("%{}", self.next_value_num);
        self.next_value_num += 1;
        self.value_names.insert(v, name.clone());
        name
    }

    fn get_value_name(&self, v: ValueRef) -> &str {
        self.value_names.get(&v).map(|s| s.as_str()).unwrap_or("%?")
    }

    fn assign_block_label(&mut self, b: BlockRef) {
        let label = format!("^bb{}", self.next_block_num);
        self.next_block_num += 1;
        self.block_labels.insert(b, label);
    }

    fn get_block_label(&self, b: BlockRef) -> &str {
        self.block_labels
            .get(&b)
            .map(|s| s.as_str())
            .unwrap_or("^bb?")
    }

    fn reset_numbering(&mut self) {
        self.next_value_num = 0;
        self.next_block_num = 0;
        self.value_names.clear();
        self.block_labels.clear();
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Print an operation (and everything nested in it).
pub fn print_op(ctx: &IrContext, op: OpRef) -> String {
    let mut state = PrintState::new(ctx);
    let mut out = String::new();
    print_operation(&mut state, &mut out, op, 0).expect("fmt::Write to String never fails");
    out
}

pub fn print_type(ctx: &IrContext, ty: TypeRef) -> String {
    let mut out = String::new();
    write_type(ctx, &mut out, ty).expect("fmt::Write to String never fails");
    out
}

// ============================================================================
// Types and attributes
// ============================================================================

fn write_type(ctx: &IrContext, f: &mut impl Write, ty: TypeRef) -> fmt::Result {
    let data = ctx.types.get(ty);
    write!(f, "{}.{}", data.dialect, data.name)?;
    if !data.params.is_empty() {
        f.write_char('(')?;
        for (i, &param) in data.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_type(ctx, f, param)?;
        }
        f.write_char(')')?;
    } else if !data.attrs.is_empty() {
        f.write_str("()")?;
    }
    if !data.attrs.is_empty() {
        write_attr_dict(f, data.attrs.iter())?;
    }
    Ok(())
}

fn write_attr_dict<'a>(
    f: &mut impl Write,
    attrs: impl Iterator<Item = (&'a Symbol, &'a Attribute)>,
) -> fmt::Result {
    let mut sorted: Vec<(String, &Attribute)> = attrs.map(|(k, v)| (k.to_string(), v)).collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    f.write_str(" {")?;
    for (i, (key, val)) in sorted.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key} = ")?;
        write_attribute(f, val)?;
    }
    f.write_char('}')
}

fn write_attribute(f: &mut impl Write, attr: &Attribute) -> fmt::Result {
    match attr {
        Attribute::Unit => f.write_str("unit"),
        Attribute::IntBits(v) => write!(f, "{v}"),
        Attribute::String(s) => write!(f, "{s:?}"),
        Attribute::Symbol(sym) => write!(f, "@{sym}"),
        Attribute::List(list) => {
            f.write_char('[')?;
            for (i, item) in list.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_attribute(f, item)?;
            }
            f.write_char(']')
        }
        Attribute::AffineMap(map) => write!(f, "{map}"),
    }
}

// ============================================================================
// Operations
// ============================================================================

fn print_operation(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    if state.ctx.op_is(op, "func", "func") {
        return print_func_op(state, f, op, indent);
    }
    print_generic_op(state, f, op, indent)
}

fn print_generic_op(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let indent_str = " ".repeat(indent);
    f.write_str(&indent_str)?;

    let results = state.ctx.op_results(op);
    if !results.is_empty() {
        for (i, &v) in results.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let name = state.assign_value_name(v);
            f.write_str(&name)?;
        }
        f.write_str(" = ")?;
    }

    let data = state.ctx.op(op);
    write!(f, "{}.{}", data.dialect, data.name)?;

    let operands = state.ctx.op_operands(op);
    if !operands.is_empty() {
        f.write_char(' ')?;
        for (i, &v) in operands.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(state.get_value_name(v))?;
        }
    }

    let attrs = &state.ctx.op(op).attributes;
    if !attrs.is_empty() {
        write_attr_dict(f, attrs.iter())?;
    }

    let result_types = state.ctx.op_result_types(op);
    if !result_types.is_empty() {
        f.write_str(" : ")?;
        for (i, &ty) in result_types.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_type(state.ctx, f, ty)?;
        }
    }

    let regions = state.ctx.op(op).regions.to_vec();
    for region in regions {
        f.write_str(" {\n")?;
        print_region(state, f, region, indent + 2)?;
        write!(f, "{indent_str}}}")?;
    }

    f.write_char('\n')
}

fn print_region(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    region: RegionRef,
    indent: usize,
) -> fmt::Result {
    let blocks = state.ctx.region(region).blocks.to_vec();
    for &block in &blocks {
        state.assign_block_label(block);
    }

    let can_elide_label = blocks.len() == 1 && state.ctx.block_args(blocks[0]).is_empty();
    let body_indent = if can_elide_label { indent } else { indent + 2 };

    for &block in &blocks {
        if !can_elide_label {
            let indent_str = " ".repeat(indent);
            let label = state.get_block_label(block).to_owned();
            write!(f, "{indent_str}{label}")?;
            write_block_args(state, f, block)?;
            f.write_str(":\n")?;
        }

        let ops = state.ctx.block(block).ops.to_vec();
        for op in ops {
            print_operation(state, f, op, body_indent)?;
        }
    }

    Ok(())
}

fn write_block_args(state: &mut PrintState<'_>, f: &mut impl Write, block: BlockRef) -> fmt::Result {
    let args = state.ctx.block_args(block);
    if args.is_empty() {
        return Ok(());
    }
    f.write_char('(')?;
    for (j, &arg) in args.iter().enumerate() {
        if j > 0 {
            f.write_str(", ")?;
        }
        let name = state.assign_value_name(arg);
        write!(f, "{name}: ")?;
        write_type(state.ctx, f, state.ctx.value_ty(arg))?;
    }
    f.write_char(')')
}

fn print_func_op(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let indent_str = " ".repeat(indent);
    let data = state.ctx.op(op);

    write!(f, "{indent_str}func.func")?;
    if let Some(Attribute::Symbol(name)) = data.attributes.get(&Symbol::new("sym_name")) {
        write!(f, " @{name}")?;
    }

    state.reset_numbering();

    let Some(&region) = data.regions.first() else {
        return f.write_char('\n');
    };
    let blocks = state.ctx.region(region).blocks.to_vec();
    let Some(&entry) = blocks.first() else {
        f.write_str("() {\n")?;
        return writeln!(f, "{indent_str}}}");
    };

    // Entry block args form the signature
    f.write_char('(')?;
    let args = state.ctx.block_args(entry);
    for (i, &arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        let name = state.assign_value_name(arg);
        write!(f, "{name}: ")?;
        write_type(state.ctx, f, state.ctx.value_ty(arg))?;
    }
    f.write_str(") {\n")?;

    for &block in &blocks {
        state.assign_block_label(block);
    }
    for (i, &block) in blocks.iter().enumerate() {
        if i > 0 {
            let label = state.get_block_label(block).to_owned();
            write!(f, "{indent_str}  {label}")?;
            write_block_args(state, f, block)?;
            f.write_str(":\n")?;
        }
        let ops = state.ctx.block(block).ops.to_vec();
        for child in ops {
            print_operation(state, f, child, indent + 2)?;
        }
    }

    writeln!(f, "{indent_str}}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affine::AffineMap;
    use crate::context::OperationDataBuilder;
    use crate::dialect::{arith, core, func};
    use crate::location::{Location, Span};
    use crate::ops::DialectOp;

    #[test]
    fn prints_module_with_function() {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern("printer.lhlo".to_owned());
        let loc = Location::new(path, Span::new(0, 0));
        let f32_ty = core::float(&mut ctx, 32);

        let module = core::module(&mut ctx, loc, Symbol::new("m"));
        let f = func::func(&mut ctx, loc, Symbol::new("twice"), &[f32_ty]);
        let entry = f.entry_block(&ctx).unwrap();
        let x = ctx.block_arg(entry, 0);
        let sum = arith::addf(&mut ctx, loc, x, x, f32_ty);
        let sum_v = sum.result(&ctx);
        let ret = func::r#return(&mut ctx, loc, [sum_v]);
        ctx.push_op(entry, sum.op_ref());
        ctx.push_op(entry, ret.op_ref());
        ctx.push_op(module.first_block(&ctx).unwrap(), f.op_ref());

        insta::assert_snapshot!(print_op(&ctx, module.op_ref()), @r"
        core.module {sym_name = @m} {
          func.func @twice(%0: core.f32) {
            %1 = arith.addf %0, %0 : core.f32
            func.return %1
          }
        }
        ");
    }

    #[test]
    fn every_attribute_kind_prints_sorted() {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern("printer.lhlo".to_owned());
        let loc = Location::new(path, Span::new(0, 0));
        let op = OperationDataBuilder::new(loc, "test".into(), "attrs".into())
            .attr("zeta", Attribute::String("parallel".to_owned()))
            .attr("alpha", Attribute::AffineMap(AffineMap::identity(2)))
            .attr("mid", Attribute::List(vec![1u64.into(), Attribute::Unit]))
            .attr("sym", Attribute::Symbol(Symbol::new("f")))
            .create(&mut ctx);

        assert_eq!(
            print_op(&ctx, op),
            "test.attrs {alpha = affine_map<(d0, d1) -> (d0, d1)>, mid = [1, unit], sym = @f, zeta = \"parallel\"}\n"
        );
    }

    #[test]
    fn memref_type_prints_shape() {
        let mut ctx = IrContext::new();
        let f32_ty = core::float(&mut ctx, 32);
        let buf = core::memref(&mut ctx, f32_ty, &[2, 3]);
        assert_eq!(print_type(&ctx, buf), "core.memref(core.f32) {shape = [2, 3]}");
    }
}
