//! Common test utilities: program builders and a reference interpreter for
//! lowered `linalg` loops.

use std::collections::HashMap;

use tessel_ir::dialect::core::{self, Module};
use tessel_ir::dialect::func::{self, Func};
use tessel_ir::dialect::linalg::StructuredOp;
use tessel_ir::{
    AffineMap, Attribute, BlockRef, DialectOp, IrContext, Location, OpRef, Span, TypeRef,
    ValueRef,
};

/// A `core.module` holding one function under construction.
pub struct Program {
    pub ctx: IrContext,
    pub loc: Location,
    pub module: Module,
    pub func: Func,
    pub entry: BlockRef,
}

#[allow(dead_code)]
impl Program {
    pub fn new(name: &'static str, params: impl FnOnce(&mut IrContext) -> Vec<TypeRef>) -> Self {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern(format!("{name}.lhlo"));
        let loc = Location::new(path, Span::new(0, 0));
        let param_types = params(&mut ctx);

        let module = core::module(&mut ctx, loc, "m".into());
        let func = func::func(&mut ctx, loc, name.into(), &param_types);
        let module_block = module.first_block(&ctx).expect("module has a body block");
        ctx.push_op(module_block, func.op_ref());
        let entry = func.entry_block(&ctx).expect("function has an entry block");

        Program {
            ctx,
            loc,
            module,
            func,
            entry,
        }
    }

    pub fn arg(&self, index: u32) -> ValueRef {
        self.ctx.block_arg(self.entry, index)
    }

    pub fn push(&mut self, op: impl DialectOp) -> OpRef {
        self.ctx.push_op(self.entry, op.op_ref());
        op.op_ref()
    }

    /// Terminate the function with an empty `func.return`.
    pub fn finish(&mut self) {
        let ret = func::r#return(&mut self.ctx, self.loc, std::iter::empty());
        self.ctx.push_op(self.entry, ret.op_ref());
    }

    pub fn body_ops(&self) -> Vec<OpRef> {
        self.ctx.block(self.entry).ops.to_vec()
    }

    pub fn op_names(&self) -> Vec<String> {
        self.body_ops()
            .iter()
            .map(|&op| self.ctx.op(op).full_name())
            .collect()
    }

    pub fn structured_ops(&self) -> Vec<StructuredOp> {
        self.body_ops()
            .into_iter()
            .filter_map(|op| StructuredOp::from_op(&self.ctx, op))
            .collect()
    }

    pub fn print(&self) -> String {
        tessel_ir::printer::print_op(&self.ctx, self.func.op_ref())
    }
}

// ============================================================================
// Interpreter
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Index(i64),
}

/// Row-major in-memory buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct Buffer {
    pub shape: Vec<u64>,
    pub data: Vec<Scalar>,
}

#[allow(dead_code)]
impl Buffer {
    pub fn filled(shape: &[u64], value: Scalar) -> Self {
        let len = shape.iter().product::<u64>() as usize;
        Buffer {
            shape: shape.to_vec(),
            data: vec![value; len],
        }
    }

    pub fn floats(shape: &[u64], values: &[f64]) -> Self {
        Self::with_data(shape, values.iter().map(|&v| Scalar::Float(v)).collect())
    }

    pub fn ints(shape: &[u64], values: &[i64]) -> Self {
        Self::with_data(shape, values.iter().map(|&v| Scalar::Int(v)).collect())
    }

    fn with_data(shape: &[u64], data: Vec<Scalar>) -> Self {
        assert_eq!(shape.iter().product::<u64>() as usize, data.len());
        Buffer {
            shape: shape.to_vec(),
            data,
        }
    }

    fn offset(&self, coords: &[i64]) -> usize {
        assert_eq!(coords.len(), self.shape.len(), "coordinate rank mismatch");
        coords
            .iter()
            .zip(&self.shape)
            .fold(0usize, |acc, (&c, &extent)| {
                assert!((c as u64) < extent, "coordinate {c} out of bounds {extent}");
                acc * extent as usize + c as usize
            })
    }

    pub fn get(&self, coords: &[i64]) -> Scalar {
        self.data[self.offset(coords)]
    }

    pub fn set(&mut self, coords: &[i64], value: Scalar) {
        let offset = self.offset(coords);
        self.data[offset] = value;
    }

    pub fn as_floats(&self) -> Vec<f64> {
        self.data
            .iter()
            .map(|s| match s {
                Scalar::Float(v) => *v,
                other => panic!("expected float, found {other:?}"),
            })
            .collect()
    }

    pub fn as_ints(&self) -> Vec<i64> {
        self.data
            .iter()
            .map(|s| match s {
                Scalar::Int(v) => *v,
                other => panic!("expected int, found {other:?}"),
            })
            .collect()
    }
}

/// Executes the lowered body of a function over bound buffers.
pub struct Interpreter<'a> {
    ctx: &'a IrContext,
    buffers: HashMap<ValueRef, Buffer>,
}

#[allow(dead_code)]
impl<'a> Interpreter<'a> {
    pub fn new(ctx: &'a IrContext) -> Self {
        Interpreter {
            ctx,
            buffers: HashMap::new(),
        }
    }

    pub fn bind(&mut self, value: ValueRef, buffer: Buffer) {
        self.buffers.insert(value, buffer);
    }

    pub fn buffer(&self, value: ValueRef) -> &Buffer {
        &self.buffers[&value]
    }

    pub fn run(&mut self, block: BlockRef) {
        let ctx = self.ctx;
        for &op in &ctx.block(block).ops {
            if ctx.op_is(op, "func", "return") {
                return;
            }
            let structured = StructuredOp::from_op(ctx, op)
                .unwrap_or_else(|| panic!("cannot interpret {}", ctx.op(op).full_name()));
            self.run_structured(structured);
        }
    }

    fn run_structured(&mut self, op: StructuredOp) {
        let ctx = self.ctx;
        let operands = ctx.op_operands(op.op_ref()).to_vec();
        let maps = op.indexing_maps(ctx).expect("indexing maps");
        let num_loops = op.iterator_types(ctx).expect("iterator types").len();
        let (_, n_out) = op.n_views(ctx).expect("n_views");
        let body = op.body_block(ctx).expect("body block");

        let bounds = loop_bounds(&operands, &maps, num_loops, &self.buffers);
        for_each_coordinate(&bounds, |coord| {
            let mut env: HashMap<ValueRef, Scalar> = HashMap::new();
            let args = ctx.block_args(body);
            let mut next_arg = 0;
            if op.is_indexed() {
                for &c in coord {
                    env.insert(args[next_arg], Scalar::Index(c));
                    next_arg += 1;
                }
            }
            for (operand, map) in operands.iter().zip(&maps) {
                let at = map.eval(coord).expect("map arity");
                env.insert(args[next_arg], self.buffers[operand].get(&at));
                next_arg += 1;
            }

            let yielded = eval_body(ctx, body, &mut env);
            let first_out = operands.len() - n_out;
            for (k, value) in yielded.into_iter().enumerate() {
                let at = maps[first_out + k].eval(coord).expect("map arity");
                let out = self
                    .buffers
                    .get_mut(&operands[first_out + k])
                    .expect("output buffer bound");
                out.set(&at, value);
            }
        });
    }
}

fn loop_bounds(
    operands: &[ValueRef],
    maps: &[AffineMap],
    num_loops: usize,
    buffers: &HashMap<ValueRef, Buffer>,
) -> Vec<u64> {
    let mut bounds = vec![0u64; num_loops];
    for (operand, map) in operands.iter().zip(maps) {
        let shape = &buffers[operand].shape;
        for (j, expr) in map.results().iter().enumerate() {
            if let tessel_ir::AffineExpr::Dim(d) = expr {
                bounds[*d as usize] = bounds[*d as usize].max(shape[j]);
            }
        }
    }
    bounds
}

fn for_each_coordinate(bounds: &[u64], mut f: impl FnMut(&[i64])) {
    if bounds.contains(&0) {
        return;
    }
    let mut coord = vec![0i64; bounds.len()];
    loop {
        f(&coord);
        let mut d = bounds.len();
        loop {
            if d == 0 {
                return;
            }
            d -= 1;
            coord[d] += 1;
            if (coord[d] as u64) < bounds[d] {
                break;
            }
            coord[d] = 0;
        }
    }
}

fn predicate(ctx: &IrContext, op: OpRef) -> String {
    ctx.op(op)
        .attr("predicate")
        .and_then(Attribute::as_symbol)
        .map(|s| s.to_string())
        .expect("comparison predicate")
}

fn compare<T: PartialOrd>(predicate: &str, a: T, b: T) -> bool {
    match predicate {
        "oeq" | "eq" => a == b,
        "one" | "ne" => a != b,
        "olt" | "slt" => a < b,
        "ole" | "sle" => a <= b,
        "ogt" | "sgt" => a > b,
        "oge" | "sge" => a >= b,
        other => panic!("unknown predicate {other}"),
    }
}

fn eval_body(
    ctx: &IrContext,
    body: BlockRef,
    env: &mut HashMap<ValueRef, Scalar>,
) -> Vec<Scalar> {
    use Scalar::*;

    for &op in &ctx.block(body).ops {
        let name = ctx.op(op).full_name();
        let args: Vec<Scalar> = ctx.op_operands(op).iter().map(|v| env[v]).collect();
        if name == "linalg.yield" {
            return args;
        }
        let value = match (name.as_str(), args.as_slice()) {
            ("arith.addf", [Float(a), Float(b)]) => Float(a + b),
            ("arith.subf", [Float(a), Float(b)]) => Float(a - b),
            ("arith.mulf", [Float(a), Float(b)]) => Float(a * b),
            ("arith.divf", [Float(a), Float(b)]) => Float(a / b),
            ("arith.addi", [Int(a), Int(b)]) => Int(a.wrapping_add(*b)),
            ("arith.subi", [Int(a), Int(b)]) => Int(a.wrapping_sub(*b)),
            ("arith.muli", [Int(a), Int(b)]) => Int(a.wrapping_mul(*b)),
            ("arith.divsi", [Int(a), Int(b)]) => Int(a / b),
            ("arith.andi", [Int(a), Int(b)]) => Int(a & b),
            ("arith.cmpf", [Float(a), Float(b)]) => {
                Int(compare(&predicate(ctx, op), a, b).into())
            }
            ("arith.cmpi", [Int(a), Int(b)]) => Int(compare(&predicate(ctx, op), a, b).into()),
            ("arith.select", [Int(c), t, f]) => {
                if *c != 0 {
                    *t
                } else {
                    *f
                }
            }
            ("arith.exp", [Float(a)]) => Float(a.exp()),
            ("arith.index_cast", [Index(i)]) => Int(*i),
            ("arith.sitofp", [Int(i)]) => Float(*i as f64),
            (other, args) => panic!("cannot evaluate {other} on {args:?}"),
        };
        let result = ctx.op_result(op, 0);
        env.insert(result, value);
    }
    panic!("body has no linalg.yield")
}
