//! IrContext: arena-based mutable IR storage.
//!
//! All IR entities (operations, values, blocks, regions) are stored in
//! `PrimaryMap`s owned by `IrContext`. Operand and result lists use
//! `EntityList + ListPool` for compact storage.

use std::collections::BTreeMap;

use cranelift_entity::{EntityList, ListPool, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use crate::location::Location;
use crate::refs::*;
use crate::symbol::Symbol;
use crate::types::{Attribute, PathInterner, TypeInterner};

// ============================================================================
// Use-chain
// ============================================================================

/// A single use of a value: which operation uses it, at which operand index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: OpRef,
    pub operand_index: u32,
}

// ============================================================================
// Entity data
// ============================================================================

pub struct OperationData {
    pub location: Location,
    pub dialect: Symbol,
    pub name: Symbol,
    pub operands: EntityList<ValueRef>,
    pub results: EntityList<TypeRef>,
    pub attributes: BTreeMap<Symbol, Attribute>,
    pub regions: SmallVec<[RegionRef; 2]>,
    pub parent_block: Option<BlockRef>,
}

impl OperationData {
    /// `dialect.name` as an owned string, for diagnostics.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.dialect, self.name)
    }

    pub fn attr(&self, key: &'static str) -> Option<&Attribute> {
        self.attributes.get(&Symbol::new(key))
    }
}

pub struct ValueData {
    pub def: ValueDef,
    pub ty: TypeRef,
}

pub struct BlockData {
    pub location: Location,
    pub arg_types: Vec<TypeRef>,
    pub ops: SmallVec<[OpRef; 4]>,
    pub parent_region: Option<RegionRef>,
}

impl BlockData {
    /// A detached block with the given argument types and no operations.
    pub fn new(location: Location, arg_types: impl IntoIterator<Item = TypeRef>) -> Self {
        Self {
            location,
            arg_types: arg_types.into_iter().collect(),
            ops: SmallVec::new(),
            parent_region: None,
        }
    }
}

pub struct RegionData {
    pub location: Location,
    pub blocks: SmallVec<[BlockRef; 1]>,
    pub parent_op: Option<OpRef>,
}

// ============================================================================
// IrContext
// ============================================================================

/// Arena-based mutable IR context.
///
/// Owns all IR entities and provides methods for creating, querying,
/// and mutating them. Use-chains are maintained automatically.
pub struct IrContext {
    ops: PrimaryMap<OpRef, OperationData>,
    values: PrimaryMap<ValueRef, ValueData>,
    blocks: PrimaryMap<BlockRef, BlockData>,
    regions: PrimaryMap<RegionRef, RegionData>,

    uses: SecondaryMap<ValueRef, SmallVec<[Use; 2]>>,

    pub types: TypeInterner,
    pub paths: PathInterner,

    value_pool: ListPool<ValueRef>,
    type_pool: ListPool<TypeRef>,

    result_values: SecondaryMap<OpRef, EntityList<ValueRef>>,
    block_arg_values: SecondaryMap<BlockRef, EntityList<ValueRef>>,
}

impl IrContext {
    pub fn new() -> Self {
        Self {
            ops: PrimaryMap::new(),
            values: PrimaryMap::new(),
            blocks: PrimaryMap::new(),
            regions: PrimaryMap::new(),
            uses: SecondaryMap::new(),
            types: TypeInterner::new(),
            paths: PathInterner::new(),
            value_pool: ListPool::new(),
            type_pool: ListPool::new(),
            result_values: SecondaryMap::new(),
            block_arg_values: SecondaryMap::new(),
        }
    }

    // ========================================================================
    // Operation
    // ========================================================================

    /// Create a detached operation and allocate its result values.
    ///
    /// Operands are registered in the use-chain. Use `push_op` to attach
    /// the operation to a block afterwards.
    ///
    /// # Panics
    ///
    /// Panics if `data.parent_block` is `Some`, or if any region in
    /// `data.regions` already belongs to another operation.
    pub fn create_op(&mut self, data: OperationData) -> OpRef {
        assert!(
            data.parent_block.is_none(),
            "create_op: operation must not have parent_block set; \
             use push_op to attach to a block after creation",
        );

        let operands: SmallVec<[ValueRef; 8]> = data.operands.as_slice(&self.value_pool).into();
        let result_types: SmallVec<[TypeRef; 4]> = data.results.as_slice(&self.type_pool).into();
        let regions = data.regions.clone();

        let op = self.ops.push(data);

        for &r in &regions {
            if let Some(existing) = self.regions[r].parent_op {
                panic!(
                    "create_op: region {r} already belongs to operation {existing}; \
                     cannot reassign to {op}",
                );
            }
            self.regions[r].parent_op = Some(op);
        }

        for (idx, &val) in operands.iter().enumerate() {
            self.uses[val].push(Use {
                user: op,
                operand_index: idx as u32,
            });
        }

        let mut result_list = EntityList::new();
        for (idx, &ty) in result_types.iter().enumerate() {
            let v = self.values.push(ValueData {
                def: ValueDef::OpResult(op, idx as u32),
                ty,
            });
            result_list.push(v, &mut self.value_pool);
        }
        self.result_values[op] = result_list;

        op
    }

    pub fn op(&self, op: OpRef) -> &OperationData {
        &self.ops[op]
    }

    pub fn op_operands(&self, op: OpRef) -> &[ValueRef] {
        self.ops[op].operands.as_slice(&self.value_pool)
    }

    pub fn op_result_types(&self, op: OpRef) -> &[TypeRef] {
        self.ops[op].results.as_slice(&self.type_pool)
    }

    pub fn op_result(&self, op: OpRef, index: u32) -> ValueRef {
        self.result_values[op].as_slice(&self.value_pool)[index as usize]
    }

    pub fn op_results(&self, op: OpRef) -> &[ValueRef] {
        self.result_values[op].as_slice(&self.value_pool)
    }

    /// Check whether `op` is `dialect.name`.
    pub fn op_is(&self, op: OpRef, dialect: &str, name: &str) -> bool {
        let data = &self.ops[op];
        data.dialect == dialect && data.name == name
    }

    /// Destroy an operation, clearing its operand use-chain entries.
    ///
    /// # Panics
    ///
    /// Panics if the operation is still attached to a block or if any of
    /// its results still has uses.
    pub fn remove_op(&mut self, op: OpRef) {
        if let Some(block) = self.ops[op].parent_block {
            panic!(
                "remove_op: operation {op} is still attached to {block}; \
                 call remove_op_from_block first",
            );
        }

        let results: SmallVec<[ValueRef; 4]> =
            self.result_values[op].as_slice(&self.value_pool).into();
        for &val in &results {
            assert!(
                self.uses[val].is_empty(),
                "remove_op: result value {val} still has {} use(s); \
                 replace all uses before removing the operation",
                self.uses[val].len()
            );
        }

        let operands: SmallVec<[ValueRef; 8]> =
            self.ops[op].operands.as_slice(&self.value_pool).into();
        for (idx, &val) in operands.iter().enumerate() {
            self.uses[val].retain(|u| !(u.user == op && u.operand_index == idx as u32));
        }
    }

    // ========================================================================
    // Value
    // ========================================================================

    pub fn value(&self, v: ValueRef) -> &ValueData {
        &self.values[v]
    }

    pub fn value_ty(&self, v: ValueRef) -> TypeRef {
        self.values[v].ty
    }

    pub fn value_def(&self, v: ValueRef) -> ValueDef {
        self.values[v].def
    }

    // ========================================================================
    // Block
    // ========================================================================

    /// Create a block and allocate one value per argument type.
    pub fn create_block(&mut self, data: BlockData) -> BlockRef {
        let arg_types = data.arg_types.clone();
        let block = self.blocks.push(data);

        let mut arg_list = EntityList::new();
        for (idx, ty) in arg_types.into_iter().enumerate() {
            let v = self.values.push(ValueData {
                def: ValueDef::BlockArg(block, idx as u32),
                ty,
            });
            arg_list.push(v, &mut self.value_pool);
        }
        self.block_arg_values[block] = arg_list;

        block
    }

    pub fn block(&self, b: BlockRef) -> &BlockData {
        &self.blocks[b]
    }

    pub fn block_arg(&self, b: BlockRef, index: u32) -> ValueRef {
        self.block_arg_values[b].as_slice(&self.value_pool)[index as usize]
    }

    pub fn block_args(&self, b: BlockRef) -> &[ValueRef] {
        self.block_arg_values[b].as_slice(&self.value_pool)
    }

    /// Append an operation to the end of a block.
    ///
    /// # Panics
    ///
    /// Panics if the operation already belongs to a block.
    pub fn push_op(&mut self, block: BlockRef, op: OpRef) {
        if let Some(existing) = self.ops[op].parent_block {
            panic!("push_op: operation {op} already belongs to {existing}");
        }
        self.ops[op].parent_block = Some(block);
        self.blocks[block].ops.push(op);
    }

    /// Put `new` at `old`'s position in `block` and detach `old`.
    ///
    /// # Panics
    ///
    /// Panics if `new` is already attached or `old` is not in `block`.
    pub fn swap_op_in_block(&mut self, block: BlockRef, old: OpRef, new: OpRef) {
        if let Some(existing) = self.ops[new].parent_block {
            panic!("swap_op_in_block: operation {new} already belongs to {existing}");
        }
        let ops = &mut self.blocks[block].ops;
        let pos = ops
            .iter()
            .position(|&o| o == old)
            .unwrap_or_else(|| panic!("swap_op_in_block: {old} not found in {block}"));
        ops[pos] = new;
        self.ops[new].parent_block = Some(block);
        self.ops[old].parent_block = None;
    }

    /// Remove an operation from a block without destroying it.
    pub fn remove_op_from_block(&mut self, block: BlockRef, op: OpRef) {
        self.blocks[block].ops.retain(|o| *o != op);
        if self.ops[op].parent_block == Some(block) {
            self.ops[op].parent_block = None;
        }
    }

    // ========================================================================
    // Region
    // ========================================================================

    /// Create a region owning the given blocks.
    ///
    /// # Panics
    ///
    /// Panics if any block already belongs to another region.
    pub fn create_region(&mut self, data: RegionData) -> RegionRef {
        let blocks = data.blocks.clone();
        let region = self.regions.push(data);

        for &b in &blocks {
            if let Some(existing) = self.blocks[b].parent_region {
                panic!(
                    "create_region: block {b} already belongs to region {existing}; \
                     cannot reassign to {region}",
                );
            }
            self.blocks[b].parent_region = Some(region);
        }

        region
    }

    /// Convenience: wrap a single block into a new region.
    pub fn create_single_block_region(&mut self, location: Location, block: BlockRef) -> RegionRef {
        self.create_region(RegionData {
            location,
            blocks: smallvec::smallvec![block],
            parent_op: None,
        })
    }

    pub fn region(&self, r: RegionRef) -> &RegionData {
        &self.regions[r]
    }

    // ========================================================================
    // Use-chain / RAUW
    // ========================================================================

    pub fn uses(&self, v: ValueRef) -> &[Use] {
        &self.uses[v]
    }

    pub fn has_uses(&self, v: ValueRef) -> bool {
        !self.uses[v].is_empty()
    }

    /// Replace all uses of `old` with `new`, updating operands and use-chains.
    pub fn replace_all_uses(&mut self, old: ValueRef, new: ValueRef) {
        if old == new {
            return;
        }
        let old_uses = std::mem::take(&mut self.uses[old]);

        for u in &old_uses {
            let slice = self.ops[u.user]
                .operands
                .as_mut_slice(&mut self.value_pool);
            debug_assert_eq!(slice[u.operand_index as usize], old);
            slice[u.operand_index as usize] = new;
            self.uses[new].push(*u);
        }
    }
}

impl Default for IrContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// OperationDataBuilder
// ============================================================================

/// Builder for `OperationData`.
///
/// Collects operands and result types into `Vec`s, then packs them
/// into `EntityList`s on `build()`.
pub struct OperationDataBuilder {
    location: Location,
    dialect: Symbol,
    name: Symbol,
    operands: Vec<ValueRef>,
    results: Vec<TypeRef>,
    attributes: BTreeMap<Symbol, Attribute>,
    regions: SmallVec<[RegionRef; 2]>,
}

impl OperationDataBuilder {
    pub fn new(location: Location, dialect: Symbol, name: Symbol) -> Self {
        Self {
            location,
            dialect,
            name,
            operands: Vec::new(),
            results: Vec::new(),
            attributes: BTreeMap::new(),
            regions: SmallVec::new(),
        }
    }

    pub fn operand(mut self, v: ValueRef) -> Self {
        self.operands.push(v);
        self
    }

    pub fn operands(mut self, vs: impl IntoIterator<Item = ValueRef>) -> Self {
        self.operands.extend(vs);
        self
    }

    pub fn result(mut self, ty: TypeRef) -> Self {
        self.results.push(ty);
        self
    }

    pub fn attr(mut self, key: impl Into<Symbol>, val: Attribute) -> Self {
        self.attributes.insert(key.into(), val);
        self
    }

    pub fn region(mut self, r: RegionRef) -> Self {
        self.regions.push(r);
        self
    }

    pub fn build(self, ctx: &mut IrContext) -> OperationData {
        let mut operands = EntityList::new();
        operands.extend(self.operands, &mut ctx.value_pool);
        let mut results = EntityList::new();
        results.extend(self.results, &mut ctx.type_pool);
        OperationData {
            location: self.location,
            dialect: self.dialect,
            name: self.name,
            operands,
            results,
            attributes: self.attributes,
            regions: self.regions,
            parent_block: None,
        }
    }

    /// Build and immediately create the operation in `ctx`.
    pub fn create(self, ctx: &mut IrContext) -> OpRef {
        let data = self.build(ctx);
        ctx.create_op(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Span;
    use crate::types::TypeDataBuilder;

    fn setup() -> (IrContext, Location, TypeRef) {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern("context.lhlo".to_owned());
        let loc = Location::new(path, Span::new(0, 0));
        let f32_ty = ctx
            .types
            .intern(TypeDataBuilder::new("core".into(), "f32".into()).build());
        (ctx, loc, f32_ty)
    }

    #[test]
    fn results_and_block_args_get_distinct_values() {
        let (mut ctx, loc, f32_ty) = setup();
        let block = ctx.create_block(BlockData::new(loc, [f32_ty, f32_ty]));
        let a0 = ctx.block_arg(block, 0);
        let a1 = ctx.block_arg(block, 1);
        assert_ne!(a0, a1);
        assert_eq!(ctx.value_def(a1), ValueDef::BlockArg(block, 1));

        let op = OperationDataBuilder::new(loc, "arith".into(), "addf".into())
            .operands([a0, a1])
            .result(f32_ty)
            .create(&mut ctx);
        let r = ctx.op_result(op, 0);
        assert_eq!(ctx.value_def(r), ValueDef::OpResult(op, 0));
        assert_eq!(ctx.value_ty(r), f32_ty);
        assert!(ctx.op_is(op, "arith", "addf"));
        assert_eq!(ctx.op(op).full_name(), "arith.addf");
    }

    #[test]
    fn use_chain_follows_create_and_remove() {
        let (mut ctx, loc, f32_ty) = setup();
        let block = ctx.create_block(BlockData::new(loc, [f32_ty]));
        let arg = ctx.block_arg(block, 0);

        let op = OperationDataBuilder::new(loc, "arith".into(), "exp".into())
            .operand(arg)
            .result(f32_ty)
            .create(&mut ctx);
        assert_eq!(ctx.uses(arg), &[Use { user: op, operand_index: 0 }]);

        ctx.remove_op(op);
        assert!(!ctx.has_uses(arg));
    }

    #[test]
    fn swap_keeps_position() {
        let (mut ctx, loc, _) = setup();
        let block = ctx.create_block(BlockData::new(loc, []));
        let a = OperationDataBuilder::new(loc, "t".into(), "a".into()).create(&mut ctx);
        let b = OperationDataBuilder::new(loc, "t".into(), "b".into()).create(&mut ctx);
        let c = OperationDataBuilder::new(loc, "t".into(), "c".into()).create(&mut ctx);
        ctx.push_op(block, a);
        ctx.push_op(block, b);

        ctx.swap_op_in_block(block, a, c);
        assert_eq!(ctx.block(block).ops.as_slice(), &[c, b]);
        assert_eq!(ctx.op(a).parent_block, None);
        assert_eq!(ctx.op(c).parent_block, Some(block));
    }

    #[test]
    fn rauw_moves_uses() {
        let (mut ctx, loc, f32_ty) = setup();
        let block = ctx.create_block(BlockData::new(loc, [f32_ty, f32_ty]));
        let old = ctx.block_arg(block, 0);
        let new = ctx.block_arg(block, 1);
        let user = OperationDataBuilder::new(loc, "arith".into(), "exp".into())
            .operand(old)
            .result(f32_ty)
            .create(&mut ctx);

        ctx.replace_all_uses(old, new);
        assert_eq!(ctx.op_operands(user), &[new]);
        assert!(!ctx.has_uses(old));
        assert_eq!(ctx.uses(new).len(), 1);
    }

    #[test]
    fn detached_op_can_be_removed() {
        let (mut ctx, loc, f32_ty) = setup();
        let block = ctx.create_block(BlockData::new(loc, [f32_ty]));
        let arg = ctx.block_arg(block, 0);
        let op = OperationDataBuilder::new(loc, "t".into(), "use".into())
            .operand(arg)
            .create(&mut ctx);
        ctx.push_op(block, op);

        ctx.remove_op_from_block(block, op);
        assert!(ctx.block(block).ops.is_empty());
        assert_eq!(ctx.op(op).parent_block, None);
        ctx.remove_op(op);
        assert!(!ctx.has_uses(arg));
    }

    #[test]
    #[should_panic(expected = "still attached")]
    fn remove_attached_op_panics() {
        let (mut ctx, loc, _) = setup();
        let block = ctx.create_block(BlockData::new(loc, []));
        let op = OperationDataBuilder::new(loc, "t".into(), "a".into()).create(&mut ctx);
        ctx.push_op(block, op);
        ctx.remove_op(op);
    }
}
