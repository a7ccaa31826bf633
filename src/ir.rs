//! Three-address IR and the CFG it's woven into.
//!
//! Jump targets are indices into an [`crate::idx::IdxVec`] rather than
//! pointers, so the parser can wire up forward jumps (the `&&`/`||`/`?:`
//! short-circuit blocks) before the blocks they point at are fully built
//! (spec §9's index-arena redesign note). A named or synthesized local,
//! though, is addressed the same way [`crate::types::Aggregate`] is: a
//! shared `Rc<RefCell<SymEntry>>` (spec's `Var.symbol` pointer), since
//! nothing ever needs a *forward* reference to a local before it exists —
//! only blocks do. `eval_expr` and friends fold constant operands eagerly so
//! that a [`VarKind::Immediate`] `Var` is always a genuine compile-time
//! constant, never an instruction result masquerading as one (spec §8
//! property 7).

use log::trace;

use crate::idx::Idx;
use crate::sym::{Linkage, SymEntry, SymRef, SymType};
use crate::symbol::{self, Symbol};
use crate::types::{self, Ty};

crate::mk_idx! {
    /// A basic block within one function's [`Cfg`].
    pub struct BlockId;
}

#[derive(Clone, Copy, Debug)]
pub enum Imm {
    Int(i64),
    Float(f64),
}

#[derive(Clone, Debug)]
pub enum VarKind {
    /// A named local/global/parameter, or a compiler-synthesized temporary,
    /// referenced directly (spec §4.1's `DIRECT`).
    Direct(SymRef),
    /// `*base`: the value addressed by another `Var` (spec's `DEREF`).
    Deref(Box<Var>),
    /// A compile-time constant (spec's `IMMEDIATE`).
    Immediate(Imm),
    /// The address of a string literal's backing storage.
    StringLiteral(Symbol),
    /// `&lvalue`. Not one of the original's three `Var` kinds by name, but
    /// needed since this IR represents "the address of x" as a first-class
    /// operand rather than folding it into `DIRECT`'s bookkeeping.
    Address(Box<Var>),
}

#[derive(Clone, Debug)]
pub struct Var {
    pub kind: VarKind,
    pub ty: Ty,
    /// Non-zero for a bit-field access or an `a.b.c` chain collapsed to one
    /// offset; `0` for everything else.
    pub offset: u64,
}

impl Var {
    #[must_use] pub fn is_immediate_true(&self) -> bool {
        matches!(&self.kind, VarKind::Immediate(Imm::Int(n)) if *n != 0) && self.ty.is_integer()
    }

    #[must_use] pub fn is_immediate_false(&self) -> bool {
        matches!(&self.kind, VarKind::Immediate(Imm::Int(0))) && self.ty.is_integer()
    }

    #[must_use] pub fn is_immediate(&self) -> bool { matches!(self.kind, VarKind::Immediate(_)) }

    #[must_use] pub fn is_direct(&self) -> bool { matches!(self.kind, VarKind::Direct(_)) }

    /// Whether this `Var` names storage that can be assigned to or have its
    /// address taken — `Direct`/`Deref`, never an immediate, string literal,
    /// or an already-materialized `&expr` (spec §3's `Var.lvalue` flag,
    /// recovered here from `kind` instead of a separate bool since the two
    /// kinds that qualify are exactly the ones that already carry an address).
    #[must_use] pub fn is_lvalue(&self) -> bool {
        matches!(self.kind, VarKind::Direct(_) | VarKind::Deref(_))
    }
}

#[must_use] pub fn var_direct(sym: &SymRef) -> Var {
    let ty = sym.borrow().ty.clone();
    Var { kind: VarKind::Direct(sym.clone()), ty, offset: 0 }
}
#[must_use] pub fn var_int(n: i64) -> Var { Var { kind: VarKind::Immediate(Imm::Int(n)), ty: types::int_ty(), offset: 0 } }
#[must_use] pub fn var_float(f: f64) -> Var { Var { kind: VarKind::Immediate(Imm::Float(f)), ty: types::double_ty(), offset: 0 } }
#[must_use] pub fn var_zero(width: u64) -> Var {
    let ty = if width == 8 { types::long_ty() } else { types::int_ty() };
    Var { kind: VarKind::Immediate(Imm::Int(0)), ty, offset: 0 }
}
#[must_use] pub fn var_string(sym: Symbol, len: u64) -> Var {
    Var { kind: VarKind::StringLiteral(sym), ty: types::array_of(types::char_ty(), Some(len + 1)), offset: 0 }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IrOp { Add, Sub, Mul, Div, Mod, And, Or, Xor, Shl, Shr, Eq, Gt, Ge }

/// A single three-address instruction, recorded in a [`Block`]'s `code` in
/// program order.
#[derive(Clone, Debug)]
pub enum Inst {
    /// `target` is the lvalue being written — `Direct(sym)`/`offset` for a
    /// named object or member, `Deref(base)` for `*p = ...` — not just a
    /// bare symbol, so initializer lowering can assign into a member or
    /// array element without a distinct "store" opcode.
    Assign { target: Var, value: Var },
    BinOp { target: SymRef, op: IrOp, lhs: Var, rhs: Var },
    Cast { target: SymRef, value: Var },
    /// `target` is `None` for a call to a `void`-returning function.
    Call { target: Option<SymRef>, callee: Var },
    /// One argument, pushed left-to-right before the `Call` it belongs to.
    Param(Var),
    Return(Option<Var>),
    VaStart(Var),
    VaArg { target: SymRef, ap: Var },
    /// A side-effecting expression evaluated for effect alone (a bare call).
    Expr(Var),
}

#[derive(Clone, Debug)]
pub struct Block {
    pub id: BlockId,
    pub code: Vec<Inst>,
    /// The value of the last expression evaluated in this block; mirrors the
    /// original parser's `block->expr` field threaded through every
    /// `*_expression` production.
    pub expr: Var,
    /// `[0]` is the "false"/fallthrough target, `[1]` is the "true" target,
    /// following the original's `jump[0]`/`jump[1]` convention for
    /// conditional blocks; an unconditional jump uses only `[0]`.
    pub jump: [Option<BlockId>; 2],
}

impl Block {
    fn new(id: BlockId) -> Self {
        Block { id, code: Vec::new(), expr: var_int(0), jump: [None, None] }
    }
}

/// One function's control-flow graph.
#[derive(Clone, Debug)]
pub struct Cfg {
    pub fun: Symbol,
    pub blocks: crate::idx::IdxVec<BlockId, Block>,
    pub head: BlockId,
    pub locals: Vec<SymRef>,
    pub params: Vec<SymRef>,
}

impl Cfg {
    #[must_use] pub fn new(fun: Symbol) -> Self {
        let mut blocks = crate::idx::IdxVec::new();
        let head = blocks.push(Block::new(BlockId::from_usize(0)));
        Cfg { fun, blocks, head, locals: Vec::new(), params: Vec::new() }
    }

    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId::from_usize(self.blocks.len());
        self.blocks.push(Block::new(id));
        trace!("{}: new block {id:?}", symbol::with_str(self.fun, str::to_owned));
        id
    }

    /// Allocates an unnamed compiler temporary (spec's `create_var`,
    /// and the implicit target of every folded binary op/cast/call).
    pub fn register_local(&mut self, ty: Ty) -> SymRef {
        let sym = SymEntry {
            name: symbol::intern(""),
            ty,
            symtype: SymType::Definition,
            linkage: Linkage::None,
            depth: 0,
            enum_value: None,
        };
        let sym = std::rc::Rc::new(std::cell::RefCell::new(sym));
        self.locals.push(sym.clone());
        sym
    }

    /// Registers a named parameter, in declaration order, additionally
    /// recording it in `params` for `__builtin_va_start`'s "last named
    /// parameter" check.
    pub fn register_param(&mut self, sym: SymRef) {
        self.params.push(sym);
    }

    /// Registers an already-constructed named local (as opposed to
    /// [`Cfg::register_local`]'s anonymous compiler temporaries), spec
    /// §4.7's `cfg_register_local` called for block-scope declarations.
    pub fn register_named_local(&mut self, sym: SymRef) {
        self.locals.push(sym);
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block { &mut self.blocks[id] }
    #[must_use] pub fn block(&self, id: BlockId) -> &Block { &self.blocks[id] }
}

/// Terminates `block` with an unconditional jump to `target`.
pub fn jump_to(cfg: &mut Cfg, block: BlockId, target: BlockId) {
    cfg.block_mut(block).jump = [Some(target), None];
}

/// Terminates `block` with a two-way branch on `cond`, recording `cond` as
/// the block's `expr` (spec §3: "index 1 taken when `expr` is non-zero") so
/// the branch predicate is visible on the block itself, not just implied by
/// its two successors.
pub fn branch(cfg: &mut Cfg, block: BlockId, cond: Var, on_false: BlockId, on_true: BlockId) {
    let b = cfg.block_mut(block);
    b.expr = cond;
    b.jump = [Some(on_false), Some(on_true)];
}

fn fold_int(op: IrOp, a: i64, b: i64) -> Option<i64> {
    Some(match op {
        IrOp::Add => a.wrapping_add(b),
        IrOp::Sub => a.wrapping_sub(b),
        IrOp::Mul => a.wrapping_mul(b),
        IrOp::Div => if b == 0 { return None } else { a.wrapping_div(b) },
        IrOp::Mod => if b == 0 { return None } else { a.wrapping_rem(b) },
        IrOp::And => a & b,
        IrOp::Or => a | b,
        IrOp::Xor => a ^ b,
        IrOp::Shl => a.wrapping_shl(b as u32),
        IrOp::Shr => a.wrapping_shr(b as u32),
        IrOp::Eq => i64::from(a == b),
        IrOp::Gt => i64::from(a > b),
        IrOp::Ge => i64::from(a >= b),
    })
}

/// Binds an lvalue `target` to `value`, emitting an `Assign` instruction.
/// Mirrors `eval_assign`'s role in the original: every assignment, whether
/// written by the user or synthesized for an initializer, funnels through
/// here. `target` may be a plain symbol, an offset into one (a struct
/// member or array element), or a dereferenced pointer.
pub fn eval_assign(cfg: &mut Cfg, block: BlockId, target: &Var, value: Var) -> Var {
    cfg.block_mut(block).code.push(Inst::Assign { target: target.clone(), value: value.clone() });
    value
}

/// Binary arithmetic/relational/bitwise operator lowering.
///
/// Two immediate operands fold to a new immediate with no instruction
/// emitted at all (spec §8 property 7: `IMMEDIATE` purity — an `IMMEDIATE`
/// `Var` is always a genuine compile-time constant, never an instruction
/// result wearing a constant's clothes). Otherwise a fresh temporary is
/// allocated in `cfg` and an `Assign` recorded in `block`.
pub fn eval_expr(cfg: &mut Cfg, block: BlockId, op: IrOp, lhs: Var, rhs: Var) -> Var {
    let result_ty = if matches!(op, IrOp::Eq | IrOp::Gt | IrOp::Ge) { types::int_ty() } else { lhs.ty.clone() };
    if let (VarKind::Immediate(Imm::Int(a)), VarKind::Immediate(Imm::Int(b))) = (&lhs.kind, &rhs.kind) {
        if let Some(folded) = fold_int(op, *a, *b) {
            return Var { kind: VarKind::Immediate(Imm::Int(folded)), ty: result_ty, offset: 0 };
        }
    }
    let target = cfg.register_local(result_ty.clone());
    let value = var_direct(&target);
    cfg.block_mut(block).code.push(Inst::BinOp { target, op, lhs, rhs });
    value
}

/// `!value`.
#[must_use] pub fn eval_not(value: &Var) -> Option<Var> {
    if let VarKind::Immediate(Imm::Int(n)) = value.kind {
        return Some(Var { kind: VarKind::Immediate(Imm::Int(i64::from(n == 0))), ty: types::int_ty(), offset: 0 });
    }
    None
}

/// Allocates a fresh, uninitialized local of type `ty` (spec's `create_var`
/// collaborator, used for the postfix `++`/`--` old-value copy).
pub fn create_var(cfg: &mut Cfg, ty: Ty) -> Var {
    let sym = cfg.register_local(ty);
    var_direct(&sym)
}

/// `&lvalue`.
#[must_use] pub fn eval_addr(value: Var) -> Var {
    let ty = types::pointer_to(value.ty.clone());
    Var { kind: VarKind::Address(Box::new(value)), ty, offset: 0 }
}

/// `*ptr`. `&x` immediately dereferenced cancels back to `x` rather than
/// wrapping an `Address` in a `Deref`.
#[must_use] pub fn eval_deref(value: Var) -> Option<Var> {
    if let VarKind::Address(inner) = value.kind {
        return Some(*inner);
    }
    let ty = value.ty.type_deref()?;
    Some(Var { kind: VarKind::Deref(Box::new(value)), ty, offset: 0 })
}

/// `(ty) value`. An immediate integer cast to another integer or pointer
/// type stays immediate; anything else materializes a temporary.
pub fn eval_cast(cfg: &mut Cfg, block: BlockId, value: Var, ty: Ty) -> Var {
    if let VarKind::Immediate(Imm::Int(n)) = value.kind {
        if ty.is_integer() || ty.is_pointer() {
            return Var { kind: VarKind::Immediate(Imm::Int(n)), ty, offset: 0 };
        }
    }
    let target = cfg.register_local(ty.clone());
    cfg.block_mut(block).code.push(Inst::Cast { target: target.clone(), value });
    var_direct(&target)
}

/// Queues one left-to-right call argument ahead of the `Call` instruction
/// (spec §4.1's `param(block, arg_i)`).
pub fn param(cfg: &mut Cfg, block: BlockId, arg: Var) {
    cfg.block_mut(block).code.push(Inst::Param(arg));
}

/// Emits the call itself once every argument has been queued with `param`.
pub fn eval_call(cfg: &mut Cfg, block: BlockId, callee: Var, ret: Ty) -> Var {
    if ret.is_void() {
        cfg.block_mut(block).code.push(Inst::Call { target: None, callee });
        return Var { kind: VarKind::Immediate(Imm::Int(0)), ty: ret, offset: 0 };
    }
    let target = cfg.register_local(ret);
    cfg.block_mut(block).code.push(Inst::Call { target: Some(target.clone()), callee });
    var_direct(&target)
}

pub fn eval_return(cfg: &mut Cfg, block: BlockId, value: Option<Var>) {
    cfg.block_mut(block).code.push(Inst::Return(value));
}

pub fn eval_va_start(cfg: &mut Cfg, block: BlockId, ap: Var) {
    cfg.block_mut(block).code.push(Inst::VaStart(ap));
}

pub fn eval_va_arg(cfg: &mut Cfg, block: BlockId, ap: Var, ty: Ty) -> Var {
    let target = cfg.register_local(ty);
    cfg.block_mut(block).code.push(Inst::VaArg { target: target.clone(), ap });
    var_direct(&target)
}

/// Normalizes any scalar to `{0,1}` via the original's `!=` expansion
/// (`EQ(0, EQ(lhs, rhs))`), used by [`eval_logical_and`]/[`eval_logical_or`]
/// to coerce the right operand's raw value into a boolean result.
fn normalize_bool(cfg: &mut Cfg, block: BlockId, value: Var) -> Var {
    let is_zero = eval_expr(cfg, block, IrOp::Eq, var_int(0), value);
    eval_expr(cfg, block, IrOp::Eq, var_int(0), is_zero)
}

/// Wires the short-circuit `&&` merge: `left` branches to a synthesized
/// false-block (result `0`) when its operand is zero, or to `right_start`
/// otherwise. `right_start` and `right_end` are distinct whenever the right
/// operand itself spans more than one block (a parenthesized `&&`/`||`/`?:`
/// nested inside it) — `right_start` is only ever used as the branch
/// target, `right_end` is where the normalized result is actually assigned
/// and where the merge jump is attached, mirroring the original's single
/// mutable "current block" cursor now that it's two explicit values instead
/// of an implicit field. Both paths converge on a freshly allocated block,
/// returned along with the merged result.
pub fn eval_logical_and(cfg: &mut Cfg, left: BlockId, right_start: BlockId, right_end: BlockId, left_val: Var, right_val: Var) -> (BlockId, Var) {
    let false_block = cfg.new_block();
    let next = cfg.new_block();
    let target = cfg.register_local(types::int_ty());
    branch(cfg, left, left_val, false_block, right_start);
    let target_var = var_direct(&target);
    eval_assign(cfg, false_block, &target_var, var_int(0));
    jump_to(cfg, false_block, next);
    let normalized = normalize_bool(cfg, right_end, right_val);
    eval_assign(cfg, right_end, &target_var, normalized);
    jump_to(cfg, right_end, next);
    (next, target_var)
}

/// Mirror image of [`eval_logical_and`] for `||`: `left` short-circuits to a
/// true-block (result `1`) when non-zero, otherwise falls into `right_start`.
pub fn eval_logical_or(cfg: &mut Cfg, left: BlockId, right_start: BlockId, right_end: BlockId, left_val: Var, right_val: Var) -> (BlockId, Var) {
    let true_block = cfg.new_block();
    let next = cfg.new_block();
    let target = cfg.register_local(types::int_ty());
    branch(cfg, left, left_val, right_start, true_block);
    let target_var = var_direct(&target);
    eval_assign(cfg, true_block, &target_var, var_int(1));
    jump_to(cfg, true_block, next);
    let normalized = normalize_bool(cfg, right_end, right_val);
    eval_assign(cfg, right_end, &target_var, normalized);
    jump_to(cfg, right_end, next);
    (next, target_var)
}

/// `c ? t : f`. `t_block`/`f_block` each receive an assignment into a
/// shared temporary before jumping to the merge block returned alongside
/// the temporary's value (spec §4.1's ternary production).
pub fn eval_conditional(cfg: &mut Cfg, t_block: BlockId, f_block: BlockId, t_val: Var, f_val: Var, ty: Ty) -> (BlockId, Var) {
    let next = cfg.new_block();
    let target = cfg.register_local(ty);
    let target_var = var_direct(&target);
    eval_assign(cfg, t_block, &target_var, t_val);
    jump_to(cfg, t_block, next);
    eval_assign(cfg, f_block, &target_var, f_val);
    jump_to(cfg, f_block, next);
    (next, target_var)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folding_two_immediates_stays_immediate() {
        let mut cfg = Cfg::new(crate::symbol::intern("main"));
        let head = cfg.head;
        let result = eval_expr(&mut cfg, head, IrOp::Add, var_int(2), var_int(3));
        assert!(result.is_immediate());
        assert!(matches!(result.kind, VarKind::Immediate(Imm::Int(5))));
        assert!(cfg.block(head).code.is_empty());
    }

    #[test]
    fn division_by_zero_immediate_emits_an_instruction_instead_of_folding() {
        let mut cfg = Cfg::new(crate::symbol::intern("main"));
        let head = cfg.head;
        let result = eval_expr(&mut cfg, head, IrOp::Div, var_int(4), var_int(0));
        assert!(!result.is_immediate());
        assert_eq!(cfg.block(head).code.len(), 1);
    }

    #[test]
    fn logical_and_wires_false_block_reachable_only_from_left() {
        let mut cfg = Cfg::new(crate::symbol::intern("main"));
        let left = cfg.head;
        let right = cfg.new_block();
        let (next, _result) = eval_logical_and(&mut cfg, left, right, right, var_int(1), var_int(1));
        let left_jump = cfg.block(left).jump;
        assert_ne!(left_jump[0], left_jump[1]);
        assert_eq!(cfg.block(left_jump[1].unwrap()).id, right);
        let false_block = left_jump[0].unwrap();
        assert_eq!(cfg.block(false_block).jump[0], Some(next));
        assert_eq!(cfg.block(right).jump[0], Some(next));
    }

    #[test]
    fn cfg_allocates_distinct_block_ids() {
        let mut cfg = Cfg::new(crate::symbol::intern("main"));
        let b1 = cfg.new_block();
        let b2 = cfg.new_block();
        assert_ne!(b1.index(), b2.index());
    }

    #[test]
    fn addr_of_then_deref_cancels() {
        let mut cfg = Cfg::new(crate::symbol::intern("main"));
        let sym = cfg.register_local(types::int_ty());
        let addr = eval_addr(var_direct(&sym));
        let back = eval_deref(addr).unwrap();
        assert!(back.is_direct());
    }
}
