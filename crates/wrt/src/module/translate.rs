//! Lowers a validated Wasm function body to this crate's flattened bytecode
//! (spec.md §4.2).
//!
//! Grounded on the teacher's legacy `src/prepare/compile.rs` + `src/isa.rs`:
//! a single forward pass over the operator stream, maintaining a shadow
//! operand-type stack (for `drop`/`keep` slot arithmetic — `v128` costs two
//! slots, everything else one) and a control-frame stack (for resolving
//! `br`/`br_if`/`br_table` targets, which the structured binary format only
//! expresses as relative block depths).
//!
//! The module has already passed [`wasmparser::Validator::validate_all`], so
//! this pass does not re-check types; it only needs to reconstruct enough of
//! the type stack to compute slot counts and resolve branch arities.

use crate::config::Features;
use crate::error::DecodeError;
use crate::isa::{BrTarget, DropKeep, Instr, MemArg};
use crate::module::{FuncBody, ModuleDescriptor, Section};
use alloc::vec::Vec;
use wrt_core::{FuncType, RefType, ValueType};

fn derr(offset: usize, message: impl core::fmt::Display) -> DecodeError {
    DecodeError {
        section: Section::Code,
        offset,
        message: alloc::string::ToString::to_string(&message),
    }
}

fn val_type(ty: wasmparser::ValType) -> ValueType {
    match ty {
        wasmparser::ValType::I32 => ValueType::I32,
        wasmparser::ValType::I64 => ValueType::I64,
        wasmparser::ValType::F32 => ValueType::F32,
        wasmparser::ValType::F64 => ValueType::F64,
        wasmparser::ValType::V128 => ValueType::V128,
        wasmparser::ValType::Ref(r) if r.is_func_ref() => ValueType::FuncRef,
        wasmparser::ValType::Ref(_) => ValueType::ExternRef,
    }
}

/// The parameter and result arity of a structured block, resolved from a
/// `wasmparser::BlockType` against the module's type section.
struct BlockArity {
    params: Vec<ValueType>,
    results: Vec<ValueType>,
}

fn block_arity(bt: wasmparser::BlockType, module: &ModuleDescriptor) -> BlockArity {
    match bt {
        wasmparser::BlockType::Empty => BlockArity {
            params: Vec::new(),
            results: Vec::new(),
        },
        wasmparser::BlockType::Type(ty) => BlockArity {
            params: Vec::new(),
            results: alloc::vec![val_type(ty)],
        },
        wasmparser::BlockType::FuncType(idx) => {
            let ty = &module.types[idx as usize];
            BlockArity {
                params: ty.params().to_vec(),
                results: ty.results().to_vec(),
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CtrlKind {
    Block,
    Loop,
    If,
}

struct CtrlFrame {
    kind: CtrlKind,
    results: Vec<ValueType>,
    /// Operand-stack slot height at the point this frame was entered (after
    /// popping the block's own parameters off the enclosing stack).
    height: u32,
    /// Instruction index branches to this frame's `loop` header resolve to;
    /// only meaningful for `CtrlKind::Loop`.
    loop_start: u32,
    /// Instructions (their index in `instrs`) whose branch target is this
    /// frame's `end`, patched once the `end` position is known.
    pending_ends: Vec<EndPatch>,
    /// Index of the `BrIfEqz` emitted for an `if` with no `else` seen yet.
    else_jump: Option<usize>,
    unreachable: bool,
}

enum EndPatch {
    Single(usize),
    Table(usize, usize),
    TableDefault(usize),
}

fn slot_height(stack: &[ValueType]) -> u32 {
    stack.iter().map(|t| t.slot_count() as u32).sum()
}

fn drop_keep_to(stack_height: u32, target_height: u32, keep_types: &[ValueType]) -> DropKeep {
    let keep = slot_height(keep_types);
    let drop = stack_height.saturating_sub(target_height + keep);
    DropKeep::new(drop, keep)
}

/// Translates one function body. `func_type` is this function's own
/// signature (its params become the bottom locals); `module` gives access to
/// the type section for resolving block types and call targets.
pub fn translate_function(
    body: &wasmparser::FunctionBody<'_>,
    func_type: &FuncType,
    module: &ModuleDescriptor,
    features: Features,
) -> Result<FuncBody, DecodeError> {
    let mut locals = Vec::new();
    for local in body.get_locals_reader().map_err(|e| derr(e.offset(), e.message()))? {
        let (count, ty) = local.map_err(|e| derr(e.offset(), e.message()))?;
        for _ in 0..count {
            locals.push(val_type(ty));
        }
    }

    let frame_slots = slot_height(func_type.params()) + slot_height(&locals);

    let mut instrs: Vec<Instr> = Vec::new();
    let mut type_stack: Vec<ValueType> = Vec::new();
    let mut max_height = frame_slots;
    let mut current_height = frame_slots;

    let results = func_type.results().to_vec();
    let mut ctrl: Vec<CtrlFrame> = alloc::vec![CtrlFrame {
        kind: CtrlKind::Block,
        results: results.clone(),
        height: frame_slots,
        loop_start: 0,
        pending_ends: Vec::new(),
        else_jump: None,
        unreachable: false,
    }];

    macro_rules! push_ty {
        ($ty:expr) => {{
            let ty = $ty;
            current_height += ty.slot_count() as u32;
            type_stack.push(ty);
            max_height = max_height.max(current_height);
        }};
    }
    macro_rules! pop_ty {
        () => {{
            let ty = type_stack.pop().unwrap_or(ValueType::I32);
            current_height = current_height.saturating_sub(ty.slot_count() as u32);
            ty
        }};
    }
    macro_rules! pop_n {
        ($n:expr) => {
            for _ in 0..$n {
                pop_ty!();
            }
        };
    }
    macro_rules! unop {
        () => {{
            pop_ty!();
        }};
    }
    macro_rules! binop {
        () => {{
            pop_ty!();
            pop_ty!();
        }};
    }

    let _ = features;
    let mut reader = body.get_operators_reader().map_err(|e| derr(e.offset(), e.message()))?;
    while !reader.eof() {
        let offset = reader.original_position();
        let op = reader.read().map_err(|e| derr(e.offset(), e.message()))?;
        use wasmparser::Operator as O;
        match op {
            O::Unreachable => {
                instrs.push(Instr::Unreachable);
                ctrl.last_mut().unwrap().unreachable = true;
            }
            O::Nop => {}
            O::Block { blockty } => {
                let arity = block_arity(blockty, module);
                pop_n!(arity.params.len());
                let height = current_height;
                for p in &arity.params {
                    push_ty!(*p);
                }
                ctrl.push(CtrlFrame {
                    kind: CtrlKind::Block,
                    results: arity.results,
                    height,
                    loop_start: 0,
                    pending_ends: Vec::new(),
                    else_jump: None,
                    unreachable: false,
                });
            }
            O::Loop { blockty } => {
                let arity = block_arity(blockty, module);
                pop_n!(arity.params.len());
                let height = current_height;
                for p in &arity.params {
                    push_ty!(*p);
                }
                ctrl.push(CtrlFrame {
                    kind: CtrlKind::Loop,
                    results: arity.params,
                    height,
                    loop_start: instrs.len() as u32,
                    pending_ends: Vec::new(),
                    else_jump: None,
                    unreachable: false,
                });
            }
            O::If { blockty } => {
                pop_ty!(); // condition
                let arity = block_arity(blockty, module);
                pop_n!(arity.params.len());
                let height = current_height;
                for p in &arity.params {
                    push_ty!(*p);
                }
                let jump_idx = instrs.len();
                instrs.push(Instr::BrIfEqz(BrTarget {
                    pc: 0,
                    drop_keep: DropKeep::new(0, 0),
                }));
                ctrl.push(CtrlFrame {
                    kind: CtrlKind::If,
                    results: arity.results,
                    height,
                    loop_start: 0,
                    pending_ends: Vec::new(),
                    else_jump: Some(jump_idx),
                    unreachable: false,
                });
            }
            O::Else => {
                let frame = ctrl.last_mut().unwrap();
                let jump_idx_to_end = instrs.len();
                instrs.push(Instr::Br(BrTarget {
                    pc: 0,
                    drop_keep: DropKeep::new(0, 0),
                }));
                frame.pending_ends.push(EndPatch::Single(jump_idx_to_end));
                if let Some(else_jump) = frame.else_jump.take() {
                    let target = instrs.len() as u32;
                    if let Instr::BrIfEqz(t) = &mut instrs[else_jump] {
                        t.pc = target;
                    }
                }
                current_height = frame.height;
                // Reset operand stack to the block's entry height for the else arm.
                while slot_height(&type_stack) > frame.height {
                    type_stack.pop();
                }
                frame.unreachable = false;
            }
            O::End => {
                let frame = ctrl.pop().unwrap();
                if let Some(else_jump) = frame.else_jump {
                    if let Instr::BrIfEqz(t) = &mut instrs[else_jump] {
                        t.pc = instrs.len() as u32;
                    }
                }
                let end_pc = instrs.len() as u32;
                for patch in frame.pending_ends {
                    match patch {
                        EndPatch::Single(idx) => patch_branch(&mut instrs, idx, end_pc),
                        EndPatch::Table(idx, n) => patch_table_target(&mut instrs, idx, n, end_pc),
                        EndPatch::TableDefault(idx) => patch_table_default(&mut instrs, idx, end_pc),
                    }
                }
                current_height = frame.height;
                while slot_height(&type_stack) > frame.height {
                    type_stack.pop();
                }
                for r in &frame.results {
                    push_ty!(*r);
                }
                if ctrl.is_empty() {
                    ctrl.push(CtrlFrame {
                        kind: CtrlKind::Block,
                        results: Vec::new(),
                        height: current_height,
                        loop_start: 0,
                        pending_ends: Vec::new(),
                        else_jump: None,
                        unreachable: false,
                    });
                }
            }
            O::Br { relative_depth } => {
                let target = &ctrl[ctrl.len() - 1 - relative_depth as usize];
                let (pc_known, target_height, keep) =
                    branch_target_info(target);
                let dk = drop_keep_to(current_height, target_height, keep);
                let idx = instrs.len();
                instrs.push(Instr::Br(BrTarget {
                    pc: pc_known.unwrap_or(0),
                    drop_keep: dk,
                }));
                if pc_known.is_none() {
                    let depth = ctrl.len() - 1 - relative_depth as usize;
                    ctrl[depth].pending_ends.push(EndPatch::Single(idx));
                }
                ctrl.last_mut().unwrap().unreachable = true;
            }
            O::BrIf { relative_depth } => {
                pop_ty!(); // condition
                let target = &ctrl[ctrl.len() - 1 - relative_depth as usize];
                let (pc_known, target_height, keep) = branch_target_info(target);
                let dk = drop_keep_to(current_height, target_height, keep);
                let idx = instrs.len();
                instrs.push(Instr::BrIfNez(BrTarget {
                    pc: pc_known.unwrap_or(0),
                    drop_keep: dk,
                }));
                if pc_known.is_none() {
                    let depth = ctrl.len() - 1 - relative_depth as usize;
                    ctrl[depth].pending_ends.push(EndPatch::Single(idx));
                }
            }
            O::BrTable { targets } => {
                pop_ty!(); // index
                let idx = instrs.len();
                let mut resolved = Vec::new();
                for (n, t) in targets.targets().enumerate() {
                    let relative_depth = t.map_err(|e| derr(e.offset(), e.message()))?;
                    let depth = ctrl.len() - 1 - relative_depth as usize;
                    let (pc_known, target_height, keep) = branch_target_info(&ctrl[depth]);
                    let dk = drop_keep_to(current_height, target_height, keep);
                    resolved.push(BrTarget {
                        pc: pc_known.unwrap_or(0),
                        drop_keep: dk,
                    });
                    if pc_known.is_none() {
                        ctrl[depth].pending_ends.push(EndPatch::Table(idx, n));
                    }
                }
                let default_depth = ctrl.len() - 1 - targets.default() as usize;
                let (pc_known, target_height, keep) = branch_target_info(&ctrl[default_depth]);
                let default = BrTarget {
                    pc: pc_known.unwrap_or(0),
                    drop_keep: drop_keep_to(current_height, target_height, keep),
                };
                if pc_known.is_none() {
                    ctrl[default_depth].pending_ends.push(EndPatch::TableDefault(idx));
                }
                instrs.push(Instr::BrTable(resolved, default));
                ctrl.last_mut().unwrap().unreachable = true;
            }
            O::Return => {
                let base = ctrl[0].height;
                let dk = drop_keep_to(current_height, base, &results);
                instrs.push(Instr::Return(dk));
                ctrl.last_mut().unwrap().unreachable = true;
            }
            O::Call { function_index } => {
                let ty_idx = module.func_type_index(function_index).ok_or_else(|| {
                    derr(offset, "call to an unknown function index")
                })?;
                let ty = &module.types[ty_idx as usize];
                pop_n!(ty.params().len());
                instrs.push(Instr::Call(function_index));
                for r in ty.results().to_vec() {
                    push_ty!(r);
                }
            }
            O::CallIndirect { type_index, table_index } => {
                pop_ty!(); // table element index
                let ty = &module.types[type_index as usize];
                pop_n!(ty.params().len());
                instrs.push(Instr::CallIndirect(type_index, table_index));
                for r in ty.results().to_vec() {
                    push_ty!(r);
                }
            }
            O::ReturnCall { function_index } => {
                let ty_idx = module
                    .func_type_index(function_index)
                    .ok_or_else(|| derr(offset, "return_call to an unknown function index"))?;
                let ty = &module.types[ty_idx as usize];
                pop_n!(ty.params().len());
                instrs.push(Instr::ReturnCall(function_index));
                ctrl.last_mut().unwrap().unreachable = true;
            }
            O::ReturnCallIndirect { type_index, table_index } => {
                pop_ty!(); // table element index
                let ty = &module.types[type_index as usize];
                pop_n!(ty.params().len());
                instrs.push(Instr::ReturnCallIndirect(type_index, table_index));
                ctrl.last_mut().unwrap().unreachable = true;
            }
            O::Drop => {
                let ty = pop_ty!();
                instrs.push(Instr::Drop(ty.slot_count() as u32));
            }
            O::Select => {
                pop_ty!();
                let ty = pop_ty!();
                pop_ty!();
                push_ty!(ty);
                instrs.push(Instr::Select(ty.slot_count() as u32));
            }
            O::TypedSelect { ty } => {
                pop_ty!();
                pop_ty!();
                pop_ty!();
                let vt = val_type(ty);
                push_ty!(vt);
                instrs.push(Instr::TypedSelect(vt));
            }
            O::LocalGet { local_index } => {
                let ty = local_type(func_type, &locals, local_index);
                push_ty!(ty);
                instrs.push(Instr::LocalGet(local_index));
            }
            O::LocalSet { local_index } => {
                pop_ty!();
                instrs.push(Instr::LocalSet(local_index));
            }
            O::LocalTee { local_index } => {
                instrs.push(Instr::LocalTee(local_index));
            }
            O::GlobalGet { global_index } => {
                let ty = global_type(module, global_index);
                push_ty!(ty);
                instrs.push(Instr::GlobalGet(global_index));
            }
            O::GlobalSet { global_index } => {
                pop_ty!();
                instrs.push(Instr::GlobalSet(global_index));
            }

            O::I32Load { memarg } => { pop_ty!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Load(mem(memarg))); }
            O::I64Load { memarg } => { pop_ty!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Load(mem(memarg))); }
            O::F32Load { memarg } => { pop_ty!(); push_ty!(ValueType::F32); instrs.push(Instr::F32Load(mem(memarg))); }
            O::F64Load { memarg } => { pop_ty!(); push_ty!(ValueType::F64); instrs.push(Instr::F64Load(mem(memarg))); }
            O::I32Load8S { memarg } => { pop_ty!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Load8S(mem(memarg))); }
            O::I32Load8U { memarg } => { pop_ty!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Load8U(mem(memarg))); }
            O::I32Load16S { memarg } => { pop_ty!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Load16S(mem(memarg))); }
            O::I32Load16U { memarg } => { pop_ty!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Load16U(mem(memarg))); }
            O::I64Load8S { memarg } => { pop_ty!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Load8S(mem(memarg))); }
            O::I64Load8U { memarg } => { pop_ty!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Load8U(mem(memarg))); }
            O::I64Load16S { memarg } => { pop_ty!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Load16S(mem(memarg))); }
            O::I64Load16U { memarg } => { pop_ty!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Load16U(mem(memarg))); }
            O::I64Load32S { memarg } => { pop_ty!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Load32S(mem(memarg))); }
            O::I64Load32U { memarg } => { pop_ty!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Load32U(mem(memarg))); }

            O::I32Store { memarg } => { binop!(); instrs.push(Instr::I32Store(mem(memarg))); }
            O::I64Store { memarg } => { binop!(); instrs.push(Instr::I64Store(mem(memarg))); }
            O::F32Store { memarg } => { binop!(); instrs.push(Instr::F32Store(mem(memarg))); }
            O::F64Store { memarg } => { binop!(); instrs.push(Instr::F64Store(mem(memarg))); }
            O::I32Store8 { memarg } => { binop!(); instrs.push(Instr::I32Store8(mem(memarg))); }
            O::I32Store16 { memarg } => { binop!(); instrs.push(Instr::I32Store16(mem(memarg))); }
            O::I64Store8 { memarg } => { binop!(); instrs.push(Instr::I64Store8(mem(memarg))); }
            O::I64Store16 { memarg } => { binop!(); instrs.push(Instr::I64Store16(mem(memarg))); }
            O::I64Store32 { memarg } => { binop!(); instrs.push(Instr::I64Store32(mem(memarg))); }

            O::MemorySize { mem: idx, .. } => { push_ty!(ValueType::I32); instrs.push(Instr::MemorySize(idx)); }
            O::MemoryGrow { mem: idx, .. } => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::MemoryGrow(idx)); }
            O::MemoryFill { mem: idx } => { pop_n!(3); instrs.push(Instr::MemoryFill(idx)); }
            O::MemoryCopy { dst_mem, src_mem } => { pop_n!(3); instrs.push(Instr::MemoryCopy(dst_mem, src_mem)); }
            O::MemoryInit { data_index, mem: idx } => { pop_n!(3); instrs.push(Instr::MemoryInit(data_index, idx)); }
            O::DataDrop { data_index } => { instrs.push(Instr::DataDrop(data_index)); }

            O::TableGet { table } => { pop_ty!(); let rt = table_val_type(module, table); push_ty!(rt); instrs.push(Instr::TableGet(table)); }
            O::TableSet { table } => { pop_n!(2); instrs.push(Instr::TableSet(table)); }
            O::TableSize { table } => { push_ty!(ValueType::I32); instrs.push(Instr::TableSize(table)); }
            O::TableGrow { table } => { pop_n!(2); push_ty!(ValueType::I32); instrs.push(Instr::TableGrow(table)); }
            O::TableFill { table } => { pop_n!(3); instrs.push(Instr::TableFill(table)); }
            O::TableCopy { dst_table, src_table } => { pop_n!(3); instrs.push(Instr::TableCopy(dst_table, src_table)); }
            O::TableInit { elem_index, table } => { pop_n!(3); instrs.push(Instr::TableInit(elem_index, table)); }
            O::ElemDrop { elem_index } => { instrs.push(Instr::ElemDrop(elem_index)); }

            O::RefNull { hty } => {
                let rt = heap_type(hty);
                push_ty!(match rt {
                    RefType::Func => ValueType::FuncRef,
                    RefType::Extern => ValueType::ExternRef,
                });
                instrs.push(Instr::RefNull(rt));
            }
            O::RefIsNull => { pop_ty!(); push_ty!(ValueType::I32); instrs.push(Instr::RefIsNull); }
            O::RefFunc { function_index } => { push_ty!(ValueType::FuncRef); instrs.push(Instr::RefFunc(function_index)); }

            O::I32Const { value } => { push_ty!(ValueType::I32); instrs.push(Instr::I32Const(value)); }
            O::I64Const { value } => { push_ty!(ValueType::I64); instrs.push(Instr::I64Const(value)); }
            O::F32Const { value } => { push_ty!(ValueType::F32); instrs.push(Instr::F32Const(value.bits())); }
            O::F64Const { value } => { push_ty!(ValueType::F64); instrs.push(Instr::F64Const(value.bits())); }

            O::I32Eqz => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Eqz); }
            O::I32Eq => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Eq); }
            O::I32Ne => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Ne); }
            O::I32LtS => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32LtS); }
            O::I32LtU => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32LtU); }
            O::I32GtS => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32GtS); }
            O::I32GtU => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32GtU); }
            O::I32LeS => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32LeS); }
            O::I32LeU => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32LeU); }
            O::I32GeS => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32GeS); }
            O::I32GeU => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32GeU); }

            O::I64Eqz => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::I64Eqz); }
            O::I64Eq => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I64Eq); }
            O::I64Ne => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I64Ne); }
            O::I64LtS => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I64LtS); }
            O::I64LtU => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I64LtU); }
            O::I64GtS => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I64GtS); }
            O::I64GtU => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I64GtU); }
            O::I64LeS => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I64LeS); }
            O::I64LeU => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I64LeU); }
            O::I64GeS => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I64GeS); }
            O::I64GeU => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I64GeU); }

            O::F32Eq => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::F32Eq); }
            O::F32Ne => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::F32Ne); }
            O::F32Lt => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::F32Lt); }
            O::F32Gt => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::F32Gt); }
            O::F32Le => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::F32Le); }
            O::F32Ge => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::F32Ge); }

            O::F64Eq => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::F64Eq); }
            O::F64Ne => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::F64Ne); }
            O::F64Lt => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::F64Lt); }
            O::F64Gt => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::F64Gt); }
            O::F64Le => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::F64Le); }
            O::F64Ge => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::F64Ge); }

            O::I32Clz => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Clz); }
            O::I32Ctz => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Ctz); }
            O::I32Popcnt => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Popcnt); }
            O::I32Add => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Add); }
            O::I32Sub => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Sub); }
            O::I32Mul => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Mul); }
            O::I32DivS => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32DivS); }
            O::I32DivU => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32DivU); }
            O::I32RemS => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32RemS); }
            O::I32RemU => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32RemU); }
            O::I32And => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32And); }
            O::I32Or => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Or); }
            O::I32Xor => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Xor); }
            O::I32Shl => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Shl); }
            O::I32ShrS => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32ShrS); }
            O::I32ShrU => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32ShrU); }
            O::I32Rotl => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Rotl); }
            O::I32Rotr => { binop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Rotr); }

            O::I64Clz => { unop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Clz); }
            O::I64Ctz => { unop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Ctz); }
            O::I64Popcnt => { unop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Popcnt); }
            O::I64Add => { binop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Add); }
            O::I64Sub => { binop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Sub); }
            O::I64Mul => { binop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Mul); }
            O::I64DivS => { binop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64DivS); }
            O::I64DivU => { binop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64DivU); }
            O::I64RemS => { binop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64RemS); }
            O::I64RemU => { binop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64RemU); }
            O::I64And => { binop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64And); }
            O::I64Or => { binop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Or); }
            O::I64Xor => { binop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Xor); }
            O::I64Shl => { binop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Shl); }
            O::I64ShrS => { binop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64ShrS); }
            O::I64ShrU => { binop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64ShrU); }
            O::I64Rotl => { binop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Rotl); }
            O::I64Rotr => { binop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Rotr); }

            O::F32Abs => { unop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32Abs); }
            O::F32Neg => { unop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32Neg); }
            O::F32Ceil => { unop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32Ceil); }
            O::F32Floor => { unop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32Floor); }
            O::F32Trunc => { unop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32Trunc); }
            O::F32Nearest => { unop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32Nearest); }
            O::F32Sqrt => { unop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32Sqrt); }
            O::F32Add => { binop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32Add); }
            O::F32Sub => { binop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32Sub); }
            O::F32Mul => { binop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32Mul); }
            O::F32Div => { binop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32Div); }
            O::F32Min => { binop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32Min); }
            O::F32Max => { binop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32Max); }
            O::F32Copysign => { binop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32Copysign); }

            O::F64Abs => { unop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64Abs); }
            O::F64Neg => { unop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64Neg); }
            O::F64Ceil => { unop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64Ceil); }
            O::F64Floor => { unop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64Floor); }
            O::F64Trunc => { unop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64Trunc); }
            O::F64Nearest => { unop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64Nearest); }
            O::F64Sqrt => { unop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64Sqrt); }
            O::F64Add => { binop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64Add); }
            O::F64Sub => { binop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64Sub); }
            O::F64Mul => { binop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64Mul); }
            O::F64Div => { binop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64Div); }
            O::F64Min => { binop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64Min); }
            O::F64Max => { binop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64Max); }
            O::F64Copysign => { binop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64Copysign); }

            O::I32WrapI64 => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32WrapI64); }
            O::I32TruncF32S => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32TruncF32S); }
            O::I32TruncF32U => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32TruncF32U); }
            O::I32TruncF64S => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32TruncF64S); }
            O::I32TruncF64U => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32TruncF64U); }
            O::I64ExtendI32S => { unop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64ExtendI32S); }
            O::I64ExtendI32U => { unop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64ExtendI32U); }
            O::I64TruncF32S => { unop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64TruncF32S); }
            O::I64TruncF32U => { unop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64TruncF32U); }
            O::I64TruncF64S => { unop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64TruncF64S); }
            O::I64TruncF64U => { unop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64TruncF64U); }
            O::F32ConvertI32S => { unop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32ConvertI32S); }
            O::F32ConvertI32U => { unop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32ConvertI32U); }
            O::F32ConvertI64S => { unop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32ConvertI64S); }
            O::F32ConvertI64U => { unop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32ConvertI64U); }
            O::F32DemoteF64 => { unop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32DemoteF64); }
            O::F64ConvertI32S => { unop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64ConvertI32S); }
            O::F64ConvertI32U => { unop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64ConvertI32U); }
            O::F64ConvertI64S => { unop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64ConvertI64S); }
            O::F64ConvertI64U => { unop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64ConvertI64U); }
            O::F64PromoteF32 => { unop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64PromoteF32); }
            O::I32ReinterpretF32 => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32ReinterpretF32); }
            O::I64ReinterpretF64 => { unop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64ReinterpretF64); }
            O::F32ReinterpretI32 => { unop!(); push_ty!(ValueType::F32); instrs.push(Instr::F32ReinterpretI32); }
            O::F64ReinterpretI64 => { unop!(); push_ty!(ValueType::F64); instrs.push(Instr::F64ReinterpretI64); }

            O::I32Extend8S => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Extend8S); }
            O::I32Extend16S => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32Extend16S); }
            O::I64Extend8S => { unop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Extend8S); }
            O::I64Extend16S => { unop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Extend16S); }
            O::I64Extend32S => { unop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64Extend32S); }

            O::I32TruncSatF32S => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32TruncSatF32S); }
            O::I32TruncSatF32U => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32TruncSatF32U); }
            O::I32TruncSatF64S => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32TruncSatF64S); }
            O::I32TruncSatF64U => { unop!(); push_ty!(ValueType::I32); instrs.push(Instr::I32TruncSatF64U); }
            O::I64TruncSatF32S => { unop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64TruncSatF32S); }
            O::I64TruncSatF32U => { unop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64TruncSatF32U); }
            O::I64TruncSatF64S => { unop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64TruncSatF64S); }
            O::I64TruncSatF64U => { unop!(); push_ty!(ValueType::I64); instrs.push(Instr::I64TruncSatF64U); }

            O::V128Load { memarg } => { pop_ty!(); push_ty!(ValueType::V128); instrs.push(Instr::V128Load(mem(memarg))); }
            O::V128Store { memarg } => { pop_ty!(); pop_ty!(); instrs.push(Instr::V128Store(mem(memarg))); }
            O::V128Const { value } => { push_ty!(ValueType::V128); instrs.push(Instr::V128Const(u128::from_le_bytes(*value.bytes()))); }

            other => {
                return Err(derr(offset, alloc::format!("unsupported operator: {other:?}")));
            }
        }
    }

    Ok(FuncBody {
        locals,
        instrs,
        max_stack_height: max_height,
    })
}

fn branch_target_info(frame: &CtrlFrame) -> (Option<u32>, u32, Vec<ValueType>) {
    match frame.kind {
        CtrlKind::Loop => (Some(frame.loop_start), frame.height, frame.results.clone()),
        CtrlKind::Block | CtrlKind::If => (None, frame.height, frame.results.clone()),
    }
}

fn patch_branch(instrs: &mut [Instr], idx: usize, pc: u32) {
    match &mut instrs[idx] {
        Instr::Br(t) | Instr::BrIfEqz(t) | Instr::BrIfNez(t) => t.pc = pc,
        _ => {}
    }
}

fn patch_table_target(instrs: &mut [Instr], idx: usize, n: usize, pc: u32) {
    if let Instr::BrTable(targets, _) = &mut instrs[idx] {
        targets[n].pc = pc;
    }
}

fn patch_table_default(instrs: &mut [Instr], idx: usize, pc: u32) {
    if let Instr::BrTable(_, default) = &mut instrs[idx] {
        default.pc = pc;
    }
}

fn local_type(func_type: &FuncType, locals: &[ValueType], index: u32) -> ValueType {
    let params = func_type.params();
    if (index as usize) < params.len() {
        params[index as usize]
    } else {
        locals[index as usize - params.len()]
    }
}

fn global_type(module: &ModuleDescriptor, index: u32) -> ValueType {
    let imported = module
        .imports
        .iter()
        .filter_map(|i| match &i.kind {
            crate::module::ImportKind::Global(g) => Some(*g),
            _ => None,
        })
        .count() as u32;
    if index < imported {
        module
            .imports
            .iter()
            .filter_map(|i| match &i.kind {
                crate::module::ImportKind::Global(g) => Some(*g),
                _ => None,
            })
            .nth(index as usize)
            .unwrap()
            .content
    } else {
        module.globals[(index - imported) as usize].0.content
    }
}

fn table_val_type(module: &ModuleDescriptor, index: u32) -> ValueType {
    let imported = module
        .imports
        .iter()
        .filter_map(|i| match &i.kind {
            crate::module::ImportKind::Table(t) => Some(*t),
            _ => None,
        })
        .count() as u32;
    let element = if index < imported {
        module
            .imports
            .iter()
            .filter_map(|i| match &i.kind {
                crate::module::ImportKind::Table(t) => Some(*t),
                _ => None,
            })
            .nth(index as usize)
            .unwrap()
            .element
    } else {
        module.tables[(index - imported) as usize].element
    };
    match element {
        RefType::Func => ValueType::FuncRef,
        RefType::Extern => ValueType::ExternRef,
    }
}

fn heap_type(ty: wasmparser::HeapType) -> RefType {
    match ty {
        wasmparser::HeapType::Abstract {
            ty: wasmparser::AbstractHeapType::Func,
            ..
        } => RefType::Func,
        _ => RefType::Extern,
    }
}

fn mem(memarg: wasmparser::MemArg) -> MemArg {
    MemArg {
        offset: memarg.offset as u32,
        memory_index: memarg.memory,
    }
}
