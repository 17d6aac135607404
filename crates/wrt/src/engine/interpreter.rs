//! The goto-threaded stack machine that executes [`crate::isa::Instr`]
//! bytecode (spec.md §4.3, §5).
//!
//! Grounded on the teacher's legacy `src/runner.rs`: Wasm-to-Wasm calls never
//! recurse on the Rust call stack. A function call pushes a [`Frame`] onto an
//! explicit `Vec<Frame>` and the outer `run` loop simply keeps going, so the
//! configured recursion limit is a plain length check rather than something
//! that depends on how deep the host's own stack happens to be. Only a call
//! into a host function crosses into a real (bounded) Rust call, since a host
//! closure cannot be driven by this trampoline.
//!
//! Every value on the operand stack and every local variable share one
//! contiguous `Vec<UntypedVal>` (spec.md §3, §9): a function's params and
//! locals occupy the bottom slots of its own region of that vector, addressed
//! by a per-frame base offset. `v128` is the only value that costs two slots;
//! everything else costs one.

use crate::error::Error;
use crate::func::{ty_of, Caller};
use crate::isa::{BrTarget, DropKeep, Instr, MemArg};
use crate::module::ModuleDescriptor;
use crate::store::table::TableElement;
use crate::store::{
    decode_extern_ref, decode_func_ref, encode_extern_ref, encode_func_ref, FuncEntity, FuncIdx, InstanceIdx,
    MemoryIdx, Store, TableIdx,
};
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use wrt_collections::ArenaIndex;
use wrt_core::{RefType, TraceFrame, Trap, TrapCode, UntypedVal, Value, ValueType};

/// One live call in progress. `base` is the slot index, within the shared
/// `values` stack, where this call's parameters begin; its locals and
/// operand stack grow above that (spec.md §4.2's "locals live on the value
/// stack").
struct Frame {
    func: FuncIdx,
    instance: InstanceIdx,
    module: Arc<ModuleDescriptor>,
    body_index: u32,
    base: usize,
    /// Slot offset of each local (by Wasm local index, params first) relative
    /// to `base`.
    local_offsets: Vec<u32>,
    local_types: Vec<ValueType>,
    /// How many of this function's own result values survive when it
    /// returns by falling off the end of its body rather than hitting an
    /// explicit `return` (translate.rs never emits a trailing `Return` for
    /// implicit fallthrough, so the interpreter has to know this itself).
    result_slots: u32,
    pc: u32,
}

fn slot_sum(types: &[ValueType]) -> u32 {
    types.iter().map(|t| t.slot_count() as u32).sum()
}

/// Lays out one function's params-then-locals region: a slot offset per
/// local index, the frame's total slot width, and the width of its
/// parameters alone (spec.md §4.2).
fn compute_layout(params: &[ValueType], locals: &[ValueType]) -> (Vec<ValueType>, Vec<u32>, u32, u32) {
    let mut types = Vec::with_capacity(params.len() + locals.len());
    let mut offsets = Vec::with_capacity(params.len() + locals.len());
    let mut cursor = 0u32;
    for &t in params.iter().chain(locals.iter()) {
        offsets.push(cursor);
        types.push(t);
        cursor += t.slot_count() as u32;
    }
    (types, offsets, cursor, slot_sum(params))
}

fn push_value(values: &mut Vec<UntypedVal>, v: &Value) {
    match v {
        Value::V128(v128) => {
            let bits = v128.0;
            values.push(UntypedVal::from_raw(bits as u64));
            values.push(UntypedVal::from_raw((bits >> 64) as u64));
        }
        other => values.push(scalar_to_untyped(other)),
    }
}

fn scalar_to_untyped(v: &Value) -> UntypedVal {
    match v {
        Value::I32(x) => UntypedVal::from(*x),
        Value::I64(x) => UntypedVal::from(*x),
        Value::F32(x) => UntypedVal::from(*x),
        Value::F64(x) => UntypedVal::from(*x),
        Value::FuncRef(addr) => {
            UntypedVal::from_raw(encode_func_ref(addr.map(|a| FuncIdx::from_usize(a as usize))))
        }
        Value::ExternRef(handle) => UntypedVal::from_raw(encode_extern_ref(*handle)),
        Value::V128(_) => unreachable!("handled by push_value"),
    }
}

fn untyped_to_scalar(v: UntypedVal, ty: ValueType) -> Value {
    match ty {
        ValueType::I32 => Value::I32(v.as_i32()),
        ValueType::I64 => Value::I64(v.as_i64()),
        ValueType::F32 => Value::F32(v.as_f32()),
        ValueType::F64 => Value::F64(v.as_f64()),
        ValueType::FuncRef => Value::FuncRef(decode_func_ref(v.raw()).map(|idx| idx.into_usize() as u32)),
        ValueType::ExternRef => Value::ExternRef(decode_extern_ref(v.raw())),
        ValueType::V128 => unreachable!("handled by read_values"),
    }
}

fn read_values(slots: &[UntypedVal], types: &[ValueType]) -> Vec<Value> {
    let mut out = Vec::with_capacity(types.len());
    let mut i = 0usize;
    for &ty in types {
        if ty == ValueType::V128 {
            let lo = slots[i].raw() as u128;
            let hi = slots[i + 1].raw() as u128;
            out.push(Value::V128(wrt_core::V128(lo | (hi << 64))));
            i += 2;
        } else {
            out.push(untyped_to_scalar(slots[i], ty));
            i += 1;
        }
    }
    out
}

fn pop_values(values: &mut Vec<UntypedVal>, types: &[ValueType]) -> Vec<Value> {
    let width = slot_sum(types) as usize;
    let start = values.len() - width;
    let out = read_values(&values[start..], types);
    values.truncate(start);
    out
}

fn push_values(values: &mut Vec<UntypedVal>, vals: &[Value]) {
    for v in vals {
        push_value(values, v);
    }
}

/// Moves the top `keep` slots of `values` down to `base`, discarding
/// everything from `base` up to that point — the function's locals and any
/// leftover operand-stack junk. This is how a completed call's argument
/// region gets replaced by its results in place, for both an explicit
/// `return` and falling off the end of the body.
fn relocate_results(values: &mut Vec<UntypedVal>, base: usize, keep: usize) {
    let start = values.len() - keep;
    values.copy_within(start.., base);
    values.truncate(base + keep);
}

/// Applies a branch's precomputed drop/keep without touching locals — used
/// for in-function branches, where the frame stays alive.
fn apply_drop_keep(values: &mut Vec<UntypedVal>, dk: DropKeep) {
    let (drop, keep) = (dk.drop as usize, dk.keep as usize);
    if drop == 0 {
        return;
    }
    let keep_start = values.len() - keep;
    let drop_start = keep_start - drop;
    values.copy_within(keep_start.., drop_start);
    values.truncate(drop_start + keep);
}

fn select_op(values: &mut Vec<UntypedVal>, width: usize) {
    let c = values.pop().unwrap().as_u32();
    let val2_start = values.len() - width;
    let val1_start = val2_start - width;
    if c == 0 {
        values.copy_within(val2_start.., val1_start);
    }
    values.truncate(val1_start + width);
}

fn encode_table_element(e: TableElement) -> u64 {
    match e {
        TableElement::Func(f) => encode_func_ref(f),
        TableElement::Extern(h) => encode_extern_ref(h),
    }
}

fn decode_table_element(raw: u64, ty: RefType) -> TableElement {
    match ty {
        RefType::Func => TableElement::Func(decode_func_ref(raw)),
        RefType::Extern => TableElement::Extern(decode_extern_ref(raw)),
    }
}

fn effective_addr(base: u32, offset: u32) -> Result<u64, Trap> {
    (base as u64)
        .checked_add(offset as u64)
        .ok_or_else(|| Trap::from(TrapCode::MemoryOutOfBounds))
}

fn mem_addr<T>(store: &Store<T>, instance: InstanceIdx, idx: crate::isa::MemIdx) -> MemoryIdx {
    store.instance(instance).memory_at(idx).expect("validated module")
}

fn table_addr<T>(store: &Store<T>, instance: InstanceIdx, idx: crate::isa::TableIdx) -> TableIdx {
    store.instance(instance).table_at(idx).expect("validated module")
}

/// Shared body for every `*.Load*` opcode: pop the base address, add the
/// immediate offset, bounds-check the read, and hand the raw bytes to
/// `decode` to produce the pushed value (mirrors `V128Load` above).
fn load_scalar<T, const N: usize>(
    store: &mut Store<T>,
    instance: InstanceIdx,
    values: &mut Vec<UntypedVal>,
    m: &crate::isa::MemArg,
    decode: impl FnOnce([u8; N]) -> UntypedVal,
) -> Result<(), Trap> {
    let base = values.pop().unwrap().as_u32();
    let addr = mem_addr(store, instance, m.memory_index);
    let ea = effective_addr(base, m.offset)?;
    let mut buf = [0u8; N];
    store.memory(addr).read(ea, &mut buf).map_err(Trap::from)?;
    values.push(decode(buf));
    Ok(())
}

/// Shared body for every `*.Store*` opcode: pop value then base (matching
/// the stack discipline the rest of the loop uses), add the immediate
/// offset, bounds-check, and write the bytes `encode` produces (mirrors
/// `V128Store` above).
fn store_scalar<T, const N: usize>(
    store: &mut Store<T>,
    instance: InstanceIdx,
    values: &mut Vec<UntypedVal>,
    m: &crate::isa::MemArg,
    encode: impl FnOnce(UntypedVal) -> [u8; N],
) -> Result<(), Trap> {
    let value = values.pop().unwrap();
    let base = values.pop().unwrap().as_u32();
    let addr = mem_addr(store, instance, m.memory_index);
    let ea = effective_addr(base, m.offset)?;
    store.memory_mut(addr).write(ea, &encode(value)).map_err(Trap::from)?;
    Ok(())
}

/// Invokes `host_fn.call` directly against `Value` slices, used at the
/// embedder-facing entry point where there is no shared operand stack yet
/// (spec.md §4.6).
fn call_host_direct<T>(store: &mut Store<T>, func: FuncIdx, args: &[Value], results: &mut [Value]) -> Result<(), Trap> {
    let host_fn = match store.func(func) {
        FuncEntity::Host(h) => Arc::clone(&h.func),
        FuncEntity::Wasm(_) => unreachable!("caller already dispatched on function kind"),
    };
    let caller = Caller::new(store, None);
    host_fn.call(caller, args, results)
}

/// Calls a host function from inside the interpreter loop: pops its
/// arguments off the shared stack, runs the closure, pushes its results back.
fn call_host<T>(
    store: &mut Store<T>,
    values: &mut Vec<UntypedVal>,
    caller_instance: InstanceIdx,
    func: FuncIdx,
) -> Result<(), Trap> {
    let (ty_idx, host_fn) = match store.func(func) {
        FuncEntity::Host(h) => (h.ty, Arc::clone(&h.func)),
        FuncEntity::Wasm(_) => unreachable!("caller already dispatched on function kind"),
    };
    let ty = store.func_type(ty_idx).clone();
    let args = pop_values(values, ty.params());
    let mut results: Vec<Value> = ty.results().iter().map(|t| Value::default_for(*t)).collect();
    let caller = Caller::new(store, Some(caller_instance));
    host_fn.call(caller, &args, &mut results)?;
    push_values(values, &results);
    Ok(())
}

/// Pushes a new call frame for a guest function, continuing the trampoline
/// rather than recursing. Expects the callee's arguments already sitting on
/// top of `values` (exactly its parameter width).
fn push_wasm_frame<T>(store: &Store<T>, values: &mut Vec<UntypedVal>, frames: &mut Vec<Frame>, func: FuncIdx) -> Result<(), Trap> {
    if frames.len() >= store.stack_limits().maximum_recursion_depth {
        return Err(Trap::from(TrapCode::StackOverflow));
    }
    let (instance, module, body_index, ty) = match store.func(func) {
        FuncEntity::Wasm(w) => (w.instance, Arc::clone(&w.module), w.body_index, store.func_type(w.ty).clone()),
        FuncEntity::Host(_) => unreachable!("caller already dispatched on function kind"),
    };
    // A call observes a pending close at the next safe point (spec.md §4.3,
    // §5 "Suspension points"); every Wasm call, direct or indirect, pushes a
    // frame here, so this is that safe point.
    if store.instance(instance).close_status().is_some() {
        return Err(Trap::from(TrapCode::Closed));
    }
    let body = &module.code[body_index as usize];
    let (local_types, local_offsets, total_slots, param_slots) = compute_layout(ty.params(), &body.locals);
    let result_slots = slot_sum(ty.results());
    let base = values.len() - param_slots as usize;

    if base as u32 + body.max_stack_height > store.stack_limits().maximum_value_stack_height as u32 {
        return Err(Trap::from(TrapCode::StackOverflow));
    }

    if store.has_listeners() {
        let args = read_values(&values[base..], ty.params());
        notify_before(store, frames, func, &args);
    }

    values.resize(base + total_slots as usize, UntypedVal::default());
    frames.push(Frame {
        func,
        instance,
        module,
        body_index,
        base,
        local_offsets,
        local_types,
        result_slots,
        pc: 0,
    });
    Ok(())
}

/// Builds the call-stack snapshot a [`crate::engine::listener::FunctionListener`]
/// sees and fires its `before` hook, innermost (the about-to-run caller of
/// `func`) first.
fn notify_before<T>(store: &Store<T>, frames: &[Frame], func: FuncIdx, args: &[Value]) {
    use crate::engine::listener::StackFrameInfo;
    let stack: Vec<StackFrameInfo> = frames
        .iter()
        .rev()
        .map(|f| StackFrameInfo {
            func: f.func,
            program_counter: f.pc,
        })
        .collect();
    store.listeners().notify_before(func, args, &stack);
}

/// Fires a listener's `after` hook for a frame about to be popped, reading
/// its result values off the top `keep` slots before they get relocated.
fn notify_after<T>(store: &Store<T>, values: &[UntypedVal], frame: &Frame, keep: usize) {
    if !store.has_listeners() {
        return;
    }
    let ty = ty_of(store, frame.func);
    let start = values.len() - keep;
    let results = read_values(&values[start..], ty.results());
    store.listeners().notify_after(frame.func, &results);
}

/// Dispatches one (non-tail) call, either pushing a guest frame or making a
/// direct host call.
fn do_call<T>(
    store: &mut Store<T>,
    values: &mut Vec<UntypedVal>,
    frames: &mut Vec<Frame>,
    caller_instance: InstanceIdx,
    callee: FuncIdx,
) -> Result<(), Trap> {
    match store.func(callee) {
        FuncEntity::Host(_) => call_host(store, values, caller_instance, callee),
        FuncEntity::Wasm(_) => push_wasm_frame(store, values, frames, callee),
    }
}

/// Dispatches a tail call: the current frame never returns to its own
/// caller, it is replaced in place by `callee` (spec.md §4.3 `tail_call`).
fn do_return_call<T>(
    store: &mut Store<T>,
    values: &mut Vec<UntypedVal>,
    frames: &mut Vec<Frame>,
    caller_instance: InstanceIdx,
    callee: FuncIdx,
) -> Result<(), Trap> {
    match store.func(callee) {
        FuncEntity::Host(_) => {
            let frame = frames.pop().unwrap();
            call_host(store, values, caller_instance, callee)?;
            let result_slots = slot_sum(ty_of(store, callee).results()) as usize;
            relocate_results(values, frame.base, result_slots);
            Ok(())
        }
        FuncEntity::Wasm(_) => {
            let frame = frames.pop().unwrap();
            let param_slots = slot_sum(ty_of(store, callee).params()) as usize;
            relocate_results(values, frame.base, param_slots);
            push_wasm_frame(store, values, frames, callee)
        }
    }
}

/// The trampoline itself: runs frames until the outermost one returns.
fn run<T>(store: &mut Store<T>, values: &mut Vec<UntypedVal>, frames: &mut Vec<Frame>) -> Result<(), Trap> {
    loop {
        if frames.is_empty() {
            return Ok(());
        }
        let frame_idx = frames.len() - 1;
        let instance = frames[frame_idx].instance;
        let module = Arc::clone(&frames[frame_idx].module);
        let body_index = frames[frame_idx].body_index;
        let pc = frames[frame_idx].pc as usize;
        let instrs = &module.code[body_index as usize].instrs;

        if pc >= instrs.len() {
            let frame = frames.pop().unwrap();
            let keep = frame.result_slots as usize;
            notify_after(store, values, &frame, keep);
            relocate_results(values, frame.base, keep);
            continue;
        }

        let instr = &instrs[pc];
        frames[frame_idx].pc = pc as u32 + 1;

        macro_rules! unop {
            ($m:ident) => {{
                let a = values.pop().unwrap();
                values.push(a.$m());
            }};
        }
        macro_rules! unop_trap {
            ($m:ident) => {{
                let a = values.pop().unwrap();
                values.push(a.$m()?);
            }};
        }
        macro_rules! binop {
            ($m:ident) => {{
                let b = values.pop().unwrap();
                let a = values.pop().unwrap();
                values.push(a.$m(b));
            }};
        }
        macro_rules! binop_trap {
            ($m:ident) => {{
                let b = values.pop().unwrap();
                let a = values.pop().unwrap();
                values.push(a.$m(b)?);
            }};
        }

        match instr {
            Instr::Unreachable => return Err(Trap::from(TrapCode::Unreachable)),
            Instr::Br(target) => take_branch(values, &mut frames[frame_idx], target),
            Instr::BrIfEqz(target) => {
                let c = values.pop().unwrap().as_u32();
                if c == 0 {
                    take_branch(values, &mut frames[frame_idx], target);
                }
            }
            Instr::BrIfNez(target) => {
                let c = values.pop().unwrap().as_u32();
                if c != 0 {
                    take_branch(values, &mut frames[frame_idx], target);
                }
            }
            Instr::BrTable(targets, default) => {
                let idx = values.pop().unwrap().as_u32() as usize;
                let target = targets.get(idx).unwrap_or(default);
                take_branch(values, &mut frames[frame_idx], target);
            }
            Instr::Return(dk) => {
                let keep = dk.keep as usize;
                let frame = frames.pop().unwrap();
                notify_after(store, values, &frame, keep);
                relocate_results(values, frame.base, keep);
            }
            Instr::Call(func_idx) => {
                let callee = store.instance(instance).func_at(*func_idx).expect("validated");
                do_call(store, values, frames, instance, callee)?;
            }
            Instr::CallIndirect(type_idx, table_idx) => {
                let callee = resolve_indirect(store, &module, instance, *table_idx, *type_idx, values)?;
                do_call(store, values, frames, instance, callee)?;
            }
            Instr::ReturnCall(func_idx) => {
                let callee = store.instance(instance).func_at(*func_idx).expect("validated");
                do_return_call(store, values, frames, instance, callee)?;
            }
            Instr::ReturnCallIndirect(type_idx, table_idx) => {
                let callee = resolve_indirect(store, &module, instance, *table_idx, *type_idx, values)?;
                do_return_call(store, values, frames, instance, callee)?;
            }

            Instr::Drop(width) => {
                let new_len = values.len() - *width as usize;
                values.truncate(new_len);
            }
            Instr::Select(width) => select_op(values, *width as usize),
            Instr::TypedSelect(ty) => select_op(values, ty.slot_count()),

            Instr::LocalGet(idx) => {
                let frame = &frames[frame_idx];
                let (offset, width) = local_slot(frame, *idx);
                let top = values.len();
                values.resize(top + width, UntypedVal::default());
                for i in 0..width {
                    values[top + i] = values[frame.base + offset + i];
                }
            }
            Instr::LocalSet(idx) => {
                let frame = &frames[frame_idx];
                let (offset, width) = local_slot(frame, *idx);
                let base = frame.base;
                let top = values.len();
                for i in 0..width {
                    values[base + offset + i] = values[top - width + i];
                }
                values.truncate(top - width);
            }
            Instr::LocalTee(idx) => {
                let frame = &frames[frame_idx];
                let (offset, width) = local_slot(frame, *idx);
                let base = frame.base;
                let top = values.len();
                for i in 0..width {
                    values[base + offset + i] = values[top - width + i];
                }
            }
            Instr::GlobalGet(idx) => {
                let addr = store.instance(instance).global_at(*idx).expect("validated");
                values.push(store.global(addr).get());
            }
            Instr::GlobalSet(idx) => {
                let addr = store.instance(instance).global_at(*idx).expect("validated");
                let v = values.pop().unwrap();
                store.global_mut(addr).set(v);
            }

            Instr::I32Load(m) => load_scalar::<T, 4>(store, instance, values, m, |b| UntypedVal::from(i32::from_le_bytes(b)))?,
            Instr::I64Load(m) => load_scalar::<T, 8>(store, instance, values, m, |b| UntypedVal::from(i64::from_le_bytes(b)))?,
            Instr::F32Load(m) => {
                load_scalar::<T, 4>(store, instance, values, m, |b| UntypedVal::from(wrt_core::F32::from_bits(u32::from_le_bytes(b))))?
            }
            Instr::F64Load(m) => {
                load_scalar::<T, 8>(store, instance, values, m, |b| UntypedVal::from(wrt_core::F64::from_bits(u64::from_le_bytes(b))))?
            }
            Instr::I32Load8S(m) => load_scalar::<T, 1>(store, instance, values, m, |b| UntypedVal::from(b[0] as i8 as i32))?,
            Instr::I32Load8U(m) => load_scalar::<T, 1>(store, instance, values, m, |b| UntypedVal::from(b[0] as i32))?,
            Instr::I32Load16S(m) => load_scalar::<T, 2>(store, instance, values, m, |b| UntypedVal::from(i16::from_le_bytes(b) as i32))?,
            Instr::I32Load16U(m) => load_scalar::<T, 2>(store, instance, values, m, |b| UntypedVal::from(u16::from_le_bytes(b) as i32))?,
            Instr::I64Load8S(m) => load_scalar::<T, 1>(store, instance, values, m, |b| UntypedVal::from(b[0] as i8 as i64))?,
            Instr::I64Load8U(m) => load_scalar::<T, 1>(store, instance, values, m, |b| UntypedVal::from(b[0] as i64))?,
            Instr::I64Load16S(m) => load_scalar::<T, 2>(store, instance, values, m, |b| UntypedVal::from(i16::from_le_bytes(b) as i64))?,
            Instr::I64Load16U(m) => load_scalar::<T, 2>(store, instance, values, m, |b| UntypedVal::from(u16::from_le_bytes(b) as i64))?,
            Instr::I64Load32S(m) => load_scalar::<T, 4>(store, instance, values, m, |b| UntypedVal::from(i32::from_le_bytes(b) as i64))?,
            Instr::I64Load32U(m) => load_scalar::<T, 4>(store, instance, values, m, |b| UntypedVal::from(u32::from_le_bytes(b) as i64))?,

            Instr::I32Store(m) => store_scalar::<T, 4>(store, instance, values, m, |v: UntypedVal| v.as_u32().to_le_bytes())?,
            Instr::I64Store(m) => store_scalar::<T, 8>(store, instance, values, m, |v: UntypedVal| v.as_u64().to_le_bytes())?,
            Instr::F32Store(m) => store_scalar::<T, 4>(store, instance, values, m, |v: UntypedVal| v.as_f32().to_bits().to_le_bytes())?,
            Instr::F64Store(m) => store_scalar::<T, 8>(store, instance, values, m, |v: UntypedVal| v.as_f64().to_bits().to_le_bytes())?,
            Instr::I32Store8(m) => store_scalar::<T, 1>(store, instance, values, m, |v: UntypedVal| [v.as_u32() as u8])?,
            Instr::I32Store16(m) => store_scalar::<T, 2>(store, instance, values, m, |v: UntypedVal| (v.as_u32() as u16).to_le_bytes())?,
            Instr::I64Store8(m) => store_scalar::<T, 1>(store, instance, values, m, |v: UntypedVal| [v.as_u64() as u8])?,
            Instr::I64Store16(m) => store_scalar::<T, 2>(store, instance, values, m, |v: UntypedVal| (v.as_u64() as u16).to_le_bytes())?,
            Instr::I64Store32(m) => store_scalar::<T, 4>(store, instance, values, m, |v: UntypedVal| (v.as_u64() as u32).to_le_bytes())?,

            Instr::MemorySize(idx) => {
                let addr = mem_addr(store, instance, *idx);
                values.push(UntypedVal::from(store.memory(addr).size_pages()));
            }
            Instr::MemoryGrow(idx) => {
                let addr = mem_addr(store, instance, *idx);
                let delta = values.pop().unwrap().as_u32();
                let limiter = store.limiter.clone();
                let prev = store.memory_mut(addr).grow(delta, limiter.as_ref());
                values.push(UntypedVal::from(prev));
            }
            Instr::MemoryFill(idx) => {
                let addr = mem_addr(store, instance, *idx);
                let n = values.pop().unwrap().as_u32();
                let val = values.pop().unwrap().as_u32() as u8;
                let d = values.pop().unwrap().as_u32();
                store.memory_mut(addr).fill(d as u64, n as u64, val).map_err(Trap::from)?;
            }
            Instr::MemoryCopy(dst_idx, src_idx) => {
                let dst_addr = mem_addr(store, instance, *dst_idx);
                let src_addr = mem_addr(store, instance, *src_idx);
                let n = values.pop().unwrap().as_u32();
                let s = values.pop().unwrap().as_u32();
                let d = values.pop().unwrap().as_u32();
                let mut buf = vec![0u8; n as usize];
                store.memory(src_addr).read(s as u64, &mut buf).map_err(Trap::from)?;
                store.memory_mut(dst_addr).write(d as u64, &buf).map_err(Trap::from)?;
            }
            Instr::MemoryInit(data_idx, mem_idx) => {
                let addr = mem_addr(store, instance, *mem_idx);
                let n = values.pop().unwrap().as_u32();
                let s = values.pop().unwrap().as_u32();
                let d = values.pop().unwrap().as_u32();
                let segment = store.instance(instance).data_segments[*data_idx as usize].clone();
                let segment = segment.ok_or_else(|| Trap::from(TrapCode::MemoryOutOfBounds))?;
                store
                    .memory_mut(addr)
                    .copy_from(d as u64, &segment, s as u64, n as u64)
                    .map_err(Trap::from)?;
            }
            Instr::DataDrop(data_idx) => {
                store.instance_mut(instance).data_segments[*data_idx as usize] = None;
            }

            Instr::TableGet(idx) => {
                let addr = table_addr(store, instance, *idx);
                let i = values.pop().unwrap().as_u32();
                let elem = store.table(addr).get(i).map_err(Trap::from)?;
                values.push(UntypedVal::from_raw(encode_table_element(elem)));
            }
            Instr::TableSet(idx) => {
                let addr = table_addr(store, instance, *idx);
                let ty = store.table(addr).ty().element;
                let value = values.pop().unwrap();
                let i = values.pop().unwrap().as_u32();
                store.table_mut(addr).set(i, decode_table_element(value.raw(), ty)).map_err(Trap::from)?;
            }
            Instr::TableSize(idx) => {
                let addr = table_addr(store, instance, *idx);
                values.push(UntypedVal::from(store.table(addr).size()));
            }
            Instr::TableGrow(idx) => {
                let addr = table_addr(store, instance, *idx);
                let ty = store.table(addr).ty().element;
                let n = values.pop().unwrap().as_u32();
                let init = values.pop().unwrap();
                let limiter = store.limiter.clone();
                let prev = store.table_mut(addr).grow(n, decode_table_element(init.raw(), ty), limiter.as_ref());
                values.push(UntypedVal::from(prev));
            }
            Instr::TableFill(idx) => {
                let addr = table_addr(store, instance, *idx);
                let ty = store.table(addr).ty().element;
                let n = values.pop().unwrap().as_u32();
                let val = values.pop().unwrap();
                let d = values.pop().unwrap().as_u32();
                store.table_mut(addr).fill(d, n, decode_table_element(val.raw(), ty)).map_err(Trap::from)?;
            }
            Instr::TableCopy(dst_idx, src_idx) => {
                let dst_addr = table_addr(store, instance, *dst_idx);
                let src_addr = table_addr(store, instance, *src_idx);
                let n = values.pop().unwrap().as_u32();
                let s = values.pop().unwrap().as_u32();
                let d = values.pop().unwrap().as_u32();
                if dst_addr == src_addr {
                    store.table_mut(dst_addr).copy_within(d, s, n).map_err(Trap::from)?;
                } else {
                    let mut buf = Vec::with_capacity(n as usize);
                    for i in 0..n {
                        buf.push(store.table(src_addr).get(s + i).map_err(Trap::from)?);
                    }
                    for (i, elem) in buf.into_iter().enumerate() {
                        store.table_mut(dst_addr).set(d + i as u32, elem).map_err(Trap::from)?;
                    }
                }
            }
            Instr::TableInit(elem_idx, table_idx) => {
                let addr = table_addr(store, instance, *table_idx);
                let n = values.pop().unwrap().as_u32();
                let s = values.pop().unwrap().as_u32();
                let d = values.pop().unwrap().as_u32();
                let items = store.instance(instance).elem_segments[*elem_idx as usize].clone();
                let items = items.ok_or_else(|| Trap::from(TrapCode::TableOutOfBounds))?;
                store.table_mut(addr).init_from(d, &items, s, n).map_err(Trap::from)?;
            }
            Instr::ElemDrop(elem_idx) => {
                store.instance_mut(instance).elem_segments[*elem_idx as usize] = None;
            }

            Instr::RefNull(ty) => {
                let raw = match ty {
                    RefType::Func => encode_func_ref(None),
                    RefType::Extern => encode_extern_ref(None),
                };
                values.push(UntypedVal::from_raw(raw));
            }
            Instr::RefIsNull => {
                let v = values.pop().unwrap();
                values.push(UntypedVal::from(v.raw() == u64::MAX));
            }
            Instr::RefFunc(func_idx) => {
                let addr = store.instance(instance).func_at(*func_idx).expect("validated");
                values.push(UntypedVal::from_raw(encode_func_ref(Some(addr))));
            }

            Instr::I32Const(v) => values.push(UntypedVal::from(*v)),
            Instr::I64Const(v) => values.push(UntypedVal::from(*v)),
            Instr::F32Const(bits) => values.push(UntypedVal::from(wrt_core::F32::from_bits(*bits))),
            Instr::F64Const(bits) => values.push(UntypedVal::from(wrt_core::F64::from_bits(*bits))),

            Instr::I32Eqz => unop!(i32_eqz),
            Instr::I32Eq => binop!(i32_eq),
            Instr::I32Ne => binop!(i32_ne),
            Instr::I32LtS => binop!(i32_lt_s),
            Instr::I32LtU => binop!(i32_lt_u),
            Instr::I32GtS => binop!(i32_gt_s),
            Instr::I32GtU => binop!(i32_gt_u),
            Instr::I32LeS => binop!(i32_le_s),
            Instr::I32LeU => binop!(i32_le_u),
            Instr::I32GeS => binop!(i32_ge_s),
            Instr::I32GeU => binop!(i32_ge_u),
            Instr::I32Clz => unop!(i32_clz),
            Instr::I32Ctz => unop!(i32_ctz),
            Instr::I32Popcnt => unop!(i32_popcnt),
            Instr::I32Add => binop!(i32_add),
            Instr::I32Sub => binop!(i32_sub),
            Instr::I32Mul => binop!(i32_mul),
            Instr::I32DivS => binop_trap!(i32_div_s),
            Instr::I32DivU => binop_trap!(i32_div_u),
            Instr::I32RemS => binop_trap!(i32_rem_s),
            Instr::I32RemU => binop_trap!(i32_rem_u),
            Instr::I32And => binop!(i32_and),
            Instr::I32Or => binop!(i32_or),
            Instr::I32Xor => binop!(i32_xor),
            Instr::I32Shl => binop!(i32_shl),
            Instr::I32ShrS => binop!(i32_shr_s),
            Instr::I32ShrU => binop!(i32_shr_u),
            Instr::I32Rotl => binop!(i32_rotl),
            Instr::I32Rotr => binop!(i32_rotr),

            Instr::I64Eqz => unop!(i64_eqz),
            Instr::I64Eq => binop!(i64_eq),
            Instr::I64Ne => binop!(i64_ne),
            Instr::I64LtS => binop!(i64_lt_s),
            Instr::I64LtU => binop!(i64_lt_u),
            Instr::I64GtS => binop!(i64_gt_s),
            Instr::I64GtU => binop!(i64_gt_u),
            Instr::I64LeS => binop!(i64_le_s),
            Instr::I64LeU => binop!(i64_le_u),
            Instr::I64GeS => binop!(i64_ge_s),
            Instr::I64GeU => binop!(i64_ge_u),
            Instr::I64Clz => unop!(i64_clz),
            Instr::I64Ctz => unop!(i64_ctz),
            Instr::I64Popcnt => unop!(i64_popcnt),
            Instr::I64Add => binop!(i64_add),
            Instr::I64Sub => binop!(i64_sub),
            Instr::I64Mul => binop!(i64_mul),
            Instr::I64DivS => binop_trap!(i64_div_s),
            Instr::I64DivU => binop_trap!(i64_div_u),
            Instr::I64RemS => binop_trap!(i64_rem_s),
            Instr::I64RemU => binop_trap!(i64_rem_u),
            Instr::I64And => binop!(i64_and),
            Instr::I64Or => binop!(i64_or),
            Instr::I64Xor => binop!(i64_xor),
            Instr::I64Shl => binop!(i64_shl),
            Instr::I64ShrS => binop!(i64_shr_s),
            Instr::I64ShrU => binop!(i64_shr_u),
            Instr::I64Rotl => binop!(i64_rotl),
            Instr::I64Rotr => binop!(i64_rotr),

            Instr::F32Eq => binop!(f32_eq),
            Instr::F32Ne => binop!(f32_ne),
            Instr::F32Lt => binop!(f32_lt),
            Instr::F32Gt => binop!(f32_gt),
            Instr::F32Le => binop!(f32_le),
            Instr::F32Ge => binop!(f32_ge),
            Instr::F32Abs => unop!(f32_abs),
            Instr::F32Neg => unop!(f32_neg),
            Instr::F32Ceil => unop!(f32_ceil),
            Instr::F32Floor => unop!(f32_floor),
            Instr::F32Trunc => unop!(f32_trunc),
            Instr::F32Nearest => unop!(f32_nearest),
            Instr::F32Sqrt => unop!(f32_sqrt),
            Instr::F32Add => binop!(f32_add),
            Instr::F32Sub => binop!(f32_sub),
            Instr::F32Mul => binop!(f32_mul),
            Instr::F32Div => binop!(f32_div),
            Instr::F32Min => binop!(f32_min),
            Instr::F32Max => binop!(f32_max),
            Instr::F32Copysign => binop!(f32_copysign),

            Instr::F64Eq => binop!(f64_eq),
            Instr::F64Ne => binop!(f64_ne),
            Instr::F64Lt => binop!(f64_lt),
            Instr::F64Gt => binop!(f64_gt),
            Instr::F64Le => binop!(f64_le),
            Instr::F64Ge => binop!(f64_ge),
            Instr::F64Abs => unop!(f64_abs),
            Instr::F64Neg => unop!(f64_neg),
            Instr::F64Ceil => unop!(f64_ceil),
            Instr::F64Floor => unop!(f64_floor),
            Instr::F64Trunc => unop!(f64_trunc),
            Instr::F64Nearest => unop!(f64_nearest),
            Instr::F64Sqrt => unop!(f64_sqrt),
            Instr::F64Add => binop!(f64_add),
            Instr::F64Sub => binop!(f64_sub),
            Instr::F64Mul => binop!(f64_mul),
            Instr::F64Div => binop!(f64_div),
            Instr::F64Min => binop!(f64_min),
            Instr::F64Max => binop!(f64_max),
            Instr::F64Copysign => binop!(f64_copysign),

            Instr::I32WrapI64 => unop!(i32_wrap_i64),
            Instr::I32TruncF32S => unop_trap!(i32_trunc_f32_s),
            Instr::I32TruncF32U => unop_trap!(i32_trunc_f32_u),
            Instr::I32TruncF64S => unop_trap!(i32_trunc_f64_s),
            Instr::I32TruncF64U => unop_trap!(i32_trunc_f64_u),
            Instr::I64ExtendI32S => unop!(i64_extend_i32_s),
            Instr::I64ExtendI32U => unop!(i64_extend_i32_u),
            Instr::I64TruncF32S => unop_trap!(i64_trunc_f32_s),
            Instr::I64TruncF32U => unop_trap!(i64_trunc_f32_u),
            Instr::I64TruncF64S => unop_trap!(i64_trunc_f64_s),
            Instr::I64TruncF64U => unop_trap!(i64_trunc_f64_u),
            Instr::F32ConvertI32S => unop!(f32_convert_i32_s),
            Instr::F32ConvertI32U => unop!(f32_convert_i32_u),
            Instr::F32ConvertI64S => unop!(f32_convert_i64_s),
            Instr::F32ConvertI64U => unop!(f32_convert_i64_u),
            Instr::F32DemoteF64 => unop!(f32_demote_f64),
            Instr::F64ConvertI32S => unop!(f64_convert_i32_s),
            Instr::F64ConvertI32U => unop!(f64_convert_i32_u),
            Instr::F64ConvertI64S => unop!(f64_convert_i64_s),
            Instr::F64ConvertI64U => unop!(f64_convert_i64_u),
            Instr::F64PromoteF32 => unop!(f64_promote_f32),
            Instr::I32ReinterpretF32 => unop!(i32_reinterpret_f32),
            Instr::I64ReinterpretF64 => unop!(i64_reinterpret_f64),
            Instr::F32ReinterpretI32 => unop!(f32_reinterpret_i32),
            Instr::F64ReinterpretI64 => unop!(f64_reinterpret_i64),

            Instr::I32Extend8S => unop!(i32_extend8_s),
            Instr::I32Extend16S => unop!(i32_extend16_s),
            Instr::I64Extend8S => unop!(i64_extend8_s),
            Instr::I64Extend16S => unop!(i64_extend16_s),
            Instr::I64Extend32S => unop!(i64_extend32_s),

            Instr::I32TruncSatF32S => unop!(i32_trunc_sat_f32_s),
            Instr::I32TruncSatF32U => unop!(i32_trunc_sat_f32_u),
            Instr::I32TruncSatF64S => unop!(i32_trunc_sat_f64_s),
            Instr::I32TruncSatF64U => unop!(i32_trunc_sat_f64_u),
            Instr::I64TruncSatF32S => unop!(i64_trunc_sat_f32_s),
            Instr::I64TruncSatF32U => unop!(i64_trunc_sat_f32_u),
            Instr::I64TruncSatF64S => unop!(i64_trunc_sat_f64_s),
            Instr::I64TruncSatF64U => unop!(i64_trunc_sat_f64_u),

            Instr::V128Load(m) => {
                let base = values.pop().unwrap().as_u32();
                let addr = mem_addr(store, instance, m.memory_index);
                let ea = effective_addr(base, m.offset)?;
                let mut buf = [0u8; 16];
                store.memory(addr).read(ea, &mut buf).map_err(Trap::from)?;
                let v = u128::from_le_bytes(buf);
                values.push(UntypedVal::from_raw(v as u64));
                values.push(UntypedVal::from_raw((v >> 64) as u64));
            }
            Instr::V128Store(m) => {
                let hi = values.pop().unwrap().raw();
                let lo = values.pop().unwrap().raw();
                let base = values.pop().unwrap().as_u32();
                let addr = mem_addr(store, instance, m.memory_index);
                let ea = effective_addr(base, m.offset)?;
                let v: u128 = (lo as u128) | ((hi as u128) << 64);
                store.memory_mut(addr).write(ea, &v.to_le_bytes()).map_err(Trap::from)?;
            }
            Instr::V128Const(bits) => {
                values.push(UntypedVal::from_raw(*bits as u64));
                values.push(UntypedVal::from_raw((*bits >> 64) as u64));
            }
        }
    }
}

fn local_slot(frame: &Frame, idx: u32) -> (usize, usize) {
    let i = idx as usize;
    (frame.local_offsets[i] as usize, frame.local_types[i].slot_count())
}

fn take_branch(values: &mut Vec<UntypedVal>, frame: &mut Frame, target: &BrTarget) {
    apply_drop_keep(values, target.drop_keep);
    frame.pc = target.pc;
}

fn resolve_indirect<T>(
    store: &mut Store<T>,
    module: &ModuleDescriptor,
    instance: InstanceIdx,
    table_idx: crate::isa::TableIdx,
    type_idx: crate::isa::TypeIdx,
    values: &mut Vec<UntypedVal>,
) -> Result<FuncIdx, Trap> {
    let addr = table_addr(store, instance, table_idx);
    let elem_index = values.pop().unwrap().as_u32();
    let elem = store.table(addr).get(elem_index).map_err(Trap::from)?;
    let func_addr = match elem {
        TableElement::Func(Some(f)) => f,
        TableElement::Func(None) => return Err(Trap::from(TrapCode::UndefinedElement)),
        TableElement::Extern(_) => return Err(Trap::from(TrapCode::IndirectCallTypeMismatch)),
    };
    let expected = &module.types[type_idx as usize];
    if *expected != ty_of(store, func_addr) {
        return Err(Trap::from(TrapCode::IndirectCallTypeMismatch));
    }
    Ok(func_addr)
}

/// Captures the live call stack, innermost frame first, for attaching to a
/// propagating trap (spec.md §6 "wasm stack trace", §8 scenario 2's
/// "frame-stack length 1"). `func` packs the owning instance and body index
/// into one opaque `u64`; only this crate knows how to unpack it.
fn capture_trace(frames: &[Frame]) -> alloc::vec::Vec<TraceFrame> {
    frames
        .iter()
        .rev()
        .map(|f| TraceFrame {
            func: (f.instance.into_usize() as u64) << 32 | f.body_index as u64,
            program_counter: f.pc.saturating_sub(1),
        })
        .collect()
}

/// Invokes a function by its store address, binding `args`/`results` to the
/// embedder's typed [`Value`] slices (spec.md §4.6's call convention).
/// Dispatches Host vs Wasm internally: a host function is called directly, a
/// guest function gets a fresh trampoline with one initial frame.
pub fn invoke<T>(store: &mut Store<T>, func: FuncIdx, args: &[Value], results: &mut [Value]) -> Result<(), Error> {
    if matches!(store.func(func), FuncEntity::Host(_)) {
        return call_host_direct(store, func, args, results).map_err(Error::Trap);
    }

    let mut values = Vec::with_capacity(store.stack_limits().initial_value_stack_height);
    for a in args {
        push_value(&mut values, a);
    }
    let mut frames = Vec::new();
    push_wasm_frame(store, &mut values, &mut frames, func).map_err(Error::Trap)?;
    if let Err(trap) = run(store, &mut values, &mut frames) {
        return Err(Error::Trap(trap.with_trace(capture_trace(&frames))));
    }

    let ty = ty_of(store, func);
    let out = read_values(&values, ty.results());
    results.clone_from_slice(&out);
    Ok(())
}
