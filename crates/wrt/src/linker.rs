//! Module instantiation (spec.md §4.5): a single atomic pipeline from a
//! compiled module plus a flat list of provided imports to a live instance.
//!
//! Grounded on the standard Wasm instantiation algorithm the teacher's own
//! `Linker::instantiate` follows: resolve and type-check imports, allocate
//! every locally defined entity (extending the import index spaces),
//! range-check every active element/data segment *before* mutating anything,
//! then — and only then — apply the segments and run the start function.
//! Any failure once allocation has started — an out-of-range segment or a
//! trapping start function — rolls every arena back to its length before
//! this call, so the store ends up exactly as it was found (spec.md §8
//! scenario 4).

use crate::config::ModuleConfig;
use crate::engine::CompiledModule;
use crate::error::{Error, LinkError};
use crate::module::{ConstExpr, ElementMode, ExternKind, Import, ImportKind, ModuleDescriptor};
use crate::store::table::TableElement;
use crate::store::{
    ExternVal, FuncEntity, GlobalEntity, InstanceEntity, InstanceIdx, MemoryEntity, Store, TableEntity,
    WasmFuncEntity,
};
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::ToString;
use alloc::sync::Arc;
use alloc::vec::Vec;
use wrt_core::{RefType, UntypedVal, ValueType};

fn describe_kind(kind: &ImportKind) -> &'static str {
    match kind {
        ImportKind::Func(_) => "function",
        ImportKind::Table(_) => "table",
        ImportKind::Memory(_) => "memory",
        ImportKind::Global(_) => "global",
    }
}

fn describe_extern<T>(_store: &Store<T>, val: ExternVal) -> &'static str {
    match val {
        ExternVal::Func(_) => "function",
        ExternVal::Table(_) => "table",
        ExternVal::Memory(_) => "memory",
        ExternVal::Global(_) => "global",
    }
}

fn check_import_match<T>(
    store: &Store<T>,
    module: &ModuleDescriptor,
    import: &Import,
    provided: ExternVal,
) -> Result<(), LinkError> {
    let mismatch = || LinkError::ImportTypeMismatch {
        module: import.module.clone(),
        field: import.field.clone(),
        expected: describe_kind(&import.kind).to_string(),
        found: describe_extern(store, provided).to_string(),
    };
    match (&import.kind, provided) {
        (ImportKind::Func(ty_idx), ExternVal::Func(f)) => {
            let expected = &module.types[*ty_idx as usize];
            let found = crate::func::ty_of(store, f);
            if *expected != found {
                return Err(mismatch());
            }
        }
        (ImportKind::Table(expected), ExternVal::Table(t)) => {
            let found = store.table(t).ty();
            if expected.element != found.element || !expected.limits.is_subset_of(&found.limits) {
                return Err(mismatch());
            }
        }
        (ImportKind::Memory(expected), ExternVal::Memory(m)) => {
            let found = store.memory(m).ty();
            if !expected.limits.is_subset_of(&found.limits) {
                return Err(mismatch());
            }
        }
        (ImportKind::Global(expected), ExternVal::Global(g)) => {
            let found = store.global(g).ty();
            if *expected != found {
                return Err(mismatch());
            }
        }
        _ => return Err(mismatch()),
    }
    Ok(())
}

fn eval_const_expr<T>(
    expr: &ConstExpr,
    globals_so_far: &[crate::store::GlobalIdx],
    func_addrs: &[crate::store::FuncIdx],
    store: &Store<T>,
) -> Result<UntypedVal, LinkError> {
    Ok(match expr {
        ConstExpr::I32(v) => UntypedVal::from(*v),
        ConstExpr::I64(v) => UntypedVal::from(*v),
        ConstExpr::F32(bits) => UntypedVal::from(wrt_core::F32::from_bits(*bits)),
        ConstExpr::F64(bits) => UntypedVal::from(wrt_core::F64::from_bits(*bits)),
        ConstExpr::V128(_) => {
            return Err(LinkError::InvalidModuleConfig(
                "v128 constant expressions are not supported outside memory/table position".into(),
            ))
        }
        ConstExpr::RefNull(_) => UntypedVal::from_raw(crate::store::encode_func_ref(None)),
        ConstExpr::RefFunc(idx) => {
            let addr = *func_addrs.get(*idx as usize).ok_or_else(|| {
                LinkError::InvalidModuleConfig(format!("constant expression refers to unknown function {idx}"))
            })?;
            UntypedVal::from_raw(crate::store::encode_func_ref(Some(addr)))
        }
        ConstExpr::GlobalGet(idx) => {
            let addr = *globals_so_far.get(*idx as usize).ok_or_else(|| {
                LinkError::InvalidModuleConfig(format!("constant expression refers to unknown global {idx}"))
            })?;
            store.global(addr).get()
        }
    })
}

fn table_element_of(expr: &ConstExpr, func_addrs: &[crate::store::FuncIdx]) -> TableElement {
    match expr {
        ConstExpr::RefNull(RefType::Func) => TableElement::Func(None),
        ConstExpr::RefNull(RefType::Extern) => TableElement::Extern(None),
        ConstExpr::RefFunc(idx) => TableElement::Func(func_addrs.get(*idx as usize).copied()),
        _ => TableElement::Func(None),
    }
}

use wrt_collections::ArenaIndex;

/// Runs the instantiation pipeline for `compiled` against `imports`, which
/// must line up positionally with `compiled.descriptor().imports`.
///
/// Rolls every arena back to its pre-call length if anything past import
/// resolution fails, so a trapping start function (or an out-of-range
/// segment) leaves the store exactly as it found it (spec.md §8 scenario 4).
pub fn instantiate<T>(
    store: &mut Store<T>,
    compiled: &Arc<CompiledModule>,
    imports: &[ExternVal],
    config: &ModuleConfig,
) -> Result<InstanceIdx, Error> {
    config.validate()?;
    let module = Arc::clone(compiled.descriptor());

    if imports.len() != module.imports.len() {
        return Err(Error::Link(LinkError::ImportNotFound {
            module: "<module>".into(),
            field: "<n/a>".into(),
        }));
    }

    // Step 1: resolve and type-check imports.
    for (import, provided) in module.imports.iter().zip(imports.iter()) {
        check_import_match(store, &module, import, *provided)?;
    }

    let mark = store.mark();
    instantiate_allocated(store, &module, imports, config).map_err(|err| {
        store.rollback_to(mark);
        err
    })
}

fn instantiate_allocated<T>(
    store: &mut Store<T>,
    module: &Arc<ModuleDescriptor>,
    imports: &[ExternVal],
    config: &ModuleConfig,
) -> Result<InstanceIdx, Error> {
    let instance_idx = store.next_instance_idx();

    let mut func_addrs = Vec::new();
    let mut table_addrs = Vec::new();
    let mut memory_addrs = Vec::new();
    let mut global_addrs = Vec::new();

    // Imports extend each kind's index space in encounter order (the
    // binary format interleaves kinds within the import section).
    for (import, provided) in module.imports.iter().zip(imports.iter()) {
        match (&import.kind, provided) {
            (ImportKind::Func(_), ExternVal::Func(f)) => func_addrs.push(*f),
            (ImportKind::Table(_), ExternVal::Table(t)) => table_addrs.push(*t),
            (ImportKind::Memory(_), ExternVal::Memory(m)) => memory_addrs.push(*m),
            (ImportKind::Global(_), ExternVal::Global(g)) => global_addrs.push(*g),
            _ => unreachable!("checked above"),
        }
    }

    // Step 2: allocate locally defined entities, extending the index spaces.
    for (body_index, &ty_idx) in module.functions.iter().enumerate() {
        let ty = store.intern_func_type(module.types[ty_idx as usize].clone());
        let addr = store.alloc_func(FuncEntity::Wasm(WasmFuncEntity {
            ty,
            module: Arc::clone(module),
            body_index: body_index as u32,
            instance: instance_idx,
        }));
        func_addrs.push(addr);
    }
    for table in &module.tables {
        let addr = store.alloc_table(TableEntity::new(*table));
        table_addrs.push(addr);
    }
    for memory in &module.memories {
        let addr = store.alloc_memory(
            MemoryEntity::new(*memory).map_err(Error::Link)?,
        );
        memory_addrs.push(addr);
    }
    for (ty, init) in &module.globals {
        let value = eval_const_expr(init, &global_addrs, &func_addrs, store)?;
        let addr = store.alloc_global(GlobalEntity::new(*ty, value));
        global_addrs.push(addr);
    }
    // Step 3: range-check every active segment before mutating anything.
    let mut element_offsets = Vec::with_capacity(module.elements.len());
    for elem in &module.elements {
        if let ElementMode::Active { table_index, offset } = &elem.mode {
            let table_addr = table_addrs[*table_index as usize];
            let offset_val = eval_const_expr(offset, &global_addrs, &func_addrs, store)?.as_u32();
            let table_size = store.table(table_addr).size();
            let end = offset_val.checked_add(elem.items.len() as u32);
            if end.map_or(true, |e| e > table_size) {
                return Err(Error::Link(LinkError::ElementOutOfRange {
                    segment: element_offsets.len() as u32,
                }));
            }
            element_offsets.push(Some((table_addr, offset_val)));
        } else {
            element_offsets.push(None);
        }
    }
    let mut data_offsets = Vec::with_capacity(module.data.len());
    for data in &module.data {
        if let crate::module::DataMode::Active { memory_index, offset } = &data.mode {
            let mem_addr = memory_addrs[*memory_index as usize];
            let offset_val = eval_const_expr(offset, &global_addrs, &func_addrs, store)?.as_u32() as u64;
            let mem_len = store.memory(mem_addr).data().len() as u64;
            let end = offset_val.checked_add(data.bytes.len() as u64);
            if end.map_or(true, |e| e > mem_len) {
                return Err(Error::Link(LinkError::DataOutOfRange {
                    segment: data_offsets.len() as u32,
                }));
            }
            data_offsets.push(Some((mem_addr, offset_val)));
        } else {
            data_offsets.push(None);
        }
    }

    // Step 4 (+5): apply active segments now that every one of them is known
    // to be in range; stash passive segments for `table.init`/`memory.init`.
    let mut elem_segments = Vec::with_capacity(module.elements.len());
    for (elem, resolved) in module.elements.iter().zip(&element_offsets) {
        let elements: Vec<TableElement> = elem.items.iter().map(|e| table_element_of(e, &func_addrs)).collect();
        if let Some((table_addr, offset)) = resolved {
            for (i, item) in elements.iter().enumerate() {
                store.table_mut(*table_addr).set(offset + i as u32, *item).expect("range-checked above");
            }
        }
        elem_segments.push(match elem.mode {
            ElementMode::Declared => None,
            _ => Some(Arc::from(elements.into_boxed_slice())),
        });
    }
    let mut data_segments = Vec::with_capacity(module.data.len());
    for (data, resolved) in module.data.iter().zip(&data_offsets) {
        if let Some((mem_addr, offset)) = resolved {
            store
                .memory_mut(*mem_addr)
                .write(*offset, &data.bytes)
                .expect("range-checked above");
        }
        data_segments.push(Some(Arc::from(data.bytes.clone().into_boxed_slice())));
    }

    // Step 6: collect exports and finalize the instance.
    let mut exports = BTreeMap::new();
    for export in &module.exports {
        let val = match export.kind {
            ExternKind::Func => ExternVal::Func(func_addrs[export.index as usize]),
            ExternKind::Table => ExternVal::Table(table_addrs[export.index as usize]),
            ExternKind::Memory => ExternVal::Memory(memory_addrs[export.index as usize]),
            ExternKind::Global => ExternVal::Global(global_addrs[export.index as usize]),
        };
        exports.insert(export.name.clone(), val);
    }

    let entity = InstanceEntity::new(
        Arc::clone(module),
        func_addrs,
        table_addrs,
        memory_addrs,
        global_addrs,
        exports,
        data_segments,
        elem_segments,
    );
    let allocated_idx = store.alloc_instance(entity);
    debug_assert_eq!(allocated_idx, instance_idx);

    // Step 7: run the start function, if any, before the instance is
    // published under a name — a trapping start must not leave a partially
    // initialized instance reachable through `lookup_module` (spec.md §4.5
    // "atomic from the observer's standpoint").
    if let Some(start) = module.start {
        let func = store.instance(instance_idx).func_at(start).expect("validated");
        let mut no_results = [];
        crate::func::call_any(store, func, Some(instance_idx), &[], &mut no_results)
            .map_err(|trap| Error::Link(LinkError::TrapInStart(trap)))?;
    }

    // Step 8: publish under the requested name, if any (spec.md §4.4).
    if !config.name.is_empty() {
        store.register_module_instance(config.name.clone(), instance_idx)?;
    }

    Ok(instance_idx)
}
