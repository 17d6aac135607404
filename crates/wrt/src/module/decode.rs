//! Binary decoding and validation (spec.md §4.1, §4.2).
//!
//! Grounded on the teacher's modern `crates/wasmi/src/module/parser.rs`: a
//! two-pass approach over `wasmparser`. Unlike the teacher, which drives
//! `wasmparser::Parser` incrementally against a `Read` stream (needed there
//! for its `Module::new` streaming API), the engine's [`super::Section`]
//! contract hands us the whole byte slice up front, so the first pass is a
//! single [`wasmparser::Validator::validate_all`] call and the second a
//! single [`wasmparser::Parser::parse_all`] walk that builds the
//! [`ModuleDescriptor`] and lowers each function body via
//! [`super::translate::translate_function`].

use super::{
    ConstExpr, DataMode, DataSegment, ElementMode, ElementSegment, Export, ExternKind, GlobalType,
    Import, ImportKind, MemoryType, ModuleDescriptor, Section, TableType,
};
use crate::config::Features;
use crate::error::DecodeError;
use alloc::string::ToString;
use alloc::vec::Vec;
use wasmparser::{Parser, Payload, Validator, WasmFeatures};
use wrt_core::{FuncType, Limits, RefType, ValueType};

fn err(section: Section, offset: usize, message: impl core::fmt::Display) -> DecodeError {
    DecodeError {
        section,
        offset,
        message: message.to_string(),
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

fn ref_type(ty: wasmparser::RefType) -> RefType {
    if ty.is_func_ref() {
        RefType::Func
    } else {
        RefType::Extern
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

fn limits(ty: &wasmparser::MemoryType) -> Limits {
    Limits::new(ty.initial as u32, ty.maximum.map(|m| m as u32))
}

fn table_limits(ty: &wasmparser::TableType) -> Limits {
    Limits::new(ty.initial, ty.maximum)
}

fn const_expr(expr: &wasmparser::ConstExpr<'_>, section: Section) -> Result<ConstExpr, DecodeError> {
    let mut reader = expr.get_operators_reader();
    let op = reader
        .read()
        .map_err(|e| err(section, e.offset(), e.message()))?;
    let out = match op {
        wasmparser::Operator::I32Const { value } => ConstExpr::I32(value),
        wasmparser::Operator::I64Const { value } => ConstExpr::I64(value),
        wasmparser::Operator::F32Const { value } => ConstExpr::F32(value.bits()),
        wasmparser::Operator::F64Const { value } => ConstExpr::F64(value.bits()),
        wasmparser::Operator::V128Const { value } => {
            ConstExpr::V128(u128::from_le_bytes(*value.bytes()))
        }
        wasmparser::Operator::RefNull { hty } => ConstExpr::RefNull(heap_type(hty)),
        wasmparser::Operator::RefFunc { function_index } => ConstExpr::RefFunc(function_index),
        wasmparser::Operator::GlobalGet { global_index } => ConstExpr::GlobalGet(global_index),
        other => {
            return Err(err(
                section,
                0,
                alloc::format!("unsupported constant expression operator: {other:?}"),
            ))
        }
    };
    Ok(out)
}

/// Decodes and fully validates `bytes`, producing the module's static shape.
///
/// Function bodies are translated to this crate's own bytecode as part of
/// this pass (spec.md §4.2's "single validation+translation pass").
pub fn decode(bytes: &[u8], features: Features) -> Result<ModuleDescriptor, DecodeError> {
    let wasm_features: WasmFeatures = features.into();

    let mut validator = Validator::new_with_features(wasm_features);
    validator
        .validate_all(bytes)
        .map_err(|e| err(Section::Custom, e.offset(), e.message()))?;

    let mut module = ModuleDescriptor::default();
    let mut func_type_indices = Vec::new();

    for payload in Parser::new(0).parse_all(bytes) {
        let payload = payload.map_err(|e| err(Section::Custom, e.offset(), e.message()))?;
        match payload {
            Payload::TypeSection(reader) => {
                for rec_group in reader {
                    let rec_group = rec_group.map_err(|e| err(Section::Type, e.offset(), e.message()))?;
                    for sub_type in rec_group.into_types() {
                        let func = sub_type
                            .composite_type
                            .inner
                            .unwrap_func()
                            .ok_or_else(|| err(Section::Type, 0, "only function types are supported"))?;
                        module.types.push(FuncType::new(
                            func.params().iter().copied().map(val_type),
                            func.results().iter().copied().map(val_type),
                        ));
                    }
                }
            }
            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import.map_err(|e| err(Section::Import, e.offset(), e.message()))?;
                    let kind = match import.ty {
                        wasmparser::TypeRef::Func(idx) => ImportKind::Func(idx),
                        wasmparser::TypeRef::Table(ty) => ImportKind::Table(TableType {
                            element: ref_type(ty.element_type),
                            limits: table_limits(&ty),
                        }),
                        wasmparser::TypeRef::Memory(ty) => ImportKind::Memory(MemoryType {
                            limits: limits(&ty),
                        }),
                        wasmparser::TypeRef::Global(ty) => ImportKind::Global(GlobalType {
                            content: val_type(ty.content_type),
                            mutable: ty.mutable,
                        }),
                        wasmparser::TypeRef::Tag(_) => {
                            return Err(err(Section::Import, 0, "exception tags are not supported"))
                        }
                    };
                    module.imports.push(Import {
                        module: import.module.to_string(),
                        field: import.name.to_string(),
                        kind,
                    });
                }
            }
            Payload::FunctionSection(reader) => {
                for ty in reader {
                    let ty = ty.map_err(|e| err(Section::Function, e.offset(), e.message()))?;
                    func_type_indices.push(ty);
                }
            }
            Payload::TableSection(reader) => {
                for table in reader {
                    let table = table.map_err(|e| err(Section::Table, e.offset(), e.message()))?;
                    module.tables.push(TableType {
                        element: ref_type(table.ty.element_type),
                        limits: table_limits(&table.ty),
                    });
                }
            }
            Payload::MemorySection(reader) => {
                for memory in reader {
                    let memory = memory.map_err(|e| err(Section::Memory, e.offset(), e.message()))?;
                    module.memories.push(MemoryType {
                        limits: limits(&memory),
                    });
                }
            }
            Payload::GlobalSection(reader) => {
                for global in reader {
                    let global = global.map_err(|e| err(Section::Global, e.offset(), e.message()))?;
                    let ty = GlobalType {
                        content: val_type(global.ty.content_type),
                        mutable: global.ty.mutable,
                    };
                    let init = const_expr(&global.init_expr, Section::Global)?;
                    module.globals.push((ty, init));
                }
            }
            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export.map_err(|e| err(Section::Export, e.offset(), e.message()))?;
                    let kind = match export.kind {
                        wasmparser::ExternalKind::Func => ExternKind::Func,
                        wasmparser::ExternalKind::Table => ExternKind::Table,
                        wasmparser::ExternalKind::Memory => ExternKind::Memory,
                        wasmparser::ExternalKind::Global => ExternKind::Global,
                        wasmparser::ExternalKind::Tag => {
                            return Err(err(Section::Export, 0, "exception tags are not supported"))
                        }
                    };
                    module.exports.push(Export {
                        name: export.name.to_string(),
                        kind,
                        index: export.index,
                    });
                }
            }
            Payload::StartSection { func, .. } => {
                module.start = Some(func);
            }
            Payload::ElementSection(reader) => {
                for elem in reader {
                    let elem = elem.map_err(|e| err(Section::Element, e.offset(), e.message()))?;
                    let ty = ref_type(elem.ty);
                    let items = match elem.items {
                        wasmparser::ElementItems::Functions(funcs) => funcs
                            .into_iter()
                            .map(|f| f.map(ConstExpr::RefFunc))
                            .collect::<Result<Vec<_>, _>>()
                            .map_err(|e| err(Section::Element, e.offset(), e.message()))?,
                        wasmparser::ElementItems::Expressions(_, exprs) => exprs
                            .into_iter()
                            .map(|e| {
                                e.map_err(|e| err(Section::Element, e.offset(), e.message()))
                                    .and_then(|expr| const_expr(&expr, Section::Element))
                            })
                            .collect::<Result<Vec<_>, _>>()?,
                    };
                    let mode = match elem.kind {
                        wasmparser::ElementKind::Active {
                            table_index,
                            offset_expr,
                        } => ElementMode::Active {
                            table_index: table_index.unwrap_or(0),
                            offset: const_expr(&offset_expr, Section::Element)?,
                        },
                        wasmparser::ElementKind::Passive => ElementMode::Passive,
                        wasmparser::ElementKind::Declared => ElementMode::Declared,
                    };
                    module.elements.push(ElementSegment { ty, items, mode });
                }
            }
            Payload::DataCountSection { count, .. } => {
                module.data_count = Some(count);
            }
            Payload::DataSection(reader) => {
                for data in reader {
                    let data = data.map_err(|e| err(Section::Data, e.offset(), e.message()))?;
                    let mode = match data.kind {
                        wasmparser::DataKind::Active {
                            memory_index,
                            offset_expr,
                        } => DataMode::Active {
                            memory_index,
                            offset: const_expr(&offset_expr, Section::Data)?,
                        },
                        wasmparser::DataKind::Passive => DataMode::Passive,
                    };
                    module.data.push(DataSegment {
                        bytes: data.data.to_vec(),
                        mode,
                    });
                }
            }
            Payload::CodeSectionEntry(body) => {
                let func_local_index = module.code.len();
                let type_index = *func_type_indices.get(func_local_index).ok_or_else(|| {
                    err(Section::Code, 0, "code section entry has no matching function declaration")
                })?;
                let func_type = module.types.get(type_index as usize).ok_or_else(|| {
                    err(Section::Code, 0, "function declaration refers to an unknown type")
                })?;
                let body = super::translate::translate_function(&body, func_type, &module, features)
                    .map_err(|e| err(Section::Code, e.offset, e.message))?;
                module.code.push(body);
                module.functions.push(type_index);
            }
            _ => {}
        }
    }

    Ok(module)
}
