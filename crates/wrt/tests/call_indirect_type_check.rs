//! spec.md §8 scenario 2: `call_indirect` against a table slot whose function
//! has the wrong type traps with `IndirectCallTypeMismatch`, and the trap's
//! stack trace has exactly one frame (the caller of `call_indirect`).

use wrt::{Config, Engine, Error, ExternVal, Func, ModuleConfig, Store};
use wrt_core::TrapCode;

#[test]
fn mismatched_callee_type_traps() {
    let wat = r#"
        (module
            (type $t (func (result i32)))
            (table 1 1 funcref)
            (func $wrong_type (result i64) i64.const 0)
            (elem (i32.const 0) $wrong_type)
            (func (export "run") (result i32)
                i32.const 0
                call_indirect (type $t))
        )
    "#;
    let bytes = wat::parse_str(wat).unwrap();
    let engine = Engine::new(Config::default());
    let handle = engine.compile(&bytes).unwrap();
    let mut store: Store<()> = Store::new(());
    let instance = engine.instantiate(&mut store, handle, &[], &ModuleConfig::default()).unwrap();

    let run = match store.instance(instance).export("run").unwrap() {
        ExternVal::Func(f) => Func::from(f),
        _ => unreachable!(),
    };

    let mut results = [wrt::Value::I32(0)];
    let err = run.call(&mut store, &[], &mut results).unwrap_err();
    match err {
        Error::Trap(trap) => {
            assert_eq!(trap.trap_code(), Some(TrapCode::IndirectCallTypeMismatch));
            assert_eq!(trap.trace().len(), 1);
        }
        other => panic!("expected a trap, got {other}"),
    }
}
