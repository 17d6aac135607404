//! spec.md §8 scenario 3: `memory.grow` return values and an out-of-bounds
//! store that must not touch memory.

use wrt::{Config, Engine, Error, ExternVal, Func, ModuleConfig, Store, Value};
use wrt_core::TrapCode;

fn setup() -> (Store<()>, Func, Func, Func) {
    let wat = r#"
        (module
            (memory (export "mem") 1 2)
            (func (export "grow") (param i32) (result i32)
                local.get 0
                memory.grow)
            (func (export "store_at") (param i32 i32)
                local.get 0
                local.get 1
                i32.store)
            (func (export "load_at") (param i32) (result i32)
                local.get 0
                i32.load)
        )
    "#;
    let bytes = wat::parse_str(wat).unwrap();
    let engine = Engine::new(Config::default());
    let handle = engine.compile(&bytes).unwrap();
    let mut store: Store<()> = Store::new(());
    let instance = engine.instantiate(&mut store, handle, &[], &ModuleConfig::default()).unwrap();

    let get = |name: &str, store: &Store<()>| match store.instance(instance).export(name).unwrap() {
        ExternVal::Func(f) => Func::from(f),
        _ => unreachable!(),
    };
    let grow = get("grow", &store);
    let store_at = get("store_at", &store);
    let load_at = get("load_at", &store);
    (store, grow, store_at, load_at)
}

#[test]
fn grow_returns_prior_page_count_then_fails_past_the_max() {
    let (mut store, grow, _, _) = setup();

    let mut out = [Value::I32(0)];
    grow.call(&mut store, &[Value::I32(1)], &mut out).unwrap();
    assert_eq!(out, [Value::I32(1)]);

    grow.call(&mut store, &[Value::I32(1)], &mut out).unwrap();
    assert_eq!(out, [Value::I32(-1)]);
}

#[test]
fn store_crossing_a_page_boundary_succeeds() {
    let (mut store, _, store_at, load_at) = setup();

    store_at.call(&mut store, &[Value::I32(65535), Value::I32(0x1234_5678)], &mut []).unwrap();

    let mut out = [Value::I32(0)];
    load_at.call(&mut store, &[Value::I32(65535)], &mut out).unwrap();
    assert_eq!(out, [Value::I32(0x1234_5678)]);
}

#[test]
fn store_past_the_grown_size_traps_without_writing() {
    let (mut store, grow, store_at, load_at) = setup();

    let mut out = [Value::I32(0)];
    grow.call(&mut store, &[Value::I32(1)], &mut out).unwrap();

    let oob_addr = (2 * 65536 - 3) as i32;
    let err = store_at.call(&mut store, &[Value::I32(oob_addr), Value::I32(1)], &mut []).unwrap_err();
    match err {
        Error::Trap(trap) => assert_eq!(trap.trap_code(), Some(TrapCode::MemoryOutOfBounds)),
        other => panic!("expected a trap, got {other}"),
    }

    load_at.call(&mut store, &[Value::I32(0)], &mut out).unwrap();
    assert_eq!(out, [Value::I32(0)]);
}
