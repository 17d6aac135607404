//! spec.md §8 scenario 5: a guest calls a host `exit` import, which closes
//! its own instance; the closing call observes the exit trap directly, and
//! any further call into the same instance observes `Closed` instead.

use wrt::{Caller, Config, Engine, Error, ExternVal, Func, InstanceIdx, ModuleConfig, Store};

fn compile_and_link(wat: &str) -> (Engine, Store<()>, InstanceIdx) {
    let bytes = wat::parse_str(wat).expect("valid wat");
    let engine = Engine::new(Config::default());
    let handle = engine.compile(&bytes).expect("decodes and validates");
    let mut store = Store::new(());

    let exit = Func::wrap(&mut store, |mut caller: Caller<'_, ()>, code: i32| -> Result<(), Error> {
        Err(Error::Trap(caller.close_with_exit_code(code)))
    });

    let instance = engine
        .instantiate(&mut store, handle, &[ExternVal::from(exit)], &ModuleConfig::default())
        .expect("instantiates");
    (engine, store, instance)
}

#[test]
fn closing_call_observes_its_own_exit() {
    let wat = r#"
        (module
            (import "host" "exit" (func $exit (param i32)))
            (func $start (export "_start")
                i32.const 2
                call $exit)
        )
    "#;
    let (_engine, mut store, instance) = compile_and_link(wat);

    let start = match store.instance(instance).export("_start").unwrap() {
        ExternVal::Func(f) => Func::from(f),
        _ => unreachable!(),
    };

    let err = start.call(&mut store, &[], &mut []).unwrap_err();
    let trap = match err {
        Error::Trap(t) => t,
        other => panic!("expected a trap, got {other}"),
    };
    assert_eq!(trap.i32_exit_status(), Some(2));
    assert!(!trap.is_closed());
}

#[test]
fn subsequent_call_into_closed_instance_is_rejected() {
    let wat = r#"
        (module
            (import "host" "exit" (func $exit (param i32)))
            (func $start (export "_start")
                i32.const 2
                call $exit)
            (func (export "noop"))
        )
    "#;
    let (_engine, mut store, instance) = compile_and_link(wat);

    let start = match store.instance(instance).export("_start").unwrap() {
        ExternVal::Func(f) => Func::from(f),
        _ => unreachable!(),
    };
    let noop = match store.instance(instance).export("noop").unwrap() {
        ExternVal::Func(f) => Func::from(f),
        _ => unreachable!(),
    };

    let _ = start.call(&mut store, &[], &mut []).unwrap_err();

    let err = noop.call(&mut store, &[], &mut []).unwrap_err();
    match err {
        Error::Trap(trap) => assert!(trap.is_closed(), "expected Closed trap, got {trap}"),
        other => panic!("expected a trap, got {other}"),
    }
}

#[test]
fn closing_the_store_closes_every_instance() {
    let wat = r#"(module (func (export "noop")))"#;
    let bytes = wat::parse_str(wat).unwrap();
    let engine = Engine::new(Config::default());
    let handle = engine.compile(&bytes).unwrap();
    let mut store: Store<()> = Store::new(());
    let instance = engine.instantiate(&mut store, handle, &[], &ModuleConfig::default()).unwrap();

    store.close_with_exit_code(7);

    let noop = match store.instance(instance).export("noop").unwrap() {
        ExternVal::Func(f) => Func::from(f),
        _ => unreachable!(),
    };
    let err = noop.call(&mut store, &[], &mut []).unwrap_err();
    match err {
        Error::Trap(trap) => assert!(trap.is_closed()),
        other => panic!("expected a trap, got {other}"),
    }
}
