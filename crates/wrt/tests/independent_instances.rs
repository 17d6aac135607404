//! spec.md §8 round-trip law: instantiating the same compiled module twice
//! yields independent instances sharing no memory or global state.

use wrt::{Config, Engine, ExternVal, Func, ModuleConfig, Store, Value};

#[test]
fn two_instances_of_the_same_module_do_not_share_state() {
    let wat = r#"
        (module
            (memory (export "mem") 1)
            (global $g (mut i32) (i32.const 0))
            (func (export "bump") (result i32)
                global.get $g
                i32.const 1
                i32.add
                global.set $g
                global.get $g)
        )
    "#;
    let bytes = wat::parse_str(wat).unwrap();
    let engine = Engine::new(Config::default());
    let handle = engine.compile(&bytes).unwrap();
    let mut store: Store<()> = Store::new(());

    let a = engine
        .instantiate(
            &mut store,
            handle,
            &[],
            &ModuleConfig {
                name: "a".into(),
                ..ModuleConfig::default()
            },
        )
        .unwrap();
    let b = engine
        .instantiate(
            &mut store,
            handle,
            &[],
            &ModuleConfig {
                name: "b".into(),
                ..ModuleConfig::default()
            },
        )
        .unwrap();

    let bump_of = |instance, store: &Store<()>| match store.instance(instance).export("bump").unwrap() {
        ExternVal::Func(f) => Func::from(f),
        _ => unreachable!(),
    };
    let bump_a = bump_of(a, &store);
    let bump_b = bump_of(b, &store);

    let mut out = [Value::I32(0)];
    bump_a.call(&mut store, &[], &mut out).unwrap();
    bump_a.call(&mut store, &[], &mut out).unwrap();
    assert_eq!(out, [Value::I32(2)]);

    bump_b.call(&mut store, &[], &mut out).unwrap();
    assert_eq!(out, [Value::I32(1)], "instance b's global must not see instance a's bumps");

    assert_eq!(store.lookup_module("a"), Some(a));
    assert_eq!(store.lookup_module("b"), Some(b));
}
