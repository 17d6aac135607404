//! spec.md §8 scenario 1: host→guest→host round trip through the
//! host-function bridge.

use wrt::{Caller, Config, Engine, Error, ExternVal, Func, ModuleConfig, Store, Value};

#[test]
fn roundtrip_calls_back_into_the_host() {
    let wat = r#"
        (module
            (import "env" "echo" (func $echo (param i32) (result i32)))
            (func (export "roundtrip") (param i32) (result i32)
                local.get 0
                call $echo)
        )
    "#;
    let bytes = wat::parse_str(wat).unwrap();
    let engine = Engine::new(Config::default());
    let handle = engine.compile(&bytes).unwrap();
    let mut store: Store<()> = Store::new(());

    let echo = Func::wrap(&mut store, |_caller: Caller<'_, ()>, x: i32| -> Result<i32, Error> { Ok(x) });

    let instance = engine
        .instantiate(&mut store, handle, &[ExternVal::from(echo)], &ModuleConfig::default())
        .unwrap();

    let roundtrip = match store.instance(instance).export("roundtrip").unwrap() {
        ExternVal::Func(f) => Func::from(f),
        _ => unreachable!(),
    };

    let mut results = [Value::I32(0)];
    roundtrip.call(&mut store, &[Value::I32(42)], &mut results).unwrap();
    assert_eq!(results, [Value::I32(42)]);
}
