//! spec.md §4.3's function-listener contract: `before`/`after` fire around
//! every Wasm-to-Wasm call, exposing the live call stack depth.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use wrt::{Config, Engine, ExternVal, Func, FunctionListener, ModuleConfig, StackFrameInfo, StackIterator, Store, Value};

struct CallCounter {
    before: AtomicUsize,
    after: AtomicUsize,
    max_depth_seen: AtomicUsize,
}

impl FunctionListener for CallCounter {
    fn before(&self, _func: wrt::FuncIdx, _args: &[Value], stack: &mut dyn StackIterator) {
        self.before.fetch_add(1, Ordering::SeqCst);
        let mut depth = 0usize;
        while stack.next_frame().is_some() {
            depth += 1;
        }
        self.max_depth_seen.fetch_max(depth, Ordering::SeqCst);
    }

    fn after(&self, _func: wrt::FuncIdx, _results: &[Value]) {
        self.after.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn listener_observes_nested_calls() {
    let wat = r#"
        (module
            (func $inner (result i32) i32.const 1)
            (func $outer (export "outer") (result i32)
                call $inner
                i32.const 1
                i32.add)
        )
    "#;
    let bytes = wat::parse_str(wat).unwrap();
    let engine = Engine::new(Config::default());
    let handle = engine.compile(&bytes).unwrap();
    let mut store: Store<()> = Store::new(());

    let counter = Arc::new(CallCounter {
        before: AtomicUsize::new(0),
        after: AtomicUsize::new(0),
        max_depth_seen: AtomicUsize::new(0),
    });
    store.register_listener(counter.clone());

    let instance = engine.instantiate(&mut store, handle, &[], &ModuleConfig::default()).unwrap();
    let outer = match store.instance(instance).export("outer").unwrap() {
        ExternVal::Func(f) => Func::from(f),
        _ => unreachable!(),
    };

    let mut out = [Value::I32(0)];
    outer.call(&mut store, &[], &mut out).unwrap();
    assert_eq!(out, [Value::I32(2)]);

    assert_eq!(counter.before.load(Ordering::SeqCst), 2);
    assert_eq!(counter.after.load(Ordering::SeqCst), 2);
    assert_eq!(counter.max_depth_seen.load(Ordering::SeqCst), 1, "inner's before should see outer already on the stack");
}

fn _type_check_stack_frame_info(_: StackFrameInfo) {}
