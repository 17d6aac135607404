//! spec.md §8 scenario 4: a trapping start function fails instantiation and
//! leaves no new instance behind.

use wrt::{Config, Engine, Error, LinkError, ModuleConfig, Store};

#[test]
fn trapping_start_function_fails_instantiation() {
    let wat = r#"
        (module
            (memory (export "mem") 1)
            (func $s unreachable)
            (start $s)
        )
    "#;
    let bytes = wat::parse_str(wat).unwrap();
    let engine = Engine::new(Config::default());
    let handle = engine.compile(&bytes).unwrap();
    let mut store: Store<()> = Store::new(());

    let config = ModuleConfig {
        name: "broken".into(),
        ..ModuleConfig::default()
    };
    let err = engine.instantiate(&mut store, handle, &[], &config).unwrap_err();
    match err {
        Error::Link(LinkError::TrapInStart(trap)) => {
            assert_eq!(trap.trap_code(), Some(wrt_core::TrapCode::Unreachable));
        }
        other => panic!("expected a trap-in-start link error, got {other}"),
    }

    assert!(store.lookup_module("broken").is_none(), "a trapping start must not publish its name");

    // spec.md §8(4): the store must contain no new memories, tables,
    // globals or exports from the failed module either — not just no
    // reachable name. Instantiating a trivial module afterwards should land
    // on the very same instance index a fresh store's first instantiation
    // would, proving the failed attempt's allocations were rolled back.
    let trivial = wat::parse_str("(module)").unwrap();
    let trivial_handle = engine.compile(&trivial).unwrap();
    let next_idx = engine.instantiate(&mut store, trivial_handle, &[], &ModuleConfig::default()).unwrap();

    let mut fresh_store: Store<()> = Store::new(());
    let first_idx = engine
        .instantiate(&mut fresh_store, trivial_handle, &[], &ModuleConfig::default())
        .unwrap();

    assert_eq!(next_idx, first_idx, "failed instantiation must not have left any allocations behind");
}
