//! spec.md §8 scenario 6: an `env` entry with a key containing `'='` is
//! rejected before any instance is created.

use wrt::{Config, Engine, Error, LinkError, ModuleConfig, Store};

#[test]
fn environment_variable_with_equals_sign_is_rejected() {
    let wat = r#"(module (func (export "noop")))"#;
    let bytes = wat::parse_str(wat).unwrap();
    let engine = Engine::new(Config::default());
    let handle = engine.compile(&bytes).unwrap();
    let mut store: Store<()> = Store::new(());

    let config = ModuleConfig {
        env: vec![("BAD=KEY".to_string(), "value".to_string())],
        ..ModuleConfig::default()
    };

    let err = engine.instantiate(&mut store, handle, &[], &config).unwrap_err();
    match err {
        Error::Link(LinkError::InvalidModuleConfig(_)) => {}
        other => panic!("expected an invalid-config link error, got {other}"),
    }
}
