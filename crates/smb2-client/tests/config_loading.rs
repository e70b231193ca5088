// crates/smb2-client/tests/config_loading.rs
use std::time::Duration;

use smb2_client::{Config, ConfigError};

#[test]
fn defaults() {
    let config = Config::default();
    assert_eq!(config.socket_addr_string(), "127.0.0.1:445");
    assert!(config.tcp_nodelay);
    assert_eq!(config.max_frame_len, 16 * 1024 * 1024);
    assert_eq!(config.read_buffer_capacity, 64 * 1024);
    assert_eq!(config.connect_timeout(), Some(Duration::from_secs(10)));
}

#[test]
fn toml_overrides_only_the_given_keys() {
    let config = Config::from_toml_str(
        r#"
        server_addr = "fileserver.local"
        port = 10445
        connect_timeout_ms = 0
        "#,
    )
    .unwrap();

    assert_eq!(config.socket_addr_string(), "fileserver.local:10445");
    assert_eq!(config.connect_timeout(), None);
    assert_eq!(config.max_frame_len, Config::default().max_frame_len);
    assert_eq!(config.process_id, Config::default().process_id);
}

#[test]
fn toml_with_a_wrong_type_is_rejected() {
    let err = Config::from_toml_str("port = \"not a number\"").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
}

// The only test in this binary that touches the environment.
#[test]
fn environment_overrides_and_bad_values() {
    std::env::set_var("SMB2_SERVER_ADDR", "10.0.0.5");
    std::env::set_var("SMB2_PORT", "1445");
    std::env::set_var("SMB2_TCP_NODELAY", "false");
    std::env::set_var("SMB2_PROCESS_ID", "4242");

    let config = Config::from_env().unwrap();
    assert_eq!(config.socket_addr_string(), "10.0.0.5:1445");
    assert!(!config.tcp_nodelay);
    assert_eq!(config.process_id, 4242);
    assert_eq!(config.read_buffer_capacity, Config::default().read_buffer_capacity);

    std::env::set_var("SMB2_PORT", "not-a-port");
    match Config::from_env().unwrap_err() {
        ConfigError::Env { key, value, .. } => {
            assert_eq!(key, "SMB2_PORT");
            assert_eq!(value, "not-a-port");
        }
        other => panic!("unexpected error: {other}"),
    }

    for key in ["SMB2_SERVER_ADDR", "SMB2_PORT", "SMB2_TCP_NODELAY", "SMB2_PROCESS_ID"] {
        std::env::remove_var(key);
    }
}
