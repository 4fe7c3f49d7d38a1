use fleet_dispatch::config::ConfigLoader;
use fleet_dispatch::error::FleetError;
use std::io::Write;

#[test]
fn explicit_file_overrides_defaults_and_env_overrides_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[control_plane]
endpoint = "http://c2.internal:9000"

[polling]
interval_secs = 5

[decode]
excluded_addresses = ["172.17.0.1", "10.255.0.1"]
"#
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(file.path()).unwrap();
    assert_eq!(config.control_plane.endpoint, "http://c2.internal:9000");
    assert_eq!(config.polling.interval_secs, 5);
    assert_eq!(config.polling.max_cycles, 100);
    assert_eq!(config.decode.excluded_addresses.len(), 2);
    assert_eq!(config.decode.loopback_interfaces, vec!["lo"]);

    std::env::set_var("FLEET__POLLING__MAX_CYCLES", "7");
    let result = ConfigLoader::load_from_file(file.path());
    std::env::remove_var("FLEET__POLLING__MAX_CYCLES");
    let config = result.unwrap();
    assert_eq!(config.polling.max_cycles, 7);
    assert_eq!(config.polling.interval_secs, 5);
}

#[test]
fn invalid_values_are_rejected() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[dispatch]\nconcurrency = 0").unwrap();

    let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, FleetError::ConfigError(ref msg) if msg.contains("dispatch.concurrency")));
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ConfigLoader::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, FleetError::ConfigError(_)));
}
