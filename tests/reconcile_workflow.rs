//! Reconciliation of conf/conf_client.yml against overrides and defaults

use lambdaplex_headless::reconciler::{reconcile, Reconciled};
use lambdaplex_headless::{ClientConfig, LauncherError, OverrideFlags, OverrideSet};
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

fn conf_path(dir: &TempDir) -> PathBuf {
    dir.path().join("conf").join("conf_client.yml")
}

fn write_conf(dir: &TempDir, yaml: &str) -> PathBuf {
    let path = conf_path(dir);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, yaml).unwrap();
    path
}

fn load_yaml(path: &PathBuf) -> Value {
    serde_yaml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn overrides_from_env(pairs: &[(&str, &str)]) -> OverrideSet {
    let env: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    OverrideSet::resolve(&OverrideFlags::default(), &env)
}

/// Test: Absent file plus a port override produces the full default document
#[test]
fn test_fresh_install_with_port_override() {
    let dir = tempdir().unwrap();
    let path = conf_path(&dir);
    let overrides = overrides_from_env(&[("MQTT_PORT", "1884")]);

    let (_, resolved) = reconcile(&path, &overrides).unwrap();
    assert_eq!(
        resolved,
        Reconciled {
            mqtt_host: "localhost".to_string(),
            mqtt_port: 1884,
            instance_id: "lambdaplex-testbot".to_string(),
            rate_oracle: "coin_gecko".to_string(),
        }
    );

    let expected: Value = serde_yaml::from_str(
        "mqtt_bridge:\n  mqtt_host: localhost\n  mqtt_port: 1884\n  mqtt_autostart: true\ninstance_id: lambdaplex-testbot\nrate_oracle_source:\n  name: coin_gecko\n",
    )
    .unwrap();
    assert_eq!(load_yaml(&path), expected);
}

/// Test: Second run without overrides resolves the same values and bytes
#[test]
fn test_idempotent_without_overrides() {
    let dir = tempdir().unwrap();
    let path = write_conf(
        &dir,
        "instance_id: desk-7\nmqtt_bridge:\n  mqtt_host: broker.local\n  mqtt_port: '1885'\n",
    );

    let (_, first) = reconcile(&path, &OverrideSet::default()).unwrap();
    let first_bytes = std::fs::read(&path).unwrap();
    let (_, second) = reconcile(&path, &OverrideSet::default()).unwrap();
    let second_bytes = std::fs::read(&path).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.mqtt_port, 1885);
    assert_eq!(first_bytes, second_bytes);
}

/// Test: Override > persisted > default, independently per field
#[test]
fn test_precedence_per_field() {
    let dir = tempdir().unwrap();
    let path = write_conf(
        &dir,
        "mqtt_bridge:\n  mqtt_host: persisted-host\n  mqtt_port: 2000\ninstance_id: persisted-id\n",
    );
    let overrides = overrides_from_env(&[
        ("HB_MQTT_PORT_OVERRIDE", "2001"),
        ("RATE_ORACLE_OVERRIDE", "binance"),
    ]);

    let (_, resolved) = reconcile(&path, &overrides).unwrap();
    assert_eq!(resolved.mqtt_host, "persisted-host");
    assert_eq!(resolved.mqtt_port, 2001);
    assert_eq!(resolved.instance_id, "persisted-id");
    assert_eq!(resolved.rate_oracle, "binance");

    // Overrides are not sticky beyond what was persisted
    let (_, again) = reconcile(&path, &OverrideSet::default()).unwrap();
    assert_eq!(again.mqtt_port, 2001);
    assert_eq!(again.rate_oracle, "binance");
}

/// Test: Non-numeric port aborts before anything is written
#[test]
fn test_invalid_port_writes_nothing() {
    let dir = tempdir().unwrap();
    let original = "mqtt_bridge:\n  mqtt_host: broker\n  mqtt_port: 1883\n";
    let path = write_conf(&dir, original);

    let err = reconcile(&path, &overrides_from_env(&[("MQTT_PORT", "abc")])).unwrap_err();
    assert!(matches!(err, LauncherError::InvalidPort { ref value } if value == "abc"));
    assert_eq!(err.exit_code(), 2);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), original);

    let missing = tempdir().unwrap();
    let missing_path = conf_path(&missing);
    assert!(reconcile(&missing_path, &overrides_from_env(&[("MQTT_PORT", "abc")])).is_err());
    assert!(!missing_path.exists());
}

/// Test: Autostart is forced on even when persisted as false
#[test]
fn test_autostart_forced() {
    let dir = tempdir().unwrap();
    let path = write_conf(&dir, "mqtt_bridge:\n  mqtt_autostart: false\n");

    reconcile(&path, &OverrideSet::default()).unwrap();
    let config = ClientConfig::load(&path).unwrap();
    assert_eq!(
        config.get(&["mqtt_bridge", "mqtt_autostart"]),
        Some(&Value::Bool(true))
    );
}

/// Test: Keys unrelated to the launcher survive untouched
#[test]
fn test_unknown_keys_preserved() {
    let dir = tempdir().unwrap();
    let path = write_conf(
        &dir,
        "kill_switch_mode: {}\nmqtt_bridge:\n  mqtt_username: admin\n  mqtt_port: 1883\nrate_oracle_source:\n  name: kucoin\n  extra: keep\nlog_level: INFO\n",
    );

    reconcile(&path, &overrides_from_env(&[("HB_INSTANCE_ID", "bot-a")])).unwrap();
    let config = ClientConfig::load(&path).unwrap();

    assert_eq!(
        config.get(&["kill_switch_mode"]),
        Some(&Value::Mapping(Default::default()))
    );
    assert_eq!(
        config.get(&["log_level"]).and_then(Value::as_str),
        Some("INFO")
    );
    assert_eq!(
        config.get(&["mqtt_bridge", "mqtt_username"]).and_then(Value::as_str),
        Some("admin")
    );
    assert_eq!(
        config.get(&["rate_oracle_source", "extra"]).and_then(Value::as_str),
        Some("keep")
    );
    assert_eq!(
        config.get(&["rate_oracle_source", "name"]).and_then(Value::as_str),
        Some("kucoin")
    );
    assert_eq!(
        config.get(&["instance_id"]).and_then(Value::as_str),
        Some("bot-a")
    );

    let keys: Vec<&str> = config
        .document()
        .keys()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(
        keys,
        vec![
            "kill_switch_mode",
            "mqtt_bridge",
            "rate_oracle_source",
            "log_level",
            "instance_id",
        ]
    );
}

/// Test: A top-level list is treated as an empty document
#[test]
fn test_non_mapping_document_replaced() {
    let dir = tempdir().unwrap();
    let path = write_conf(&dir, "- not\n- a mapping\n");

    let (_, resolved) = reconcile(&path, &OverrideSet::default()).unwrap();
    assert_eq!(resolved.mqtt_host, "localhost");
    assert!(load_yaml(&path).is_mapping());
}
