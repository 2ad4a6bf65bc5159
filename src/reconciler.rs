//! Client config reconciliation
//!
//! Every field resolves independently: explicit override, then the value
//! already persisted in `conf_client.yml`, then the built-in default.

use serde::Serialize;
use serde_yaml::Value;
use std::path::Path;
use tracing::info;

use crate::client_config::ClientConfig;
use crate::error::{LauncherError, Result};
use crate::overrides::{first_non_empty, OverrideSet};
use crate::preflight::host_port;

pub const DEFAULT_MQTT_HOST: &str = "localhost";
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_INSTANCE_ID: &str = "lambdaplex-testbot";
pub const DEFAULT_RATE_ORACLE: &str = "coin_gecko";

const MQTT_HOST: &[&str] = &["mqtt_bridge", "mqtt_host"];
const MQTT_PORT: &[&str] = &["mqtt_bridge", "mqtt_port"];
const MQTT_AUTOSTART: &[&str] = &["mqtt_bridge", "mqtt_autostart"];
const INSTANCE_ID: &[&str] = &["instance_id"];
const RATE_ORACLE: &[&str] = &["rate_oracle_source", "name"];

/// Final values written to the client config
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciled {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub instance_id: String,
    pub rate_oracle: String,
}

impl Reconciled {
    /// `host:port` of the MQTT bridge
    pub fn mqtt_target(&self) -> String {
        host_port(&self.mqtt_host, self.mqtt_port)
    }
}

/// Resolve every field without touching the document
pub fn resolve(config: &ClientConfig, overrides: &OverrideSet) -> Result<Reconciled> {
    let mqtt_port = match &overrides.mqtt_port {
        Some(raw) if !raw.is_empty() => parse_port(raw)?,
        _ => persisted_port(config.get(MQTT_PORT))?,
    };

    Ok(Reconciled {
        mqtt_host: pick(&overrides.mqtt_host, config.get(MQTT_HOST), DEFAULT_MQTT_HOST),
        mqtt_port,
        instance_id: pick(
            &overrides.instance_id,
            config.get(INSTANCE_ID),
            DEFAULT_INSTANCE_ID,
        ),
        rate_oracle: pick(
            &overrides.rate_oracle,
            config.get(RATE_ORACLE),
            DEFAULT_RATE_ORACLE,
        ),
    })
}

/// Resolve and apply to the in-memory document. The bridge is always set to
/// autostart since headless runs are driven through it.
pub fn merge(config: &mut ClientConfig, overrides: &OverrideSet) -> Result<Reconciled> {
    let resolved = resolve(config, overrides)?;

    set_text(config, MQTT_HOST, &overrides.mqtt_host, &resolved.mqtt_host);
    config.set(MQTT_PORT, Value::Number(resolved.mqtt_port.into()));
    config.set(MQTT_AUTOSTART, Value::Bool(true));
    set_text(config, INSTANCE_ID, &overrides.instance_id, &resolved.instance_id);
    set_text(config, RATE_ORACLE, &overrides.rate_oracle, &resolved.rate_oracle);

    Ok(resolved)
}

/// Load `path`, merge `overrides` and persist the result.
///
/// Nothing is written when resolution fails.
pub fn reconcile(path: &Path, overrides: &OverrideSet) -> Result<(ClientConfig, Reconciled)> {
    let mut config = ClientConfig::load(path)?;
    let resolved = merge(&mut config, overrides)?;
    config.save()?;

    info!(
        "Wrote {} with mqtt_bridge {} (autostart), instance_id={}, rate_oracle={}",
        config.path().display(),
        resolved.mqtt_target(),
        resolved.instance_id,
        resolved.rate_oracle
    );

    Ok((config, resolved))
}

fn pick(override_value: &Option<String>, persisted: Option<&Value>, default: &str) -> String {
    first_non_empty([override_value.clone(), persisted.and_then(scalar_text)])
        .unwrap_or_else(|| default.to_string())
}

/// Write a resolved text field. A persisted scalar that was not overridden
/// is left as it is, so `instance_id: 42` stays a number.
fn set_text(
    config: &mut ClientConfig,
    key_path: &[&str],
    override_value: &Option<String>,
    resolved: &str,
) {
    let overridden = override_value.as_deref().is_some_and(|v| !v.is_empty());
    let persisted = config
        .get(key_path)
        .and_then(scalar_text)
        .is_some_and(|v| !v.is_empty());
    if overridden || !persisted {
        config.set(key_path, Value::String(resolved.to_string()));
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn persisted_port(value: Option<&Value>) -> Result<u16> {
    match value {
        None | Some(Value::Null) => Ok(DEFAULT_MQTT_PORT),
        Some(Value::String(s)) if s.is_empty() => Ok(DEFAULT_MQTT_PORT),
        Some(Value::String(s)) => parse_port(s),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .filter(|p| *p != 0)
            .ok_or_else(|| LauncherError::InvalidPort {
                value: n.to_string(),
            }),
        Some(other) => Err(LauncherError::InvalidPort {
            value: serde_yaml::to_string(other)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
        }),
    }
}

/// Parse a port from text, accepting surrounding whitespace
pub fn parse_port(raw: &str) -> Result<u16> {
    raw.trim()
        .parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| LauncherError::InvalidPort {
            value: raw.to_string(),
        })
}
