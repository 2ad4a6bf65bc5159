//! Override collection from CLI flags and environment variables

use std::collections::HashMap;

/// Environment variable names read by the launcher
pub mod keys {
    // Credentials and strategy
    pub const PASSWORD: &str = "PASSWORD";
    pub const API_KEY: &str = "API_KEY";
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
    pub const STRATEGY_FILE: &str = "STRATEGY_FILE";

    // MQTT bridge
    pub const MQTT_HOST: &str = "MQTT_HOST";
    pub const MQTT_HOST_OVERRIDE: &str = "HB_MQTT_HOST_OVERRIDE";
    pub const MQTT_PORT: &str = "MQTT_PORT";
    pub const MQTT_PORT_OVERRIDE: &str = "HB_MQTT_PORT_OVERRIDE";
    pub const MQTT_PREFLIGHT: &str = "MQTT_PREFLIGHT";

    // Client config
    pub const INSTANCE_ID: &str = "HB_INSTANCE_ID";
    pub const INSTANCE_ID_OVERRIDE: &str = "HB_INSTANCE_ID_OVERRIDE";
    pub const RATE_ORACLE_OVERRIDE: &str = "RATE_ORACLE_OVERRIDE";

    // Lambdaplex endpoints
    pub const REST_URL: &str = "LAMBDAPLEX_REST_URL";
    pub const WSS_URL: &str = "LAMBDAPLEX_WSS_URL";
    pub const API_VERSION: &str = "LAMBDAPLEX_API_VERSION";

    // Launcher
    pub const HUMMINGBOT_ROOT: &str = "HUMMINGBOT_ROOT";
    pub const PYTHONPATH: &str = "PYTHONPATH";
}

/// Read access to environment variables
pub trait EnvLookup {
    fn var(&self, key: &str) -> Option<String>;

    /// Value of `key`, treating an empty string as unset
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key).filter(|v| !v.is_empty())
    }
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// First candidate that is present and non-empty
pub fn first_non_empty<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|v| !v.is_empty())
}

/// Override values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct OverrideFlags {
    pub mqtt_host: Option<String>,
    pub mqtt_port: Option<String>,
    pub instance_id: Option<String>,
    pub rate_oracle: Option<String>,
    pub rest_url: Option<String>,
    pub wss_url: Option<String>,
    pub api_version: Option<String>,
}

/// Process-scoped overrides after merging flags with the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideSet {
    pub mqtt_host: Option<String>,
    /// Raw port text; coerced during reconciliation
    pub mqtt_port: Option<String>,
    pub instance_id: Option<String>,
    pub rate_oracle: Option<String>,
    /// Endpoint values given as flags. These are set on the child process only,
    /// the environment copies are inherited untouched.
    pub rest_url: Option<String>,
    pub wss_url: Option<String>,
    pub api_version: Option<String>,
}

impl OverrideSet {
    /// Merge flags over environment: flag > `*_OVERRIDE` var > plain var
    pub fn resolve(flags: &OverrideFlags, env: &impl EnvLookup) -> Self {
        Self {
            mqtt_host: first_non_empty([
                flags.mqtt_host.clone(),
                env.var(keys::MQTT_HOST_OVERRIDE),
                env.var(keys::MQTT_HOST),
            ]),
            mqtt_port: first_non_empty([
                flags.mqtt_port.clone(),
                env.var(keys::MQTT_PORT_OVERRIDE),
                env.var(keys::MQTT_PORT),
            ]),
            instance_id: first_non_empty([
                flags.instance_id.clone(),
                env.var(keys::INSTANCE_ID_OVERRIDE),
                env.var(keys::INSTANCE_ID),
            ]),
            rate_oracle: first_non_empty([
                flags.rate_oracle.clone(),
                env.var(keys::RATE_ORACLE_OVERRIDE),
            ]),
            rest_url: first_non_empty([flags.rest_url.clone()]),
            wss_url: first_non_empty([flags.wss_url.clone()]),
            api_version: first_non_empty([flags.api_version.clone()]),
        }
    }

    /// Environment entries to set explicitly on the headless child
    pub fn endpoint_env(&self) -> Vec<(&'static str, String)> {
        [
            (keys::REST_URL, &self.rest_url),
            (keys::WSS_URL, &self.wss_url),
            (keys::API_VERSION, &self.api_version),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|v| (key, v)))
        .collect()
    }
}
