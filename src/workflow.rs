//! Headless run orchestration
//!
//! Strictly sequential: validate inputs, reconcile `conf_client.yml`,
//! preflight the MQTT bridge, optionally reset the trade database, then hand
//! over to Hummingbot.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::client_config::{ClientConfig, CONF_CLIENT_PATH};
use crate::error::{LauncherError, Result};
use crate::launcher::{AuthCredentials, HeadlessLauncher, HeadlessRequest};
use crate::overrides::{first_non_empty, keys, EnvLookup, OverrideFlags, OverrideSet};
use crate::preflight::{Preflight, PreflightMode, PreflightResult};
use crate::reconciler::{self, Reconciled};

pub const DEFAULT_REST_URL: &str = "https://api.lambdaplex.io/api/";
pub const DEFAULT_WSS_URL: &str = "wss://api.lambdaplex.io/api/{}/ws";
pub const DEFAULT_API_VERSION: &str = "v1";

/// Inputs of a full headless run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub password: Option<String>,
    pub strategy_file: Option<String>,
    pub overrides: OverrideFlags,
    pub preflight: Option<PreflightMode>,
    pub reset_db: bool,
}

/// Inputs of the Lambdaplex auth setup
#[derive(Debug, Clone, Default)]
pub struct AuthOptions {
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub private_key: Option<String>,
}

/// Hummingbot root: flag, then `HUMMINGBOT_ROOT`, then the current directory.
/// Always absolute.
pub fn resolve_root(flag: Option<PathBuf>, env: &impl EnvLookup) -> PathBuf {
    let root = flag
        .filter(|p| !p.as_os_str().is_empty())
        .or_else(|| env.non_empty(keys::HUMMINGBOT_ROOT).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let root = expand_home(&root);
    std::path::absolute(&root).unwrap_or(root)
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

/// Drives one launcher invocation against a Hummingbot root
pub struct Workflow<E: EnvLookup> {
    launcher: HeadlessLauncher,
    preflight: Preflight,
    env: E,
}

impl<E: EnvLookup> Workflow<E> {
    pub fn new(launcher: HeadlessLauncher, env: E) -> Self {
        Self {
            launcher: launcher.with_inherited_python_path(env.non_empty(keys::PYTHONPATH)),
            preflight: Preflight::new(),
            env,
        }
    }

    pub fn with_preflight(mut self, preflight: Preflight) -> Self {
        self.preflight = preflight;
        self
    }

    pub fn conf_client_path(&self) -> PathBuf {
        self.launcher.root().join(CONF_CLIENT_PATH)
    }

    /// Reconcile and persist `conf_client.yml` only
    pub fn configure(&self, flags: &OverrideFlags) -> Result<Reconciled> {
        let overrides = OverrideSet::resolve(flags, &self.env);
        let (_, resolved) = reconciler::reconcile(&self.conf_client_path(), &overrides)?;
        Ok(resolved)
    }

    /// Probe the MQTT bridge the next run would use, without writing anything
    pub async fn preflight_only(&self, flags: &OverrideFlags) -> Result<PreflightResult> {
        let overrides = OverrideSet::resolve(flags, &self.env);
        let config = ClientConfig::load(self.conf_client_path())?;
        let resolved = reconciler::resolve(&config, &overrides)?;

        let result = self
            .preflight
            .check(PreflightMode::Fail, &resolved.mqtt_host, resolved.mqtt_port)
            .await?;
        // Fail mode never skips, so a result is always present
        result.ok_or_else(|| LauncherError::PreflightFailure {
            target: resolved.mqtt_target(),
            detail: "probe did not run".to_string(),
        })
    }

    /// Full headless run. Returns once Hummingbot has exited successfully.
    pub async fn run(&self, options: &RunOptions) -> Result<()> {
        let request = self.headless_request(options)?;
        self.launcher.verify(&request)?;

        let overrides = OverrideSet::resolve(&options.overrides, &self.env);
        let (_, resolved) = reconciler::reconcile(&self.conf_client_path(), &overrides)?;

        let mode = self.preflight_mode(options.preflight)?;
        self.preflight
            .check(mode, &resolved.mqtt_host, resolved.mqtt_port)
            .await?;

        if options.reset_db {
            self.launcher.reset_db(&request.strategy_file)?;
        }

        self.log_endpoints(&overrides);
        self.launcher
            .run_headless(&request, &overrides.endpoint_env())
            .await
    }

    /// Store the Hummingbot password and Lambdaplex credentials
    pub async fn auth_setup(&self, options: &AuthOptions) -> Result<()> {
        let credentials = AuthCredentials {
            password: self.required(&options.password, keys::PASSWORD, "--password")?,
            api_key: self.required(&options.api_key, keys::API_KEY, "--api-key")?,
            private_key: self.required(&options.private_key, keys::PRIVATE_KEY, "--private-key")?,
        };
        self.launcher.run_auth_setup(&credentials).await?;
        info!("Lambdaplex auth setup complete");
        Ok(())
    }

    fn headless_request(&self, options: &RunOptions) -> Result<HeadlessRequest> {
        Ok(HeadlessRequest {
            password: self.required(&options.password, keys::PASSWORD, "--password")?,
            strategy_file: self.required(
                &options.strategy_file,
                keys::STRATEGY_FILE,
                "--strategy-file",
            )?,
        })
    }

    fn preflight_mode(&self, flag: Option<PreflightMode>) -> Result<PreflightMode> {
        match flag {
            Some(mode) => Ok(mode),
            None => match self.env.non_empty(keys::MQTT_PREFLIGHT) {
                Some(raw) => raw.parse(),
                None => Ok(PreflightMode::default()),
            },
        }
    }

    /// Flag value, else the environment variable, else a usage error
    fn required(&self, flag: &Option<String>, env_key: &str, flag_name: &str) -> Result<String> {
        first_non_empty([flag.clone(), self.env.var(env_key)]).ok_or_else(|| {
            LauncherError::usage(format!("{} is required (or set {})", flag_name, env_key))
        })
    }

    fn log_endpoints(&self, overrides: &OverrideSet) {
        let effective = |flag: &Option<String>, key: &str, default: &str| {
            first_non_empty([flag.clone(), self.env.var(key)])
                .unwrap_or_else(|| default.to_string())
        };
        info!(
            "Lambdaplex endpoints: rest={} wss={} api_version={}",
            effective(&overrides.rest_url, keys::REST_URL, DEFAULT_REST_URL),
            effective(&overrides.wss_url, keys::WSS_URL, DEFAULT_WSS_URL),
            effective(&overrides.api_version, keys::API_VERSION, DEFAULT_API_VERSION),
        );
    }
}
