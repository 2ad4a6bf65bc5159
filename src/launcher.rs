//! Hummingbot process delegation
//!
//! Starts the headless Hummingbot entry point (or the Lambdaplex auth setup
//! script) as a child process and propagates its exit status. Nothing about
//! the child's output is interpreted.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{LauncherError, Result};
use crate::overrides::keys;

/// Default interpreter used to run Hummingbot entry points
pub const DEFAULT_PYTHON_BIN: &str = "python";

/// Headless entry point relative to the Hummingbot root
pub const QUICK_START_SCRIPT: &str = "bin/quick_start.py";

/// Lambdaplex credential setup script relative to the Hummingbot root
pub const AUTH_SETUP_SCRIPT: &str = "scripts/plex/auth_setup_lambdaplex.py";

/// Strategy configs directory relative to the Hummingbot root
pub const STRATEGIES_DIR: &str = "conf/strategies";

/// Trade database directory relative to the Hummingbot root
pub const DATA_DIR: &str = "data";

/// Parameters of a headless run
#[derive(Clone)]
pub struct HeadlessRequest {
    pub password: String,
    pub strategy_file: String,
}

impl fmt::Debug for HeadlessRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessRequest")
            .field("password", &"<redacted>")
            .field("strategy_file", &self.strategy_file)
            .finish()
    }
}

/// Credentials handed to the Lambdaplex auth setup script
#[derive(Clone)]
pub struct AuthCredentials {
    pub password: String,
    pub api_key: String,
    pub private_key: String,
}

impl fmt::Debug for AuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthCredentials { .. }")
    }
}

/// Runs Hummingbot entry points from a given root directory
#[derive(Debug, Clone)]
pub struct HeadlessLauncher {
    /// Hummingbot checkout, used as the child's working directory
    root: PathBuf,
    /// Interpreter executable
    python_bin: PathBuf,
    /// Headless entry script, relative to root
    entry_script: PathBuf,
    /// Caller's PYTHONPATH, appended after the root
    inherited_python_path: Option<String>,
}

impl HeadlessLauncher {
    /// A relative `root` is anchored to the current directory, since the
    /// child runs inside it and reads the root back from PYTHONPATH.
    pub fn new(root: impl Into<PathBuf>, python_bin: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            root: std::path::absolute(&root).unwrap_or(root),
            python_bin: python_bin.into(),
            entry_script: PathBuf::from(QUICK_START_SCRIPT),
            inherited_python_path: None,
        }
    }

    pub fn with_inherited_python_path(mut self, python_path: Option<String>) -> Self {
        self.inherited_python_path = python_path.filter(|p| !p.is_empty());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_script_path(&self) -> PathBuf {
        self.root.join(&self.entry_script)
    }

    pub fn auth_setup_path(&self) -> PathBuf {
        self.root.join(AUTH_SETUP_SCRIPT)
    }

    pub fn strategy_path(&self, strategy_file: &str) -> PathBuf {
        self.root.join(STRATEGIES_DIR).join(strategy_file)
    }

    /// Trade database Hummingbot keeps for a strategy config
    pub fn db_path(&self, strategy_file: &str) -> PathBuf {
        let stem = Path::new(strategy_file)
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_else(|| OsString::from(strategy_file));
        let mut name = stem;
        name.push(".sqlite");
        self.root.join(DATA_DIR).join(name)
    }

    /// Check that the strategy config and entry script both exist
    pub fn verify(&self, request: &HeadlessRequest) -> Result<()> {
        let strategy = self.strategy_path(&request.strategy_file);
        if !strategy.is_file() {
            return Err(LauncherError::not_found("Strategy file", strategy));
        }
        let entry = self.entry_script_path();
        if !entry.is_file() {
            return Err(LauncherError::not_found("Headless entry script", entry));
        }
        Ok(())
    }

    /// Remove the strategy's trade database. Returns whether a file was removed.
    pub fn reset_db(&self, strategy_file: &str) -> Result<bool> {
        let path = self.db_path(strategy_file);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed trade database {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No trade database at {}", path.display());
                Ok(false)
            }
            Err(source) => Err(LauncherError::ConfigWrite { path, source }),
        }
    }

    /// Argument list for the headless entry point
    pub fn headless_args(&self, request: &HeadlessRequest) -> Vec<OsString> {
        vec![
            self.entry_script.clone().into_os_string(),
            OsString::from("--config-password"),
            OsString::from(&request.password),
            OsString::from("--config-file-name"),
            OsString::from(&request.strategy_file),
            OsString::from("--headless"),
        ]
    }

    /// Run Hummingbot headless and wait for it to exit.
    ///
    /// `extra_env` is applied on top of the inherited environment; variables
    /// not listed keep whatever value the caller's shell gave them.
    pub async fn run_headless(
        &self,
        request: &HeadlessRequest,
        extra_env: &[(&'static str, String)],
    ) -> Result<()> {
        let mut cmd = self.command(self.headless_args(request));
        for (key, value) in extra_env {
            debug!("Passing {}={} to headless process", key, value);
            cmd.env(key, value);
        }

        info!(
            "Starting headless Hummingbot: {} {} --config-file-name {} --headless",
            self.python_bin.display(),
            self.entry_script.display(),
            request.strategy_file
        );

        let status = self.wait(cmd).await?;
        check_status(status)
    }

    /// Store the Hummingbot password and Lambdaplex API credentials
    pub async fn run_auth_setup(&self, credentials: &AuthCredentials) -> Result<()> {
        let script = self.auth_setup_path();
        if !script.is_file() {
            return Err(LauncherError::not_found("Auth setup script", script));
        }

        let mut cmd = self.command(vec![PathBuf::from(AUTH_SETUP_SCRIPT).into_os_string()]);
        cmd.env(keys::PASSWORD, &credentials.password)
            .env(keys::API_KEY, &credentials.api_key)
            .env(keys::PRIVATE_KEY, &credentials.private_key);

        info!("Running Lambdaplex auth setup");
        let status = self.wait(cmd).await?;
        check_status(status)
    }

    fn command(&self, args: Vec<OsString>) -> Command {
        let mut cmd = Command::new(&self.python_bin);
        cmd.args(args)
            .current_dir(&self.root)
            .env(keys::PYTHONPATH, self.python_path());
        cmd
    }

    /// Root directory first, then any inherited PYTHONPATH entries
    fn python_path(&self) -> OsString {
        let mut entries = vec![self.root.clone()];
        if let Some(existing) = &self.inherited_python_path {
            entries.extend(std::env::split_paths(existing));
        }
        std::env::join_paths(entries).unwrap_or_else(|e| {
            warn!("Could not extend PYTHONPATH ({}), using root only", e);
            self.root.clone().into_os_string()
        })
    }

    async fn wait(&self, mut cmd: Command) -> Result<ExitStatus> {
        cmd.status().await.map_err(|source| LauncherError::Spawn {
            program: self.python_bin.display().to_string(),
            source,
        })
    }
}

/// Map a child's exit status onto the launcher's own status
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

fn check_status(status: ExitStatus) -> Result<()> {
    match exit_code(status) {
        0 => Ok(()),
        code => {
            warn!("Child process exited with status {}", code);
            Err(LauncherError::DelegateFailure { code })
        }
    }
}
