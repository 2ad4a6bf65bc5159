//! Lambdaplex Headless Launcher
//!
//! Prepares a Hummingbot checkout for a headless Lambdaplex run and starts it:
//! reconciles `conf/conf_client.yml`, checks the MQTT bridge, then delegates to
//! the Hummingbot entry point.

pub mod client_config;
pub mod error;
pub mod launcher;
pub mod overrides;
pub mod preflight;
pub mod reconciler;
pub mod workflow;

// Re-export main types for convenience
pub use client_config::ClientConfig;
pub use error::{LauncherError, Result};
pub use launcher::{AuthCredentials, HeadlessLauncher, HeadlessRequest};
pub use overrides::{EnvLookup, OverrideFlags, OverrideSet, ProcessEnv};
pub use preflight::{Preflight, PreflightMode, PreflightResult};
pub use reconciler::{reconcile, Reconciled};
pub use workflow::{AuthOptions, RunOptions, Workflow};
