//! Lambdaplex Headless Launcher
//!
//! Runs Hummingbot with the Lambdaplex connector without the interactive UI:
//! 1. Reconciles conf/conf_client.yml (MQTT bridge, instance id, rate oracle)
//! 2. Checks the MQTT bridge is reachable
//! 3. Starts bin/quick_start.py in headless mode and propagates its exit status

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, Level};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use lambdaplex_headless::launcher::DEFAULT_PYTHON_BIN;
use lambdaplex_headless::workflow::resolve_root;
use lambdaplex_headless::{
    AuthOptions, HeadlessLauncher, LauncherError, OverrideFlags, PreflightMode, ProcessEnv,
    RunOptions, Workflow,
};

#[derive(Parser)]
#[command(name = "lambdaplex-headless")]
#[command(about = "Configure and run Hummingbot's Lambdaplex connector in headless mode")]
struct Cli {
    /// Hummingbot root directory (default: $HUMMINGBOT_ROOT or the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Python interpreter used to run Hummingbot
    #[arg(long, global = true, default_value = DEFAULT_PYTHON_BIN)]
    python: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile config, preflight the MQTT bridge and start Hummingbot headless
    Run {
        /// Hummingbot config password (default: $PASSWORD)
        #[arg(long)]
        password: Option<String>,

        /// Strategy config under conf/strategies/ (default: $STRATEGY_FILE)
        #[arg(long)]
        strategy_file: Option<String>,

        #[command(flatten)]
        overrides: OverrideArgs,

        /// Delete the strategy's trade database before starting
        #[arg(long)]
        reset_db: bool,

        /// MQTT preflight policy (default: $MQTT_PREFLIGHT or warn)
        #[arg(long, value_enum)]
        preflight: Option<PreflightMode>,
    },

    /// Only reconcile conf/conf_client.yml
    Configure {
        #[command(flatten)]
        overrides: OverrideArgs,

        /// Print the resolved values as YAML
        #[arg(long)]
        print: bool,
    },

    /// Only check that the MQTT bridge is reachable
    Preflight {
        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Store the Hummingbot password and Lambdaplex API credentials
    AuthSetup {
        /// Hummingbot config password (default: $PASSWORD)
        #[arg(long)]
        password: Option<String>,

        /// Lambdaplex API key (default: $API_KEY)
        #[arg(long)]
        api_key: Option<String>,

        /// Lambdaplex private key (default: $PRIVATE_KEY)
        #[arg(long)]
        private_key: Option<String>,
    },
}

#[derive(Args)]
struct OverrideArgs {
    /// MQTT bridge host (default: $HB_MQTT_HOST_OVERRIDE, $MQTT_HOST)
    #[arg(long)]
    mqtt_host: Option<String>,

    /// MQTT bridge port (default: $HB_MQTT_PORT_OVERRIDE, $MQTT_PORT)
    #[arg(long)]
    mqtt_port: Option<String>,

    /// Hummingbot instance id (default: $HB_INSTANCE_ID_OVERRIDE, $HB_INSTANCE_ID)
    #[arg(long)]
    instance_id: Option<String>,

    /// Rate oracle source name (default: $RATE_ORACLE_OVERRIDE)
    #[arg(long)]
    rate_oracle: Option<String>,

    /// Lambdaplex REST URL passed to Hummingbot
    #[arg(long)]
    rest_url: Option<String>,

    /// Lambdaplex websocket URL passed to Hummingbot
    #[arg(long)]
    wss_url: Option<String>,

    /// Lambdaplex API version passed to Hummingbot
    #[arg(long)]
    api_version: Option<String>,
}

impl From<OverrideArgs> for OverrideFlags {
    fn from(args: OverrideArgs) -> Self {
        Self {
            mqtt_host: args.mqtt_host,
            mqtt_port: args.mqtt_port,
            instance_id: args.instance_id,
            rate_oracle: args.rate_oracle,
            rest_url: args.rest_url,
            wss_url: args.wss_url,
            api_version: args.api_version,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Values already set by the shell win over .env
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Ok(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = match e.downcast_ref::<LauncherError>() {
                // The child already reported its own failure
                Some(LauncherError::DelegateFailure { code }) => *code,
                Some(err) => {
                    eprintln!("Error: {}", err);
                    err.exit_code()
                }
                None => {
                    eprintln!("Error: {:#}", e);
                    1
                }
            };
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

/// Warnings and errors go to stderr, everything else to stdout
fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .init();
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    let root = resolve_root(cli.root, &ProcessEnv);
    let launcher = HeadlessLauncher::new(root, cli.python);
    let workflow = Workflow::new(launcher, ProcessEnv);

    match cli.command {
        Command::Run {
            password,
            strategy_file,
            overrides,
            reset_db,
            preflight,
        } => {
            let options = RunOptions {
                password,
                strategy_file,
                overrides: overrides.into(),
                preflight,
                reset_db,
            };
            workflow.run(&options).await?;
        }
        Command::Configure { overrides, print } => {
            let resolved = workflow.configure(&overrides.into())?;
            println!(
                "Wrote {} with mqtt_bridge + instance_id",
                workflow.conf_client_path().display()
            );
            if print {
                print!("{}", serde_yaml::to_string(&resolved)?);
            }
        }
        Command::Preflight { overrides } => {
            let result = workflow.preflight_only(&overrides.into()).await?;
            println!("MQTT bridge reachable at {}", result.target);
        }
        Command::AuthSetup {
            password,
            api_key,
            private_key,
        } => {
            let options = AuthOptions {
                password,
                api_key,
                private_key,
            };
            workflow.auth_setup(&options).await?;
            println!("success");
        }
    }

    Ok(())
}
