use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use api_ingress::{ApiIngress, ApiIngressConfig};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use runtime::{AppConfig, CliOverrides};
use tokio_util::sync::CancellationToken;
use users_info::config::UsersInfoConfig;
use users_info::UsersInfo;

mod shutdown;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const API_INGRESS: &str = "api_ingress";
const USERS_INFO: &str = "users_info";

/// User Management API server
#[derive(Parser)]
#[command(name = "user-management-server")]
#[command(about = "User Management API server - user CRUD behind an API key")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Check configuration
    Check,
}

/// Module sections of the config, validated and with defaults applied.
struct ModuleConfigs {
    ingress: ApiIngressConfig,
    users: UsersInfoConfig,
}

impl ModuleConfigs {
    fn from_app(config: &AppConfig) -> Result<Self> {
        let mut ingress: ApiIngressConfig = config.module_config(API_INGRESS)?;
        if ingress.bind_addr.trim().is_empty() {
            ingress.bind_addr = config.server_addr();
        }
        let users: UsersInfoConfig = config.module_config(USERS_INFO)?;
        Ok(Self { ingress, users })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Defaults -> YAML -> APP__* env; home_dir comes back absolute
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_cli_overrides(&CliOverrides {
        port: cli.port,
        verbose: cli.verbose,
    });

    let logging_config = config.logging.clone().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, Path::new(&config.server.home_dir));
    tracing::info!("User Management Server starting");

    // Print config and exit if requested
    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    // Execute command
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(config),
    }
}

async fn run_server(config: AppConfig) -> Result<()> {
    tracing::info!("Initializing modules...");
    let modules = ModuleConfigs::from_app(&config)?;

    let users = UsersInfo::from_config(&modules.users);
    let ingress = ApiIngress::new(modules.ingress).with_openapi(UsersInfo::openapi());
    let router = ingress
        .build_router(users.register_rest(axum::Router::new()))
        .context("failed to build HTTP router")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = shutdown::wait_for_shutdown().await {
                tracing::error!(error = %e, "signal listener failed; shutting down");
            }
            cancel.cancel();
        });
    }

    ingress.serve(router, cancel).await?;
    tracing::info!("User Management Server stopped");
    Ok(())
}

fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");

    let modules = ModuleConfigs::from_app(&config)?;
    if modules.ingress.api_key.is_empty() {
        println!("Warning: {API_INGRESS}.api_key is empty; every protected request will be rejected");
    }

    tracing::info!("Configuration is valid");
    println!("Configuration check passed");
    println!("Server config:");
    println!("{}", config.to_yaml()?);

    Ok(())
}
