use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cmdroute::providers::builtin::EchoHandler;
use cmdroute::{Provider, RouterConfig, RouterService, RoutingContext};

#[derive(Parser)]
#[command(name = "cmdroute", about = "Route commands between economy and premium providers")]
struct Cli {
    /// Routing policy (economy_only, economy_first, intelligent, fallback).
    #[arg(long, global = true)]
    policy: Option<String>,

    /// Path to router config TOML. Defaults to CMDROUTE_* environment variables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the routing decision for an input without executing it.
    Route {
        input: String,

        /// Caller context as a JSON object.
        #[arg(long)]
        context_json: Option<String>,
    },

    /// Route and execute an input with the built-in echo handlers.
    Dispatch {
        input: String,

        /// Skip routing and run on this provider.
        #[arg(long)]
        force: Option<Provider>,
    },

    /// Dispatch every line of a file ("-" for stdin), then print statistics.
    Replay {
        #[arg(default_value = "-")]
        file: String,
    },

    /// Show the active policy and capability table size.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cmdroute=info")))
        .with(
            cli.json
                .then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
        )
        .with((!cli.json).then(|| {
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
        }))
        .init();

    let mut config = match &cli.config {
        Some(path) => RouterConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => RouterConfig::from_env()?,
    };
    if let Some(policy) = &cli.policy {
        config.policy = policy.parse()?;
    }

    let service = RouterService::new(config)?;
    for provider in [Provider::Economy, Provider::Premium] {
        service.register_default_handler(provider, Arc::new(EchoHandler::new(provider)));
    }

    match cli.command {
        Commands::Route {
            input,
            context_json,
        } => {
            let context = context_json
                .map(|raw| serde_json::from_str(&raw).map(RoutingContext::new))
                .transpose()
                .context("--context-json must be a JSON object")?;
            let decision = service.route(&input, context.as_ref());
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Commands::Dispatch { input, force } => {
            let result = service.dispatch(&input, &[], force).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Replay { file } => {
            let content = if file == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&file).with_context(|| format!("reading {file}"))?
            };
            for line in content.lines().map(str::trim) {
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let result = service.dispatch(line, &[], None).await;
                println!("{}", serde_json::to_string(&result)?);
            }
            println!("{}", serde_json::to_string_pretty(&service.stats())?);
        }
        Commands::Status => {
            println!("{}", serde_json::to_string_pretty(&service.status())?);
        }
    }

    Ok(())
}
