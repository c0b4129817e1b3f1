//! AutoAlarm - tag-driven CloudWatch alarm automation
//!
//! Runs as an AWS Lambda function by default. The `invoke` and `defaults`
//! subcommands replay events and inspect the alarm table locally.

use anyhow::Context;
use autoalarm_actions::{DryRunActions, DryRunFixtures};
use autoalarm_core::config::LoggingConfig;
use autoalarm_core::AutoAlarmConfig;
use autoalarm_handler::{local, EventDispatcher};
use clap::{Parser, Subcommand, ValueEnum};
use lambda_runtime::{service_fn, LambdaEvent};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "autoalarm")]
#[command(version = autoalarm_core::VERSION)]
#[command(about = "Tag-driven CloudWatch alarm automation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log output format (defaults to json under Lambda, pretty otherwise)
    #[arg(long, global = true, env = "AUTOALARM_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve events from the Lambda runtime
    Lambda,

    /// Dispatch a JSON event locally and print the planned alarm operations
    Invoke {
        /// Event payload file
        #[arg(short, long)]
        event: PathBuf,

        /// Dry-run fixtures answering tag and account lookups
        #[arg(long)]
        fixtures: Option<PathBuf>,

        /// TOML configuration file; the environment is used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the default alarm table and metric dimensions
    Defaults {
        /// TOML configuration file; the environment is used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Lambda);

    let format = cli.log_format.unwrap_or(match command {
        Commands::Lambda => LogFormat::Json,
        _ => LogFormat::Pretty,
    });

    match command {
        Commands::Lambda => {
            init_logging(format, &LoggingConfig::from_env());
            run_lambda().await
        }
        Commands::Invoke {
            event,
            fixtures,
            config,
        } => {
            let config = local::load_config(config.as_deref())?;
            init_logging(format, &config.logging);

            let payload: Value = serde_json::from_str(
                &std::fs::read_to_string(&event)
                    .with_context(|| format!("Failed to read event {}", event.display()))?,
            )
            .with_context(|| format!("Failed to parse event {}", event.display()))?;
            let fixtures = match fixtures {
                Some(path) => DryRunFixtures::from_json(
                    &std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read fixtures {}", path.display()))?,
                )?,
                None => DryRunFixtures::default(),
            };

            let report = local::invoke(&config, payload, fixtures).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Defaults { config } => {
            let config = local::load_config(config.as_deref())?;
            init_logging(format, &config.logging);

            let defaults = local::defaults(&config)?;
            println!("{}", serde_json::to_string_pretty(&defaults)?);
            Ok(())
        }
    }
}

/// Log level comes from RUST_LOG when set, the configured level otherwise.
fn init_logging(format: LogFormat, logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter_directive()));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .without_time()
                    .with_target(false),
            )
            .init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).init(),
    }
}

async fn run_lambda() -> anyhow::Result<()> {
    info!("Starting AutoAlarm {}", autoalarm_core::VERSION);
    warn!("Alarm actions run in dry-run mode: operations are logged, not applied");

    let dispatcher = EventDispatcher::new(DryRunActions::default());
    let dispatcher = &dispatcher;

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle(dispatcher, event).await
    }))
    .await
    .map_err(|e| anyhow::anyhow!(e))
}

async fn handle(
    dispatcher: &EventDispatcher<DryRunActions>,
    event: LambdaEvent<Value>,
) -> Result<Value, lambda_runtime::Error> {
    let (payload, context) = event.into_parts();
    let source = payload
        .get("source")
        .and_then(Value::as_str)
        .unwrap_or("-")
        .to_string();
    let span = info_span!("invocation", request_id = %context.request_id, source = %source);

    async move {
        // Configuration is rebuilt for every event.
        let config = AutoAlarmConfig::from_env().map_err(|e| {
            error!("{}", e);
            e
        })?;

        let outcome = dispatcher.handle(&config, payload).await?;
        Ok::<_, lambda_runtime::Error>(serde_json::to_value(outcome)?)
    }
    .instrument(span)
    .await
}
