use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use duet::prelude::*;
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Anonymous random-pairing server for video, voice, and text chat.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Interface to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port for the WebSocket channel and /api/health
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Deployment environment; selects the allowed browser origins
    #[arg(long = "env", env = "APP_ENV", default_value = "development")]
    environment: Environment,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            environment: self.environment,
            ..ServerConfig::default()
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the default
/// `info` filter.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().flatten_event(true).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let config = args.server_config();
    tracing::info!(
        bind = %config.bind_addr(),
        environment = %config.environment,
        "starting duet server"
    );

    let server = DuetServerBuilder::from_config(&config)
        .build()
        .await
        .context("failed to start server")?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("duet server stopped");
    Ok(())
}
