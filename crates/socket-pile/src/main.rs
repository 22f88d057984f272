use clap::Parser;
use socket_pile::cli::{Cli, LogFormat};
use socket_pile::orchestrator;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).init(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    info!(
        transport = %config.transport,
        address = %config.address,
        workers = config.workers,
        "Starting socket pile"
    );

    if let Err(e) = orchestrator::run(&config, tokio::io::stdin()).await {
        error!(error = %e, "Fatal");
        std::process::exit(1);
    }
}
