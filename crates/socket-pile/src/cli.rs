use clap::{Parser, ValueEnum};
use pile_common::{parse_duration, Config, ConfigError, Transport};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Listen on a socket and pile up client connections to it.
///
/// Useful for pushing a host towards its open-file and socket limits, or for
/// giving socket-introspection benchmarks a known number of live sockets.
#[derive(Parser, Debug, Clone)]
#[command(name = "socket-pile", version)]
pub struct Cli {
    /// Network (tcp, tcp4, tcp6, udp, udp4, udp6, unix) [default: tcp]
    #[arg(short = 't', long)]
    pub transport: Option<Transport>,

    /// Address to listen on and connect to [default: :12345]
    #[arg(short = 'a', long)]
    pub address: Option<String>,

    /// Amount of workers [default: 1024]
    #[arg(short = 'n', long)]
    pub workers: Option<usize>,

    /// How long to hold the pile open, e.g. 1m, 30s, 1m30s [default: 1m]
    #[arg(short = 'd', long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Listen backlog for stream transports [default: 1024]
    #[arg(long)]
    pub backlog: Option<u32>,

    /// Do not bind a listener; pile onto something already listening
    #[arg(long)]
    pub no_listen: bool,

    /// Wait for a byte (or EOF) on stdin before binding
    #[arg(long)]
    pub wait_stdin: bool,

    /// YAML file with the base configuration; flags override it
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::from_yaml_file(path)?,
            None => Config::default(),
        };

        if let Some(transport) = self.transport {
            config.transport = transport;
        }
        if let Some(address) = self.address {
            config.address = address;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(duration) = self.duration {
            config.duration = duration;
        }
        if let Some(backlog) = self.backlog {
            config.backlog = backlog;
        }
        if self.no_listen {
            config.listen = false;
        }
        if self.wait_stdin {
            config.gate = true;
        }

        config.validate()?;
        Ok(config)
    }
}
