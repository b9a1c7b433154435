//! zero-downtime - Static file server with listener handover.
//!
//! Start a second `serve` while one is running and the new process takes
//! over the bound listener; the old one drains and exits.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};

use zero_downtime::config::{self, HandoverConfig};
use zero_downtime::{status, Coordinator, FileService, Outcome};

#[derive(Parser)]
#[command(name = "zero-downtime")]
#[command(version, about = "Static file server with zero-downtime listener handover")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve files, taking over from a running instance if there is one
    Serve(ServeArgs),

    /// Check whether an instance is serving handover requests
    Status {
        /// Control endpoint path
        #[arg(long, env = "ZDT_SOCKET", default_value = config::DEFAULT_SOCKET_PATH)]
        socket: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// Control endpoint path
    #[arg(long, env = "ZDT_SOCKET", default_value = config::DEFAULT_SOCKET_PATH)]
    socket: String,

    /// Address to listen on when no instance is running
    #[arg(long, env = "ZDT_LISTEN", default_value = config::DEFAULT_LISTEN_ADDR)]
    listen: String,

    /// Directory to serve
    #[arg(long, env = "ZDT_ROOT", default_value = "./")]
    root: String,

    /// Seconds between checks for the predecessor's endpoint
    #[arg(long, env = "ZDT_POLL_INTERVAL", default_value = "1.0", value_parser = parse_seconds)]
    poll_interval: Duration,

    /// Max random seconds added to each poll
    #[arg(long, env = "ZDT_POLL_JITTER", default_value = "0.25", value_parser = parse_seconds)]
    poll_jitter: Duration,

    /// Seconds to drain after handing the listener over
    #[arg(long, env = "ZDT_GRACE_PERIOD", default_value = "5.0", value_parser = parse_seconds)]
    grace_period: Duration,

    /// Handshake timeout in seconds (connect, read, write, receive)
    #[arg(long, env = "ZDT_TIMEOUT", default_value = "5.0", value_parser = parse_seconds)]
    timeout: Duration,
}

impl ServeArgs {
    fn config(&self) -> HandoverConfig {
        HandoverConfig {
            socket_path: PathBuf::from(shellexpand::tilde(&self.socket).to_string()),
            listen_addr: self.listen.clone(),
            poll_interval: self.poll_interval,
            poll_jitter: self.poll_jitter,
            grace_period: self.grace_period,
            io_timeout: self.timeout,
        }
    }
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("invalid seconds '{}': {}", s, e))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid seconds '{}': {}", s, e))
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => cmd_serve(args).await,
        Commands::Status { socket, json } => cmd_status(socket, json),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn cmd_serve(args: ServeArgs) -> Result<ExitCode> {
    let config = args.config();
    let root = shellexpand::tilde(&args.root).to_string();
    let coordinator = Coordinator::new(config, FileService::new(root));
    let shutdown = coordinator.shutdown_handle();

    tokio::select! {
        outcome = coordinator.run() => {
            match outcome? {
                Outcome::HandedOver => tracing::info!("exiting after handover"),
                Outcome::ServiceStopped => tracing::info!("exiting after service stopped"),
            }
            Ok(ExitCode::SUCCESS)
        }
        received = termination_signal() => {
            let (name, number) = received?;
            tracing::warn!(signal = name, "received termination signal");
            shutdown.shutdown();
            Ok(ExitCode::from(128 + number))
        }
    }
}

/// Wait for SIGINT or SIGTERM.
async fn termination_signal() -> Result<(&'static str, u8)> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = interrupt.recv() => Ok(("SIGINT", libc::SIGINT as u8)),
        _ = terminate.recv() => Ok(("SIGTERM", libc::SIGTERM as u8)),
    }
}

fn cmd_status(socket: String, json: bool) -> Result<ExitCode> {
    let socket_path = shellexpand::tilde(&socket).to_string();
    let report = status::inspect(std::path::Path::new(&socket_path));

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.is_running() {
        println!("Incumbent serving handover requests at {}", report.socket);
    } else if let Some(ref error) = report.error {
        println!("Not running ({}): {}", error, report.socket);
    } else {
        println!("Not running");
    }

    Ok(if report.is_running() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
