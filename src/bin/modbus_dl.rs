//! modbus-dl: unattended Modbus TCP data logger
//!
//! Usage: modbus-dl -c config.json -t template.csv [-o data] [-q] [-n]
//!
//! Stops on Ctrl+C or SIGTERM after flushing buffered samples.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use modbus_dl::display::{format_sample, DEFAULT_ITEMS_PER_LINE};
use modbus_dl::template::load_template;
use modbus_dl::value::TIMESTAMP_FORMAT;
use modbus_dl::{DataLogger, LogBuffer, LoggerConfig, ModbusTcpClient, ReadPlan};

/// Poll a Modbus TCP server according to a register template and log the samples
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Modbus configuration file (.json)
    #[clap(short, long)]
    config: PathBuf,

    /// Modbus register template (.csv)
    #[clap(short, long)]
    template: PathBuf,

    /// Directory for log files
    #[clap(short, long, default_value = "data")]
    output: PathBuf,

    /// Do not print each sample
    #[clap(short, long)]
    quiet: bool,

    /// Real-time client only, nothing is written to disk
    #[clap(short = 'n', long)]
    no_data_logging: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    println!();
    println!("\t[INFO] start_local\t= {}", Local::now().format(TIMESTAMP_FORMAT));
    println!("\t[INFO] start_utc\t= {}", Utc::now().format(TIMESTAMP_FORMAT));
    println!();

    let config = LoggerConfig::load(&args.config)
        .with_context(|| format!("loading configuration {}", args.config.display()))?;
    let rows = load_template(&args.template)
        .with_context(|| format!("loading template {}", args.template.display()))?;

    let limits = config.device_limits();
    let plan = ReadPlan::compile_with_limits(&rows, &limits);
    info!(
        "Template {}: {} rows, {} read groups, {} warnings",
        args.template.display(),
        rows.len(),
        plan.request_count(),
        plan.warnings().len()
    );
    if plan.is_empty() {
        warn!("Template yields no reads, samples will only carry timestamps");
    }

    let client = ModbusTcpClient::connect(
        &config.server_ip,
        config.port(),
        config.unit_id(),
        config.timeout(),
    )
    .await
    .with_context(|| format!("connecting to {}:{}", config.server_ip, config.server_port))?;

    let mut logger = DataLogger::new(client, plan, config.poll_interval())
        .with_inter_request_delay(limits.inter_request_delay());
    if args.no_data_logging {
        info!("Data logging disabled");
    } else {
        let buffer = LogBuffer::new(&args.output, config.log_settings());
        info!("Logging to {}", buffer.live_path().display());
        logger = logger.with_log_buffer(buffer);
    }

    let token = CancellationToken::new();
    let stopper = token.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        info!("Shutdown signal received");
        stopper.cancel();
    });

    let quiet = args.quiet;
    let ticks = logger
        .run_with(token, |sample| {
            if !quiet {
                print!("{}", format_sample(sample, DEFAULT_ITEMS_PER_LINE));
            }
        })
        .await?;

    info!("modbus-dl {} finished after {} samples", modbus_dl::VERSION, ticks);
    Ok(())
}

/// Wait for Ctrl+C, or SIGTERM on Unix.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let term_signal = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}. Only Ctrl+C will stop logging", e);
                None
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                match term_signal {
                    Some(mut sig) => {
                        sig.recv().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            } => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
