use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use chzzk_srec::config::{self, ChannelConfig, RuntimePaths};
use chzzk_srec::downloader::{OutputNamer, StreamlinkEngine};
use chzzk_srec::lifecycle::{self, PidFile, StopOutcome};
use chzzk_srec::monitor::ChzzkProber;
use chzzk_srec::retention::{RetentionManager, SysinfoDiskProbe};
use chzzk_srec::supervisor::{Supervisor, SupervisorConfig};
use chzzk_srec::utils::fs::ensure_dir_all_with_op;
use chzzk_srec::{Error, logging, panic_hook, shutdown};

/// Automatic recorder for a single Chzzk live channel.
#[derive(Debug, Parser)]
#[command(name = "chzzk-srec", version, about)]
struct Args {
    /// Load settings from this env file instead of `./.env`.
    #[arg(long, global = true, value_name = "PATH", env = "CHZZK_SREC_ENV_FILE")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Watch the channel and record every broadcast (default).
    Run,
    /// Stop a running recorder.
    Stop {
        /// Seconds to wait for a graceful exit before killing it.
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..=3600))]
        timeout: u64,
    },
    /// Show whether the recorder is running, recent log lines and storage usage.
    Status {
        /// Number of log lines to show.
        #[arg(long, default_value_t = 20)]
        lines: usize,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            // Configuration errors happen before any subscriber exists.
            logging::init_console_logging("error");
            error!("Application error: {:#}", e);
            eprintln!("Error: {e:#}");
            ExitCode::from(failure_code(&e))
        }
    }
}

/// Process exit code for an error that ended the run.
fn failure_code(e: &anyhow::Error) -> u8 {
    e.downcast_ref::<Error>()
        .and_then(|e| u8::try_from(e.exit_code()).ok())
        .unwrap_or(1)
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    config::load_env_file(args.env_file.as_deref())?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_recorder().await,
        Command::Stop { timeout } => {
            logging::init_console_logging("info");
            let paths = RuntimePaths::from_env()?;
            match lifecycle::stop(&paths, Duration::from_secs(timeout)).await? {
                StopOutcome::Graceful { pid } => println!("Recorder stopped (pid {pid})"),
                StopOutcome::Forced { pid } => {
                    println!("Recorder did not stop within {timeout}s and was killed (pid {pid})")
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Status { lines, json } => {
            logging::init_console_logging("warn");
            let paths = RuntimePaths::from_env()?;
            let report = lifecycle::status(&paths, lines, Arc::new(SysinfoDiskProbe)).await?;
            if json {
                println!("{}", report.to_json()?);
            } else {
                print!("{report}");
            }
            Ok(if report.is_running() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

async fn run_recorder() -> anyhow::Result<ExitCode> {
    let config = ChannelConfig::from_env()?;

    let _log_guard = logging::init_logging(&config.paths.log_dir, &config.log_level)?;
    panic_hook::install(&config.paths.log_dir);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        channel = %config.channel_id,
        output_dir = %config.paths.output_dir.display(),
        "chzzk-srec starting"
    );

    let _pid_file = PidFile::acquire(&config.paths.pid_file)?;
    ensure_dir_all_with_op("creating output directory", &config.paths.output_dir).await?;

    let shutdown_token = CancellationToken::new();
    let signals = shutdown::spawn_signal_listener(shutdown_token.clone())?;

    let engine = StreamlinkEngine::new(config.streamlink.clone(), config.credentials.clone());
    match engine.detect_version().await {
        Some(version) => info!(%version, "Detected streamlink"),
        None => warn!(
            path = %config.streamlink.binary_path,
            "streamlink is not runnable; captures will fail to launch"
        ),
    }

    let prober = ChzzkProber::new(&config)?;
    let namer = OutputNamer::new(&config.paths.output_dir, &config.paths.output_format);
    let retention = RetentionManager::new(
        &config.paths.output_dir,
        &config.paths.output_format,
        config.retention.clone(),
        Arc::new(SysinfoDiskProbe),
    );

    let mut supervisor = Supervisor::new(
        SupervisorConfig::from(&config),
        prober,
        engine,
        namer,
        retention,
        shutdown_token,
    );
    let result = supervisor.run().await;
    signals.abort();

    result?;
    info!("chzzk-srec exited cleanly");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_code_follows_error_kind() {
        let config = anyhow::Error::from(Error::config("CHECK_INTERVAL must be between 1 and 86400"));
        assert_eq!(failure_code(&config), 2);

        let other = anyhow::anyhow!("something else");
        assert_eq!(failure_code(&other), 1);
    }

    #[test]
    fn stop_timeout_is_bounded() {
        assert!(Args::try_parse_from(["chzzk-srec", "stop", "--timeout", "3600"]).is_ok());
        assert!(Args::try_parse_from(["chzzk-srec", "stop", "--timeout", "0"]).is_err());
        assert!(
            Args::try_parse_from(["chzzk-srec", "stop", "--timeout", "18446744073709551615"])
                .is_err()
        );
    }
}
