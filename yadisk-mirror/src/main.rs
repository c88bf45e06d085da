use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use yadisk_core::{ApiErrorClass, YadiskClient};
use yadisk_mirror::config::{self, MirrorConfig, expand_with_home};
use yadisk_mirror::logging::{LogFormat, init_logging};
use yadisk_mirror::{Mirror, RemoteError, RemoteStore, RetryPolicy, YadiskRemote};

#[derive(Debug, Parser)]
#[command(name = "yadisk-mirror")]
#[command(about = "Mirror a local directory tree onto Yandex Disk")]
#[command(version)]
struct Cli {
    /// Path on local
    #[arg(short = 'i', long = "source", default_value = ".")]
    source: String,

    /// Path on Yandex Disk
    #[arg(short = 'o', long = "destination", default_value = config::DEFAULT_REMOTE_ROOT)]
    destination: String,

    /// Yandex Disk OAuth token
    #[arg(long, env = "YANDEX_DISK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Workers count
    #[arg(short = 'w', long, default_value_t = config::DEFAULT_WORKERS)]
    workers: usize,

    /// Max attempt count per file
    #[arg(short = 'r', long = "retries", default_value_t = config::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Backoff unit in milliseconds; failed attempt N waits N*2 units
    #[arg(long, default_value_t = config::DEFAULT_RETRY_UNIT_MS)]
    retry_unit_ms: u64,

    /// Yandex Disk REST API base URL
    #[arg(long, env = "YADISK_API_URL", default_value = config::DEFAULT_API_URL, hide = true)]
    api_url: String,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: LogFormat,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    summary_json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.verbose, cli.log_format) {
        eprintln!("[yadisk-mirror] failed to initialise logging: {err}");
        return ExitCode::FAILURE;
    }
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let token = cli
        .token
        .filter(|token| !token.trim().is_empty())
        .context("YANDEX_DISK_TOKEN is not set")?;

    let source_root = expand_with_home(&cli.source, dirs::home_dir().as_deref());
    let config = MirrorConfig::new(source_root, cli.destination)
        .with_workers(cli.workers)
        .with_retry(RetryPolicy::new(
            cli.max_attempts,
            Duration::from_millis(cli.retry_unit_ms),
        ));
    config.validate().context("invalid settings")?;

    let client = YadiskClient::with_base_url(&cli.api_url, token)
        .with_context(|| format!("invalid API url {:?}", cli.api_url))?;
    let remote = Arc::new(YadiskRemote::new(
        client,
        config.move_poll_interval,
        config.move_poll_limit,
    ));

    let disk = match remote.check_access().await {
        Ok(disk) => disk,
        Err(RemoteError::Api(err)) if err.classification() == Some(ApiErrorClass::Auth) => {
            anyhow::bail!("Yandex Disk rejected the OAuth token: {err}");
        }
        Err(err) => return Err(err).context("failed to reach Yandex Disk"),
    };
    info!(
        source = ?config.source_root,
        remote = %config.remote_root,
        workers = config.workers,
        max_attempts = config.retry.max_attempts(),
        used_space = disk.used_space,
        total_space = disk.total_space,
        "starting mirror"
    );

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let summary = Mirror::new(remote, config).run(cancel).await?;
    if cli.summary_json {
        println!("{}", serde_json::to_string(&summary)?);
    }
    info!("Done!");
    Ok(())
}

fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        warn!("interrupt received, stopping uploads");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let Ok(mut terminate) = signal(SignalKind::terminate()) else {
        wait_for_ctrl_c().await;
        return;
    };
    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    // Without a signal handler there is nothing to wait for; never cancel.
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
