//! discord-dl command line front end
//!
//! Builds a [`Config`] from flags (optionally seeded from a JSON file), checks the token,
//! then runs the archiver with a progress bar fed by its event channel.

use chrono::NaiveDate;
use clap::{ArgAction, Parser};
use discord_dl::utils::format_bytes;
use discord_dl::{Archiver, Config, DownloadOutcome, Event, Result, RunSummary};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Parser, Debug)]
#[command(
    name = "discord-dl",
    version,
    about = "Download attachments posted in Discord channels and direct messages"
)]
struct Cli {
    /// Channel ids or channel URLs (https://discord.com/channels/<server|@me>/<channel>)
    channels: Vec<String>,

    /// Discord auth token
    #[arg(short, long, env = "DISCORD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Download root the path formats are relative to
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// JSON config file; flags given on the command line take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many matching messages per channel
    #[arg(short = 'n', long)]
    message_count: Option<usize>,

    /// Seconds to sleep between requests
    #[arg(long)]
    sleep: Option<f64>,

    /// Random extra sleep range in seconds
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    sleep_random: Option<Vec<f64>>,

    /// Maximum attempts per page fetch and attachment download
    #[arg(long)]
    max_retries: Option<u32>,

    /// Only messages posted on this date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Only messages posted before this date
    #[arg(long)]
    date_before: Option<NaiveDate>,

    /// Only messages posted after this date
    #[arg(long)]
    date_after: Option<NaiveDate>,

    /// Only messages from this username (repeatable)
    #[arg(long = "username")]
    usernames: Vec<String>,

    /// Only messages from this user id (repeatable)
    #[arg(long = "user-id")]
    user_ids: Vec<String>,

    /// Path format for server channels
    #[arg(long)]
    channel_format: Option<String>,

    /// Path format for direct messages
    #[arg(long)]
    dm_format: Option<String>,

    /// Apply Windows filename rules
    #[arg(long)]
    windows_filenames: bool,

    /// Restrict filenames to printable ASCII
    #[arg(long)]
    restrict_filenames: bool,

    /// Run every check but do not write attachments
    #[arg(short, long)]
    simulate: bool,

    /// Restart partial downloads instead of resuming them
    #[arg(long)]
    no_resume: bool,

    /// More output (-v for debug logging)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let bars = MultiProgress::new();
    init_tracing(cli.verbose, bars.clone());

    match run(&cli, &bars).await {
        Ok(summary) if summary.failed > 0 || !summary.failed_channels.is_empty() => {
            ExitCode::from(2)
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8, bars: MultiProgress) {
    let filter = if verbose > 0 {
        EnvFilter::new("discord_dl=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(LogWriter(bars))
        .init();
}

/// stderr log sink that hides the progress bars while a line is written
#[derive(Clone)]
struct LogWriter(MultiProgress);

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.suspend(|| std::io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

async fn run(cli: &Cli, bars: &MultiProgress) -> Result<RunSummary> {
    let config = load_config(cli)?;
    tracing::debug!(?config, "Configuration");

    let archiver = Archiver::new(config)?;
    archiver.verify_credentials().await?;

    let progress = spawn_progress(archiver.subscribe(), bars.clone());
    let summary = archiver.run().await?;
    let transferred = progress.await.unwrap_or_default();

    println!(
        "{} downloaded ({}), {} already present, {} simulated, {} skipped, {} failed",
        summary.downloaded,
        format_bytes(transferred),
        summary.already_present,
        summary.simulated,
        summary.skipped,
        summary.failed
    );
    if !summary.failed_channels.is_empty() {
        println!("Failed channels: {}", summary.failed_channels.join(", "));
    }
    Ok(summary)
}

/// Merge the optional JSON config file with command line flags
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };

    if let Some(token) = &cli.token {
        config.token = token.clone();
    }
    if let Some(path) = &cli.path {
        config.download_dir = path.clone();
    }
    if !cli.channels.is_empty() {
        config.channels = cli.channels.clone();
    }
    if cli.message_count.is_some() {
        config.message_count = cli.message_count;
    }
    if let Some(sleep) = cli.sleep {
        config.pacing.base = sleep;
    }
    if let Some([min, max]) = cli.sleep_random.as_deref() {
        config.pacing.random_min = *min;
        config.pacing.random_max = *max;
    }
    if let Some(max_retries) = cli.max_retries {
        config.retry.max_attempts = max_retries;
    }

    let filter = &mut config.filter;
    filter.date = cli.date.or(filter.date);
    filter.date_before = cli.date_before.or(filter.date_before);
    filter.date_after = cli.date_after.or(filter.date_after);
    if !cli.usernames.is_empty() {
        filter.usernames = cli.usernames.clone();
    }
    if !cli.user_ids.is_empty() {
        filter.user_ids = cli.user_ids.clone();
    }

    let naming = &mut config.naming;
    if let Some(format) = &cli.channel_format {
        naming.channel_format = format.clone();
    }
    if let Some(format) = &cli.dm_format {
        naming.dm_format = format.clone();
    }
    naming.windows_filenames |= cli.windows_filenames;
    naming.restrict_filenames |= cli.restrict_filenames;

    config.simulate |= cli.simulate;
    if cli.no_resume {
        config.resume = false;
    }

    Ok(config)
}

/// Render transfer events as a progress bar; resolves to the bytes transferred
fn spawn_progress(
    mut events: broadcast::Receiver<Event>,
    bars: MultiProgress,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut bar: Option<ProgressBar> = None;
        let mut transferred = 0u64;

        loop {
            match events.recv().await {
                Ok(Event::DownloadStarted {
                    path,
                    resume_from,
                    total,
                }) => {
                    if let Some(old) = bar.take() {
                        old.finish_and_clear();
                    }
                    let new = bars.add(progress_bar(&path, total));
                    new.set_position(resume_from);
                    bar = Some(new);
                }
                Ok(Event::DownloadProgress { downloaded, .. }) => {
                    if let Some(bar) = &bar {
                        bar.set_position(downloaded);
                    }
                }
                Ok(Event::DownloadFinished { outcome, .. }) => {
                    if let DownloadOutcome::Downloaded { bytes, .. } = outcome {
                        transferred += bytes;
                    }
                    if let Some(bar) = bar.take() {
                        bar.finish_and_clear();
                        bars.remove(&bar);
                    }
                }
                Ok(Event::DownloadFailed { .. }) => {
                    if let Some(bar) = bar.take() {
                        bar.abandon();
                    }
                }
                Ok(Event::RunFinished { .. }) | Err(RecvError::Closed) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Progress display fell behind");
                }
            }
        }
        transferred
    })
}

fn progress_bar(path: &Path, total: Option<u64>) -> ProgressBar {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let bar = match total {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} @ {bytes_per_sec} - {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("━━╌"),
            );
            bar
        }
        None => ProgressBar::new_spinner(),
    };
    bar.set_message(name);
    bar
}
