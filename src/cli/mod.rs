use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::Journal;
use crate::config::ConfigLoader;
use crate::imaging::{FileFetcher, ImageLoader};

pub mod commands;

use self::commands::{InboxArgs, TimelineArgs};

#[derive(Parser, Debug)]
#[command(
    name = "trailbook",
    version,
    about = "Browse hike check-ins and notifications from a journal export"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file location (takes precedence over TRAILBOOK_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over TRAILBOOK_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Resolve image refs against this directory instead of the configured media root
    #[arg(long)]
    pub media_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the check-in timeline with day labels and image state
    Timeline(TimelineArgs),
    /// Print notifications and where each one leads
    Inbox(InboxArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("TRAILBOOK_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("TRAILBOOK_DATA", path);
    }

    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let loader = ConfigLoader::discover()?;
    let mut config = loader.load_or_init()?;
    if let Some(media_dir) = cli.media_dir {
        config.media.root = media_dir;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("trailbook-fetch")
        .build()
        .context("starting image fetch runtime")?;
    let fetcher = Arc::new(FileFetcher::new(
        config.media.root.clone(),
        config.media.fetch_timeout(),
    ));
    tracing::debug!(root = %fetcher.root().display(), "media root resolved");
    let images = ImageLoader::new(fetcher, runtime.handle().clone());
    let mut journal = Journal::new(Arc::new(config), images);

    match cli.command {
        Commands::Timeline(args) => commands::show_timeline(&mut journal, args),
        Commands::Inbox(args) => commands::show_inbox(&mut journal, args),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_timeline_flags() {
        let cli = Cli::parse_from([
            "trailbook",
            "--media-dir",
            "/photos",
            "timeline",
            "export.json",
            "--select",
            "2",
            "--load-images",
        ]);
        assert_eq!(cli.media_dir, Some(PathBuf::from("/photos")));
        match cli.command {
            Commands::Timeline(args) => {
                assert_eq!(args.select.as_deref(), Some("2"));
                assert!(args.load_images);
                assert_eq!(args.wait_secs, 15);
            }
            other => panic!("expected timeline command, got {other:?}"),
        }
    }
}
