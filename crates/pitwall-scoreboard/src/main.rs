//! # pitwall
//!
//! Terminal scoreboard for a live kart-timing feed: connects to the timing
//! server, requests a snapshot, and reprints the standings whenever they
//! change until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use pitwall_client::{ClientConfig, ConnectionManager};
use pitwall_logging::LogFormat;
use pitwall_scoreboard::format::render_board;
use pitwall_scoreboard::{FeedBridge, Scoreboard};
use pitwall_settings::loader::parse_ranking;
use pitwall_settings::{
    PitwallSettings, Ranking, get_settings, init_settings, load_settings, load_settings_from_path,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Live kart-timing scoreboard.
#[derive(Parser, Debug)]
#[command(name = "pitwall", about = "Live kart-timing scoreboard")]
struct Cli {
    /// Timing server URL (`ws://` or `wss://`).
    #[arg(long)]
    url: Option<String>,

    /// Page token sent as the `token` query parameter.
    #[arg(long)]
    token: Option<String>,

    /// Log every frame at info level.
    #[arg(long)]
    debug: bool,

    /// Reconnect forever (`true`) or up to the attempt cap (`false`).
    #[arg(long)]
    keep_alive: Option<bool>,

    /// Settings file (defaults to `~/.pitwall/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Standings order: `bestLap` or `totalTime`.
    #[arg(long, value_parser = ranking_arg)]
    ranking: Option<Ranking>,
}

fn ranking_arg(value: &str) -> std::result::Result<Ranking, String> {
    parse_ranking(value).ok_or_else(|| format!("unknown ranking: {value}"))
}

impl Cli {
    /// Load settings from the chosen file and layer the flags on top.
    fn load(&self) -> Result<PitwallSettings> {
        let mut settings = match &self.settings {
            Some(path) => load_settings_from_path(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?,
            None => load_settings().context("failed to load settings")?,
        };
        self.apply(&mut settings);
        settings.validate().context("invalid settings")?;
        Ok(settings)
    }

    fn apply(&self, settings: &mut PitwallSettings) {
        if let Some(ref url) = self.url {
            settings.client.url.clone_from(url);
        }
        if let Some(ref token) = self.token {
            settings.client.page_token = Some(token.clone());
        }
        if self.debug {
            settings.client.debug = true;
        }
        if let Some(keep_alive) = self.keep_alive {
            settings.client.keep_alive = keep_alive;
        }
        if let Some(ranking) = self.ranking {
            settings.scoreboard.ranking = ranking;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if init_settings(cli.load()?).is_err() {
        bail!("settings already initialized");
    }
    let settings = get_settings();

    let format = LogFormat::parse(&settings.logging.format).unwrap_or_default();
    pitwall_logging::init_subscriber_with_format(&settings.logging.level, format);

    if settings.client.url.is_empty() {
        bail!("no server URL: pass --url, set client.url, or set PITWALL_URL");
    }

    let manager = ConnectionManager::new(ClientConfig::from_settings(&settings.client))
        .context("invalid client configuration")?;
    let (bridge, inputs) = FeedBridge::attach(&manager);

    let cancel = CancellationToken::new();
    let scoreboard = tokio::spawn(Scoreboard::new(&settings.scoreboard).run(
        inputs,
        cancel.clone(),
        |board| println!("{}", render_board(board)),
    ));

    manager.start();
    let token = manager.send(settings.scoreboard.initial_command.clone(), json!({}));
    info!(
        command = %settings.scoreboard.initial_command,
        token = %token,
        ranking = ?settings.scoreboard.ranking,
        "scoreboard started"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutting down");

    if let Err(e) = manager.stop().await {
        warn!(error = %e, kind = e.error_kind(), "connection did not close cleanly");
    }
    bridge.detach(&manager);
    cancel.cancel();
    let _ = scoreboard.await;

    Ok(())
}
