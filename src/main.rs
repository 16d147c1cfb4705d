use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use anyhow::Result;
use clap::Parser;

mod app;
mod audio;
mod client;
mod config;
mod handler;
mod state;
mod tui;
mod ui;

use app::App;
use audio::CommandPlayer;
use client::GiftHuntClient;
use config::{Config, Settings};
use handler::Services;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "gift-hunt", version)]
#[command(about = "Chat with Agent Cupid and unlock your birthday gifts")]
struct Cli {
    /// Base URL of the gift hunt server
    #[arg(short, long, env = "GIFT_HUNT_SERVER")]
    server: Option<String>,
    /// Audio clip played by the poem button
    #[arg(short, long, env = "GIFT_HUNT_AUDIO")]
    audio: Option<PathBuf>,
    /// Command used to play the clip (the clip path is appended)
    #[arg(long)]
    player: Option<String>,
    /// Write log output to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Remember the given options in the config file
    #[arg(long)]
    save_config: bool,
}

/// Route `log` output to a file; the terminal belongs to the UI.
fn init_logging(path: &Path) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(_) => {
            // Nowhere safe to write
            builder.filter_level(log::LevelFilter::Off);
        }
    }

    builder.init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load();
    let mut config = loaded.as_ref().cloned().unwrap_or_default();
    config.apply_overrides(cli.server, cli.audio, cli.player, cli.log_file);
    let settings = config.resolve()?;

    init_logging(&settings.log_file);
    if let Err(e) = &loaded {
        log::warn!("Ignoring config file: {:#}", e);
    }

    if cli.save_config {
        config.save()?;
        log::info!("Saved config");
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, settings).await;
    tui::restore()?;

    if let Err(e) = &result {
        log::error!("Exited with error: {:#}", e);
    }
    result
}

async fn run(terminal: &mut tui::Tui, settings: Settings) -> Result<()> {
    let mut events = EventHandler::new();

    let client = GiftHuntClient::new(&settings.server_url);
    log::info!("Using gift hunt server at {}", client.base_url());
    if !settings.audio_path.exists() {
        log::warn!("Poem clip {} does not exist yet", settings.audio_path.display());
    }

    let mut services = Services {
        client,
        player: Box::new(CommandPlayer::new(settings.player_command, settings.audio_path)),
        replies: events.sender(),
    };
    let mut app = App::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, &mut services, event)?,
            None => break,
        }
    }

    services.player.stop();
    events.shutdown();
    Ok(())
}
