//! Application entry point and thread bootstrapper.

mod input;
mod logic;
mod models;
mod net;
mod render;
mod shared;
mod state;
mod system;

use crate::input::manager::InputManager;
use crate::logic::PresentationLoop;
use crate::logic::audio::{AudioBackend, AudioManager};
use crate::models::engine::load_chart;
use crate::models::settings::{ServerMode, Settings};
use crate::net::ServerLink;
use crate::net::loopback::LoopbackServer;
use crate::net::ws::WsLink;
use crate::state::game::{SessionOptions, SystemTimeSource};
use crate::system::bus::{SessionEvent, SystemBus};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::thread;

#[derive(Parser)]
#[command(name = "rhythmforge", about = "Four-lane rhythm game client")]
struct Args {
    /// Chart JSON file to play
    chart: PathBuf,

    /// Settings file (created with defaults by --init-settings)
    #[arg(long, default_value = "settings.toml")]
    settings: PathBuf,

    /// Write a default settings file if none exists, then continue
    #[arg(long)]
    init_settings: bool,

    /// Judge on a remote server instead of in-process
    #[arg(long, conflicts_with = "offline")]
    server: bool,

    /// Judge in-process (loopback server)
    #[arg(long)]
    offline: bool,

    /// Server WebSocket URL (implies --server)
    #[arg(long)]
    url: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::info!("MAIN: Booting rhythmforge...");

    if args.init_settings && !args.settings.exists() {
        Settings::default()
            .save(&args.settings)
            .with_context(|| format!("writing default settings to {:?}", args.settings))?;
        log::info!("SETTINGS: Wrote defaults to {:?}", args.settings);
    }

    let mut settings = Settings::load(&args.settings);
    if let Some(url) = args.url.clone() {
        settings.server.url = url;
        settings.server.mode = ServerMode::Websocket;
    }
    if args.server {
        settings.server.mode = ServerMode::Websocket;
    }
    if args.offline {
        settings.server.mode = ServerMode::Loopback;
    }

    let bus = SystemBus::new();
    logic::audio_thread::start_audio_thread(bus.clone());

    let mut audio = AudioManager::new(&bus);
    audio.set_volume(settings.audio.volume);

    let server: Box<dyn ServerLink> = match settings.server.mode {
        ServerMode::Loopback => {
            log::info!("NET: Using the in-process judging server");
            Box::new(LoopbackServer::new(bus.events_tx.clone()))
        }
        ServerMode::Websocket => {
            log::info!("NET: Connecting to {}", settings.server.url);
            Box::new(WsLink::connect(
                settings.server.url.clone(),
                bus.events_tx.clone(),
            ))
        }
    };

    spawn_chart_loader(args.chart.clone(), &bus)?;

    let game = PresentationLoop::new(
        bus.events_rx.clone(),
        Box::new(audio),
        server,
        Box::new(SystemTimeSource::new()),
        SessionOptions::from_settings(&settings),
    );
    let input = InputManager::new(&settings.keys);
    let font = render::text::GlyphPainter::discover(settings.display.font.as_deref());

    render::app::App::new(
        game,
        input,
        bus.events_tx.clone(),
        settings.display.max_playfield_width,
        font,
    )
    .run()
    .context("window event loop failed")?;

    log::info!("MAIN: Bye");
    Ok(())
}

/// Loads the chart off the main thread; the result arrives as a session event.
fn spawn_chart_loader(path: PathBuf, bus: &SystemBus) -> anyhow::Result<()> {
    let events_tx = bus.events_tx.clone();
    thread::Builder::new()
        .name("Chart Loader".to_string())
        .spawn(move || {
            let result = load_chart(&path);
            if let Err(e) = &result {
                log::error!("CHART: {}", e);
            }
            let _ = events_tx.send(SessionEvent::ChartLoaded { path, result });
        })
        .context("spawning chart loader thread")?;
    Ok(())
}
