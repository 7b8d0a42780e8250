//! blitz - play chess with random strangers over WebSockets.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use blitz::config::{parse_duration, ServerConfig};
use blitz::game::Game;
use blitz::matcher::Matcher;
use blitz::server::{router, AppState};
use blitz::stats::PlayerCounter;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "blitz")]
#[command(about = "Real-time two-player chess server with sudden-death clocks")]
struct Args {
    /// Listen on this HTTP address.
    #[arg(long = "http", env = "BLITZ_HTTP", default_value = "0.0.0.0:8000")]
    http: String,

    /// Time limit per side (sudden death, no increment), e.g. "90s" or "5m".
    #[arg(long = "time", env = "BLITZ_TIME", default_value = "5m")]
    time: String,

    /// Directory holding the page template and static assets.
    #[arg(long = "assets", env = "BLITZ_ASSETS", default_value = "assets")]
    assets: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("blitz=info")))
        .init();

    let args = Args::parse();
    let config = ServerConfig {
        listen_addr: args.http,
        time_limit: parse_duration(&args.time)?,
        assets_dir: args.assets,
        ..ServerConfig::default()
    };
    config.validate()?;

    let index_html = std::fs::read_to_string(config.assets_dir.join("chess.html"))
        .with_context(|| format!("reading page template in {}", config.assets_dir.display()))?;

    let counter = PlayerCounter::new();
    let (waiting_tx, waiting_rx) = mpsc::channel(config.waiting_capacity);

    let time_limit = config.time_limit;
    let matcher = Matcher::new(waiting_rx, config.probe_timeout);
    tokio::spawn(matcher.run(move |a, b| {
        tokio::spawn(Game::new(a, b, time_limit).run());
    }));

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, time_limit = ?config.time_limit, "listening");

    let state = Arc::new(AppState {
        index_html,
        counter,
        waiting: waiting_tx,
        config,
    });
    let app = router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("serving")?;
    Ok(())
}
