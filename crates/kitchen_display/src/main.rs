//! Kitchen display entry point.
//!
//! Follows the gateway's order feed and redraws the board in the terminal.
//! Commands are read from stdin: `active`, `completed`, `finish <id>`,
//! `unfinish <id>`, `quit`.

use anyhow::{bail, Result};
use chrono::Utc;
use common::{ControlCommand, WsManager, WsManagerConfig};
use kitchen_display::{
    parse_command, ApiClient, Board, DisplayConfig, DisplaySession, TextRenderer,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const TIMER_REFRESH: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout belongs to the board.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Kitchen display");

    let config = DisplayConfig::from_env()?;
    info!("Configuration:");
    info!("  DISPLAY_SERVER_URL: {}", config.server_url);
    info!("  DISPLAY_API_URL: {}", config.api_url);
    info!("  CARD_HEIGHT: {}", config.layout.card_height);
    info!("  COLUMN_HEIGHT: {}", config.layout.column_height);

    let api = ApiClient::new(config.api_url.clone());
    let token = match (&config.token, &config.credential_hash) {
        (Some(token), _) => token.clone(),
        (None, Some(hash)) => api.login(hash).await?,
        (None, None) => bail!("Set DISPLAY_TOKEN or DISPLAY_CREDENTIAL_HASH"),
    };

    let renderer = TextRenderer::new(config.card_width, config.layout.card_gap);
    let (board_tx, mut board_rx) = watch::channel(Board::default());
    let session = Arc::new(DisplaySession::new(
        &config.server_url,
        &token,
        api,
        config.layout,
        renderer.measure(),
        board_tx,
    )?);

    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let manager = WsManager::new(
        session,
        WsManagerConfig {
            reconnect: config.reconnect.clone(),
            label: "display".to_string(),
            ..WsManagerConfig::default()
        },
        cmd_rx,
    );
    let mut manager_handle = tokio::spawn(manager.run());

    // Forward operator input to the feed connection
    let input_tx = cmd_tx.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_command(&line) {
                Some(cmd) => {
                    if input_tx.send(cmd).await.is_err() {
                        break;
                    }
                }
                None => warn!("Unknown command: {}", line.trim()),
            }
        }
    });

    let mut timer = interval(TIMER_REFRESH);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    draw(&renderer, &board_rx.borrow_and_update());

    loop {
        let timers_running = board_rx.borrow().needs_timer();

        tokio::select! {
            changed = board_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                draw(&renderer, &board_rx.borrow_and_update());
            }

            _ = timer.tick(), if timers_running => {
                draw(&renderer, &board_rx.borrow());
            }

            result = &mut manager_handle => {
                match result {
                    Ok(Ok(())) => info!("Feed connection closed"),
                    Ok(Err(e)) => error!("Feed connection failed: {}", e),
                    Err(e) => error!("Feed task panicked: {}", e),
                }
                return Ok(());
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C");
                break;
            }
        }
    }

    let _ = cmd_tx.send(ControlCommand::Shutdown).await;
    let _ = manager_handle.await;

    info!("Kitchen display stopped");
    Ok(())
}

fn draw(renderer: &TextRenderer, board: &Board) {
    let frame = renderer.render(board, Utc::now());
    let mut stdout = std::io::stdout().lock();
    // Clear the screen and home the cursor before each frame.
    let _ = write!(stdout, "\x1b[2J\x1b[H{}", frame);
    let _ = stdout.flush();
}
