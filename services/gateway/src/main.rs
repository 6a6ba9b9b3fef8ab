//! Inu gateway service.
//!
//! Hosts the crash game's interaction surface over a websocket and runs the
//! stock tracker pipeline in the background. Socket clients translate button
//! presses into `start`/`join`/`cashout` messages; round frames are fanned
//! out to every connected socket through a broadcast channel.

mod console;
mod rest;

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State as AxumState;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tracing::{info, warn};
use url::Url;

use inu_engine::{
    animate, CrashSampler, FrameSink, GameConfig, Round, RoundError, RoundFrame, RoundRegistry,
};
use inu_storage::Database;
use inu_tracker::{Destination, Dispatcher, FeedSupervisor, SnapshotProcessor};
use inu_types::{ChatError, ChatTransport, ChannelId, MessageId, OutboundMessage, RoleId, UserId};

use console::ConsoleChat;
use rest::RestChat;

#[derive(Parser, Debug)]
struct Args {
    /// Listen address for the websocket and health endpoints.
    #[arg(long, env = "INU_LISTEN_ADDR", default_value = "0.0.0.0:9220")]
    listen_addr: SocketAddr,

    #[arg(long, env = "INU_DB_PATH", default_value = "./data/inu-bot.db")]
    db_path: PathBuf,

    /// Stock feed endpoint.
    #[arg(long, env = "INU_FEED_URL", default_value = "wss://ws.growagardenpro.com/")]
    feed_url: Url,

    /// Disable the stock tracker entirely.
    #[arg(long, env = "INU_FEED_DISABLED")]
    feed_disabled: bool,

    /// Stock destinations as `channel` or `channel:ping_role`, comma
    /// separated.
    #[arg(long, env = "INU_STOCK_CHANNELS", value_delimiter = ',')]
    stock_channels: Vec<String>,

    /// Chat REST base url; without it the console transport logs deliveries
    /// instead of sending them.
    #[arg(long, env = "INU_CHAT_API_BASE")]
    chat_api_base: Option<String>,

    #[arg(long, env = "INU_CHAT_TOKEN", default_value = "")]
    chat_token: String,

    #[arg(long, env = "INU_MIN_BET", default_value_t = 10)]
    min_bet: u64,

    #[arg(long, env = "INU_MAX_BET", default_value_t = 1_000_000)]
    max_bet: u64,

    /// Betting window in seconds.
    #[arg(long, env = "INU_BETTING_SECS", default_value_t = 15)]
    betting_secs: u64,
}

/// Either real REST delivery or the dry-run console transport.
enum ChatBackend {
    Rest(RestChat),
    Console(ConsoleChat),
}

impl ChatTransport for ChatBackend {
    async fn send(
        &self,
        channel: ChannelId,
        message: &OutboundMessage,
    ) -> Result<MessageId, ChatError> {
        match self {
            ChatBackend::Rest(chat) => chat.send(channel, message).await,
            ChatBackend::Console(chat) => chat.send(channel, message).await,
        }
    }

    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageId,
        update: &OutboundMessage,
    ) -> Result<(), ChatError> {
        match self {
            ChatBackend::Rest(chat) => chat.edit(channel, message, update).await,
            ChatBackend::Console(chat) => chat.edit(channel, message, update).await,
        }
    }

    async fn delete(&self, channel: ChannelId, message: MessageId) -> Result<(), ChatError> {
        match self {
            ChatBackend::Rest(chat) => chat.delete(channel, message).await,
            ChatBackend::Console(chat) => chat.delete(channel, message).await,
        }
    }
}

#[derive(Clone)]
struct AppState {
    game_config: GameConfig,
    sampler: CrashSampler,
    ledger: Arc<Database>,
    registry: Arc<RoundRegistry<Database>>,
    broadcaster: broadcast::Sender<OutboundEvent>,
    /// Shared with the feed supervisor; `None` when the tracker is disabled.
    processor: Option<Arc<Mutex<SnapshotProcessor>>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundMessage {
    Start {
        request_id: String,
        channel: u64,
    },
    Join {
        request_id: String,
        channel: u64,
        player: u64,
        bet: u64,
    },
    Cashout {
        request_id: String,
        channel: u64,
        player: u64,
    },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutboundEvent {
    Frame { channel: ChannelId, frame: RoundFrame },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutboundResponse {
    Ack {
        request_id: String,
    },
    CashedOut {
        request_id: String,
        multiplier: f64,
        winnings: u64,
    },
    Error {
        request_id: String,
        code: String,
        message: String,
    },
}

/// Publishes round frames into the socket broadcast.
#[derive(Clone)]
struct BroadcastSink {
    channel: ChannelId,
    events: broadcast::Sender<OutboundEvent>,
}

impl FrameSink for BroadcastSink {
    async fn publish(&self, frame: RoundFrame) {
        // No receivers is fine; frames are fire-and-forget.
        let _ = self.events.send(OutboundEvent::Frame {
            channel: self.channel,
            frame,
        });
    }
}

async fn start_round(state: &AppState, channel: ChannelId) -> Result<(), RoundStartRefused> {
    let round = Arc::new(Round::create(
        state.game_config,
        &state.sampler,
        &mut rand::thread_rng(),
        state.ledger.clone(),
    ));
    state
        .registry
        .begin(channel, round.clone())
        .await
        .map_err(|_| RoundStartRefused)?;

    let sink = BroadcastSink {
        channel,
        events: state.broadcaster.clone(),
    };
    // Announce the betting phase right away; the animator takes over once
    // the window closes.
    sink.publish(betting_frame(&round).await).await;

    let config = state.game_config;
    let registry = state.registry.clone();
    tokio::spawn(async move {
        // Generous stall deadline; a healthy round finishes well within it.
        let deadline = config.betting_window + config.animation.duration + Duration::from_secs(30);
        if tokio::time::timeout(deadline, animate(round.clone(), sink))
            .await
            .is_err()
        {
            warn!(%channel, "round stalled, force-cancelling");
            round.cancel().await;
        }
        registry.finish(channel).await;
    });
    Ok(())
}

async fn betting_frame(round: &Round<Database>) -> RoundFrame {
    RoundFrame {
        snapshot: round.snapshot().await,
        samples: vec![inu_engine::MIN_MULTIPLIER],
    }
}

struct RoundStartRefused;

async fn handle_inbound(
    inbound: InboundMessage,
    state: &AppState,
    tx: &mpsc::UnboundedSender<Message>,
) {
    let response = match inbound {
        InboundMessage::Start {
            request_id,
            channel,
        } => match start_round(state, ChannelId(channel)).await {
            Ok(()) => OutboundResponse::Ack { request_id },
            Err(RoundStartRefused) => OutboundResponse::Error {
                request_id,
                code: "ROUND_IN_PROGRESS".into(),
                message: "a crash round is already in progress here".into(),
            },
        },
        InboundMessage::Join {
            request_id,
            channel,
            player,
            bet,
        } => match state.registry.get(ChannelId(channel)).await {
            None => no_round(request_id),
            Some(round) => match round.join(UserId(player), bet).await {
                Ok(()) => {
                    // Refresh the player list for everyone watching.
                    let _ = state.broadcaster.send(OutboundEvent::Frame {
                        channel: ChannelId(channel),
                        frame: betting_frame(&round).await,
                    });
                    OutboundResponse::Ack { request_id }
                }
                Err(err) => round_error(request_id, err),
            },
        },
        InboundMessage::Cashout {
            request_id,
            channel,
            player,
        } => match state.registry.get(ChannelId(channel)).await {
            None => no_round(request_id),
            Some(round) => match round.cashout(UserId(player)).await {
                Ok(cashout) => OutboundResponse::CashedOut {
                    request_id,
                    multiplier: cashout.multiplier,
                    winnings: cashout.winnings,
                },
                Err(err) => round_error(request_id, err),
            },
        },
    };
    send_response(tx, response);
}

fn no_round(request_id: String) -> OutboundResponse {
    OutboundResponse::Error {
        request_id,
        code: "NO_ROUND".into(),
        message: "no crash round is active here".into(),
    }
}

fn round_error(request_id: String, err: RoundError) -> OutboundResponse {
    let code = match &err {
        RoundError::BettingClosed => "BETTING_CLOSED",
        RoundError::AlreadyJoined => "ALREADY_JOINED",
        RoundError::RoundFull => "ROUND_FULL",
        RoundError::BetOutOfRange { .. } => "INVALID_BET",
        RoundError::InsufficientFunds => "INSUFFICIENT_FUNDS",
        RoundError::NotRunning => "NOT_RUNNING",
        RoundError::NotJoined => "NOT_JOINED",
        RoundError::AlreadyCashedOut => "ALREADY_CASHED_OUT",
        RoundError::Ledger(_) => "LEDGER_ERROR",
    };
    OutboundResponse::Error {
        request_id,
        code: code.into(),
        message: err.to_string(),
    }
}

fn send_response(tx: &mpsc::UnboundedSender<Message>, response: OutboundResponse) {
    if let Ok(payload) = serde_json::to_string(&response) {
        let _ = tx.send(Message::Text(payload));
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    AxumState(state): AxumState<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let mut broadcast_rx = state.broadcaster.subscribe();

    let write_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let broadcast_task = {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Ok(event) = broadcast_rx.recv().await {
                if let Ok(payload) = serde_json::to_string(&event) {
                    let _ = tx.send(Message::Text(payload));
                }
            }
        })
    };

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<InboundMessage>(&text) {
                Ok(inbound) => handle_inbound(inbound, &state, &tx).await,
                Err(err) => warn!(%err, "invalid inbound message"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    write_task.abort();
    broadcast_task.abort();
}

async fn healthz() -> &'static str {
    "ok"
}

/// Latest decoded stock snapshot, with per-category totals and the recent
/// weather history as the feed reported them.
async fn stock(AxumState(state): AxumState<AppState>) -> impl IntoResponse {
    let Some(processor) = &state.processor else {
        return Json(json!({ "enabled": false }));
    };
    let processor = processor.lock().await;
    let Some(snapshot) = processor.latest() else {
        return Json(json!({ "enabled": true, "stock": null }));
    };

    let categories: serde_json::Map<String, serde_json::Value> = inu_tracker::Category::ALL
        .iter()
        .map(|category| {
            (
                category.key().to_string(),
                json!(snapshot
                    .totals(*category)
                    .into_iter()
                    .map(|(name, quantity)| json!({ "name": name, "quantity": quantity }))
                    .collect::<Vec<_>>()),
            )
        })
        .collect();

    Json(json!({
        "enabled": true,
        "stock": {
            "weather": snapshot.weather,
            "weatherHistory": snapshot.weather_history,
            "categories": categories,
        },
    }))
}

fn parse_destination(spec: &str) -> anyhow::Result<Destination> {
    let (channel, role) = match spec.split_once(':') {
        Some((channel, role)) => (channel, Some(role)),
        None => (spec, None),
    };
    let channel = ChannelId(
        channel
            .trim()
            .parse()
            .with_context(|| format!("invalid channel id in destination `{spec}`"))?,
    );
    Ok(match role {
        Some(role) => Destination::with_ping_role(
            channel,
            RoleId(
                role.trim()
                    .parse()
                    .with_context(|| format!("invalid role id in destination `{spec}`"))?,
            ),
        ),
        None => Destination::new(channel),
    })
}

fn parse_destinations(specs: &[String]) -> anyhow::Result<Vec<Destination>> {
    specs
        .iter()
        .filter(|spec| !spec.trim().is_empty())
        .map(|spec| parse_destination(spec))
        .collect()
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "could not listen for shutdown signal");
        return;
    }
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    if let Some(parent) = args.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("create database directory")?;
        }
    }

    let db = Arc::new(Database::open(&args.db_path)?);
    let destinations = parse_destinations(&args.stock_channels)?;
    let transport = Arc::new(match &args.chat_api_base {
        Some(base) => ChatBackend::Rest(RestChat::new(base.clone(), args.chat_token.clone())?),
        None => {
            warn!("no chat api configured, deliveries go to the console transport");
            ChatBackend::Console(ConsoleChat::default())
        }
    });

    let (ready_tx, ready_rx) = watch::channel(false);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let processor = if args.feed_disabled {
        warn!("stock tracker disabled by configuration");
        None
    } else {
        let processor = Arc::new(Mutex::new(SnapshotProcessor::default()));
        let supervisor = FeedSupervisor::new(
            args.feed_url.clone(),
            processor.clone(),
            Dispatcher::new(transport.clone(), db.clone()),
            destinations.clone(),
        );
        info!(
            url = %args.feed_url,
            destinations = destinations.len(),
            "stock tracker configured"
        );
        tokio::spawn(supervisor.run(ready_rx.clone(), shutdown_rx.clone()));
        Some(processor)
    };

    let game_config = GameConfig {
        min_bet: args.min_bet,
        max_bet: args.max_bet,
        betting_window: Duration::from_secs(args.betting_secs),
        ..GameConfig::default()
    };
    let (broadcaster, _) = broadcast::channel::<OutboundEvent>(1024);
    let state = AppState {
        game_config,
        sampler: CrashSampler::default(),
        ledger: db,
        registry: Arc::new(RoundRegistry::new()),
        broadcaster,
        processor,
    };

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/stock", get(stock))
        .route("/healthz", get(healthz))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(args.listen_addr)
        .await
        .context("bind listen address")?;
    info!(addr = %args.listen_addr, "gateway listening");
    let _ = ready_tx.send(true);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;
    Ok(())
}
