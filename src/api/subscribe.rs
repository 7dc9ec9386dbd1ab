/// WebSocket subscription for realtime change events
///
/// A connection receives, as JSON text frames:
/// - the caller's own notification stream
/// - the moderation queue stream, when the caller is a moderator
/// - the engagement stream of one watched video, switched by the client
///
/// # Protocol
///
/// Server frames are [`ChangeEvent`]s tagged by `type`, plus `info` frames
/// for connection status. A `lagged` info frame means events were skipped
/// and the client should refetch authoritative state.
///
/// Client frames: `{"watch": "<videoId>"}` or `{"unwatch": true}`.
///
/// Browsers cannot set headers on a WebSocket handshake, so the session
/// token may also be passed as `?token=`.
use crate::{
    auth::extract_bearer_token,
    context::AppContext,
    error::ReelResult,
    identity::{verify_token, Actor},
    metrics,
    realtime::{ChangeEvent, ChangeStream, Delivery},
};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
    routing::get,
    Router,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::{Deserialize, Serialize};
use tokio::time::{interval, timeout, Duration, Instant};

const SEND_TIMEOUT_MS: u64 = 5000; // Timeout for sending a message

/// Build subscription routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/subscribe", get(subscribe))
}

#[derive(Debug, Deserialize)]
pub struct SubscribeParams {
    pub token: Option<String>,
    /// Video to watch from the start
    pub video: Option<String>,
}

/// Control frames sent by the client
#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
enum ClientMessage {
    Watch(String),
    Unwatch(bool),
}

/// Connection status frames
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InfoFrame {
    Info {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl InfoFrame {
    fn new(name: &str, message: Option<String>) -> Self {
        InfoFrame::Info {
            name: name.to_string(),
            message,
        }
    }
}

/// GET /api/subscribe
async fn subscribe(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(params): Query<SubscribeParams>,
    State(ctx): State<AppContext>,
) -> ReelResult<Response> {
    let token = extract_bearer_token(&headers).or(params.token.as_deref());
    let actor = match token {
        Some(token) => {
            let actor = verify_token(token, &ctx.config.authentication.jwt_secret)?;
            ctx.accounts.remember(&actor).await?;
            Some(actor)
        }
        None => None,
    };

    let mut stream = match &actor {
        Some(actor) => ctx.hub.subscribe_actor(actor),
        None => ctx.hub.subscribe(Vec::new()),
    };
    if let Some(video_id) = params.video {
        stream.watch_video(video_id);
    }

    let ping_secs = ctx.config.realtime.ping_interval_secs.max(1);
    Ok(ws.on_upgrade(move |socket| handle_subscription(socket, stream, actor, ping_secs)))
}

/// Pump hub events to the client until either side goes away
async fn handle_subscription(
    socket: WebSocket,
    mut stream: ChangeStream,
    actor: Option<Actor>,
    ping_secs: u64,
) {
    let (mut sender, mut receiver) = socket.split();
    let who = actor
        .as_ref()
        .map(|a| a.account_id.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    metrics::REALTIME_CONNECTIONS.inc();
    tracing::debug!("Realtime subscriber connected: {}", who);

    let connected = InfoFrame::new("connected", None);
    if send_json(&mut sender, &connected).await.is_ok() {
        run_loop(&mut sender, &mut receiver, &mut stream, ping_secs).await;
    }

    metrics::REALTIME_CONNECTIONS.dec();
    tracing::debug!("Realtime subscriber disconnected: {}", who);
}

async fn run_loop(
    sender: &mut SplitSink<WebSocket, Message>,
    receiver: &mut futures::stream::SplitStream<WebSocket>,
    stream: &mut ChangeStream,
    ping_secs: u64,
) {
    let mut ping_interval = interval(Duration::from_secs(ping_secs));
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            delivery = stream.next() => {
                let result = match delivery {
                    Some(Delivery::Event(event)) => send_event(sender, &event).await,
                    Some(Delivery::Lagged(skipped)) => {
                        tracing::warn!("Realtime subscriber lagged by {} events", skipped);
                        let frame = InfoFrame::new("lagged", Some(format!("{} events skipped", skipped)));
                        send_json(sender, &frame).await
                    }
                    None => break,
                };

                match result {
                    Ok(()) => last_activity = Instant::now(),
                    Err(SendError::Timeout) => {
                        tracing::warn!("Send timeout, client may be slow");
                        break;
                    }
                    Err(SendError::Disconnected) => {
                        tracing::debug!("Client disconnected during send");
                        break;
                    }
                }
            }

            // Send periodic pings
            _ = ping_interval.tick() => {
                if last_activity.elapsed() >= Duration::from_secs(ping_secs)
                    && sender.send(Message::Ping(vec![])).await.is_err()
                {
                    break;
                }
            }

            // Handle client messages
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !apply_client_message(stream, &text) {
                            let frame = InfoFrame::new("invalid_message", Some(text));
                            if send_json(sender, &frame).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::debug!("Client closed connection");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_activity = Instant::now();
                    }
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        tracing::debug!("Client disconnected");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Switch the watched video; false if the frame was not understood
fn apply_client_message(stream: &mut ChangeStream, text: &str) -> bool {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Watch(video_id)) if !video_id.trim().is_empty() => {
            stream.watch_video(video_id.trim());
            true
        }
        Ok(ClientMessage::Unwatch(_)) => {
            stream.unwatch_video();
            true
        }
        _ => false,
    }
}

/// Error type for sending frames
#[derive(Debug)]
enum SendError {
    Timeout,
    Disconnected,
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &ChangeEvent,
) -> Result<(), SendError> {
    send_json(sender, event).await?;
    metrics::record_realtime_frame(event.name());
    Ok(())
}

/// Send a JSON frame with timeout
async fn send_json<T: Serialize>(
    sender: &mut SplitSink<WebSocket, Message>,
    frame: &T,
) -> Result<(), SendError> {
    let json = serde_json::to_string(frame).map_err(|_| SendError::Disconnected)?;

    match timeout(
        Duration::from_millis(SEND_TIMEOUT_MS),
        sender.send(Message::Text(json)),
    )
    .await
    {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(_)) => Err(SendError::Disconnected),
        Err(_) => Err(SendError::Timeout),
    }
}
