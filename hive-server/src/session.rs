//! Per-connection plumbing between websockets and the engine
//!
//! Each socket gets a session id, a writer task for outbound frames, and a
//! read loop that parses, rate-limits, and forwards typed messages. The
//! engine never sees a raw socket.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::engine::Event;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::{AppState, ServerConfig};

/// Inbound frames larger than this never reach the parser.
const MAX_MESSAGE_BYTES: usize = 8 * 1024;
/// Per-session ingress budget.
const MESSAGES_PER_SECOND: u32 = 10;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app): State<AppState>,
    headers: HeaderMap,
) -> Response {
    if !origin_allowed(&app.config, &headers) {
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, app))
}

/// Development mode admits anything. Otherwise browsers must present a
/// listed Origin; clients without one (CLIs, health probes) are let through.
fn origin_allowed(config: &ServerConfig, headers: &HeaderMap) -> bool {
    if config.dev_mode {
        return true;
    }
    match headers.get("origin").and_then(|v| v.to_str().ok()) {
        Some(origin) => config.allowed_origins.iter().any(|a| a == origin),
        None => true,
    }
}

async fn handle_socket(socket: WebSocket, app: AppState) {
    let session = app.next_session.fetch_add(1, Ordering::Relaxed);
    let (mut sink, mut stream) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    if app
        .events
        .send(Event::Connected {
            session,
            tx: tx.clone(),
        })
        .is_err()
    {
        return;
    }
    tracing::info!(session, "session connected");

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let mut limiter = RateLimiter::new(MESSAGES_PER_SECOND);
    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                if text.len() > MAX_MESSAGE_BYTES {
                    tracing::warn!(session, bytes = text.len(), "oversized frame dropped");
                    send_error(&tx, "message too large");
                    continue;
                }
                if !limiter.allow(Instant::now()) {
                    send_error(&tx, "rate limit exceeded");
                    continue;
                }
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) => {
                        if app.events.send(Event::Message { session, message }).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::debug!(session, %err, "unparseable frame");
                        send_error(&tx, "malformed message");
                    }
                }
            }
            Message::Close(_) => break,
            // Pings and pongs are handled by axum; binary is not ours.
            _ => {}
        }
    }

    tracing::info!(session, "session closed");
    let _ = app.events.send(Event::Disconnected { session });
    writer.abort();
}

fn send_error(tx: &mpsc::UnboundedSender<String>, message: &str) {
    let frame = ServerMessage::Error {
        message: message.to_string(),
    };
    if let Ok(text) = serde_json::to_string(&frame) {
        let _ = tx.send(text);
    }
}

/// Fixed-window message counter.
struct RateLimiter {
    limit: u32,
    window_start: Instant,
    count: u32,
}

impl RateLimiter {
    fn new(limit: u32) -> Self {
        Self {
            limit,
            window_start: Instant::now(),
            count: 0,
        }
    }

    fn allow(&mut self, now: Instant) -> bool {
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.window_start = now;
            self.count = 0;
        }
        if self.count < self.limit {
            self.count += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_window() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(3);
        limiter.window_start = start;

        assert!(limiter.allow(start));
        assert!(limiter.allow(start));
        assert!(limiter.allow(start));
        assert!(!limiter.allow(start));
        // A fresh window resets the budget.
        let later = start + Duration::from_secs(1);
        assert!(limiter.allow(later));
        assert!(limiter.allow(later));
        assert!(limiter.allow(later));
        assert!(!limiter.allow(later));
    }

    #[test]
    fn test_origin_policy() {
        let config = ServerConfig {
            port: 0,
            allowed_origins: vec!["https://hive.example".to_string()],
            dev_mode: false,
        };

        let mut headers = HeaderMap::new();
        assert!(origin_allowed(&config, &headers), "no origin is a CLI");

        headers.insert("origin", "https://hive.example".parse().unwrap());
        assert!(origin_allowed(&config, &headers));

        headers.insert("origin", "https://evil.example".parse().unwrap());
        assert!(!origin_allowed(&config, &headers));

        let dev = ServerConfig {
            dev_mode: true,
            ..config
        };
        assert!(origin_allowed(&dev, &headers));
    }
}
