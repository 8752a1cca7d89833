use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::select;
use tokio::time::{interval, Duration};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamMap;
use tracing::{error, info, warn};

use super::{
    broadcaster::{topics, Broadcaster},
    messages::{ClientMessage, WsMessage},
};
use crate::cache::QuoteCache;

/// WebSocket connection state
pub struct WsState {
    pub broadcaster: Broadcaster,
    pub cache: QuoteCache,
}

/// Handle WebSocket upgrade request
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WsState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle WebSocket connection
///
/// Every client is attached to the `prices` firehose on connect and may add
/// per-symbol `ticker` subscriptions on top. Events from all subscribed
/// topics are multiplexed through one StreamMap; a lagged receiver just
/// drops its backlog and picks up the next fresh event.
async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut subscriptions: StreamMap<String, BroadcastStream<WsMessage>> = StreamMap::new();
    subscriptions.insert(
        topics::prices().to_string(),
        BroadcastStream::new(state.broadcaster.subscribe(topics::prices())),
    );

    info!("WebSocket client connected");

    // Seed the new client with the latest known quotes
    let snapshot = state.cache.snapshot();
    if !snapshot.is_empty() {
        let initial = WsMessage::PriceUpdate { quotes: snapshot };
        if let Ok(json) = serde_json::to_string(&initial) {
            if sender.send(Message::Text(json)).await.is_err() {
                return;
            }
        }
    }

    // Heartbeat interval
    let mut heartbeat = interval(Duration::from_secs(30));

    loop {
        select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = handle_client_message(
                            &text,
                            &mut subscriptions,
                            &mut sender,
                            &state,
                        ).await {
                            error!("Error handling client message: {}", e);
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }

            // Forward broadcast events from all subscribed topics
            Some((topic, event)) = subscriptions.next() => {
                match event {
                    Ok(ws_msg) => {
                        if let Ok(json) = serde_json::to_string(&ws_msg) {
                            if sender.send(Message::Text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!("Client lagged on '{}', skipped {} events", topic, skipped);
                    }
                }
            }

            // Send heartbeat
            _ = heartbeat.tick() => {
                let heartbeat_msg = WsMessage::Ping {
                    timestamp: chrono::Utc::now(),
                };
                if let Ok(json) = serde_json::to_string(&heartbeat_msg) {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

/// Handle client messages (subscribe/unsubscribe/ping)
async fn handle_client_message(
    text: &str,
    subscriptions: &mut StreamMap<String, BroadcastStream<WsMessage>>,
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    state: &Arc<WsState>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client_msg: ClientMessage = serde_json::from_str(text)?;

    match client_msg {
        ClientMessage::Subscribe { channel, symbol } => {
            let topic = build_topic(&channel, symbol.as_deref());
            let response = match topic {
                Some(topic) => {
                    subscriptions.insert(
                        topic.clone(),
                        BroadcastStream::new(state.broadcaster.subscribe(&topic)),
                    );
                    WsMessage::Subscribed { channel, symbol }
                }
                None => WsMessage::Error {
                    message: format!("Unknown channel: {}", channel),
                },
            };
            send_message(sender, &response).await?;
        }
        ClientMessage::Unsubscribe { channel, symbol } => {
            let response = match build_topic(&channel, symbol.as_deref()) {
                Some(topic) => {
                    subscriptions.remove(&topic);
                    WsMessage::Unsubscribed { channel, symbol }
                }
                None => WsMessage::Error {
                    message: format!("Unknown channel: {}", channel),
                },
            };
            send_message(sender, &response).await?;
        }
        ClientMessage::Ping => {
            let response = WsMessage::Pong {
                timestamp: chrono::Utc::now(),
            };
            send_message(sender, &response).await?;
        }
    }

    Ok(())
}

async fn send_message(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    message: &WsMessage,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string(message)?;
    sender.send(Message::Text(json)).await?;
    Ok(())
}

/// Map a (channel, symbol) pair onto a broadcaster topic
fn build_topic(channel: &str, symbol: Option<&str>) -> Option<String> {
    match (channel, symbol) {
        ("prices", _) => Some(topics::prices().to_string()),
        ("ticker", Some(symbol)) => Some(topics::ticker(symbol)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_topic() {
        assert_eq!(build_topic("prices", None), Some("prices".to_string()));
        assert_eq!(
            build_topic("ticker", Some("TCS.NS")),
            Some("ticker:TCS.NS".to_string())
        );
        assert_eq!(build_topic("ticker", None), None);
        assert_eq!(build_topic("orderbook", Some("TCS.NS")), None);
    }
}
