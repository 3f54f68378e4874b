//! Per-connection WebSocket loop for live deal pushes.
//!
//! Forwards fanout messages to the socket and pings the client periodically.
//! Any send failure, close frame or end of stream ends the session and
//! deregisters the connection.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use tokio::time;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::delivery::fanout::{DeliveryFanout, LiveMessage};

#[cfg(not(test))]
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
#[cfg(test)]
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(50);

enum SessionEnd {
    ClientClosed,
    FanoutClosed,
    SendFailed,
}

pub async fn run_live_session(mut socket: WebSocket, fanout: Arc<DeliveryFanout>, consumer_id: Uuid) {
    let mut subscription = fanout.connect(consumer_id).await;
    let mut heartbeat = time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;

    let end = loop {
        let step = tokio::select! {
            outgoing = subscription.receiver.recv() => match outgoing {
                Some(message) => forward(&mut socket, &message).await,
                None => Err(SessionEnd::FanoutClosed),
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => Err(SessionEnd::ClientClosed),
                Some(Ok(Message::Ping(payload))) => socket
                    .send(Message::Pong(payload))
                    .await
                    .map_err(|_| SessionEnd::SendFailed),
                Some(Ok(_)) => Ok(()),
                Some(Err(e)) => {
                    debug!("Live socket error for consumer {consumer_id}: {e}");
                    Err(SessionEnd::ClientClosed)
                }
            },
            _ = heartbeat.tick() => socket
                .send(Message::Ping(Vec::new()))
                .await
                .map_err(|_| SessionEnd::SendFailed),
        };
        if let Err(end) = step {
            break end;
        }
    };

    match end {
        SessionEnd::ClientClosed => debug!("Consumer {consumer_id} closed live session"),
        SessionEnd::FanoutClosed => debug!("Fanout dropped live session for {consumer_id}"),
        SessionEnd::SendFailed => warn!("Live send to consumer {consumer_id} failed; closing"),
    }
    fanout
        .disconnect(consumer_id, subscription.connection_id)
        .await;
}

async fn forward(socket: &mut WebSocket, message: &LiveMessage) -> Result<(), SessionEnd> {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode live message: {e}");
            return Ok(());
        }
    };
    socket
        .send(Message::Text(text))
        .await
        .map_err(|_| SessionEnd::SendFailed)
}
