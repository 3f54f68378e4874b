//! Realtime Delivery Fanout: pushes freshly persisted notifications to the
//! consumer's open live connections.
//!
//! Delivery is best effort. Notifications are already stored before they get
//! here, so a full or closed connection buffer only means the consumer reads
//! the notification from the list endpoint instead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{DealItem, Notification};

/// Frames sent over a live connection, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveMessage {
    Connected { consumer_id: Uuid },
    NewDeal {
        notification: Notification,
        deal: DealItem,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Notifications handed to at least one open connection.
    pub live: usize,
    /// Notifications whose consumer had no connection that accepted them.
    pub offline: usize,
}

struct LiveConnection {
    id: u64,
    sender: mpsc::Sender<LiveMessage>,
}

/// Receiving half handed to a WebSocket session.
pub struct LiveSubscription {
    pub connection_id: u64,
    pub receiver: mpsc::Receiver<LiveMessage>,
}

pub struct DeliveryFanout {
    connections: RwLock<HashMap<Uuid, Vec<LiveConnection>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl DeliveryFanout {
    pub fn new(capacity: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    /// Registers a new connection for the consumer and queues the greeting.
    pub async fn connect(&self, consumer_id: Uuid) -> LiveSubscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let connection_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        // Fresh channel with capacity >= 1, so the greeting always fits.
        let _ = sender.try_send(LiveMessage::Connected { consumer_id });

        let mut connections = self.connections.write().await;
        let open = connections.entry(consumer_id).or_default();
        open.push(LiveConnection {
            id: connection_id,
            sender,
        });
        info!(
            "Consumer {consumer_id} connected live (connection {connection_id}, {} open)",
            open.len()
        );

        LiveSubscription {
            connection_id,
            receiver,
        }
    }

    pub async fn disconnect(&self, consumer_id: Uuid, connection_id: u64) {
        let mut connections = self.connections.write().await;
        if let Some(open) = connections.get_mut(&consumer_id) {
            open.retain(|c| c.id != connection_id);
            if open.is_empty() {
                connections.remove(&consumer_id);
            }
        }
        info!("Consumer {consumer_id} disconnected (connection {connection_id})");
    }

    #[cfg(test)]
    pub async fn connection_count(&self, consumer_id: Uuid) -> usize {
        self.connections
            .read()
            .await
            .get(&consumer_id)
            .map_or(0, Vec::len)
    }

    /// Pushes each notification to every open connection of its consumer.
    /// Never waits on a slow connection; closed ones are pruned.
    pub async fn deliver(&self, notifications: &[Notification], deal: &DealItem) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut connections = self.connections.write().await;

        for notification in notifications {
            let consumer_id = notification.consumer_id;
            let Some(open) = connections.get_mut(&consumer_id) else {
                report.offline += 1;
                continue;
            };

            let mut delivered = false;
            open.retain(|connection| {
                let message = LiveMessage::NewDeal {
                    notification: notification.clone(),
                    deal: deal.clone(),
                };
                match connection.sender.try_send(message) {
                    Ok(()) => {
                        delivered = true;
                        true
                    }
                    Err(TrySendError::Full(_)) => {
                        warn!(
                            "Live buffer full for consumer {consumer_id} (connection {}); dropping push",
                            connection.id
                        );
                        true
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!(
                            "Pruning closed connection {} for consumer {consumer_id}",
                            connection.id
                        );
                        false
                    }
                }
            });
            if open.is_empty() {
                connections.remove(&consumer_id);
            }

            if delivered {
                report.live += 1;
            } else {
                report.offline += 1;
            }
        }

        if !notifications.is_empty() {
            info!(
                "Delivered deal {} live to {} consumer(s), {} offline",
                deal.id, report.live, report.offline
            );
        }
        report
    }
}
