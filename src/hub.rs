//! Channel-based fan-out of presence and message events to live sockets.
//!
//! Each socket registers once and then joins any number of channels
//! (`user:<id>` or `group:<id>`). Publishing to a channel delivers the event
//! to every connection currently joined to it, except that message events on
//! a user channel only reach that user's own connections. Nothing is buffered
//! for connections that join later, and a connection whose queue is full is
//! dropped.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};

use crate::db::UserStatus;
use crate::messaging::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    User(i64),
    Group(i64),
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::User(id) => write!(f, "user:{}", id),
            Channel::Group(id) => write!(f, "group:{}", id),
        }
    }
}

impl Serialize for Channel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageAction {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    Status {
        #[serde(rename = "userId")]
        user_id: i64,
        payload: UserStatus,
    },
    Message {
        action: MessageAction,
        payload: Message,
    },
}

/// What a socket actually receives.
#[derive(Debug, Serialize)]
struct Delivery<'a> {
    channel: Channel,
    #[serde(flatten)]
    event: &'a ServerEvent,
}

pub type ConnectionId = u64;

/// Events a connection may hold before it is treated as stalled.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

struct Connection {
    user_id: i64,
    tx: mpsc::Sender<String>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    channels: HashMap<Channel, HashSet<ConnectionId>>,
}

impl Registry {
    fn remove(&mut self, connection: ConnectionId) {
        self.connections.remove(&connection);
        self.channels.retain(|_, members| {
            members.remove(&connection);
            !members.is_empty()
        });
    }
}

#[derive(Clone)]
pub struct Hub {
    registry: Arc<RwLock<Registry>>,
    next_id: Arc<AtomicU64>,
    capacity: usize,
}

impl Default for Hub {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Hub {
            registry: Arc::default(),
            next_id: Arc::default(),
            capacity: capacity.max(1),
        }
    }

    /// Registers a connection owned by `user_id`. The receiver yields
    /// serialized events and ends when the connection is dropped from the hub.
    pub async fn connect(&self, user_id: i64) -> (ConnectionId, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::channel(self.capacity);

        self.registry
            .write()
            .await
            .connections
            .insert(id, Connection { user_id, tx });
        tracing::debug!("🔌 Connection {} registered for user {}", id, user_id);
        (id, rx)
    }

    /// Adds the connection to the channel. Joining twice has no extra effect.
    /// Returns false for unknown connections.
    pub async fn join(&self, connection: ConnectionId, channel: Channel) -> bool {
        let mut registry = self.registry.write().await;
        if !registry.connections.contains_key(&connection) {
            return false;
        }
        registry.channels.entry(channel).or_default().insert(connection);
        tracing::debug!("📡 Connection {} joined {}", connection, channel);
        true
    }

    pub async fn disconnect(&self, connection: ConnectionId) {
        self.registry.write().await.remove(connection);
        tracing::debug!("🔌 Connection {} removed", connection);
    }

    /// Delivers the event to every connection on the channel and returns how
    /// many accepted it. Message events on `user:<id>` only reach connections
    /// owned by that user. Connections whose queue is full are dropped.
    pub async fn publish(&self, channel: Channel, event: &ServerEvent) -> usize {
        let json = match serde_json::to_string(&Delivery { channel, event }) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("❌ Failed to serialize event for {}: {}", channel, e);
                return 0;
            }
        };

        let owner_only = match (channel, event) {
            (Channel::User(user_id), ServerEvent::Message { .. }) => Some(user_id),
            _ => None,
        };

        let mut delivered = 0;
        let mut stalled = Vec::new();
        {
            let registry = self.registry.read().await;
            let Some(members) = registry.channels.get(&channel) else {
                return 0;
            };

            for id in members {
                let Some(connection) = registry.connections.get(id) else {
                    continue;
                };
                if owner_only.is_some_and(|owner| owner != connection.user_id) {
                    continue;
                }
                match connection.tx.try_send(json.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => stalled.push(*id),
                    Err(mpsc::error::TrySendError::Closed(_)) => {}
                }
            }
        }

        if !stalled.is_empty() {
            let mut registry = self.registry.write().await;
            for id in stalled {
                tracing::warn!("⚠️ Connection {} is not reading events, dropping it", id);
                registry.remove(id);
            }
        }

        tracing::debug!("📣 Published to {} ({} subscribers)", channel, delivered);
        delivered
    }

    pub async fn publish_all(&self, channels: &[Channel], event: &ServerEvent) -> usize {
        let mut delivered = 0;
        for channel in channels {
            delivered += self.publish(*channel, event).await;
        }
        delivered
    }

    pub async fn subscriber_count(&self, channel: Channel) -> usize {
        let registry = self.registry.read().await;
        registry.channels.get(&channel).map_or(0, HashSet::len)
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.connections.len()
    }

    /// Drops every connection, which ends their receivers.
    pub async fn shutdown(&self) {
        let mut registry = self.registry.write().await;
        let closed = registry.connections.len();
        registry.connections.clear();
        registry.channels.clear();
        tracing::info!("🛑 Event hub shut down ({} connections closed)", closed);
    }
}
