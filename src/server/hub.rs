//! Per-username push channel for server-initiated messages that do not fit
//! the request/reply shape, namely broadcasting a game start to every player
//! in a room instead of just the one who requested it. A username is only
//! reachable here while it holds an open, logged-in lobby connection;
//! delivery is best-effort and silently dropped otherwise.

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;

pub struct PlayerHub {
    senders: DashMap<String, mpsc::UnboundedSender<Value>>,
}

impl PlayerHub {
    pub fn new() -> Self {
        Self {
            senders: DashMap::new(),
        }
    }

    pub fn register(&self, username: &str, sender: mpsc::UnboundedSender<Value>) {
        self.senders.insert(username.to_string(), sender);
    }

    pub fn unregister(&self, username: &str) {
        self.senders.remove(username);
    }

    /// Pushes `value` to `username`'s connection if one is registered.
    /// Returns whether delivery was attempted and accepted by the channel;
    /// the caller is expected to treat both outcomes as best-effort.
    pub fn send_to(&self, username: &str, value: Value) -> bool {
        match self.senders.get(username) {
            Some(sender) => sender.send(value).is_ok(),
            None => false,
        }
    }
}

impl Default for PlayerHub {
    fn default() -> Self {
        Self::new()
    }
}
