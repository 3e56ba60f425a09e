//! Realtime stream topics, envelopes and the caches they invalidate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A category of server-pushed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    NodeStatus,
    UserUpdate,
    Violation,
    Connection,
    Activity,
}

/// Topics requested in the subscribe message sent on every connect.
pub const SUBSCRIBED_TOPICS: [Topic; 4] = [
    Topic::NodeStatus,
    Topic::UserUpdate,
    Topic::Violation,
    Topic::Connection,
];

impl Topic {
    /// Parse a wire tag; unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "node_status" => Some(Topic::NodeStatus),
            "user_update" => Some(Topic::UserUpdate),
            "violation" => Some(Topic::Violation),
            "connection" => Some(Topic::Connection),
            "activity" => Some(Topic::Activity),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::NodeStatus => "node_status",
            Topic::UserUpdate => "user_update",
            Topic::Violation => "violation",
            Topic::Connection => "connection",
            Topic::Activity => "activity",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound application message.
///
/// `kind` is kept as a raw string so unknown topics parse and are dropped
/// by the dispatcher instead of failing deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl Envelope {
    /// Parse a text frame. Keepalive tokens and non-JSON text yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text == "ping" || text == "pong" {
            return None;
        }
        serde_json::from_str(text).ok()
    }

    pub fn topic(&self) -> Option<Topic> {
        Topic::from_tag(&self.kind)
    }

    fn data_str(&self, field: &str) -> Option<&str> {
        self.data.as_ref()?.get(field)?.as_str()
    }

    /// The caches made stale by this event, in invalidation order.
    pub fn invalidations(&self) -> Vec<CacheKey> {
        let Some(topic) = self.topic() else {
            return Vec::new();
        };
        match topic {
            Topic::NodeStatus => {
                let mut keys = vec![CacheKey::Nodes];
                if let Some(uuid) = self.data_str("uuid") {
                    keys.push(CacheKey::Node(uuid.to_string()));
                }
                keys
            }
            Topic::UserUpdate => {
                let mut keys = vec![CacheKey::Users];
                if let Some(uuid) = self.data_str("uuid") {
                    keys.push(CacheKey::User(uuid.to_string()));
                }
                keys
            }
            Topic::Violation => vec![CacheKey::Violations],
            Topic::Connection => vec![CacheKey::Connections],
            Topic::Activity => vec![CacheKey::Activity],
        }
    }
}

/// Outbound control messages.
#[derive(Debug, Clone)]
pub enum ControlMessage {
    Subscribe { topics: Vec<Topic> },
}

impl ControlMessage {
    /// The subscribe message for the fixed topic set.
    pub fn subscribe_all() -> Self {
        ControlMessage::Subscribe {
            topics: SUBSCRIBED_TOPICS.to_vec(),
        }
    }

    pub fn to_json(&self) -> String {
        match self {
            ControlMessage::Subscribe { topics } => {
                let tags: Vec<&str> = topics.iter().map(Topic::as_str).collect();
                serde_json::json!({ "type": "subscribe", "topics": tags }).to_string()
            }
        }
    }
}

/// A named external data cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Nodes,
    Node(String),
    Users,
    User(String),
    Violations,
    Connections,
    Activity,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Nodes => f.write_str("nodes"),
            CacheKey::Node(uuid) => write!(f, "nodes/{}", uuid),
            CacheKey::Users => f.write_str("users"),
            CacheKey::User(uuid) => write!(f, "users/{}", uuid),
            CacheKey::Violations => f.write_str("violations"),
            CacheKey::Connections => f.write_str("connections"),
            CacheKey::Activity => f.write_str("activity"),
        }
    }
}
