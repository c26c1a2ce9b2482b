use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire envelope exchanged with clients.
///
/// Server-originated messages carry a timestamp and, when room-scoped, the
/// room name. Inbound client messages are `type` + `data` only, so the other
/// fields default on deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(kind: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            room: None,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn for_room(
        kind: impl Into<String>,
        room: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            room: Some(room.into()),
            ..Self::new(kind, data)
        }
    }

    /// Room named inside the payload (`data.room`), as sent by
    /// subscribe/unsubscribe requests.
    pub fn data_room(&self) -> Option<&str> {
        self.data.get("room").and_then(Value::as_str)
    }
}
