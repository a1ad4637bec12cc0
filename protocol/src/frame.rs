use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::TransportError;

/// A single message on the wire: an ordered pair of JSON-object mappings.
/// `header` always carries `content-length`; `content` always carries
/// `"type"`. Frames are the sole unit exchanged between any two processes
/// in this system.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: Map<String, Value>,
    pub content: Map<String, Value>,
}

impl Frame {
    /// Build a `Frame` by serializing `payload` into the content section.
    /// `payload` must serialize to a JSON object (every message type in this
    /// system does, since they are all `#[serde(tag = "type")]` enums or
    /// structs).
    pub fn from_payload<T: Serialize>(payload: &T) -> Result<Self, TransportError> {
        let value = serde_json::to_value(payload)?;
        let content = match value {
            Value::Object(map) => map,
            other => {
                return Err(TransportError::Protocol(format!(
                    "frame payload did not serialize to a JSON object: {}",
                    other
                )))
            }
        };

        Ok(Frame {
            header: Map::new(),
            content,
        })
    }

    /// Deserialize the content section into a typed payload.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        let value = Value::Object(self.content.clone());
        Ok(serde_json::from_value(value)?)
    }

    /// Read `content["type"]` without deserializing the whole payload.
    /// Used by handlers that only need to dispatch on the frame's type
    /// before deciding how (or whether) to fully parse it.
    pub fn peek_type(&self) -> Option<&str> {
        self.content.get("type").and_then(Value::as_str)
    }
}
