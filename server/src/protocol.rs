use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::room::{RoomCode, VideoState};

/// Display name used for system notices in the chat feed.
pub const SYSTEM_SENDER: &str = "System";

/// Messages sent from client to server.
///
/// The optional `sender` field every client message may carry is not part
/// of any variant; it is read separately by [`decode`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    Create,
    Join {
        /// Absent codes are answered with "room not found" rather than
        /// dropped. Numeric codes are accepted as their decimal text.
        #[serde(default, deserialize_with = "lenient_code")]
        code: Option<RoomCode>,
    },
    LoadVideo {
        code: RoomCode,
        url: String,
    },
    Sync {
        code: RoomCode,
        action: String,
        time: f64,
    },
    Chat {
        code: RoomCode,
        text: String,
    },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    RoomCreated {
        code: RoomCode,
    },
    Error {
        message: String,
    },
    SyncInitial {
        code: RoomCode,
        data: VideoState,
    },
    Chat {
        sender: String,
        text: String,
        #[serde(rename = "isSystem", skip_serializing_if = "is_false")]
        is_system: bool,
    },
    LoadVideo {
        sender: String,
        url: String,
    },
    Sync {
        action: String,
        time: f64,
    },
}

impl Outbound {
    pub fn system(text: impl Into<String>) -> Self {
        Outbound::Chat {
            sender: SYSTEM_SENDER.to_string(),
            text: text.into(),
            is_system: true,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn lenient_code<'de, D>(deserializer: D) -> Result<Option<RoomCode>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawCode {
        Text(String),
        Number(u64),
    }

    Ok(
        Option::<RawCode>::deserialize(deserializer)?.map(|raw| match raw {
            RawCode::Text(text) => RoomCode::from(text),
            RawCode::Number(number) => RoomCode::from(number.to_string()),
        }),
    )
}

/// Any non-empty string, non-zero number or `true` names the connection.
fn display_name(value: &Value) -> Option<String> {
    match value {
        Value::String(name) if !name.is_empty() => Some(name.clone()),
        Value::Number(number) if number.as_f64() != Some(0.0) => Some(number.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// A decoded frame: the display name it announced, if any, and the message
/// itself or the reason it could not be understood.
#[derive(Debug)]
pub struct Envelope {
    pub sender: Option<String>,
    pub message: Result<Inbound, ProtocolError>,
}

/// Decodes one text frame.
///
/// Only unparsable JSON is an outright error. A frame that is valid JSON
/// still yields its `sender` even when the rest of it is unusable.
pub fn decode(text: &str) -> Result<Envelope, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;

    let sender = value.get("sender").and_then(display_name);

    let message = serde_json::from_value(value).map_err(ProtocolError::Malformed);

    Ok(Envelope { sender, message })
}
