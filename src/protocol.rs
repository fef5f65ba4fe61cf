use crate::types::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Greeting carried by the `welcome` envelope
pub const WELCOME_TEXT: &str = "Connected to Tamagotchi!";

/// Inbound client intent, validated from a raw text frame
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Ping,
    GetState,
    Action(PetAction),
    Chat { message: String },
}

/// Reasons a raw frame cannot be turned into a `ClientMessage`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid JSON format")]
    InvalidJson,

    #[error("Invalid message format")]
    NotAnObject,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),
}

impl ProtocolError {
    /// Unknown actions are surfaced to every viewer; everything else stays personal.
    pub fn is_shared(&self) -> bool {
        matches!(self, ProtocolError::UnknownAction(_))
    }
}

impl ClientMessage {
    /// Parse one text frame of the form `{"type": ..., "action"?: ..., "message"?: ...}`
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| {
            tracing::debug!("Rejecting frame that is not JSON: {}", e);
            ProtocolError::InvalidJson
        })?;

        let Value::Object(fields) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        let kind = fields.get("type");
        match kind.and_then(Value::as_str) {
            Some("ping") => Ok(ClientMessage::Ping),
            Some("get_state") => Ok(ClientMessage::GetState),
            Some("action") => {
                let action = fields.get("action");
                match action.and_then(Value::as_str) {
                    Some(name) => name
                        .parse()
                        .map(ClientMessage::Action)
                        .map_err(|UnknownAction(name)| ProtocolError::UnknownAction(name)),
                    None => Err(ProtocolError::UnknownAction(describe(action))),
                }
            }
            Some("chat") => Ok(ClientMessage::Chat {
                message: fields
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            Some(other) => Err(ProtocolError::UnknownType(other.to_string())),
            None => Err(ProtocolError::UnknownType(describe(kind))),
        }
    }
}

/// Render a missing or non-string field for an error message
fn describe(value: Option<&Value>) -> String {
    value.map_or_else(|| "null".to_string(), Value::to_string)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        message: String,
        data: Option<PetState>,
    },
    StateUpdate {
        data: Option<PetState>,
    },
    ActionResult {
        action: String,
        success: bool,
        message: String,
        stat_changes: StatChanges,
        response: String,
    },
    ChatMessage {
        response: String,
        mood: String,
    },
    Pong,
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Wire name of the `type` tag, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::StateUpdate { .. } => "state_update",
            ServerMessage::ActionResult { .. } => "action_result",
            ServerMessage::ChatMessage { .. } => "chat_message",
            ServerMessage::Pong => "pong",
            ServerMessage::Error { .. } => "error",
        }
    }
}

/// A `ServerMessage` stamped with its emission time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub timestamp: String,
    #[serde(flatten)]
    pub message: ServerMessage,
}

impl Envelope {
    pub fn now(message: ServerMessage) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            message,
        }
    }
}

impl From<ServerMessage> for Envelope {
    fn from(message: ServerMessage) -> Self {
        Envelope::now(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_types() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"ping"}"#),
            Ok(ClientMessage::Ping)
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"get_state"}"#),
            Ok(ClientMessage::GetState)
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"action","action":"play"}"#),
            Ok(ClientMessage::Action(PetAction::Play))
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"chat","message":"hi"}"#),
            Ok(ClientMessage::Chat {
                message: "hi".to_string()
            })
        );
    }

    #[test]
    fn test_chat_without_message_is_empty() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"chat"}"#),
            Ok(ClientMessage::Chat {
                message: String::new()
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            ClientMessage::parse("not json"),
            Err(ProtocolError::InvalidJson)
        );
        assert_eq!(
            ClientMessage::parse("[1, 2]"),
            Err(ProtocolError::NotAnObject)
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"dance"}"#),
            Err(ProtocolError::UnknownType("dance".to_string()))
        );
        assert_eq!(
            ClientMessage::parse(r#"{"hello":"world"}"#),
            Err(ProtocolError::UnknownType("null".to_string()))
        );

        let err = ClientMessage::parse(r#"{"type":"action","action":"fly"}"#).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownAction("fly".to_string()));
        assert!(err.is_shared());
        assert_eq!(err.to_string(), "Unknown action: fly");

        let err = ClientMessage::parse(r#"{"type":"action"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Unknown action: null");
    }

    #[test]
    fn test_envelope_wire_shape() {
        let envelope = Envelope::now(ServerMessage::ActionResult {
            action: "feed".to_string(),
            success: true,
            message: "Yum".to_string(),
            stat_changes: StatChanges::from([("hunger".to_string(), -25)]),
            response: "Thanks!".to_string(),
        });
        let json: Value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["type"], "action_result");
        assert_eq!(json["action"], "feed");
        assert_eq!(json["stat_changes"]["hunger"], -25);
        assert!(json["timestamp"].as_str().is_some());

        let pong = serde_json::to_value(Envelope::now(ServerMessage::Pong)).unwrap();
        assert_eq!(pong["type"], "pong");
        assert_eq!(pong.as_object().map(|o| o.len()), Some(2));

        let empty = serde_json::to_value(Envelope::now(ServerMessage::StateUpdate { data: None }))
            .unwrap();
        assert!(empty["data"].is_null());
    }
}
