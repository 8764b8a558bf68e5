use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::error::RequestError;

/// A validated downstream request.
///
/// Clients send `{"action": ..., "channel": ..., "datum": ...}`; decoding goes
/// through `RawRequest` so that a parse failure, an unknown action and a
/// missing field each produce their own `RequestError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Relay `datum` to the other clients on `channel`. Never reaches upstream.
    Message { channel: String, datum: String },
    Subscribe { channel: String },
    Unsubscribe { channel: String },
}

#[derive(Debug, Deserialize)]
struct RawRequest {
    action: Option<String>,
    channel: Option<String>,
    datum: Option<String>,
}

impl Request {
    pub fn decode(bytes: &[u8]) -> Result<Self, RequestError> {
        // Only the object form; a derived `Deserialize` would also take `[action, channel]`.
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        if !value.is_object() {
            return Err(RequestError::NotAnObject);
        }
        let raw: RawRequest = serde_json::from_value(value)?;
        Self::validate(raw)
    }

    fn validate(raw: RawRequest) -> Result<Self, RequestError> {
        let RawRequest {
            action,
            channel,
            datum,
        } = raw;
        let channel = channel.filter(|c| !c.is_empty());
        let invalid = || RequestError::InvalidAction(action.clone());

        match action.as_deref() {
            Some("message") => {
                let datum = datum
                    .filter(|d| !d.is_empty())
                    .ok_or(RequestError::MissingContent)?;
                let channel = channel.ok_or_else(invalid)?;
                Ok(Request::Message { channel, datum })
            }
            Some("subscribe") => Ok(Request::Subscribe {
                channel: channel.ok_or_else(invalid)?,
            }),
            Some("unsubscribe") => Ok(Request::Unsubscribe {
                channel: channel.ok_or_else(invalid)?,
            }),
            _ => Err(invalid()),
        }
    }
}

/// The frame fanned out to subscribers for a relayed `message` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub action: String,
    pub channel: String,
    pub datum: String,
}

impl Envelope {
    pub fn message(channel: String, datum: String) -> Self {
        Self {
            action: "message".to_string(),
            channel,
            datum,
        }
    }
}

/// Plain-text acknowledgements, sent only to the connection that caused them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Welcome,
    Subscribed(String),
    Unsubscribed(String),
    MissingContent,
    InvalidAction,
    ProcessingError,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Welcome => f.write_str("Welcome to the WebSocket server!"),
            Reply::Subscribed(channel) => write!(f, "Subscribed to channel: {channel}"),
            Reply::Unsubscribed(channel) => write!(f, "Unsubscribed from channel: {channel}"),
            Reply::MissingContent => f.write_str("Missing message content"),
            Reply::InvalidAction => f.write_str("Invalid action"),
            Reply::ProcessingError => f.write_str("Error processing your request"),
        }
    }
}

impl RequestError {
    pub fn reply(&self) -> Reply {
        match self {
            RequestError::Malformed(_) | RequestError::NotAnObject => Reply::ProcessingError,
            RequestError::InvalidAction(_) => Reply::InvalidAction,
            RequestError::MissingContent => Reply::MissingContent,
        }
    }
}
