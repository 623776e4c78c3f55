//! JSON text frames exchanged over the hub websocket.
//!
//! Every frame is an object with a `type` discriminator:
//!
//! ```text
//! {"type":"identification","body":"doorclient","secret":S}
//! {"type":"identification","body":"webclient","user":U,"token":T}
//! {"type":"unlock","body":user,"doornum":N[,"msgid":ID,"secret":S]}
//! {"type":"ack","msgid":ID,"final":bool,"body":text}
//! {"type":"broadcast","body":text}
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Role a connection claims in its identification frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientRole {
    /// The on-site controller.
    Doorclient,
    /// A browser session acting for a logged-in user.
    Webclient,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    Identification {
        body: ClientRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        secret: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    Unlock {
        /// Requesting user.
        body: String,
        #[serde(default, deserialize_with = "deserialize_door_number")]
        doornum: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        msgid: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        secret: Option<String>,
    },
    Ack {
        msgid: String,
        #[serde(rename = "final", default)]
        is_final: bool,
        #[serde(default)]
        body: String,
    },
    Broadcast {
        body: String,
    },
}

impl WireMessage {
    pub fn doorclient_identification(secret: impl Into<String>) -> Self {
        Self::Identification {
            body: ClientRole::Doorclient,
            secret: Some(secret.into()),
            user: None,
            token: None,
        }
    }

    pub fn webclient_identification(user: impl Into<String>, token: impl Into<String>) -> Self {
        Self::Identification {
            body: ClientRole::Webclient,
            secret: None,
            user: Some(user.into()),
            token: Some(token.into()),
        }
    }

    /// Unlock request as sent by a webclient (no msgid, no secret).
    pub fn unlock_request(user: impl Into<String>, doornum: usize) -> Self {
        Self::Unlock {
            body: user.into(),
            doornum,
            msgid: None,
            secret: None,
        }
    }

    pub fn ack(msgid: impl Into<String>, is_final: bool, body: impl Into<String>) -> Self {
        Self::Ack {
            msgid: msgid.into(),
            is_final,
            body: body.into(),
        }
    }

    pub fn broadcast(body: impl Into<String>) -> Self {
        Self::Broadcast { body: body.into() }
    }

    pub fn parse(text: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }
}

// Browsers send the door number either as a JSON number or as a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum DoorNumberRepr {
    Number(usize),
    Text(String),
}

fn deserialize_door_number<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    match DoorNumberRepr::deserialize(deserializer)? {
        DoorNumberRepr::Number(n) => Ok(n),
        DoorNumberRepr::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}
