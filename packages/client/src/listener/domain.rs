//! Pure decisions about frames received from the hub.

use doorbridge_shared::wire::WireMessage;

/// What the controller should do with one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubInstruction {
    Unlock {
        requester: String,
        door: usize,
        msgid: Option<String>,
    },
    Ignore(&'static str),
}

/// Interpret an inbound text frame.
///
/// Only `unlock` frames carrying our own secret are acted on.
pub fn interpret_frame(text: &str, secret: &str) -> HubInstruction {
    let Ok(message) = WireMessage::parse(text) else {
        return HubInstruction::Ignore("malformed frame");
    };
    match message {
        WireMessage::Unlock {
            body,
            doornum,
            msgid,
            secret: provided,
        } => {
            if provided.as_deref() != Some(secret) {
                return HubInstruction::Ignore("secret mismatch");
            }
            HubInstruction::Unlock {
                requester: body,
                door: doornum,
                msgid,
            }
        }
        _ => HubInstruction::Ignore("not an unlock instruction"),
    }
}
