//! The tagged payload variants carried inside a frame.
//!
//! Server -> client: `Result`, `Board`, `Prompt`, `SMessage`, `Waiting`,
//! `Shutdown`, `Chat`. Client -> server: `Command`, `Chat`.

use serde::{Deserialize, Serialize};

/// Numeric wire discriminator for each payload kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Command = 0,
    Chat = 1,
    Result = 2,
    Board = 3,
    Prompt = 4,
    SMessage = 5,
    Waiting = 6,
    Shutdown = 7,
}

impl TryFrom<u16> for MessageKind {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageKind::Command),
            1 => Ok(MessageKind::Chat),
            2 => Ok(MessageKind::Result),
            3 => Ok(MessageKind::Board),
            4 => Ok(MessageKind::Prompt),
            5 => Ok(MessageKind::SMessage),
            6 => Ok(MessageKind::Waiting),
            7 => Ok(MessageKind::Shutdown),
            other => Err(format!("unknown message kind {other}")),
        }
    }
}

impl From<MessageKind> for u16 {
    fn from(kind: MessageKind) -> Self {
        kind as u16
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Payload {
    #[serde(rename = "command")]
    Command { coord: String },
    #[serde(rename = "chat")]
    Chat { msg: String },
    #[serde(rename = "result")]
    Result { msg: String },
    #[serde(rename = "board")]
    Board {
        ships: bool,
        data: String,
    },
    #[serde(rename = "prompt")]
    Prompt {
        msg: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    #[serde(rename = "s_msg")]
    SMessage { msg: String },
    #[serde(rename = "waiting")]
    Waiting { msg: String },
    #[serde(rename = "shutdown")]
    Shutdown { msg: String },
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::Command { .. } => MessageKind::Command,
            Payload::Chat { .. } => MessageKind::Chat,
            Payload::Result { .. } => MessageKind::Result,
            Payload::Board { .. } => MessageKind::Board,
            Payload::Prompt { .. } => MessageKind::Prompt,
            Payload::SMessage { .. } => MessageKind::SMessage,
            Payload::Waiting { .. } => MessageKind::Waiting,
            Payload::Shutdown { .. } => MessageKind::Shutdown,
        }
    }

    pub fn s_msg(msg: impl Into<String>) -> Self {
        Payload::SMessage { msg: msg.into() }
    }

    pub fn prompt(msg: impl Into<String>) -> Self {
        Payload::Prompt {
            msg: msg.into(),
            timeout: None,
        }
    }

    pub fn prompt_with_timeout(msg: impl Into<String>, timeout_secs: u64) -> Self {
        Payload::Prompt {
            msg: msg.into(),
            timeout: Some(timeout_secs),
        }
    }

    pub fn waiting(msg: impl Into<String>) -> Self {
        Payload::Waiting { msg: msg.into() }
    }

    pub fn result(msg: impl Into<String>) -> Self {
        Payload::Result { msg: msg.into() }
    }

    pub fn shutdown(msg: impl Into<String>) -> Self {
        Payload::Shutdown { msg: msg.into() }
    }

    pub fn chat(msg: impl Into<String>) -> Self {
        Payload::Chat { msg: msg.into() }
    }

    pub fn command(coord: impl Into<String>) -> Self {
        Payload::Command { coord: coord.into() }
    }

    pub fn board(data: impl Into<String>, ships: bool) -> Self {
        Payload::Board {
            ships,
            data: data.into(),
        }
    }
}

/// The plaintext JSON envelope encrypted inside a frame: `{"data": .., "seq": ..}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Envelope {
    pub data: Payload,
    pub seq: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_u16() {
        for kind in [
            MessageKind::Command,
            MessageKind::Chat,
            MessageKind::Result,
            MessageKind::Board,
            MessageKind::Prompt,
            MessageKind::SMessage,
            MessageKind::Waiting,
            MessageKind::Shutdown,
        ] {
            let raw: u16 = kind.into();
            assert_eq!(MessageKind::try_from(raw).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(MessageKind::try_from(99).is_err());
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let p = Payload::chat("hello");
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["type"], "chat");
        assert_eq!(v["msg"], "hello");
    }

    #[test]
    fn prompt_without_timeout_omits_field() {
        let p = Payload::prompt("go");
        let v = serde_json::to_value(&p).unwrap();
        assert!(v.get("timeout").is_none());
    }
}
