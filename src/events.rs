use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::app_state::{ChatSnapshot, SubmitError};
use crate::transcript::Exchange;

/// Published by a session to every render layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A question was accepted and its pending exchange appended.
    Submitted { exchange: Exchange },
    /// A submission was refused; the transcript is unchanged.
    Rejected { reason: SubmitError },
    /// The loading indicator turned on or off.
    Loading { active: bool },
    Countdown { remaining: u32 },
    Answered { exchange: Exchange },
    Failed { exchange: Exchange, error: String },
}

impl ChatEvent {
    /// True for the events that settle a pending exchange.
    pub fn is_resolution(&self) -> bool {
        matches!(self, ChatEvent::Answered { .. } | ChatEvent::Failed { .. })
    }
}

/// Inbound requests to a session loop.
#[derive(Debug)]
pub enum Command {
    /// Replies with the transcript position of the accepted exchange.
    Ask {
        question: String,
        reply: oneshot::Sender<Result<usize, SubmitError>>,
    },
    Snapshot(oneshot::Sender<ChatSnapshot>),
}

/// Messages accepted from WebSocket clients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ask { question: String },
    Snapshot,
}
