// Plain-text rendering of the chat for the terminal front end.

use crate::api::Source;
use crate::app_state::{ChatSnapshot, SubmitError};
use crate::constants::{EMPTY_TRANSCRIPT_MESSAGE, LOADING_MESSAGE};
use crate::events::ChatEvent;
use crate::transcript::Exchange;

pub const HUMAN_LABEL: &str = "Você";
pub const AI_LABEL: &str = "GravidAI";

/// What the terminal should do with a rendered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Permanent line of the transcript.
    Line(String),
    /// Transient status that overwrites the previous one.
    Status(String),
    /// Erase the current status.
    ClearStatus,
}

pub fn render_exchange(exchange: &Exchange) -> String {
    let mut out = format!(
        "[{}] {}: {}\n[{}] {}: {}",
        exchange.asked_at, HUMAN_LABEL, exchange.human, exchange.asked_at, AI_LABEL, exchange.ai
    );
    if !exchange.sources.is_empty() {
        out.push('\n');
        out.push_str(&render_sources(&exchange.sources));
    }
    out
}

pub fn render_sources(sources: &[Source]) -> String {
    sources
        .iter()
        .map(|s| format!("    Fonte: {} (p. {})", s.source, s.page))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_transcript(snapshot: &ChatSnapshot) -> String {
    if snapshot.exchanges.is_empty() {
        return EMPTY_TRANSCRIPT_MESSAGE.to_string();
    }
    snapshot
        .exchanges
        .iter()
        .map(render_exchange)
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_event(event: &ChatEvent) -> Option<Output> {
    match event {
        // The question is already on screen where it was typed.
        ChatEvent::Submitted { .. } => None,
        ChatEvent::Loading { active: true } => Some(Output::Status(LOADING_MESSAGE.to_string())),
        ChatEvent::Loading { active: false } => Some(Output::ClearStatus),
        ChatEvent::Countdown { remaining } if *remaining > 0 => {
            Some(Output::Status(format!("{} {}s", LOADING_MESSAGE, remaining)))
        }
        ChatEvent::Countdown { .. } => None,
        ChatEvent::Answered { exchange } => Some(render_settled(exchange)),
        ChatEvent::Failed { error, .. } => Some(Output::Line(format!("[!] {}", error))),
        ChatEvent::Rejected { reason } => match reason {
            SubmitError::Blank => None,
            SubmitError::Busy => Some(Output::Line(
                "[!] Aguarde a resposta anterior antes de perguntar novamente.".to_string(),
            )),
        },
    }
}

/// Line for an exchange that is no longer pending.
pub fn render_settled(exchange: &Exchange) -> Output {
    if exchange.failed {
        Output::Line(format!("[!] {}", exchange.ai))
    } else {
        Output::Line(answer_line(exchange))
    }
}

fn answer_line(exchange: &Exchange) -> String {
    let mut line = format!("{}: {}", AI_LABEL, exchange.ai);
    if !exchange.sources.is_empty() {
        line.push('\n');
        line.push_str(&render_sources(&exchange.sources));
    }
    line
}
