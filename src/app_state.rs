use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{ApiError, AskResponse};
use crate::constants::REQUEST_ERROR_MESSAGE;
use crate::countdown::{Countdown, Tick};
use crate::transcript::{Exchange, Transcript, TranscriptError};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitError {
    #[error("question is empty")]
    Blank,
    #[error("still waiting for the previous answer")]
    Busy,
}

/// A question accepted by `begin_submit`, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub question: String,
}

/// Chat state for one session: the transcript plus the transient
/// submission flags. All transitions are synchronous; the session loop
/// performs the request between `begin_submit` and `resolve`.
#[derive(Debug, Clone)]
pub struct ChatState {
    pub input: String,
    pub loading: bool,
    pub countdown: Countdown,
    pub error: Option<String>,
    pub transcript: Transcript,
}

/// Read-only view handed to render layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSnapshot {
    pub input: String,
    pub loading: bool,
    pub countdown: u32,
    pub error: Option<String>,
    pub exchanges: Vec<Exchange>,
}

impl ChatState {
    pub fn new(countdown_start: u32) -> Self {
        Self {
            input: String::new(),
            loading: false,
            countdown: Countdown::new(countdown_start),
            error: None,
            transcript: Transcript::new(),
        }
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Accept the current input as a question: append a pending exchange,
    /// clear the input, raise `loading` and restart the countdown.
    pub fn begin_submit(&mut self) -> Result<Submission, SubmitError> {
        let question = self.input.trim().to_string();
        if question.is_empty() {
            debug!("Ignoring blank submission");
            return Err(SubmitError::Blank);
        }
        if let Err(TranscriptError::AlreadyPending) =
            self.transcript.append_pending(question.clone())
        {
            debug!("Rejecting submission while an answer is pending");
            return Err(SubmitError::Busy);
        }

        self.input.clear();
        self.loading = true;
        self.error = None;
        self.countdown.restart();
        Ok(Submission { question })
    }

    /// `set_input` followed by `begin_submit`.
    pub fn submit_text(&mut self, text: impl Into<String>) -> Result<Submission, SubmitError> {
        self.set_input(text);
        self.begin_submit()
    }

    /// Advance the countdown by one period. Expiry drops `loading` but leaves
    /// the pending exchange alone.
    pub fn tick(&mut self) -> Tick {
        let tick = self.countdown.tick();
        if tick == Tick::Expired {
            self.loading = false;
        }
        tick
    }

    /// Settle the pending exchange with the request outcome.
    pub fn resolve(
        &mut self,
        outcome: Result<AskResponse, ApiError>,
    ) -> Result<Exchange, TranscriptError> {
        self.loading = false;
        self.countdown.stop();
        let exchange = match outcome {
            Ok(response) => self
                .transcript
                .resolve_pending_with_sources(response.answer, response.source)?,
            Err(e) => {
                warn!("Question failed: {}", e);
                self.error = Some(REQUEST_ERROR_MESSAGE.to_string());
                self.transcript.resolve_pending_with_error(REQUEST_ERROR_MESSAGE)?
            }
        };
        Ok(exchange.clone())
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            input: self.input.clone(),
            loading: self.loading,
            countdown: self.countdown.remaining,
            error: self.error.clone(),
            exchanges: self.transcript.exchanges().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn answer(text: &str) -> AskResponse {
        serde_json::from_value(serde_json::json!({ "answer": text })).unwrap()
    }

    fn server_error() -> ApiError {
        ApiError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "boom".to_string(),
        }
    }

    #[test]
    fn test_blank_submission_is_noop() {
        let mut state = ChatState::new(20);
        for blank in ["", "   ", "\n\t  "] {
            assert_eq!(state.submit_text(blank).unwrap_err(), SubmitError::Blank);
        }
        assert!(state.transcript.is_empty());
        assert!(!state.loading);
        assert!(!state.countdown.is_running());
    }

    #[test]
    fn test_submit_then_resolve() {
        let mut state = ChatState::new(20);
        let submission = state.submit_text("When can I feel the baby move?").unwrap();

        assert_eq!(submission.question, "When can I feel the baby move?");
        assert_eq!(state.transcript.len(), 1);
        assert!(state.transcript.pending().is_some());
        assert!(state.input.is_empty());
        assert!(state.loading);
        assert!(state.countdown.is_running());

        let exchange = state.resolve(Ok(answer("Between 16 and 25 weeks."))).unwrap();
        assert_eq!(exchange.human, "When can I feel the baby move?");
        assert_eq!(exchange.ai, "Between 16 and 25 weeks.");
        assert_eq!(state.transcript.len(), 1);
        assert_eq!(state.transcript.pending_count(), 0);
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert!(state.input.is_empty());
    }

    #[test]
    fn test_question_is_trimmed() {
        let mut state = ChatState::new(20);
        let submission = state.submit_text("  Posso correr?\n").unwrap();
        assert_eq!(submission.question, "Posso correr?");
        assert_eq!(state.transcript.last().unwrap().human, "Posso correr?");
    }

    #[test]
    fn test_failure_resolves_with_error_message() {
        let mut state = ChatState::new(20);
        state.submit_text("question").unwrap();
        let exchange = state.resolve(Err(server_error())).unwrap();

        assert_eq!(exchange.ai, REQUEST_ERROR_MESSAGE);
        assert!(exchange.failed);
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some(REQUEST_ERROR_MESSAGE));
        assert!(!state.countdown.is_running());
    }

    #[test]
    fn test_busy_while_pending_keeps_input() {
        let mut state = ChatState::new(20);
        state.submit_text("first").unwrap();

        assert_eq!(state.submit_text("second").unwrap_err(), SubmitError::Busy);
        assert_eq!(state.input, "second");
        assert_eq!(state.transcript.len(), 1);
        assert_eq!(state.transcript.pending_count(), 1);
    }

    #[test]
    fn test_countdown_expiry_drops_loading_only() {
        let mut state = ChatState::new(2);
        state.submit_text("question").unwrap();

        assert_eq!(state.tick(), Tick::Running(1));
        assert!(state.loading);
        assert_eq!(state.tick(), Tick::Expired);
        assert!(!state.loading);
        assert!(state.transcript.pending().is_some());

        // Still busy even though the indicator is gone
        assert_eq!(state.submit_text("again").unwrap_err(), SubmitError::Busy);

        let exchange = state.resolve(Ok(answer("late answer"))).unwrap();
        assert_eq!(exchange.ai, "late answer");
        assert!(!state.loading);
    }

    #[test]
    fn test_new_submission_resets_error_and_countdown() {
        let mut state = ChatState::new(3);
        state.submit_text("first").unwrap();
        state.tick();
        state.resolve(Err(server_error())).unwrap();
        assert!(state.error.is_some());

        state.submit_text("second").unwrap();
        assert!(state.error.is_none());
        assert_eq!(state.countdown.remaining, 3);
    }

    #[test]
    fn test_resolve_without_submission_fails() {
        let mut state = ChatState::new(20);
        assert_eq!(
            state.resolve(Ok(answer("orphan"))).unwrap_err(),
            TranscriptError::NoPending
        );
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut state = ChatState::new(20);
        state.submit_text("q").unwrap();
        let snapshot = state.snapshot();
        assert!(snapshot.loading);
        assert_eq!(snapshot.countdown, 20);
        assert_eq!(snapshot.exchanges.len(), 1);
        assert!(snapshot.exchanges[0].pending);
    }
}
