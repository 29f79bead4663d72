use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::Source;
use crate::constants::PENDING_PLACEHOLDER;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("an exchange is already waiting for its answer")]
    AlreadyPending,
    #[error("no exchange is waiting for an answer")]
    NoPending,
}

/// One human question paired with its (possibly pending) answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub human: String,
    pub ai: String,
    pub pending: bool,
    /// Set when the answer is the request error message.
    pub failed: bool,
    pub asked_at: String,
    pub sources: Vec<Source>,
}

impl Exchange {
    fn pending(question: String) -> Self {
        Self {
            human: question,
            ai: PENDING_PLACEHOLDER.to_string(),
            pending: true,
            failed: false,
            asked_at: Local::now().format("%H:%M:%S").to_string(),
            sources: Vec::new(),
        }
    }
}

/// Append-only list of exchanges. Only the last entry is ever mutated, and
/// only while it is pending.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    exchanges: Vec<Exchange>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_pending(
        &mut self,
        question: impl Into<String>,
    ) -> Result<&Exchange, TranscriptError> {
        if self.pending().is_some() {
            return Err(TranscriptError::AlreadyPending);
        }
        self.exchanges.push(Exchange::pending(question.into()));
        Ok(&self.exchanges[self.exchanges.len() - 1])
    }

    pub fn resolve_pending(
        &mut self,
        answer: impl Into<String>,
    ) -> Result<&Exchange, TranscriptError> {
        self.resolve_pending_with_sources(answer, Vec::new())
    }

    pub fn resolve_pending_with_sources(
        &mut self,
        answer: impl Into<String>,
        sources: Vec<Source>,
    ) -> Result<&Exchange, TranscriptError> {
        let exchange = self.pending_mut()?;
        exchange.ai = answer.into();
        exchange.sources = sources;
        exchange.pending = false;
        Ok(exchange)
    }

    pub fn resolve_pending_with_error(
        &mut self,
        message: impl Into<String>,
    ) -> Result<&Exchange, TranscriptError> {
        let exchange = self.pending_mut()?;
        exchange.ai = message.into();
        exchange.pending = false;
        exchange.failed = true;
        Ok(exchange)
    }

    /// The exchange currently waiting for an answer, if any.
    pub fn pending(&self) -> Option<&Exchange> {
        self.exchanges.last().filter(|e| e.pending)
    }

    pub fn pending_count(&self) -> usize {
        self.exchanges.iter().filter(|e| e.pending).count()
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn last(&self) -> Option<&Exchange> {
        self.exchanges.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter()
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    fn pending_mut(&mut self) -> Result<&mut Exchange, TranscriptError> {
        self.exchanges
            .last_mut()
            .filter(|e| e.pending)
            .ok_or(TranscriptError::NoPending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_pending_uses_placeholder() {
        let mut transcript = Transcript::new();
        let exchange = transcript.append_pending("Posso tomar café?").unwrap();

        assert_eq!(exchange.human, "Posso tomar café?");
        assert_eq!(exchange.ai, "...");
        assert!(exchange.pending);
        assert!(!exchange.failed);
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.pending_count(), 1);
    }

    #[test]
    fn test_second_pending_is_rejected() {
        let mut transcript = Transcript::new();
        transcript.append_pending("first").unwrap();

        assert_eq!(
            transcript.append_pending("second").unwrap_err(),
            TranscriptError::AlreadyPending
        );
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.pending_count(), 1);
    }

    #[test]
    fn test_resolve_pending_sets_answer() {
        let mut transcript = Transcript::new();
        transcript.append_pending("question").unwrap();
        transcript.resolve_pending("answer").unwrap();

        let last = transcript.last().unwrap();
        assert_eq!(last.human, "question");
        assert_eq!(last.ai, "answer");
        assert!(!last.pending);
        assert!(transcript.pending().is_none());
    }

    #[test]
    fn test_resolve_with_error_marks_failed() {
        let mut transcript = Transcript::new();
        transcript.append_pending("question").unwrap();
        transcript.resolve_pending_with_error(REQUEST_ERROR).unwrap();

        let last = transcript.last().unwrap();
        assert_eq!(last.ai, REQUEST_ERROR);
        assert!(last.failed);
        assert!(!last.pending);
    }

    #[test]
    fn test_resolve_without_pending_fails() {
        let mut transcript = Transcript::new();
        assert_eq!(transcript.resolve_pending("x").unwrap_err(), TranscriptError::NoPending);

        transcript.append_pending("q").unwrap();
        transcript.resolve_pending("a").unwrap();
        assert_eq!(
            transcript.resolve_pending_with_error("late").unwrap_err(),
            TranscriptError::NoPending
        );
        assert_eq!(transcript.last().unwrap().ai, "a");
    }

    #[test]
    fn test_order_is_preserved_and_earlier_entries_untouched() {
        let mut transcript = Transcript::new();
        for i in 0..3 {
            transcript.append_pending(format!("q{}", i)).unwrap();
            transcript.resolve_pending(format!("a{}", i)).unwrap();
        }

        let humans: Vec<_> = transcript.iter().map(|e| e.human.as_str()).collect();
        assert_eq!(humans, vec!["q0", "q1", "q2"]);
        let answers: Vec<_> = transcript.iter().map(|e| e.ai.as_str()).collect();
        assert_eq!(answers, vec!["a0", "a1", "a2"]);
    }

    #[test]
    fn test_resolve_attaches_sources() {
        let mut transcript = Transcript::new();
        transcript.append_pending("q").unwrap();
        let sources = vec![Source {
            source: "Caderneta da gestante.pdf".to_string(),
            page: 44,
        }];
        let exchange = transcript.resolve_pending_with_sources("a", sources.clone()).unwrap();
        assert_eq!(exchange.sources, sources);
    }

    const REQUEST_ERROR: &str = crate::constants::REQUEST_ERROR_MESSAGE;
}
