use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::{ApiError, AskResponse, QuestionApi};
use crate::app_state::{ChatSnapshot, ChatState, SubmitError};
use crate::config::ChatConfig;
use crate::countdown::Tick;
use crate::events::{ChatEvent, Command};
use crate::transcript::Exchange;

const EVENT_CAPACITY: usize = 64;
const COMMAND_CAPACITY: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Rejected(#[from] SubmitError),
    #[error("chat session has stopped")]
    Closed,
}

type Outcome = Result<AskResponse, ApiError>;

/// Event loop owning one chat. It reacts to three sources: user commands,
/// the answer of the request in flight, and the countdown ticker.
pub struct Session {
    state: ChatState,
    api: Arc<dyn QuestionApi>,
    tick: Duration,
    ticker: Option<Interval>,
    events: broadcast::Sender<ChatEvent>,
}

/// Cloneable front door to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<ChatEvent>,
}

/// Start a session loop on the current runtime.
pub fn spawn(config: &ChatConfig, api: Arc<dyn QuestionApi>) -> (SessionHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

    let session = Session {
        state: ChatState::new(config.countdown_start),
        api,
        tick: config.tick,
        ticker: None,
        events: event_tx.clone(),
    };
    let task = tokio::spawn(session.run(command_rx));

    let handle = SessionHandle {
        commands: command_tx,
        events: event_tx,
    };
    (handle, task)
}

impl Session {
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        info!("Chat session started");
        let (outcome_tx, mut outcomes) = mpsc::channel::<Outcome>(1);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Ask { question, reply }) => {
                        let result = self.handle_ask(question, &outcome_tx);
                        // Caller may not wait for the verdict.
                        let _ = reply.send(result);
                    }
                    Some(Command::Snapshot(reply)) => {
                        let _ = reply.send(self.state.snapshot());
                    }
                    None => break,
                },
                Some(outcome) = outcomes.recv() => self.handle_outcome(outcome),
                _ = next_tick(&mut self.ticker) => self.handle_tick(),
            }
        }

        // An answer still in flight is dropped with the outcome receiver.
        info!("Chat session stopped");
    }

    fn handle_ask(
        &mut self,
        question: String,
        outcome_tx: &mpsc::Sender<Outcome>,
    ) -> Result<usize, SubmitError> {
        let submission = match self.state.submit_text(question) {
            Ok(submission) => submission,
            Err(reason) => {
                self.emit(ChatEvent::Rejected { reason });
                return Err(reason);
            }
        };

        if let Some(exchange) = self.state.transcript.pending() {
            self.emit(ChatEvent::Submitted {
                exchange: exchange.clone(),
            });
        }
        self.emit(ChatEvent::Loading { active: true });
        self.emit(ChatEvent::Countdown {
            remaining: self.state.countdown.remaining,
        });

        let mut ticker = interval_at(Instant::now() + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);

        info!(question = %submission.question, "Submitting question");
        let api = Arc::clone(&self.api);
        let outcome_tx = outcome_tx.clone();
        tokio::spawn(async move {
            let outcome = api.ask(&submission.question).await;
            if outcome_tx.send(outcome).await.is_err() {
                debug!("Session closed before the answer arrived, discarding it");
            }
        });
        Ok(self.state.transcript.len() - 1)
    }

    fn handle_outcome(&mut self, outcome: Outcome) {
        self.ticker = None;
        let was_loading = self.state.loading;

        match self.state.resolve(outcome) {
            Ok(exchange) if exchange.failed => {
                let error = self.state.error.clone().unwrap_or_else(|| exchange.ai.clone());
                self.emit(ChatEvent::Failed { exchange, error });
            }
            Ok(exchange) => self.emit(ChatEvent::Answered { exchange }),
            Err(e) => {
                warn!("Discarding answer: {}", e);
                return;
            }
        }

        // Countdown expiry may already have switched the indicator off.
        if was_loading {
            self.emit(ChatEvent::Loading { active: false });
        }
    }

    fn handle_tick(&mut self) {
        match self.state.tick() {
            Tick::Running(remaining) => self.emit(ChatEvent::Countdown { remaining }),
            Tick::Expired => {
                debug!("Countdown reached zero before the answer");
                self.ticker = None;
                self.emit(ChatEvent::Countdown { remaining: 0 });
                self.emit(ChatEvent::Loading { active: false });
            }
            Tick::Idle => self.ticker = None,
        }
    }

    fn emit(&self, event: ChatEvent) {
        // No subscribers is fine; nobody is rendering.
        let _ = self.events.send(event);
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    /// Submit a question. Returns once the session accepted or rejected it,
    /// not when the answer arrives.
    pub async fn ask(&self, question: impl Into<String>) -> Result<(), SessionError> {
        self.submit(question).await.map(|_| ())
    }

    /// Submit a question and wait for the exchange to settle.
    pub async fn ask_and_wait(
        &self,
        question: impl Into<String>,
    ) -> Result<Exchange, SessionError> {
        let mut events = self.subscribe();
        let index = self.submit(question).await?;
        self.wait_settled(index, &mut events).await
    }

    async fn submit(&self, question: impl Into<String>) -> Result<usize, SessionError> {
        let (reply, verdict) = oneshot::channel();
        self.commands
            .send(Command::Ask {
                question: question.into(),
                reply,
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(verdict.await.map_err(|_| SessionError::Closed)??)
    }

    async fn wait_settled(
        &self,
        index: usize,
        events: &mut broadcast::Receiver<ChatEvent>,
    ) -> Result<Exchange, SessionError> {
        loop {
            match events.recv().await {
                Ok(ChatEvent::Answered { exchange }) | Ok(ChatEvent::Failed { exchange, .. }) => {
                    return Ok(exchange)
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // The resolution may be among the skipped events.
                    debug!(skipped, "Event subscriber lagged, checking the transcript");
                    let snapshot = self.snapshot().await?;
                    if let Some(exchange) = snapshot.exchanges.get(index).filter(|e| !e.pending) {
                        return Ok(exchange.clone());
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return Err(SessionError::Closed),
            }
        }
    }

    pub async fn snapshot(&self) -> Result<ChatSnapshot, SessionError> {
        let (reply, snapshot) = oneshot::channel();
        self.commands
            .send(Command::Snapshot(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        snapshot.await.map_err(|_| SessionError::Closed)
    }
}
