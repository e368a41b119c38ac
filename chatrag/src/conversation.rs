//! Conversation state machine for one chat session.
//!
//! A [`Conversation`] owns the message log, the Idle/Pending phase and the
//! last error. At most one request is in flight per conversation; input
//! submitted while one is pending is ignored. Every state change is
//! published on a `tokio::sync::watch` channel so a rendering surface can
//! observe the log without polling.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{RagError, Result};
use crate::pipeline::RagPipeline;

/// Shown when a failure renders as an empty string.
pub const FALLBACK_ERROR_MESSAGE: &str = "An unexpected error occurred.";

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 7;

static MESSAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Something that turns a user message into an answer.
///
/// [`RagPipeline`] is the production implementation; tests substitute
/// scripted responders.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce the assistant's answer to `user_message`.
    async fn respond(&self, user_message: &str) -> Result<String>;
}

#[async_trait]
impl Responder for RagPipeline {
    async fn respond(&self, user_message: &str) -> Result<String> {
        self.run(user_message).await
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Input typed by the user.
    User,
    /// An answer produced by the pipeline.
    Assistant,
    /// A failed request, shown inline in the log.
    Error,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Error => "error",
        };
        f.write_str(name)
    }
}

/// One entry in the conversation log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique within the process; see [`next_message_id`].
    pub id: String,
    /// Who wrote the message.
    pub role: Role,
    /// Message text, already trimmed for user input.
    pub content: String,
    /// When the message was appended.
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a message stamped with the current time and a fresh id.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { id: next_message_id(), role, content: content.into(), timestamp: Utc::now() }
    }
}

/// Generate a message id: millisecond timestamp, random base-36 suffix and
/// a per-process sequence number.
pub fn next_message_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| char::from(ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())]))
        .collect();
    let seq = MESSAGE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{millis}-{suffix}-{seq}")
}

/// Whether a request is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Ready for input.
    #[default]
    Idle,
    /// A request is in flight; further input is ignored.
    Pending,
}

/// Snapshot of a conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    /// Messages in append order.
    pub messages: Vec<ChatMessage>,
    /// Whether a request is in flight.
    pub phase: Phase,
    /// Text of the most recent failure, cleared by the next success.
    pub last_error: Option<String>,
}

impl ConversationState {
    /// Whether a request is pending.
    pub fn is_busy(&self) -> bool {
        self.phase == Phase::Pending
    }
}

/// How a submitted turn resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// An assistant message was appended.
    Answered(String),
    /// An error message was appended; holds its text.
    Failed(String),
    /// The conversation was cleared while the request was in flight, so the
    /// result was dropped.
    Discarded,
}

/// Result of [`Conversation::submit`].
#[derive(Debug)]
pub enum Submission {
    /// The input was blank; nothing changed.
    Empty,
    /// A request is already pending; the input was ignored.
    Busy,
    /// The user message was appended and a request started.
    Started(PendingTurn),
}

impl Submission {
    /// Whether a request was started.
    pub fn is_started(&self) -> bool {
        matches!(self, Submission::Started(_))
    }

    /// Wait for the started request, if any.
    pub async fn wait(self) -> Option<TurnOutcome> {
        match self {
            Submission::Started(turn) => Some(turn.wait().await),
            Submission::Empty | Submission::Busy => None,
        }
    }
}

/// Handle to an in-flight request.
///
/// Dropping it does not cancel the request; the conversation is updated
/// either way.
#[derive(Debug)]
pub struct PendingTurn {
    handle: JoinHandle<TurnOutcome>,
}

impl PendingTurn {
    /// Wait until the request has resolved and the state is updated.
    pub async fn wait(self) -> TurnOutcome {
        self.handle.await.unwrap_or(TurnOutcome::Discarded)
    }
}

struct Shared {
    state: watch::Sender<ConversationState>,
    epoch: AtomicU64,
}

impl Shared {
    /// Record the result of a request started in `epoch` and return to Idle.
    fn finish(&self, epoch: u64, result: Result<String>) -> TurnOutcome {
        let mut outcome = TurnOutcome::Discarded;
        self.state.send_modify(|state| {
            state.phase = Phase::Idle;
            if self.epoch.load(Ordering::SeqCst) != epoch {
                debug!(epoch, "conversation cleared while pending, dropping result");
                return;
            }
            match result {
                Ok(answer) => {
                    state.messages.push(ChatMessage::new(Role::Assistant, answer.clone()));
                    state.last_error = None;
                    outcome = TurnOutcome::Answered(answer);
                }
                Err(e) => {
                    let mut message = e.to_string();
                    if message.trim().is_empty() {
                        message = FALLBACK_ERROR_MESSAGE.to_string();
                    }
                    state.messages.push(ChatMessage::new(Role::Error, message.clone()));
                    state.last_error = Some(message.clone());
                    outcome = TurnOutcome::Failed(message);
                }
            }
        });
        outcome
    }
}

/// A single chat session.
///
/// Cloning yields another handle to the same session.
///
/// # Example
///
/// ```rust,ignore
/// use chatrag::Conversation;
///
/// let conversation = Conversation::new(Arc::new(pipeline));
/// if let Some(outcome) = conversation.submit("What is the capital of France?").wait().await {
///     println!("{outcome:?}");
/// }
/// ```
#[derive(Clone)]
pub struct Conversation {
    shared: Arc<Shared>,
    responder: Arc<dyn Responder>,
}

impl Conversation {
    /// Create an idle conversation with an empty log.
    pub fn new(responder: Arc<dyn Responder>) -> Self {
        let (state, _) = watch::channel(ConversationState::default());
        Self { shared: Arc::new(Shared { state, epoch: AtomicU64::new(0) }), responder }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ConversationState {
        self.shared.state.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.shared.state.subscribe()
    }

    /// Whether a request is pending.
    pub fn is_busy(&self) -> bool {
        self.shared.state.borrow().is_busy()
    }

    /// Submit user input.
    ///
    /// Blank input and input arriving while a request is pending are
    /// ignored. Otherwise the trimmed text is appended as a user message,
    /// the conversation turns Pending and the responder runs on a spawned
    /// task. Must be called from within a tokio runtime.
    pub fn submit(&self, input: &str) -> Submission {
        let text = input.trim();
        if text.is_empty() {
            return Submission::Empty;
        }

        let mut epoch = 0;
        let started = self.shared.state.send_if_modified(|state| {
            if state.is_busy() {
                return false;
            }
            state.messages.push(ChatMessage::new(Role::User, text));
            state.phase = Phase::Pending;
            epoch = self.shared.epoch.load(Ordering::SeqCst);
            true
        });
        if !started {
            debug!("request already pending, ignoring input");
            return Submission::Busy;
        }

        info!(epoch, message_len = text.len(), "submitting chat message");

        let shared = Arc::clone(&self.shared);
        let responder = Arc::clone(&self.responder);
        let message = text.to_string();
        let handle = tokio::spawn(async move {
            // Inner task so a panicking responder still returns us to Idle.
            let result =
                match tokio::spawn(async move { responder.respond(&message).await }).await {
                    Ok(result) => result,
                    Err(e) => Err(RagError::PipelineError(format!("request task failed: {e}"))),
                };
            shared.finish(epoch, result)
        });

        Submission::Started(PendingTurn { handle })
    }

    /// Empty the log and clear the last error.
    ///
    /// The phase is left as is. A request still in flight completes, but
    /// its result is dropped.
    pub fn clear(&self) {
        self.shared.state.send_modify(|state| {
            self.shared.epoch.fetch_add(1, Ordering::SeqCst);
            state.messages.clear();
            state.last_error = None;
        });
        debug!("conversation cleared");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn message_ids_are_unique_and_shaped() {
        let ids: Vec<String> = (0..500).map(|_| next_message_id()).collect();
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());

        let parts: Vec<&str> = ids[0].split('-').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[0].parse::<i64>().is_ok());
        assert_eq!(parts[1].len(), ID_SUFFIX_LEN);
        assert!(parts[1].bytes().all(|b| ID_ALPHABET.contains(&b)));
    }

    #[test]
    fn role_renders_lowercase() {
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(serde_json::to_string(&Role::Error).unwrap(), "\"error\"");
    }

    #[test]
    fn default_state_is_idle_and_empty() {
        let state = ConversationState::default();
        assert!(!state.is_busy());
        assert!(state.messages.is_empty());
        assert!(state.last_error.is_none());
    }
}
