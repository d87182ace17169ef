//! Ask/answer exchange between a running workflow and its consumer.
//!
//! A workflow can pause on a question only the human at the UI can
//! answer. The asker registers the question here and awaits a oneshot;
//! the consumer's answer message resolves it. Each ask kind is a
//! variant, so delivering an answer is one exhaustive match and adding
//! a new kind is a compile-time-checked change.

use std::collections::HashMap;

use tokio::sync::{oneshot, Mutex};

/// An unanswered question, holding the channel back to the asker.
pub enum PendingAsk {
    Boolean(oneshot::Sender<bool>),
    Text(oneshot::Sender<String>),
}

impl PendingAsk {
    fn kind(&self) -> &'static str {
        match self {
            PendingAsk::Boolean(_) => "boolean",
            PendingAsk::Text(_) => "text",
        }
    }
}

/// Why an answer could not be delivered.
#[derive(Debug, thiserror::Error)]
pub enum AskError {
    /// No question with this id is waiting. Either it was already
    /// answered or the id is stale.
    #[error("no pending ask with id `{0}`")]
    UnknownAsk(String),

    /// The answer's type does not match the question's. The ask stays
    /// registered so the right answer can still arrive.
    #[error("ask `{id}` expects a {expected} answer")]
    WrongKind { id: String, expected: &'static str },

    /// The asker stopped waiting before the answer arrived.
    #[error("asker for `{0}` is gone")]
    Abandoned(String),
}

/// Registry of questions awaiting consumer answers.
pub struct AskRegistry {
    pending: Mutex<HashMap<String, PendingAsk>>,
}

impl AskRegistry {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register a yes/no question.
    ///
    /// Returns the generated ask id (to embed in the outbound message)
    /// and the receiver the asker awaits.
    pub async fn ask_boolean(&self) -> (String, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        let ask_id = uuid::Uuid::new_v4().to_string();
        self.pending
            .lock()
            .await
            .insert(ask_id.clone(), PendingAsk::Boolean(tx));
        (ask_id, rx)
    }

    /// Register a free-text question.
    pub async fn ask_text(&self) -> (String, oneshot::Receiver<String>) {
        let (tx, rx) = oneshot::channel();
        let ask_id = uuid::Uuid::new_v4().to_string();
        self.pending
            .lock()
            .await
            .insert(ask_id.clone(), PendingAsk::Text(tx));
        (ask_id, rx)
    }

    /// Deliver a yes/no answer.
    pub async fn answer_boolean(&self, ask_id: &str, value: bool) -> Result<(), AskError> {
        let mut pending = self.pending.lock().await;
        match pending.remove(ask_id) {
            None => Err(AskError::UnknownAsk(ask_id.to_owned())),
            Some(PendingAsk::Boolean(tx)) => tx
                .send(value)
                .map_err(|_| AskError::Abandoned(ask_id.to_owned())),
            Some(other) => {
                let expected = other.kind();
                pending.insert(ask_id.to_owned(), other);
                Err(AskError::WrongKind {
                    id: ask_id.to_owned(),
                    expected,
                })
            }
        }
    }

    /// Deliver a free-text answer.
    pub async fn answer_text(&self, ask_id: &str, value: String) -> Result<(), AskError> {
        let mut pending = self.pending.lock().await;
        match pending.remove(ask_id) {
            None => Err(AskError::UnknownAsk(ask_id.to_owned())),
            Some(PendingAsk::Text(tx)) => tx
                .send(value)
                .map_err(|_| AskError::Abandoned(ask_id.to_owned())),
            Some(other) => {
                let expected = other.kind();
                pending.insert(ask_id.to_owned(), other);
                Err(AskError::WrongKind {
                    id: ask_id.to_owned(),
                    expected,
                })
            }
        }
    }

    /// Drop a question whose asker gave up waiting.
    pub async fn forget(&self, ask_id: &str) {
        self.pending.lock().await.remove(ask_id);
    }

    /// Number of unanswered questions.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

impl Default for AskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
