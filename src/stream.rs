//! Stream client contract.
//!
//! A client opens one request per [`StreamEmitter`] and reports progress
//! through it: any number of fragments, then exactly one of `complete` or
//! `error`. The emitter carries the request's cancellation token; once the
//! token is cancelled nothing more is delivered.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::StreamError;
use crate::session::GenerationId;

/// One notification from a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment(String),
    Complete,
    Error(StreamError),
}

/// A stream event tagged with the request that produced it.
#[derive(Debug)]
pub struct TaggedEvent {
    pub id: GenerationId,
    pub event: StreamEvent,
}

/// A backend that turns a question into a stream of text fragments.
pub trait StreamClient: Send + Sync {
    /// Start streaming an answer to `question`. Must not block; progress is
    /// reported through `emitter`.
    fn open(&self, question: &str, emitter: StreamEmitter);
}

/// Delivery handle for one stream.
#[derive(Debug)]
pub struct StreamEmitter {
    id: GenerationId,
    tx: mpsc::UnboundedSender<TaggedEvent>,
    cancellation_token: CancellationToken,
    terminated: bool,
}

impl StreamEmitter {
    pub fn new(
        id: GenerationId,
        tx: mpsc::UnboundedSender<TaggedEvent>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            id,
            tx,
            cancellation_token,
            terminated: false,
        }
    }

    pub fn id(&self) -> GenerationId {
        self.id
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub fn fragment(&self, text: impl Into<String>) {
        self.deliver(StreamEvent::Fragment(text.into()));
    }

    pub fn complete(mut self) {
        self.deliver(StreamEvent::Complete);
        self.terminated = true;
    }

    pub fn error(mut self, cause: StreamError) {
        self.deliver(StreamEvent::Error(cause));
        self.terminated = true;
    }

    fn deliver(&self, event: StreamEvent) {
        if self.is_cancelled() {
            return;
        }
        // The receiver is gone only when the controller was dropped.
        let _ = self.tx.send(TaggedEvent { id: self.id, event });
    }
}

impl Drop for StreamEmitter {
    fn drop(&mut self) {
        if !self.terminated {
            self.deliver(StreamEvent::Error(StreamError::Transport(
                "stream ended without a terminal event".to_string(),
            )));
        }
    }
}
