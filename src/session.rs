// Generation request identity and lifecycle state

use std::fmt;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Opaque identity of one generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenerationId(Uuid);

impl GenerationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GenerationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The request currently allowed to mutate the answer buffer.
#[derive(Debug)]
pub struct GenerationRequest {
    pub id: GenerationId,
    pub question: String,
    pub cancellation_token: CancellationToken,
}

impl GenerationRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            id: GenerationId::new(),
            question: question.into(),
            cancellation_token: CancellationToken::new(),
        }
    }
}

/// Where the current conversation turn is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Generating,
    Completed,
    Cancelled,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Cancelled | Phase::Failed)
    }
}
