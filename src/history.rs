//! Finished question/answer exchanges and the sink that persists them.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HistoryError;

pub const ANSWER_EXCHANGE: &str = "answer-exchange";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EntryId {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| HistoryError::Corrupt(format!("bad entry id {}: {}", s, e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Question,
    Answer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Question => "question",
            Role::Answer => "answer",
        }
    }
}

impl FromStr for Role {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "question" => Ok(Role::Question),
            "answer" => Ok(Role::Answer),
            other => Err(HistoryError::Corrupt(format!("unknown role: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// An immutable record handed to the history sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: EntryId,
    pub kind: String,
    pub turns: Vec<Turn>,
}

impl HistoryEntry {
    pub fn answer_exchange(question: &str, answer: &str) -> Self {
        Self {
            id: EntryId::new(),
            kind: ANSWER_EXCHANGE.to_string(),
            turns: vec![
                Turn {
                    role: Role::Question,
                    content: question.to_string(),
                },
                Turn {
                    role: Role::Answer,
                    content: answer.to_string(),
                },
            ],
        }
    }
}

/// Durable storage for finished exchanges.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn append(&self, entry: HistoryEntry) -> Result<(), HistoryError>;
}
