//! Streaming answer generation for a desktop chat assistant.
//!
//! The [`controller::GenerationController`] drives one question/answer turn
//! against a [`stream::StreamClient`] and hands finished exchanges to a
//! [`history::HistorySink`].

pub mod commands;
pub mod config;
pub mod controller;
pub mod db;
pub mod error;
pub mod history;
pub mod host;
pub mod ollama_api;
pub mod session;
pub mod status;
pub mod stream;

pub use config::{AppConfig, Locale};
pub use controller::{Delivery, GenerationController};
pub use error::{ControllerError, HistoryError, StreamError};
pub use history::{HistoryEntry, HistorySink};
pub use session::{GenerationId, Phase};
pub use stream::{StreamClient, StreamEmitter, StreamEvent};
