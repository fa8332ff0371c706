//! Generation controller.
//!
//! Owns the current conversation turn: the question, the answer buffer, the
//! lifecycle phase and the single active request. Stream events from every
//! request ever started arrive on one queue tagged with their request id;
//! only events whose id matches the active request are applied. That id
//! check is what keeps a superseded, still-draining stream from leaking
//! into a newer answer. Cancellation only frees the old transport early.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::config::Locale;
use crate::error::{ControllerError, StreamError};
use crate::history::{EntryId, HistoryEntry, HistorySink};
use crate::session::{GenerationId, GenerationRequest, Phase};
use crate::status::StatusStore;
use crate::stream::{StreamClient, StreamEmitter, StreamEvent, TaggedEvent};

/// Whether an event reached the active request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Applied,
    Stale,
}

fn failure_notice(locale: Locale, err: &StreamError) -> String {
    match (locale, err.is_timeout()) {
        (Locale::En, true) => "\n\nRequest timed out, please retry".to_string(),
        (Locale::En, false) => format!("\n\nSomething went wrong: {}", err),
        (Locale::Zh, true) => "\n\n回答超时，请重试".to_string(),
        (Locale::Zh, false) => format!("\n\n出问题了: {}", err),
    }
}

pub struct GenerationController {
    client: Arc<dyn StreamClient>,
    history: Arc<dyn HistorySink>,
    locale: Locale,
    status: StatusStore,
    active: Option<GenerationRequest>,
    phase: Phase,
    question: String,
    answer: String,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    events_rx: mpsc::UnboundedReceiver<TaggedEvent>,
}

impl GenerationController {
    pub fn new(client: Arc<dyn StreamClient>, history: Arc<dyn HistorySink>, locale: Locale) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            client,
            history,
            locale,
            status: StatusStore::new(),
            active: None,
            phase: Phase::Idle,
            question: String::new(),
            answer: String::new(),
            events_tx,
            events_rx,
        }
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_generating(&self) -> bool {
        self.status.current().is_generating
    }

    pub fn active_id(&self) -> Option<GenerationId> {
        self.active.as_ref().map(|request| request.id)
    }

    pub fn status(&self) -> &StatusStore {
        &self.status
    }

    /// Start answering `question`, superseding any active request.
    ///
    /// The previous request is not cancelled here; its remaining events are
    /// simply ignored. Returns as soon as the stream has been opened.
    pub fn start(&mut self, question: &str) -> Result<GenerationId, ControllerError> {
        if question.trim().is_empty() {
            return Err(ControllerError::EmptyQuestion);
        }

        let request = GenerationRequest::new(question);
        let id = request.id;
        let emitter = StreamEmitter::new(id, self.events_tx.clone(), request.cancellation_token.clone());

        if let Some(previous) = self.active.replace(request) {
            debug!(previous = %previous.id, %id, "superseding active generation");
        }
        self.question = question.to_string();
        self.answer.clear();
        self.phase = Phase::Generating;
        self.status.set_generating(true);

        debug!(%id, "generation started");
        self.client.open(question, emitter);
        Ok(id)
    }

    /// Cancel the active request. Returns `false` when nothing was running.
    pub fn stop(&mut self) -> bool {
        let Some(request) = self.active.take() else {
            return false;
        };

        request.cancellation_token.cancel();
        self.phase = Phase::Cancelled;
        self.status.set_generating(false);
        debug!(id = %request.id, "generation stopped");
        true
    }

    /// Ask the last question again from an empty answer.
    pub fn regenerate(&mut self) -> Result<GenerationId, ControllerError> {
        if self.question.is_empty() {
            return Err(ControllerError::NoQuestion);
        }
        if let Some(request) = self.active.take() {
            request.cancellation_token.cancel();
        }
        let question = self.question.clone();
        self.start(&question)
    }

    /// Stop anything running and forget the current exchange.
    pub fn clear(&mut self) {
        self.stop();
        self.question.clear();
        self.answer.clear();
        self.phase = Phase::Idle;
    }

    /// Hand the current question and answer to the history sink.
    pub async fn commit(&self) -> Result<EntryId, ControllerError> {
        if self.phase == Phase::Generating {
            return Err(ControllerError::CommitWhileGenerating);
        }
        if self.question.is_empty() {
            return Err(ControllerError::NothingToCommit);
        }

        let entry = HistoryEntry::answer_exchange(&self.question, &self.answer);
        let id = entry.id;
        self.history.append(entry).await?;
        debug!(entry_id = %id, "answer committed to history");
        Ok(id)
    }

    /// Wait for the next stream event and apply it.
    pub async fn next_event(&mut self) -> Option<Delivery> {
        let tagged = self.events_rx.recv().await?;
        Some(self.apply(tagged.id, tagged.event))
    }

    /// Apply every event already queued. Returns how many were applied to
    /// the active request.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(tagged) = self.events_rx.try_recv() {
            if self.apply(tagged.id, tagged.event) == Delivery::Applied {
                applied += 1;
            }
        }
        applied
    }

    /// Drive events until the active request ends.
    pub async fn wait_idle(&mut self) {
        while self.is_generating() {
            if self.next_event().await.is_none() {
                break;
            }
        }
    }

    fn apply(&mut self, id: GenerationId, event: StreamEvent) -> Delivery {
        if self.active_id() != Some(id) {
            trace!(%id, "dropping stale stream event");
            return Delivery::Stale;
        }

        match event {
            StreamEvent::Fragment(text) => self.answer.push_str(&text),
            StreamEvent::Complete => {
                self.finish(Phase::Completed);
                debug!(%id, chars = self.answer.len(), "generation completed");
            }
            StreamEvent::Error(err) => {
                self.answer.push_str(&failure_notice(self.locale, &err));
                self.finish(Phase::Failed);
                debug!(%id, error = %err, "generation failed");
            }
        }
        Delivery::Applied
    }

    fn finish(&mut self, phase: Phase) {
        self.active = None;
        self.phase = phase;
        self.status.set_generating(false);
    }
}
