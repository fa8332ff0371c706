// Handles CLI command definitions

use std::io::Write;

use tracing::info;

use crate::controller::{Delivery, GenerationController};
use crate::db::SqliteHistory;
use crate::ollama_api::OllamaClient;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

pub const USAGE: &str = "usage:
  answer-stream ask <question...>   stream an answer (Ctrl-C stops)
  answer-stream models              list available models
  answer-stream history [limit]     show recent exchanges";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask { question: String },
    Models,
    History { limit: usize },
}

impl Command {
    pub fn parse<I>(args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        match args.next().as_deref() {
            Some("ask") => {
                let question = args.collect::<Vec<_>>().join(" ");
                if question.trim().is_empty() {
                    return Err("ask needs a question".to_string());
                }
                Ok(Command::Ask { question })
            }
            Some("models") => Ok(Command::Models),
            Some("history") => {
                let limit = match args.next() {
                    Some(raw) => raw
                        .parse()
                        .map_err(|_| format!("invalid history limit: {}", raw))?,
                    None => DEFAULT_HISTORY_LIMIT,
                };
                Ok(Command::History { limit })
            }
            Some(other) => Err(format!("unknown command: {}", other)),
            None => Err("missing command".to_string()),
        }
    }
}

enum Step {
    Event(Option<Delivery>),
    Interrupt,
}

/// Stream one answer to `out`, stopping on Ctrl-C, and save the exchange.
pub async fn ask<W: Write>(
    controller: &mut GenerationController,
    question: &str,
    out: &mut W,
) -> Result<(), Box<dyn std::error::Error>> {
    controller.start(question)?;

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let mut interrupted = false;
    let mut printed = 0;

    while controller.is_generating() {
        let step = tokio::select! {
            delivery = controller.next_event() => Step::Event(delivery),
            _ = &mut interrupt, if !interrupted => Step::Interrupt,
        };

        match step {
            Step::Event(None) => break,
            Step::Event(Some(_)) => {}
            Step::Interrupt => {
                interrupted = true;
                controller.stop();
                info!("generation stopped by user");
            }
        }

        let answer = controller.answer();
        if answer.len() > printed {
            out.write_all(answer[printed..].as_bytes())?;
            out.flush()?;
            printed = answer.len();
        }
    }
    writeln!(out)?;

    if !controller.answer().is_empty() {
        let entry_id = controller.commit().await?;
        info!(%entry_id, "exchange saved to history");
    }
    Ok(())
}

pub async fn list_models<W: Write>(client: &OllamaClient, out: &mut W) -> Result<(), Box<dyn std::error::Error>> {
    for model in client.list_models().await? {
        let marker = if model == client.model() { "*" } else { " " };
        writeln!(out, "{} {}", marker, model)?;
    }
    Ok(())
}

pub async fn show_history<W: Write>(
    history: &SqliteHistory,
    limit: usize,
    out: &mut W,
) -> Result<(), Box<dyn std::error::Error>> {
    for entry in history.recent_entries(limit).await? {
        writeln!(out, "== {}", entry.id)?;
        for turn in &entry.turns {
            writeln!(out, "[{}] {}", turn.role.as_str(), turn.content)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Locale;
    use crate::history::HistoryEntry;
    use crate::stream::{StreamClient, StreamEmitter};

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_commands() {
        assert_eq!(
            Command::parse(args(&["ask", "What", "is", "2+2?"])).unwrap(),
            Command::Ask {
                question: "What is 2+2?".to_string()
            }
        );
        assert_eq!(Command::parse(args(&["models"])).unwrap(), Command::Models);
        assert_eq!(
            Command::parse(args(&["history"])).unwrap(),
            Command::History {
                limit: DEFAULT_HISTORY_LIMIT
            }
        );
        assert_eq!(
            Command::parse(args(&["history", "3"])).unwrap(),
            Command::History { limit: 3 }
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Command::parse(args(&[])).is_err());
        assert!(Command::parse(args(&["ask"])).is_err());
        assert!(Command::parse(args(&["history", "lots"])).is_err());
        assert!(Command::parse(args(&["chat"])).is_err());
    }

    /// Answers every question immediately with a fixed reply.
    struct EchoClient;

    impl StreamClient for EchoClient {
        fn open(&self, question: &str, emitter: StreamEmitter) {
            emitter.fragment("You asked: ");
            emitter.fragment(question.to_string());
            emitter.complete();
        }
    }

    #[tokio::test]
    async fn ask_streams_answer_and_saves_it() {
        let history = SqliteHistory::in_memory().unwrap();
        let mut controller =
            GenerationController::new(Arc::new(EchoClient), Arc::new(history.clone()), Locale::En);
        let mut out = Vec::new();

        ask(&mut controller, "why?", &mut out).await.unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "You asked: why?\n");
        let entries = history.recent_entries(10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].turns, HistoryEntry::answer_exchange("why?", "You asked: why?").turns);

        let mut listing = Vec::new();
        show_history(&history, 5, &mut listing).await.unwrap();
        let listing = String::from_utf8(listing).unwrap();
        assert!(listing.contains("[question] why?"));
        assert!(listing.contains("[answer] You asked: why?"));
    }
}
