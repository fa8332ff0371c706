use std::sync::Arc;

use answer_stream::commands::{self, Command, USAGE};
use answer_stream::config::AppConfig;
use answer_stream::controller::GenerationController;
use answer_stream::db::SqliteHistory;
use answer_stream::ollama_api::OllamaClient;

// application entry point
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let command = match Command::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let mut config = AppConfig::default();
    config.apply_env()?;
    let history = SqliteHistory::open(&config.db_path)?;
    {
        let conn = history.connection();
        let conn = conn.lock().await;
        config.apply_stored(&conn)?;
    }
    // Environment wins over stored settings.
    config.apply_env()?;

    tracing::debug!(model = %config.model, url = %config.ollama_url, "configuration loaded");

    let client = OllamaClient::new(&config)?;
    let mut stdout = std::io::stdout();

    match command {
        Command::Ask { question } => {
            let mut controller =
                GenerationController::new(Arc::new(client), Arc::new(history), config.locale);
            commands::ask(&mut controller, &question, &mut stdout).await?;
        }
        Command::Models => commands::list_models(&client, &mut stdout).await?,
        Command::History { limit } => commands::show_history(&history, limit, &mut stdout).await?,
    }

    Ok(())
}
