//! Integration tests for the Ollama stream client.
//!
//! Each test spins up an Axum server on a random port that plays a canned
//! Ollama response, then drives a real `OllamaClient` against it.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use answer_stream::db::SqliteHistory;
use answer_stream::ollama_api::OllamaClient;
use answer_stream::stream::{StreamClient, StreamEmitter, StreamEvent, TaggedEvent};
use answer_stream::{GenerationController, GenerationId, Locale, Phase, StreamError};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const HELLO_STREAM: &str = concat!(
    r#"{"model":"test","message":{"role":"assistant","content":"Hel"},"done":false}"#,
    "\n",
    r#"{"model":"test","message":{"role":"assistant","content":"lo"},"done":false}"#,
    "\n",
    r#"{"model":"test","message":{"role":"assistant","content":""},"done":true}"#,
    "\n",
);

/// Start an Axum server on a random port, return its base URL.
async fn start_server(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

fn chat_route(status: StatusCode, body: &'static str) -> Router {
    Router::new().route("/api/chat", post(move || async move { (status, body) }))
}

fn client(base_url: &str) -> OllamaClient {
    OllamaClient::with_http(reqwest::Client::new(), base_url, "test")
}

/// Open one stream and collect its events until a terminal one arrives.
async fn collect(client: &OllamaClient, question: &str) -> Vec<StreamEvent> {
    let (tx, mut rx) = mpsc::unbounded_channel::<TaggedEvent>();
    let id = GenerationId::new();
    client.open(question, StreamEmitter::new(id, tx, CancellationToken::new()));

    let mut events = Vec::new();
    loop {
        let tagged = timeout(TEST_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(tagged.id, id);
        let terminal = !matches!(tagged.event, StreamEvent::Fragment(_));
        events.push(tagged.event);
        if terminal {
            return events;
        }
    }
}

#[tokio::test]
async fn streams_fragments_then_completes() {
    let base = start_server(chat_route(StatusCode::OK, HELLO_STREAM)).await;

    let events = collect(&client(&base), "hi").await;
    assert_eq!(
        events,
        vec![
            StreamEvent::Fragment("Hel".into()),
            StreamEvent::Fragment("lo".into()),
            StreamEvent::Complete,
        ]
    );
}

#[tokio::test]
async fn error_status_is_a_backend_error_with_detail() {
    let base = start_server(chat_route(
        StatusCode::NOT_FOUND,
        r#"{"error":"model 'test' not found"}"#,
    ))
    .await;

    let events = collect(&client(&base), "hi").await;
    match events.as_slice() {
        [StreamEvent::Error(StreamError::Backend(detail))] => {
            assert!(detail.contains("404"), "{}", detail);
            assert!(detail.contains("model 'test' not found"), "{}", detail);
        }
        other => panic!("unexpected events: {:?}", other),
    }
}

#[tokio::test]
async fn error_line_mid_stream_is_a_backend_error() {
    let body = concat!(
        r#"{"message":{"content":"par"},"done":false}"#,
        "\n",
        r#"{"error":"out of memory"}"#,
        "\n",
    );
    let base = start_server(chat_route(StatusCode::OK, body)).await;

    let events = collect(&client(&base), "hi").await;
    assert_eq!(
        events,
        vec![
            StreamEvent::Fragment("par".into()),
            StreamEvent::Error(StreamError::Backend("out of memory".into())),
        ]
    );
}

#[tokio::test]
async fn stream_ending_without_done_is_a_transport_failure() {
    let body = concat!(r#"{"message":{"content":"cut"},"done":false}"#, "\n");
    let base = start_server(chat_route(StatusCode::OK, body)).await;

    let events = collect(&client(&base), "hi").await;
    assert!(matches!(
        events.last(),
        Some(StreamEvent::Error(StreamError::Transport(_)))
    ));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let events = collect(&client(&format!("http://127.0.0.1:{}", port)), "hi").await;
    assert!(matches!(
        events.as_slice(),
        [StreamEvent::Error(StreamError::Transport(_))]
    ));
}

#[tokio::test]
async fn slow_backend_is_a_timeout() {
    let app = Router::new().route(
        "/api/chat",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            HELLO_STREAM
        }),
    );
    let base = start_server(app).await;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let client = OllamaClient::with_http(http, &base, "test");

    let events = collect(&client, "hi").await;
    assert_eq!(events, vec![StreamEvent::Error(StreamError::Timeout)]);
}

#[tokio::test]
async fn cancelled_stream_delivers_nothing() {
    let base = start_server(chat_route(StatusCode::OK, HELLO_STREAM)).await;
    let (tx, mut rx) = mpsc::unbounded_channel::<TaggedEvent>();
    let token = CancellationToken::new();
    token.cancel();

    client(&base).open("hi", StreamEmitter::new(GenerationId::new(), tx, token));

    // The sender lives in the spawned task; the channel closes once it exits.
    let next = timeout(TEST_TIMEOUT, rx.recv()).await.unwrap();
    assert!(next.is_none());
}

#[tokio::test]
async fn lists_models() {
    let app = Router::new().route(
        "/api/tags",
        get(|| async { r#"{"models":[{"name":"llama3.2"},{"name":"test"}]}"# }),
    );
    let base = start_server(app).await;

    let models = client(&base).list_models().await.unwrap();
    assert_eq!(models, vec!["llama3.2".to_string(), "test".to_string()]);
}

#[tokio::test]
async fn controller_streams_and_commits_end_to_end() {
    let base = start_server(chat_route(StatusCode::OK, HELLO_STREAM)).await;
    let history = SqliteHistory::in_memory().unwrap();
    let mut controller = GenerationController::new(
        Arc::new(client(&base)),
        Arc::new(history.clone()),
        Locale::En,
    );

    controller.start("say hello").unwrap();
    timeout(TEST_TIMEOUT, controller.wait_idle()).await.unwrap();

    assert_eq!(controller.phase(), Phase::Completed);
    assert_eq!(controller.answer(), "Hello");

    controller.commit().await.unwrap();
    let entries = history.recent_entries(1).await.unwrap();
    assert_eq!(entries[0].turns[0].content, "say hello");
    assert_eq!(entries[0].turns[1].content, "Hello");
}
