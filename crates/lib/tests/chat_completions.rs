//! Integration test: run the OpenAI client and the kernel against a local mock
//! `/v1/chat/completions` server on a free port. No network access or API key needed.

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use meek::kernel::Kernel;
use meek::llm::{ChatBackend, ChatMessage, LlmError, OpenAiClient};
use meek::skills::CompletionSettings;

const TEST_KEY: &str = "sk-test";
/// Model name that makes the mock end its stream without `[DONE]` or a final newline.
const UNTERMINATED_MODEL: &str = "unterminated";

async fn completions(headers: HeaderMap, Json(body): Json<serde_json::Value>) -> Response {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if auth != format!("Bearer {}", TEST_KEY) {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    let prompt = body["messages"][0]["content"].as_str().unwrap_or("").to_string();
    let reply = format!("echo: {}", prompt.lines().last().unwrap_or(""));
    if body["stream"].as_bool().unwrap_or(false) {
        let mut sse = String::new();
        for word in reply.split_inclusive(' ') {
            let chunk = serde_json::json!({ "choices": [{ "delta": { "content": word } }] });
            sse.push_str(&format!("data: {}\n\n", chunk));
        }
        let last = serde_json::json!({ "choices": [{ "delta": {}, "finish_reason": "stop" }] });
        if body["model"] == UNTERMINATED_MODEL {
            // Some servers close the body right after the last event.
            sse.push_str(&format!("data: {}", last));
        } else {
            sse.push_str(&format!("data: {}\n\ndata: [DONE]\n\n", last));
        }
        ([(header::CONTENT_TYPE, "text/event-stream")], sse).into_response()
    } else {
        Json(serde_json::json!({
            "choices": [{
                "message": { "role": "assistant", "content": reply },
                "finish_reason": "stop"
            }]
        }))
        .into_response()
    }
}

async fn start_mock() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let port = listener.local_addr().expect("local_addr").port();
    let app = Router::new().route("/v1/chat/completions", post(completions));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://127.0.0.1:{}/v1", port)
}

#[tokio::test]
async fn chat_returns_first_choice() {
    let base = start_mock().await;
    let client = OpenAiClient::new(TEST_KEY, Some(base)).unwrap();
    let res = client
        .chat(
            "gpt-3.5-turbo",
            vec![ChatMessage::user("hello there")],
            &CompletionSettings::default(),
        )
        .await
        .unwrap();
    assert_eq!(res.content(), "echo: hello there");
    assert_eq!(res.finish_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn chat_stream_accumulates_deltas() {
    let base = start_mock().await;
    let client = OpenAiClient::new(TEST_KEY, Some(base)).unwrap();
    let mut chunks: Vec<String> = Vec::new();
    let mut on_chunk = |s: &str| chunks.push(s.to_string());
    let res = client
        .chat_stream(
            "gpt-3.5-turbo",
            vec![ChatMessage::user("one two three")],
            &CompletionSettings::default(),
            &mut on_chunk,
        )
        .await
        .unwrap();
    assert_eq!(res.content(), "echo: one two three");
    assert_eq!(res.finish_reason.as_deref(), Some("stop"));
    assert_eq!(chunks.len(), 4);
    assert_eq!(chunks.concat(), "echo: one two three");
}

#[tokio::test]
async fn chat_stream_keeps_event_after_last_newline() {
    let base = start_mock().await;
    let client = OpenAiClient::new(TEST_KEY, Some(base)).unwrap();
    let mut chunks: Vec<String> = Vec::new();
    let mut on_chunk = |s: &str| chunks.push(s.to_string());
    let res = client
        .chat_stream(
            UNTERMINATED_MODEL,
            vec![ChatMessage::user("last words")],
            &CompletionSettings::default(),
            &mut on_chunk,
        )
        .await
        .unwrap();
    assert_eq!(res.content(), "echo: last words");
    assert_eq!(res.finish_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn wrong_key_is_an_api_error() {
    let base = start_mock().await;
    let client = OpenAiClient::new("sk-wrong", Some(base)).unwrap();
    let err = client
        .chat("m", vec![ChatMessage::user("x")], &CompletionSettings::default())
        .await
        .unwrap_err();
    match err {
        LlmError::Api(msg) => assert!(msg.starts_with("401"), "{}", msg),
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn kernel_runs_bundled_joke_skill() {
    let base = start_mock().await;
    let client = OpenAiClient::new(TEST_KEY, Some(base)).unwrap();
    let mut kernel = Kernel::new();
    kernel.add_chat_service("dv", client, "gpt-3.5-turbo");
    let skills_dir = meek::paths::append_path("skills");
    kernel
        .import_skill_from_directory(&skills_dir, "FunSkill")
        .unwrap();

    // The bundled template ends with the input followed by a `+++++` line.
    let out = kernel
        .invoke("FunSkill", "Joke", "a corporate meeting")
        .await
        .unwrap();
    assert_eq!(out, "echo: +++++");

    let mut streamed = String::new();
    let mut on_chunk = |s: &str| streamed.push_str(s);
    let out = kernel
        .invoke_stream("FunSkill", "Joke", "a corporate meeting", &mut on_chunk)
        .await
        .unwrap();
    assert_eq!(out, "echo: +++++");
    assert_eq!(streamed, "echo: +++++");
}
