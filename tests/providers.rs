mod helpers;

use httpmock::Method::POST;
use httpmock::MockServer;
use repo_lens::agent::run_command_agent;
use repo_lens::config::Settings;
use repo_lens::llm::{create_client, AnthropicClient, ChatMessage, LLMClient, LLMError, OpenAiClient};
use serde_json::json;
use std::time::Duration;

fn messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("You are a repository analyst."),
        ChatMessage::user("Question: which branch?"),
    ]
}

#[tokio::test]
async fn openai_client_sends_chat_completion() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer sk-test")
            .header("content-type", "application/json")
            .body_includes("\"model\":\"gpt-test\"")
            .body_includes("\"role\":\"system\"")
            .body_includes("Question: which branch?");
        then.status(200).json_body(json!({
            "choices": [{ "message": { "role": "assistant", "content": "You are on main." } }]
        }));
    });

    let client = OpenAiClient::new(
        format!("{}/v1/", server.base_url()),
        "gpt-test",
        Some("sk-test".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();

    let reply = client.chat(&messages()).await.unwrap();

    mock.assert();
    assert_eq!(reply, "You are on main.");
}

#[tokio::test]
async fn openai_client_without_key_sends_no_auth_header() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header_missing("authorization");
        then.status(200).json_body(json!({
            "choices": [{ "message": { "content": "ok" } }]
        }));
    });

    let client = OpenAiClient::new(server.url("/v1"), "llama3", None, Duration::from_secs(5)).unwrap();

    assert_eq!(client.chat(&messages()).await.unwrap(), "ok");
    mock.assert();
}

#[tokio::test]
async fn openai_client_surfaces_http_errors() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(401).body("invalid api key");
    });

    let client = OpenAiClient::new(server.url("/v1"), "gpt-test", Some("bad".to_string()), Duration::from_secs(5))
        .unwrap();

    match client.chat(&messages()).await.unwrap_err() {
        LLMError::ApiError(message) => {
            assert!(message.contains("401"));
            assert!(message.contains("invalid api key"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn openai_client_rejects_empty_choices() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200).json_body(json!({ "choices": [] }));
    });

    let client = OpenAiClient::new(server.url("/v1"), "gpt-test", None, Duration::from_secs(5)).unwrap();

    assert!(matches!(
        client.chat(&messages()).await.unwrap_err(),
        LLMError::InvalidResponse(_)
    ));
}

#[tokio::test]
async fn openai_client_times_out() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200)
            .delay(Duration::from_millis(500))
            .json_body(json!({ "choices": [{ "message": { "content": "late" } }] }));
    });

    let client = OpenAiClient::new(server.url("/v1"), "gpt-test", None, Duration::from_millis(50)).unwrap();

    assert!(matches!(client.chat(&messages()).await.unwrap_err(), LLMError::Timeout));
}

#[tokio::test]
async fn anthropic_client_sends_messages_request() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/messages")
            .header("x-api-key", "sk-ant-test")
            .header("anthropic-version", "2023-06-01")
            .body_includes("\"system\":\"You are a repository analyst.\"")
            .body_includes("\"max_tokens\":1024")
            .body_includes("\"role\":\"user\"");
        then.status(200).json_body(json!({
            "content": [
                { "type": "text", "text": "You are " },
                { "type": "text", "text": "on main." }
            ]
        }));
    });

    let client = AnthropicClient::new(
        server.base_url(),
        "claude-test",
        "sk-ant-test".to_string(),
        Duration::from_secs(5),
    )
    .unwrap();

    let reply = client.chat(&messages()).await.unwrap();

    mock.assert();
    assert_eq!(reply, "You are on main.");
}

#[tokio::test]
async fn anthropic_client_surfaces_http_errors() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/messages");
        then.status(529).body("overloaded");
    });

    let client =
        AnthropicClient::new(server.base_url(), "claude-test", "k".to_string(), Duration::from_secs(5)).unwrap();

    assert!(matches!(
        client.chat(&messages()).await.unwrap_err(),
        LLMError::ApiError(_)
    ));
}

/// Full plan pipeline over HTTP: create_client from settings, two model calls
#[tokio::test]
async fn command_agent_over_openai_compatible_server() {
    let (_temp, repo_path) = helpers::create_test_repo();
    helpers::create_commit(&repo_path, "README.md", "demo\n", "Initial commit");
    let head = helpers::git(&repo_path, &["rev-parse", "HEAD"]);

    let server = MockServer::start();
    let plan_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .body_includes("Return at most 4 commands.");
        then.status(200).json_body(json!({
            "choices": [{ "message": { "content":
                "```json\n{\"commands\": [{\"command\": \"git rev-parse HEAD\", \"reason\": \"find head\"}]}\n```"
            } }]
        }));
    });
    let answer_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .body_includes("Executed command outputs:")
            .body_includes(&head);
        then.status(200).json_body(json!({
            "choices": [{ "message": { "content": "HEAD is the initial commit." } }]
        }));
    });

    let mut settings = Settings::with_repo(&repo_path);
    settings.llm.provider = "ollama".to_string();
    settings.llm.model = "llama3".to_string();
    settings.llm.api_base = Some(server.url("/v1"));

    let client = create_client(&settings).unwrap();
    let result = run_command_agent(&settings, client.as_ref(), "What is HEAD?").await.unwrap();

    plan_mock.assert();
    answer_mock.assert();
    assert_eq!(result.executions[0].output, head);
    assert_eq!(result.answer, "HEAD is the initial commit.");
}
