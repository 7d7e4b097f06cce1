//! End-to-end tests of the HTTP API against an in-memory database.

mod common;

use axum::http::{header, Method, StatusCode};
use common::{setup_app, ScriptedModel};
use llm::ProviderKind;
use serde_json::json;

#[tokio::test]
async fn test_health_is_public() {
    let app = setup_app(None, None).await;

    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["server"], "test-server");

    let (status, body) = app
        .request(Method::GET, "/api/v1/system/health", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
    assert_eq!(body["integrations"]["sheets"], false);
    assert_eq!(body["integrations"]["data_source"], "sheets");
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = setup_app(None, None).await;
    app.register("alice").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "correct-horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["token_type"], "Bearer");
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(Method::GET, "/api/v1/auth/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_registration_rules() {
    let app = setup_app(None, None).await;
    app.register("alice").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "username": "alice", "password": "another-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "username": "bob", "password": "short" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let app = setup_app(None, None).await;
    app.register("alice").await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = setup_app(None, None).await;

    let (status, body) = app.request(Method::GET, "/api/v1/sessions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = app
        .request(Method::GET, "/api/v1/app", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_empty_chat_message_is_rejected() {
    let app = setup_app(None, Some(ScriptedModel::new(ProviderKind::Gemini, &["unused"]))).await;
    let token = app.register("alice").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/chat",
            Some(&token),
            Some(json!({ "message": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_chat_turn_is_persisted() {
    let gemini = ScriptedModel::new(ProviderKind::Gemini, &["There are 3 active projects."]);
    let app = setup_app(None, Some(gemini.clone())).await;
    let token = app.register("alice").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/chat",
            Some(&token),
            Some(json!({ "message": "How many projects are active?" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["response"], "There are 3 active projects.");
    assert_eq!(body["data"]["source"], "gemini");
    let session_id = body["data"]["session_id"].as_i64().unwrap();

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/sessions/{}/messages", session_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["data"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["model"], "gemini");

    let (_, body) = app.request(Method::GET, "/api/v1/sessions", Some(&token), None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["title"], "How many projects are active?");
    assert_eq!(body["data"][0]["message_count"], 2);
}

#[tokio::test]
async fn test_stored_history_feeds_the_next_turn() {
    let gemini = ScriptedModel::new(ProviderKind::Gemini, &["first answer", "second answer"]);
    let app = setup_app(None, Some(gemini.clone())).await;
    let token = app.register("alice").await;

    for message in ["first question", "second question"] {
        let (status, _) = app
            .request(
                Method::POST,
                "/api/v1/chat",
                Some(&token),
                Some(json!({ "message": message })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let requests = gemini.requests.lock();
    let contents: Vec<&str> = requests[1]
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert!(contents.contains(&"first question"));
    assert!(contents.contains(&"first answer"));
}

#[tokio::test]
async fn test_chat_falls_back_to_alternate_provider() {
    let openai = ScriptedModel::failing(ProviderKind::OpenAi);
    let gemini = ScriptedModel::new(ProviderKind::Gemini, &["backup answer"]);
    let app = setup_app(Some(openai), Some(gemini)).await;
    let token = app.register("alice").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/chat",
            Some(&token),
            Some(json!({ "message": "Summarize the budget", "preferred_model": "openai" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["source"], "gemini-fallback");
    assert!(body["data"]["response"]
        .as_str()
        .unwrap()
        .starts_with("backup answer"));
}

#[tokio::test]
async fn test_unconfigured_provider_answers_with_error_source() {
    let app = setup_app(None, None).await;
    let token = app.register("alice").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/chat",
            Some(&token),
            Some(json!({ "message": "hello" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["source"], "error");
    assert!(body["data"]["error"].is_string());
}

#[tokio::test]
async fn test_session_lifecycle() {
    let gemini = ScriptedModel::new(ProviderKind::Gemini, &["hi there"]);
    let app = setup_app(None, Some(gemini)).await;
    let token = app.register("alice").await;

    let (_, body) = app
        .request(
            Method::POST,
            "/api/v1/chat",
            Some(&token),
            Some(json!({ "message": "hello" })),
        )
        .await;
    let first = body["data"]["session_id"].as_i64().unwrap();

    let (status, body) = app
        .request(Method::POST, "/api/v1/sessions", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let second = body["data"]["id"].as_i64().unwrap();
    assert_ne!(first, second);
    assert_eq!(body["data"]["is_active"], true);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/sessions/switch",
            Some(&token),
            Some(json!({ "session_id": first })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], first);
    assert_eq!(body["data"]["messages"].as_array().unwrap().len(), 2);

    let (status, headers, _) = app
        .raw_request(
            Method::GET,
            &format!("/api/v1/sessions/{}/export", first),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains(&format!("chat_session_{}.json", first)));

    let (status, body) = app
        .request(Method::POST, "/api/v1/sessions/reset", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["session_id"], first);
    assert_eq!(body["data"]["deleted_messages"], 2);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/v1/sessions/{}", second),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .request(
            Method::GET,
            &format!("/api/v1/sessions/{}", second),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sessions_are_private() {
    let app = setup_app(None, Some(ScriptedModel::new(ProviderKind::Gemini, &["ok"]))).await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;

    let (_, body) = app
        .request(
            Method::POST,
            "/api/v1/chat",
            Some(&alice),
            Some(json!({ "message": "secret plans" })),
        )
        .await;
    let session_id = body["data"]["session_id"].as_i64().unwrap();

    let (status, _) = app
        .request(
            Method::GET,
            &format!("/api/v1/sessions/{}", session_id),
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_preferences_validation() {
    let app = setup_app(None, None).await;
    let token = app.register("alice").await;

    let (status, body) = app
        .request(
            Method::PUT,
            "/api/v1/preferences",
            Some(&token),
            Some(json!({ "theme": "dark", "default_model": "openai" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["theme"], "dark");
    assert_eq!(body["data"]["default_model"], "openai");

    let (status, body) = app
        .request(
            Method::PUT,
            "/api/v1/preferences",
            Some(&token),
            Some(json!({ "theme": "sepia" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_app_index_creates_active_session() {
    let app = setup_app(None, None).await;
    let token = app.register("alice").await;

    let (status, body) = app.request(Method::GET, "/api/v1/app", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["data_source"], "sheets");
    assert_eq!(body["data"]["preferences"]["default_model"], "gemini");
    assert_eq!(body["data"]["active_session"]["is_active"], true);
    assert_eq!(body["data"]["previous_sessions"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_analytics_dashboard_counts_turns() {
    let gemini = ScriptedModel::new(ProviderKind::Gemini, &["one", "two"]);
    let app = setup_app(None, Some(gemini)).await;
    let token = app.register("alice").await;

    let (status, body) = app
        .request(Method::GET, "/api/v1/dashboard", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["has_data"], false);

    for message in ["first", "second"] {
        app.request(
            Method::POST,
            "/api/v1/chat",
            Some(&token),
            Some(json!({ "message": message })),
        )
        .await;
    }

    let (_, body) = app
        .request(Method::GET, "/api/v1/dashboard", Some(&token), None)
        .await;
    assert_eq!(body["data"]["has_data"], true);
    assert_eq!(body["data"]["total_messages"], 4);

    let (status, body) = app
        .request(Method::GET, "/api/v1/dashboard/model-usage", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["gemini_percentage"], 100.0);
}

#[tokio::test]
async fn test_project_endpoints_without_sheets() {
    let app = setup_app(None, None).await;
    let token = app.register("alice").await;

    let (status, body) = app
        .request(Method::GET, "/api/v1/projects/budget?sheet=default", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");

    let (status, _) = app
        .request(Method::GET, "/api/v1/search/metrics", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
