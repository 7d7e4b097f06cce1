//! Shared setup for the API tests: an in-memory database, scripted chat
//! models and a request helper.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chatbot::api::{create_router, AppState};
use chatbot::auth::AuthManager;
use chatbot::config::{ChatConfig, SheetsConfig};
use chatbot::datasource::GoogleSheetsClient;
use chatbot::db::DatabaseConnection;
use chatbot::executor::{ModelRouter, RetryConfig};
use chatbot::service::ChatbotService;
use llm::{ChatModel, ChatRequest, ChatResponse, LlmError, Message, ProviderKind};
use parking_lot::Mutex;
use serde_json::Value;
use tower::ServiceExt;

/// A chat model that answers from a queue, or fails when the queue is empty.
pub struct ScriptedModel {
    provider: ProviderKind,
    replies: Mutex<VecDeque<String>>,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(provider: ProviderKind, replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            provider,
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// A model that is always unavailable.
    pub fn failing(provider: ProviderKind) -> Arc<Self> {
        Self::new(provider, &[])
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(&self, request: ChatRequest) -> llm::Result<ChatResponse> {
        self.requests.lock().push(request);
        let reply = self
            .replies
            .lock()
            .pop_front()
            .ok_or_else(|| LlmError::ServiceUnavailable("scripted outage".into()))?;
        Ok(ChatResponse {
            message: Message::assistant(reply),
            usage: None,
            metadata: HashMap::new(),
        })
    }

    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub async fn setup_app(
    openai: Option<Arc<ScriptedModel>>,
    gemini: Option<Arc<ScriptedModel>>,
) -> TestApp {
    let db = DatabaseConnection::in_memory()
        .await
        .expect("Failed to open in-memory database");
    db.run_migrations().await.expect("Failed to run migrations");

    let router = ModelRouter::new(
        openai.map(|m| m as Arc<dyn ChatModel>),
        gemini.map(|m| m as Arc<dyn ChatModel>),
    )
    .with_primary_retry(RetryConfig::new(0))
    .with_fallback_retry(RetryConfig::new(0));

    let sheets = GoogleSheetsClient::new(&SheetsConfig::default(), Duration::from_secs(60))
        .expect("Failed to build sheets client");
    let chatbot = ChatbotService::new(router, sheets, Duration::from_secs(60));
    let auth = AuthManager::new(b"integration-test-secret", Duration::from_secs(3600));

    let state = AppState::new(db, chatbot, auth, ChatConfig::default(), "test-server");
    TestApp {
        router: create_router(state.clone()),
        state,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, _, body) = self.raw_request(method, uri, token, body).await;
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("Response body is not JSON")
        };
        (status, json)
    }

    pub async fn raw_request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        (status, headers, bytes.to_vec())
    }

    /// Register `username` and return its access token.
    pub async fn register(&self, username: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(serde_json::json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": "correct-horse",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body["data"]["access_token"]
            .as_str()
            .expect("token missing")
            .to_string()
    }
}
