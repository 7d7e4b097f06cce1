//! Dual-provider routing with fallback and attribution
//!
//! [`ModelRouter`] sends a request to the preferred provider under the
//! primary retry policy. Once those retries are spent it hands the request
//! to the alternate provider, and labels the reply with whichever provider
//! produced the text.

use super::retry::{retry_with_backoff, RetryConfig, RetryPolicy};
use llm::{ChatModel, ChatRequest, LlmError, ProviderKind};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

pub const CONTEXT_TOO_LONG_MESSAGE: &str = "Your conversation is too long for me to process. Please try starting a new conversation or ask a shorter question.";
pub const BOTH_RATE_LIMITED_MESSAGE: &str = "I'm sorry, both AI services are currently experiencing high demand. Please try again in a few minutes.";
pub const FALLBACK_FAILED_MESSAGE: &str = "I'm sorry, I'm having trouble processing your request right now. Please try again with a simpler query.";

/// Who produced a chat reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseSource {
    /// The preferred provider answered.
    Model {
        provider: ProviderKind,
        with_search: bool,
    },
    /// The alternate provider answered after the preferred one failed.
    Fallback { provider: ProviderKind },
    /// Rows came straight from the SQL data source.
    SqlQuery,
    /// No provider output; the reply is an error message.
    Error,
}

impl ResponseSource {
    /// The label persisted with assistant messages.
    pub fn label(&self) -> String {
        match self {
            ResponseSource::Model {
                provider,
                with_search: false,
            } => provider.as_str().to_string(),
            ResponseSource::Model {
                provider,
                with_search: true,
            } => format!("{}-with-search", provider),
            ResponseSource::Fallback { provider } => format!("{}-fallback", provider),
            ResponseSource::SqlQuery => "sql-query".to_string(),
            ResponseSource::Error => "error".to_string(),
        }
    }

    /// The provider whose output this reply carries, if any.
    pub fn provider(&self) -> Option<ProviderKind> {
        match self {
            ResponseSource::Model { provider, .. } | ResponseSource::Fallback { provider } => {
                Some(*provider)
            }
            ResponseSource::SqlQuery | ResponseSource::Error => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ResponseSource::Error)
    }
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for ResponseSource {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sql-query" => return Ok(ResponseSource::SqlQuery),
            "error" => return Ok(ResponseSource::Error),
            _ => {}
        }
        if let Some(provider) = s.strip_suffix("-with-search") {
            return Ok(ResponseSource::Model {
                provider: provider.parse()?,
                with_search: true,
            });
        }
        if let Some(provider) = s.strip_suffix("-fallback") {
            return Ok(ResponseSource::Fallback {
                provider: provider.parse()?,
            });
        }
        Ok(ResponseSource::Model {
            provider: s.parse()?,
            with_search: false,
        })
    }
}

impl Serialize for ResponseSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

impl<'de> Deserialize<'de> for ResponseSource {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(serde::de::Error::custom)
    }
}

/// The outcome of routing one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedResponse {
    pub content: String,
    pub source: ResponseSource,
    /// Provider whose text is in `content`.
    pub provider: Option<ProviderKind>,
    pub error: Option<String>,
    /// Provider calls made across both phases.
    pub attempts: u32,
}

impl RoutedResponse {
    fn answered(content: String, source: ResponseSource, attempts: u32) -> Self {
        Self {
            content,
            provider: source.provider(),
            source,
            error: None,
            attempts,
        }
    }

    fn failed(content: impl Into<String>, error: impl Into<String>, attempts: u32) -> Self {
        Self {
            content: content.into(),
            source: ResponseSource::Error,
            provider: None,
            error: Some(error.into()),
            attempts,
        }
    }

    /// Content when a provider answered, `None` for error replies.
    pub fn answer(&self) -> Option<&str> {
        (!self.source.is_error()).then_some(self.content.as_str())
    }

    /// The model's own text, without the backup attribution note.
    pub fn model_text(&self) -> Option<&str> {
        let content = self.answer()?;
        match self.source {
            ResponseSource::Fallback { provider } => {
                let note = attribution_note(provider.alternate(), provider);
                Some(
                    content
                        .strip_suffix(note.as_str())
                        .map(str::trim_end)
                        .unwrap_or(content),
                )
            }
            _ => Some(content),
        }
    }
}

/// Message shown when a provider's credentials are missing or rejected.
pub fn configuration_message(provider: ProviderKind) -> String {
    format!(
        "There's an issue with the {} API configuration. Please check your API key settings.",
        provider.as_str().to_uppercase()
    )
}

/// Note appended to replies produced by the alternate provider.
pub fn attribution_note(preferred: ProviderKind, fallback: ProviderKind) -> String {
    format!(
        "(Answered using {} as backup because {} was temporarily unavailable)",
        fallback.display_name(),
        preferred.display_name()
    )
}

/// Routes requests between the two providers.
#[derive(Clone)]
pub struct ModelRouter {
    openai: Option<Arc<dyn ChatModel>>,
    gemini: Option<Arc<dyn ChatModel>>,
    primary_retry: RetryConfig,
    fallback_retry: RetryConfig,
}

impl ModelRouter {
    pub fn new(
        openai: Option<Arc<dyn ChatModel>>,
        gemini: Option<Arc<dyn ChatModel>>,
    ) -> Self {
        Self {
            openai,
            gemini,
            primary_retry: RetryConfig::default(),
            fallback_retry: RetryConfig::fallback_default(),
        }
    }

    pub fn with_primary_retry(mut self, config: RetryConfig) -> Self {
        self.primary_retry = config;
        self
    }

    pub fn with_fallback_retry(mut self, config: RetryConfig) -> Self {
        self.fallback_retry = config;
        self
    }

    /// The client configured for `provider`, if any.
    pub fn client(&self, provider: ProviderKind) -> Option<&Arc<dyn ChatModel>> {
        match provider {
            ProviderKind::OpenAi => self.openai.as_ref(),
            ProviderKind::Gemini => self.gemini.as_ref(),
        }
    }

    pub fn is_configured(&self, provider: ProviderKind) -> bool {
        self.client(provider).is_some()
    }

    /// Answer a request, preferring `preferred` and falling back to the
    /// alternate provider.
    ///
    /// `build` produces the request for a given provider, since the two
    /// providers receive differently shaped prompts.
    pub async fn route<B>(&self, preferred: ProviderKind, with_search: bool, build: B) -> RoutedResponse
    where
        B: Fn(ProviderKind) -> ChatRequest,
    {
        let Some(primary) = self.client(preferred).cloned() else {
            warn!(provider = %preferred, "Preferred provider has no API key configured");
            return RoutedResponse::failed(
                configuration_message(preferred),
                format!("{} API key is not configured", preferred),
                0,
            );
        };

        let request = build(preferred);
        let operation = format!("{}_chat", preferred);
        let outcome = retry_with_backoff(
            &self.primary_retry,
            RetryPolicy::Transient,
            &operation,
            || {
                let client = Arc::clone(&primary);
                let request = request.clone();
                async move { client.chat(request).await }
            },
        )
        .await;

        let failure = match outcome {
            Ok(retried) => {
                return RoutedResponse::answered(
                    retried.value.message.content,
                    ResponseSource::Model {
                        provider: preferred,
                        with_search,
                    },
                    retried.attempts,
                );
            }
            Err(failure) => failure,
        };

        if failure.error.is_auth_error() {
            warn!(provider = %preferred, error = %failure.error, "Provider rejected credentials, not falling back");
            return RoutedResponse::failed(
                configuration_message(preferred),
                failure.error.to_string(),
                failure.attempts,
            );
        }

        if matches!(failure.error, LlmError::ContextLengthExceeded(_)) {
            return RoutedResponse::failed(
                CONTEXT_TOO_LONG_MESSAGE,
                failure.error.to_string(),
                failure.attempts,
            );
        }

        self.fallback(preferred, &build, failure.error.to_string(), failure.attempts)
            .await
    }

    async fn fallback<B>(
        &self,
        preferred: ProviderKind,
        build: &B,
        reason: String,
        prior_attempts: u32,
    ) -> RoutedResponse
    where
        B: Fn(ProviderKind) -> ChatRequest,
    {
        let alternate = preferred.alternate();
        let Some(client) = self.client(alternate).cloned() else {
            warn!(preferred = %preferred, alternate = %alternate, "No backup provider configured");
            return RoutedResponse::failed(
                format!(
                    "I'm currently experiencing issues with my primary AI service ({}). \
                     Unfortunately, the backup service is also not available. \
                     Please try again in a few minutes or contact support if this persists.",
                    reason
                ),
                reason,
                prior_attempts,
            );
        };

        info!(preferred = %preferred, alternate = %alternate, reason = %reason, "Falling back to alternate provider");

        let request = build(alternate);
        let operation = format!("{}_fallback_chat", alternate);
        let outcome = retry_with_backoff(
            &self.fallback_retry,
            RetryPolicy::RateLimitOnly,
            &operation,
            || {
                let client = Arc::clone(&client);
                let request = request.clone();
                async move { client.chat(request).await }
            },
        )
        .await;

        match outcome {
            Ok(retried) => RoutedResponse::answered(
                format!(
                    "{}\n\n{}",
                    retried.value.message.content,
                    attribution_note(preferred, alternate)
                ),
                ResponseSource::Fallback {
                    provider: alternate,
                },
                prior_attempts + retried.attempts,
            ),
            Err(failure) => {
                let attempts = prior_attempts + failure.attempts;
                // RateLimitOnly retries every rate limit, so one surfacing
                // here means the attempts ran out.
                if failure.error.is_rate_limit() {
                    RoutedResponse::failed(
                        BOTH_RATE_LIMITED_MESSAGE,
                        "All models experiencing rate limits",
                        attempts,
                    )
                } else {
                    warn!(provider = %alternate, error = %failure.error, "Fallback provider failed");
                    RoutedResponse::failed(
                        FALLBACK_FAILED_MESSAGE,
                        format!("Error: {}", failure.error),
                        attempts,
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use llm::{ChatResponse, Message};
    use parking_lot::Mutex;
    use std::collections::{HashMap, VecDeque};

    /// Replays a fixed script of outcomes, then repeats the last one.
    struct ScriptedModel {
        provider: ProviderKind,
        script: Mutex<VecDeque<Step>>,
        calls: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedModel {
        fn new(provider: ProviderKind, script: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                provider,
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn chat(&self, request: ChatRequest) -> llm::Result<ChatResponse> {
            self.calls.lock().push(request);
            let mut script = self.script.lock();
            let step = if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            };
            match step.expect("script must not be empty") {
                Ok(text) => Ok(ChatResponse {
                    message: Message::assistant(text),
                    usage: None,
                    metadata: HashMap::new(),
                }),
                Err(make) => Err(make()),
            }
        }

        fn provider(&self) -> ProviderKind {
            self.provider
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn fast() -> RetryConfig {
        RetryConfig::new(2).with_initial_backoff(1).with_jitter(false)
    }

    fn router(openai: Option<Arc<ScriptedModel>>, gemini: Option<Arc<ScriptedModel>>) -> ModelRouter {
        ModelRouter::new(
            openai.map(|m| m as Arc<dyn ChatModel>),
            gemini.map(|m| m as Arc<dyn ChatModel>),
        )
        .with_primary_retry(fast())
        .with_fallback_retry(fast())
    }

    fn request(_: ProviderKind) -> ChatRequest {
        ChatRequest::new(vec![Message::user("How many projects are active?")])
    }

    type Step = Result<String, fn() -> LlmError>;

    fn reply(text: &str) -> Step {
        Ok(text.to_string())
    }

    fn fail(make: fn() -> LlmError) -> Step {
        Err(make)
    }

    fn rate_limited() -> LlmError {
        LlmError::RateLimitExceeded("429".into())
    }

    fn unavailable() -> LlmError {
        LlmError::ServiceUnavailable("503".into())
    }

    fn unauthorized() -> LlmError {
        LlmError::AuthenticationError("401".into())
    }

    #[test]
    fn test_source_labels_round_trip() {
        for label in [
            "gemini",
            "openai",
            "gemini-with-search",
            "openai-with-search",
            "gemini-fallback",
            "openai-fallback",
            "sql-query",
            "error",
        ] {
            let source: ResponseSource = label.parse().unwrap();
            assert_eq!(source.label(), label);
        }
        assert!("claude".parse::<ResponseSource>().is_err());
    }

    #[tokio::test]
    async fn test_preferred_provider_answers() {
        let gemini = ScriptedModel::new(ProviderKind::Gemini, vec![reply("Four projects.")]);
        let openai = ScriptedModel::new(ProviderKind::OpenAi, vec![reply("unused")]);
        let router = router(Some(openai.clone()), Some(gemini.clone()));

        let routed = router.route(ProviderKind::Gemini, false, request).await;

        assert_eq!(routed.content, "Four projects.");
        assert_eq!(routed.source.label(), "gemini");
        assert_eq!(routed.error, None);
        assert_eq!(openai.call_count(), 0);
    }

    #[tokio::test]
    async fn test_search_label() {
        let openai = ScriptedModel::new(ProviderKind::OpenAi, vec![reply("News.")]);
        let router = router(Some(openai), None);

        let routed = router.route(ProviderKind::OpenAi, true, request).await;
        assert_eq!(routed.source.label(), "openai-with-search");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_before_fallback() {
        let gemini = ScriptedModel::new(
            ProviderKind::Gemini,
            vec![fail(unavailable), reply("Recovered.")],
        );
        let openai = ScriptedModel::new(ProviderKind::OpenAi, vec![reply("unused")]);
        let router = router(Some(openai.clone()), Some(gemini.clone()));

        let routed = router.route(ProviderKind::Gemini, false, request).await;

        assert_eq!(routed.content, "Recovered.");
        assert_eq!(routed.source.label(), "gemini");
        assert_eq!(routed.attempts, 2);
        assert_eq!(openai.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_after_exhausting_retries() {
        let openai = ScriptedModel::new(ProviderKind::OpenAi, vec![fail(rate_limited)]);
        let gemini = ScriptedModel::new(ProviderKind::Gemini, vec![reply("Backup answer.")]);
        let router = router(Some(openai.clone()), Some(gemini.clone()));

        let routed = router.route(ProviderKind::OpenAi, false, request).await;

        assert_eq!(openai.call_count(), 3);
        assert_eq!(gemini.call_count(), 1);
        assert_eq!(routed.source.label(), "gemini-fallback");
        assert_eq!(routed.provider, Some(ProviderKind::Gemini));
        assert!(routed.content.starts_with("Backup answer."));
        assert!(routed.content.contains("Google Gemini 2.5-Flash as backup"));
        assert_eq!(routed.attempts, 4);
    }

    #[tokio::test]
    async fn test_auth_error_does_not_fall_back() {
        let openai = ScriptedModel::new(ProviderKind::OpenAi, vec![fail(unauthorized)]);
        let gemini = ScriptedModel::new(ProviderKind::Gemini, vec![reply("unused")]);
        let router = router(Some(openai.clone()), Some(gemini.clone()));

        let routed = router.route(ProviderKind::OpenAi, false, request).await;

        assert_eq!(routed.source, ResponseSource::Error);
        assert_eq!(
            routed.content,
            "There's an issue with the OPENAI API configuration. Please check your API key settings."
        );
        assert_eq!(openai.call_count(), 1);
        assert_eq!(gemini.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_preferred_client_is_configuration_error() {
        let openai = ScriptedModel::new(ProviderKind::OpenAi, vec![reply("unused")]);
        let router = router(Some(openai.clone()), None);

        let routed = router.route(ProviderKind::Gemini, false, request).await;

        assert!(routed.source.is_error());
        assert!(routed.content.contains("GEMINI API configuration"));
        assert_eq!(openai.call_count(), 0);
    }

    #[tokio::test]
    async fn test_context_length_does_not_fall_back() {
        let gemini = ScriptedModel::new(
            ProviderKind::Gemini,
            vec![fail(|| LlmError::ContextLengthExceeded("too many tokens".into()))],
        );
        let openai = ScriptedModel::new(ProviderKind::OpenAi, vec![reply("unused")]);
        let router = router(Some(openai.clone()), Some(gemini));

        let routed = router.route(ProviderKind::Gemini, false, request).await;

        assert_eq!(routed.content, CONTEXT_TOO_LONG_MESSAGE);
        assert_eq!(openai.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_rate_limited() {
        let openai = ScriptedModel::new(ProviderKind::OpenAi, vec![fail(rate_limited)]);
        let gemini = ScriptedModel::new(ProviderKind::Gemini, vec![fail(rate_limited)]);
        let router = router(Some(openai), Some(gemini.clone()));

        let routed = router.route(ProviderKind::OpenAi, false, request).await;

        assert_eq!(routed.content, BOTH_RATE_LIMITED_MESSAGE);
        assert_eq!(routed.error.as_deref(), Some("All models experiencing rate limits"));
        assert_eq!(gemini.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_fallback_without_retries() {
        let openai = ScriptedModel::new(ProviderKind::OpenAi, vec![fail(unavailable)]);
        let gemini = ScriptedModel::new(ProviderKind::Gemini, vec![fail(rate_limited)]);
        let router = router(Some(openai), Some(gemini.clone())).with_fallback_retry(RetryConfig::new(0));

        let routed = router.route(ProviderKind::OpenAi, false, request).await;

        assert_eq!(routed.content, BOTH_RATE_LIMITED_MESSAGE);
        assert_eq!(routed.source, ResponseSource::Error);
        assert_eq!(gemini.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_non_rate_limit_error_stops_immediately() {
        let gemini = ScriptedModel::new(ProviderKind::Gemini, vec![fail(unavailable)]);
        let openai = ScriptedModel::new(
            ProviderKind::OpenAi,
            vec![fail(|| LlmError::InvalidResponse("garbled".into()))],
        );
        let router = router(Some(openai.clone()), Some(gemini));

        let routed = router.route(ProviderKind::Gemini, false, request).await;

        assert_eq!(routed.content, FALLBACK_FAILED_MESSAGE);
        assert!(routed.error.unwrap().starts_with("Error: "));
        assert_eq!(openai.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_backup_configured() {
        let gemini = ScriptedModel::new(ProviderKind::Gemini, vec![fail(unavailable)]);
        let router = router(None, Some(gemini));

        let routed = router.route(ProviderKind::Gemini, false, request).await;

        assert!(routed.source.is_error());
        assert!(routed.content.contains("backup service is also not available"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_receives_provider_specific_request() {
        let openai = ScriptedModel::new(ProviderKind::OpenAi, vec![fail(unavailable)]);
        let gemini = ScriptedModel::new(ProviderKind::Gemini, vec![reply("ok")]);
        let router = router(Some(openai), Some(gemini.clone()));

        router
            .route(ProviderKind::OpenAi, false, |provider| {
                ChatRequest::new(vec![Message::user(format!("for {}", provider))])
            })
            .await;

        let calls = gemini.calls.lock();
        assert_eq!(calls[0].messages[0].content, "for gemini");
    }
}
