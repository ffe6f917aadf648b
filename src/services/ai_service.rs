use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AiConfig;
use crate::error::{AiErrorCode, AppError, AppResult};
use crate::models::schedule::ExternalScheduleItem;
use crate::models::task::TaskRecord;
use crate::services::prompt_templates::{build_schedule_prompt, build_suggestion_prompt};

static JSON_ARRAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\[.*\]").expect("static regex compiles")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    Suggestion,
    Schedule,
}

impl GenerationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationKind::Suggestion => "suggestion",
            GenerationKind::Schedule => "schedule",
        }
    }

    fn max_tokens(self) -> u32 {
        match self {
            GenerationKind::Suggestion => 1536,
            GenerationKind::Schedule => 2048,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub kind: GenerationKind,
    pub prompt: String,
}

/// Anything that can turn a prompt into text. The HTTP implementation is
/// [`ChatCompletionsProvider`]; tests plug in their own.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn provider_id(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> AppResult<String>;
}

/// Facade over the configured generator. Every call is bounded by the
/// configured timeout and never retried.
#[derive(Clone)]
pub struct AiService {
    generator: Option<Arc<dyn TextGenerator>>,
    timeout: Duration,
}

impl AiService {
    pub fn new(config: &AiConfig) -> AppResult<Self> {
        let generator = match &config.api_key {
            Some(api_key) => {
                let provider = ChatCompletionsProvider::try_new(config, api_key.clone())?;
                Some(Arc::new(provider) as Arc<dyn TextGenerator>)
            }
            None => {
                warn!(target: "app::ai", "AI_API_KEY not set; AI features disabled");
                None
            }
        };

        Ok(Self {
            generator,
            timeout: config.timeout,
        })
    }

    pub fn with_generator(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self {
            generator: Some(generator),
            timeout,
        }
    }

    pub fn disabled() -> Self {
        Self {
            generator: None,
            timeout: AiConfig::default().timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn generate(&self, request: CompletionRequest) -> AppResult<String> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| AppError::ai(AiErrorCode::MissingApiKey, "AI service not configured"))?;

        debug!(
            target: "app::ai",
            provider = generator.provider_id(),
            kind = request.kind.as_str(),
            prompt_len = request.prompt.len(),
            "invoking text generator"
        );

        match tokio::time::timeout(self.timeout, generator.complete(&request)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::ai_with_details(
                AiErrorCode::HttpTimeout,
                "AI request timed out",
                None,
                Some(json!({ "timeoutMs": self.timeout.as_millis() as u64 })),
            )),
        }
    }

    /// One to two sentences of advice for a single task.
    pub async fn suggest_for_task(&self, task: &TaskRecord) -> AppResult<String> {
        let text = self
            .generate(CompletionRequest {
                kind: GenerationKind::Suggestion,
                prompt: build_suggestion_prompt(task),
            })
            .await?;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AppError::ai(
                AiErrorCode::EmptyResponse,
                "Empty AI suggestion generated",
            ));
        }
        Ok(trimmed.to_string())
    }

    /// Raw schedule items for the given tasks, validated at this boundary.
    pub async fn schedule_items(&self, tasks: &[TaskRecord]) -> AppResult<Vec<ExternalScheduleItem>> {
        let text = self
            .generate(CompletionRequest {
                kind: GenerationKind::Schedule,
                prompt: build_schedule_prompt(tasks),
            })
            .await?;
        debug!(target: "app::ai", response_len = text.len(), "schedule response received");
        parse_schedule_items(&text)
    }
}

/// Extracts the schedule array from model output that may be wrapped in
/// markdown fences or surrounded by prose.
pub fn parse_schedule_items(raw: &str) -> AppResult<Vec<ExternalScheduleItem>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::ai(
            AiErrorCode::EmptyResponse,
            "Empty schedule response",
        ));
    }

    let unfenced = if trimmed.starts_with("```") {
        trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```JSON")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        trimmed
    };

    let candidate = JSON_ARRAY
        .find(unfenced)
        .map(|found| found.as_str())
        .unwrap_or(unfenced);

    let items: Vec<ExternalScheduleItem> = serde_json::from_str(candidate).map_err(|err| {
        AppError::ai_with_details(
            AiErrorCode::InvalidResponse,
            format!("schedule response is not a JSON array of items: {err}"),
            None,
            Some(json!({ "reason": "invalid_json" })),
        )
    })?;

    if items.is_empty() {
        return Err(AppError::ai(
            AiErrorCode::EmptyResponse,
            "schedule response contained no items",
        ));
    }

    Ok(items)
}

/// OpenAI-compatible `chat/completions` client.
pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl ChatCompletionsProvider {
    pub fn try_new(config: &AiConfig, api_key: String) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|err| AppError::other(format!("failed to build AI HTTP client: {err}")))?;
        let base_url = config.base_url.trim_end_matches('/');

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{base_url}/chat/completions"),
            model: config.model.clone(),
        })
    }

    fn build_request_body(&self, request: &CompletionRequest) -> JsonValue {
        json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": request.prompt }
            ],
            "temperature": 0.7,
            "top_p": 0.7,
            "frequency_penalty": 1,
            "max_tokens": request.kind.max_tokens(),
        })
    }

    fn map_http_error(status: StatusCode, correlation_id: &str) -> AppError {
        let (code, message) = match status {
            StatusCode::UNAUTHORIZED => (
                AiErrorCode::MissingApiKey,
                "AI API key is invalid or unauthorized".to_string(),
            ),
            StatusCode::FORBIDDEN => (
                AiErrorCode::Forbidden,
                "AI API access forbidden".to_string(),
            ),
            StatusCode::TOO_MANY_REQUESTS => (
                AiErrorCode::RateLimited,
                "AI API rate limit reached".to_string(),
            ),
            status if status.is_server_error() => (
                AiErrorCode::ServiceUnavailable,
                format!("AI service unavailable (status {})", status.as_u16()),
            ),
            StatusCode::BAD_REQUEST => (
                AiErrorCode::InvalidRequest,
                "AI request rejected as malformed".to_string(),
            ),
            StatusCode::NOT_FOUND => (
                AiErrorCode::InvalidRequest,
                "AI endpoint not found".to_string(),
            ),
            status => (
                AiErrorCode::Unknown,
                format!("AI service returned status {}", status.as_u16()),
            ),
        };
        AppError::ai_with_details(code, message, Some(correlation_id), None)
    }

    fn error_from_reqwest(err: reqwest::Error, correlation_id: &str) -> AppError {
        if err.is_timeout() {
            AppError::ai_with_details(
                AiErrorCode::HttpTimeout,
                "AI request timed out",
                Some(correlation_id),
                None,
            )
        } else if err.is_connect() {
            AppError::ai_with_details(
                AiErrorCode::ServiceUnavailable,
                "AI service unreachable",
                Some(correlation_id),
                None,
            )
        } else if let Some(status) = err.status() {
            Self::map_http_error(status, correlation_id)
        } else {
            AppError::ai_with_details(
                AiErrorCode::Unknown,
                format!("AI request failed: {err}"),
                Some(correlation_id),
                None,
            )
        }
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsProvider {
    fn provider_id(&self) -> &str {
        "chat-completions"
    }

    async fn complete(&self, request: &CompletionRequest) -> AppResult<String> {
        let correlation_id = Uuid::new_v4().to_string();
        let body = self.build_request_body(request);

        debug!(
            target: "app::ai::http",
            correlation_id = %correlation_id,
            kind = request.kind.as_str(),
            model = %self.model,
            "sending chat completion request"
        );

        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| Self::error_from_reqwest(err, &correlation_id))?;

        let status = response.status();
        let latency_ms = start.elapsed().as_millis() as u64;
        if !status.is_success() {
            warn!(
                target: "app::ai::http",
                correlation_id = %correlation_id,
                status = status.as_u16(),
                latency_ms,
                "AI service returned non-success status"
            );
            return Err(Self::map_http_error(status, &correlation_id));
        }

        let payload: JsonValue = response.json().await.map_err(|err| {
            AppError::ai_with_details(
                AiErrorCode::InvalidResponse,
                "failed to decode AI response body",
                Some(correlation_id.as_str()),
                Some(json!({ "reason": err.to_string() })),
            )
        })?;

        let has_choices = payload
            .get("choices")
            .and_then(|choices| choices.as_array())
            .is_some_and(|choices| !choices.is_empty());
        if !has_choices {
            return Err(AppError::ai_with_details(
                AiErrorCode::EmptyResponse,
                "AI response contained no choices",
                Some(correlation_id.as_str()),
                None,
            ));
        }

        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(|value| value.as_str())
            .map(str::trim)
            .unwrap_or_default();
        if content.is_empty() {
            return Err(AppError::ai_with_details(
                AiErrorCode::EmptyResponse,
                "AI response message was empty",
                Some(correlation_id.as_str()),
                None,
            ));
        }

        debug!(
            target: "app::ai::http",
            correlation_id = %correlation_id,
            latency_ms,
            response_len = content.len(),
            "chat completion received"
        );

        Ok(content.to_string())
    }
}

pub mod testing {
    use super::*;

    /// Exposes the status mapping for integration tests.
    pub fn map_http_error(status: StatusCode) -> AppError {
        ChatCompletionsProvider::map_http_error(status, "test-correlation-id")
    }
}
