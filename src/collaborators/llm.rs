use super::prompts::{QUERY_SYSTEM_PROMPT, answer_prompt, query_prompt};
use super::{AnswerSynthesizer, QueryGenerator, QueryOutcome};
use crate::errors::CollaboratorError;
use crate::util::{extract_json_object, strip_code_fence};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Message in a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Structured reply expected from the query generator.
#[derive(Debug, Deserialize)]
struct QueryReply {
    #[serde(default)]
    query: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
    json_mode: bool,
}

impl ChatClient {
    /// Create a client. `timeout` bounds every request end to end.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            temperature: 0.0,
            json_mode: true,
        })
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Whether to request `response_format: json_object` for structured replies.
    /// Some compatible servers reject the field.
    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a chat completion and return the first choice's text.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        structured: bool,
    ) -> Result<String, CollaboratorError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            response_format: (structured && self.json_mode).then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let start = Instant::now();
        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(CollaboratorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = resp.json().await?;
        debug!(
            model = %self.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Chat completion received"
        );

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CollaboratorError::EmptyResponse)
    }
}

/// Interpret the query generator's reply.
///
/// Preferred shape is a JSON object `{"query": "..."}`, either as the whole
/// reply or embedded in prose. Anything else is taken as SQL after stripping
/// any Markdown code fence.
pub fn parse_query_reply(reply: &str) -> QueryOutcome {
    let trimmed = reply.trim();
    let parsed = serde_json::from_str::<QueryReply>(trimmed).ok().or_else(|| {
        extract_json_object(trimmed).and_then(|json| serde_json::from_str::<QueryReply>(&json).ok())
    });

    if let Some(parsed) = parsed {
        return match parsed.query.map(|q| strip_code_fence(&q).trim().to_string()) {
            Some(query) if !query.is_empty() => QueryOutcome::Query(query),
            _ => QueryOutcome::failure(CollaboratorError::MalformedResponse(
                "reply JSON has no usable \"query\" field".to_string(),
            )),
        };
    }

    // A JSON-looking reply that failed to parse must never reach the database.
    if trimmed.starts_with('{') {
        return QueryOutcome::failure(CollaboratorError::MalformedResponse(
            "reply is not a valid JSON object".to_string(),
        ));
    }

    let sql = strip_code_fence(trimmed).trim().to_string();
    if sql.is_empty() {
        QueryOutcome::failure("empty reply")
    } else {
        QueryOutcome::Query(sql)
    }
}

/// [`QueryGenerator`] backed by a chat model.
pub struct LlmQueryGenerator {
    chat: Arc<ChatClient>,
    top_k: usize,
}

impl LlmQueryGenerator {
    pub fn new(chat: Arc<ChatClient>, top_k: usize) -> Self {
        Self { chat, top_k }
    }
}

#[async_trait]
impl QueryGenerator for LlmQueryGenerator {
    async fn generate(&self, question: &str, schema: &str, dialect: &str) -> QueryOutcome {
        let messages = [
            ChatMessage::system(QUERY_SYSTEM_PROMPT),
            ChatMessage::user(query_prompt(question, schema, dialect, self.top_k)),
        ];
        match self.chat.complete(&messages, true).await {
            Ok(reply) => {
                debug!(reply = %reply, "Raw query generator reply");
                parse_query_reply(&reply)
            }
            Err(e) => {
                warn!(error = %e, "Query generation call failed");
                QueryOutcome::failure(e)
            }
        }
    }
}

/// [`AnswerSynthesizer`] backed by a chat model.
pub struct LlmAnswerSynthesizer {
    chat: Arc<ChatClient>,
}

impl LlmAnswerSynthesizer {
    pub fn new(chat: Arc<ChatClient>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl AnswerSynthesizer for LlmAnswerSynthesizer {
    async fn synthesize(
        &self,
        question: &str,
        sql: &str,
        result: &str,
    ) -> Result<String, CollaboratorError> {
        let messages = [ChatMessage::user(answer_prompt(question, sql, result))];
        let answer = self.chat.complete(&messages, false).await?;
        Ok(answer.trim().to_string())
    }
}
