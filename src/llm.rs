use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::chunker::truncate_chars;
use crate::error::{QuizError, Result};
use crate::question::{GeneratedQuestion, CHOICE_COUNT};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Lesson characters sent to the model at most.
pub const DEFAULT_MODEL_CHAR_LIMIT: usize = 40_000;

const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant that writes multiple-choice questions. \
     Return STRICT JSON ONLY with no extra text.";

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```(?:json)?\s*(.*?)```").expect("fence pattern is valid"));

/// Knobs for the remote strategy. Defaults target gpt-4o-mini on the
/// OpenAI API.
#[derive(Debug, Clone)]
pub struct RemoteOptions {
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
    pub base_url: String,
    pub max_chars: usize,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_chars: DEFAULT_MODEL_CHAR_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Body of a chat-completions request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// A completion service reachable with a caller-supplied bearer key.
///
/// Returns the text content of the first completion choice.
pub trait CompletionBackend {
    fn complete(
        &self,
        api_key: &str,
        request: &ChatRequest,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// OpenAI-compatible chat-completions endpoint over HTTPS.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl CompletionBackend for OpenAiClient {
    async fn complete(&self, api_key: &str, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("POST {} (model {})", url, request.model);

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = if body.is_empty() {
                status.canonical_reason().unwrap_or("").to_string()
            } else {
                body
            };
            warn!("Completion service answered {}", status);
            return Err(QuizError::RemoteService {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: ChatResponse = response
            .json()
            .await
            .map_err(|e| QuizError::Parse(format!("unexpected response envelope: {}", e)))?;

        Ok(envelope
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

/// A key must look like `sk-<something>` before any request is sent.
pub fn is_plausible_key(api_key: &str) -> bool {
    api_key
        .strip_prefix("sk-")
        .is_some_and(|rest| !rest.trim().is_empty() && !rest.contains(char::is_whitespace))
}

/// The text actually sent to the model.
pub fn truncate_for_model(text: &str, max_chars: usize) -> &str {
    truncate_chars(text, max_chars)
}

/// Builds the structured request for `count` four-choice questions.
pub fn build_request(text: &str, count: usize, opts: &RemoteOptions) -> ChatRequest {
    let lesson = truncate_for_model(text, opts.max_chars);

    let user = format!(
        r#"
Create {count} multiple-choice questions from the following lesson content.

Rules:
- Each question must have exactly 4 choices.
- Provide an integer 'answerIndex' (0..3) for the correct choice.
- Choices must be concise.
- Use the exact JSON schema below.

Schema (JSON only):
{{
  "questions": [
    {{
      "prompt": "string",
      "choices": ["string", "string", "string", "string"],
      "answerIndex": 0
    }}
  ]
}}

Lesson:
"""{lesson}"""
"#
    );

    ChatRequest {
        model: opts.model.clone(),
        temperature: opts.temperature,
        messages: vec![
            ChatMessage {
                role: "system",
                content: opts.system_prompt.clone(),
            },
            ChatMessage {
                role: "user",
                content: user,
            },
        ],
        response_format: ResponseFormat {
            kind: "json_object",
        },
    }
}

/// Outcome of validating one item of a completion.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedItem {
    Valid(GeneratedQuestion),
    Rejected(String),
}

/// Parses completion text as JSON, retrying once on the first fenced code
/// block when the raw text is not JSON.
pub fn parse_json_content(content: &str) -> Result<Value> {
    match serde_json::from_str::<Value>(content.trim()) {
        Ok(v) => Ok(v),
        Err(direct) => {
            let inner = FENCED_JSON
                .captures(content)
                .and_then(|c| c.get(1))
                .ok_or_else(|| QuizError::Parse(direct.to_string()))?;
            serde_json::from_str::<Value>(inner.as_str().trim())
                .map_err(|e| QuizError::Parse(format!("fenced block: {}", e)))
        }
    }
}

/// Validates every element of the `questions` array.
pub fn parse_items(payload: &Value) -> Vec<ParsedItem> {
    match payload.get("questions").and_then(Value::as_array) {
        Some(items) => items.iter().map(parse_item).collect(),
        None => Vec::new(),
    }
}

fn parse_item(item: &Value) -> ParsedItem {
    let prompt = match item.get("prompt").and_then(Value::as_str).map(str::trim) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => return ParsedItem::Rejected("missing or empty prompt".to_string()),
    };

    let raw_choices = match item.get("choices").and_then(Value::as_array) {
        Some(c) if c.len() == CHOICE_COUNT => c,
        Some(c) => return ParsedItem::Rejected(format!("{} choices instead of 4", c.len())),
        None => return ParsedItem::Rejected("missing choices".to_string()),
    };
    let mut choices = Vec::with_capacity(CHOICE_COUNT);
    for choice in raw_choices {
        match choice {
            Value::String(s) => choices.push(s.trim().to_string()),
            Value::Number(n) => choices.push(n.to_string()),
            other => return ParsedItem::Rejected(format!("choice is not text: {}", other)),
        }
    }

    let answer = match item.get("answerIndex").and_then(Value::as_f64) {
        Some(a) if a.is_finite() => a,
        _ => return ParsedItem::Rejected("missing or non-numeric answerIndex".to_string()),
    };
    let answer_index = answer.round().clamp(0.0, (CHOICE_COUNT - 1) as f64) as usize;

    match GeneratedQuestion::new(prompt, choices, answer_index) {
        Ok(q) => ParsedItem::Valid(q),
        Err(reason) => ParsedItem::Rejected(reason),
    }
}

/// Turns completion text into at most `count` validated questions.
pub fn parse_completion(content: &str, count: usize) -> Result<Vec<GeneratedQuestion>> {
    let payload = parse_json_content(content)?;

    let mut questions = Vec::new();
    for (i, item) in parse_items(&payload).into_iter().enumerate() {
        match item {
            ParsedItem::Valid(q) => questions.push(q),
            ParsedItem::Rejected(reason) => debug!("Dropped item {}: {}", i, reason),
        }
    }

    if questions.is_empty() {
        return Err(QuizError::NoValidQuestions);
    }
    questions.truncate(count);
    Ok(questions)
}

/// Asks the completion service for `count` questions about `text`.
///
/// May return fewer than `count` when the model produced invalid items;
/// never more.
pub async fn generate_remote<B: CompletionBackend>(
    backend: &B,
    text: &str,
    count: usize,
    api_key: &str,
    opts: &RemoteOptions,
) -> Result<Vec<GeneratedQuestion>> {
    if !is_plausible_key(api_key) {
        return Err(QuizError::InvalidKey);
    }

    let request = build_request(text, count, opts);
    let content = backend.complete(api_key, &request).await?;
    let questions = parse_completion(&content, count)?;

    info!(
        "Remote generation returned {} of {} requested questions",
        questions.len(),
        count
    );
    Ok(questions)
}
