//! Translation gateway: natural-language question in, SQL text out.

use crate::config::LlmSettings;
use crate::error::{BotError, Result, TranslationError};
use crate::prompts::TranslationRequest;
use async_trait::async_trait;
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

/// Upper bound for one model call, including reading the body.
pub const TRANSLATION_TIMEOUT: Duration = Duration::from_secs(180);

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"(?i)```(?:sql|postgresql|postgres|pgsql)?").unwrap();
}

/// Anything that can turn a question into SQL text.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, question: &str) -> std::result::Result<String, TranslationError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client (OpenRouter / OpenAI wire format).
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| BotError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            base_url: settings.base_url.clone(),
            max_tokens: settings.max_tokens,
            timeout: TRANSLATION_TIMEOUT,
        })
    }

    /// Override the call timeout. Production code keeps the default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn complete(
        &self,
        request: &TranslationRequest,
    ) -> std::result::Result<String, TranslationError> {
        let user_prompt = request.user_prompt();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system_prompt(),
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: 0.0,
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, "Sending request to LLM API");

        let call = async {
            let response = self
                .http
                .post(&self.base_url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| TranslationError::Network(e.to_string()))?;
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .map_err(|e| TranslationError::Network(e.to_string()))?;
            Ok::<_, TranslationError>((status, text))
        };

        let (status, text) = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| TranslationError::Timeout(self.timeout.as_secs()))??;

        parse_completion(status, &text)
    }
}

#[async_trait]
impl Translator for LlmClient {
    async fn translate(&self, question: &str) -> std::result::Result<String, TranslationError> {
        info!(question, "Generating SQL");
        let request = TranslationRequest::new(question, Utc::now().date_naive());

        let result = self.complete(&request).await;
        match &result {
            Ok(sql) => info!(sql = %sql, "LLM returned SQL"),
            Err(e) => error!(error = %e, "SQL generation failed"),
        }
        result
    }
}

/// Turn a raw HTTP status and body into SQL text.
pub fn parse_completion(status: u16, body: &str) -> std::result::Result<String, TranslationError> {
    if status != 200 {
        return Err(TranslationError::Status {
            status,
            body: body.chars().take(500).collect(),
        });
    }

    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| TranslationError::Malformed(e.to_string()))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(TranslationError::EmptyResponse)?;

    let sql = strip_code_fences(&choice.message.content.unwrap_or_default());
    if sql.is_empty() {
        return Err(TranslationError::EmptyResponse);
    }
    Ok(sql)
}

/// Remove markdown code fences (```` ``` ```` and ```` ```sql ````) wherever they appear.
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text.trim(), "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```sql\nSELECT 1;\n```"), "SELECT 1;");
        assert_eq!(strip_code_fences("```\nSELECT 1\n```\n"), "SELECT 1");
        assert_eq!(strip_code_fences("```SQL SELECT 1```"), "SELECT 1");
        assert_eq!(strip_code_fences("  SELECT 1  "), "SELECT 1");
    }

    #[test]
    fn test_parse_completion_success() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"```sql\nSELECT COUNT(*) FROM videos;\n```"}}]}"#;
        assert_eq!(
            parse_completion(200, body).unwrap(),
            "SELECT COUNT(*) FROM videos;"
        );
    }

    #[test]
    fn test_parse_completion_uses_first_choice() {
        let body = r#"{"choices":[{"message":{"content":"SELECT 1"}},{"message":{"content":"SELECT 2"}}]}"#;
        assert_eq!(parse_completion(200, body).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_parse_completion_failures() {
        assert!(matches!(
            parse_completion(429, "rate limited"),
            Err(TranslationError::Status { status: 429, .. })
        ));
        assert!(matches!(
            parse_completion(200, r#"{"choices":[]}"#),
            Err(TranslationError::EmptyResponse)
        ));
        assert!(matches!(
            parse_completion(200, r#"{"error":"x"}"#),
            Err(TranslationError::EmptyResponse)
        ));
        assert!(matches!(
            parse_completion(200, r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(TranslationError::EmptyResponse)
        ));
        assert!(matches!(
            parse_completion(200, "<html>"),
            Err(TranslationError::Malformed(_))
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let body = ChatRequest {
            model: "m",
            messages: vec![
                ChatMessage { role: "system", content: "s" },
                ChatMessage { role: "user", content: "u" },
            ],
            temperature: 0.0,
            max_tokens: 1000,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["max_tokens"], 1000);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "u");
    }
}
