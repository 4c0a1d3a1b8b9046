//! Telegram Bot API transport (long polling).
//!
//! Each text message becomes one independent pipeline run on its own task.
//! `/start` gets a greeting instead.

use crate::error::{BotError, Result};
use crate::pipeline::{Pipeline, Responder};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};

pub const GREETING: &str = "Введите запрос";

const POLL_TIMEOUT_SECS: u64 = 30;
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

/// What an inbound message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Start,
    Question(String),
    Ignored,
}

pub fn classify(message: &Message) -> Inbound {
    let Some(text) = message.text.as_deref() else {
        return Inbound::Ignored;
    };
    let text = text.trim();
    if text.is_empty() {
        return Inbound::Ignored;
    }

    let command = text.split_whitespace().next().unwrap_or_default();
    if command == "/start" || command.starts_with("/start@") {
        return Inbound::Start;
    }
    Inbound::Question(text.to_string())
}

pub struct TelegramApi {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramApi {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(format!("https://api.telegram.org/bot{}", token))
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()
            .map_err(|e| BotError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    // Errors are stripped of the URL, which embeds the bot token.
    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BotError::Transport(format!("{} failed: {}", method, e.without_url())))?;

        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            BotError::Transport(format!("{} returned invalid JSON: {}", method, e.without_url()))
        })?;

        if !envelope.ok {
            return Err(BotError::Transport(format!(
                "{} rejected: {}",
                method,
                envelope.description.unwrap_or_default()
            )));
        }
        envelope
            .result
            .ok_or_else(|| BotError::Transport(format!("{} returned no result", method)))
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let request = GetUpdates {
            offset,
            timeout: POLL_TIMEOUT_SECS,
            allowed_updates: ["message"],
        };
        self.call("getUpdates", &request).await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call("sendMessage", &SendMessage { chat_id, text })
            .await?;
        Ok(())
    }
}

/// Replies into the chat a message came from.
pub struct ChatReply {
    api: Arc<TelegramApi>,
    chat_id: i64,
}

impl ChatReply {
    pub fn new(api: Arc<TelegramApi>, chat_id: i64) -> Self {
        Self { api, chat_id }
    }
}

#[async_trait]
impl Responder for ChatReply {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.api.send_message(self.chat_id, text).await
    }
}

pub struct TelegramBot {
    api: Arc<TelegramApi>,
    pipeline: Arc<Pipeline>,
}

impl TelegramBot {
    pub fn new(api: TelegramApi, pipeline: Arc<Pipeline>) -> Self {
        Self {
            api: Arc::new(api),
            pipeline,
        }
    }

    /// Poll until `shutdown` resolves, then abort whatever is still running.
    pub async fn run<S>(&self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut offset: i64 = 0;
        let mut tasks = JoinSet::new();
        info!("Bot started, waiting for messages");

        'poll: loop {
            while let Some(finished) = tasks.try_join_next() {
                if let Err(e) = finished {
                    if e.is_panic() {
                        error!(error = %e, "Message task panicked");
                    }
                }
            }

            tokio::select! {
                _ = &mut shutdown => break 'poll,
                updates = self.api.get_updates(offset) => match updates {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            self.dispatch(update, &mut tasks);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Polling failed, retrying");
                        tokio::select! {
                            _ = &mut shutdown => break 'poll,
                            _ = tokio::time::sleep(RETRY_DELAY) => {}
                        }
                    }
                }
            }
        }

        info!(in_flight = tasks.len(), "Shutting down, aborting in-flight runs");
        tasks.shutdown().await;
    }

    fn dispatch(&self, update: Update, tasks: &mut JoinSet<()>) {
        let Some(message) = update.message else {
            return;
        };
        let chat_id = message.chat.id;
        let user_id = message.from.as_ref().map_or(chat_id, |user| user.id);
        let reply = ChatReply::new(self.api.clone(), chat_id);

        match classify(&message) {
            Inbound::Ignored => {}
            Inbound::Start => {
                info!(user_id, "User started the bot");
                tasks.spawn(async move {
                    if let Err(e) = reply.send_text(GREETING).await {
                        error!(error = %e, "Failed to send greeting");
                    }
                });
            }
            Inbound::Question(question) => {
                let pipeline = self.pipeline.clone();
                let span = info_span!("message", user_id, chat_id);
                tasks.spawn(
                    async move {
                        if let Err(e) = pipeline.handle(&question, &reply).await {
                            error!(error = %e, "Failed to deliver reply");
                        }
                    }
                    .instrument(span),
                );
            }
        }
    }
}
