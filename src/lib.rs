//! Telegram bot that answers analytics questions about a video-statistics
//! dataset by translating them to SQL with an LLM and running the query
//! against Postgres.

pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod policy;
pub mod prompts;
pub mod telemetry;
pub mod transport;

pub use error::{BotError, Result, TranslationError};
pub use pipeline::{Pipeline, Responder, RunOutcome};
