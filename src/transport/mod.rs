//! Chat transports that feed questions into the pipeline.

pub mod telegram;

pub use telegram::{TelegramApi, TelegramBot};
