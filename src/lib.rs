/// alertgram - relays monitoring alerts into Telegram chats
///
/// This library accepts alert webhooks, renders one chat message per alert,
/// and fans the messages out to every chat that subscribed with `/subscribe`.
pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod formatting;
pub mod internal_metrics;
pub mod server;
pub mod store;
pub mod task_manager;
pub mod telegram;

// Re-export core types for convenience
pub use crate::core::*;
