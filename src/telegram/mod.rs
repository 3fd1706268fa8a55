pub mod bot;
pub mod client;
pub mod dispatch;
pub mod types;

pub use client::{BotApi, TelegramClient};
pub use dispatch::DispatcherHandle;
