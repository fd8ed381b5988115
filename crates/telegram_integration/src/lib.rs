//! Telegram Bot API adapter: the HTTP client, update translation, and the
//! membership oracle and message sink the gate workflow runs against.

pub mod client;
pub mod types;
pub mod updates;

pub use client::{keyboard, TelegramClient, TelegramError, DEFAULT_API_URL};
pub use updates::{translate, Incoming};
