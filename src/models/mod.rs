//! Data models for Telegram Bot API entities

mod chat;
mod message;
mod user;

pub use chat::*;
pub use message::*;
pub use user::*;
