//! In-memory platform for exercising the bot without Telegram

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::api::{ApiError, ReplyMode, Transport};
use crate::models::{Chat, ChatMember, ChatType, MemberStatus, Message, Update, User};

pub const GROUP: i64 = -100;

/// Known members by user id, queued update batches, recorded calls.
#[derive(Default)]
pub struct FakeTransport {
    pub members: HashMap<i64, ChatMember>,
    pub replies: Mutex<Vec<(String, ReplyMode)>>,
    pub lookups: Mutex<Vec<i64>>,
    pub fail_replies: bool,
    /// Batches handed out by `get_updates`; once empty, polls never return.
    pub batches: Mutex<VecDeque<Vec<Update>>>,
    /// Offsets passed to each `get_updates` call
    pub polls: Mutex<Vec<Option<i64>>>,
    /// Fired on the first reply sent
    pub on_reply: Mutex<Option<oneshot::Sender<()>>>,
}

impl FakeTransport {
    pub fn with_member(mut self, user: User, status: MemberStatus) -> Self {
        self.members.insert(user.id, ChatMember { status, user });
        self
    }

    pub fn replies(&self) -> Vec<String> {
        self.replies
            .lock()
            .unwrap()
            .iter()
            .map(|(t, _)| t.clone())
            .collect()
    }

    pub fn lookups(&self) -> Vec<i64> {
        self.lookups.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    async fn get_updates(
        &self,
        offset: Option<i64>,
        _timeout: Duration,
    ) -> Result<Vec<Update>, ApiError> {
        self.polls.lock().unwrap().push(offset);
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => Ok(batch),
            None => std::future::pending().await,
        }
    }

    async fn send_reply(&self, _to: &Message, text: &str, mode: ReplyMode) -> Result<(), ApiError> {
        if let Some(tx) = self.on_reply.lock().unwrap().take() {
            let _ = tx.send(());
        }
        if self.fail_replies {
            return Err(ApiError::Telegram {
                method: "sendMessage",
                code: 400,
                description: "Bad Request: message to be replied not found".into(),
            });
        }
        self.replies.lock().unwrap().push((text.to_string(), mode));
        Ok(())
    }

    async fn get_chat_member(&self, _chat_id: i64, user_id: i64) -> Result<ChatMember, ApiError> {
        self.lookups.lock().unwrap().push(user_id);
        self.members
            .get(&user_id)
            .cloned()
            .ok_or_else(|| ApiError::Telegram {
                method: "getChatMember",
                code: 400,
                description: "Bad Request: user not found".into(),
            })
    }
}

pub fn user(id: i64, first: &str, username: Option<&str>) -> User {
    User {
        id,
        first_name: first.to_string(),
        last_name: None,
        username: username.map(String::from),
    }
}

pub fn group() -> Chat {
    Chat {
        id: GROUP,
        chat_type: ChatType::Supergroup,
        title: Some("Crew".into()),
    }
}

pub fn text_message(from: &User, text: &str) -> Message {
    Message {
        message_id: 1,
        from: Some(from.clone()),
        chat: group(),
        text: Some(text.to_string()),
        new_chat_members: None,
        left_chat_member: None,
    }
}
