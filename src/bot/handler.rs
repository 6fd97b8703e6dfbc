//! Update handling
//!
//! Translates incoming messages into store updates and replies. One update is
//! handled at a time; the store is owned here and never shared.

use anyhow::Result;
use futures::stream::{self, Stream, StreamExt};

use super::commands::Command;
use super::format;
use crate::api::{ReplyMode, Transport};
use crate::models::{Chat, Message, Update, User};
use crate::store::Store;

pub struct Bot<T> {
    transport: T,
    store: Store,
    /// Our own username, used to recognise `/cmd@name`
    username: Option<String>,
}

impl<T: Transport> Bot<T> {
    pub fn new(transport: T, store: Store, username: Option<String>) -> Self {
        Self {
            transport,
            store,
            username,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn handle_update(&mut self, update: Update) -> Result<()> {
        match update.message {
            Some(message) => self.handle_message(&message).await,
            None => Ok(()),
        }
    }

    /// Track the sender, then dispatch on the kind of message.
    pub async fn handle_message(&mut self, message: &Message) -> Result<()> {
        self.track_sender(message)?;

        if let Some(ref joined) = message.new_chat_members {
            return self.new_chat_members(message, joined);
        }
        if let Some(ref left) = message.left_chat_member {
            return self.left_chat_member(message, left);
        }

        let command = message
            .text
            .as_deref()
            .and_then(|t| Command::parse(t, self.username.as_deref()));

        match command {
            Some(Command::Start) => {
                let text = format::start_text(message.chat.is_private());
                self.reply(message, text, ReplyMode::Plain).await;
            }
            Some(Command::Help) => {
                let text = format::help_text(message.chat.is_private());
                self.reply(message, &text, ReplyMode::HtmlNoPreview).await;
            }
            Some(Command::All) => self.all_command(message).await,
            Some(Command::AdminOnly) => {
                if !message.chat.is_private() && !self.sender_is_admin(message).await {
                    self.reply(message, "Only admins can use this command.", ReplyMode::Plain)
                        .await;
                    return Ok(());
                }
                self.adminonly_command(message).await?;
            }
            Some(Command::IgnoreMe) => self.ignoreme_command(message).await?,
            None => {}
        }
        Ok(())
    }

    /// Reply, logging instead of failing if the message is gone.
    async fn reply(&self, message: &Message, text: &str, mode: ReplyMode) {
        if let Err(e) = self.transport.send_reply(message, text, mode).await {
            tracing::error!(
                "Failed to reply to message {} in {}. Message was probably deleted: {}",
                message.message_id,
                message.chat.label(),
                e
            );
        }
    }

    /// Register the chat and the sender of any group message.
    fn track_sender(&mut self, message: &Message) -> Result<()> {
        let chat = &message.chat;
        if chat.is_private() {
            return Ok(());
        }

        if !self.store.chat_exists(chat.id) {
            self.store.add_chat(chat.id)?;
            tracing::info!("First message in {}, creating members set.", chat.label());
        }

        let Some(ref sender) = message.from else {
            return Ok(());
        };
        if !self.store.user_exists(chat.id, sender.id) {
            self.store.add_user(chat.id, sender.id)?;
            tracing::info!(
                "First message from '{}'. Added to {} members set.",
                format::log_name(sender),
                chat.label()
            );
        }
        Ok(())
    }

    async fn sender_is_admin(&self, message: &Message) -> bool {
        let Some(ref sender) = message.from else {
            return false;
        };
        match self
            .transport
            .get_chat_member(message.chat.id, sender.id)
            .await
        {
            Ok(member) => member.status.is_privileged(),
            Err(e) => {
                tracing::error!(
                    "Failed to get status of {} in {}: {}",
                    sender.id,
                    message.chat.label(),
                    e
                );
                false
            }
        }
    }

    fn sender_name(message: &Message) -> String {
        message
            .from
            .as_ref()
            .map(|u| u.full_name())
            .unwrap_or_default()
    }

    /// Display names of `ids`, looked up one at a time. Failed lookups are
    /// logged and skipped.
    fn mentions<'a>(&'a self, chat: &'a Chat, ids: Vec<i64>) -> impl Stream<Item = String> + 'a {
        stream::iter(ids).filter_map(move |id| async move {
            match self.transport.get_chat_member(chat.id, id).await {
                Ok(member) => Some(format::mention(&member.user)),
                Err(e) => {
                    tracing::error!("Failed to get member {} in {}: {}", id, chat.label(), e);
                    None
                }
            }
        })
    }

    async fn all_command(&self, message: &Message) {
        let chat = &message.chat;
        tracing::info!(
            "Received /all command from {} in {}.",
            Self::sender_name(message),
            chat.label()
        );
        if chat.is_private() {
            return;
        }

        if self.store.get_admin_only(chat.id) && !self.sender_is_admin(message).await {
            self.reply(message, format::ADMINS_ONLY, ReplyMode::Plain).await;
            return;
        }

        if self.store.get_users(chat.id).is_empty() {
            let title = chat.title.as_deref().unwrap_or("");
            self.reply(message, &format::no_members_text(title), ReplyMode::Plain).await;
            return;
        }

        let ids = self.store.mentionable_users(chat.id);
        let names: Vec<String> = self.mentions(chat, ids).collect().await;
        for chunk in format::chunk_lines(format::MENTION_HEADER, &names, format::MAX_MESSAGE_LEN) {
            self.reply(message, &chunk, ReplyMode::Html).await;
        }
    }

    fn new_chat_members(&mut self, message: &Message, joined: &[User]) -> Result<()> {
        let chat = &message.chat;
        tracing::info!("Received new chat members in {}.", chat.label());
        if chat.is_private() {
            return Ok(());
        }

        for member in joined {
            if !self.store.user_exists(chat.id, member.id) {
                self.store.add_user(chat.id, member.id)?;
                tracing::info!(
                    "New member '{}' in {}. Added to members set.",
                    format::log_name(member),
                    chat.label()
                );
            }
        }
        Ok(())
    }

    fn left_chat_member(&mut self, message: &Message, left: &User) -> Result<()> {
        let chat = &message.chat;
        tracing::info!("Received left chat member in {}.", chat.label());
        if chat.is_private() {
            return Ok(());
        }

        if self.store.user_exists(chat.id, left.id) {
            self.store.remove_user(chat.id, left.id)?;
            tracing::info!(
                "Member '{}' left {}. Removed from members set.",
                format::log_name(left),
                chat.label()
            );
        }
        Ok(())
    }

    async fn adminonly_command(&mut self, message: &Message) -> Result<()> {
        let chat = &message.chat;
        tracing::info!(
            "Received /adminonly command from {} in {}.",
            Self::sender_name(message),
            chat.label()
        );
        if chat.is_private() {
            return Ok(());
        }

        let state = format::state_word(self.store.toggle_admin_only(chat.id)?);
        tracing::info!("Adminonly mode {} in {}.", state, chat.label());
        self.reply(
            message,
            &format!("Adminonly mode is now {}", state),
            ReplyMode::Plain,
        )
        .await;
        Ok(())
    }

    async fn ignoreme_command(&mut self, message: &Message) -> Result<()> {
        let chat = &message.chat;
        let name = Self::sender_name(message);
        tracing::info!("Received /ignoreme command from {} in {}.", name, chat.label());
        if chat.is_private() {
            return Ok(());
        }
        let Some(ref sender) = message.from else {
            return Ok(());
        };

        let state = format::state_word(self.store.toggle_opt_out(chat.id, sender.id)?);
        tracing::info!("Ignoreme mode {} for {} in {}.", state, name, chat.label());
        self.reply(
            message,
            &format!("Ignoreme mode is now {} for you", state),
            ReplyMode::Plain,
        )
        .await;
        Ok(())
    }
}
