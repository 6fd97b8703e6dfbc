//! Offline store maintenance for operators

use anyhow::Result;
use std::path::Path;

use super::Store;

/// One line of the `chats` listing
#[derive(Debug, PartialEq, Eq)]
pub struct ChatSummary {
    pub chat_id: i64,
    pub members: usize,
    pub opted_out: usize,
    pub admin_only: bool,
}

pub fn summarize(store: &Store) -> Vec<ChatSummary> {
    store
        .get_chats()
        .into_iter()
        .map(|chat_id| {
            let users = store.get_users(chat_id);
            ChatSummary {
                chat_id,
                members: users.len(),
                opted_out: users
                    .iter()
                    .filter(|&&u| store.get_opt_out(chat_id, u))
                    .count(),
                admin_only: store.get_admin_only(chat_id),
            }
        })
        .collect()
}

/// Print every known chat (prints to stdout).
pub fn list_chats(path: &Path) -> Result<()> {
    let store = Store::open(path)?;
    let chats = summarize(&store);

    println!("\nKnown chats ({}):", store.path().display());
    println!("{:-<60}", "");

    if chats.is_empty() {
        println!("  (no chats found)");
        return Ok(());
    }

    for chat in &chats {
        println!("{}", chat.chat_id);
        println!("  Members:    {}", chat.members);
        println!("  Opted out:  {}", chat.opted_out);
        println!("  Admin only: {}", if chat.admin_only { "yes" } else { "no" });
    }

    Ok(())
}

/// Drop everything stored about `chat_id`.
pub fn forget_chat(path: &Path, chat_id: i64) -> Result<()> {
    let mut store = Store::open(path)?;
    if !store.chat_exists(chat_id) {
        println!("Chat {} is not in the store", chat_id);
        return Ok(());
    }
    store.remove_chat(chat_id)?;
    tracing::info!("Removed chat {} from {}", chat_id, store.path().display());
    println!("Forgot chat {}", chat_id);
    Ok(())
}
