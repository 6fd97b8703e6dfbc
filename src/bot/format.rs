//! Reply texts and member display names

use crate::models::User;

/// Telegram's maximum message length
pub const MAX_MESSAGE_LEN: usize = 4096;

const SOURCE_URL: &str = "https://gitlab.com/57d/everyonetagger";

pub const ADMINS_ONLY: &str = "Only admins can use this command";
pub const MENTION_HEADER: &str = "Tagging everyone:\n\n";

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn profile_link(user: &User) -> String {
    format!(
        "<a href=\"tg://user?id={}\">{}</a>",
        user.id,
        escape_html(&user.full_name())
    )
}

/// Name used in a mention list: `@handle`, or a profile link when there is none.
pub fn mention(user: &User) -> String {
    match user.username {
        Some(ref handle) => format!("@{}", handle),
        None => profile_link(user),
    }
}

/// Name used in log lines.
pub fn log_name(user: &User) -> String {
    match user.username {
        Some(ref handle) => format!("{} (@{})", user.full_name(), handle),
        None => profile_link(user),
    }
}

/// Join `lines` under `header`, splitting into messages of at most `limit` chars.
///
/// Splits only between lines. A single line longer than `limit` is sent on its own.
pub fn chunk_lines(header: &str, lines: &[String], limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = header.to_string();
    let mut current_len = header.chars().count();
    let mut has_lines = false;

    for line in lines {
        let len = line.chars().count() + 1;
        if has_lines && current_len + len > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(line);
        current.push('\n');
        current_len += len;
        has_lines = true;
    }

    if has_lines || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

pub fn start_text(private: bool) -> &'static str {
    if private {
        "Hi! Add me to a group and I'll be able to tag everyone in it\n\n\
         Telegram does not allow bots to just see all the members of a chat, but I'll check \
         the messages and update my group members knowledge as I see them\n\n\
         /help for more info"
    } else {
        "Hi! I'll tag everyone in this group\n\n\
         Telegram does not allow bots to just see all the members of a chat, but I'll check \
         the messages and update my group members knowledge as I see them\n\n\
         /help for more info"
    }
}

pub fn help_text(private: bool) -> String {
    let intro = if private {
        "Hi! Add me to a group and I'll be able to tag everyone in it"
    } else {
        "Hi! I'm a bot that can tag everyone in a group"
    };
    format!(
        "{}\n\n\
         /all - to tag everyone in this group\n\
         /adminonly - toggle tagging only when admins asks\n\
         /ignoreme - toggle tagging yourself\n\n\
         Telegram does not allow bots to just see all the members of a chat, but I'll check \
         the messages and update my group members knowledge as I see them\n\n\
         Source code: <a href=\"{}\">GitLab</a>\n",
        intro, SOURCE_URL
    )
}

pub fn no_members_text(chat_title: &str) -> String {
    format!(
        "No members found for '{}'\n\n\
         Send a message to this group to add yourself to the members list\n\
         /help for more info",
        chat_title
    )
}

pub fn state_word(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}
