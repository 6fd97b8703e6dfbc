//! Chat-related models

use serde::{Deserialize, Serialize};

/// Chat type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
    Supergroup,
    Channel,
}

/// Chat entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    pub title: Option<String>,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.chat_type == ChatType::Private
    }

    /// `id(title)` as used in log lines.
    pub fn label(&self) -> String {
        format!("{}({})", self.id, self.title.as_deref().unwrap_or(""))
    }
}
