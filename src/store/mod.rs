//! Membership store
//!
//! Per-chat membership and settings, held in memory and mirrored to a single
//! JSON document. The whole document is rewritten after every mutation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(test)]
use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

mod maintenance;

pub use maintenance::{forget_chat, list_chats};

/// Everything tracked for one chat
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecord {
    /// Users seen in the chat, in the order they were first seen
    #[serde(default)]
    pub users: Vec<i64>,
    /// Only admins may use `/all`
    #[serde(rename = "adminonly", default)]
    pub admin_only: bool,
    /// Users excluded from mention lists
    #[serde(rename = "ignore", default)]
    pub opted_out: Vec<i64>,
}

/// File-backed store keyed by chat id
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    chats: BTreeMap<i64, ChatRecord>,
    #[cfg(test)]
    writes: Cell<usize>,
}

impl Store {
    /// Open the store at `path`, creating an empty document if none exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        }

        if !path.exists() {
            let store = Self {
                path,
                chats: BTreeMap::new(),
                #[cfg(test)]
                writes: Cell::new(0),
            };
            store.save()?;
            tracing::info!("No store found, created empty store at {}", store.path.display());
            return Ok(store);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read store {}", path.display()))?;
        let chats = if content.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse store {}", path.display()))?
        };

        let store = Self {
            path,
            chats,
            #[cfg(test)]
            writes: Cell::new(0),
        };
        tracing::info!(
            "Loaded store from {} ({} chats)",
            store.path.display(),
            store.chats.len()
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the whole store to a sibling temp file and rename it into place.
    fn save(&self) -> Result<()> {
        let content =
            serde_json::to_string_pretty(&self.chats).context("Failed to serialize store")?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, content)
            .with_context(|| format!("Failed to write store {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace store {}", self.path.display()))?;
        #[cfg(test)]
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    /// Record for `chat_id`, created in memory if missing. The caller persists.
    fn record_mut(&mut self, chat_id: i64) -> &mut ChatRecord {
        self.chats.entry(chat_id).or_default()
    }

    pub fn chat_exists(&self, chat_id: i64) -> bool {
        self.chats.contains_key(&chat_id)
    }

    pub fn add_chat(&mut self, chat_id: i64) -> Result<()> {
        if self.chat_exists(chat_id) {
            return Ok(());
        }
        self.chats.insert(chat_id, ChatRecord::default());
        self.save()
    }

    pub fn remove_chat(&mut self, chat_id: i64) -> Result<()> {
        if self.chats.remove(&chat_id).is_none() {
            return Ok(());
        }
        self.save()
    }

    pub fn get_chats(&self) -> Vec<i64> {
        self.chats.keys().copied().collect()
    }

    pub fn user_exists(&self, chat_id: i64, user_id: i64) -> bool {
        self.chats
            .get(&chat_id)
            .is_some_and(|c| c.users.contains(&user_id))
    }

    pub fn add_user(&mut self, chat_id: i64, user_id: i64) -> Result<()> {
        let record = self.record_mut(chat_id);
        if record.users.contains(&user_id) {
            return Ok(());
        }
        record.users.push(user_id);
        self.save()
    }

    pub fn remove_user(&mut self, chat_id: i64, user_id: i64) -> Result<()> {
        let Some(record) = self.chats.get_mut(&chat_id) else {
            return Ok(());
        };
        let Some(pos) = record.users.iter().position(|&u| u == user_id) else {
            return Ok(());
        };
        record.users.remove(pos);
        self.save()
    }

    pub fn get_users(&self, chat_id: i64) -> Vec<i64> {
        self.chats
            .get(&chat_id)
            .map(|c| c.users.clone())
            .unwrap_or_default()
    }

    /// Tracked users that have not opted out, in tracking order.
    pub fn mentionable_users(&self, chat_id: i64) -> Vec<i64> {
        self.chats
            .get(&chat_id)
            .map(|c| {
                c.users
                    .iter()
                    .copied()
                    .filter(|u| !c.opted_out.contains(u))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Flip admin-only mode and return the new value.
    pub fn toggle_admin_only(&mut self, chat_id: i64) -> Result<bool> {
        let record = self.record_mut(chat_id);
        record.admin_only = !record.admin_only;
        let enabled = record.admin_only;
        self.save()?;
        Ok(enabled)
    }

    pub fn get_admin_only(&self, chat_id: i64) -> bool {
        self.chats.get(&chat_id).is_some_and(|c| c.admin_only)
    }

    /// Flip the opt-out flag for `user_id`. Returns true when the user is now opted out.
    pub fn toggle_opt_out(&mut self, chat_id: i64, user_id: i64) -> Result<bool> {
        let record = self.record_mut(chat_id);
        let opted_out = match record.opted_out.iter().position(|&u| u == user_id) {
            Some(pos) => {
                record.opted_out.remove(pos);
                false
            }
            None => {
                record.opted_out.push(user_id);
                true
            }
        };
        self.save()?;
        Ok(opted_out)
    }

    pub fn get_opt_out(&self, chat_id: i64, user_id: i64) -> bool {
        self.chats
            .get(&chat_id)
            .is_some_and(|c| c.opted_out.contains(&user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("chats.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_untouched_chat_defaults() {
        let (_dir, store) = open_temp();
        assert!(!store.chat_exists(7));
        assert!(store.get_users(7).is_empty());
        assert!(!store.get_admin_only(7));
        assert!(!store.get_opt_out(7, 1));
        assert!(!store.user_exists(7, 1));
        // Queries must not create records.
        assert!(store.get_chats().is_empty());
    }

    #[test]
    fn test_open_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("chats.json");
        let store = Store::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "{}");
    }

    #[test]
    fn test_add_user_no_duplicates() {
        let (_dir, mut store) = open_temp();
        store.add_user(100, 1).unwrap();
        store.add_user(100, 1).unwrap();
        assert!(store.chat_exists(100));
        assert!(store.user_exists(100, 1));
        assert_eq!(store.get_users(100), vec![1]);
    }

    #[test]
    fn test_remove_user() {
        let (_dir, mut store) = open_temp();
        store.add_user(100, 1).unwrap();
        store.remove_user(100, 1).unwrap();
        assert!(!store.user_exists(100, 1));

        // Removing unknown users or from unknown chats is a no-op.
        store.remove_user(100, 42).unwrap();
        store.remove_user(999, 1).unwrap();
        assert!(!store.chat_exists(999));
        assert!(store.get_users(100).is_empty());
    }

    #[test]
    fn test_first_write_saves_once() {
        let (_dir, mut store) = open_temp();
        let base = store.writes.get();

        store.add_user(100, 1).unwrap();
        assert_eq!(store.writes.get(), base + 1);

        store.add_user(100, 1).unwrap();
        assert_eq!(store.writes.get(), base + 1);

        store.toggle_admin_only(200).unwrap();
        assert_eq!(store.writes.get(), base + 2);

        store.toggle_opt_out(300, 1).unwrap();
        assert_eq!(store.writes.get(), base + 3);

        let reopened = Store::open(store.path()).unwrap();
        assert_eq!(reopened.get_chats(), vec![100, 200, 300]);
        assert!(reopened.get_admin_only(200));
        assert!(reopened.get_opt_out(300, 1));
    }

    #[test]
    fn test_toggle_admin_only() {
        let (_dir, mut store) = open_temp();
        assert!(store.toggle_admin_only(5).unwrap());
        assert!(store.get_admin_only(5));
        assert!(!store.toggle_admin_only(5).unwrap());
        assert!(!store.get_admin_only(5));
    }

    #[test]
    fn test_toggle_opt_out_keeps_membership() {
        let (_dir, mut store) = open_temp();
        store.add_user(5, 9).unwrap();
        assert!(store.toggle_opt_out(5, 9).unwrap());
        assert!(store.get_opt_out(5, 9));
        assert!(store.user_exists(5, 9));
        assert!(store.mentionable_users(5).is_empty());

        assert!(!store.toggle_opt_out(5, 9).unwrap());
        assert!(!store.get_opt_out(5, 9));
        assert_eq!(store.mentionable_users(5), vec![9]);
    }

    #[test]
    fn test_add_and_remove_chat() {
        let (_dir, mut store) = open_temp();
        store.add_chat(1).unwrap();
        store.add_chat(2).unwrap();
        store.add_chat(1).unwrap();
        assert_eq!(store.get_chats(), vec![1, 2]);

        store.remove_chat(1).unwrap();
        store.remove_chat(3).unwrap();
        assert_eq!(store.get_chats(), vec![2]);
    }

    #[test]
    fn test_scenario() {
        let (_dir, mut store) = open_temp();
        store.add_user(100, 1).unwrap();
        store.add_user(100, 2).unwrap();
        assert_eq!(store.get_users(100), vec![1, 2]);

        assert!(store.toggle_admin_only(100).unwrap());

        store.remove_user(100, 1).unwrap();
        assert_eq!(store.get_users(100), vec![2]);

        assert!(store.toggle_opt_out(100, 2).unwrap());
        assert!(store.get_opt_out(100, 2));
    }

    #[test]
    fn test_reopen_sees_same_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chats.json");
        {
            let mut store = Store::open(&path).unwrap();
            store.add_user(-100, 1).unwrap();
            store.add_user(-100, 2).unwrap();
            store.add_user(-200, 3).unwrap();
            store.toggle_admin_only(-100).unwrap();
            store.toggle_opt_out(-200, 3).unwrap();
            store.remove_user(-100, 1).unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.get_chats(), vec![-200, -100]);
        assert_eq!(store.get_users(-100), vec![2]);
        assert_eq!(store.get_users(-200), vec![3]);
        assert!(store.get_admin_only(-100));
        assert!(!store.get_admin_only(-200));
        assert!(store.get_opt_out(-200, 3));
        assert!(!store.get_opt_out(-100, 2));
    }

    #[test]
    fn test_document_shape() {
        let (_dir, mut store) = open_temp();
        store.add_user(100, 1).unwrap();
        store.toggle_opt_out(100, 1).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            doc,
            serde_json::json!({"100": {"users": [1], "adminonly": false, "ignore": [1]}})
        );
    }

    #[test]
    fn test_missing_fields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chats.json");
        fs::write(&path, r#"{"100": {"users": [1, 2]}}"#).unwrap();

        let store = Store::open(&path).unwrap();
        assert_eq!(store.get_users(100), vec![1, 2]);
        assert!(!store.get_admin_only(100));
        assert!(!store.get_opt_out(100, 1));
    }

    #[test]
    fn test_blank_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chats.json");
        fs::write(&path, "  \n").unwrap();

        let store = Store::open(&path).unwrap();
        assert!(store.get_chats().is_empty());
    }

    #[test]
    fn test_malformed_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chats.json");
        fs::write(&path, "users: [1, 2").unwrap();

        let err = Store::open(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse store"));
    }
}
