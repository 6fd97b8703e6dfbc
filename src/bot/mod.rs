//! Group tagging bot
//!
//! Long-polls Telegram for updates and hands them to [`Bot`] one at a time.

mod commands;
#[cfg(test)]
mod fake;
mod format;
mod handler;

use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time;

use crate::api::{TelegramClient, Transport};
use crate::config::Config;
use crate::store::Store;

pub use handler::Bot;

/// Run the bot until Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    tracing::debug!("Config: {:?}", config);
    let store = Store::open(&config.data_file)?;
    let client = TelegramClient::new(&config);

    let me = client
        .get_me()
        .await
        .context("Failed to fetch bot identity. Is TOKEN valid?")?;
    tracing::info!(
        "Logged in as {} (@{})",
        me.full_name(),
        me.username.as_deref().unwrap_or("?")
    );

    let mut bot = Bot::new(client, store, me.username);
    tracing::info!("Tracking {} chats", bot.store().get_chats().len());

    println!("Bot started. Listening for updates... (Ctrl-C to stop)");
    poll_until(&mut bot, config.poll_timeout, tokio::signal::ctrl_c()).await;
    println!("Shutting down...");
    Ok(())
}

/// Poll for updates and handle them until `shutdown` completes.
///
/// `shutdown` is created once and polled across iterations, so a signal that
/// arrives while an update is being handled stops the loop before the next
/// poll. Failed polls are retried with exponential backoff (1s, 2s, 4s, ...
/// capped at 64s). An error while handling a single update is logged and the
/// update is skipped.
async fn poll_until<T, F>(bot: &mut Bot<T>, poll_timeout: Duration, shutdown: F)
where
    T: Transport,
    F: Future,
{
    tokio::pin!(shutdown);
    let mut offset: Option<i64> = None;
    let mut backoff = 1u64;

    loop {
        let polled = tokio::select! {
            biased;
            _ = &mut shutdown => return,
            r = bot.transport().get_updates(offset, poll_timeout) => r,
        };

        match polled {
            Ok(updates) => {
                backoff = 1;
                for update in updates {
                    offset = Some(update.update_id + 1);
                    let id = update.update_id;
                    if let Err(e) = bot.handle_update(update).await {
                        tracing::error!("Failed to handle update {}: {:#}", id, e);
                    }
                }
            }
            Err(e) => {
                tracing::warn!("getUpdates failed: {}. Retrying in {}s...", e, backoff);

                tokio::select! {
                    biased;
                    _ = &mut shutdown => return,
                    _ = time::sleep(Duration::from_secs(backoff)) => {}
                }

                backoff = (backoff * 2).min(64);
            }
        }
    }
}
