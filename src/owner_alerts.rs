//! Forwards warnings and errors to the bot owners over Telegram.
//!
//! Alerts are collected for a few seconds and sent as one message per owner,
//! so a burst of failures does not turn into a burst of notifications.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{ChatId, UserId};
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Telegram rejects messages above 4096 characters.
const MAX_MESSAGE_CHARS: usize = 4000;
const FLUSH_INTERVAL: Duration = Duration::from_secs(5);
const FLUSH_AT: usize = 20;

/// Targets whose events would feed back into this layer when a send fails.
const IGNORED_TARGETS: &[&str] = &["teloxide", "reqwest", "hyper", "h2", "rustls"];

pub struct OwnerAlertLayer {
    tx: mpsc::UnboundedSender<String>,
}

impl OwnerAlertLayer {
    /// Spawns the sender task; must be called inside a tokio runtime.
    pub fn new(bot: Bot, owners: &[UserId]) -> Self {
        let chats: Vec<ChatId> = owners.iter().map(|id| ChatId::from(*id)).collect();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let mut batch = AlertBatch::default();
            let mut interval = tokio::time::interval(FLUSH_INTERVAL);

            loop {
                tokio::select! {
                    alert = rx.recv() => {
                        let Some(alert) = alert else { break };
                        batch.push(alert);
                        if batch.len() >= FLUSH_AT {
                            send_all(&bot, &chats, batch.take()).await;
                        }
                    }
                    _ = interval.tick() => {
                        if !batch.is_empty() {
                            send_all(&bot, &chats, batch.take()).await;
                        }
                    }
                }
            }

            if !batch.is_empty() {
                send_all(&bot, &chats, batch.take()).await;
            }
        });

        Self { tx }
    }
}

async fn send_all(bot: &Bot, chats: &[ChatId], text: String) {
    for chat in chats {
        if let Err(e) = bot.send_message(*chat, &text).await {
            eprintln!("Failed to send alert to {}: {e}", chat.0);
        }
    }
}

#[derive(Debug, Default)]
struct AlertBatch {
    lines: Vec<String>,
}

impl AlertBatch {
    fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    fn len(&self) -> usize {
        self.lines.len()
    }

    fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Drain into one message, truncated to what Telegram accepts.
    fn take(&mut self) -> String {
        let combined = std::mem::take(&mut self.lines).join("\n");
        truncate(&combined, MAX_MESSAGE_CHARS)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}

fn format_alert(level: Level, message: &str) -> Option<String> {
    match level {
        Level::ERROR => Some(format!("❌ {message}")),
        Level::WARN => Some(format!("⚠️ {message}")),
        _ => None,
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else if self.message.is_empty() {
            self.message = format!("{} = {value:?}", field.name());
        } else {
            self.message.push_str(&format!(", {} = {value:?}", field.name()));
        }
    }
}

impl<S: Subscriber> Layer<S> for OwnerAlertLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let target = metadata.target();
        if IGNORED_TARGETS.iter().any(|t| target.starts_with(t)) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        if let Some(alert) = format_alert(*metadata.level(), &visitor.message)
            && self.tx.send(alert).is_err()
        {
            eprintln!("Alert channel closed, message dropped");
        }
    }
}
