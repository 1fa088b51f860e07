//! Deferred interaction delivery
//!
//! The final result is delivered by editing the original interaction response
//! (the "Your request is being processed." placeholder) through a session that
//! lives for exactly one notification.

use std::sync::Arc;

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use tracing::{debug, error};

use crate::error::{Result, VerifyError};

/// Capabilities of an open chat-platform session
#[async_trait]
pub trait Session: Send + Sync {
    /// Replace the content of the original interaction response
    async fn edit_original(&self, interaction_token: &str, content: &str) -> Result<()>;

    /// Release the session. Always called once per notification, even after a
    /// failed edit.
    ///
    /// Sessions that hold no connection may treat this as a no-op: the Discord
    /// session only drops its HTTP client and never fails here, so
    /// `SessionClose` is reported by other implementations only.
    async fn close(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create_session(&self, application_id: &str) -> Result<Box<dyn Session>>;
}

pub type SharedSessionFactory = Arc<dyn SessionFactory>;

pub struct Notifier {
    sessions: SharedSessionFactory,
}

impl Notifier {
    pub fn new(sessions: SharedSessionFactory) -> Self {
        Self { sessions }
    }

    pub async fn notify(
        &self,
        application_id: &str,
        interaction_token: &str,
        message: &str,
    ) -> Result<()> {
        let session = self.sessions.create_session(application_id).await?;

        let edited = session.edit_original(interaction_token, message).await;
        let closed = session.close().await;

        match (edited, closed) {
            (Ok(()), Ok(())) => {
                debug!("Edited original response for application {}", application_id);
                Ok(())
            }
            (Err(edit_err), Ok(())) => {
                error!("{}", edit_err);
                Err(edit_err)
            }
            (Err(edit_err), Err(close_err)) => {
                error!("{}", edit_err);
                error!("Error closing session: {}", close_err);
                Err(edit_err)
            }
            (Ok(()), Err(close_err)) => {
                error!("Error closing session: {}", close_err);
                Err(close_err)
            }
        }
    }
}

/// Sessions backed by serenity's HTTP client
pub struct DiscordSessionFactory {
    bot_token: String,
}

impl DiscordSessionFactory {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
        }
    }
}

#[async_trait]
impl SessionFactory for DiscordSessionFactory {
    async fn create_session(&self, application_id: &str) -> Result<Box<dyn Session>> {
        if self.bot_token.trim().is_empty() {
            return Err(VerifyError::SessionCreate {
                message: "bot token is empty".to_string(),
            });
        }

        let id = application_id
            .parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .ok_or_else(|| VerifyError::SessionCreate {
                message: format!("invalid application id '{}'", application_id),
            })?;

        let http = serenity::Http::new(&self.bot_token);
        http.set_application_id(serenity::ApplicationId::new(id));

        Ok(Box::new(DiscordSession {
            http,
            application_id: application_id.to_string(),
        }))
    }
}

struct DiscordSession {
    http: serenity::Http,
    application_id: String,
}

#[async_trait]
impl Session for DiscordSession {
    async fn edit_original(&self, interaction_token: &str, content: &str) -> Result<()> {
        let edit = serde_json::json!({ "content": content });
        self.http
            .edit_original_interaction_response(interaction_token, &edit, Vec::new())
            .await
            .map(|_| ())
            .map_err(|e| VerifyError::Edit {
                application_id: self.application_id.clone(),
                message: e.to_string(),
            })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        drop(self.http);
        Ok(())
    }
}
