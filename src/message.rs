//! Messages and attachments.
//!
//! Both are decoded as plain records and then bound to the session that
//! fetched them, which lets them delete, mark-read and download on their own.

use crate::context::SessionContext;
use crate::models::{Recipient, parse_timestamp};
use crate::worker::{TaskHandle, WorkerPool};
use crate::{Error, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// A message in the account's inbox.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub msgid: String,
    pub from: Recipient,
    pub to: Vec<Recipient>,
    pub subject: String,
    /// Plain-text body.
    pub text: String,
    pub seen: bool,
    pub flagged: bool,
    pub is_deleted: bool,
    pub retention: bool,
    pub retention_date: String,
    /// HTML body fragments.
    pub html: Vec<String>,
    pub has_attachments: bool,
    pub attachments: Vec<Attachment>,
    pub size: u64,
    /// Relative path of the raw `.eml` source.
    pub download_url: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip)]
    context: Option<SessionContext>,
}

impl Message {
    /// Attach the session context to this message and its attachments.
    pub(crate) fn bind(mut self, context: SessionContext) -> Self {
        for attachment in &mut self.attachments {
            attachment.context = Some(context.clone());
        }
        self.context = Some(context);
        self
    }

    /// Whether this message came from a session and can act on its own.
    pub fn is_bound(&self) -> bool {
        self.context.is_some()
    }

    pub fn sender_address(&self) -> &str {
        &self.from.address
    }

    pub fn sender_name(&self) -> &str {
        &self.from.name
    }

    pub fn receivers(&self) -> &[Recipient] {
        &self.to
    }

    /// All HTML fragments concatenated.
    pub fn raw_html(&self) -> String {
        self.html.concat()
    }

    pub fn created_at(&self) -> Result<DateTime<Local>> {
        parse_timestamp(&self.created_at)
    }

    pub fn updated_at(&self) -> Result<DateTime<Local>> {
        parse_timestamp(&self.updated_at)
    }

    /// The message as JSON, without any session data.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Delete the message.
    ///
    /// Returns `true` without a request when the message is already deleted.
    /// After a successful delete `is_deleted` is set, so repeated calls are
    /// no-ops.
    pub async fn delete(&mut self) -> bool {
        if self.is_deleted {
            return true;
        }
        let Some(context) = &self.context else {
            warn!(id = %self.id, "cannot delete a message that is not bound to a session");
            return false;
        };

        let response = context
            .transport
            .delete(
                &context.api(&format!("/messages/{}", self.id)),
                Some(context.token()),
            )
            .await;

        if response.status == 204 {
            self.is_deleted = true;
            true
        } else {
            warn!(id = %self.id, status = response.status, "failed to delete message");
            false
        }
    }

    /// Delete a copy of the message in the background and report the outcome.
    pub fn spawn_delete<F>(&self, callback: F) -> TaskHandle<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let mut message = self.clone();
        self.workers().spawn("delete_message", async move {
            callback(message.delete().await);
        })
    }

    /// Mark the message as read.
    ///
    /// Returns `true` without a request when the message is already seen.
    pub async fn mark_as_read(&mut self) -> bool {
        if self.seen {
            return true;
        }
        let Some(context) = &self.context else {
            warn!(id = %self.id, "cannot mark a message that is not bound to a session");
            return false;
        };

        let response = context
            .transport
            .patch(
                &context.api(&format!("/messages/{}", self.id)),
                Some(context.token()),
                &json!({ "seen": true }),
            )
            .await;

        if response.status == 200 {
            self.seen = true;
            true
        } else {
            warn!(id = %self.id, status = response.status, "failed to mark message as read");
            false
        }
    }

    /// Mark a copy of the message as read in the background.
    pub fn spawn_mark_as_read<F>(&self, callback: F) -> TaskHandle<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let mut message = self.clone();
        self.workers().spawn("mark_message_read", async move {
            callback(message.mark_as_read().await);
        })
    }

    fn workers(&self) -> WorkerPool {
        self.context
            .as_ref()
            .map(|context| context.workers.clone())
            .unwrap_or_default()
    }
}

/// A file attached to a [`Message`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub disposition: String,
    pub transfer_encoding: String,
    pub related: bool,
    /// Size in bytes.
    pub size: u64,
    /// Download path relative to the API origin.
    pub download_url: String,
    #[serde(skip)]
    context: Option<SessionContext>,
}

impl Attachment {
    /// Absolute download URL on the API origin the session uses.
    pub fn full_download_url(&self) -> String {
        match &self.context {
            Some(context) => context.api(&self.download_url),
            None => format!("{}{}", crate::client::DEFAULT_BASE_URL, self.download_url),
        }
    }

    /// Save under `dir` using the attachment's own filename.
    pub async fn save(&self, dir: impl AsRef<Path>) -> bool {
        self.save_as(dir, &self.filename).await
    }

    /// Save as `dir/filename`; `false` on any failure.
    pub async fn save_as(&self, dir: impl AsRef<Path>, filename: &str) -> bool {
        match self.try_save_as(dir, filename).await {
            Ok(path) => {
                debug!(path = %path.display(), "attachment saved");
                true
            }
            Err(err) => {
                warn!(id = %self.id, error = %err, "failed to save attachment");
                false
            }
        }
    }

    /// Download and write to `dir/filename`, returning the written path.
    ///
    /// An existing file is never overwritten. `filename` must be a single
    /// plain path component; anything that could leave `dir` is rejected with
    /// [`Error::InvalidFilename`] before the download starts.
    pub async fn try_save_as(&self, dir: impl AsRef<Path>, filename: &str) -> Result<PathBuf> {
        let path = target_path(dir.as_ref(), filename)?;
        let context = self.context.as_ref().ok_or(Error::Detached)?;
        let response = context
            .transport
            .download(&self.full_download_url(), Some(context.token()))
            .await;
        if response.status != 200 {
            return Err(Error::UnexpectedResponse {
                status: response.status,
            });
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(&response.body).await?;
        file.flush().await?;
        Ok(path)
    }

    /// Save in the background and report the outcome.
    pub fn spawn_save<F>(
        &self,
        dir: impl Into<PathBuf>,
        filename: impl Into<String>,
        callback: F,
    ) -> TaskHandle<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let attachment = self.clone();
        let dir = dir.into();
        let filename = filename.into();
        let workers = self
            .context
            .as_ref()
            .map(|context| context.workers.clone())
            .unwrap_or_default();

        workers.spawn("save_attachment", async move {
            callback(attachment.save_as(&dir, &filename).await);
        })
    }
}

/// Join `filename` onto `dir`, refusing separators, roots and `..`.
fn target_path(dir: &Path, filename: &str) -> Result<PathBuf> {
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if !filename.contains(['/', '\\']) => {
            Ok(dir.join(name))
        }
        _ => Err(Error::InvalidFilename(filename.to_string())),
    }
}
