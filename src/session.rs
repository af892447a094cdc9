//! Authenticated session for one account.

use crate::context::SessionContext;
use crate::events::{EventChannel, EventListener};
use crate::message::Message;
use crate::models::Account;
use crate::transport::Response;
use crate::worker::TaskHandle;
use crate::{Error, Result};
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// An authenticated handle on one Mail.tm account.
///
/// Obtain one from [`Client::login`](crate::Client::login) and friends.
/// Cloning is cheap and clones share the same event channel. The channel is
/// closed when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    id: String,
    context: SessionContext,
    reconnect_interval: Duration,
    channel: Mutex<Option<EventChannel>>,
}

#[derive(Deserialize)]
struct MessageSummary {
    id: String,
}

impl Session {
    pub(crate) fn new(context: SessionContext, id: String, reconnect_interval: Duration) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id,
                context,
                reconnect_interval,
                channel: Mutex::new(None),
            }),
        }
    }

    /// Account id this session is bound to.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Bearer token for this session.
    ///
    /// It can be stored and handed back to
    /// [`Client::login_with_token`](crate::Client::login_with_token) later.
    pub fn token(&self) -> &str {
        self.inner.context.token()
    }

    /// The logged-in account, or [`Account::default`] when the read fails.
    ///
    /// Use [`Session::try_get_self`] to tell failures apart.
    pub async fn get_self(&self) -> Account {
        self.try_get_self().await.unwrap_or_else(|err| {
            warn!(error = %err, "failed to read own account");
            Account::default()
        })
    }

    /// Read the logged-in account.
    ///
    /// # Returns
    /// The account, or [`Error::UnexpectedResponse`] when `GET /me` does not
    /// answer 200.
    pub async fn try_get_self(&self) -> Result<Account> {
        let response = self.get("/me").await;
        if response.status != 200 {
            return Err(Error::UnexpectedResponse {
                status: response.status,
            });
        }
        response.json()
    }

    /// Delete the logged-in account.
    ///
    /// Returns `true` right away if the account already reports deleted.
    #[instrument(skip(self), fields(id = %self.inner.id))]
    pub async fn delete(&self) -> bool {
        if self.get_self().await.is_deleted {
            return true;
        }

        let context = &self.inner.context;
        let response = context
            .transport
            .delete(
                &context.api(&format!("/accounts/{}", self.inner.id)),
                Some(context.token()),
            )
            .await;

        if response.status == 204 {
            debug!("account deleted");
            true
        } else {
            warn!(status = response.status, "failed to delete account");
            false
        }
    }

    /// Delete the account in the background and report the outcome.
    pub fn spawn_delete<F>(&self, callback: F) -> TaskHandle<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let session = self.clone();
        self.inner.context.workers.spawn("delete_account", async move {
            callback(session.delete().await);
        })
    }

    /// Read any account by id.
    ///
    /// # Arguments
    /// * `id` - The account id
    ///
    /// # Returns
    /// The account, or [`Error::AccountNotFound`] when it cannot be read.
    pub async fn get_account_by_id(&self, id: &str) -> Result<Account> {
        let response = self.get(&format!("/accounts/{id}")).await;
        if response.status != 200 {
            return Err(Error::AccountNotFound(format!(
                "account `{id}` returned status {}: {}",
                response.status,
                response.text()
            )));
        }
        response
            .json()
            .map_err(|err| Error::AccountNotFound(format!("account `{id}`: {err}")))
    }

    /// Number of messages in the inbox, or `0` when the read fails.
    ///
    /// Use [`Session::try_total_messages`] to tell failures apart.
    pub async fn total_messages(&self) -> usize {
        self.try_total_messages().await.unwrap_or_else(|err| {
            warn!(error = %err, "failed to count messages");
            0
        })
    }

    /// Number of messages in the inbox.
    ///
    /// # Returns
    /// The count, or [`Error::UnexpectedResponse`] when the list call fails.
    pub async fn try_total_messages(&self) -> Result<usize> {
        Ok(self.list_summaries().await?.len())
    }

    /// Read one full message, bound to this session.
    ///
    /// # Arguments
    /// * `id` - The message id
    ///
    /// # Returns
    /// The message, or [`Error::MessageFetchFailed`].
    pub async fn get_message_by_id(&self, id: &str) -> Result<Message> {
        self.inner.context.get_message(id).await
    }

    /// Fetch full messages in server list order.
    ///
    /// Issues one list request plus one request per message. Any failure
    /// fails the whole call; no partial list is returned.
    ///
    /// # Arguments
    /// * `limit` - At most this many messages; `None` fetches every listed one
    ///
    /// # Examples
    /// ```no_run
    /// # use mailtm_client::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mailtm_client::Error> {
    /// let client = Client::new()?;
    /// let session = client.login("someone@example.com", "hunter22").await?;
    /// for message in session.fetch_messages(Some(10)).await? {
    ///     println!("{}: {}", message.sender_address(), message.subject);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(id = %self.inner.id))]
    pub async fn fetch_messages(&self, limit: Option<usize>) -> Result<Vec<Message>> {
        let summaries = self
            .list_summaries()
            .await
            .map_err(|err| Error::MessageFetchFailed(format!("message list: {err}")))?;

        let take = limit.unwrap_or(summaries.len()).min(summaries.len());
        let mut messages = Vec::with_capacity(take);
        for summary in summaries.iter().take(take) {
            messages.push(self.get_message_by_id(&summary.id).await?);
        }
        debug!(count = messages.len(), "messages fetched");
        Ok(messages)
    }

    /// Fetch messages in the background; the callback receives the result.
    pub fn spawn_fetch_messages<F>(&self, limit: Option<usize>, callback: F) -> TaskHandle<()>
    where
        F: FnOnce(Result<Vec<Message>>) + Send + 'static,
    {
        let session = self.clone();
        self.inner.context.workers.spawn("fetch_messages", async move {
            callback(session.fetch_messages(limit).await);
        })
    }

    /// Open the account's event channel with the client's reconnect interval.
    pub fn open_event_channel(&self, listener: impl EventListener) {
        self.open_event_channel_with_interval(listener, self.inner.reconnect_interval);
    }

    /// Open the account's event channel.
    ///
    /// Replaces a channel that is already open. `reconnect_interval` is how
    /// long the stream waits before reconnecting after it ends or fails.
    /// Must be called from within a Tokio runtime.
    pub fn open_event_channel_with_interval(
        &self,
        listener: impl EventListener,
        reconnect_interval: Duration,
    ) {
        let mut slot = self.channel();
        if let Some(previous) = slot.take() {
            previous.close();
        }
        *slot = Some(EventChannel::open(
            self.inner.context.clone(),
            &self.inner.id,
            Arc::new(listener),
            reconnect_interval,
        ));
        debug!(id = %self.inner.id, ?reconnect_interval, "event channel opened");
    }

    /// Stop the event channel. Events already being dispatched still complete.
    pub fn close_event_channel(&self) {
        if let Some(channel) = self.channel().take() {
            channel.close();
            debug!(id = %self.inner.id, "event channel closed");
        }
    }

    /// Whether a channel is open and its task is still running.
    pub fn is_event_channel_open(&self) -> bool {
        self.channel()
            .as_ref()
            .is_some_and(EventChannel::is_running)
    }

    async fn list_summaries(&self) -> Result<Vec<MessageSummary>> {
        let response = self.get("/messages").await;
        if response.status != 200 {
            return Err(Error::UnexpectedResponse {
                status: response.status,
            });
        }
        response.json()
    }

    async fn get(&self, path: &str) -> Response {
        let context = &self.inner.context;
        context
            .transport
            .get(&context.api(path), Some(context.token()))
            .await
    }

    fn channel(&self) -> MutexGuard<'_, Option<EventChannel>> {
        self.inner
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
