//! Live account events.
//!
//! The hub pushes one JSON envelope per change. Envelopes typed `Message`
//! are resolved to full messages before reaching the listener; anything
//! else is decoded as the account itself.

use crate::context::SessionContext;
use crate::message::Message;
use crate::models::Account;
use crate::sse::{EventSource, SourceEvent};
use crate::Result;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default delay before the event stream reconnects.
pub(crate) const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(3000);

/// Callbacks for events on an account's channel.
///
/// Every method but [`on_error`](EventListener::on_error) defaults to doing
/// nothing. A single channel calls its listener from one task, in the order
/// the hub delivered the events.
pub trait EventListener: Send + Sync + 'static {
    /// The subscription is connected.
    fn on_ready(&self) {}

    /// The server closed the stream, or the channel was closed locally.
    fn on_close(&self) {}

    /// A comment line from the event stream (usually a keep-alive).
    fn on_comment(&self, _comment: &str) {}

    /// A new message arrived. It has been fetched in full and is bound to the
    /// session, so it can be deleted or marked read directly.
    fn on_message_received(&self, _message: Message) {}

    /// A message was deleted. Only the id is known; nothing is fetched.
    fn on_message_delete(&self, _id: &str) {}

    /// A message was marked as read, fetched in full.
    fn on_message_seen(&self, _message: Message) {}

    /// The account was deleted.
    fn on_account_delete(&self, _account: Account) {}

    /// The account changed, typically its `used` storage.
    fn on_account_update(&self, _account: Account) {}

    /// A connection failure, or an envelope that could not be decoded or
    /// resolved. The channel keeps running.
    fn on_error(&self, error: &str);
}

impl<L: EventListener + ?Sized> EventListener for Arc<L> {
    fn on_ready(&self) {
        (**self).on_ready()
    }

    fn on_close(&self) {
        (**self).on_close()
    }

    fn on_comment(&self, comment: &str) {
        (**self).on_comment(comment)
    }

    fn on_message_received(&self, message: Message) {
        (**self).on_message_received(message)
    }

    fn on_message_delete(&self, id: &str) {
        (**self).on_message_delete(id)
    }

    fn on_message_seen(&self, message: Message) {
        (**self).on_message_seen(message)
    }

    fn on_account_delete(&self, account: Account) {
        (**self).on_account_delete(account)
    }

    fn on_account_update(&self, account: Account) {
        (**self).on_account_update(account)
    }

    fn on_error(&self, error: &str) {
        (**self).on_error(error)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageEnvelope {
    id: String,
    #[serde(default)]
    seen: bool,
    #[serde(default)]
    is_deleted: bool,
}

/// Route one envelope to the listener. Failures go to `on_error`.
pub(crate) async fn dispatch(context: &SessionContext, listener: &dyn EventListener, data: &str) {
    if data.trim().is_empty() {
        return;
    }
    if let Err(err) = route(context, listener, data).await {
        warn!(error = %err, "failed to dispatch event");
        listener.on_error(&err.to_string());
    }
}

async fn route(context: &SessionContext, listener: &dyn EventListener, data: &str) -> Result<()> {
    let envelope: serde_json::Value = serde_json::from_str(data)?;

    if envelope.get("@type").and_then(serde_json::Value::as_str) == Some("Message") {
        let head: MessageEnvelope = serde_json::from_value(envelope)?;
        if head.is_deleted {
            listener.on_message_delete(&head.id);
        } else if head.seen {
            listener.on_message_seen(context.get_message(&head.id).await?);
        } else {
            listener.on_message_received(context.get_message(&head.id).await?);
        }
    } else {
        let account: Account = serde_json::from_value(envelope)?;
        if account.is_deleted {
            listener.on_account_delete(account);
        } else {
            listener.on_account_update(account);
        }
    }
    Ok(())
}

/// A running subscription task.
#[derive(Debug)]
pub(crate) struct EventChannel {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl EventChannel {
    /// Subscribe to `/accounts/{account_id}` and start dispatching.
    pub(crate) fn open(
        context: SessionContext,
        account_id: &str,
        listener: Arc<dyn EventListener>,
        reconnect_interval: Duration,
    ) -> Self {
        let url = format!(
            "{}?topic=/accounts/{}",
            context.endpoints.events_url, account_id
        );
        let source = EventSource::new(
            context.transport.http().clone(),
            url,
            context.token(),
            reconnect_interval,
        );
        let (shutdown, closed) = watch::channel(false);
        let task = tokio::spawn(run(source, context, listener, closed));
        Self { shutdown, task }
    }

    /// Stop reading frames. A dispatch already under way finishes first.
    pub(crate) fn close(&self) {
        // Fails only when the task has already exited.
        let _ = self.shutdown.send(true);
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

async fn run(
    mut source: EventSource,
    context: SessionContext,
    listener: Arc<dyn EventListener>,
    mut closed: watch::Receiver<bool>,
) {
    let mut open = false;
    loop {
        let next = tokio::select! {
            _ = closed.changed() => {
                if open {
                    listener.on_close();
                }
                break;
            }
            next = source.next() => next,
        };
        let Some(event) = next else {
            break;
        };

        match event {
            SourceEvent::Open => {
                open = true;
                listener.on_ready();
            }
            SourceEvent::Event(event) => dispatch(&context, listener.as_ref(), &event.data).await,
            SourceEvent::Comment(comment) => listener.on_comment(&comment),
            SourceEvent::Error(error) => {
                open = false;
                listener.on_error(&error);
            }
            SourceEvent::Closed => {
                open = false;
                listener.on_close();
            }
        }
    }
    debug!("event channel stopped");
}
