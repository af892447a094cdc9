//! Shared per-session state handed to entities and the event channel.

use crate::message::Message;
use crate::transport::Transport;
use crate::worker::WorkerPool;
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// Service origins a client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Endpoints {
    pub(crate) base_url: String,
    pub(crate) events_url: String,
}

impl Endpoints {
    pub(crate) fn new(base_url: &str, events_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            events_url: events_url.to_string(),
        }
    }

    pub(crate) fn api(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Everything an authenticated entity needs to act on its own: the bearer
/// token, the transport, the endpoints and the background worker pool.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub(crate) transport: Transport,
    pub(crate) endpoints: Arc<Endpoints>,
    pub(crate) workers: WorkerPool,
    token: Arc<str>,
}

impl SessionContext {
    pub(crate) fn new(
        transport: Transport,
        endpoints: Arc<Endpoints>,
        workers: WorkerPool,
        token: &str,
    ) -> Self {
        Self {
            transport,
            endpoints,
            workers,
            token: Arc::from(token),
        }
    }

    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    pub(crate) fn api(&self, path: &str) -> String {
        self.endpoints.api(path)
    }

    /// `GET /messages/{id}`, bound to this context.
    pub(crate) async fn get_message(&self, id: &str) -> Result<Message> {
        let response = self
            .transport
            .get(&self.api(&format!("/messages/{id}")), Some(self.token()))
            .await;

        if response.status != 200 {
            return Err(Error::MessageFetchFailed(format!(
                "message `{id}` returned status {}: {}",
                response.status,
                response.text()
            )));
        }

        let message: Message = response
            .json()
            .map_err(|err| Error::MessageFetchFailed(format!("message `{id}`: {err}")))?;
        Ok(message.bind(self.clone()))
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("endpoints", &self.endpoints)
            .field("token", &"<redacted>")
            .finish()
    }
}
