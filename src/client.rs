//! Mail.tm client: account creation and login.

use crate::context::{Endpoints, SessionContext};
use crate::domains::DomainDirectory;
use crate::events::DEFAULT_RECONNECT_INTERVAL;
use crate::transport::Transport;
use crate::worker::{DEFAULT_MAX_BACKGROUND_TASKS, WorkerPool};
use crate::{Account, Error, Result, Session};
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Entry point for the Mail.tm API.
///
/// Use [`Client::new`] for defaults or [`Client::builder`] for custom settings
/// like proxies, endpoints, and background task limits. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Client {
    transport: Transport,
    endpoints: Arc<Endpoints>,
    domains: Arc<DomainDirectory>,
    workers: WorkerPool,
    reconnect_interval: Duration,
    proxy: Option<String>,
}

#[derive(Deserialize)]
struct TokenGrant {
    token: String,
    id: String,
}

impl Client {
    /// Create a builder for configuring the client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client with default settings.
    ///
    /// # Examples
    /// ```no_run
    /// # use mailtm_client::Client;
    /// let client = Client::new()?;
    /// # Ok::<(), mailtm_client::Error>(())
    /// ```
    pub fn new() -> Result<Self> {
        ClientBuilder::new().build()
    }

    /// Get the proxy URL if one was configured.
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// The domain directory used for random addresses.
    pub fn domains(&self) -> &DomainDirectory {
        &self.domains
    }

    /// Log in with an address and password.
    ///
    /// # Arguments
    /// * `email` - The full address; surrounding whitespace is ignored
    /// * `password` - The account password; surrounding whitespace is ignored
    ///
    /// # Returns
    /// A [`Session`] bound to the issued token, or [`Error::LoginFailed`] when
    /// the service rejects the credentials or cannot be reached.
    ///
    /// # Examples
    /// ```no_run
    /// # use mailtm_client::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mailtm_client::Error> {
    /// let client = Client::new()?;
    /// let session = client.login("someone@example.com", "hunter22").await?;
    /// println!("{}", session.id());
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let body = json!({ "address": email.trim(), "password": password.trim() });
        let response = self
            .transport
            .post(&self.endpoints.api("/token"), None, &body)
            .await;

        if response.is_transport_failure() {
            return Err(Error::LoginFailed("no response from service".into()));
        }
        if response.status != 200 {
            return Err(Error::LoginFailed(format!(
                "status {}: {}",
                response.status,
                response.text()
            )));
        }

        let grant: TokenGrant = response
            .json()
            .map_err(|err| Error::LoginFailed(format!("malformed token response: {err}")))?;
        debug!(id = %grant.id, "logged in");
        Ok(self.resume(&grant.token, grant.id))
    }

    /// Register an account without logging in.
    ///
    /// # Arguments
    /// * `email` - The address to register; it is lowercased first
    /// * `password` - The password to set; it is trimmed but keeps its case
    ///
    /// # Returns
    /// `true` when the service answered 200 or 201.
    pub async fn create_account(&self, email: &str, password: &str) -> bool {
        let response = self.post_account(email, password).await;
        matches!(response.status, 200 | 201)
    }

    /// Register an account and log in to it.
    ///
    /// # Arguments
    /// * `email` - The address to register
    /// * `password` - The password to set and then log in with
    ///
    /// # Returns
    /// The new [`Session`]. A taken address is [`Error::AccountAlreadyExists`],
    /// throttling is [`Error::RateLimited`], and any other refusal is
    /// [`Error::AccountCreationFailed`] with the status.
    #[instrument(skip(self, password))]
    pub async fn create_and_login(&self, email: &str, password: &str) -> Result<Session> {
        let response = self.post_account(email, password).await;
        match response.status {
            201 => self.login(&normalize_address(email), password).await,
            422 => Err(Error::AccountAlreadyExists),
            429 => Err(Error::RateLimited),
            status => Err(Error::AccountCreationFailed { status }),
        }
    }

    /// Register a random `[a-z0-9]{8}` address on an active domain and log in.
    ///
    /// The domain list is refreshed first; when no active domain is left the
    /// call fails with [`Error::NoDomainAvailable`].
    ///
    /// # Examples
    /// ```no_run
    /// # use mailtm_client::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mailtm_client::Error> {
    /// let client = Client::new()?;
    /// let session = client.create_random("p@ss1").await?;
    /// println!("{}", session.get_self().await.address);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_random(&self, password: &str) -> Result<Session> {
        let domain = self.domains.get_random().await?;
        let email = format!("{}@{}", random_local_part(LOCAL_PART_LEN), domain.name());
        self.create_and_login(&email, password).await
    }

    /// Resume a session from a previously issued bearer token.
    ///
    /// # Arguments
    /// * `token` - A token from [`Session::token`]
    ///
    /// # Returns
    /// A [`Session`] for the token's account. A rejected token is
    /// [`Error::InvalidToken`].
    pub async fn login_with_token(&self, token: &str) -> Result<Session> {
        let response = self
            .transport
            .get(&self.endpoints.api("/me"), Some(token))
            .await;

        match response.status {
            401 => Err(Error::InvalidToken),
            200 => {
                let account: Account = response.json()?;
                Ok(self.resume(token, account.id))
            }
            status => Err(Error::UnexpectedResponse { status }),
        }
    }

    /// Build a session from a token and account id without contacting the
    /// service.
    pub fn resume(&self, token: &str, id: impl Into<String>) -> Session {
        let context = SessionContext::new(
            self.transport.clone(),
            Arc::clone(&self.endpoints),
            self.workers.clone(),
            token,
        );
        Session::new(context, id.into(), self.reconnect_interval)
    }

    async fn post_account(&self, email: &str, password: &str) -> crate::Response {
        let body = json!({ "address": normalize_address(email), "password": password.trim() });
        self.transport
            .post(&self.endpoints.api("/accounts"), None, &body)
            .await
    }
}

/// The service stores addresses lowercased.
fn normalize_address(email: &str) -> String {
    email.trim().to_lowercase()
}

const LOCAL_PART_LEN: usize = 8;
const LOCAL_PART_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn random_local_part(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| LOCAL_PART_ALPHABET[rng.random_range(0..LOCAL_PART_ALPHABET.len())] as char)
        .collect()
}

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.mail.tm";
const DEFAULT_EVENTS_URL: &str = "https://mercure.mail.tm/.well-known/mercure";
const USER_AGENT_VALUE: &str = concat!("mailtm-client/", env!("CARGO_PKG_VERSION"));

/// Builder for configuring a Mail.tm client.
///
/// Start with [`Client::builder`] to override defaults.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    proxy: Option<String>,
    danger_accept_invalid_certs: bool,
    user_agent: String,
    base_url: String,
    events_url: String,
    reconnect_interval: Duration,
    max_background_tasks: usize,
}

impl ClientBuilder {
    /// Create a new builder with default settings.
    ///
    /// Defaults:
    /// - No proxy
    /// - `danger_accept_invalid_certs = false`
    /// - `mailtm-client/<version>` user agent
    /// - `https://api.mail.tm` API and the Mail.tm Mercure hub
    /// - 3 second reconnect interval
    /// - 16 concurrent background tasks
    pub fn new() -> Self {
        Self {
            proxy: None,
            danger_accept_invalid_certs: false,
            user_agent: USER_AGENT_VALUE.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            events_url: DEFAULT_EVENTS_URL.to_string(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_background_tasks: DEFAULT_MAX_BACKGROUND_TASKS,
        }
    }

    /// Set a proxy URL (e.g., "http://127.0.0.1:8080" or "socks5://127.0.0.1:1080").
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Control whether to accept invalid TLS certificates (default: false).
    pub fn danger_accept_invalid_certs(mut self, value: bool) -> Self {
        self.danger_accept_invalid_certs = value;
        self
    }

    /// Override the default user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Override the API origin.
    ///
    /// Useful for testing against a mock server.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the event hub URL.
    pub fn events_url(mut self, events_url: impl Into<String>) -> Self {
        self.events_url = events_url.into();
        self
    }

    /// Delay before the event channel reconnects after the stream drops.
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Cap on background operations running at once (minimum 1).
    pub fn max_background_tasks(mut self, max: usize) -> Self {
        self.max_background_tasks = max;
        self
    }

    /// Build the client. No network traffic happens here.
    pub fn build(self) -> Result<Client> {
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(self.danger_accept_invalid_certs)
            .user_agent(self.user_agent);

        if let Some(proxy_url) = &self.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        let transport = Transport::new(builder.build()?);
        let endpoints = Arc::new(Endpoints::new(&self.base_url, &self.events_url));
        let domains = Arc::new(DomainDirectory::new(
            transport.clone(),
            Arc::clone(&endpoints),
        ));

        Ok(Client {
            transport,
            endpoints,
            domains,
            workers: WorkerPool::new(self.max_background_tasks),
            reconnect_interval: self.reconnect_interval,
            proxy: self.proxy,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_local_part_uses_lowercase_alphanumerics() {
        for _ in 0..50 {
            let local = random_local_part(LOCAL_PART_LEN);
            assert_eq!(local.len(), 8);
            assert!(
                local
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
            );
        }
    }

    #[test]
    fn addresses_are_trimmed_and_lowercased() {
        assert_eq!(normalize_address("  Mixed@Example.COM "), "mixed@example.com");
    }

    #[test]
    fn builder_keeps_proxy() {
        let client = Client::builder()
            .proxy("http://127.0.0.1:8080")
            .build()
            .unwrap();
        assert_eq!(client.proxy(), Some("http://127.0.0.1:8080"));
        assert!(Client::new().unwrap().proxy().is_none());
    }
}
