//! Error types for the Mail.tm client.

/// Errors produced by the Mail.tm client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Building the HTTP client failed (invalid proxy, TLS backend).
    #[error("HTTP client error: {0}")]
    Request(#[from] reqwest::Error),

    /// A response body was not the JSON shape we expected.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Password login was rejected or could not reach the service.
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// The address is already registered (HTTP 422).
    #[error("account already exists")]
    AccountAlreadyExists,

    /// The service rate limited account creation (HTTP 429).
    #[error("too many requests, rate limited")]
    RateLimited,

    /// Account creation failed with an unexpected status (0 means no response).
    #[error("account creation failed with status {status}")]
    AccountCreationFailed { status: u16 },

    /// The bearer token was rejected (HTTP 401).
    #[error("invalid token")]
    InvalidToken,

    /// The service answered with a status this operation does not handle.
    #[error("unexpected response status {status}")]
    UnexpectedResponse { status: u16 },

    /// `GET /accounts/{id}` did not return the account; carries the id and status.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// A message list or detail read failed; carries which request and why.
    #[error("message fetch failed: {0}")]
    MessageFetchFailed(String),

    /// `GET /domains/{id}` failed or returned something that is not a domain.
    #[error("domain not found: {0}")]
    DomainNotFound(String),

    /// The domain list was empty (or had no active entries) after a refresh.
    #[error("no domain available")]
    NoDomainAvailable,

    /// A timestamp did not match `yyyy-MM-ddTHH:mm:ss+00:00`.
    #[error("unable to parse date/time `{value}`")]
    DateTimeParse { value: String },

    /// The entity was decoded locally and is not bound to a session.
    #[error("entity is not bound to a session")]
    Detached,

    /// An attachment filename would escape the target directory.
    #[error("refusing to write attachment as `{0}`")]
    InvalidFilename(String),

    /// A background task panicked or was aborted before completing.
    #[error("background task failed: {0}")]
    TaskFailed(String),
}
