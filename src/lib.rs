//! # Mail.tm Client
//! Asynchronous client for the Mail.tm disposable email service: create or log in to throwaway accounts with [`Client`], read and manage messages through a [`Session`], and get live inbox updates through an [`EventListener`].
//!
//! ## Audience and uses
//! For Rust developers who need real, short-lived mailboxes in integration tests, demos, or automation scripts: create an account, wait for a message to arrive on the event channel, read it, and delete the account when done.
//!
//! ## Runtime requirements
//! Async-only; run inside a Tokio (v1) runtime. Background operations (`spawn_*`) and the event channel are Tokio tasks. HTTP calls use `reqwest`.
//!
//! ## Out of scope
//! No retries beyond the event channel's fixed reconnect delay, no exactly-once event delivery, and no state is persisted between runs. Keep the [`Session::token`] yourself if you need to resume later.
//!
//! ## Errors
//! Account setup and by-id reads return typed [`Error`] values. Best-effort calls such as [`Session::get_self`] or [`Message::delete`] return a zero value or `false` and log the cause with `tracing`; their `try_*` counterparts return the error instead. The event channel reports failures through [`EventListener::on_error`] and keeps running.
//!
//! ## Example
//! ```no_run
//! use mailtm_client::{Client, EventListener, Message};
//!
//! struct Printer;
//!
//! impl EventListener for Printer {
//!     fn on_message_received(&self, message: Message) {
//!         println!("From: {}, Subject: {}", message.sender_address(), message.subject);
//!     }
//!
//!     fn on_error(&self, error: &str) {
//!         eprintln!("event channel: {error}");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mailtm_client::Error> {
//!     let client = Client::new()?;
//!     let session = client.create_random("p@ss1").await?;
//!     println!("Created: {}", session.get_self().await.address);
//!
//!     session.open_event_channel(Printer);
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     session.close_event_channel();
//!
//!     for message in session.fetch_messages(Some(10)).await? {
//!         println!("{}: {}", message.id, message.subject);
//!     }
//!
//!     session.delete().await;
//!     Ok(())
//! }
//! ```

mod client;
mod context;
mod domains;
mod error;
mod events;
mod message;
mod models;
mod session;
pub mod sse;
mod transport;
mod worker;

pub use client::{Client, ClientBuilder};
pub use domains::DomainDirectory;
pub use error::Error;
pub use events::EventListener;
pub use message::{Attachment, Message};
pub use models::{Account, Domain, Recipient};
pub use session::Session;
pub use transport::{Response, Transport};
pub use worker::{TaskHandle, WorkerPool};

/// Result type alias for Mail.tm operations.
///
/// This is equivalent to `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
