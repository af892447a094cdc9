#![allow(dead_code)]

use httpmock::MockServer;
use mailtm_client::{Account, Client, EventListener, Message};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;

pub const TOKEN: &str = "test-token";
pub const ACCOUNT_ID: &str = "acc1";
pub const HUB_PATH: &str = "/.well-known/mercure";

/// A client pointed at the mock server for both the API and the event hub.
pub fn client(server: &MockServer) -> Client {
    Client::builder()
        .base_url(server.base_url())
        .events_url(server.url(HUB_PATH))
        .reconnect_interval(Duration::from_secs(60))
        .build()
        .unwrap()
}

pub fn account_json(id: &str, address: &str, deleted: bool) -> Value {
    json!({
        "@context": "/contexts/Account",
        "@id": format!("/accounts/{id}"),
        "@type": "Account",
        "id": id,
        "address": address,
        "quota": 40000000,
        "used": 0,
        "isDisabled": false,
        "isDeleted": deleted,
        "createdAt": "2024-03-01T10:20:30+00:00",
        "updatedAt": "2024-03-01T10:20:30+00:00"
    })
}

pub fn message_json(id: &str, seen: bool) -> Value {
    json!({
        "@id": format!("/messages/{id}"),
        "@type": "Message",
        "id": id,
        "msgid": format!("<{id}@mail>"),
        "from": { "address": "sender@example.com", "name": "Sender" },
        "to": [{ "address": "me@example.com", "name": "" }],
        "subject": format!("Subject {id}"),
        "text": "hello",
        "seen": seen,
        "flagged": false,
        "isDeleted": false,
        "retention": false,
        "retentionDate": "2024-03-08T10:20:30+00:00",
        "html": ["<p>hello</p>"],
        "hasAttachments": true,
        "attachments": [{
            "id": "ATTACH000001",
            "filename": "note.txt",
            "contentType": "text/plain",
            "disposition": "attachment",
            "transferEncoding": "base64",
            "related": false,
            "size": 5,
            "downloadUrl": format!("/messages/{id}/attachment/ATTACH000001")
        }],
        "size": 1024,
        "downloadUrl": format!("/messages/{id}/download"),
        "createdAt": "2024-03-01T10:20:30+00:00",
        "updatedAt": "2024-03-01T10:20:30+00:00"
    })
}

pub fn summary_json(id: &str) -> Value {
    json!({ "@id": format!("/messages/{id}"), "@type": "Message", "id": id, "seen": false })
}

/// Everything an [`EventListener`] was told, in order.
#[derive(Debug)]
pub enum Observed {
    Ready,
    Closed,
    Comment(String),
    Received(Message),
    Deleted(String),
    Seen(Message),
    AccountDeleted(Account),
    AccountUpdated(Account),
    Error(String),
}

pub struct Recorder(mpsc::UnboundedSender<Observed>);

impl Recorder {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Observed>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    fn push(&self, observed: Observed) {
        let _ = self.0.send(observed);
    }
}

impl EventListener for Recorder {
    fn on_ready(&self) {
        self.push(Observed::Ready);
    }

    fn on_close(&self) {
        self.push(Observed::Closed);
    }

    fn on_comment(&self, comment: &str) {
        self.push(Observed::Comment(comment.to_string()));
    }

    fn on_message_received(&self, message: Message) {
        self.push(Observed::Received(message));
    }

    fn on_message_delete(&self, id: &str) {
        self.push(Observed::Deleted(id.to_string()));
    }

    fn on_message_seen(&self, message: Message) {
        self.push(Observed::Seen(message));
    }

    fn on_account_delete(&self, account: Account) {
        self.push(Observed::AccountDeleted(account));
    }

    fn on_account_update(&self, account: Account) {
        self.push(Observed::AccountUpdated(account));
    }

    fn on_error(&self, error: &str) {
        self.push(Observed::Error(error.to_string()));
    }
}

/// Wait for the next observation or fail the test.
pub async fn next(rx: &mut mpsc::UnboundedReceiver<Observed>) -> Observed {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for listener callback")
        .expect("listener channel closed")
}
