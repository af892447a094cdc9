mod common;

use common::{ACCOUNT_ID, TOKEN, account_json, client, message_json, summary_json};
use httpmock::prelude::*;
use mailtm_client::Error;
use serde_json::json;
use tokio::sync::oneshot;

#[tokio::test]
async fn fetch_messages_on_empty_inbox_is_empty() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/messages");
            then.status(200).json_body(json!([]));
        })
        .await;

    let session = client(&server).resume(TOKEN, ACCOUNT_ID);
    let messages = session.fetch_messages(None).await.unwrap();

    assert!(messages.is_empty());
    assert_eq!(session.total_messages().await, 0);
}

#[test_log::test(tokio::test)]
async fn fetch_messages_with_limit_keeps_list_order() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/messages")
                .header("authorization", format!("Bearer {TOKEN}"));
            then.status(200).json_body(json!([
                summary_json("m3"),
                summary_json("m1"),
                summary_json("m2")
            ]));
        })
        .await;
    let m3 = server
        .mock_async(|when, then| {
            when.method(GET).path("/messages/m3");
            then.status(200).json_body(message_json("m3", false));
        })
        .await;
    let m1 = server
        .mock_async(|when, then| {
            when.method(GET).path("/messages/m1");
            then.status(200).json_body(message_json("m1", true));
        })
        .await;
    let m2 = server
        .mock_async(|when, then| {
            when.method(GET).path("/messages/m2");
            then.status(200).json_body(message_json("m2", false));
        })
        .await;

    let session = client(&server).resume(TOKEN, ACCOUNT_ID);
    let messages = session.fetch_messages(Some(2)).await.unwrap();

    let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["m3", "m1"]);
    assert!(messages.iter().all(|m| m.is_bound()));
    m3.assert_async().await;
    m1.assert_async().await;
    m2.assert_hits_async(0).await;

    assert_eq!(session.fetch_messages(Some(10)).await.unwrap().len(), 3);
    assert_eq!(session.total_messages().await, 3);
}

#[tokio::test]
async fn failed_detail_fetch_fails_the_whole_call() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/messages");
            then.status(200)
                .json_body(json!([summary_json("m1"), summary_json("gone")]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/messages/m1");
            then.status(200).json_body(message_json("m1", false));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/messages/gone");
            then.status(404);
        })
        .await;

    let session = client(&server).resume(TOKEN, ACCOUNT_ID);
    let err = session.fetch_messages(None).await.unwrap_err();
    assert!(matches!(err, Error::MessageFetchFailed(detail) if detail.contains("gone")));
}

#[tokio::test]
async fn failed_list_call_is_message_fetch_failed_and_counts_as_zero() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/messages");
            then.status(500);
        })
        .await;

    let session = client(&server).resume(TOKEN, ACCOUNT_ID);

    assert!(matches!(
        session.fetch_messages(None).await,
        Err(Error::MessageFetchFailed(_))
    ));
    assert_eq!(session.total_messages().await, 0);
    assert!(matches!(
        session.try_total_messages().await,
        Err(Error::UnexpectedResponse { status: 500 })
    ));
}

#[tokio::test]
async fn best_effort_self_read_returns_zero_account() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/me");
            then.status(401);
        })
        .await;

    let session = client(&server).resume("expired", ACCOUNT_ID);

    assert!(session.get_self().await.id.is_empty());
    assert!(session.try_get_self().await.is_err());
}

#[tokio::test]
async fn reads_by_id_surface_typed_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/accounts/other");
            then.status(200)
                .json_body(account_json("other", "o@example.com", false));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/accounts/missing");
            then.status(404);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/messages/missing");
            then.status(404);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/messages/garbled");
            then.status(200).body("<html>");
        })
        .await;

    let session = client(&server).resume(TOKEN, ACCOUNT_ID);

    assert_eq!(session.get_account_by_id("other").await.unwrap().address, "o@example.com");
    assert!(matches!(
        session.get_account_by_id("missing").await,
        Err(Error::AccountNotFound(_))
    ));
    assert!(matches!(
        session.get_message_by_id("missing").await,
        Err(Error::MessageFetchFailed(_))
    ));
    assert!(matches!(
        session.get_message_by_id("garbled").await,
        Err(Error::MessageFetchFailed(_))
    ));
}

#[tokio::test]
async fn delete_account_requires_204() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/me");
            then.status(200)
                .json_body(account_json(ACCOUNT_ID, "x@example.com", false));
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path(format!("/accounts/{ACCOUNT_ID}"))
                .header("authorization", format!("Bearer {TOKEN}"));
            then.status(204);
        })
        .await;

    let session = client(&server).resume(TOKEN, ACCOUNT_ID);
    assert!(session.delete().await);
    delete.assert_async().await;
}

#[tokio::test]
async fn already_deleted_account_short_circuits() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/me");
            then.status(200)
                .json_body(account_json(ACCOUNT_ID, "x@example.com", true));
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE).path(format!("/accounts/{ACCOUNT_ID}"));
            then.status(204);
        })
        .await;

    let session = client(&server).resume(TOKEN, ACCOUNT_ID);
    assert!(session.delete().await);
    delete.assert_hits_async(0).await;
}

#[tokio::test]
async fn background_operations_report_through_callbacks() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/messages");
            then.status(200).json_body(json!([summary_json("m1")]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/messages/m1");
            then.status(200).json_body(message_json("m1", false));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/me");
            then.status(500);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path(format!("/accounts/{ACCOUNT_ID}"));
            then.status(500);
        })
        .await;

    let session = client(&server).resume(TOKEN, ACCOUNT_ID);

    let (tx, rx) = oneshot::channel();
    let handle = session.spawn_fetch_messages(None, move |result| {
        let _ = tx.send(result);
    });
    handle.join().await.unwrap();
    let messages = rx.await.unwrap().unwrap();
    assert_eq!(messages[0].subject, "Subject m1");

    let (tx, rx) = oneshot::channel();
    session
        .spawn_delete(move |deleted| {
            let _ = tx.send(deleted);
        })
        .join()
        .await
        .unwrap();
    assert!(!rx.await.unwrap());
}

#[tokio::test]
async fn message_delete_is_idempotent() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/messages/m1");
            then.status(200).json_body(message_json("m1", false));
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/messages/m1")
                .header("authorization", format!("Bearer {TOKEN}"));
            then.status(204);
        })
        .await;

    let session = client(&server).resume(TOKEN, ACCOUNT_ID);
    let mut message = session.get_message_by_id("m1").await.unwrap();

    assert!(message.delete().await);
    assert!(message.is_deleted);
    assert!(message.delete().await);
    delete.assert_hits_async(1).await;
}

#[tokio::test]
async fn mark_as_read_patches_once() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/messages/m1");
            then.status(200).json_body(message_json("m1", false));
        })
        .await;
    let patch = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/messages/m1")
                .header("content-type", "application/merge-patch+json")
                .json_body(json!({ "seen": true }));
            then.status(200).json_body(message_json("m1", true));
        })
        .await;

    let session = client(&server).resume(TOKEN, ACCOUNT_ID);
    let mut message = session.get_message_by_id("m1").await.unwrap();

    assert!(message.mark_as_read().await);
    assert!(message.seen);
    assert!(message.mark_as_read().await);
    patch.assert_hits_async(1).await;

    let (tx, rx) = oneshot::channel();
    let unseen = session.get_message_by_id("m1").await.unwrap();
    unseen
        .spawn_mark_as_read(move |ok| {
            let _ = tx.send(ok);
        })
        .join()
        .await
        .unwrap();
    assert!(rx.await.unwrap());
    patch.assert_hits_async(2).await;
}

#[tokio::test]
async fn attachments_download_into_a_directory() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/messages/m1");
            then.status(200).json_body(message_json("m1", false));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/messages/m1/attachment/ATTACH000001")
                .header("authorization", format!("Bearer {TOKEN}"));
            then.status(200).body("hello");
        })
        .await;

    let session = client(&server).resume(TOKEN, ACCOUNT_ID);
    let message = session.get_message_by_id("m1").await.unwrap();
    let attachment = &message.attachments[0];
    let dir = tempfile::tempdir().unwrap();

    assert_eq!(
        attachment.full_download_url(),
        server.url("/messages/m1/attachment/ATTACH000001")
    );
    assert!(attachment.save(dir.path()).await);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("note.txt")).unwrap(),
        "hello"
    );
    // Existing files are left alone.
    assert!(!attachment.save(dir.path()).await);

    let (tx, rx) = oneshot::channel();
    attachment
        .spawn_save(dir.path(), "copy.txt", move |ok| {
            let _ = tx.send(ok);
        })
        .join()
        .await
        .unwrap();
    assert!(rx.await.unwrap());
    assert!(dir.path().join("copy.txt").exists());
}

#[tokio::test]
async fn attachment_names_cannot_escape_the_directory() {
    let server = MockServer::start_async().await;
    let mut hostile = message_json("m2", false);
    hostile["attachments"][0]["filename"] = json!("../escaped.txt");
    hostile["attachments"][0]["downloadUrl"] = json!("/messages/m2/attachment/ATTACH000001");
    server
        .mock_async(|when, then| {
            when.method(GET).path("/messages/m2");
            then.status(200).json_body(hostile);
        })
        .await;
    let download = server
        .mock_async(|when, then| {
            when.method(GET).path("/messages/m2/attachment/ATTACH000001");
            then.status(200).body("payload");
        })
        .await;

    let session = client(&server).resume(TOKEN, ACCOUNT_ID);
    let message = session.get_message_by_id("m2").await.unwrap();
    let attachment = &message.attachments[0];
    let root = tempfile::tempdir().unwrap();
    let inbox = root.path().join("inbox");
    std::fs::create_dir(&inbox).unwrap();

    assert!(!attachment.save(&inbox).await);
    assert!(!root.path().join("escaped.txt").exists());
    assert!(matches!(
        attachment.try_save_as(&inbox, "/tmp/absolute.txt").await,
        Err(Error::InvalidFilename(_))
    ));
    // Rejected before any bytes are fetched.
    download.assert_hits_async(0).await;

    assert!(attachment.save_as(&inbox, "renamed.txt").await);
    assert_eq!(
        std::fs::read_to_string(inbox.join("renamed.txt")).unwrap(),
        "payload"
    );
}
