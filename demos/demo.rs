use mailtm_client::{Account, Client, EventListener, Message};
use std::time::Duration;

struct Printer;

impl EventListener for Printer {
    fn on_ready(&self) {
        println!("Listening for mail...");
    }

    fn on_message_received(&self, message: Message) {
        println!(
            "New message from {} <{}>: {}",
            message.sender_name(),
            message.sender_address(),
            message.subject
        );
        println!("{}", message.text);
    }

    fn on_message_seen(&self, message: Message) {
        println!("Seen: {}", message.subject);
    }

    fn on_message_delete(&self, id: &str) {
        println!("Deleted: {id}");
    }

    fn on_account_update(&self, account: Account) {
        println!("Account now uses {} of {} bytes", account.used, account.quota);
    }

    fn on_error(&self, error: &str) {
        eprintln!("Event channel error: {error}");
    }
}

#[tokio::main]
async fn main() -> Result<(), mailtm_client::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let client = Client::new()?;
    let session = client.create_random("demo-password-1").await?;
    let account = session.get_self().await;
    println!("Created: {}", account.address);

    session.open_event_channel(Printer);
    tokio::time::sleep(Duration::from_secs(120)).await;
    session.close_event_channel();

    for mut message in session.fetch_messages(Some(5)).await? {
        println!("{}: {}", message.id, message.subject);
        message.mark_as_read().await;
    }

    println!("Deleted account: {}", session.delete().await);
    Ok(())
}
