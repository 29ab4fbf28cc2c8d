//! Message operations against the `messages` collection
//!
//! Documents are appended with POST; the server assigns lexicographically
//! time-ordered push keys, so key order is chronological order.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::client::ChatClient;
use crate::models::FriendlyMessage;

/// Collection root for chat messages.
pub const MESSAGES_PATH: &str = "messages";

/// Push response: the server-generated key of the new child.
#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

/// Build the document for a text send. `photoUrl` stays absent; `name` is
/// the active username.
pub fn text_document(text: &str, username: &str, uid: Option<String>) -> FriendlyMessage {
    FriendlyMessage::text(text, username, uid)
}

/// Build the document for a photo send. `text` stays absent.
pub fn photo_document(photo_url: &str, username: &str, uid: Option<String>) -> FriendlyMessage {
    FriendlyMessage::photo(photo_url, username, uid)
}

/// Append a text message. Requires non-empty trimmed input; there is no
/// local insert -- the sender sees the message through the change feed like
/// everyone else. Returns the push key.
pub async fn send_text(client: &ChatClient, text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        bail!("Refusing to send an empty message");
    }

    let doc = text_document(trimmed, &client.username(), client.uid());
    push_message(client, &doc).await
}

/// Append a photo message pointing at an already-uploaded object URL.
pub async fn send_photo_url(client: &ChatClient, photo_url: &str) -> Result<String> {
    let doc = photo_document(photo_url, &client.username(), client.uid());
    push_message(client, &doc).await
}

/// Append a message document and return its push key.
pub async fn push_message(client: &ChatClient, message: &FriendlyMessage) -> Result<String> {
    let body = serde_json::to_value(message).context("Failed to encode message")?;
    let resp = client.db_post(MESSAGES_PATH, &body).await?;
    let push: PushResponse = resp.json().await.context("Failed to parse push response")?;
    tracing::debug!("Pushed message {}", push.name);
    Ok(push.name)
}

/// Read the most recent messages in chronological order as (key, message)
/// pairs. Documents that fail to decode are skipped.
pub async fn read_messages_data(
    client: &ChatClient,
    limit: usize,
) -> Result<Vec<(String, FriendlyMessage)>> {
    let query = format!("orderBy=%22%24key%22&limitToLast={}", limit);
    let resp = client.db_get(MESSAGES_PATH, &query).await?;

    // Null body when the collection is empty.
    let body: Option<BTreeMap<String, serde_json::Value>> = resp
        .json()
        .await
        .context("Failed to parse messages response")?;

    let mut result = Vec::new();
    for (key, value) in body.unwrap_or_default() {
        match serde_json::from_value::<FriendlyMessage>(value) {
            Ok(msg) => result.push((key, msg)),
            Err(e) => tracing::debug!("Skipping undecodable message {}: {:#}", key, e),
        }
    }
    Ok(result)
}

/// Read recent messages and print them (CLI `read` command).
pub async fn read_messages(limit: usize) -> Result<()> {
    let client = ChatClient::new().await?;
    let msgs = read_messages_data(&client, limit).await?;

    if msgs.is_empty() {
        println!("(no messages)");
        return Ok(());
    }

    for (_, msg) in &msgs {
        let name = if msg.name.is_empty() { "?" } else { &msg.name };
        match (&msg.photo_url, &msg.text) {
            (Some(url), _) => println!("{}: [photo] {}", name, url),
            (None, Some(text)) => println!("{}: {}", name, text),
            (None, None) => println!("{}: (empty message)", name),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_document_shape() {
        let doc = text_document("hello there", "Alice", Some("u1".to_string()));
        assert_eq!(doc.text.as_deref(), Some("hello there"));
        assert_eq!(doc.name, "Alice");
        assert_eq!(doc.uid.as_deref(), Some("u1"));
        assert_eq!(doc.photo_url, None);
    }

    #[test]
    fn photo_document_shape() {
        let doc = photo_document("http://x/y.jpg", "Bob", None);
        assert_eq!(doc.photo_url.as_deref(), Some("http://x/y.jpg"));
        assert_eq!(doc.text, None);
        assert_eq!(doc.name, "Bob");
    }

    #[test]
    fn text_document_wire_form_omits_photo_url() {
        let doc = text_document("hi", "Alice", None);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["text"], "hi");
        assert_eq!(json["name"], "Alice");
        assert!(json.get("photoUrl").is_none());
    }
}
