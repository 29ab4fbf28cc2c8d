//! API module for the chat backend

pub mod client;
pub mod messages;
pub mod remote_config;
pub mod storage;

use anyhow::Result;
use std::path::Path;

use client::ChatClient;

/// Read recent messages
pub async fn read_messages(limit: usize) -> Result<()> {
    messages::read_messages(limit).await
}

/// Send a text message
pub async fn send_message(text: &str) -> Result<()> {
    let client = ChatClient::new().await?;
    messages::send_text(&client, text).await?;
    println!("Message sent.");
    Ok(())
}

/// Upload a photo and send the matching photo message
pub async fn send_photo(path: &Path) -> Result<()> {
    let client = ChatClient::new().await?;
    let url = storage::upload_photo(&client, path).await?;

    // The final document write is fire-and-forget: a failure is logged but
    // does not fail the command once the upload itself succeeded.
    match messages::send_photo_url(&client, &url).await {
        Ok(_) => println!("Photo sent."),
        Err(e) => {
            tracing::warn!("Photo uploaded but message write failed: {:#}", e);
            println!("Photo uploaded; message write did not complete.");
        }
    }
    Ok(())
}

/// Show the active message length limit
pub async fn show_limit() -> Result<()> {
    remote_config::show_limit().await
}
