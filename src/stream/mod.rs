//! Live change feed for the `messages` collection
//!
//! Subscribes to the database's SSE stream and translates wire events into
//! discrete child events (added / changed / removed / moved) delivered over
//! a channel. Detaching the subscription is the only cancellation
//! primitive; it is synchronous and leaves the handle reusable for a later
//! attach.

pub mod sse;

use anyhow::{Context, Result};
use futures::StreamExt;
use serde::Deserialize;
use std::collections::BTreeSet;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::client::ChatClient;
use crate::api::messages::MESSAGES_PATH;
use crate::models::FriendlyMessage;
use sse::SseParser;

/// A discrete change to the remote message collection.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildEvent {
    Added { key: String, message: FriendlyMessage },
    Changed { key: String, message: FriendlyMessage },
    Removed { key: String },
    /// Never produced by this feed; carried so consumers keep the no-op
    /// explicit.
    #[allow(dead_code)]
    Moved { key: String },
}

/// Terminal conditions of the change feed.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("auth revoked by server")]
    AuthRevoked,
    #[error("change feed closed by server")]
    Closed,
    #[error("change feed transport error: {0:#}")]
    Transport(#[from] anyhow::Error),
}

/// `put`/`patch` payload: a path into the collection plus the data at it.
#[derive(Debug, Deserialize)]
struct PutPayload {
    path: String,
    data: serde_json::Value,
}

/// Tracks which child keys have been seen, classifying each incoming
/// document as an addition or a change.
#[derive(Default)]
struct ChildTracker {
    known: BTreeSet<String>,
}

impl ChildTracker {
    /// Translate a `put` at `path` into child events.
    fn handle_put(&mut self, path: &str, data: serde_json::Value) -> Vec<ChildEvent> {
        let trimmed = path.trim_matches('/');

        if trimmed.is_empty() {
            // Root put: the initial snapshot (or a wholesale replacement).
            return self.handle_snapshot(data);
        }

        if trimmed.contains('/') {
            // Sub-document write; tolerated but not reconstructed here.
            tracing::debug!("Skipping deep put at {}", path);
            return Vec::new();
        }

        let key = trimmed.to_string();
        if data.is_null() {
            if self.known.remove(&key) {
                return vec![ChildEvent::Removed { key }];
            }
            return Vec::new();
        }

        match serde_json::from_value::<FriendlyMessage>(data) {
            Ok(message) => {
                if self.known.insert(key.clone()) {
                    vec![ChildEvent::Added { key, message }]
                } else {
                    vec![ChildEvent::Changed { key, message }]
                }
            }
            Err(e) => {
                tracing::debug!("Skipping undecodable message {}: {:#}", key, e);
                Vec::new()
            }
        }
    }

    /// A root-level map: one put per child, in key order (push keys sort
    /// chronologically).
    fn handle_snapshot(&mut self, data: serde_json::Value) -> Vec<ChildEvent> {
        let map = match data {
            serde_json::Value::Null => return Vec::new(),
            serde_json::Value::Object(map) => map,
            other => {
                tracing::debug!("Unexpected snapshot payload: {}", other);
                return Vec::new();
            }
        };

        let ordered: std::collections::BTreeMap<String, serde_json::Value> =
            map.into_iter().collect();
        let mut events = Vec::new();
        for (key, value) in ordered {
            events.extend(self.handle_put(&format!("/{}", key), value));
        }
        events
    }

    /// A `patch` at the root carries per-child updates; anything deeper is
    /// treated like a deep put.
    fn handle_patch(&mut self, path: &str, data: serde_json::Value) -> Vec<ChildEvent> {
        if path.trim_matches('/').is_empty() {
            self.handle_snapshot(data)
        } else {
            tracing::debug!("Skipping deep patch at {}", path);
            Vec::new()
        }
    }
}

/// Events delivered to a subscriber: a child event, or the terminal error.
pub type FeedItem = Result<ChildEvent, StreamError>;

/// Open a channel pair for feed delivery.
pub fn feed_channel() -> (mpsc::Sender<FeedItem>, mpsc::Receiver<FeedItem>) {
    mpsc::channel(64)
}

/// An attached change-feed subscription.
///
/// Dropping the handle aborts the reader task, so detachment happens on
/// every exit path of the owner.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Open the feed and spawn a reader task delivering into `tx`.
    pub async fn attach(client: &ChatClient, tx: mpsc::Sender<FeedItem>) -> Result<Self> {
        let resp = client
            .db_stream(MESSAGES_PATH)
            .await
            .context("Failed to open change feed")?;

        let task = tokio::spawn(read_loop(resp, tx));

        tracing::info!("Change feed attached");
        Ok(Self { task })
    }

    /// Detach the subscription, stopping the reader immediately.
    pub fn detach(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        tracing::info!("Change feed detached");
    }
}

/// Reader task: decode SSE frames into child events until the feed ends.
async fn read_loop(resp: reqwest::Response, tx: mpsc::Sender<Result<ChildEvent, StreamError>>) {
    let mut parser = SseParser::new();
    let mut tracker = ChildTracker::default();
    let mut bytes = resp.bytes_stream();

    loop {
        let chunk = match bytes.next().await {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => {
                let err = StreamError::Transport(anyhow::Error::new(e).context("feed read"));
                let _ = tx.send(Err(err)).await;
                return;
            }
            None => {
                let _ = tx.send(Err(StreamError::Closed)).await;
                return;
            }
        };

        for sse_event in parser.feed(&chunk) {
            let outcome = handle_wire_event(&mut tracker, &sse_event.event, &sse_event.data);
            match outcome {
                WireOutcome::Events(events) => {
                    for event in events {
                        if tx.send(Ok(event)).await.is_err() {
                            // Receiver gone: the subscription was detached.
                            return;
                        }
                    }
                }
                WireOutcome::End(err) => {
                    let _ = tx.send(Err(err)).await;
                    return;
                }
                WireOutcome::Ignore => {}
            }
        }
    }
}

enum WireOutcome {
    Events(Vec<ChildEvent>),
    End(StreamError),
    Ignore,
}

fn handle_wire_event(tracker: &mut ChildTracker, event: &str, data: &str) -> WireOutcome {
    match event {
        "put" | "patch" => {
            let payload: PutPayload = match serde_json::from_str(data) {
                Ok(p) => p,
                Err(e) => {
                    tracing::debug!("Undecodable {} payload: {:#}", event, e);
                    return WireOutcome::Ignore;
                }
            };
            let events = if event == "put" {
                tracker.handle_put(&payload.path, payload.data)
            } else {
                tracker.handle_patch(&payload.path, payload.data)
            };
            WireOutcome::Events(events)
        }
        "keep-alive" => WireOutcome::Ignore,
        "cancel" => WireOutcome::End(StreamError::Closed),
        "auth_revoked" => WireOutcome::End(StreamError::AuthRevoked),
        other => {
            tracing::debug!("Ignoring SSE event type {}", other);
            WireOutcome::Ignore
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(tracker: &mut ChildTracker, path: &str, json: &str) -> Vec<ChildEvent> {
        tracker.handle_put(path, serde_json::from_str(json).unwrap())
    }

    #[test]
    fn initial_snapshot_becomes_added_events_in_key_order() {
        let mut tracker = ChildTracker::default();
        let events = put(
            &mut tracker,
            "/",
            r#"{"-N2":{"text":"second","name":"Bob"},"-N1":{"text":"first","name":"Alice"}}"#,
        );
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            ChildEvent::Added { key, message } if key == "-N1" && message.text.as_deref() == Some("first")
        ));
        assert!(matches!(
            &events[1],
            ChildEvent::Added { key, .. } if key == "-N2"
        ));
    }

    #[test]
    fn unknown_key_is_added_then_known_key_is_changed() {
        let mut tracker = ChildTracker::default();
        let first = put(&mut tracker, "/-N1", r#"{"text":"hi","name":"Alice"}"#);
        assert!(matches!(&first[0], ChildEvent::Added { .. }));

        let second = put(&mut tracker, "/-N1", r#"{"text":"hi!","name":"Alice"}"#);
        assert!(matches!(
            &second[0],
            ChildEvent::Changed { key, message } if key == "-N1" && message.text.as_deref() == Some("hi!")
        ));
    }

    #[test]
    fn null_put_for_known_key_is_removed() {
        let mut tracker = ChildTracker::default();
        put(&mut tracker, "/-N1", r#"{"text":"hi","name":"Alice"}"#);
        let events = put(&mut tracker, "/-N1", "null");
        assert_eq!(
            events,
            vec![ChildEvent::Removed {
                key: "-N1".to_string()
            }]
        );
    }

    #[test]
    fn null_put_for_unknown_key_is_silent() {
        let mut tracker = ChildTracker::default();
        assert!(put(&mut tracker, "/-N9", "null").is_empty());
    }

    #[test]
    fn undecodable_document_is_skipped() {
        let mut tracker = ChildTracker::default();
        let events = put(&mut tracker, "/-N1", r#""not a document""#);
        assert!(events.is_empty());
        // The key was not recorded, so a later valid put is still an add.
        let events = put(&mut tracker, "/-N1", r#"{"text":"ok","name":"A"}"#);
        assert!(matches!(&events[0], ChildEvent::Added { .. }));
    }

    #[test]
    fn deep_put_is_ignored() {
        let mut tracker = ChildTracker::default();
        put(&mut tracker, "/-N1", r#"{"text":"hi","name":"Alice"}"#);
        assert!(put(&mut tracker, "/-N1/text", r#""edited""#).is_empty());
    }

    #[test]
    fn root_patch_updates_children() {
        let mut tracker = ChildTracker::default();
        put(&mut tracker, "/-N1", r#"{"text":"hi","name":"Alice"}"#);
        let events = tracker.handle_patch(
            "/",
            serde_json::from_str(r#"{"-N1":{"text":"edited","name":"Alice"}}"#).unwrap(),
        );
        assert!(matches!(&events[0], ChildEvent::Changed { .. }));
    }

    #[test]
    fn wire_event_terminations() {
        let mut tracker = ChildTracker::default();
        assert!(matches!(
            handle_wire_event(&mut tracker, "auth_revoked", "\"token expired\""),
            WireOutcome::End(StreamError::AuthRevoked)
        ));
        assert!(matches!(
            handle_wire_event(&mut tracker, "cancel", "null"),
            WireOutcome::End(StreamError::Closed)
        ));
        assert!(matches!(
            handle_wire_event(&mut tracker, "keep-alive", "null"),
            WireOutcome::Ignore
        ));
    }
}
