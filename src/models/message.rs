//! Message-related models

use serde::{Deserialize, Serialize};

/// A single chat message document, as stored under the `messages` collection.
///
/// A message is either a text message (`text` set) or a photo message
/// (`photo_url` set). The store does not enforce this; documents with both
/// or neither are decoded as-is and rendered best-effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendlyMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl FriendlyMessage {
    /// Build a text message.
    pub fn text(text: impl Into<String>, name: impl Into<String>, uid: Option<String>) -> Self {
        Self {
            text: Some(text.into()),
            name: name.into(),
            uid,
            photo_url: None,
        }
    }

    /// Build a photo message.
    pub fn photo(
        photo_url: impl Into<String>,
        name: impl Into<String>,
        uid: Option<String>,
    ) -> Self {
        Self {
            text: None,
            name: name.into(),
            uid,
            photo_url: Some(photo_url.into()),
        }
    }

    /// Whether this message should render as a photo row.
    pub fn is_photo(&self) -> bool {
        self.photo_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_sparse_document() {
        // Documents may omit any field; absent maps to None/empty, never an error.
        let msg: FriendlyMessage = serde_json::from_str(r#"{"text":"hi","name":"Alice"}"#).unwrap();
        assert_eq!(msg.text.as_deref(), Some("hi"));
        assert_eq!(msg.name, "Alice");
        assert_eq!(msg.uid, None);
        assert_eq!(msg.photo_url, None);
        assert!(!msg.is_photo());
    }

    #[test]
    fn decodes_photo_document() {
        let msg: FriendlyMessage =
            serde_json::from_str(r#"{"photoUrl":"http://x/y.jpg","name":"Bob"}"#).unwrap();
        assert_eq!(msg.photo_url.as_deref(), Some("http://x/y.jpg"));
        assert_eq!(msg.text, None);
        assert!(msg.is_photo());
    }

    #[test]
    fn decodes_empty_document() {
        let msg: FriendlyMessage = serde_json::from_str("{}").unwrap();
        assert_eq!(msg.name, "");
        assert_eq!(msg.text, None);
        assert_eq!(msg.photo_url, None);
    }

    #[test]
    fn serializes_without_absent_fields() {
        let msg = FriendlyMessage::text("hello", "Alice", None);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["text"], "hello");
        assert_eq!(json["name"], "Alice");
        assert!(json.get("photoUrl").is_none());
        assert!(json.get("uid").is_none());
    }

    #[test]
    fn photo_url_uses_camel_case_key() {
        let msg = FriendlyMessage::photo("http://x/y.jpg", "Bob", Some("u1".into()));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["photoUrl"], "http://x/y.jpg");
        assert_eq!(json["uid"], "u1");
        assert!(json.get("text").is_none());
    }
}
