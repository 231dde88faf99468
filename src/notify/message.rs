//! The notification value type carried through every delivery path.

use serde::{Deserialize, Serialize};

/// One notification: a title, a body, and an optional URL to open when the
/// user activates the alert.
///
/// `url` is omitted from the wire form when absent. Deserialization rejects
/// unknown fields; the message receiver relies on this for shape validation
/// of decrypted payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationMessage {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl NotificationMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}
