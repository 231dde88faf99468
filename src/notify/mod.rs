//! Notification delivery.
//!
//! - `message`: the notification value type
//! - `desktop`: local delivery via the session notification service
//! - `http_post`: encrypted delivery to a remote receiver
//! - `retry`: due-time retry queue layered over either strategy

mod desktop;
mod http_post;
mod message;
mod retry;

pub use desktop::{DeliveryResponse, DesktopGateway, DesktopNotifier};
pub use http_post::HttpPostNotifier;
pub use message::NotificationMessage;
pub use retry::RetryingNotifier;

use async_trait::async_trait;

use crate::error::Result;

/// One delivery strategy. Implementations report failure so callers (and the
/// retry queue) can tell a delivered notification from a lost one.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &NotificationMessage) -> Result<()>;
}
