//! Desktop delivery via the session notification service.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::error::{Result, StakeoutError};
use crate::notify::{NotificationMessage, Notifier};
use crate::util::open_url;

/// How the desktop session answered a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryResponse {
    /// The user activated the open action.
    Activated,
    /// Closed without activating.
    Dismissed,
    /// Expired unseen.
    TimedOut,
    /// Shown fire-and-forget; this platform does not report interaction.
    Shown,
}

/// The blocking seam in front of the OS notification facility.
pub trait DesktopGateway: Send + Sync {
    fn deliver(&self, message: &NotificationMessage) -> Result<DeliveryResponse>;
}

/// Shows notifications on the local desktop.
///
/// An expired notification counts as a delivery failure, so a retry policy
/// keeps re-raising it until somebody reacts. Activation with a `url`
/// attached opens that URL in the default browser, fire-and-forget.
pub struct DesktopNotifier {
    gateway: Arc<dyn DesktopGateway>,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self {
            gateway: Arc::new(NotifyRustGateway),
        }
    }

    pub fn with_gateway(gateway: Arc<dyn DesktopGateway>) -> Self {
        Self { gateway }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, message: &NotificationMessage) -> Result<()> {
        let gateway = Arc::clone(&self.gateway);
        let delivered = message.clone();
        let response = tokio::task::spawn_blocking(move || gateway.deliver(&delivered))
            .await
            .map_err(|e| StakeoutError::Delivery(format!("desktop delivery task failed: {e}")))??;
        debug!("desktop response for '{}': {response:?}", message.title);

        match response {
            DeliveryResponse::TimedOut => Err(StakeoutError::Delivery(format!(
                "notification '{}' expired unseen",
                message.title
            ))),
            DeliveryResponse::Activated => {
                if let Some(url) = &message.url {
                    open_url(url);
                }
                Ok(())
            }
            DeliveryResponse::Dismissed | DeliveryResponse::Shown => Ok(()),
        }
    }
}

/// The real gateway, backed by `notify-rust`.
struct NotifyRustGateway;

// XDG notifications report actions, so delivery can observe the outcome.
#[cfg(all(unix, not(target_os = "macos")))]
impl DesktopGateway for NotifyRustGateway {
    fn deliver(&self, message: &NotificationMessage) -> Result<DeliveryResponse> {
        use notify_rust::Notification;

        let mut notification = Notification::new();
        notification.summary(&message.title).body(&message.body);
        if let Ok(icon) = std::env::var("STAKEOUT_NOTIFICATION_ICON") {
            notification.icon(&icon);
        }
        if message.url.is_some() {
            notification.action("default", "Open");
        }
        let handle = notification
            .show()
            .map_err(|e| StakeoutError::Delivery(format!("could not show notification: {e}")))?;

        let mut response = DeliveryResponse::Dismissed;
        handle.wait_for_action(|action| {
            response = match action {
                "default" => DeliveryResponse::Activated,
                "__closed" => DeliveryResponse::TimedOut,
                _ => DeliveryResponse::Dismissed,
            };
        });
        Ok(response)
    }
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
impl DesktopGateway for NotifyRustGateway {
    fn deliver(&self, message: &NotificationMessage) -> Result<DeliveryResponse> {
        use notify_rust::Notification;

        Notification::new()
            .summary(&message.title)
            .body(&message.body)
            .show()
            .map_err(|e| StakeoutError::Delivery(format!("could not show notification: {e}")))?;
        Ok(DeliveryResponse::Shown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeGateway {
        response: DeliveryResponse,
        fail: bool,
        delivered: Mutex<Vec<String>>,
    }

    impl FakeGateway {
        fn answering(response: DeliveryResponse) -> Arc<Self> {
            Arc::new(Self {
                response,
                fail: false,
                delivered: Mutex::new(Vec::new()),
            })
        }
    }

    impl DesktopGateway for FakeGateway {
        fn deliver(&self, message: &NotificationMessage) -> Result<DeliveryResponse> {
            if self.fail {
                return Err(StakeoutError::Delivery("gateway down".to_string()));
            }
            self.delivered.lock().unwrap().push(message.title.clone());
            Ok(self.response)
        }
    }

    #[tokio::test]
    async fn test_expiry_is_a_delivery_failure() {
        let gateway = FakeGateway::answering(DeliveryResponse::TimedOut);
        let notifier = DesktopNotifier::with_gateway(gateway.clone());
        assert!(notifier.notify(&NotificationMessage::new("t", "b")).await.is_err());
        assert_eq!(gateway.delivered.lock().unwrap().as_slice(), ["t"]);
    }

    #[tokio::test]
    async fn test_everything_but_expiry_counts_as_delivered() {
        for response in [
            DeliveryResponse::Activated,
            DeliveryResponse::Dismissed,
            DeliveryResponse::Shown,
        ] {
            let gateway = FakeGateway::answering(response);
            let notifier = DesktopNotifier::with_gateway(gateway.clone());
            assert!(
                notifier.notify(&NotificationMessage::new("t", "b")).await.is_ok(),
                "{response:?} should be a successful delivery"
            );
        }
    }

    #[tokio::test]
    async fn test_gateway_error_propagates() {
        let gateway = Arc::new(FakeGateway {
            response: DeliveryResponse::Shown,
            fail: true,
            delivered: Mutex::new(Vec::new()),
        });
        let notifier = DesktopNotifier::with_gateway(gateway);
        assert!(notifier.notify(&NotificationMessage::new("t", "b")).await.is_err());
    }
}
