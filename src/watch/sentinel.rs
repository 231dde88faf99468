//! The single-use pass signal a watch exposes to its consumer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use tokio::sync::{Mutex, oneshot};

use crate::error::{Result, StakeoutError};
use crate::notify::NotificationMessage;

/// What a resolved sentinel carries: which watch passed, when, and what a
/// notification about it should say.
#[derive(Debug, Clone, PartialEq)]
pub struct PassNotice {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub passed_at: DateTime<Utc>,
}

impl PassNotice {
    pub fn to_message(&self) -> NotificationMessage {
        let body = self
            .description
            .clone()
            .unwrap_or_else(|| format!("{} has passed!", self.name));
        NotificationMessage::new(&self.name, body).with_url(&self.url)
    }
}

pub(crate) type SentinelPayload = Result<PassNotice>;

/// Where the watch task and its consumer meet.
pub(crate) type SentinelSlot = Arc<Mutex<SentinelCell>>;

/// A slot holding one armed [`SentinelCell`].
pub(crate) fn slot() -> SentinelSlot {
    Arc::new(Mutex::new(SentinelCell::armed()))
}

/// Pairs the pending sentinel with the resolver that will complete it, and
/// re-arms the pair across completions.
///
/// A completion that lands while the sentinel is unclaimed buffers inside
/// it, and the successor is armed by the claim rather than the completion.
/// A pass observed while the consumer is busy is therefore held for its
/// next claim, never dropped into a replaced channel. Exactly one
/// completion is held at a time.
pub(crate) struct SentinelCell {
    sentinel: Option<Sentinel>,
    resolver: Option<SentinelResolver>,
    closed: bool,
}

impl SentinelCell {
    fn armed() -> Self {
        let (resolver, sentinel) = arm();
        Self {
            sentinel: Some(sentinel),
            resolver: Some(resolver),
            closed: false,
        }
    }

    fn arm_next(&mut self) {
        let (resolver, sentinel) = arm();
        self.sentinel = Some(sentinel);
        self.resolver = Some(resolver);
    }

    /// Complete the pending sentinel with `payload`.
    ///
    /// When the sentinel was already claimed the successor is armed here;
    /// when it is still unclaimed the payload is held inside it and arming
    /// is left to [`claim`](Self::claim). A second completion arriving
    /// before that claim has nowhere to go and is dropped.
    pub(crate) fn complete(&mut self, payload: SentinelPayload) {
        let Some(resolver) = self.resolver.take() else {
            debug!("completion dropped: the held one has not been claimed yet");
            return;
        };
        resolver.resolve(payload);
        if self.sentinel.is_none() && !self.closed {
            self.arm_next();
        }
    }

    /// Deliver a final payload and close: it still reaches (or awaits) its
    /// consumer, but no successor is armed.
    pub(crate) fn finish(&mut self, payload: SentinelPayload) {
        if let Some(resolver) = self.resolver.take() {
            resolver.resolve(payload);
        }
        self.closed = true;
    }

    /// Close without a payload; a pending waiter reads this as the watch
    /// having stopped. Idempotent.
    pub(crate) fn close(&mut self) {
        self.resolver = None;
        self.closed = true;
    }

    /// Take the pending sentinel, arming its successor when the taken one
    /// already holds its completion. `None` once the cell is spent.
    pub(crate) fn claim(&mut self) -> Option<Sentinel> {
        let claimed = self.sentinel.take()?;
        if self.resolver.is_none() && !self.closed {
            self.arm_next();
        }
        Some(claimed)
    }
}

fn arm() -> (SentinelResolver, Sentinel) {
    let (tx, rx) = oneshot::channel();
    (SentinelResolver { tx }, Sentinel { rx })
}

/// The watch-side half. Consumed by resolution; dropping it unresolved tells
/// the waiting consumer the watch has stopped.
struct SentinelResolver {
    tx: oneshot::Sender<SentinelPayload>,
}

impl SentinelResolver {
    fn resolve(self, payload: SentinelPayload) {
        // The consumer may have gone away; resolution is then a no-op.
        let _ = self.tx.send(payload);
    }
}

/// The consumer-side half: awaits exactly one pass or rejection.
pub(crate) struct Sentinel {
    rx: oneshot::Receiver<SentinelPayload>,
}

impl Sentinel {
    pub(crate) async fn wait(self) -> Result<PassNotice> {
        match self.rx.await {
            Ok(payload) => payload,
            Err(_) => Err(StakeoutError::WatchStopped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(name: &str) -> PassNotice {
        PassNotice {
            name: name.to_string(),
            description: None,
            url: format!("https://example.com/{name}"),
            passed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_resolution_reaches_the_waiter() {
        let (resolver, sentinel) = arm();
        resolver.resolve(Ok(notice("w")));
        assert_eq!(sentinel.wait().await.unwrap().name, "w");
    }

    #[tokio::test]
    async fn test_rejection_reaches_the_waiter() {
        let (resolver, sentinel) = arm();
        resolver.resolve(Err(StakeoutError::Delivery("boom".to_string())));
        assert!(sentinel.wait().await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_resolver_reads_as_stopped() {
        let (resolver, sentinel) = arm();
        drop(resolver);
        assert!(matches!(sentinel.wait().await, Err(StakeoutError::WatchStopped)));
    }

    #[tokio::test]
    async fn test_resolving_without_a_waiter_is_a_no_op() {
        let (resolver, sentinel) = arm();
        drop(sentinel);
        resolver.resolve(Ok(notice("w")));
    }

    #[tokio::test]
    async fn test_completion_while_unclaimed_is_held_for_the_claim() {
        let slot = slot();
        slot.lock().await.complete(Ok(notice("held")));
        let sentinel = slot.lock().await.claim().unwrap();
        assert_eq!(sentinel.wait().await.unwrap().name, "held");
    }

    #[tokio::test]
    async fn test_claiming_a_held_completion_arms_the_successor() {
        let slot = slot();
        slot.lock().await.complete(Ok(notice("first")));
        let first = slot.lock().await.claim().unwrap();
        assert_eq!(first.wait().await.unwrap().name, "first");

        let second = slot.lock().await.claim().unwrap();
        slot.lock().await.complete(Ok(notice("second")));
        assert_eq!(second.wait().await.unwrap().name, "second");
    }

    #[tokio::test]
    async fn test_second_completion_before_the_claim_is_dropped() {
        let slot = slot();
        slot.lock().await.complete(Ok(notice("kept")));
        slot.lock().await.complete(Ok(notice("surplus")));
        let sentinel = slot.lock().await.claim().unwrap();
        assert_eq!(sentinel.wait().await.unwrap().name, "kept");
    }

    #[tokio::test]
    async fn test_close_unblocks_a_pending_waiter() {
        let slot = slot();
        let sentinel = slot.lock().await.claim().unwrap();
        slot.lock().await.close();
        assert!(matches!(sentinel.wait().await, Err(StakeoutError::WatchStopped)));
        assert!(slot.lock().await.claim().is_none());
    }

    #[tokio::test]
    async fn test_finish_delivers_its_payload_and_spends_the_cell() {
        let slot = slot();
        slot.lock().await.finish(Ok(notice("last")));
        let sentinel = slot.lock().await.claim().unwrap();
        assert_eq!(sentinel.wait().await.unwrap().name, "last");
        assert!(slot.lock().await.claim().is_none());
    }

    #[test]
    fn test_notice_message_prefers_the_description() {
        let mut n = notice("restock");
        n.description = Some("The thing is back".to_string());
        let message = n.to_message();
        assert_eq!(message.title, "restock");
        assert_eq!(message.body, "The thing is back");
        assert_eq!(message.url.as_deref(), Some("https://example.com/restock"));
    }

    #[test]
    fn test_notice_message_falls_back_to_a_stock_body() {
        assert_eq!(notice("restock").to_message().body, "restock has passed!");
    }
}
