//! A due-time retry queue layered over one delivery strategy.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::error::Result;
use crate::notify::{NotificationMessage, Notifier};

/// One queued redelivery attempt.
struct RetryItem {
    due_at: Instant,
    attempts: u32,
    message: NotificationMessage,
}

/// Wraps a [`Notifier`] with timed redelivery.
///
/// The first attempt runs inline and its failure always propagates to the
/// caller. Failed messages then move to a FIFO queue ordered by due time,
/// worked by a single timer: each firing retries the head, re-enqueues it at
/// `now + interval` while it has retries left, and finally drops it with a
/// warning once `max_count` retries have failed.
pub struct RetryingNotifier {
    inner: Arc<dyn Notifier>,
    retry_tx: Option<mpsc::Sender<NotificationMessage>>,
    worker: Option<JoinHandle<()>>,
}

impl RetryingNotifier {
    /// No retry policy: failures only propagate.
    pub fn new(inner: Arc<dyn Notifier>) -> Self {
        Self {
            inner,
            retry_tx: None,
            worker: None,
        }
    }

    /// Retry failed deliveries every `interval`, at most `max_count` times
    /// per message.
    pub fn with_retries(inner: Arc<dyn Notifier>, interval: Duration, max_count: u32) -> Self {
        let (retry_tx, retry_rx) = mpsc::channel(64);
        let worker = tokio::spawn(run_queue(Arc::clone(&inner), retry_rx, interval, max_count));
        Self {
            inner,
            retry_tx: Some(retry_tx),
            worker: Some(worker),
        }
    }

    /// Deliver now; on failure, hand the message to the retry queue (when
    /// one is configured) and propagate the error either way.
    pub async fn notify_with_retry(&self, message: &NotificationMessage) -> Result<()> {
        match self.inner.notify(message).await {
            Ok(()) => Ok(()),
            Err(error) => {
                if let Some(tx) = &self.retry_tx {
                    debug!("queueing '{}' for retry", message.title);
                    if tx.send(message.clone()).await.is_err() {
                        warn!("retry queue is gone; '{}' will not be retried", message.title);
                    }
                }
                Err(error)
            }
        }
    }

    /// Stop accepting new retries and wait for the queue to empty.
    pub async fn drain(mut self) {
        self.retry_tx = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }
}

async fn run_queue(
    notifier: Arc<dyn Notifier>,
    mut retry_rx: mpsc::Receiver<NotificationMessage>,
    interval: Duration,
    max_count: u32,
) {
    let mut queue: VecDeque<RetryItem> = VecDeque::new();
    let mut open = true;
    loop {
        if !open && queue.is_empty() {
            break;
        }
        let next_due = queue.front().map(|item| item.due_at);
        tokio::select! {
            received = retry_rx.recv(), if open => match received {
                Some(message) => {
                    queue.push_back(RetryItem {
                        due_at: Instant::now() + interval,
                        attempts: 0,
                        message,
                    });
                }
                None => open = false,
            },
            _ = time::sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                let Some(mut item) = queue.pop_front() else { continue };
                match notifier.notify(&item.message).await {
                    Ok(()) => info!("delivered '{}' on retry {}", item.message.title, item.attempts + 1),
                    Err(error) => {
                        item.attempts += 1;
                        if item.attempts < max_count {
                            debug!("retry {} of '{}' failed: {error}", item.attempts, item.message.title);
                            item.due_at = Instant::now() + interval;
                            queue.push_back(item);
                        } else {
                            warn!(
                                "dropping '{}' after {} failed retries: {error}",
                                item.message.title, item.attempts
                            );
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::StakeoutError;

    /// Records (title, offset-from-start) per attempt; fails every attempt
    /// before the `succeed_from`-th one.
    struct RecordingNotifier {
        start: Instant,
        succeed_from: Option<u32>,
        attempts: Mutex<Vec<(String, Duration)>>,
    }

    impl RecordingNotifier {
        fn new(succeed_from: Option<u32>) -> Arc<Self> {
            Arc::new(Self {
                start: Instant::now(),
                succeed_from,
                attempts: Mutex::new(Vec::new()),
            })
        }

        fn offsets(&self) -> Vec<u64> {
            self.attempts.lock().unwrap().iter().map(|(_, d)| d.as_secs()).collect()
        }

        fn titles(&self) -> Vec<String> {
            self.attempts.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, message: &NotificationMessage) -> Result<()> {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push((message.title.clone(), self.start.elapsed()));
            let attempt = attempts.len() as u32;
            match self.succeed_from {
                Some(n) if attempt >= n => Ok(()),
                _ => Err(StakeoutError::Delivery("refused".to_string())),
            }
        }
    }

    fn message(title: &str) -> NotificationMessage {
        NotificationMessage::new(title, "body")
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_delivery_retries_exactly_max_count_times() {
        let inner = RecordingNotifier::new(None);
        let notifier = RetryingNotifier::with_retries(inner.clone(), Duration::from_secs(5), 3);

        assert!(notifier.notify_with_retry(&message("m")).await.is_err());
        time::sleep(Duration::from_secs(60)).await;

        // The inline attempt, then retries at T+5, T+10, T+15, then dropped.
        assert_eq!(inner.offsets(), vec![0, 5, 10, 15]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_a_retry_stops_the_retries() {
        let inner = RecordingNotifier::new(Some(3));
        let notifier = RetryingNotifier::with_retries(inner.clone(), Duration::from_secs(5), 3);

        assert!(notifier.notify_with_retry(&message("m")).await.is_err());
        time::sleep(Duration::from_secs(60)).await;

        assert_eq!(inner.offsets(), vec![0, 5, 10]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_a_policy_failures_only_propagate() {
        let inner = RecordingNotifier::new(None);
        let notifier = RetryingNotifier::new(inner.clone());

        assert!(notifier.notify_with_retry(&message("m")).await.is_err());
        time::sleep(Duration::from_secs(60)).await;

        assert_eq!(inner.offsets(), vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_delivery_never_reaches_the_queue() {
        let inner = RecordingNotifier::new(Some(1));
        let notifier = RetryingNotifier::with_retries(inner.clone(), Duration::from_secs(5), 3);

        assert!(notifier.notify_with_retry(&message("m")).await.is_ok());
        time::sleep(Duration::from_secs(60)).await;

        assert_eq!(inner.offsets(), vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_messages_are_retried_in_due_order() {
        let inner = RecordingNotifier::new(None);
        let notifier = RetryingNotifier::with_retries(inner.clone(), Duration::from_secs(5), 1);

        assert!(notifier.notify_with_retry(&message("first")).await.is_err());
        time::sleep(Duration::from_secs(2)).await;
        assert!(notifier.notify_with_retry(&message("second")).await.is_err());
        time::sleep(Duration::from_secs(60)).await;

        assert_eq!(inner.titles(), vec!["first", "second", "first", "second"]);
        assert_eq!(inner.offsets(), vec![0, 2, 5, 7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_completes_the_pending_retries() {
        let inner = RecordingNotifier::new(None);
        let notifier = RetryingNotifier::with_retries(inner.clone(), Duration::from_secs(5), 2);

        assert!(notifier.notify_with_retry(&message("m")).await.is_err());
        notifier.drain().await;

        assert_eq!(inner.offsets(), vec![0, 5, 10]);
    }
}
