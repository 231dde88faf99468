//! The watch state machine: poll, evaluate, detect pass-transitions.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use colored::Colorize;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::{WatchDefaults, WatchDefinition};
use crate::document::{DocumentLoader, WebDocument};
use crate::error::{Result, StakeoutError};
use crate::inspect::WebDocumentInspector;
use crate::watch::sentinel::{self, PassNotice, SentinelSlot};

/// One configured watch: a loader/inspector pair on a timer.
///
/// A watch is passive until [`Watch::start`] moves it onto its own task.
/// Checks on one watch never overlap: the task awaits each check to
/// completion and skipped ticks are dropped rather than replayed.
pub struct Watch {
    name: String,
    description: Option<String>,
    url: String,
    interval: Duration,
    stop_on_pass: bool,
    status_codes: Vec<u16>,
    loader: DocumentLoader,
    inspector: WebDocumentInspector,
    last_result: bool,
    last_passed: Option<chrono::DateTime<Utc>>,
    slot: SentinelSlot,
}

impl Watch {
    /// Build a watch from its definition. The first sentinel is armed here,
    /// so a pass on the very first check cannot be missed.
    pub fn from_definition(def: &WatchDefinition, defaults: &WatchDefaults) -> Result<Self> {
        def.validate()?;
        let interval = def.interval.map(Duration::from_secs).unwrap_or(defaults.interval);
        Ok(Self {
            name: def.name.clone(),
            description: def.description.clone(),
            url: def.url.clone(),
            interval,
            stop_on_pass: def.stop_on_pass,
            status_codes: def.status_codes.clone(),
            loader: DocumentLoader::new(&def.url, &def.headers)?,
            inspector: WebDocumentInspector::from_definitions(&def.all, &def.any)?,
            last_result: false,
            last_passed: None,
            slot: sentinel::slot(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn the polling task: an immediate check, then one per interval.
    pub fn start(self) -> WatchHandle {
        debug!("starting watch {} @ {:?}", self.name, self.interval);
        let name = self.name.clone();
        let slot = Arc::clone(&self.slot);
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let task = tokio::spawn(self.run(stop_rx));
        WatchHandle {
            name,
            slot,
            stop_tx,
            task,
        }
    }

    async fn run(mut self, mut stop_rx: mpsc::Receiver<()>) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.check().await {
                        Ok(result) => {
                            if self.observe(result).await {
                                debug!("{}: halting after pass (passed at {:?})", self.name, self.last_passed);
                                break;
                            }
                        }
                        Err(error) => {
                            warn!("{}: check failed: {error}", self.name);
                            self.reject(error).await;
                        }
                    }
                }
                _ = stop_rx.recv() => {
                    debug!("{}: stop requested (last passed {:?})", self.name, self.last_passed);
                    break;
                }
            }
        }
        self.slot.lock().await.close();
    }

    async fn check(&mut self) -> Result<bool> {
        info!("checking {} {}", self.name, self.url);
        let (status_code, body) = self.loader.load().await?;
        let result = self.evaluate(status_code, body)?;
        info!("{} {}", self.name, if result { "passed".green() } else { "failed".red() });
        Ok(result)
    }

    /// Reduce one fetched response to a verdict. A status code outside the
    /// accepted set counts as a plain fail and the inspectors never see the
    /// document, so error pages cannot pollute change history.
    fn evaluate(&mut self, status_code: u16, body: String) -> Result<bool> {
        if !self.status_codes.contains(&status_code) {
            debug!("{}: status {status_code} not accepted, counting as failed", self.name);
            return Ok(false);
        }
        let document = WebDocument::parse(body);
        self.inspector.inspect(&document)
    }

    /// Record a verdict and complete the sentinel on a fail-to-pass
    /// transition. Returns true when the watch should halt (`stopOnPass`).
    ///
    /// A transition observed while the consumer is off handling the last
    /// pass is held in the unclaimed sentinel, so it cannot slip by during
    /// that window.
    async fn observe(&mut self, result: bool) -> bool {
        let transitioned = result && !self.last_result;
        self.last_result = result;
        if !transitioned {
            return false;
        }

        let passed_at = Utc::now();
        self.last_passed = Some(passed_at);
        let notice = PassNotice {
            name: self.name.clone(),
            description: self.description.clone(),
            url: self.url.clone(),
            passed_at,
        };

        if self.stop_on_pass {
            self.slot.lock().await.finish(Ok(notice));
            return true;
        }
        self.slot.lock().await.complete(Ok(notice));
        false
    }

    /// Reject the pending sentinel with a fetch error; the consumer can keep
    /// awaiting passes across failed ticks.
    async fn reject(&mut self, error: StakeoutError) {
        self.slot.lock().await.complete(Err(error));
    }
}

/// The consumer's side of a started watch.
pub struct WatchHandle {
    name: String,
    slot: SentinelSlot,
    stop_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Await the next pass-transition.
    ///
    /// Resolves with the pass notice, or with the fetch error that failed
    /// the tick; either way the watch keeps ticking and this can be awaited
    /// again. A pass observed between two calls is held and returned by the
    /// next one. Once the watch has stopped it returns
    /// [`StakeoutError::WatchStopped`].
    pub async fn next_pass(&self) -> Result<PassNotice> {
        let claimed = self.slot.lock().await.claim();
        match claimed {
            Some(sentinel) => sentinel.wait().await,
            None => Err(StakeoutError::WatchStopped),
        }
    }

    /// A cloneable stop control usable without the handle.
    pub fn stopper(&self) -> WatchStopper {
        WatchStopper {
            name: self.name.clone(),
            tx: self.stop_tx.clone(),
        }
    }

    /// Request a stop. Idempotent; an in-flight check still completes.
    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Stops one watch from a shutdown path that does not own its handle.
#[derive(Clone)]
pub struct WatchStopper {
    name: String,
    tx: mpsc::Sender<()>,
}

impl WatchStopper {
    pub fn stop(&self) {
        debug!("stopping {}", self.name);
        let _ = self.tx.try_send(());
    }
}
