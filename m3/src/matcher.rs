//! Polling matcher
//!
//! The matcher owns one background task that periodically reads the market,
//! evaluates crossing orders and submits every match it finds.
//!
//! Scheduling is fixed-delay: the task waits `interval`, runs a pass, then
//! waits `interval` again counted from the end of that pass. A slow pass
//! delays the next one instead of causing back-to-back passes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::book::find_all_matches;
use crate::logger::Logger;
use crate::market::Market;
use crate::metrics;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(14);

/// Handle to a running polling loop.
///
/// The loop starts in `new` and ends with `stop`, which lets a pass in
/// progress finish first. A stopped matcher cannot be restarted.
pub struct Matcher {
    logger: Arc<dyn Logger>,
    stop_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Matcher {
    /// Spawns the polling loop on the current tokio runtime. A zero
    /// interval falls back to `DEFAULT_INTERVAL`.
    pub fn new(logger: Arc<dyn Logger>, market: Arc<dyn Market>, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            logger.warning(format_args!(
                "polling interval must be positive, using {:?}",
                DEFAULT_INTERVAL
            ));
            DEFAULT_INTERVAL
        } else {
            interval
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = Worker {
            logger: logger.clone(),
            market,
            interval,
        };
        let task = tokio::spawn(worker.run(stop_rx));

        Matcher {
            logger,
            stop_tx,
            task: Mutex::new(Some(task)),
        }
    }

    /// Stops the loop and waits until it has exited. Later and concurrent
    /// calls return once the loop is gone.
    pub async fn stop(&self) {
        let mut task = self.task.lock().await;
        let Some(handle) = task.take() else {
            return;
        };
        let _ = self.stop_tx.send(true);
        if let Err(e) = handle.await {
            self.logger
                .critical(format_args!("matcher task ended abnormally: {}", e));
        }
    }
}

struct Worker {
    logger: Arc<dyn Logger>,
    market: Arc<dyn Market>,
    interval: Duration,
}

impl Worker {
    async fn run(self, mut stop: watch::Receiver<bool>) {
        self.logger.info(format_args!(
            "matcher started, polling every {:?}",
            self.interval
        ));

        loop {
            tokio::select! {
                biased;
                // also fires when the handle is dropped
                _ = stop.changed() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
            metrics::record_pass(|| self.pass()).await;
        }

        self.logger.info(format_args!("matcher stopped"));
    }

    /// One pass: snapshot, evaluate, execute. Failures are logged and end
    /// the pass, never the loop.
    async fn pass(&self) {
        let orders = match self.market.orders().await {
            Ok(orders) => orders,
            Err(e) => {
                metrics::PASS_FAILED_COUNTER.inc();
                self.logger
                    .error(format_args!("could not read the order book: {}", e));
                return;
            }
        };

        let total = orders.len();
        let matches = find_all_matches(orders);
        if matches.is_empty() {
            self.logger
                .debug(format_args!("no matches among {} orders", total));
            return;
        }
        self.logger.info(format_args!(
            "found {} matches among {} orders",
            matches.len(),
            total
        ));

        let mut executed = 0;
        for candidate in &matches {
            match self.market.execute(candidate).await {
                Ok(()) => {
                    executed += 1;
                    metrics::record_match(true);
                    self.logger
                        .info(format_args!("match {} executed: {}", candidate.id, candidate));
                }
                Err(e) => {
                    metrics::record_match(false);
                    self.logger.error(format_args!(
                        "match {} failed: {} ({})",
                        candidate.id, candidate, e
                    ));
                }
            }
        }

        if executed < matches.len() {
            self.logger.warning(format_args!(
                "executed {} of {} matches",
                executed,
                matches.len()
            ));
        }
    }
}
