//! Process supervision
//!
//! Wires the market adaptor, the matcher and the metrics endpoint together
//! and tears them down in order: matcher first, then the market connection.

use std::io;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::logger::Logger;
use crate::market::{AtomicMarket, Market};
use crate::matcher::Matcher;
use crate::metrics;

/// Termination signals, installed before startup so none is missed.
pub struct Signals {
    hangup: Signal,
    interrupt: Signal,
    terminate: Signal,
    quit: Signal,
}

impl Signals {
    pub fn install() -> io::Result<Self> {
        Ok(Signals {
            hangup: signal(SignalKind::hangup())?,
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    /// Waits for SIGHUP, SIGINT, SIGTERM or SIGQUIT and returns its name.
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.hangup.recv() => "SIGHUP",
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.quit.recv() => "SIGQUIT",
        }
    }
}

struct MetricsServer {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct Daemon {
    logger: Arc<dyn Logger>,
    market: Arc<dyn Market>,
    matcher: Matcher,
    metrics: Option<MetricsServer>,
}

impl Daemon {
    /// Connects to the node and starts matching.
    pub async fn start(config: &Config, logger: Arc<dyn Logger>) -> anyhow::Result<Self> {
        let ipc = config.ipc_path()?;
        let market = AtomicMarket::connect(
            &ipc,
            &config.maker,
            &config.proxy,
            config.call_timeout(),
            logger.clone(),
        )
        .await
        .with_context(|| {
            format!(
                "could not initialize the blockchain wrapper on {}",
                ipc.display()
            )
        })?;
        Daemon::launch(config, logger, Arc::new(market))
    }

    /// Starts the metrics endpoint, if configured, and the matcher on an
    /// already connected market.
    pub fn launch(
        config: &Config,
        logger: Arc<dyn Logger>,
        market: Arc<dyn Market>,
    ) -> anyhow::Result<Self> {
        let metrics = match config.metrics_addr {
            Some(addr) => {
                let (shutdown, rx) = oneshot::channel::<()>();
                let (local_addr, server) = metrics::serve(addr, async move {
                    let _ = rx.await;
                })
                .with_context(|| format!("could not bind metrics endpoint on {}", addr))?;
                let server_logger = logger.clone();
                let task = tokio::spawn(async move {
                    if let Err(e) = server.await {
                        server_logger.error(format_args!("metrics server failed: {}", e));
                    }
                });
                logger.info(format_args!("metrics server started on {}", local_addr));
                Some(MetricsServer { shutdown, task })
            }
            None => None,
        };

        let matcher = Matcher::new(logger.clone(), market.clone(), config.interval());
        Ok(Daemon {
            logger,
            market,
            matcher,
            metrics,
        })
    }

    /// Stops the matcher, then closes the market. Never fails; problems are
    /// logged.
    pub async fn stop(self) {
        self.matcher.stop().await;

        if let Err(e) = self.market.close().await {
            self.logger
                .error(format_args!("could not close the market connection: {}", e));
        }

        if let Some(server) = self.metrics {
            let _ = server.shutdown.send(());
            if let Err(e) = server.task.await {
                self.logger
                    .error(format_args!("metrics server task failed: {}", e));
            }
        }
    }
}
