use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use m3::config::{Args, Config};
use m3::daemon::{Daemon, Signals};
use m3::logger::{Level, Logger, StdLogger};

async fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::load(&args)?;
    let level: Level = config
        .level
        .parse()
        .context("failed to initialize logger")?;
    let log: Arc<dyn Logger> = Arc::new(StdLogger::init(level));

    let mut signals = Signals::install().context("failed to install signal handlers")?;

    log.info(format_args!("starting m3 daemon..."));
    let daemon = match Daemon::start(&config, log.clone()).await {
        Ok(daemon) => daemon,
        Err(e) => {
            log.critical(format_args!("{:#}", e));
            return Err(e);
        }
    };
    log.info(format_args!("m3 daemon startup complete"));

    let signal = signals.recv().await;
    log.info(format_args!("received {}, shutting down m3 daemon...", signal));

    daemon.stop().await;
    log.info(format_args!("m3 daemon shutdown complete"));
    Ok(())
}

#[tokio::main]
async fn main() {
    eprintln!("M3 DAEMON V{}", env!("CARGO_PKG_VERSION"));
    let args = Args::parse();

    let code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("M3 STARTUP FAILED ({:#})", e);
            1
        }
    };
    std::process::exit(code);
}
