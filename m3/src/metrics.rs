//! Metrics collection module for the matcher
//!
//! This module provides Prometheus counters for the polling loop and the
//! HTTP endpoint exposing them.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response};
use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    /// Global Prometheus registry instance
    pub static ref REGISTRY_INSTANCE: Registry = Registry::new();

    /// Matching passes started
    pub static ref PASS_COUNTER: IntCounter =
        IntCounter::new("m3_pass_total", "matching passes started").unwrap();

    /// Passes that could not read the order book
    pub static ref PASS_FAILED_COUNTER: IntCounter =
        IntCounter::new("m3_pass_failed_total", "matching passes without a snapshot").unwrap();

    /// Match executions by outcome
    pub static ref MATCH_COUNTER_VEC: IntCounterVec = IntCounterVec::new(
        Opts::new("m3_match_total", "match executions"),
        &["outcome"]
    )
    .unwrap();

    /// Duration of a full pass
    pub static ref PASS_HISTOGRAM: Histogram =
        Histogram::with_opts(HistogramOpts::new("m3_pass_seconds", "matching pass duration"))
            .unwrap();
}

/// Registers all metric collectors with the global registry. Safe to call
/// more than once.
pub fn init_registry() {
    let _ = REGISTRY_INSTANCE.register(Box::new(PASS_COUNTER.clone()));
    let _ = REGISTRY_INSTANCE.register(Box::new(PASS_FAILED_COUNTER.clone()));
    let _ = REGISTRY_INSTANCE.register(Box::new(MATCH_COUNTER_VEC.clone()));
    let _ = REGISTRY_INSTANCE.register(Box::new(PASS_HISTOGRAM.clone()));
}

/// Times one pass and counts it.
pub async fn record_pass<F, Fut, T>(handler: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let start = Instant::now();
    PASS_COUNTER.inc();
    let result = handler().await;
    PASS_HISTOGRAM.observe(start.elapsed().as_secs_f64());
    result
}

pub fn record_match(executed: bool) {
    let outcome = if executed { "executed" } else { "failed" };
    MATCH_COUNTER_VEC.with_label_values(&[outcome]).inc();
}

/// Text exposition of everything registered.
pub fn gather() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY_INSTANCE.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        log::error!("failed to encode metrics: {}", e);
    }
    buffer
}

/// Binds the metrics endpoint and returns the bound address and the server
/// future, which runs until `shutdown` resolves.
pub fn serve(
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, impl Future<Output = Result<(), hyper::Error>>), hyper::Error> {
    init_registry();
    let make_svc = make_service_fn(|_| async {
        Ok::<_, Infallible>(service_fn(|_: Request<Body>| async {
            Ok::<_, Infallible>(Response::new(Body::from(gather())))
        }))
    });
    let server = hyper::Server::try_bind(&addr)?.serve(make_svc);
    let local_addr = server.local_addr();
    Ok((local_addr, server.with_graceful_shutdown(shutdown)))
}
