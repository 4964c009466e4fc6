use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::env;
use tracing::{error, info};

lazy_static::lazy_static! {
    pub static ref METRIC_NAMESPACE: String =
        env::var("METRIC_NAMESPACE").unwrap_or_else(|_| "chat_loadtest".to_string());

    // === Tracked request metrics ===

    pub static ref REQUESTS_TOTAL: IntCounterVec =
        IntCounterVec::new(
            Opts::new("requests_total", "Tracked requests by request name and outcome")
                .namespace(METRIC_NAMESPACE.as_str()),
            &["request", "outcome"]  // outcome: success, failure
        ).unwrap();

    pub static ref REQUEST_DURATION_SECONDS: HistogramVec =
        HistogramVec::new(
            HistogramOpts::new(
                "request_duration_seconds",
                "Tracked request latencies in seconds"
            )
            .namespace(METRIC_NAMESPACE.as_str())
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
            &["request"]
        ).unwrap();

    pub static ref REQUEST_FAILURES_TOTAL: IntCounterVec =
        IntCounterVec::new(
            Opts::new("request_failures_total", "Failed tracked requests by error category")
                .namespace(METRIC_NAMESPACE.as_str()),
            &["request", "category"]
        ).unwrap();

    pub static ref REQUESTS_IN_FLIGHT: Gauge =
        Gauge::with_opts(
            Opts::new("requests_in_flight", "Requests currently awaiting a response")
                .namespace(METRIC_NAMESPACE.as_str())
        ).unwrap();

    // === Task and actor metrics ===

    pub static ref TASKS_TOTAL: IntCounterVec =
        IntCounterVec::new(
            Opts::new("tasks_total", "Task executions by task name")
                .namespace(METRIC_NAMESPACE.as_str()),
            &["task"]
        ).unwrap();

    pub static ref TASKS_SKIPPED_TOTAL: IntCounterVec =
        IntCounterVec::new(
            Opts::new("tasks_skipped_total", "Tasks that returned early without issuing requests")
                .namespace(METRIC_NAMESPACE.as_str()),
            &["task"]
        ).unwrap();

    pub static ref ACTIVE_ACTORS: Gauge =
        Gauge::with_opts(
            Opts::new("active_actors", "Number of simulated users currently running")
                .namespace(METRIC_NAMESPACE.as_str())
        ).unwrap();
}

/// Holds a gauge incremented for as long as the guard lives.
///
/// The decrement runs on drop, so a future cancelled mid-request or an actor
/// task aborted at shutdown still leaves the gauge balanced.
pub struct GaugeGuard {
    gauge: Gauge,
}

impl GaugeGuard {
    pub fn inc(gauge: &Gauge) -> Self {
        gauge.inc();
        Self {
            gauge: gauge.clone(),
        }
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

/// Registers all metrics with the given registry.
pub fn register_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(REQUESTS_TOTAL.clone()))?;
    registry.register(Box::new(REQUEST_DURATION_SECONDS.clone()))?;
    registry.register(Box::new(REQUEST_FAILURES_TOTAL.clone()))?;
    registry.register(Box::new(REQUESTS_IN_FLIGHT.clone()))?;
    registry.register(Box::new(TASKS_TOTAL.clone()))?;
    registry.register(Box::new(TASKS_SKIPPED_TOTAL.clone()))?;
    registry.register(Box::new(ACTIVE_ACTORS.clone()))?;

    Ok(())
}

/// Encodes every metric in the registry in the Prometheus text format.
pub fn encode_metrics(registry: &Registry) -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// HTTP handler for the Prometheus metrics endpoint.
pub async fn metrics_handler(
    _req: Request<Body>,
    registry: Registry,
) -> Result<Response<Body>, hyper::Error> {
    let response = match encode_metrics(&registry) {
        Ok(text) => Response::builder()
            .status(200)
            .header("Content-Type", TextEncoder::new().format_type())
            .body(Body::from(text)),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            Response::builder()
                .status(500)
                .body(Body::from("failed to encode metrics"))
        }
    };

    Ok(response.unwrap_or_else(|_| Response::new(Body::empty())))
}

/// Starts the Prometheus metrics HTTP server.
pub async fn start_metrics_server(port: u16, registry: Registry) {
    let addr = ([0, 0, 0, 0], port).into();

    let make_svc = make_service_fn(move |_conn| {
        let registry = registry.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req| {
                let registry = registry.clone();
                async move { metrics_handler(req, registry).await }
            }))
        }
    });

    let server = match Server::try_bind(&addr) {
        Ok(builder) => builder.serve(make_svc),
        Err(e) => {
            error!(port = port, error = %e, "Failed to bind metrics server");
            return;
        }
    };
    info!(
        port = port,
        addr = %addr,
        "Metrics server listening"
    );

    if let Err(e) = server.await {
        error!(error = %e, "Metrics server error");
    }
}
