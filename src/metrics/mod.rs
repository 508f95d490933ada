use autometrics::prometheus_exporter;
use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

#[cfg(test)]
mod metrics_test;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref NODE_START_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("node_start_total", "Nodes launched, labeled by role"),
        &["role"]
    )
    .expect("metric can not be created");

    pub static ref NODE_STOP_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("node_stop_total", "Nodes stopped, labeled by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref COMMAND_DISPATCH_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("command_dispatch_total", "Commands dispatched, labeled by name and ok flag"),
        &["command", "ok"]
    )
    .expect("metric can not be created");

    pub static ref PROPAGATION_POLL_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("propagation_poll_total", "Convergence polls, labeled by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref COMMAND_DURATION_METRIC: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "command_duration_metric",
            "Histogram of command dispatch duration in ms"
        )
        .buckets(exponential_buckets(0.1, 2.0, 12).expect("bucket layout")),
        &["command"]
    )
    .expect("metric can not be created");
}

pub fn register_custom_metrics() {
    REGISTRY
        .register(Box::new(NODE_START_TOTAL.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(NODE_STOP_TOTAL.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(COMMAND_DISPATCH_TOTAL.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(PROPAGATION_POLL_TOTAL.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(COMMAND_DURATION_METRIC.clone()))
        .expect("collector can be registered");
}

/// Serves `/metrics` until the shutdown signal fires.
pub async fn serve_metrics(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    register_custom_metrics();

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    let (_, server) = warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
        let _ = shutdown_signal.changed().await;
    });
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        eprintln!("could not encode custom metrics: {}", e);
    };
    let mut res = match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    };

    res.push_str(&get_metrics_body());
    Ok(res)
}

/// Export metrics for Prometheus to scrape
pub fn get_metrics_body() -> String {
    let autometrics_response = prometheus_exporter::encode_http_response();
    autometrics_response.into_body()
}
