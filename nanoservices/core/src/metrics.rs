use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use once_cell::sync::Lazy;
use std::convert::Infallible;
use std::net::TcpListener;
use tokio::task::JoinHandle;
use hyper::{Body, Method, Request, Response, StatusCode};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::service_fn;
use url::Url;

use etlflow_utils::EtlResult;

// Global registry and metrics are initialized lazily.
static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static RECORDS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    counter("etl_records_processed_total", "Records written by sinks", &["dataflow"])
});

static RECORDS_VALID: Lazy<IntCounterVec> = Lazy::new(|| {
    counter("etl_records_valid_total", "Records that passed validation", &["dataflow"])
});

static RECORDS_INVALID: Lazy<IntCounterVec> = Lazy::new(|| {
    counter("etl_records_invalid_total", "Records that failed validation", &["dataflow"])
});

static EXECUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    counter("etl_executions_total", "Finished executions by status", &["dataflow", "status"])
});

static EXECUTION_STATUS: Lazy<GaugeVec> = Lazy::new(|| {
    let g = GaugeVec::new(Opts::new("etl_execution_status", "1 while a run is in flight, else 0"), &["dataflow"])
        .expect("valid gauge definition");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

static TRANSFORMATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    histogram(
        "etl_transformation_duration_seconds",
        "Transformation duration in seconds",
        &["dataflow", "transformation_type"],
    )
});

static EXECUTION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    histogram("etl_execution_duration_seconds", "Execution duration in seconds", &["dataflow"])
});

fn counter(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let c = IntCounterVec::new(Opts::new(name, help), labels).expect("valid counter definition");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
}

fn histogram(name: &str, help: &str, labels: &[&str]) -> HistogramVec {
    let h = HistogramVec::new(HistogramOpts::new(name, help), labels).expect("valid histogram definition");
    REGISTRY.register(Box::new(h.clone())).ok();
    h
}

/// Mark a dataflow as running.
pub fn execution_started(dataflow: &str) {
    EXECUTION_STATUS.with_label_values(&[dataflow]).set(1.0);
}

/// Record the end of a run.
pub fn execution_finished(dataflow: &str, status: &str, duration_secs: f64, records_processed: u64) {
    EXECUTION_STATUS.with_label_values(&[dataflow]).set(0.0);
    EXECUTIONS.with_label_values(&[dataflow, status]).inc();
    EXECUTION_DURATION.with_label_values(&[dataflow]).observe(duration_secs);
    RECORDS_PROCESSED.with_label_values(&[dataflow]).inc_by(records_processed);
}

/// Observe how long one transformation took.
pub fn observe_transformation(dataflow: &str, transformation_type: &str, duration_secs: f64) {
    TRANSFORMATION_DURATION
        .with_label_values(&[dataflow, transformation_type])
        .observe(duration_secs);
}

/// Count the outcome of a validation stage.
pub fn record_validation(dataflow: &str, valid: usize, invalid: usize) {
    RECORDS_VALID.with_label_values(&[dataflow]).inc_by(valid as u64);
    RECORDS_INVALID.with_label_values(&[dataflow]).inc_by(invalid as u64);
}

/// Gather metrics as text in Prometheus exposition format.
///
/// ```no_run
/// use etlflow_core::metrics;
/// metrics::record_validation("people", 10, 2);
/// let body = metrics::gather_text();
/// println!("metrics:\n{}", body);
/// ```
pub fn gather_text() -> String {
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

fn metrics_response(req: &Request<Body>) -> Response<Body> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let mut resp = Response::new(Body::from(gather_text()));
            resp.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"));
            resp
        }
        _ => {
            let mut resp = Response::new(Body::empty());
            *resp.status_mut() = StatusCode::NOT_FOUND;
            resp
        }
    }
}

/// Start an HTTP exporter task that serves `/metrics` until `shutdown`
/// resolves. Must be called from within a Tokio runtime.
///
/// ```no_run
/// # async fn demo() {
/// use std::net::TcpListener;
/// use etlflow_core::metrics;
///
/// let listener = TcpListener::bind("127.0.0.1:0").unwrap();
/// let shutdown = async { let _ = tokio::signal::ctrl_c().await; };
/// let handle = metrics::start_exporter_with_shutdown(listener, shutdown);
/// let _ = handle.await;
/// # }
/// ```
pub fn start_exporter_with_shutdown<F>(listener: TcpListener, shutdown: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        // Ensure the std listener is non-blocking before converting to Tokio.
        if let Err(e) = listener.set_nonblocking(true) {
            tracing::error!(error = ?e, "failed to set listener to non-blocking");
            return;
        }
        let tcp_listener = match tokio::net::TcpListener::from_std(listener) {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = ?e, "failed to convert listener to tokio listener");
                return;
            }
        };

        let mut shutdown_fut = Box::pin(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown_fut => {
                    tracing::info!("metrics exporter shutdown requested");
                    break;
                }
                accept = tcp_listener.accept() => {
                    match accept {
                        Ok((stream, _peer)) => {
                            let svc = service_fn(|req: Request<Body>| async move {
                                Ok::<_, Infallible>(metrics_response(&req))
                            });
                            tokio::spawn(async move {
                                if let Err(err) = hyper::server::conn::Http::new().serve_connection(stream, svc).await {
                                    tracing::error!(error = ?err, "connection serve error");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = ?e, "failed to accept connection on metrics listener");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("metrics exporter stopped");
    })
}

/// Start the exporter and return a oneshot sender that stops it.
pub fn start_exporter(listener: TcpListener) -> (JoinHandle<()>, tokio::sync::oneshot::Sender<()>) {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = start_exporter_with_shutdown(listener, async move { let _ = rx.await; });
    (handle, tx)
}

/// Push the current registry to a Prometheus Pushgateway under `job`.
pub async fn push_to_gateway(gateway: &Url, job: &str) -> EtlResult<()> {
    let base = gateway.as_str().trim_end_matches('/');
    let target = format!("{base}/metrics/job/{job}");
    reqwest::Client::new()
        .put(&target)
        .header(CONTENT_TYPE.as_str(), "text/plain; version=0.0.4")
        .body(gather_text())
        .send()
        .await?
        .error_for_status()?;
    tracing::info!(gateway = %target, "metrics pushed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_metrics_show_up_in_exposition() {
        record_validation("metrics_unit", 3, 1);
        observe_transformation("metrics_unit", "validate_fields", 0.01);
        execution_started("metrics_unit");
        execution_finished("metrics_unit", "succeeded", 0.2, 4);

        let txt = gather_text();
        assert!(txt.contains("etl_records_valid_total{dataflow=\"metrics_unit\"} 3"), "{txt}");
        assert!(txt.contains("etl_records_invalid_total{dataflow=\"metrics_unit\"} 1"));
        assert!(txt.contains("etl_records_processed_total{dataflow=\"metrics_unit\"} 4"));
        assert!(txt.contains("etl_execution_status{dataflow=\"metrics_unit\"} 0"));
        assert!(txt.contains("etl_executions_total{dataflow=\"metrics_unit\",status=\"succeeded\"} 1"));
        assert!(txt.contains("etl_transformation_duration_seconds"));
    }

    #[test]
    fn unknown_path_is_not_found() {
        let req = Request::builder().uri("/nope").body(Body::empty()).unwrap();
        assert_eq!(metrics_response(&req).status(), StatusCode::NOT_FOUND);

        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        assert_eq!(metrics_response(&req).status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn push_to_unreachable_gateway_is_an_error() {
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        assert!(push_to_gateway(&url, "etlflow").await.is_err());
    }
}
