//! Pull endpoint serving container GPU metrics
//!
//! Every `/metrics` request triggers a scrape. Requests are single-flighted:
//! a scrape in progress is awaited by later requests, and a successful result
//! younger than the configured minimum interval is served again.

use crate::metrics::collector::Collector;
use crate::metrics::diagnostics::{ExporterMetrics, ScrapeOutcome};
use crate::metrics::publisher::{encode, MetricsPublisher};
use crate::{ExporterError, Result};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::proto::MetricFamily;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

struct CachedScrape {
    taken_at: Instant,
    families: Vec<MetricFamily>,
}

struct ExporterState {
    collector: Collector,
    diagnostics: ExporterMetrics,
    min_scrape_interval: Duration,
    last_scrape: Mutex<Option<CachedScrape>>,
}

#[derive(Clone)]
pub struct PrometheusExporter {
    state: Arc<ExporterState>,
}

impl PrometheusExporter {
    pub fn new(
        collector: Collector,
        diagnostics: ExporterMetrics,
        min_scrape_interval: Duration,
    ) -> Self {
        Self {
            state: Arc::new(ExporterState {
                collector,
                diagnostics,
                min_scrape_interval,
                last_scrape: Mutex::new(None),
            }),
        }
    }

    pub fn collector(&self) -> &Collector {
        &self.state.collector
    }

    /// Run (or reuse) a scrape and render it with the exporter's own metrics
    pub async fn scrape(&self) -> Result<String> {
        let mut families = self.container_families().await?;
        families.extend(self.state.diagnostics.gather());
        encode(&families)
    }

    async fn container_families(&self) -> Result<Vec<MetricFamily>> {
        let state = &self.state;
        let mut last_scrape = state.last_scrape.lock().await;

        if let Some(cached) = last_scrape.as_ref() {
            if cached.taken_at.elapsed() < state.min_scrape_interval {
                debug!("Serving scrape taken {:?} ago", cached.taken_at.elapsed());
                return Ok(cached.families.clone());
            }
        }

        let started = Instant::now();
        let result = state.collector.collect().await;
        let outcome = match &result {
            Ok(_) => ScrapeOutcome::Success,
            Err(ExporterError::ScrapeTimeout(_)) => ScrapeOutcome::Timeout,
            Err(_) => ScrapeOutcome::Failure,
        };
        state.diagnostics.observe_scrape(outcome, started.elapsed());

        let report = result?;
        state.diagnostics.record_report(&report);

        let families = MetricsPublisher::from_records(&report.records)?.gather();
        *last_scrape = Some(CachedScrape {
            taken_at: Instant::now(),
            families: families.clone(),
        });

        Ok(families)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .with_state(self.clone())
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr).await?;
        info!("Serving metrics on http://{}/metrics", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Metrics server stopped");
        Ok(())
    }
}

async fn metrics_handler(State(exporter): State<PrometheusExporter>) -> Response {
    match exporter.scrape().await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e @ ExporterError::ScrapeTimeout(_)) => {
            error!("Scrape failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, format!("{}\n", e)).into_response()
        }
        Err(e) => {
            error!("Scrape failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e)).into_response()
        }
    }
}

async fn health_handler() -> &'static str {
    "ok\n"
}
