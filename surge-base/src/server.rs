use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use derive_new::new;
use eyre::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::CoreMetrics;

/// Serves the agent's metrics over HTTP
#[derive(new, Debug)]
pub struct Server {
    listen_port: u16,
    core_metrics: Arc<CoreMetrics>,
}

impl Server {
    /// Run an HTTP server serving OpenMetrics reports on `/metrics`
    pub fn run(self: Arc<Self>) -> JoinHandle<Result<()>> {
        let port = self.listen_port;
        let core_metrics = self.core_metrics.clone();
        let app = Router::new().route("/metrics", get(move || Self::gather_metrics(core_metrics)));

        tokio::spawn(async move {
            let addr = format!("0.0.0.0:{port}");
            info!(port, "starting metrics server on 0.0.0.0");
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind to {addr}"))?;
            axum::serve(listener, app)
                .await
                .context("Metrics server stopped")
        })
    }

    async fn gather_metrics(core_metrics: Arc<CoreMetrics>) -> impl IntoResponse {
        match core_metrics.gather().map(String::from_utf8) {
            Ok(Ok(metrics)) => (StatusCode::OK, metrics),
            Ok(Err(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".into(),
            ),
            Err(err) => {
                warn!(?err, "Failed to gather metrics");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to gather metrics".into(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use prometheus::Registry;

    use super::*;

    #[tokio::test]
    async fn metrics_route_renders_registry() {
        let metrics = Arc::new(CoreMetrics::new("test", Some(0), Registry::new()).unwrap());
        metrics
            .new_int_counter("expected_metric_content", "test123", &[])
            .unwrap()
            .with_label_values(&[])
            .inc();

        let response = Server::gather_metrics(metrics).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("surge_expected_metric_content"));
    }
}
