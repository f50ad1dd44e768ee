use std::future::ready;
use std::sync::Arc;

use alert_partitioning::PartitionManager;
use axum::{http::StatusCode, routing::get, Router};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder. Call once per process.
pub fn install_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Liveness always succeeds; readiness waits for the first bucket table,
/// before which this node cannot tell which triggers it owns.
pub fn router(manager: Arc<PartitionManager>, metrics: PrometheusHandle) -> Router {
    Router::new()
        .route("/", get(|| ready("alerting engine")))
        .route(
            "/_readiness",
            get(move || ready(readiness(manager.bucket_count()))),
        )
        .route("/_liveness", get(|| ready("ok")))
        .route("/metrics", get(move || ready(metrics.render())))
}

fn readiness(bucket_count: usize) -> (StatusCode, &'static str) {
    if bucket_count > 0 {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "no bucket table yet")
    }
}

pub async fn serve(router: Router, bind: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, router).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_partitioning::MemberId;

    #[test]
    fn readiness_requires_a_bucket_table() {
        let manager = PartitionManager::new();
        assert_eq!(
            readiness(manager.bucket_count()).0,
            StatusCode::SERVICE_UNAVAILABLE
        );

        manager.on_membership_change(&[MemberId(1)]).unwrap();
        assert_eq!(readiness(manager.bucket_count()), (StatusCode::OK, "ready"));
    }
}
