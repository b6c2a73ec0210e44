// HTTP routes

mod http;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::alert_repo::AlertRepo;
use crate::device_repo::DeviceRepo;
use crate::metric_repo::MetricRepo;
use crate::probe::{AuditTools, Prober};
use crate::scan_engine::ScanEngine;

pub(crate) struct AppState<P, T> {
    pub(crate) device_repo: Arc<DeviceRepo>,
    pub(crate) metric_repo: Arc<MetricRepo>,
    pub(crate) alert_repo: Arc<AlertRepo>,
    pub(crate) scan_engine: ScanEngine<P, T>,
    pub(crate) prober: Arc<P>,
}

impl<P, T> Clone for AppState<P, T> {
    fn clone(&self) -> Self {
        Self {
            device_repo: Arc::clone(&self.device_repo),
            metric_repo: Arc::clone(&self.metric_repo),
            alert_repo: Arc::clone(&self.alert_repo),
            scan_engine: self.scan_engine.clone(),
            prober: Arc::clone(&self.prober),
        }
    }
}

pub fn app<P: Prober, T: AuditTools>(
    device_repo: Arc<DeviceRepo>,
    metric_repo: Arc<MetricRepo>,
    alert_repo: Arc<AlertRepo>,
    scan_engine: ScanEngine<P, T>,
    prober: Arc<P>,
) -> Router {
    let state = AppState {
        device_repo,
        metric_repo,
        alert_repo,
        scan_engine,
        prober,
    };
    Router::new()
        .route("/", get(|| async { "netaudit" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/scanner/start", post(http::start_scan::<P, T>)) // POST /api/scanner/start
        .route("/api/scanner/stop", post(http::stop_scan::<P, T>)) // POST /api/scanner/stop
        .route("/api/scanner/status", get(http::scan_status::<P, T>)) // GET /api/scanner/status
        .route("/api/scan/individual", post(http::scan_individual::<P, T>)) // POST /api/scan/individual
        .route("/api/devices", get(http::list_devices::<P, T>)) // GET /api/devices
        .route("/api/devices/{id}", get(http::get_device::<P, T>)) // GET /api/devices/{id}
        .route("/api/devices/{id}/metrics", get(http::device_metrics::<P, T>)) // GET /api/devices/{id}/metrics
        .route("/api/ip-map", get(http::ip_map::<P, T>)) // GET /api/ip-map
        .route("/api/ip-map/free", get(http::free_ips::<P, T>)) // GET /api/ip-map/free
        .route("/api/ip-map/suggest", get(http::suggest_ips::<P, T>)) // GET /api/ip-map/suggest
        .route("/api/triggers", get(http::list_triggers::<P, T>).post(http::create_trigger::<P, T>))
        .route("/api/alerts/active", get(http::active_alerts::<P, T>)) // GET /api/alerts/active
        .route("/api/alerts/count", get(http::alert_counts::<P, T>)) // GET /api/alerts/count
        .route("/api/alerts/{id}/ack", post(http::acknowledge_alert::<P, T>))
        .route("/api/monitoring/overview", get(http::monitoring_overview::<P, T>))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
