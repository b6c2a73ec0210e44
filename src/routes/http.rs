// JSON API handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::AppState;
use crate::alert_repo::NewTrigger;
use crate::ip_advisor::{self, DEFAULT_DAYS_THRESHOLD};
use crate::models::{Credentials, DeviceType, IpStatus, Severity, TriggerOp};
use crate::probe::{AuditTools, Prober};
use crate::scan_engine::StartScanError;
use crate::version::{NAME, VERSION};

fn internal_error(e: anyhow::Error) -> Response {
    tracing::error!(error = %e, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(serde_json::json!({ "error": "internal error" })),
    )
        .into_response()
}

fn json_error(status: StatusCode, msg: &str) -> Response {
    (status, axum::Json(serde_json::json!({ "error": msg }))).into_response()
}

/// GET /version. Service name and version from Cargo.toml at build time.
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct StartScanBody {
    subnet: String,
    username: Option<String>,
    password: Option<String>,
}

/// POST /api/scanner/start. 202 on accept; the scan runs in the background.
/// Credentials in the body override the configured ones for this scan only.
pub(super) async fn start_scan<P: Prober, T: AuditTools>(
    State(state): State<AppState<P, T>>,
    axum::Json(body): axum::Json<StartScanBody>,
) -> Response {
    let credentials = body.username.as_ref().map(|username| {
        Credentials::new(username, body.password.as_deref().unwrap_or_default())
    });
    match state.scan_engine.start(&body.subnet, credentials) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            axum::Json(serde_json::json!({ "status": "started", "subnet": body.subnet })),
        )
            .into_response(),
        Err(StartScanError::AlreadyRunning) => {
            json_error(StatusCode::CONFLICT, "a scan is already running")
        }
        Err(StartScanError::InvalidSubnet(s)) => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            &format!("invalid subnet: {s}"),
        ),
    }
}

/// POST /api/scanner/stop. Cooperative; in-flight host audits finish.
pub(super) async fn stop_scan<P: Prober, T: AuditTools>(
    State(state): State<AppState<P, T>>,
) -> impl IntoResponse {
    state.scan_engine.request_stop();
    axum::Json(serde_json::json!({ "status": "stopping" }))
}

/// GET /api/scanner/status
pub(super) async fn scan_status<P: Prober, T: AuditTools>(
    State(state): State<AppState<P, T>>,
) -> impl IntoResponse {
    let status = state.scan_engine.tracker().snapshot();
    let progress = status.progress();
    let mut body = serde_json::to_value(&status).unwrap_or_default();
    if let Some(obj) = body.as_object_mut() {
        obj.insert("progress".into(), progress.into());
    }
    axum::Json(body)
}

#[derive(Debug, Deserialize)]
pub(super) struct ScanIndividualBody {
    ip: String,
}

/// POST /api/scan/individual. Audits one host synchronously.
pub(super) async fn scan_individual<P: Prober, T: AuditTools>(
    State(state): State<AppState<P, T>>,
    axum::Json(body): axum::Json<ScanIndividualBody>,
) -> Response {
    let Ok(ip) = body.ip.parse() else {
        return json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            &format!("invalid ip: {}", body.ip),
        );
    };
    match state.scan_engine.audit_single(ip).await {
        Ok(device) => axum::Json(device).into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /api/devices. Inventory with the derived online flag.
pub(super) async fn list_devices<P: Prober, T: AuditTools>(
    State(state): State<AppState<P, T>>,
) -> Response {
    let devices = match state.device_repo.list().await {
        Ok(d) => d,
        Err(e) => return internal_error(e),
    };
    let now = chrono::Utc::now();
    let out: Vec<_> = devices
        .into_iter()
        .map(|d| {
            let online = d.is_online(now);
            let mut v = serde_json::to_value(&d).unwrap_or_default();
            if let Some(obj) = v.as_object_mut() {
                obj.insert("online".into(), online.into());
            }
            v
        })
        .collect();
    axum::Json(out).into_response()
}

/// GET /api/devices/{id}. One device plus its latest latency sample.
pub(super) async fn get_device<P: Prober, T: AuditTools>(
    State(state): State<AppState<P, T>>,
    Path(id): Path<i64>,
) -> Response {
    let device = match state.device_repo.get_by_id(id).await {
        Ok(Some(d)) => d,
        Ok(None) => return json_error(StatusCode::NOT_FOUND, "no such device"),
        Err(e) => return internal_error(e),
    };
    let latency = match state.metric_repo.latest(id, "latency").await {
        Ok(s) => s,
        Err(e) => return internal_error(e),
    };
    let online = device.is_online(chrono::Utc::now());
    let mut v = serde_json::to_value(&device).unwrap_or_default();
    if let Some(obj) = v.as_object_mut() {
        obj.insert("online".into(), online.into());
        obj.insert(
            "latestLatency".into(),
            serde_json::to_value(latency).unwrap_or_default(),
        );
    }
    axum::Json(v).into_response()
}

#[derive(Debug, Deserialize)]
pub(super) struct MetricsQuery {
    #[serde(default = "default_metrics_limit")]
    limit: u32,
}

fn default_metrics_limit() -> u32 {
    500
}

/// GET /api/devices/{id}/metrics. Recent samples, ascending by time.
pub(super) async fn device_metrics<P: Prober, T: AuditTools>(
    State(state): State<AppState<P, T>>,
    Path(id): Path<i64>,
    Query(query): Query<MetricsQuery>,
) -> Response {
    match state.metric_repo.recent(id, query.limit).await {
        Ok(samples) => axum::Json(samples).into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct IpMapQuery {
    subnet: Option<String>,
    days: Option<i64>,
}

async fn resolve_subnet<P: Prober, T: AuditTools>(
    state: &AppState<P, T>,
    subnet: Option<&str>,
) -> Result<ipnetwork::Ipv4Network, Response> {
    match subnet {
        Some(s) => s.parse().map_err(|_| {
            json_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                &format!("invalid subnet: {s}"),
            )
        }),
        None => {
            let devices = state.device_repo.list().await.map_err(internal_error)?;
            ip_advisor::infer_subnet(&devices).ok_or_else(|| {
                json_error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "no subnet given and inventory is empty",
                )
            })
        }
    }
}

/// GET /api/ip-map. Occupancy map; subnet inferred from the inventory
/// when not given.
pub(super) async fn ip_map<P: Prober, T: AuditTools>(
    State(state): State<AppState<P, T>>,
    Query(query): Query<IpMapQuery>,
) -> Response {
    let net = match resolve_subnet(&state, query.subnet.as_deref()).await {
        Ok(net) => net,
        Err(resp) => return resp,
    };
    let days = query.days.unwrap_or(DEFAULT_DAYS_THRESHOLD);
    match ip_advisor::compute_ip_map(&state.device_repo, net, days, chrono::Utc::now()).await {
        Ok(map) => axum::Json(map).into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /api/ip-map/free. The free and probably-free slices of the map.
pub(super) async fn free_ips<P: Prober, T: AuditTools>(
    State(state): State<AppState<P, T>>,
    Query(query): Query<IpMapQuery>,
) -> Response {
    let net = match resolve_subnet(&state, query.subnet.as_deref()).await {
        Ok(net) => net,
        Err(resp) => return resp,
    };
    let days = query.days.unwrap_or(DEFAULT_DAYS_THRESHOLD);
    match ip_advisor::compute_ip_map(&state.device_repo, net, days, chrono::Utc::now()).await {
        Ok(mut map) => {
            map.ips
                .retain(|e| matches!(e.status, IpStatus::Free | IpStatus::ProbablyFree));
            axum::Json(map).into_response()
        }
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct SuggestQuery {
    subnet: Option<String>,
    days: Option<i64>,
    #[serde(default = "default_suggest_count")]
    count: usize,
    /// Ping each candidate and drop responders.
    #[serde(default)]
    verify: bool,
}

fn default_suggest_count() -> usize {
    5
}

/// GET /api/ip-map/suggest. Candidate addresses for allocation.
pub(super) async fn suggest_ips<P: Prober, T: AuditTools>(
    State(state): State<AppState<P, T>>,
    Query(query): Query<SuggestQuery>,
) -> Response {
    let net = match resolve_subnet(&state, query.subnet.as_deref()).await {
        Ok(net) => net,
        Err(resp) => return resp,
    };
    let days = query.days.unwrap_or(DEFAULT_DAYS_THRESHOLD);
    let prober = query.verify.then_some(state.prober.as_ref());
    match ip_advisor::suggest_free_ips(
        &state.device_repo,
        net,
        days,
        query.count,
        chrono::Utc::now(),
        prober,
    )
    .await
    {
        Ok(suggestions) => axum::Json(suggestions).into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateTriggerBody {
    name: String,
    description: Option<String>,
    metric_type: String,
    operator: String,
    threshold: f64,
    #[serde(default)]
    duration_seconds: i64,
    severity: String,
    device_type_filter: Option<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// POST /api/triggers
pub(super) async fn create_trigger<P: Prober, T: AuditTools>(
    State(state): State<AppState<P, T>>,
    axum::Json(body): axum::Json<CreateTriggerBody>,
) -> Response {
    let Some(operator) = TriggerOp::parse(&body.operator) else {
        return json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            &format!("unknown operator: {}", body.operator),
        );
    };
    let trigger = NewTrigger {
        name: body.name,
        description: body.description,
        metric_type: body.metric_type,
        operator,
        threshold: body.threshold,
        duration_seconds: body.duration_seconds,
        severity: Severity::parse(&body.severity),
        device_type_filter: body.device_type_filter.as_deref().map(DeviceType::parse),
        enabled: body.enabled,
    };
    match state
        .alert_repo
        .insert_trigger(&trigger, chrono::Utc::now())
        .await
    {
        Ok(id) => (
            StatusCode::CREATED,
            axum::Json(serde_json::json!({ "id": id })),
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /api/triggers. Enabled rules only.
pub(super) async fn list_triggers<P: Prober, T: AuditTools>(
    State(state): State<AppState<P, T>>,
) -> Response {
    match state.alert_repo.list_enabled_triggers().await {
        Ok(triggers) => axum::Json(triggers).into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /api/alerts/active
pub(super) async fn active_alerts<P: Prober, T: AuditTools>(
    State(state): State<AppState<P, T>>,
) -> Response {
    match state.alert_repo.active_alerts().await {
        Ok(alerts) => axum::Json(alerts).into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /api/alerts/count. Unresolved alerts by severity.
pub(super) async fn alert_counts<P: Prober, T: AuditTools>(
    State(state): State<AppState<P, T>>,
) -> Response {
    match state.alert_repo.active_counts().await {
        Ok(counts) => axum::Json(counts).into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct AckBody {
    username: String,
}

/// POST /api/alerts/{id}/ack. Acknowledgement is orthogonal to resolution.
pub(super) async fn acknowledge_alert<P: Prober, T: AuditTools>(
    State(state): State<AppState<P, T>>,
    Path(id): Path<i64>,
    axum::Json(body): axum::Json<AckBody>,
) -> Response {
    match state
        .alert_repo
        .acknowledge(id, &body.username, chrono::Utc::now())
        .await
    {
        Ok(true) => match state.alert_repo.get(id).await {
            Ok(Some(alert)) => axum::Json(alert).into_response(),
            Ok(None) => json_error(StatusCode::NOT_FOUND, "no such alert"),
            Err(e) => internal_error(e),
        },
        Ok(false) => json_error(StatusCode::NOT_FOUND, "no such alert"),
        Err(e) => internal_error(e),
    }
}

/// GET /api/monitoring/overview. Fleet summary for the dashboard.
pub(super) async fn monitoring_overview<P: Prober, T: AuditTools>(
    State(state): State<AppState<P, T>>,
) -> Response {
    let devices = match state.device_repo.list().await {
        Ok(d) => d,
        Err(e) => return internal_error(e),
    };
    let counts = match state.alert_repo.active_counts().await {
        Ok(c) => c,
        Err(e) => return internal_error(e),
    };
    let problem_devices = match state.alert_repo.devices_with_open_alerts().await {
        Ok(n) => n,
        Err(e) => return internal_error(e),
    };
    let now = chrono::Utc::now();
    let online = devices.iter().filter(|d| d.is_online(now)).count();
    axum::Json(serde_json::json!({
        "devices": devices.len(),
        "online": online,
        "offline": devices.len() - online,
        "problemDevices": problem_devices,
        "alerts": counts,
        "scanRunning": state.scan_engine.tracker().is_running(),
    }))
    .into_response()
}
