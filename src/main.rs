use anyhow::Result;
use netaudit::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let pool = db::connect(&app_config.database.path, app_config.database.max_pool_size).await?;
    db::init(&pool).await?;

    let device_repo = Arc::new(device_repo::DeviceRepo::new(pool.clone()));
    let metric_repo = Arc::new(metric_repo::MetricRepo::new(
        pool.clone(),
        app_config.database.metric_retention_days,
    ));
    let alert_repo = Arc::new(alert_repo::AlertRepo::new(pool));
    let alert_engine = Arc::new(alert_engine::AlertEngine::new(alert_repo.clone()));

    let prober = Arc::new(probe::SystemProber::new());
    let tools = Arc::new(probe::SystemAuditTools::new(probe::ToolPaths {
        sweep_tool: app_config.tools.sweep_tool.clone(),
        deep_audit_tool: app_config.tools.deep_audit_tool.clone(),
        printer_telemetry_tool: app_config.tools.printer_telemetry_tool.clone(),
    }));
    let credentials = models::Credentials::new(
        app_config.credentials.username.clone(),
        app_config.credentials.password.clone(),
    );

    let scan_engine = scan_engine::ScanEngine::new(
        device_repo.clone(),
        prober.clone(),
        tools.clone(),
        app_config.scan.clone(),
        credentials.clone(),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let sampler_handle = sampler::spawn(
        sampler::SamplerDeps {
            device_repo: device_repo.clone(),
            metric_repo: metric_repo.clone(),
            alert_engine,
            prober: prober.clone(),
            tools,
            local_stats: Arc::new(local_stats::LocalStats::new()),
            credentials,
            shutdown_rx,
        },
        sampler::SamplerConfig {
            sample_interval_secs: app_config.monitoring.sample_interval_secs,
            device_concurrency: app_config.monitoring.device_concurrency,
            prune_interval_secs: app_config.monitoring.prune_interval_secs,
        },
    );

    if app_config.schedule.enabled {
        scan_engine::spawn_scheduler(scan_engine.clone(), app_config.schedule.clone());
    }

    let app = routes::app(device_repo, metric_repo, alert_repo, scan_engine, prober);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    let in_container = std::path::Path::new("/.dockerenv").exists()
        || std::env::var("CONTAINER").as_deref() == Ok("1");

    if in_container {
        // In Docker: run server until error or SIGTERM (no signal handler; avoids immediate exit)
        axum::serve(listener, app).await?;
    } else {
        tokio::select! {
            result = axum::serve(listener, app) => {
                result?;
            }
            _ = async {
                #[cfg(unix)]
                {
                    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                        Ok(s) => s,
                        Err(_) => {
                            let _ = tokio::signal::ctrl_c().await;
                            return;
                        }
                    };
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = sigterm.recv() => {}
                    }
                }
                #[cfg(not(unix))]
                {
                    tokio::signal::ctrl_c().await
                }
            } => {
                tracing::info!("Received shutdown signal");
                let _ = shutdown_tx.send(());
                let _ = sampler_handle.await;
            }
        }
    }

    Ok(())
}
