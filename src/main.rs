use std::{process, sync::Arc, time::Duration};

use bistro::{
    application::{
        error::{AppError, ErrorDetailPolicy},
        export::CsvExporter,
        reports::ReportGenerators,
    },
    cache::{CacheConfig, CacheMetrics, MemoryReportStore, ReportCache},
    config,
    infra::{
        error::InfraError,
        http::{self, ApiState},
        telemetry,
    },
};
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(InfraError::from)?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let store = Arc::new(MemoryReportStore::new(&cache_config));
    let cache = Arc::new(ReportCache::new(
        cache_config,
        store,
        Arc::new(ReportGenerators::builtin()),
        Arc::new(CacheMetrics::new()),
    ));
    let errors = ErrorDetailPolicy::new(settings.errors.detailed);
    let state = ApiState::from_cache(cache.clone(), Arc::new(CsvExporter), errors);

    if cache.config().warm_on_startup {
        let summary = cache.preload_common_reports().await;
        info!(
            target = "bistro::main",
            warmed = summary.warmed,
            skipped = summary.skipped,
            failed = summary.failed,
            "startup cache warm finished"
        );
    }

    let cleanup_handle = spawn_cleanup(cache.clone());

    let result = serve_http(&settings, state).await;

    cleanup_handle.abort();
    let _ = cleanup_handle.await;

    result
}

fn spawn_cleanup(cache: Arc<ReportCache>) -> JoinHandle<()> {
    let period = cache.config().cleanup_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            if let Err(err) = cache.cleanup_expired_cache().await {
                warn!(target = "bistro::main", error = %err, "expired report sweep failed");
            }
        }
    })
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "bistro::main",
        addr = %settings.server.addr,
        "reports server listening"
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = stop_rx.await;
        });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => return server_result(joined),
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|err| AppError::from(InfraError::from(err)))?;
        }
    }

    info!(target = "bistro::main", "shutdown signal received, draining connections");
    let _ = stop_tx.send(());

    drain(server, settings.server.graceful_shutdown).await
}

async fn drain(
    server: JoinHandle<std::io::Result<()>>,
    grace: Duration,
) -> Result<(), AppError> {
    match tokio::time::timeout(grace, server).await {
        Ok(joined) => server_result(joined),
        Err(_) => {
            warn!(
                target = "bistro::main",
                grace_secs = grace.as_secs(),
                "graceful shutdown timed out"
            );
            Ok(())
        }
    }
}

fn server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}
