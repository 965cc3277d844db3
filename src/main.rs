use std::{future::IntoFuture, process, sync::Arc};

use catalog_server::{
    application::{catalog::Catalog, error::AppError},
    config::{self, Settings},
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use serde::Serialize;
use tokio::sync::Notify;
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
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Check(_) => run_check(settings).await,
    }
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let catalog = Catalog::from_settings(&settings.catalog);

    if settings.catalog.warm_on_startup {
        warm(&catalog).await?;
    }

    serve_http(&settings, HttpState { catalog }).await
}

#[derive(Debug, Serialize)]
struct CheckReport {
    leaf_count: usize,
    top_level_count: usize,
    all_count: usize,
    products: usize,
}

async fn run_check(settings: Settings) -> Result<(), AppError> {
    let catalog = Catalog::from_settings(&settings.catalog);
    warm(&catalog).await?;

    let counts = catalog.category_counts();
    let report = CheckReport {
        leaf_count: counts.leaf_count,
        top_level_count: counts.top_level_count,
        all_count: counts.all_count,
        products: catalog.products().count(),
    };
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| AppError::unexpected(format!("failed to render report: {err}")))?;
    println!("{rendered}");
    Ok(())
}

async fn warm(catalog: &Catalog) -> Result<(), AppError> {
    let catalog = catalog.clone();
    tokio::task::spawn_blocking(move || catalog.warm())
        .await
        .map_err(|err| AppError::unexpected(format!("warmup task failed: {err}")))??;
    Ok(())
}

async fn serve_http(settings: &Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(addr = %settings.server.addr, "catalog server listening");

    let drain = Arc::new(Notify::new());
    let signal = Arc::clone(&drain);
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move { signal.notified().await });
    let mut server = tokio::spawn(server.into_future());

    tokio::select! {
        joined = &mut server => return finish(joined),
        () = shutdown_signal() => {}
    }

    info!(
        grace_seconds = settings.server.graceful_shutdown.as_secs(),
        "shutdown requested, draining connections"
    );
    drain.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => finish(joined),
        Err(_) => {
            warn!("graceful shutdown timed out, aborting open connections");
            server.abort();
            Ok(())
        }
    }
}

fn finish(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    joined
        .map_err(|err| InfraError::server(format!("server task failed: {err}")))?
        .map_err(|err| InfraError::server(format!("server error: {err}")))?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
