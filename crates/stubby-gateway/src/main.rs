mod cli;

use crate::cli::CLI;
use clap::Parser;
use stubby_core::UrlStore;
use stubby_deleter::DeleteWorker;
use stubby_gateway::{telemetry, App, AppState};
use stubby_storage::{open_store, PostgresOptions, StoreConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CLI::try_parse()?;
    telemetry::init(&config.log_level, config.log_format);

    let options = PostgresOptions::builder()
        .max_connections(config.db_max_connections)
        .build();
    let store_config = StoreConfig::select(
        config.database_dsn.clone(),
        config.file_storage_path.clone(),
        options,
    );

    info!(
        listen_addr = %config.listen_addr,
        base_url = %config.base_url,
        storage = %store_config,
        "starting gateway server"
    );

    let store = open_store(store_config).await?;
    let (deletes, worker) = DeleteWorker::spawn(store.clone(), config.delete_queue_capacity)?;
    let state = AppState::new(
        store.clone(),
        deletes,
        config.base_url.clone(),
        config.request_timeout(),
    );

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "gateway listening");

    axum::serve(listener, App::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("draining delete queue");
    if let Err(err) = worker.shutdown().await {
        error!(error = %err, "delete worker did not stop cleanly");
    }
    store.close().await?;
    info!("gateway stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
