use std::sync::Arc;

use carmarket_clap_blocks::{http::HttpArgs, warehouse::WarehouseArgs};
use carmarket_client::Gateway;
use carmarket_server::http::HttpApi;
use clap::Parser;
use observability_deps::tracing::{info, warn};
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Client(#[from] carmarket_client::Error),

    #[error(transparent)]
    Server(#[from] carmarket_server::Error),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    warehouse: WarehouseArgs,

    #[clap(flatten)]
    http: HttpArgs,

    #[clap(flatten)]
    pub(crate) logging_config: trogging::cli::LoggingConfig,
}

pub(crate) async fn command(config: Config) -> Result<()> {
    let gateway = Gateway::new(&config.warehouse.warehouse_config())?;
    info!(
        warehouse = %config.warehouse.host,
        port = config.warehouse.port,
        database = %gateway.database(),
        table = %config.warehouse.table,
        "starting carmarket server"
    );
    let api = Arc::new(HttpApi::new(
        gateway,
        config.warehouse.table,
        config.http.max_http_request_size,
    ));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_signal().await;
            shutdown.cancel();
        }
    });

    carmarket_server::serve(api, config.http.http_bind_address, shutdown).await?;
    info!("server shut down");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut term), Ok(mut int)) => tokio::select! {
            _ = term.recv() => info!("Received SIGTERM"),
            _ = int.recv() => info!("Received SIGINT"),
        },
        (Err(error), _) | (_, Err(error)) => {
            warn!(%error, "failed to register signal handlers, waiting for ctrl+c");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(windows)]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received SIGINT");
}
