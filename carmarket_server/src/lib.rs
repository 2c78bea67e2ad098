//! Web backend of the car market dashboard: field mapping between the
//! warehouse table and the front end, the aggregate views, and the HTTP API
//! that serves them.

pub mod analytics;
pub mod http;
pub mod mapping;

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use hyper::{
    Request,
    server::conn::AddrStream,
    service::{make_service_fn, service_fn},
};
use observability_deps::tracing::info;
use tokio_util::sync::CancellationToken;

use crate::http::{HttpApi, route_request};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind {addr}: {source}")]
    BindAddress {
        addr: SocketAddr,
        source: hyper::Error,
    },

    #[error("error serving http: {0}")]
    ServingHttp(#[from] hyper::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Serve `api` on `addr` until `shutdown` is cancelled, then drain in-flight requests
pub async fn serve(api: Arc<HttpApi>, addr: SocketAddr, shutdown: CancellationToken) -> Result<()> {
    let server = hyper::Server::try_bind(&addr)
        .map_err(|source| Error::BindAddress { addr, source })?
        .serve(make_service_fn(move |_conn: &AddrStream| {
            let api = Arc::clone(&api);
            let service = service_fn(move |request: Request<_>| {
                route_request(Arc::clone(&api), request)
            });
            futures::future::ready(Ok::<_, Infallible>(service))
        }));

    info!(address = %server.local_addr(), "http server listening");
    server.with_graceful_shutdown(shutdown.cancelled()).await?;
    Ok(())
}
