// src/server/mod.rs
// Metrics and status endpoint.
mod handler;

pub use handler::StatusHandler;

use anyhow::Result;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Server};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use tracing::info;

/// Serve `handler` until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    handler: StatusHandler,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let make_service = make_service_fn(move |_| {
        let handler = handler.clone();

        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let handler = handler.clone();
                async move { Ok::<_, Infallible>(handler.handle(req).await) }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_service);
    info!("Status server listening on http://{}", addr);

    server.with_graceful_shutdown(shutdown).await?;
    Ok(())
}
