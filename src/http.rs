use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use metrics::Registry;
use tokio::net::TcpListener;
use tripwire::Tripwire;

use crate::config::Settings;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// Bind the metrics listener to the configured `listen` address.
pub async fn bind(settings: &Settings) -> crate::Result<TcpListener> {
    let listener = TcpListener::bind(settings.listen).await?;

    Ok(listener)
}

/// Serve the registry in Prometheus text format at `/metrics`, until
/// `shutdown` resolves.
pub async fn serve_metrics(listener: TcpListener, registry: Registry, mut shutdown: Tripwire) {
    if let Ok(addr) = listener.local_addr() {
        info!(message = "metrics endpoint started", %addr);
    }

    loop {
        let conn = tokio::select! {
            _ = &mut shutdown => break,
            result = listener.accept() => match result {
                Ok((conn, _peer)) => TokioIo::new(conn),
                Err(err) => {
                    error!(
                        message = "accept new connection failed",
                        %err
                    );

                    continue
                }
            }
        };

        let registry = registry.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let registry = registry.clone();
                async move { handle(req, &registry) }
            });

            let connection: Pin<Box<dyn Future<Output = hyper::Result<()>> + Send>> =
                Box::pin(http1::Builder::new().serve_connection(conn, service));
            if let Err(err) = connection.await {
                error!(message = "handle http connection failed", ?err);
            }
        });
    }
}

fn handle(req: Request<Incoming>, registry: &Registry) -> crate::Result<Response<Full<Bytes>>> {
    if req.method() != Method::GET {
        let resp = Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .body(Full::default())?;

        return Ok(resp);
    }

    let resp = match req.uri().path() {
        "/metrics" => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, TEXT_FORMAT)
            .body(Full::new(Bytes::from(registry.encode())))?,
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::default())?,
    };

    Ok(resp)
}
