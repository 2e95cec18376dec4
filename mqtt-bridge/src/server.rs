//! Scrape HTTP server (spec.md §4.12, C12): serves the current metric cache,
//! rendered per spec.md §4.10, on `GET {exporter_uri}`.

use crate::cache::MetricCache;
use crate::render;
use crate::style::MetricStyle;
use foundations::telemetry::log;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use parking_lot::RwLock;
use socket2::{Domain, SockAddr, Socket, Type};
use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
struct Shared {
    cache: Arc<RwLock<MetricCache>>,
    style: MetricStyle,
    exporter_uri: Arc<str>,
    access_log: Option<Arc<slog::Logger>>,
}

/// Binds the scrape port and serves requests until the process exits; spec.md
/// §4.14 cancels the returned future instead of this function returning.
pub async fn serve(port: u16, exporter_uri: String, cache: Arc<RwLock<MetricCache>>, style: MetricStyle, access_log: Option<slog::Logger>) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = bind(addr)?;

    log::info!("scrape server listening"; "addr" => listener.local_addr()?.to_string(), "path" => exporter_uri.clone());

    let shared = Shared {
        cache,
        style,
        exporter_uri: Arc::from(exporter_uri.as_str()),
        access_log: access_log.map(Arc::new),
    };

    loop {
        let (conn, client_addr) = listener.accept().await?;
        if let Err(e) = conn.set_nodelay(true) {
            log::debug!("failed to set TCP_NODELAY on scrape connection"; "error" => e.to_string());
        }
        let shared = shared.clone();

        tokio::spawn(async move {
            let on_request = service_fn(move |req| {
                let shared = shared.clone();
                async move { respond(shared, client_addr, req).await }
            });

            if let Err(e) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(conn), on_request)
                .await
            {
                log::debug!("scrape connection ended with an error"; "error" => e.to_string());
            }
        });
    }
}

fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.bind(&SockAddr::from(addr))?;
    socket.listen(1024)?;

    let listener: StdTcpListener = socket.into();
    listener.set_nonblocking(true)?;
    TcpListener::from_std(listener)
}

async fn respond(shared: Shared, client_addr: SocketAddr, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let response = if method == Method::GET && path == *shared.exporter_uri {
        let body = render::render(&shared.cache.read(), shared.style);
        Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "text/plain; version=0.0.4")
            .body(Full::new(Bytes::from(body)))
            .unwrap()
    } else {
        Response::builder().status(StatusCode::NOT_FOUND).body(Full::new(Bytes::new())).unwrap()
    };

    if let Some(access_log) = &shared.access_log {
        slog::info!(access_log, "request"; "client_addr" => client_addr.to_string(), "method" => method.to_string(), "path" => path, "status" => response.status().as_u16());
    }

    Ok(response)
}
