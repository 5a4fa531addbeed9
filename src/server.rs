// src/server.rs

//! The single HTTP listener shared by the proxy and the gateway.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::TlsConfig;
use crate::gateway::Gateway;
use crate::proxy::{Forwarder, ProxyTable, forward_upgrade};

#[derive(Debug, Clone)]
pub struct AppState {
    gateway: Arc<Gateway>,
    proxy: Arc<ProxyTable>,
    forwarder: Forwarder,
}

impl AppState {
    pub fn new(gateway: Arc<Gateway>, proxy: ProxyTable) -> Result<Self> {
        Ok(Self {
            gateway,
            proxy: Arc::new(proxy),
            forwarder: Forwarder::new().context("building proxy http client")?,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new().fallback(route).with_state(state)
}

/// Mapped hosts go to their project; unmapped upgrades go to the gateway;
/// anything else is a 404.
async fn route(
    State(app): State<AppState>,
    upgrade: Option<WebSocketUpgrade>,
    req: Request,
) -> Response {
    let host = req.headers().get(header::HOST).and_then(|h| h.to_str().ok());
    let target = app.proxy.lookup(host);

    match (target, upgrade) {
        (Some(port), Some(upgrade)) => {
            let (parts, _body) = req.into_parts();
            forward_upgrade(port, upgrade, &parts).await
        }
        (Some(port), None) => app.forwarder.forward_http(port, req).await,
        (None, Some(upgrade)) => app.gateway.accept(upgrade),
        (None, None) => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain")],
            "",
        )
            .into_response(),
    }
}

/// Serve `app` on `addr` until `shutdown` resolves. Open connections are
/// dropped rather than drained, since control sessions never end on their own.
pub async fn serve<F>(app: Router, addr: SocketAddr, tls: Option<&TlsConfig>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    #[cfg(feature = "tls")]
    if let Some(tls) = tls {
        return serve_tls(app, addr, tls, shutdown).await;
    }
    #[cfg(not(feature = "tls"))]
    if tls.is_some() {
        tracing::warn!("tls configured but this build lacks the `tls` feature; serving plain http");
    }

    serve_plain(app, addr, shutdown).await
}

async fn serve_plain<F>(app: Router, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(addr = %listener.local_addr()?, "listening");

    tokio::select! {
        res = axum::serve(listener, app).into_future() => res.context("http server failed")?,
        _ = shutdown => info!("shutting down listener"),
    }
    Ok(())
}

#[cfg(feature = "tls")]
async fn serve_tls<F>(app: Router, addr: SocketAddr, tls: &TlsConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    use axum_server::tls_rustls::RustlsConfig;

    let config = match RustlsConfig::from_pem_file(&tls.cert, &tls.key).await {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                cert = %tls.cert.display(),
                key = %tls.key.display(),
                error = %e,
                "could not load tls material; serving plain http"
            );
            return serve_plain(app, addr, shutdown).await;
        }
    };
    let handle = axum_server::Handle::new();
    let trigger = handle.clone();
    tokio::spawn(async move {
        shutdown.await;
        info!("shutting down listener");
        trigger.shutdown();
    });

    info!(%addr, "listening (tls)");
    axum_server::bind_rustls(addr, config)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .context("https server failed")
}
