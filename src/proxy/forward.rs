// src/proxy/forward.rs

use std::borrow::Cow;

use axum::body::Body;
use axum::extract::Request;
use axum::extract::ws::{self, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, HeaderName, StatusCode, header, request};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

type Upstream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const MAX_REQUEST_BODY: usize = 64 * 1024 * 1024;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

const WS_HANDSHAKE: [HeaderName; 6] = [
    header::CONNECTION,
    header::UPGRADE,
    header::SEC_WEBSOCKET_KEY,
    header::SEC_WEBSOCKET_VERSION,
    header::SEC_WEBSOCKET_EXTENSIONS,
    header::SEC_WEBSOCKET_ACCEPT,
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
}

fn path_and_query(parts: &request::Parts) -> &str {
    parts.uri.path_and_query().map_or("/", |pq| pq.as_str())
}

fn unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::CONTENT_TYPE, "text/plain")],
        "",
    )
        .into_response()
}

/// Plain HTTP forwarding to `http://localhost:<port>`.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new() -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    /// Send `req` to the upstream and stream its response back. Any
    /// upstream error becomes an empty 503.
    pub async fn forward_http(&self, port: u16, req: Request) -> Response {
        let (parts, body) = req.into_parts();
        let url = format!("http://localhost:{port}{}", path_and_query(&parts));
        let body = match axum::body::to_bytes(body, MAX_REQUEST_BODY).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%url, error = %e, "could not read request body");
                return StatusCode::BAD_REQUEST.into_response();
            }
        };
        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);

        let sent = self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await;

        let upstream = match sent {
            Ok(resp) => resp,
            Err(e) => {
                warn!(%url, error = %e, "proxy upstream unavailable");
                return unavailable();
            }
        };

        let mut builder = Response::builder().status(upstream.status());
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in upstream.headers() {
                if !HOP_BY_HOP.contains(name) {
                    headers.append(name.clone(), value.clone());
                }
            }
        }
        match builder.body(Body::from_stream(upstream.bytes_stream())) {
            Ok(response) => response,
            Err(e) => {
                warn!(%url, error = %e, "could not build proxied response");
                unavailable()
            }
        }
    }
}

/// Connect to `ws://localhost:<port>` and, only if that works, accept the
/// client's upgrade and pump frames both ways until either side closes.
pub async fn forward_upgrade(port: u16, upgrade: WebSocketUpgrade, parts: &request::Parts) -> Response {
    let url = format!("ws://localhost:{port}{}", path_and_query(parts));
    let mut request = match url.as_str().into_client_request() {
        Ok(request) => request,
        Err(e) => {
            warn!(%url, error = %e, "bad upstream websocket url");
            return unavailable();
        }
    };
    for (name, value) in &parts.headers {
        if WS_HANDSHAKE.contains(name) {
            continue;
        }
        if name == header::HOST {
            request.headers_mut().insert(name.clone(), value.clone());
        } else {
            request.headers_mut().append(name.clone(), value.clone());
        }
    }

    let (upstream, response) = match tokio_tungstenite::connect_async(request).await {
        Ok(pair) => pair,
        Err(e) => {
            warn!(%url, error = %e, "proxy websocket upstream unavailable");
            return unavailable();
        }
    };

    let protocol = response
        .headers()
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let upgrade = match protocol {
        Some(p) => upgrade.protocols([p]),
        None => upgrade,
    };

    debug!(%url, "bridging websocket");
    upgrade.on_upgrade(move |client| bridge(client, upstream))
}

async fn bridge(client: WebSocket, upstream: Upstream) {
    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let to_upstream = async {
        while let Some(Ok(msg)) = client_rx.next().await {
            let closing = matches!(msg, ws::Message::Close(_));
            if upstream_tx.send(into_upstream(msg)).await.is_err() || closing {
                break;
            }
        }
        let _ = upstream_tx.close().await;
    };

    let to_client = async {
        while let Some(Ok(msg)) = upstream_rx.next().await {
            let Some(msg) = into_client(msg) else { continue };
            let closing = matches!(msg, ws::Message::Close(_));
            if client_tx.send(msg).await.is_err() || closing {
                break;
            }
        }
        let _ = client_tx.close().await;
    };

    tokio::select! {
        _ = to_upstream => {}
        _ = to_client => {}
    }
}

fn into_upstream(msg: ws::Message) -> Message {
    match msg {
        ws::Message::Text(text) => Message::Text(text),
        ws::Message::Binary(data) => Message::Binary(data),
        ws::Message::Ping(data) => Message::Ping(data),
        ws::Message::Pong(data) => Message::Pong(data),
        ws::Message::Close(frame) => Message::Close(frame.map(|f| CloseFrame {
            code: CloseCode::from(f.code),
            reason: Cow::Owned(f.reason.into_owned()),
        })),
    }
}

fn into_client(msg: Message) -> Option<ws::Message> {
    Some(match msg {
        Message::Text(text) => ws::Message::Text(text),
        Message::Binary(data) => ws::Message::Binary(data),
        Message::Ping(data) => ws::Message::Ping(data),
        Message::Pong(data) => ws::Message::Pong(data),
        Message::Close(frame) => ws::Message::Close(frame.map(|f| ws::CloseFrame {
            code: u16::from(f.code),
            reason: Cow::Owned(f.reason.into_owned()),
        })),
        Message::Frame(_) => return None,
    })
}
