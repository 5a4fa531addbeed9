// tests/proxy.rs

mod common;
use crate::common::builders::ProjectBuilder;
use crate::common::fake_runner::ScriptedRunner;
use crate::common::{TestApp, spawn_app, with_timeout};

use std::error::Error;
use std::net::SocketAddr;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::Response;
use axum::routing::{get, post};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use harbormaster::gateway::GatewayOptions;
use harbormaster::proxy::ProxyTable;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

type TestResult = Result<(), Box<dyn Error>>;

async fn describe(headers: HeaderMap, uri: Uri) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("-");
    format!("{host} {uri}")
}

async fn echo_body(body: String) -> (StatusCode, [(&'static str, &'static str); 1], String) {
    (StatusCode::CREATED, [("x-upstream", "yes")], body.to_uppercase())
}

async fn echo_ws(upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(|mut socket| async move {
        while let Some(Ok(msg)) = socket.recv().await {
            if socket.send(msg).await.is_err() {
                break;
            }
        }
    })
}

/// A tiny upstream "project" on an ephemeral port.
async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/describe", get(describe))
        .route("/echo", post(echo_body))
        .route("/ws", get(echo_ws));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

/// A port with nothing listening on it.
async fn dead_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn proxied_app(port: u16) -> TestApp {
    let projects = vec![ProjectBuilder::new("web").proxy("app.test", port).build()];
    let table = ProxyTable::from_projects(&projects);
    spawn_app(projects, ScriptedRunner::new(), table, GatewayOptions::default()).await
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

#[tokio::test]
async fn mapped_host_is_forwarded_with_path_and_query() -> TestResult {
    let upstream = spawn_upstream().await;
    let app = proxied_app(upstream.port()).await;

    let resp = client()
        .get(format!("http://{}/describe?x=1", app.addr))
        .header(header::HOST, "app.test")
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await?, "app.test /describe?x=1");
    Ok(())
}

#[tokio::test]
async fn bodies_status_and_headers_round_trip() -> TestResult {
    let upstream = spawn_upstream().await;
    let app = proxied_app(upstream.port()).await;

    let resp = client()
        .post(format!("http://{}/echo", app.addr))
        .header(header::HOST, "app.test")
        .body("shout")
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.headers().get("x-upstream").unwrap(), "yes");
    assert_eq!(resp.text().await?, "SHOUT");
    Ok(())
}

#[tokio::test]
async fn unmapped_host_is_not_found() -> TestResult {
    let upstream = spawn_upstream().await;
    let app = proxied_app(upstream.port()).await;

    let resp = client()
        .get(format!("http://{}/describe", app.addr))
        .header(header::HOST, "elsewhere.test")
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn missing_host_header_is_not_found() -> TestResult {
    let upstream = spawn_upstream().await;
    let app = proxied_app(upstream.port()).await;

    let mut stream = tokio::net::TcpStream::connect(app.addr).await?;
    stream.write_all(b"GET /describe HTTP/1.0\r\n\r\n").await?;
    let mut raw = Vec::new();
    with_timeout(stream.read_to_end(&mut raw)).await?;

    let response = String::from_utf8_lossy(&raw);
    let status_line = response.lines().next().unwrap_or_default();
    assert!(status_line.contains(" 404 "), "unexpected status line: {status_line}");
    Ok(())
}

#[tokio::test]
async fn dead_upstream_is_service_unavailable() -> TestResult {
    let app = proxied_app(dead_port().await).await;

    let resp = client()
        .get(format!("http://{}/", app.addr))
        .header(header::HOST, "app.test")
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let mut request = format!("ws://{}/ws", app.addr).into_client_request()?;
    request
        .headers_mut()
        .insert(header::HOST, "app.test".parse()?);
    assert!(connect_async(request).await.is_err());
    Ok(())
}

#[tokio::test]
async fn websocket_upgrades_are_bridged() -> TestResult {
    let upstream = spawn_upstream().await;
    let app = proxied_app(upstream.port()).await;

    let mut request = format!("ws://{}/ws", app.addr).into_client_request()?;
    request
        .headers_mut()
        .insert(header::HOST, "app.test".parse()?);
    let (mut ws, _) = connect_async(request).await?;

    ws.send(Message::Text("marco".into())).await?;
    match with_timeout(ws.next()).await {
        Some(Ok(Message::Text(text))) => assert_eq!(text, "marco"),
        other => panic!("expected echo, got {other:?}"),
    }
    ws.send(Message::Binary(vec![1, 2, 3])).await?;
    match with_timeout(ws.next()).await {
        Some(Ok(Message::Binary(data))) => assert_eq!(data, vec![1, 2, 3]),
        other => panic!("expected echo, got {other:?}"),
    }
    Ok(())
}
