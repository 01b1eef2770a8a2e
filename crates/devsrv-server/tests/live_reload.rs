//! End-to-end test: real bundler process, real watcher, real WebSocket client.

#![cfg(unix)]

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use devsrv_server::live_reload::ReloadRegistry;
use devsrv_server::{DevServer, ReloadResponse, ServerConfig};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Copies the first entry point to `<outdir>/main.js`.
const BUNDLE_SCRIPT: &str = r#"mkdir -p "$3" && cat "$1" > "$3/main.js""#;

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::create_dir_all(dir.path().join("public")).unwrap();
    std::fs::write(dir.path().join("src/main.ts"), "console.log(1);\n").unwrap();
    std::fs::write(
        dir.path().join("public/index.html"),
        "<!doctype html><script src=\"js/main.js\"></script>",
    )
    .unwrap();
    dir
}

fn config(root: &Path) -> ServerConfig {
    ServerConfig {
        port: 0,
        public_dir: root.join("public"),
        bundler_command: "sh".to_owned(),
        bundler_args: vec!["-c".to_owned(), BUNDLE_SCRIPT.to_owned(), "bundler".to_owned()],
        entry_points: vec![root.join("src/main.ts")],
        out_dir: root.join("public/js"),
        source_dir: root.join("src"),
        ..ServerConfig::default()
    }
}

/// Minimal HTTP/1.1 GET returning (status line, headers+body text).
async fn http_get(addr: SocketAddr, path: &str) -> (String, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    let (status, rest) = response.split_once("\r\n").unwrap();
    (status.to_owned(), rest.to_owned())
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn next_text(socket: &mut Socket, within: Duration) -> Option<String> {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        let message = tokio::time::timeout_at(deadline, socket.next()).await.ok()??;
        if let Message::Text(text) = message.ok()? {
            return Some(text.to_string());
        }
    }
}

async fn wait_for_clients(registry: &ReloadRegistry, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while registry.size() != n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_serves_initial_build() {
    let dir = project();
    let server = DevServer::start(config(dir.path())).await.unwrap();
    let addr = server.local_addr().unwrap();
    let task = tokio::spawn(server.run_until(std::future::pending()));

    let (status, rest) = http_get(addr, "/").await;
    assert!(status.contains("200"), "{status}");
    assert!(rest.to_ascii_lowercase().contains("content-type: text/html"));

    let (status, rest) = http_get(addr, "/js/main.js").await;
    assert!(status.contains("200"), "{status}");
    assert!(rest.contains("console.log(1);"));

    let (status, _) = http_get(addr, "/../secret").await;
    assert!(status.contains("403"), "{status}");

    task.abort();
}

#[tokio::test]
async fn test_source_change_reloads_client_once() {
    let dir = project();
    let server = DevServer::start(config(dir.path())).await.unwrap();
    let addr = server.local_addr().unwrap();
    let registry = server.registry();
    let task = tokio::spawn(server.run_until(std::future::pending()));

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/reload"))
        .await
        .unwrap();
    wait_for_clients(&registry, 1).await;

    socket.send(Message::Text("ping".into())).await.unwrap();
    assert_eq!(
        next_text(&mut socket, Duration::from_secs(5)).await.as_deref(),
        Some("pong")
    );

    std::fs::write(dir.path().join("src/main.ts"), "console.log(2);\n").unwrap();

    assert_eq!(
        next_text(&mut socket, Duration::from_secs(10)).await.as_deref(),
        Some("reload")
    );
    assert_eq!(next_text(&mut socket, Duration::from_millis(600)).await, None);

    let (_, rest) = http_get(addr, "/js/main.js").await;
    assert!(rest.contains("console.log(2);"));

    task.abort();
}

#[tokio::test]
async fn test_reload_api_notifies_clients() {
    let dir = project();
    let mut config = config(dir.path());
    config.watch_enabled = false;
    let server = DevServer::start(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let registry = server.registry();
    let task = tokio::spawn(server.run_until(std::future::pending()));

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/reload"))
        .await
        .unwrap();
    wait_for_clients(&registry, 1).await;

    let (status, rest) = http_get(addr, "/api/reload").await;
    assert!(status.contains("200"), "{status}");
    let body = rest.split_once("\r\n\r\n").unwrap().1;
    let response: ReloadResponse = serde_json::from_str(body).unwrap();
    assert_eq!(
        response,
        ReloadResponse {
            success: true,
            clients: 1
        }
    );

    assert_eq!(
        next_text(&mut socket, Duration::from_secs(5)).await.as_deref(),
        Some("reload")
    );

    socket.close(None).await.unwrap();
    wait_for_clients(&registry, 0).await;

    task.abort();
}

#[tokio::test]
async fn test_plain_request_to_socket_endpoint() {
    let dir = project();
    let mut config = config(dir.path());
    config.watch_enabled = false;
    let server = DevServer::start(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let task = tokio::spawn(server.run_until(std::future::pending()));

    let (status, _) = http_get(addr, "/ws/reload").await;
    assert!(status.contains("501"), "{status}");

    task.abort();
}

/// Like [`BUNDLE_SCRIPT`], but a source containing `slow` makes the build
/// mark `started`, sleep, then mark `finished` in the output directory.
const SLOW_BUNDLE_SCRIPT: &str = r#"mkdir -p "$3" && cat "$1" > "$3/main.js" && if grep -q slow "$1"; then touch "$3/started" && sleep 1 && touch "$3/finished"; fi"#;

#[tokio::test]
async fn test_shutdown_kills_running_build() {
    let dir = project();
    let mut config = config(dir.path());
    config.bundler_args[1] = SLOW_BUNDLE_SCRIPT.to_owned();
    let out_dir = config.out_dir.clone();
    let server = DevServer::start(config).await.unwrap();

    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let task = tokio::spawn(server.run_until(async {
        let _ = stopped.await;
    }));

    std::fs::write(dir.path().join("src/main.ts"), "// slow\n").unwrap();
    tokio::time::timeout(Duration::from_secs(10), async {
        while !out_dir.join("started").exists() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(out_dir.join("started").exists());
    assert!(!out_dir.join("finished").exists());
}
