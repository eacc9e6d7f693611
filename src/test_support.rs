//! Local HTTP stubs for driving the upstream clients in unit tests.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use std::time::Duration;

/// Answers exactly one request with `status` and `body`, handing back the request head.
pub async fn serve_once(status: &'static str, body: String) -> (String, oneshot::Receiver<String>) {
    let content_length = body.len();
    serve_raw(move |_| {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status, content_length, body
        )
    })
    .await
}

/// Announces a longer body than it sends, then hangs up.
pub async fn serve_truncated(body: &'static str) -> String {
    let (url, _head) = serve_raw(move |_| {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len() + 64,
            body
        )
    })
    .await;
    url
}

/// Accepts a connection and never answers it.
pub async fn serve_silence() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((socket, _)) = listener.accept().await {
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        }
    });
    format!("http://{}/stub", addr)
}

async fn serve_raw(
    respond: impl FnOnce(&str) -> String + Send + 'static,
) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (head_tx, head_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let head = read_head(&mut socket).await;
        let response = respond(&head);
        let _ = head_tx.send(head);
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });

    (format!("http://{}/stub", addr), head_rx)
}

async fn read_head(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// First line of a request head, e.g. `GET /stub?x=1 HTTP/1.1`.
pub fn request_line(head: &str) -> &str {
    head.lines().next().unwrap_or_default()
}
