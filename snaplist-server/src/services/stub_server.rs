//! Local HTTP stub for exercising the outbound clients

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Canned reply for a request line; `None` keeps the connection open without answering
pub type Responder = fn(&str) -> Option<(u16, &'static str)>;

/// Start a stub on an ephemeral port and return its base URL
pub async fn spawn_stub(responder: Responder) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(handle(socket, responder));
        }
    });

    format!("http://{}", addr)
}

async fn handle(mut socket: TcpStream, responder: Responder) {
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    let request_line = request.lines().next().unwrap_or_default().to_string();

    match responder(&request_line) {
        Some((status, body)) => {
            let response = format!(
                "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        None => {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    }
}

/// Read headers and a `content-length` body
async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
        let body_len = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        if buf.len() >= header_end + 4 + body_len {
            return Some(String::from_utf8_lossy(&buf).into_owned());
        }
    }
}
