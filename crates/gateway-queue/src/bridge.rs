//! Cross-process bridge for [`crate::queue::RequestQueue`], named after
//! the original's `/interface_partition_mq`.
//!
//! Grounded on spec.md §6's own resolution: "when split across
//! processes, the request queue exposes the same API over a
//! `tokio::net::UnixListener` JSON-line transport ... analogous to POSIX
//! `mq_send`/`mq_receive`". One JSON-encoded [`gateway_core::Request`]
//! per line, one connection per submission — there is no persistent
//! session to maintain, unlike the snapshot bridge's push stream.

use gateway_core::Request;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, warn};

use crate::queue::RequestQueue;

/// Accept connections on `socket_path`, read exactly one JSON-encoded
/// request per connection, and push it onto `queue`. Runs until
/// `running` is cleared.
pub async fn serve(
    socket_path: impl AsRef<Path>,
    queue: Arc<RequestQueue>,
    running: Arc<AtomicBool>,
) -> std::io::Result<()> {
    let path = socket_path.as_ref();
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(path)?;
    debug!(socket = %path.display(), "request queue bridge listening");

    while running.load(Ordering::SeqCst) {
        let (stream, _) = listener.accept().await?;
        let queue = queue.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, queue).await {
                warn!(error = %e, "request queue bridge connection failed");
            }
        });
    }
    Ok(())
}

async fn handle_connection(stream: UnixStream, queue: Arc<RequestQueue>) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    match serde_json::from_str::<Request>(line.trim_end()) {
        Ok(request) => queue.push(request).await,
        Err(e) => warn!(error = %e, "dropping malformed request queue submission"),
    }
    Ok(())
}

/// Submit one request to the queue bridge listening at `socket_path`.
pub async fn submit(socket_path: impl AsRef<Path>, request: &Request) -> std::io::Result<()> {
    let mut stream = UnixStream::connect(socket_path.as_ref()).await?;
    let mut line = serde_json::to_string(request).map_err(std::io::Error::other)?;
    line.push('\n');
    stream.write_all(line.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    #[tokio::test]
    async fn submitted_request_is_admitted_into_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("interface_partition_mq.sock");

        let queue = Arc::new(RequestQueue::new());
        let running = Arc::new(AtomicBool::new(true));
        let serve_path = socket_path.clone();
        let serve_queue = queue.clone();
        let serve_running = running.clone();
        tokio::spawn(async move {
            let _ = serve(serve_path, serve_queue, serve_running).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let request = Request::new("john", Utc::now(), vec!["bump".to_string()], "impact", "MotorSpeed_SP", "900", 5).unwrap();
        submit(&socket_path, &request).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let popped = queue.try_pop().await.unwrap();
        assert_eq!(popped.request_id, request.request_id);

        running.store(false, Ordering::SeqCst);
    }
}
