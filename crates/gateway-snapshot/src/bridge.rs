//! Cross-process bridge for one named [`crate::slot::SnapshotSlot`].
//!
//! spec.md §6 resolves the inter-partition request queue's cross-process
//! transport as "a `tokio::net::UnixListener` JSON-line transport ...
//! analogous to POSIX `mq_send`/`mq_receive`" for when the three
//! partitions run as separate OS processes rather than sharing one. A
//! `tokio::sync::watch` channel is exactly as in-process-only as that
//! queue, so the same transport carries snapshots here: one JSON line per
//! publish, written to every connected reader; a reconnecting reader picks
//! up wherever the sender currently is, matching `watch`'s own
//! "always see the latest, not a backlog" semantics.

use gateway_core::Snapshot;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Serve one slot's receiver side over a Unix-domain socket: every
/// connection gets the current value immediately, then one line per
/// subsequent change until the connection or the sender drops. Runs
/// until the sender behind `rx` is dropped (`changed()` then returns
/// `Err`), at which point the listener is torn down.
pub async fn serve_slot(socket_path: impl AsRef<Path>, mut rx: watch::Receiver<Snapshot>) -> std::io::Result<()> {
    let path = socket_path.as_ref();
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(path)?;
    debug!(socket = %path.display(), "snapshot bridge listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                let rx = rx.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(stream, rx).await {
                        debug!(error = %e, "snapshot bridge connection closed");
                    }
                });
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    debug!("snapshot sender dropped, stopping bridge");
                    return Ok(());
                }
            }
        }
    }
}

async fn serve_connection(mut stream: UnixStream, mut rx: watch::Receiver<Snapshot>) -> std::io::Result<()> {
    loop {
        let snapshot = rx.borrow_and_update().clone();
        let mut line = serde_json::to_string(&snapshot).unwrap_or_default();
        line.push('\n');
        stream.write_all(line.as_bytes()).await?;

        if rx.changed().await.is_err() {
            return Ok(());
        }
    }
}

/// Connect to a slot's bridge and mirror every line received into a
/// local `watch` channel, so callers on the consumer side of a process
/// boundary use the exact same `watch::Receiver<Snapshot>` API the
/// in-process producer side does. Reconnects with a fixed backoff if the
/// producer isn't listening yet or the connection drops.
pub async fn subscribe_slot(socket_path: impl AsRef<Path> + Send + 'static) -> watch::Receiver<Snapshot> {
    let (tx, rx) = watch::channel(Snapshot::new());
    tokio::spawn(async move {
        loop {
            match UnixStream::connect(socket_path.as_ref()).await {
                Ok(stream) => {
                    let mut reader = BufReader::new(stream);
                    let mut line = String::new();
                    loop {
                        line.clear();
                        match reader.read_line(&mut line).await {
                            Ok(0) => break,
                            Ok(_) => {
                                if let Ok(snapshot) = serde_json::from_str::<Snapshot>(line.trim_end()) {
                                    tx.send_if_modified(|current| {
                                        if *current == snapshot {
                                            false
                                        } else {
                                            *current = snapshot;
                                            true
                                        }
                                    });
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "snapshot bridge read failed");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, socket = %socket_path.as_ref().display(), "snapshot bridge connect failed, retrying");
                }
            }
            if tx.is_closed() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::WireValue;
    use std::time::Duration;

    #[tokio::test]
    async fn subscriber_sees_snapshots_published_after_it_connects() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("modbus_interface.sock");

        let (tx, rx) = watch::channel(Snapshot::new());
        let serve_path = socket_path.clone();
        tokio::spawn(async move {
            let _ = serve_slot(serve_path, rx).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut sub_rx = subscribe_slot(socket_path).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut snapshot = Snapshot::new();
        snapshot.insert("Motor:Speed", WireValue::U16(900), "motor speed");
        tx.send(snapshot.clone()).unwrap();

        tokio::time::timeout(Duration::from_secs(2), sub_rx.changed()).await.unwrap().unwrap();
        assert_eq!(*sub_rx.borrow(), snapshot);
    }
}
