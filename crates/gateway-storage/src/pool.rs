//! A thread-bound SQLite connection pool (C4/C10's shared plumbing).
//!
//! `r2d2_sqlite::SqliteConnectionManager` is used only as the
//! connection-construction helper (`ManageConnection::connect`); the
//! pooling loop itself is hand-rolled, because a connection checked
//! out from the "wrong" thread must be discarded and replaced rather
//! than silently reused — a decision r2d2's own checkout/Drop protocol
//! has no hook for. Connection metadata (which thread created/last
//! held a connection) is tracked alongside the connection, not on it,
//! matching the original pool's `id(conn)`-keyed metadata dictionary.

use r2d2::ManageConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

use crate::error::{Result, StorageError};

struct TaggedConnection {
    conn: Connection,
    thread_id: ThreadId,
}

pub struct ThreadBoundPool {
    manager: SqliteConnectionManager,
    idle: Mutex<VecDeque<TaggedConnection>>,
    max_connections: u32,
}

impl ThreadBoundPool {
    pub fn open(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = Self {
            manager,
            idle: Mutex::new(VecDeque::new()),
            max_connections,
        };
        pool.fill()?;
        Ok(pool)
    }

    fn fill(&self) -> Result<()> {
        let current = thread::current().id();
        let mut idle = self.idle.lock().unwrap();
        for _ in 0..self.max_connections {
            idle.push_back(TaggedConnection {
                conn: self.manager.connect()?,
                thread_id: current,
            });
        }
        Ok(())
    }

    /// Check out a connection bound to the calling thread. A
    /// connection tagged for a different thread is closed and replaced
    /// with a freshly created one rather than handed back as-is.
    pub fn checkout(&self) -> Result<Connection> {
        let current = thread::current().id();
        let mut idle = self.idle.lock().unwrap();
        if let Some(tagged) = idle.pop_front() {
            if tagged.thread_id == current {
                return Ok(tagged.conn);
            }
            let stale_thread = tagged.thread_id;
            debug!(?stale_thread, "connection bound to a different thread, closing and replacing");
            drop(tagged.conn);
            return self.manager.connect().map_err(StorageError::from);
        }
        warn!("connection pool empty, creating a new connection");
        self.manager.connect().map_err(StorageError::from)
    }

    /// Return a connection to the pool, tagged for the returning
    /// thread. If the pool is already full the connection is simply
    /// dropped, which closes it.
    pub fn release(&self, conn: Connection) {
        let current = thread::current().id();
        let mut idle = self.idle.lock().unwrap();
        if (idle.len() as u32) < self.max_connections {
            idle.push_back(TaggedConnection {
                conn,
                thread_id: current,
            });
        }
    }

    /// Run `f` with a checked-out connection, always returning it to
    /// the pool afterward (even on error/panic-unwind through `?`).
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.checkout()?;
        let result = f(&conn);
        self.release(conn);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_from_same_thread_reuses_connection() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ThreadBoundPool::open(dir.path().join("pool.sqlite3"), 2).unwrap();
        let conn = pool.checkout().unwrap();
        pool.release(conn);
        let _conn = pool.checkout().unwrap();
    }

    #[test]
    fn with_connection_always_releases() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ThreadBoundPool::open(dir.path().join("pool.sqlite3"), 1).unwrap();
        let result: Result<i64> = pool.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get(0))
                .map_err(StorageError::from)
        });
        assert_eq!(result.unwrap(), 1);
    }
}
