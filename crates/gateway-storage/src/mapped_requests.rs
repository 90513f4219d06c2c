//! Mapped-request store (C10): persists mapped requests keyed by
//! `(priority, timestamp)` for pull-based consumers.

use chrono::{DateTime, Utc};
use gateway_core::request::Modification;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::error::Result;
use crate::pool::ThreadBoundPool;

/// A single side-effect a mapped request will attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedEndpoint {
    pub endpoint_id: String,
    pub change_type: ChangeType,
    pub unit: String,
    pub constraint: String,
}

/// `"relative, <expr>"` / `"absolute, <expr>"`, matching the wire/DB
/// format exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChangeType {
    Relative(String),
    Absolute(String),
}

impl ChangeType {
    pub fn from_modification(modification: &Modification) -> Self {
        match modification {
            Modification::Relative(expr) => ChangeType::Relative(expr.clone()),
            Modification::Absolute(expr) => ChangeType::Absolute(expr.clone()),
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeType::Relative(expr) => write!(f, "relative, {expr}"),
            ChangeType::Absolute(expr) => write!(f, "absolute, {expr}"),
        }
    }
}

/// A verified request plus the endpoint effects it maps to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappedRequest {
    pub request_id: Uuid,
    pub generation_timestamp: DateTime<Utc>,
    pub description: String,
    pub impact: String,
    pub priority: u8,
    pub tags: Option<String>,
    pub affected_endpoints: Vec<AffectedEndpoint>,
}

pub struct MappedRequestStore {
    pool: ThreadBoundPool,
}

impl MappedRequestStore {
    pub fn open(db_path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let pool = ThreadBoundPool::open(db_path, max_connections)?;
        pool.with_connection(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS mapped_requests (
                    request_id TEXT PRIMARY KEY,
                    generation_timestamp TEXT NOT NULL,
                    description TEXT,
                    impact TEXT,
                    priority INTEGER,
                    tags TEXT,
                    affected_endpoint_list_json TEXT
                )",
                [],
            )?;
            Ok(())
        })?;
        Ok(Self { pool })
    }

    pub fn insert_or_replace(&self, request: &MappedRequest) -> Result<()> {
        let affected_json = serde_json::to_string(&request.affected_endpoints)?;
        self.pool.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO mapped_requests
                    (request_id, generation_timestamp, description, impact, priority, tags, affected_endpoint_list_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    request.request_id.to_string(),
                    request.generation_timestamp.to_rfc3339(),
                    request.description,
                    request.impact,
                    request.priority,
                    request.tags,
                    affected_json,
                ],
            )?;
            Ok(())
        })
    }

    /// `ORDER BY priority, generation_timestamp LIMIT 1` followed by a
    /// `DELETE` of the same row, inside one transaction, so the key is
    /// absent immediately after a successful pull.
    pub fn pull_highest(&self) -> Result<Option<MappedRequest>> {
        self.pool.with_connection(|conn| {
            let tx = conn.unchecked_transaction()?;
            let row = tx.query_row(
                "SELECT request_id, generation_timestamp, description, impact, priority, tags, affected_endpoint_list_json
                 FROM mapped_requests ORDER BY priority, generation_timestamp LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, u8>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            );

            let (request_id, timestamp, description, impact, priority, tags, affected_json) = match row {
                Ok(row) => row,
                Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                Err(e) => return Err(e.into()),
            };

            tx.execute("DELETE FROM mapped_requests WHERE request_id = ?1", [&request_id])?;
            tx.commit()?;

            let affected_endpoints: Vec<AffectedEndpoint> = serde_json::from_str(&affected_json)?;
            Ok(Some(MappedRequest {
                request_id: request_id.parse().map_err(|_| {
                    rusqlite::Error::InvalidColumnType(0, "request_id".to_string(), rusqlite::types::Type::Text)
                })?,
                generation_timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|_| {
                        rusqlite::Error::InvalidColumnType(1, "generation_timestamp".to_string(), rusqlite::types::Type::Text)
                    })?,
                description: description.unwrap_or_default(),
                impact: impact.unwrap_or_default(),
                priority,
                tags,
                affected_endpoints,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store() -> (tempfile::TempDir, MappedRequestStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MappedRequestStore::open(dir.path().join("mapped.sqlite3"), 2).unwrap();
        (dir, store)
    }

    fn mapped(priority: u8, timestamp: DateTime<Utc>) -> MappedRequest {
        MappedRequest {
            request_id: Uuid::new_v4(),
            generation_timestamp: timestamp,
            description: "bump motor speed".to_string(),
            impact: "Motor Speed Configuration".to_string(),
            priority,
            tags: None,
            affected_endpoints: vec![AffectedEndpoint {
                endpoint_id: "MotorSpeed_SP".to_string(),
                change_type: ChangeType::Absolute("900".to_string()),
                unit: "rpm".to_string(),
                constraint: "== 900".to_string(),
            }],
        }
    }

    #[test]
    fn pull_highest_orders_by_priority_then_timestamp_and_deletes() {
        let (_dir, store) = store();
        let base = Utc::now();

        let r10 = mapped(10, base);
        let r3a = mapped(3, base);
        let r7 = mapped(7, base + Duration::seconds(1));
        let r3b = mapped(3, base + Duration::seconds(2));

        for r in [&r10, &r3a, &r7, &r3b] {
            store.insert_or_replace(r).unwrap();
        }

        let pulled = [
            store.pull_highest().unwrap().unwrap(),
            store.pull_highest().unwrap().unwrap(),
            store.pull_highest().unwrap().unwrap(),
            store.pull_highest().unwrap().unwrap(),
        ];

        assert_eq!(pulled[0].request_id, r3a.request_id);
        assert_eq!(pulled[1].request_id, r3b.request_id);
        assert_eq!(pulled[2].request_id, r7.request_id);
        assert_eq!(pulled[3].request_id, r10.request_id);
        assert!(store.pull_highest().unwrap().is_none());
    }

    #[test]
    fn pulled_row_is_absent_afterward() {
        let (_dir, store) = store();
        let r = mapped(5, Utc::now());
        store.insert_or_replace(&r).unwrap();
        store.pull_highest().unwrap();
        assert!(store.pull_highest().unwrap().is_none());
    }
}
