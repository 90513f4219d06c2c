//! Credential store (C4): salted bcrypt password hashing over a
//! pooled single-file SQLite database.

use rand::RngCore;
use std::path::Path;
use tracing::{error, info};

use crate::error::{Result, StorageError};
use crate::pool::ThreadBoundPool;

const MIN_PASSWORD_LEN: usize = 21;
const SALT_BYTES: usize = 32;

/// A stored credential row. Never leaves this crate as-is — callers
/// that expose a user-facing projection use [`UserDetails`] instead.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub id: i64,
    pub username: String,
    pub hash: String,
    pub salt: String,
}

/// Public-facing user projection. Deliberately never carries `hash` or
/// `salt` — even internal callers that only need existence/id lookups
/// use this type, not [`CredentialRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDetails {
    pub id: i64,
    pub username: String,
}

pub struct CredentialStore {
    pool: ThreadBoundPool,
}

impl CredentialStore {
    pub fn open(db_path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let pool = ThreadBoundPool::open(db_path, max_connections)?;
        pool.with_connection(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS credentials (
                    id INTEGER PRIMARY KEY,
                    username TEXT UNIQUE NOT NULL,
                    hash TEXT NOT NULL,
                    salt TEXT NOT NULL
                )",
                [],
            )?;
            Ok(())
        })?;
        Ok(Self { pool })
    }

    /// Validate password strength: at least 21 characters, at least
    /// one uppercase, one lowercase, and one digit.
    pub fn validate_password(password: &str) -> std::result::Result<(), String> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(format!("password must be at least {MIN_PASSWORD_LEN} characters long"));
        }
        let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        if !(has_upper && has_lower && has_digit) {
            return Err("password must contain uppercase, lowercase, and digit characters".to_string());
        }
        Ok(())
    }

    fn retrieve(&self, username: &str) -> Result<Option<CredentialRecord>> {
        self.pool.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT id, username, hash, salt FROM credentials WHERE username = ?1")?;
            let mut rows = stmt.query([username])?;
            match rows.next()? {
                Some(row) => Ok(Some(CredentialRecord {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    hash: row.get(2)?,
                    salt: row.get(3)?,
                })),
                None => Ok(None),
            }
        })
    }

    /// Create a new user. Rejects an empty username/password, a
    /// password that fails [`Self::validate_password`], or an existing
    /// username, in that order.
    pub fn create(&self, username: &str, password: &str) -> Result<()> {
        if username.is_empty() || password.is_empty() {
            return Err(StorageError::EmptyCredential);
        }
        Self::validate_password(password).map_err(StorageError::PasswordPolicy)?;
        if self.retrieve(username)?.is_some() {
            return Err(StorageError::UsernameExists);
        }

        let mut salt_bytes = [0u8; SALT_BYTES];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = hex::encode(salt_bytes);
        let hash = bcrypt::hash(format!("{password}{salt}"), bcrypt::DEFAULT_COST)
            .map_err(|e| StorageError::PasswordPolicy(e.to_string()))?;

        self.pool.with_connection(|conn| {
            match conn.execute(
                "INSERT INTO credentials (username, hash, salt) VALUES (?1, ?2, ?3)",
                rusqlite::params![username, hash, salt],
            ) {
                Ok(_) => {
                    info!(username, "created user");
                    Ok(())
                }
                Err(e) => {
                    error!(username, error = %e, "failed to create user");
                    Err(StorageError::from(e))
                }
            }
        })
    }

    /// Verify credentials. Non-existent users and password mismatches
    /// both yield `false`; the only `Err` path is a DB-level failure.
    pub fn verify(&self, username: &str, password: &str) -> Result<bool> {
        let Some(record) = self.retrieve(username)? else {
            return Ok(false);
        };
        let salted = format!("{password}{}", record.salt);
        Ok(bcrypt::verify(salted, &record.hash).unwrap_or(false))
    }

    /// Re-verify `old`, then rehash `new` with the same salt (the salt
    /// is not rotated on password change).
    pub fn update(&self, username: &str, old: &str, new: &str) -> Result<()> {
        let record = self.retrieve(username)?.ok_or(StorageError::UsernameNotFound)?;
        let salted_old = format!("{old}{}", record.salt);
        if !bcrypt::verify(salted_old, &record.hash).unwrap_or(false) {
            return Err(StorageError::OldPasswordIncorrect);
        }
        Self::validate_password(new).map_err(StorageError::PasswordPolicy)?;
        let new_hash = bcrypt::hash(format!("{new}{}", record.salt), bcrypt::DEFAULT_COST)
            .map_err(|e| StorageError::PasswordPolicy(e.to_string()))?;

        self.pool.with_connection(|conn| {
            conn.execute(
                "UPDATE credentials SET hash = ?1 WHERE username = ?2",
                rusqlite::params![new_hash, username],
            )?;
            Ok(())
        })
    }

    pub fn delete(&self, id: i64) -> Result<bool> {
        let affected = self.pool.with_connection(|conn| {
            Ok(conn.execute("DELETE FROM credentials WHERE id = ?1", [id])?)
        })?;
        Ok(affected > 0)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        self.pool.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT username FROM credentials")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut usernames = Vec::new();
            for row in rows {
                usernames.push(row?);
            }
            Ok(usernames)
        })
    }

    /// Public-facing detail projection: never exposes `hash`/`salt`.
    pub fn get(&self, username: &str) -> Result<Option<UserDetails>> {
        Ok(self.retrieve(username)?.map(|r| UserDetails { id: r.id, username: r.username }))
    }

    pub fn user_exists(&self, username: &str) -> Result<bool> {
        Ok(self.retrieve(username)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path().join("credentials.sqlite3"), 4).unwrap();
        (dir, store)
    }

    const STRONG_PASSWORD: &str = "Admin123_secure_password_2025";

    #[test]
    fn create_succeeds_for_a_strong_unique_password() {
        let (_dir, store) = store();
        store.create("john", STRONG_PASSWORD).unwrap();
        assert!(store.user_exists("john").unwrap());
    }

    #[test]
    fn create_rejects_weak_passwords() {
        let (_dir, store) = store();
        assert!(store.create("short", "Short1").is_err());
        assert!(store.create("noupper", "this_has_no_uppercase_1234567890").is_err());
        assert!(store.create("nodigit", "This_has_no_digits_at_all_xxxxxx").is_err());
    }

    #[test]
    fn create_rejects_duplicate_username() {
        let (_dir, store) = store();
        store.create("john", STRONG_PASSWORD).unwrap();
        assert!(matches!(store.create("john", STRONG_PASSWORD), Err(StorageError::UsernameExists)));
    }

    #[test]
    fn verify_roundtrips_and_rejects_wrong_password() {
        let (_dir, store) = store();
        store.create("john", STRONG_PASSWORD).unwrap();
        assert!(store.verify("john", STRONG_PASSWORD).unwrap());
        assert!(!store.verify("john", "wrong").unwrap());
    }

    #[test]
    fn update_keeps_the_same_salt() {
        let (_dir, store) = store();
        store.create("john", STRONG_PASSWORD).unwrap();
        let before = store.retrieve("john").unwrap().unwrap().salt;

        let new_password = "NewAdmin987_secure_password_2025";
        store.update("john", STRONG_PASSWORD, new_password).unwrap();

        let after = store.retrieve("john").unwrap().unwrap().salt;
        assert_eq!(before, after);
        assert!(store.verify("john", new_password).unwrap());
        assert!(!store.verify("john", STRONG_PASSWORD).unwrap());
    }

    #[test]
    fn get_never_exposes_hash_or_salt() {
        let (_dir, store) = store();
        store.create("john", STRONG_PASSWORD).unwrap();
        let details = store.get("john").unwrap().unwrap();
        assert_eq!(details.username, "john");
    }
}
