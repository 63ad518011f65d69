//! Short-lived file store used to hand data to the decrypting application.
//!
//! Files are addressed by a `content://<authority>/<uuid>` URI. An SQLite
//! index records when each file was created; files older than the retention
//! window are removed the next time a file is created, or on an explicit
//! [`TemporaryStorage::cleanup_expired`].

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Default retention window: one day.
pub const DEFAULT_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Upper bound on the retention window (about 100 years).
const MAX_TTL_SECONDS: i64 = 100 * 365 * 24 * 60 * 60;

const DB_FILE_NAME: &str = "tempstorage.db";
const FILES_DIR_NAME: &str = "files";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Temporary file not found: {0}")]
    NotFound(String),
    #[error("Invalid temporary file URI: {0}")]
    InvalidUri(String),
}

/// Reference to one temporary file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TempFileHandle {
    pub id: Uuid,
    pub uri: String,
}

/// Temporary file store backed by a directory and an SQLite index.
pub struct TemporaryStorage {
    conn: Connection,
    directory: PathBuf,
    authority: String,
    ttl: Duration,
}

impl TemporaryStorage {
    /// Open or create a store rooted at `directory`.
    pub fn open<P: AsRef<Path>>(directory: P, authority: &str, ttl_seconds: u64) -> Result<Self, StorageError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(directory.join(FILES_DIR_NAME))?;

        let conn = Connection::open(directory.join(DB_FILE_NAME))?;
        let storage = Self {
            conn,
            directory,
            authority: authority.to_string(),
            ttl: Duration::seconds(i64::try_from(ttl_seconds).unwrap_or(MAX_TTL_SECONDS).min(MAX_TTL_SECONDS)),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_files_created_at ON files(created_at);
            "#,
        )?;
        Ok(())
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Create a new, empty temporary file and return its handle.
    ///
    /// Expired files are cleaned up first.
    pub fn create_file(&self) -> Result<TempFileHandle, StorageError> {
        let now = Utc::now();
        if let Err(e) = self.cleanup_expired_at(now) {
            log::warn!("[TEMPSTORAGE] ⚠️  Cleanup before create failed: {}", e);
        }

        let id = Uuid::new_v4();
        File::create(self.file_path(&id))?;
        self.conn.execute(
            "INSERT INTO files (id, created_at) VALUES (?1, ?2)",
            params![id.to_string(), now.timestamp_millis()],
        )?;

        let handle = TempFileHandle {
            id,
            uri: format!("content://{}/{}", self.authority, id),
        };
        log::debug!("[TEMPSTORAGE] Created {}", handle.uri);
        Ok(handle)
    }

    /// Open an existing temporary file for writing, truncating it.
    pub fn open_for_write(&self, handle: &TempFileHandle) -> Result<File, StorageError> {
        self.ensure_exists(handle)?;
        Ok(File::create(self.file_path(&handle.id))?)
    }

    /// Replace the contents of a temporary file with `bytes`.
    pub fn write(&self, handle: &TempFileHandle, bytes: &[u8]) -> Result<(), StorageError> {
        let mut sink = self.open_for_write(handle)?;
        sink.write_all(bytes)?;
        sink.sync_all()?;
        Ok(())
    }

    pub fn read(&self, handle: &TempFileHandle) -> Result<Vec<u8>, StorageError> {
        self.ensure_exists(handle)?;
        Ok(fs::read(self.file_path(&handle.id))?)
    }

    /// Resolve a `content://` URI issued by this store.
    pub fn resolve(&self, uri: &str) -> Result<TempFileHandle, StorageError> {
        let prefix = format!("content://{}/", self.authority);
        let id = uri
            .strip_prefix(&prefix)
            .and_then(|rest| Uuid::parse_str(rest).ok())
            .ok_or_else(|| StorageError::InvalidUri(uri.to_string()))?;

        let handle = TempFileHandle {
            id,
            uri: uri.to_string(),
        };
        self.ensure_exists(&handle)?;
        Ok(handle)
    }

    /// Delete a temporary file. Returns `false` if it was already gone.
    pub fn delete(&self, handle: &TempFileHandle) -> Result<bool, StorageError> {
        let removed = self
            .conn
            .execute("DELETE FROM files WHERE id = ?1", params![handle.id.to_string()])?;
        self.remove_file(&handle.id)?;
        Ok(removed > 0)
    }

    /// Remove all files older than the retention window.
    pub fn cleanup_expired(&self) -> Result<usize, StorageError> {
        self.cleanup_expired_at(Utc::now())
    }

    /// Remove all files created before `now - ttl`. Returns the number removed.
    pub fn cleanup_expired_at(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let cutoff = (now - self.ttl).timestamp_millis();

        let mut stmt = self.conn.prepare("SELECT id FROM files WHERE created_at < ?1")?;
        let expired: Vec<String> = stmt
            .query_map(params![cutoff], |row| row.get(0))?
            .collect::<Result<_, _>>()?;

        for id in &expired {
            if let Ok(uuid) = Uuid::parse_str(id) {
                self.remove_file(&uuid)?;
            }
            self.conn.execute("DELETE FROM files WHERE id = ?1", params![id])?;
        }

        if !expired.is_empty() {
            log::info!("[TEMPSTORAGE] 🧹 Removed {} expired file(s)", expired.len());
        }
        Ok(expired.len())
    }

    /// Number of files currently tracked by the index.
    pub fn file_count(&self) -> Result<usize, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn ensure_exists(&self, handle: &TempFileHandle) -> Result<(), StorageError> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM files WHERE id = ?1",
                params![handle.id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match found {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(handle.uri.clone())),
        }
    }

    fn remove_file(&self, id: &Uuid) -> Result<(), StorageError> {
        match fs::remove_file(self.file_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn file_path(&self, id: &Uuid) -> PathBuf {
        self.directory.join(FILES_DIR_NAME).join(id.to_string())
    }
}
