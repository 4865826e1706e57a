//! Lazily-opened SQLite handle owned by the entity store.

use crate::{CharacterBookError, Result};
use rusqlite::{Connection, ErrorCode};
use std::path::{Path, PathBuf};

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    File(PathBuf),
    /// A private in-memory database. Its contents do not survive a reopen.
    InMemory,
}

/// The single connection to the storage medium.
///
/// The connection is opened on first use and kept until [`close`](Self::close)
/// is called or an operation fails with a medium-level error. In the latter
/// case [`with_connection`](Self::with_connection) reopens the handle and
/// retries the operation exactly once.
pub struct Storage {
    location: StorageLocation,
    conn: Option<Connection>,
}

impl Storage {
    pub fn new(location: StorageLocation) -> Self {
        Self { location, conn: None }
    }

    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        Self::new(StorageLocation::File(path.as_ref().to_path_buf()))
    }

    pub fn in_memory() -> Self {
        Self::new(StorageLocation::InMemory)
    }

    pub fn location(&self) -> &StorageLocation {
        &self.location
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Closes the handle. The next operation reopens it.
    pub fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| CharacterBookError::Database(e))?;
            log::debug!("closed storage handle for {:?}", self.location);
        }
        Ok(())
    }

    /// Runs `op` against the connection, opening it first if needed.
    ///
    /// If the first attempt fails because the medium is unreachable, the
    /// handle is dropped, reopened and `op` runs once more. A second medium
    /// failure is reported as [`CharacterBookError::StorageUnavailable`].
    /// Errors that are not medium failures (validation, not-found, constraint
    /// violations) are returned as-is without a retry.
    pub fn with_connection<T, F>(&mut self, mut op: F) -> Result<T>
    where
        F: FnMut(&mut Connection) -> Result<T>,
    {
        let first = match self.ensure_open() {
            Ok(conn) => op(conn),
            Err(e) => Err(e),
        };

        match first {
            Err(e) if is_medium_failure(&e) => {
                log::warn!("storage handle lost ({e}), reopening {:?}", self.location);
                self.conn = None;
                let retried = match self.ensure_open() {
                    Ok(conn) => op(conn),
                    Err(e) => Err(e),
                };
                retried.map_err(|e| match e {
                    CharacterBookError::StorageUnavailable(_) => e,
                    e if is_medium_failure(&e) => CharacterBookError::StorageUnavailable(e.to_string()),
                    e => e,
                })
            }
            other => other,
        }
    }

    fn ensure_open(&mut self) -> Result<&mut Connection> {
        if self.conn.is_none() {
            let conn = self.connect()?;
            self.conn = Some(conn);
        }
        self.conn
            .as_mut()
            .ok_or_else(|| CharacterBookError::StorageUnavailable("connection not initialised".to_string()))
    }

    fn connect(&self) -> Result<Connection> {
        let conn = match &self.location {
            StorageLocation::File(path) => Connection::open(path),
            StorageLocation::InMemory => Connection::open_in_memory(),
        }
        .map_err(|e| {
            CharacterBookError::StorageUnavailable(format!("cannot open {:?}: {e}", self.location))
        })?;

        conn.execute_batch(include_str!("schema.sql")).map_err(|e| {
            CharacterBookError::StorageUnavailable(format!("cannot initialise {:?}: {e}", self.location))
        })?;

        log::debug!("opened storage at {:?}", self.location);
        Ok(conn)
    }
}

/// Errors after which the handle should be considered lost.
fn is_medium_failure(e: &CharacterBookError) -> bool {
    match e {
        CharacterBookError::StorageUnavailable(_) => true,
        CharacterBookError::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
            err.code,
            ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::NotADatabase
                | ErrorCode::PermissionDenied
        ),
        _ => false,
    }
}
