// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database handle with PRAGMA setup, WAL mode, and per-request connections.
//!
//! The engine core is synchronous: each request borrows exactly one
//! connection for its lifetime and runs one top-level transaction on it.
//! Parallelism is across requests. `Database` owns the path and PRAGMA
//! policy; migrations run once on open.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::debug;

use ixion_core::IxionError;

use crate::migrations;

/// SQLite database handle.
///
/// Opening runs the embedded migrations; [`Database::connect`] then hands
/// out fresh connections with the configured PRAGMAs applied.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    wal_mode: bool,
}

impl Database {
    /// Open (creating if necessary) the database at `path` and run
    /// pending migrations.
    pub fn open(path: impl AsRef<Path>, wal_mode: bool) -> Result<Self, IxionError> {
        let db = Self {
            path: path.as_ref().to_path_buf(),
            wal_mode,
        };
        let mut conn = db.connect()?;
        migrations::run_migrations(&mut conn)?;
        debug!(path = %db.path.display(), wal_mode, "database opened");
        Ok(db)
    }

    /// Open a new connection with PRAGMAs applied.
    ///
    /// Each request must take its own connection; connections are never
    /// shared across requests.
    pub fn connect(&self) -> Result<Connection, IxionError> {
        let conn = Connection::open(&self.path).map_err(map_db_err)?;
        if self.wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(map_db_err)?;
        }
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(map_db_err)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(map_db_err)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(map_db_err)?;
        Ok(conn)
    }

    /// The filesystem path of the database.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Map a rusqlite error into the crate error type.
///
/// Busy/locked means another writer holds the database; the client-facing
/// contract for that condition is `tryAgain`, so it maps to
/// [`IxionError::StateConflict`] rather than a hard storage failure.
pub fn map_db_err(err: rusqlite::Error) -> IxionError {
    if let rusqlite::Error::SqliteFailure(e, _) = &err {
        if matches!(
            e.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        ) {
            return IxionError::StateConflict("blocked by another client".into());
        }
    }
    IxionError::storage(err)
}

/// True when the error is a unique/primary-key constraint violation.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
