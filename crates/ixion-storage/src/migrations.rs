// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL migration files are compiled into the binary at build time via
//! `embed_migrations!`. Only fixed infrastructure tables live here;
//! entity tables are deployed at startup from the record-class registry.

use ixion_core::IxionError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Run all pending migrations against the given connection.
///
/// Refinery tracks applied migrations in its own `refinery_schema_history`
/// table.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), IxionError> {
    embedded::migrations::runner()
        .run(conn)
        .map_err(|e| IxionError::Storage {
            source: Box::new(e),
        })?;
    Ok(())
}
