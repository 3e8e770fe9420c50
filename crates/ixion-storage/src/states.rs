// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-account state bookkeeping.
//!
//! Every (account, type) pair owns a row in `states` recording the window
//! of retained modification sequence numbers. A request loads the rows
//! for its account once, stages at most one bump per type in a pending
//! map, and writes the bumps back when the outer transaction commits.
//! Two requests racing on the same row leave the loser with a
//! [`IxionError::StateConflict`], surfaced to the client as `tryAgain`.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use ixion_core::IxionError;

use crate::database::{is_unique_violation, map_db_err};

/// One loaded row of the `states` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateRow {
    /// Oldest modseq for which change history is retained.
    pub lowest: u64,
    /// Newest committed modseq.
    pub highest: u64,
}

/// The per-request, per-account bookkeeper session.
///
/// Holds the loaded state rows and the pending-bump map. The session is
/// created lazily on first state access inside the top-level transaction;
/// the transaction scoping (localise / fold / discard of the pending map)
/// is driven by the request context, which owns the session.
#[derive(Debug)]
pub struct AccountState {
    account_id: String,
    rows: HashMap<String, StateRow>,
    pending: HashMap<String, u64>,
}

impl AccountState {
    /// Load all state rows for the account.
    pub fn load(conn: &Connection, account_id: &str) -> Result<Self, IxionError> {
        let mut stmt = conn
            .prepare(
                "SELECT type, lowestModSeq, highestModSeq FROM states WHERE accountId = ?1",
            )
            .map_err(map_db_err)?;
        let mut rows = HashMap::new();
        let loaded = stmt
            .query_map(params![account_id], |row| {
                let type_key: String = row.get(0)?;
                let lowest: u64 = row.get(1)?;
                let highest: u64 = row.get(2)?;
                Ok((type_key, StateRow { lowest, highest }))
            })
            .map_err(map_db_err)?;
        for entry in loaded {
            let (type_key, row) = entry.map_err(map_db_err)?;
            rows.insert(type_key, row);
        }
        Ok(Self {
            account_id: account_id.to_string(),
            rows,
            pending: HashMap::new(),
        })
    }

    /// The account this session belongs to.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Current state string for a type: the pending bump if one is
    /// staged, else the committed `highestModSeq`, else `"0"`.
    pub fn state_for(&self, type_key: &str) -> String {
        self.seq_for(type_key).to_string()
    }

    /// The numeric form of [`AccountState::state_for`], for record
    /// classes that encode their state strings differently.
    pub fn seq_for(&self, type_key: &str) -> u64 {
        match self.pending.get(type_key) {
            Some(pending) => *pending,
            None => self.rows.get(type_key).map(|r| r.highest).unwrap_or(0),
        }
    }

    /// The modseq that new or updated rows of this type must carry:
    /// the pending bump if staged, else `highestModSeq + 1`, else `1`.
    pub fn next_state_for(&self, type_key: &str) -> u64 {
        match self.pending.get(type_key) {
            Some(pending) => *pending,
            None => self.rows.get(type_key).map(|r| r.highest + 1).unwrap_or(1),
        }
    }

    /// Stage a bump for the type. Idempotent: only the first call of the
    /// transaction records the next state as pending.
    pub fn ensure_state_bumped(&mut self, type_key: &str) {
        if !self.pending.contains_key(type_key) {
            let next = self.next_state_for(type_key);
            self.pending.insert(type_key.to_string(), next);
            debug!(type_key, next, "state bump staged");
        }
    }

    /// The `(lowest, highest)` window used by the state comparator.
    /// A staged bump counts as the highest.
    pub fn window(&self, type_key: &str) -> (u64, u64) {
        let (lowest, highest) = self
            .rows
            .get(type_key)
            .map(|r| (r.lowest, r.highest))
            .unwrap_or((0, 0));
        match self.pending.get(type_key) {
            Some(pending) => (lowest, *pending),
            None => (lowest, highest),
        }
    }

    /// True when at least one bump is staged.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Snapshot of the pending map, taken when a nested transaction
    /// opens. On rollback the snapshot is restored; on success the
    /// current map (which includes the nested bumps) is simply kept.
    pub fn pending_snapshot(&self) -> HashMap<String, u64> {
        self.pending.clone()
    }

    /// Restore a snapshot taken by [`AccountState::pending_snapshot`].
    pub fn restore_pending(&mut self, snapshot: HashMap<String, u64>) {
        self.pending = snapshot;
    }

    /// Write all staged bumps to the `states` table.
    ///
    /// Called inside the outer transaction, immediately before it
    /// commits. Existing rows are advanced with an optimistic check
    /// against the value seen at load; missing rows are inserted with
    /// `lowestModSeq = 0`. Either form of losing a race — the row moved
    /// under us, or a concurrent insert — surfaces as
    /// [`IxionError::StateConflict`].
    pub fn commit(&mut self, conn: &Connection) -> Result<(), IxionError> {
        let pending = std::mem::take(&mut self.pending);
        for (type_key, next) in pending {
            match self.rows.get(&type_key).copied() {
                Some(row) => {
                    let changed = conn
                        .execute(
                            "UPDATE states SET highestModSeq = ?1
                             WHERE accountId = ?2 AND type = ?3 AND highestModSeq = ?4",
                            params![next, self.account_id, type_key, row.highest],
                        )
                        .map_err(map_db_err)?;
                    if changed == 0 {
                        return Err(IxionError::StateConflict(format!(
                            "state row for ({}, {type_key}) advanced concurrently",
                            self.account_id
                        )));
                    }
                    self.rows.insert(
                        type_key,
                        StateRow {
                            lowest: row.lowest,
                            highest: next,
                        },
                    );
                }
                None => {
                    conn.execute(
                        "INSERT INTO states (accountId, type, lowestModSeq, highestModSeq)
                         VALUES (?1, ?2, 0, ?3)",
                        params![self.account_id, type_key, next],
                    )
                    .map_err(|e| {
                        if is_unique_violation(&e) {
                            IxionError::StateConflict(format!(
                                "state row for ({}, {type_key}) inserted concurrently",
                                self.account_id
                            ))
                        } else {
                            map_db_err(e)
                        }
                    })?;
                    self.rows.insert(
                        type_key,
                        StateRow {
                            lowest: 0,
                            highest: next,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    /// Discard cached row snapshots and reload from the table.
    pub fn refresh(&mut self, conn: &Connection) -> Result<(), IxionError> {
        let fresh = Self::load(conn, &self.account_id)?;
        self.rows = fresh.rows;
        Ok(())
    }
}

/// Seed state rows at `highestModSeq = 0` for every type in a freshly
/// provisioned account.
pub fn seed_account_states(
    conn: &Connection,
    account_id: &str,
    type_keys: &[String],
) -> Result<(), IxionError> {
    for type_key in type_keys {
        conn.execute(
            "INSERT INTO states (accountId, type, lowestModSeq, highestModSeq)
             VALUES (?1, ?2, 0, 0)",
            params![account_id, type_key],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                IxionError::StateConflict(format!(
                    "account {account_id} already has a state row for {type_key}"
                ))
            } else {
                map_db_err(e)
            }
        })?;
    }
    Ok(())
}

/// Read one state row directly (bypassing any session cache).
pub fn read_state_row(
    conn: &Connection,
    account_id: &str,
    type_key: &str,
) -> Result<Option<StateRow>, IxionError> {
    conn.query_row(
        "SELECT lowestModSeq, highestModSeq FROM states WHERE accountId = ?1 AND type = ?2",
        params![account_id, type_key],
        |row| {
            Ok(StateRow {
                lowest: row.get(0)?,
                highest: row.get(1)?,
            })
        },
    )
    .optional()
    .map_err(map_db_err)
}
