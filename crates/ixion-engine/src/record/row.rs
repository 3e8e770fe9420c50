// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory form of one entity-table row.

use serde_json::{Map, Value};

/// One loaded record row: the mandatory columns plus the concrete
/// declared properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Server-assigned GUID.
    pub id: String,
    /// Owning account.
    pub account_id: String,
    /// Modseq at creation.
    pub mod_seq_created: u64,
    /// Modseq of the most recent change (including destruction).
    pub mod_seq_changed: u64,
    /// Destruction timestamp; `None` while live.
    pub date_destroyed: Option<String>,
    /// True while live. Stored as 1 or NULL so destroyed rows drop out
    /// of unique indexes.
    pub is_active: bool,
    /// Server-stamped creation timestamp.
    pub created: String,
    /// Concrete property values by name.
    pub properties: Map<String, Value>,
}

impl Row {
    /// A property value, `Null` when unset.
    pub fn property(&self, name: &str) -> &Value {
        self.properties.get(name).unwrap_or(&Value::Null)
    }
}

/// Old and new property values handed to the post-update hook.
#[derive(Debug, Clone)]
pub struct RowDiff {
    /// Property values before the update.
    pub old: Map<String, Value>,
    /// Property values after the update.
    pub new: Map<String, Value>,
}
