// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property declarations for record classes.
//!
//! A property describes one client-visible field of a record: its data
//! type, nullability, client permissions, immutability, virtuality,
//! validator, and default. The six mandatory columns (`id`, `accountId`,
//! `modSeqCreated`, `modSeqChanged`, `dateDestroyed`, `isActive`) plus
//! `created` are not properties; they are owned by the engine and never
//! client-settable.

use serde_json::Value;
use strum::Display;

use ixion_core::validators::Validator;

use crate::record::row::Row;

/// Column names reserved for the engine.
pub const MANDATORY_COLUMNS: &[&str] = &[
    "id",
    "accountId",
    "modSeqCreated",
    "modSeqChanged",
    "dateDestroyed",
    "isActive",
    "created",
];

/// Data types a property may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DataType {
    /// UTF-8 string.
    String,
    /// Case-insensitive string (stored with NOCASE collation).
    IString,
    /// RFC 3339 timestamp string.
    Timestamp,
    /// Array of strings (stored as a JSON array).
    StringArray,
    /// Boolean.
    Boolean,
    /// Integer.
    Integer,
    /// GUID reference to another record.
    Id,
}

/// Computes a virtual property from a loaded row.
pub type ComputeFn = fn(&Row) -> Value;

/// One declared property of a record class.
#[derive(Clone)]
pub struct Property {
    /// Client-visible name, also the column name when concrete.
    pub name: String,
    /// Data type.
    pub data_type: DataType,
    /// May the stored value be null / omitted on create.
    pub is_optional: bool,
    /// May clients supply this property on create.
    pub client_may_init: bool,
    /// May clients supply this property on update.
    pub client_may_update: bool,
    /// Frozen after create.
    pub is_immutable: bool,
    /// Not persisted; computed on read.
    pub is_virtual: bool,
    /// Optional value validator, run after structural checks.
    pub validator: Option<Validator>,
    /// Default applied when a create omits the property.
    pub default: Option<Value>,
    /// Compute function for virtual properties.
    pub compute: Option<ComputeFn>,
}

impl std::fmt::Debug for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("data_type", &self.data_type)
            .field("is_optional", &self.is_optional)
            .field("client_may_init", &self.client_may_init)
            .field("client_may_update", &self.client_may_update)
            .field("is_immutable", &self.is_immutable)
            .field("is_virtual", &self.is_virtual)
            .field("validator", &self.validator.is_some())
            .field("default", &self.default)
            .field("compute", &self.compute.is_some())
            .finish()
    }
}

impl Property {
    fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            is_optional: false,
            client_may_init: true,
            client_may_update: true,
            is_immutable: false,
            is_virtual: false,
            validator: None,
            default: None,
            compute: None,
        }
    }

    /// A required string property.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, DataType::String)
    }

    /// A required case-insensitive string property.
    pub fn istring(name: impl Into<String>) -> Self {
        Self::new(name, DataType::IString)
    }

    /// A required timestamp property.
    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Timestamp)
    }

    /// A required string-array property.
    pub fn string_array(name: impl Into<String>) -> Self {
        Self::new(name, DataType::StringArray)
    }

    /// A required boolean property.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Boolean)
    }

    /// A required integer property.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Integer)
    }

    /// A required id-reference property.
    pub fn id(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Id)
    }

    /// Allow null / omission.
    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    /// Freeze the property after create.
    pub fn immutable(mut self) -> Self {
        self.is_immutable = true;
        self
    }

    /// Forbid clients from supplying the property at all.
    pub fn server_set(mut self) -> Self {
        self.client_may_init = false;
        self.client_may_update = false;
        self
    }

    /// Forbid clients from changing the property after create.
    pub fn no_client_update(mut self) -> Self {
        self.client_may_update = false;
        self
    }

    /// Attach a value validator.
    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Apply a default when a create omits the property.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Mark virtual, computed on read by `compute`.
    pub fn computed(mut self, compute: ComputeFn) -> Self {
        self.is_virtual = true;
        self.client_may_init = false;
        self.client_may_update = false;
        self.compute = Some(compute);
        self
    }

    /// The SQLite column type for a concrete property.
    pub fn sql_type(&self) -> &'static str {
        match self.data_type {
            DataType::String | DataType::Timestamp | DataType::StringArray | DataType::Id => {
                "TEXT"
            }
            DataType::IString => "TEXT COLLATE NOCASE",
            DataType::Boolean | DataType::Integer => "INTEGER",
        }
    }
}
