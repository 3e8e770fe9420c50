// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The built-in notes schema served by `ixion serve`.
//!
//! A small reference schema demonstrating the record-class contract:
//! validators, defaults, immutability, a unique constraint, and query
//! support.

use serde_json::json;

use ixion_core::validators;
use ixion_engine::{Property, RecordClass};

/// The `Note` record class.
pub fn note_class() -> RecordClass {
    RecordClass::new("Note", "generic")
        .property(
            Property::string("title")
                .validator(validators::string_length(1, 255)),
        )
        .property(Property::string("body").optional())
        .property(
            Property::boolean("isFlagged")
                .optional()
                .default_value(json!(false)),
        )
        .property(Property::string_array("tags").optional())
        .property(
            Property::timestamp("remindAt")
                .optional()
                .validator(validators::timestamp()),
        )
        .unique(&["accountId", "title"])
        .enable_query()
}

/// Every record class the server registers, in registration order.
pub fn all_classes() -> Vec<RecordClass> {
    vec![note_class()]
}
