// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! GUID helpers for server-assigned identifiers.

/// A fresh server-assigned GUID (hyphenated v4).
pub fn new_guid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A synthesised client id for a call triple that omitted one: `x` plus
/// random hex, so it cannot collide with ids clients normally choose.
pub fn synth_client_id() -> String {
    format!("x{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guids_are_valid_and_unique() {
        let a = new_guid();
        let b = new_guid();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn synthesised_client_ids_carry_the_x_prefix() {
        let id = synth_client_id();
        assert!(id.starts_with('x'));
        assert!(id.len() > 1);
        assert_ne!(id, synth_client_id());
    }
}
