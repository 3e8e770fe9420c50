// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! State string comparison.
//!
//! A client presents an opaque state string; the server compares it with
//! the recorded `(lowestModSeq, highestModSeq)` window for the account and
//! type. The outcome decides how `/changes` answers.

use strum::Display;

/// Outcome of comparing a client state against the server window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StateComparison {
    /// The client is current; the diff is empty.
    InSync,
    /// The client is within retained history; a diff can be computed.
    Okay,
    /// The client predates retained history and must resynchronise.
    Resync,
    /// The state string is unparseable or from the future.
    Bogus,
}

/// Compare a client-supplied state with the server's `(lowest, highest)`
/// modseq window. `None` means the state string did not decode.
pub fn compare_seq(since: Option<u64>, lowest: u64, highest: u64) -> StateComparison {
    let Some(since) = since else {
        return StateComparison::Bogus;
    };
    if since == highest {
        StateComparison::InSync
    } else if since > highest {
        StateComparison::Bogus
    } else if since < lowest {
        StateComparison::Resync
    } else {
        StateComparison::Okay
    }
}

/// [`compare_seq`] over the default decimal state-string encoding.
pub fn compare_state(since: &str, lowest: u64, highest: u64) -> StateComparison {
    compare_seq(since.parse().ok(), lowest, highest)
}
