// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multicalls: pre-computed call bundles.
//!
//! The `optimize_calls` hook may coalesce many logically-identical calls
//! into one database round-trip. The dispatcher treats the bundle as one
//! unit of work but splices its `(result, clientId)` pairs into the
//! sentence collection, preserving per-call response ordering.

use ixion_core::{IxionError, MethodResult};

use crate::context::Context;

/// A call bundle the dispatcher executes as one unit.
pub trait Multicall: Send + Sync {
    /// Name used in the call-info log.
    fn call_ident(&self) -> &str;

    /// Produce the `(result, clientId)` pairs, in response order.
    fn execute(
        &self,
        ctx: &mut Context<'_>,
    ) -> Result<Vec<(MethodResult, String)>, IxionError>;
}

/// The trivial multicall: work already done, pairs stored.
pub struct Done {
    ident: String,
    pairs: Vec<(MethodResult, String)>,
}

impl Done {
    /// Wrap pre-computed pairs under a call ident.
    pub fn new(ident: impl Into<String>, pairs: Vec<(MethodResult, String)>) -> Self {
        Self {
            ident: ident.into(),
            pairs,
        }
    }
}

impl Multicall for Done {
    fn call_ident(&self) -> &str {
        &self.ident
    }

    fn execute(
        &self,
        _ctx: &mut Context<'_>,
    ) -> Result<Vec<(MethodResult, String)>, IxionError> {
        Ok(self.pairs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn done_returns_its_stored_pairs_in_order() {
        let done = Done::new(
            "Cookie/get#batched",
            vec![
                (MethodResult::new("Cookie/get").arg("n", json!(1)), "a".into()),
                (MethodResult::new("Cookie/get").arg("n", json!(2)), "b".into()),
            ],
        );
        assert_eq!(done.call_ident(), "Cookie/get#batched");

        let (engine, _dir) = crate::testing::harness();
        let mut ctx = engine.context("acct", false).unwrap();
        let pairs = done.execute(&mut ctx).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].1, "a");
        assert_eq!(pairs[1].0.arguments["n"], json!(1));
    }
}
