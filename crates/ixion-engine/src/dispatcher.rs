// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The request dispatcher.
//!
//! Walks the call list in order: expands back-references against the
//! sentences accumulated so far, looks up the handler, enforces access,
//! runs the handler inside a savepoint, and appends the results. Every
//! per-call failure is caught here and becomes an `error` sentence; only
//! infrastructure failures of the dispatch machinery itself abort the
//! request.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tracing::debug;

use ixion_core::{
    resolve_pointer, synth_client_id, Call, MethodError, MethodResult, Sentence,
    SentenceCollection, ERROR_NAME,
};

use crate::context::{CallError, Context};
use crate::multicall::Multicall;

/// A method handler: arguments in, zero or more results out.
pub type Handler = Arc<
    dyn Fn(&mut Context<'_>, Map<String, Value>) -> Result<Vec<MethodResult>, CallError>
        + Send
        + Sync,
>;

/// One unit of dispatch: a plain call or a multicall bundle.
pub enum CallItem {
    /// An ordinary parsed call triple.
    Call(Call),
    /// A pre-computed bundle from `optimize_calls`.
    Multi(Box<dyn Multicall>),
}

impl From<Call> for CallItem {
    fn from(call: Call) -> Self {
        CallItem::Call(call)
    }
}

/// Run the per-call loop over `items`.
pub(crate) fn dispatch(
    ctx: &mut Context<'_>,
    items: Vec<CallItem>,
) -> Result<(), CallError> {
    for item in items {
        match item {
            CallItem::Call(call) => run_call(ctx, call)?,
            CallItem::Multi(multi) => run_multicall(ctx, multi.as_ref())?,
        }
    }
    Ok(())
}

fn run_call(ctx: &mut Context<'_>, call: Call) -> Result<(), CallError> {
    let started = Instant::now();
    let method = call.name;

    let client_id = match call.client_id {
        Some(id) => id,
        None => {
            if ctx.engine().synthesize_client_ids() {
                synth_client_id()
            } else {
                ctx.push_sentence(Sentence::error(
                    &MethodError::invalid_arguments("call has no client id"),
                    "",
                ));
                ctx.record_call(&method, started.elapsed());
                return Ok(());
            }
        }
    };

    let Some(handler) = ctx.engine().handler(&method) else {
        ctx.push_sentence(Sentence::error(&MethodError::unknown_method(), client_id));
        ctx.record_call(&method, started.elapsed());
        return Ok(());
    };

    let mut args = call.arguments;
    if let Err(err) = expand_references(ctx.sentences(), &mut args) {
        ctx.push_sentence(Sentence::error(&err, client_id));
        ctx.record_call(&method, started.elapsed());
        return Ok(());
    }

    if !ctx.may_call(&method, &args) {
        ctx.push_sentence(Sentence::error(&MethodError::forbidden(), client_id));
        ctx.record_call(&method, started.elapsed());
        return Ok(());
    }

    debug!(method = %method, client_id = %client_id, "dispatching call");
    let outcome = ctx.txn_do(|ctx| handler(ctx, args));
    match outcome {
        Ok(results) => push_results(ctx, &method, results, &client_id),
        Err(CallError::Method(err)) => {
            ctx.push_sentence(Sentence::error(&err, client_id));
        }
        Err(CallError::Internal(err)) => {
            push_internal_failure(ctx, &method, &err, &client_id);
        }
    }
    ctx.record_call(&method, started.elapsed());
    Ok(())
}

fn run_multicall(ctx: &mut Context<'_>, multi: &dyn Multicall) -> Result<(), CallError> {
    let started = Instant::now();
    let ident = multi.call_ident().to_string();

    let outcome = ctx.txn_do(|ctx| multi.execute(ctx).map_err(CallError::Internal));
    match outcome {
        Ok(pairs) => {
            for (result, client_id) in pairs {
                ctx.push_sentence(Sentence::result(result, client_id));
            }
        }
        Err(CallError::Method(err)) => {
            ctx.push_sentence(Sentence::error(&err, ""));
        }
        Err(CallError::Internal(err)) => {
            push_internal_failure(ctx, &ident, &err, "");
        }
    }
    ctx.record_call(&ident, started.elapsed());
    Ok(())
}

/// Append handler results under the call's client id. JMAP forbids
/// results after an error within one call: when a handler emits an
/// `error`-named result, the remainder is dropped and an internal report
/// records the discrepancy.
fn push_results(
    ctx: &mut Context<'_>,
    method: &str,
    results: Vec<MethodResult>,
    client_id: &str,
) {
    let total = results.len();
    for (index, result) in results.into_iter().enumerate() {
        let is_error = result.name == ERROR_NAME;
        ctx.push_sentence(Sentence::result(result, client_id));
        if is_error && index + 1 < total {
            let dropped = total - index - 1;
            let guid = ctx.engine().exceptions().file_report(
                method,
                &format!("{dropped} result(s) after an error result were dropped"),
            );
            ctx.note_exception(guid);
            break;
        }
    }
}

fn push_internal_failure(
    ctx: &mut Context<'_>,
    ident: &str,
    err: &ixion_core::IxionError,
    client_id: &str,
) {
    if err.is_conflict() {
        ctx.push_sentence(Sentence::error(&MethodError::try_again(), client_id));
        return;
    }
    let guid = ctx
        .engine()
        .exceptions()
        .file_report(ident, &err.to_string());
    ctx.note_exception(guid.clone());
    ctx.push_sentence(Sentence::error(&MethodError::internal(guid), client_id));
}

/// Expand every `#key` back-reference in `args` against the sentences
/// accumulated so far.
pub(crate) fn expand_references(
    sentences: &SentenceCollection,
    args: &mut Map<String, Value>,
) -> Result<(), MethodError> {
    let ref_keys: Vec<String> = args
        .keys()
        .filter(|k| k.starts_with('#'))
        .cloned()
        .collect();

    for ref_key in ref_keys {
        let plain = ref_key[1..].to_string();
        if args.contains_key(&plain) {
            return Err(MethodError::result_reference(format!(
                "argument `{plain}` present both plainly and as a reference"
            )));
        }

        let (result_of, name, path) = {
            let reference = args
                .get(&ref_key)
                .and_then(Value::as_object)
                .ok_or_else(|| MethodError::result_reference("malformed ResultReference"))?;
            let result_of = reference.get("resultOf").and_then(Value::as_str);
            let name = reference.get("name").and_then(Value::as_str);
            let path = reference.get("path").and_then(Value::as_str);
            match (result_of, name, path) {
                (Some(result_of), Some(name), Some(path)) if reference.len() == 3 => (
                    result_of.to_string(),
                    name.to_string(),
                    path.to_string(),
                ),
                _ => {
                    return Err(MethodError::result_reference("malformed ResultReference"))
                }
            }
        };

        let sentence = sentences.first_match(&result_of, &name).ok_or_else(|| {
            MethodError::result_reference(format!(
                "no `{name}` result for client id `{result_of}`"
            ))
        })?;

        let resolved = resolve_pointer(&Value::Object(sentence.arguments.clone()), &path)
            .map_err(|err| MethodError::result_reference(err.to_string()))?;

        args.remove(&ref_key);
        args.insert(plain, resolved);
    }
    Ok(())
}
