// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sentences: the server side of the wire format.
//!
//! One response tuple `(name, arguments, clientId)` is a sentence; the
//! ordered log of sentences produced within a request is the sentence
//! collection. Back-reference expansion queries the collection for the
//! *first* sentence matching a `(clientId, name)` pair, so insertion
//! order is load-bearing.

use serde_json::{Map, Value};

use crate::method::{MethodError, MethodResult, ERROR_NAME};

/// One response tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct Sentence {
    /// Response name (method name, or `error`).
    pub name: String,
    /// Response arguments.
    pub arguments: Map<String, Value>,
    /// Client id of the call this sentence answers.
    pub client_id: String,
}

impl Sentence {
    /// Wrap a method result under the given client id.
    pub fn result(result: MethodResult, client_id: impl Into<String>) -> Self {
        Self {
            name: result.name,
            arguments: result.arguments,
            client_id: client_id.into(),
        }
    }

    /// Wrap a method error under the given client id.
    pub fn error(error: &MethodError, client_id: impl Into<String>) -> Self {
        Self {
            name: ERROR_NAME.into(),
            arguments: error.arguments(),
            client_id: client_id.into(),
        }
    }

    /// True when this sentence is an `error` response.
    pub fn is_error(&self) -> bool {
        self.name == ERROR_NAME
    }

    /// The wire form `[name, arguments, clientId]`.
    pub fn to_triple(&self) -> Value {
        Value::Array(vec![
            Value::String(self.name.clone()),
            Value::Object(self.arguments.clone()),
            Value::String(self.client_id.clone()),
        ])
    }
}

/// The ordered, request-scoped log of sentences.
#[derive(Debug, Default, Clone)]
pub struct SentenceCollection {
    sentences: Vec<Sentence>,
}

impl SentenceCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sentence at the end.
    pub fn push(&mut self, sentence: Sentence) {
        self.sentences.push(sentence);
    }

    /// The first sentence with the given client id and response name.
    ///
    /// This is the back-reference resolution rule: later sentences for the
    /// same pair never shadow earlier ones.
    pub fn first_match(&self, client_id: &str, name: &str) -> Option<&Sentence> {
        self.sentences
            .iter()
            .find(|s| s.client_id == client_id && s.name == name)
    }

    /// All sentences sharing a client id, in order (a "paragraph").
    pub fn paragraph(&self, client_id: &str) -> Vec<&Sentence> {
        self.sentences
            .iter()
            .filter(|s| s.client_id == client_id)
            .collect()
    }

    /// Number of sentences.
    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    /// True when no sentence has been produced yet.
    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Iterate sentences in order.
    pub fn iter(&self) -> impl Iterator<Item = &Sentence> {
        self.sentences.iter()
    }

    /// The wire form: a JSON array of response triples.
    pub fn to_triples(&self) -> Value {
        Value::Array(self.sentences.iter().map(Sentence::to_triple).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sentence(name: &str, client_id: &str, marker: i64) -> Sentence {
        let mut args = Map::new();
        args.insert("marker".into(), json!(marker));
        Sentence {
            name: name.into(),
            arguments: args,
            client_id: client_id.into(),
        }
    }

    #[test]
    fn first_match_returns_the_earliest_sentence() {
        let mut collection = SentenceCollection::new();
        collection.push(sentence("Cookie/set", "a", 1));
        collection.push(sentence("Cookie/set", "a", 2));
        collection.push(sentence("Cookie/get", "a", 3));

        let hit = collection.first_match("a", "Cookie/set").unwrap();
        assert_eq!(hit.arguments.get("marker"), Some(&json!(1)));
    }

    #[test]
    fn first_match_requires_both_client_id_and_name() {
        let mut collection = SentenceCollection::new();
        collection.push(sentence("Cookie/set", "a", 1));

        assert!(collection.first_match("b", "Cookie/set").is_none());
        assert!(collection.first_match("a", "Cookie/get").is_none());
    }

    #[test]
    fn paragraph_groups_by_client_id_in_order() {
        let mut collection = SentenceCollection::new();
        collection.push(sentence("Cookie/set", "a", 1));
        collection.push(sentence("Cookie/get", "b", 2));
        collection.push(sentence("Cookie/copy", "a", 3));

        let para: Vec<i64> = collection
            .paragraph("a")
            .iter()
            .map(|s| s.arguments["marker"].as_i64().unwrap())
            .collect();
        assert_eq!(para, vec![1, 3]);
    }

    #[test]
    fn error_sentences_use_the_reserved_name() {
        let err = MethodError::unknown_method();
        let s = Sentence::error(&err, "c9");
        assert!(s.is_error());
        assert_eq!(
            s.to_triple(),
            json!(["error", {"type": "unknownMethod"}, "c9"])
        );
    }

    #[test]
    fn to_triples_preserves_order() {
        let mut collection = SentenceCollection::new();
        collection.push(sentence("Cookie/set", "a", 1));
        collection.push(sentence("Cookie/get", "b", 2));

        let triples = collection.to_triples();
        let arr = triples.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0][0], json!("Cookie/set"));
        assert_eq!(arr[1][2], json!("b"));
    }
}
