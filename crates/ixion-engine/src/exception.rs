// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Out-of-band exception reporting.
//!
//! Internal failures are never detailed to clients; they are filed with a
//! sink that returns a correlation GUID, and the client sees only an
//! `internalError` sentence carrying that GUID.

use std::sync::Arc;

use tracing::error;

use ixion_core::new_guid;

/// Files exception reports and returns their correlation GUIDs.
pub trait ExceptionSink: Send + Sync {
    /// File one report. `context` names where the failure surfaced
    /// (method name, call ident); `detail` is the full error text.
    fn file_report(&self, context: &str, detail: &str) -> String;
}

/// Default sink: a structured error log line keyed by a fresh GUID.
#[derive(Debug, Default)]
pub struct LogSink;

impl ExceptionSink for LogSink {
    fn file_report(&self, context: &str, detail: &str) -> String {
        let guid = new_guid();
        error!(guid = %guid, context, detail, "exception report filed");
        guid
    }
}

/// A shared sink handle.
pub type SharedSink = Arc<dyn ExceptionSink>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingSink {
        reports: Mutex<Vec<(String, String)>>,
    }

    impl ExceptionSink for CapturingSink {
        fn file_report(&self, context: &str, detail: &str) -> String {
            self.reports
                .lock()
                .unwrap()
                .push((context.to_string(), detail.to_string()));
            "report-guid".to_string()
        }
    }

    #[test]
    fn log_sink_returns_unique_guids() {
        let sink = LogSink;
        let a = sink.file_report("Cookie/set", "boom");
        let b = sink.file_report("Cookie/set", "boom");
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn sinks_are_object_safe() {
        let sink: SharedSink = Arc::new(CapturingSink::default());
        let guid = sink.file_report("Cookie/get", "query failed");
        assert_eq!(guid, "report-guid");
    }
}
