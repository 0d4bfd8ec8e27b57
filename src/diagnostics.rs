//! Collects categorised warnings during a run and summarises them at the end.
//!
//! Any `warn!` or `error!` event carrying a `category` field is captured by
//! [`DiagnosticsLayer`] instead of being printed as it happens.

use std::fmt::{self, Write};
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::utils::truncate_chars;

pub const PARSER: &str = "parser";
pub const VALIDATION: &str = "validation";
pub const EMBEDDING: &str = "embedding";
pub const SYSTEM: &str = "system";

const SHOWN_PER_CATEGORY: usize = 3;
const TRUNCATE_AT: usize = 60;

fn category_title(category: &str) -> String {
    match category {
        PARSER => "Parser warnings".to_string(),
        VALIDATION => "Validation issues".to_string(),
        EMBEDDING => "Embedding issues".to_string(),
        SYSTEM => "System messages".to_string(),
        other => other.to_string(),
    }
}

/// Shared, cloneable collector of `(category, message)` pairs.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    records: Arc<Mutex<Vec<(String, String)>>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, category: &str, message: impl Into<String>) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((category.to_string(), message.into()));
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A tracing layer feeding this collector.
    pub fn layer(&self) -> DiagnosticsLayer {
        DiagnosticsLayer {
            diagnostics: self.clone(),
        }
    }

    /// Group the collected messages by category and clear the collector.
    /// Returns `None` when nothing was collected.
    pub fn render_summary(&self) -> Option<String> {
        let records = std::mem::take(&mut *self.records.lock().unwrap_or_else(|e| e.into_inner()));
        if records.is_empty() {
            return None;
        }

        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        for (category, message) in records {
            match groups.iter_mut().find(|(c, _)| *c == category) {
                Some((_, messages)) => messages.push(message),
                None => groups.push((category, vec![message])),
            }
        }

        let mut out = String::from("Warnings summary:\n");
        for (category, messages) in &groups {
            let title = category_title(category);
            if let [only] = messages.as_slice() {
                let _ = writeln!(out, "  {}: {}", title, only);
                continue;
            }
            let _ = writeln!(out, "  {}: {} messages", title, messages.len());
            for message in messages.iter().take(SHOWN_PER_CATEGORY) {
                let _ = writeln!(out, "    - {}", truncate_chars(message, TRUNCATE_AT));
            }
            if messages.len() > SHOWN_PER_CATEGORY {
                let _ = writeln!(out, "    ... and {} more", messages.len() - SHOWN_PER_CATEGORY);
            }
        }
        Some(out)
    }
}

#[derive(Default)]
struct EventVisitor {
    category: Option<String>,
    message: String,
    fields: String,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "category" => self.category = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            name => {
                let _ = write!(self.fields, " {}={}", name, value);
            }
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "category" => self.category = Some(format!("{:?}", value).trim_matches('"').to_string()),
            "message" => self.message = format!("{:?}", value),
            name => {
                let _ = write!(self.fields, " {}={:?}", name, value);
            }
        }
    }
}

/// Captures WARN and ERROR events that carry a `category` field.
pub struct DiagnosticsLayer {
    diagnostics: Diagnostics,
}

impl<S: Subscriber> Layer<S> for DiagnosticsLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > Level::WARN || metadata.fields().field("category").is_none() {
            return;
        }
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        let category = visitor.category.unwrap_or_else(|| SYSTEM.to_string());
        self.diagnostics
            .record(&category, format!("{}{}", visitor.message, visitor.fields));
    }
}

/// Whether an event belongs to the diagnostics summary rather than the
/// console.
pub fn is_diagnostic(metadata: &tracing::Metadata<'_>) -> bool {
    metadata.fields().field("category").is_some() && *metadata.level() <= Level::WARN
}

#[cfg(test)]
mod tests {
    use tracing::{info, warn};
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;

    #[test]
    fn single_message_printed_in_full() {
        let diagnostics = Diagnostics::new();
        let long = "x".repeat(100);
        diagnostics.record(PARSER, long.clone());
        let summary = diagnostics.render_summary().unwrap();
        assert!(summary.contains(&format!("Parser warnings: {}", long)));
    }

    #[test]
    fn many_messages_are_truncated_and_counted() {
        let diagnostics = Diagnostics::new();
        for i in 0..5 {
            diagnostics.record(VALIDATION, format!("{:0>70}", i));
        }
        diagnostics.record(SYSTEM, "low memory");
        let summary = diagnostics.render_summary().unwrap();
        assert!(summary.contains("Validation issues: 5 messages"));
        assert!(summary.contains(&format!("    - {}...", "0".repeat(60))));
        assert!(summary.contains("... and 2 more"));
        assert!(summary.contains("System messages: low memory"));
    }

    #[test]
    fn rendering_clears_the_collector() {
        let diagnostics = Diagnostics::new();
        assert!(diagnostics.render_summary().is_none());
        diagnostics.record(EMBEDDING, "retry");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics.render_summary().is_some());
        assert!(diagnostics.is_empty());
        assert!(diagnostics.render_summary().is_none());
    }

    #[test]
    fn layer_captures_categorised_warnings_only() {
        let diagnostics = Diagnostics::new();
        let subscriber = tracing_subscriber::registry().with(diagnostics.layer());
        tracing::subscriber::with_default(subscriber, || {
            warn!(category = VALIDATION, file = "a.ttf", "font rejected");
            warn!("plain warning");
            info!(category = VALIDATION, "informational");
        });
        assert_eq!(diagnostics.len(), 1);
        let summary = diagnostics.render_summary().unwrap();
        assert!(summary.contains("Validation issues: font rejected file=a.ttf"));
    }
}
