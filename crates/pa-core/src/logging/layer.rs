//! Custom tracing layer for JSONL output.
//!
//! This layer produces machine-parseable JSONL logs on stderr while
//! keeping stdout clean for command payloads.

use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Utc;
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::Level;
use super::redact_for_log;

/// Longest string field written verbatim.
const MAX_FIELD_LEN: usize = 256;

/// Placeholder for fields that may hold target environment contents.
const REDACTED: &str = "[redacted]";

/// Storage for span context data.
#[derive(Debug, Clone, Default)]
struct SpanContext {
    run_id: Option<String>,
    host_id: Option<String>,
    stage: Option<String>,
    pid: Option<u32>,
}

/// Whether a field may carry another process's environment.
fn is_sensitive_field(name: &str) -> bool {
    matches!(name, "env" | "environ" | "env_value" | "value" | "entry")
}

fn sanitize(name: &str, value: &str) -> String {
    if is_sensitive_field(name) {
        REDACTED.to_string()
    } else {
        redact_for_log(value, MAX_FIELD_LEN)
    }
}

/// A visitor that extracts field values from tracing events.
struct JsonFieldVisitor {
    fields: serde_json::Map<String, serde_json::Value>,
    message: Option<String>,
}

impl JsonFieldVisitor {
    fn new() -> Self {
        JsonFieldVisitor {
            fields: serde_json::Map::new(),
            message: None,
        }
    }

    fn record_string(&mut self, name: &str, value: &str) {
        if name == "message" {
            self.message = Some(redact_for_log(value, MAX_FIELD_LEN));
        } else {
            self.fields.insert(
                name.to_string(),
                serde_json::Value::String(sanitize(name, value)),
            );
        }
    }
}

impl tracing::field::Visit for JsonFieldVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.record_string(field.name(), value);
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.record_string(field.name(), &format!("{:?}", value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.insert(
            field.name().to_string(),
            serde_json::Value::Number(value.into()),
        );
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.insert(
            field.name().to_string(),
            serde_json::Value::Number(serde_json::Number::from(value)),
        );
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.fields
                .insert(field.name().to_string(), serde_json::Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Bool(value));
    }
}

/// A visitor for extracting span context.
struct SpanContextVisitor {
    context: SpanContext,
}

impl tracing::field::Visit for SpanContextVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "run_id" => self.context.run_id = Some(value.to_string()),
            "host_id" => self.context.host_id = Some(value.to_string()),
            "stage" => self.context.stage = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "run_id" => self.context.run_id = Some(format!("{:?}", value)),
            "host_id" => self.context.host_id = Some(format!("{:?}", value)),
            "stage" => self.context.stage = Some(format!("{:?}", value)),
            _ => {}
        }
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        if field.name() == "pid" {
            self.context.pid = u32::try_from(value).ok();
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        if field.name() == "pid" {
            self.context.pid = u32::try_from(value).ok();
        }
    }
}

/// JSONL tracing layer that outputs to stderr.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    /// Create a new JSONL layer writing to stderr.
    pub fn stderr() -> Self {
        JsonlLayer {
            writer: Mutex::new(io::stderr()),
        }
    }
}

impl<W: Write> JsonlLayer<W> {
    /// Create a new JSONL layer with a custom writer.
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = SpanContextVisitor {
            context: SpanContext::default(),
        };
        attrs.record(&mut visitor);

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(visitor.context);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let ts = Utc::now();

        // Innermost span wins for each field
        let mut span_ctx = SpanContext::default();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(found) = span.extensions().get::<SpanContext>() {
                    if span_ctx.run_id.is_none() {
                        span_ctx.run_id.clone_from(&found.run_id);
                    }
                    if span_ctx.host_id.is_none() {
                        span_ctx.host_id.clone_from(&found.host_id);
                    }
                    if span_ctx.stage.is_none() {
                        span_ctx.stage.clone_from(&found.stage);
                    }
                    if span_ctx.pid.is_none() {
                        span_ctx.pid = found.pid;
                    }
                }
            }
        }

        let mut visitor = JsonFieldVisitor::new();
        event.record(&mut visitor);

        let level: Level = (*event.metadata().level()).into();
        let mut obj = serde_json::Map::new();

        obj.insert("ts".to_string(), serde_json::json!(ts.to_rfc3339()));
        obj.insert("level".to_string(), serde_json::json!(level));
        obj.insert(
            "event".to_string(),
            serde_json::json!(event.metadata().target()),
        );

        if let Some(id) = span_ctx.run_id {
            obj.insert("run_id".to_string(), serde_json::json!(id));
        }
        if let Some(id) = span_ctx.host_id {
            obj.insert("host_id".to_string(), serde_json::json!(id));
        }
        // Event-level fields override span context
        if let Some(stage) = visitor.fields.remove("stage") {
            obj.insert("stage".to_string(), stage);
        } else if let Some(s) = span_ctx.stage {
            obj.insert("stage".to_string(), serde_json::json!(s));
        }
        if let Some(pid) = visitor.fields.remove("pid") {
            obj.insert("pid".to_string(), pid);
        } else if let Some(p) = span_ctx.pid {
            obj.insert("pid".to_string(), serde_json::json!(p));
        }
        if let Some(msg) = visitor.message {
            obj.insert("message".to_string(), serde_json::json!(msg));
        }

        if !visitor.fields.is_empty() {
            obj.insert(
                "fields".to_string(),
                serde_json::Value::Object(visitor.fields),
            );
        }

        let json = serde_json::to_string(&serde_json::Value::Object(obj)).unwrap_or_default();
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    struct BufWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for BufWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture<F: FnOnce()>(f: F) -> serde_json::Value {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let layer = JsonlLayer::new(BufWriter(buffer.clone()));
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, f);

        let output = buffer.lock().unwrap();
        let line = String::from_utf8_lossy(&output);
        serde_json::from_str(line.trim()).unwrap()
    }

    #[test]
    fn test_jsonl_layer_output() {
        let parsed = capture(|| {
            tracing::info!(target: "test.event", message = "test message");
        });
        assert_eq!(parsed["level"], "info");
        assert_eq!(parsed["event"], "test.event");
        assert_eq!(parsed["message"], "test message");
        assert!(parsed["ts"].is_string());
    }

    #[test]
    fn test_extra_fields_are_nested() {
        let parsed = capture(|| {
            tracing::warn!(target: "test.fields", count = 42, capped = true, message = "hi");
        });
        assert_eq!(parsed["level"], "warn");
        assert_eq!(parsed["fields"]["count"], 42);
        assert_eq!(parsed["fields"]["capped"], true);
    }

    #[test]
    fn test_pid_and_stage_are_promoted() {
        let parsed = capture(|| {
            tracing::info!(target: "test.pid", pid = 77u32, stage = "walk", message = "m");
        });
        assert_eq!(parsed["pid"], 77);
        assert_eq!(parsed["stage"], "walk");
        assert!(parsed.get("fields").is_none());
    }

    #[test]
    fn test_span_context_is_attached() {
        let parsed = capture(|| {
            let span = tracing::info_span!("run", run_id = "run-abc", host_id = "host-1", pid = 9u32);
            let _guard = span.enter();
            tracing::info!(target: "test.span", message = "inside");
        });
        assert_eq!(parsed["run_id"], "run-abc");
        assert_eq!(parsed["host_id"], "host-1");
        assert_eq!(parsed["pid"], 9);
    }

    #[test]
    fn test_environment_values_are_redacted() {
        let parsed = capture(|| {
            tracing::debug!(target: "test.env", env_value = "SECRET=hunter2", message = "m");
        });
        assert_eq!(parsed["fields"]["env_value"], REDACTED);
    }

    #[test]
    fn test_long_strings_are_truncated() {
        let long = "x".repeat(MAX_FIELD_LEN * 2);
        let parsed = capture(|| {
            tracing::info!(target: "test.long", detail = %long, message = "m");
        });
        let detail = parsed["fields"]["detail"].as_str().unwrap();
        assert!(detail.len() < long.len());
        assert!(detail.ends_with("...(truncated)"));
    }

    #[test]
    fn test_sensitive_field_names() {
        assert!(is_sensitive_field("env"));
        assert!(is_sensitive_field("env_value"));
        assert!(!is_sensitive_field("pid"));
        assert!(!is_sensitive_field("address"));
    }
}
