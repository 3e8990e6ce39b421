use crate::{
    projector::FieldProjector,
    record::{LogEvent, OutputRecord},
    renderer::JsonRenderer,
};

/// Turns a [`LogEvent`] into one line of JSON.
///
/// This is the projector and the renderer glued together. Formatting never fails, see
/// [`JsonRenderer`] for what is written when a record cannot be encoded.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    projector: FieldProjector,
    renderer: JsonRenderer,
}

impl JsonFormatter {
    pub fn new(projector: FieldProjector, renderer: JsonRenderer) -> Self {
        Self {
            projector,
            renderer,
        }
    }

    /// Creates a formatter writing the standard fields named in `format`.
    pub fn with_format(format: &str) -> Self {
        Self::new(FieldProjector::with_format(format), JsonRenderer::default())
    }

    /// Adds `Module` (the logger name) and `Severity` (the level name) to every record.
    #[must_use]
    pub fn with_module_and_severity(mut self) -> Self {
        self.projector.add_processor(|mut record, event| {
            record.insert("Module", event.logger_name.as_str());
            record.insert("Severity", event.severity.name());
            record
        });
        self
    }

    pub fn projector(&self) -> &FieldProjector {
        &self.projector
    }

    pub fn projector_mut(&mut self) -> &mut FieldProjector {
        &mut self.projector
    }

    pub fn renderer(&self) -> &JsonRenderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut JsonRenderer {
        &mut self.renderer
    }

    pub fn project(&self, event: &LogEvent) -> OutputRecord {
        self.projector.project(event)
    }

    /// The line for `event`, terminator included.
    pub fn format(&self, event: &LogEvent) -> String {
        self.renderer.render(&self.projector.project(event))
    }

    /// Appends the line for `event` to `out`.
    pub fn format_into(&self, event: &LogEvent, out: &mut Vec<u8>) {
        self.renderer.render_into(&self.projector.project(event), out);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::JsonFormatter;
    use crate::{
        level::Severity,
        record::{LogEvent, Message},
        renderer::FALLBACK_MESSAGE,
        value::{SharedValue, Value},
    };

    fn parse(line: &str) -> serde_json::Value {
        assert!(line.ends_with('\n'));
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn plain_message() {
        let event = LogEvent::new(Severity::Info, "logging-test", "testing logging format");
        let line = JsonFormatter::default().format(&event);
        assert_eq!(line, "{\"message\": \"testing logging format\"}\n");
    }

    #[test]
    fn module_and_severity() {
        let formatter = JsonFormatter::default().with_module_and_severity();
        let event = LogEvent::new(Severity::Warning, "elasticsearch", "slow");
        assert_eq!(
            parse(&formatter.format(&event)),
            json!({"message": "slow", "Module": "elasticsearch", "Severity": "WARNING"}),
        );
    }

    #[test]
    fn mapping_with_nested_values() {
        let message = Message::map([
            ("text", Value::from("testing logging")),
            ("num", Value::from(1)),
            ("nested", Value::from_iter([("more", "data")])),
        ]);
        let event = LogEvent::new(Severity::Info, "logging-test", message);
        assert_eq!(
            parse(&JsonFormatter::default().format(&event)),
            json!({"message": null, "text": "testing logging", "num": 1, "nested": {"more": "data"}}),
        );
    }

    #[test]
    fn circular_extra_falls_back() {
        let shared = SharedValue::new(Value::Null);
        shared.set(Value::from_iter([("self", shared.clone())]));
        let event = LogEvent::new(Severity::Info, "logging-test", "Here's a log")
            .with_extra("log_data", shared);

        let line = JsonFormatter::default().format(&event);
        let value = parse(&line);
        assert_eq!(value["message"], FALLBACK_MESSAGE);
        assert_eq!(value["exception"], "CircularReference: Circular reference detected");
        assert_eq!(
            value["log_record"],
            r#"{"message": "Here's a log", "log_data": {"self": {...}}}"#,
        );
    }

    #[test]
    fn format_into_appends() {
        let event = LogEvent::new(Severity::Info, "logging-test", "a");
        let formatter = JsonFormatter::default();
        let mut out = Vec::new();
        formatter.format_into(&event, &mut out);
        formatter.format_into(&event, &mut out);
        assert_eq!(out, b"{\"message\": \"a\"}\n{\"message\": \"a\"}\n");
    }

    #[test]
    fn shared_across_threads() {
        const THREADS: usize = 8;
        const EVENTS: usize = 50;

        let formatter = Arc::new(JsonFormatter::default().with_module_and_severity());
        let out = Arc::new(Mutex::new(Vec::new()));
        let handles = (0..THREADS)
            .map(|thread| {
                let formatter = Arc::clone(&formatter);
                let out = Arc::clone(&out);
                std::thread::spawn(move || {
                    for n in 0..EVENTS {
                        let event = LogEvent::new(Severity::Info, "worker", "tick")
                            .with_extra("thread", thread as u64)
                            .with_extra("n", n as u64);
                        let line = formatter.format(&event);
                        out.lock().unwrap().extend_from_slice(line.as_bytes());
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        let out = String::from_utf8(out.lock().unwrap().clone()).unwrap();
        let lines = out
            .lines()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(lines.len(), THREADS * EVENTS);
        assert!(lines
            .iter()
            .all(|line| line["message"] == "tick" && line["Module"] == "worker"));
    }
}
