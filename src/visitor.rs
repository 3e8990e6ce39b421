use std::{error::Error, fmt};

use tracing_core::field;

use crate::{record::Key, value::Value};

/// Fields of one event or span, sorted into what a [`LogEvent`](crate::LogEvent) is made of.
#[derive(Debug, Default)]
pub(crate) struct EventFields {
    pub(crate) message: Option<String>,
    pub(crate) map: Option<Vec<(Key, Value)>>,
    pub(crate) extra: Vec<(String, Value)>,
    pub(crate) exc_info: Option<String>,
    pub(crate) stack_info: bool,
}

impl EventFields {
    fn set_extra(&mut self, key: &str, value: Value) {
        match self.extra.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => self.extra.push((key.to_owned(), value)),
        }
    }
}

/// Span fields kept in the span's extensions until an event inside it is logged.
#[derive(Debug, Default)]
pub(crate) struct SpanFields(pub(crate) Vec<(String, Value)>);

/// The [visitor] collecting the fields of events and spans.
///
/// `message` is the text of the event, the field named `map_field` holds a JSON object logged as
/// a mapping message, errors become `exc_info` and `stack_info = true` asks for a backtrace.
///
/// [visitor]: tracing_subscriber::field::Visit
pub(crate) struct FieldVisitor<'a> {
    fields: &'a mut EventFields,
    map_field: &'a str,
}

impl<'a> FieldVisitor<'a> {
    pub(crate) fn new(fields: &'a mut EventFields, map_field: &'a str) -> Self {
        Self { fields, map_field }
    }

    fn record_value(&mut self, field: &field::Field, value: Value) {
        match field.name() {
            #[cfg(feature = "tracing-log")]
            name if name.starts_with("log.") => (),
            "stack_info" if matches!(value, Value::Bool(_)) => {
                self.fields.stack_info = matches!(value, Value::Bool(true));
            },
            name => self.fields.set_extra(name.strip_prefix("r#").unwrap_or(name), value),
        }
    }

    fn record_text(&mut self, field: &field::Field, text: String) {
        let name = field.name();
        if name == "message" {
            self.fields.message = Some(text);
        } else if name == self.map_field {
            match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(entries)) => {
                    let entries = entries
                        .into_iter()
                        .map(|(key, value)| (Key::from(key), value))
                        .collect();
                    self.fields.map = Some(entries);
                },
                _ => self.record_value(field, Value::from(text)),
            }
        } else {
            self.record_value(field, Value::from(text));
        }
    }
}

impl field::Visit for FieldVisitor<'_> {
    fn record_f64(&mut self, field: &field::Field, value: f64) {
        self.record_value(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &field::Field, value: i64) {
        self.record_value(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &field::Field, value: u64) {
        self.record_value(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &field::Field, value: bool) {
        self.record_value(field, Value::from(value));
    }

    fn record_str(&mut self, field: &field::Field, value: &str) {
        self.record_text(field, value.to_owned());
    }

    fn record_error(&mut self, _field: &field::Field, value: &(dyn Error + 'static)) {
        let mut text = value.to_string();
        let mut source = value.source();
        while let Some(cause) = source {
            text.push_str("\nCaused by: ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        self.fields.exc_info.get_or_insert(text);
    }

    fn record_debug(&mut self, field: &field::Field, value: &dyn fmt::Debug) {
        self.record_text(field, format!("{value:?}"));
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, fmt};

    use tracing::{span, subscriber::with_default, Subscriber};

    use super::{EventFields, FieldVisitor};
    use crate::value::Value;

    /// Runs the visitor over the fields of every event it sees.
    struct Capture(std::sync::Mutex<Vec<EventFields>>);

    impl Subscriber for Capture {
        fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, _: &span::Attributes<'_>) -> span::Id {
            span::Id::from_u64(1)
        }

        fn record(&self, _: &span::Id, _: &span::Record<'_>) {}

        fn record_follows_from(&self, _: &span::Id, _: &span::Id) {}

        fn event(&self, event: &tracing::Event<'_>) {
            let mut fields = EventFields::default();
            event.record(&mut FieldVisitor::new(&mut fields, "json"));
            self.0.lock().unwrap().push(fields);
        }

        fn enter(&self, _: &span::Id) {}

        fn exit(&self, _: &span::Id) {}
    }

    fn capture(f: impl FnOnce()) -> EventFields {
        let subscriber = std::sync::Arc::new(Capture(Default::default()));
        with_default(subscriber.clone(), f);
        let mut events = std::mem::take(&mut *subscriber.0.lock().unwrap());
        assert_eq!(events.len(), 1);
        events.remove(0)
    }

    #[derive(Debug)]
    struct Outer(Inner);

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("request failed")
        }
    }

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("connection reset")
        }
    }

    impl Error for Outer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    impl Error for Inner {}

    #[test]
    fn message_and_extra() {
        let fields = capture(|| {
            tracing::info!(r#type = "cart", count = 3_u64, ratio = 0.5, ok = true, "a {} b", 1);
        });
        assert_eq!(fields.message.as_deref(), Some("a 1 b"));
        let keys = fields.extra.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, ["type", "count", "ratio", "ok"]);
        assert!(matches!(fields.extra[1].1, Value::U64(3)));
    }

    #[test]
    fn json_field_becomes_mapping() {
        let fields = capture(|| {
            tracing::info!(json = r#"{"text": "testing", "num": 1}"#);
        });
        let map = fields.map.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[0].0.clone().into_string(), "text");
        assert!(fields.extra.is_empty());
    }

    #[test]
    fn json_field_that_is_no_object_stays_extra() {
        let fields = capture(|| {
            tracing::info!(json = "[1, 2]", "hi");
        });
        assert!(fields.map.is_none());
        assert_eq!(fields.extra[0].1.as_str(), Some("[1, 2]"));
    }

    #[test]
    fn errors_become_exc_info() {
        let error = Outer(Inner);
        let fields = capture(|| {
            tracing::error!(error = &error as &(dyn Error + 'static), "boom");
        });
        assert_eq!(
            fields.exc_info.as_deref(),
            Some("request failed\nCaused by: connection reset"),
        );
    }

    #[test]
    fn stack_info_flag() {
        let fields = capture(|| tracing::warn!(stack_info = true, "where am i"));
        assert!(fields.stack_info);
        assert!(fields.extra.is_empty());
    }
}
