use std::backtrace::Backtrace;

use tracing::{Event, Metadata, Subscriber};
#[cfg(feature = "tracing-log")]
use tracing_log::NormalizeEvent;
use tracing_subscriber::{layer::Context, registry::LookupSpan};

use crate::{
    layer::JsonLayer,
    level::Severity,
    record::{LogEvent, Message},
    value::Value,
    visitor::{EventFields, FieldVisitor, SpanFields},
};

impl<S, W> JsonLayer<S, W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    /// Collects everything known about `event` into a [`LogEvent`].
    pub(crate) fn log_event(&self, ctx: &Context<'_, S>, event: &Event<'_>) -> LogEvent {
        #[cfg(feature = "tracing-log")]
        let normalized = event.normalized_metadata();
        #[cfg(feature = "tracing-log")]
        let metadata = normalized.as_ref().unwrap_or_else(|| event.metadata());
        #[cfg(not(feature = "tracing-log"))]
        let metadata = event.metadata();

        let mut fields = EventFields::default();
        event.record(&mut FieldVisitor::new(&mut fields, &self.map_field));

        let message = match fields.map {
            Some(entries) => {
                // the text message fills the slot a mapping leaves empty
                if let Some(text) = fields.message.take() {
                    fields.extra.insert(0, ("message".to_owned(), Value::from(text)));
                }
                Message::Map(entries)
            },
            None => Message::Text(fields.message.unwrap_or_default()),
        };

        let severity = Severity::from(metadata.level());
        let mut log_event = LogEvent::new(severity, metadata.target(), message);
        set_location(&mut log_event, metadata);
        log_event.extra = fields.extra;
        log_event.exc_info = fields.exc_info;
        if fields.stack_info {
            log_event.stack_info = Some(Backtrace::force_capture().to_string());
        }

        if self.span_fields {
            if let Some(scope) = ctx.event_scope(event) {
                for span in scope {
                    let extensions = span.extensions();
                    let Some(SpanFields(span_fields)) = extensions.get::<SpanFields>() else {
                        continue;
                    };
                    for (key, value) in span_fields {
                        if !log_event.extra.iter().any(|(k, _)| k == key) {
                            log_event.extra.push((key.clone(), value.clone()));
                        }
                    }
                }
            }
        }

        log_event
    }
}

fn set_location(log_event: &mut LogEvent, metadata: &Metadata<'_>) {
    log_event.pathname = metadata.file().map(ToOwned::to_owned);
    log_event.line = metadata.line();
    log_event.module_path = metadata.module_path().map(ToOwned::to_owned);
}
