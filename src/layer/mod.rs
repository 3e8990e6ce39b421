use std::{cell::RefCell, io};

use tracing_core::{
    span::{Attributes, Id, Record},
    Event,
    Subscriber,
};
use tracing_subscriber::{
    fmt::{MakeWriter, TestWriter},
    layer::Context,
    registry::LookupSpan,
    Layer,
    Registry,
};

mod event;

use crate::{
    formatter::JsonFormatter,
    projector::FieldProjector,
    renderer::JsonRenderer,
    visitor::{EventFields, FieldVisitor, SpanFields},
};

/// Name of the field carrying a mapping message, see [`JsonLayer::with_map_field`].
pub const DEFAULT_MAP_FIELD: &str = "json";

/// Layer writing every event as one line of JSON to a configured output.
///
/// Each event is turned into a [`LogEvent`](crate::LogEvent) and handed to the layer's
/// [`JsonFormatter`]. The event target is the logger name, the `message` field the message, and
/// every other field of the event (and of the spans it is in) extra context.
///
/// ```rust
/// # use tracing_subscriber::prelude::*;
/// let layer = json_logging::JsonLayer::stdout();
/// # tracing_subscriber::registry().with(layer);
/// ```
pub struct JsonLayer<S: for<'lookup> LookupSpan<'lookup> = Registry, W = fn() -> io::Stdout> {
    make_writer: W,
    log_internal_errors: bool,
    formatter: JsonFormatter,
    map_field: String,
    span_fields: bool,
    _inner: std::marker::PhantomData<fn(S)>,
}

impl<S, W> Layer<S> for JsonLayer<S, W>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            if self.log_internal_errors {
                eprintln!("[json-logging] Span not found, this is a bug.");
            }
            return;
        };

        let mut extensions = span.extensions_mut();

        if extensions.get_mut::<SpanFields>().is_none() {
            let mut fields = EventFields::default();
            attrs.record(&mut FieldVisitor::new(&mut fields, &self.map_field));
            extensions.insert(SpanFields(fields.extra));
        } else if self.log_internal_errors {
            eprintln!("[json-logging] Span fields were already recorded, ignoring: {attrs:?}");
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            if self.log_internal_errors {
                eprintln!("[json-logging] Span not found, this is a bug.");
            }
            return;
        };

        let mut extensions = span.extensions_mut();
        let Some(SpanFields(span_fields)) = extensions.get_mut::<SpanFields>() else {
            if self.log_internal_errors {
                eprintln!(
                    "[json-logging] Span was created but does not contain recorded fields, this \
                     is a bug and some fields may have been lost."
                );
            }
            return;
        };

        let mut fields = EventFields::default();
        values.record(&mut FieldVisitor::new(&mut fields, &self.map_field));
        for (key, value) in fields.extra {
            match span_fields.iter_mut().find(|(k, _)| *k == key) {
                Some((_, slot)) => *slot = value,
                None => span_fields.push((key, value)),
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        thread_local! {
            static BUF: RefCell<Vec<u8>> = const { RefCell::new(Vec::new()) };
        }

        let log_event = self.log_event(&ctx, event);

        BUF.with(|buf| {
            let borrow = buf.try_borrow_mut();
            let mut a;
            let mut b;
            let buf = if let Ok(buf) = borrow {
                a = buf;
                &mut *a
            } else {
                b = Vec::new();
                &mut b
            };

            self.formatter.format_into(&log_event, buf);

            let mut writer = self.make_writer.make_writer_for(event.metadata());
            let res = io::Write::write_all(&mut writer, buf);
            if self.log_internal_errors {
                if let Err(e) = res {
                    eprintln!(
                        "[json-logging] Unable to write an event to the Writer for this \
                         Subscriber! Error: {e}\n",
                    );
                }
            }

            buf.clear();
        });
    }
}

impl<S> JsonLayer<S>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    /// Creates a [`JsonLayer`] with the default formatter which will output logs to stdout.
    pub fn stdout() -> JsonLayer<S, fn() -> io::Stdout> {
        JsonLayer::new(io::stdout)
    }

    /// Creates a [`JsonLayer`] with the default formatter which will output logs to stderr.
    pub fn stderr() -> JsonLayer<S, fn() -> io::Stderr> {
        JsonLayer::new(io::stderr)
    }

    /// Creates a [`JsonLayer`] with the default formatter which will output logs to the configured
    /// [`Writer`](io::Write).
    pub fn new<W>(make_writer: W) -> JsonLayer<S, W>
    where
        W: for<'writer> MakeWriter<'writer> + 'static,
    {
        JsonLayer::<S, W> {
            make_writer,
            log_internal_errors: false,
            formatter: JsonFormatter::default(),
            map_field: DEFAULT_MAP_FIELD.to_owned(),
            span_fields: true,
            _inner: std::marker::PhantomData,
        }
    }
}

impl<S, W> JsonLayer<S, W>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    /// Sets the [`MakeWriter`] that the [`JsonLayer`] being built will use to write events.
    ///
    /// # Examples
    ///
    /// Using `stderr` rather than `stdout`:
    ///
    /// ```rust
    /// # use tracing_subscriber::prelude::*;
    /// let layer = json_logging::JsonLayer::stdout()
    ///     .with_writer(std::io::stderr);
    /// # tracing_subscriber::registry().with(layer);
    /// ```
    pub fn with_writer<W2>(self, make_writer: W2) -> JsonLayer<S, W2>
    where
        W2: for<'writer> MakeWriter<'writer> + 'static,
    {
        JsonLayer {
            make_writer,
            log_internal_errors: self.log_internal_errors,
            formatter: self.formatter,
            map_field: self.map_field,
            span_fields: self.span_fields,
            _inner: self._inner,
        }
    }

    /// Borrows the [writer] for this layer.
    ///
    /// [writer]: MakeWriter
    pub fn writer(&self) -> &W {
        &self.make_writer
    }

    /// Mutably borrows the [writer] for this layer.
    ///
    /// This method is primarily expected to be used with the
    /// [`reload::Handle::modify`](tracing_subscriber::reload::Handle::modify) method.
    ///
    /// [writer]: MakeWriter
    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.make_writer
    }

    /// Configures the layer to support [`libtest`'s output capturing][capturing] when used in
    /// unit tests.
    ///
    /// See [`TestWriter`] for additional details.
    ///
    /// [capturing]:
    /// https://doc.rust-lang.org/book/ch11-02-running-tests.html#showing-function-output
    pub fn with_test_writer(self) -> JsonLayer<S, TestWriter> {
        self.with_writer(TestWriter::default())
    }

    /// Sets whether failures to write a line are reported on stderr. Defaults to false.
    ///
    /// Formatting itself never fails, records that cannot be encoded are replaced by a fallback
    /// line.
    pub fn log_internal_errors(&mut self, log_internal_errors: bool) -> &mut Self {
        self.log_internal_errors = log_internal_errors;
        self
    }

    /// Updates the [`MakeWriter`] by applying a function to the existing [`MakeWriter`].
    ///
    /// # Examples
    ///
    /// Redirect output to stderr if level is <= WARN:
    ///
    /// ```rust
    /// # use tracing_subscriber::prelude::*;
    /// use tracing_subscriber::fmt::writer::MakeWriterExt;
    ///
    /// let stderr = std::io::stderr.with_max_level(tracing::Level::WARN);
    /// let layer = json_logging::JsonLayer::stdout()
    ///     .map_writer(move |w| stderr.or_else(w));
    /// # tracing_subscriber::registry().with(layer);
    /// ```
    pub fn map_writer<W2>(self, f: impl FnOnce(W) -> W2) -> JsonLayer<S, W2>
    where
        W2: for<'writer> MakeWriter<'writer> + 'static,
    {
        JsonLayer {
            make_writer: f(self.make_writer),
            log_internal_errors: self.log_internal_errors,
            formatter: self.formatter,
            map_field: self.map_field,
            span_fields: self.span_fields,
            _inner: self._inner,
        }
    }

    /// Replaces the formatter turning events into lines.
    pub fn with_formatter(&mut self, formatter: JsonFormatter) -> &mut Self {
        self.formatter = formatter;
        self
    }

    pub fn formatter(&self) -> &JsonFormatter {
        &self.formatter
    }

    pub fn formatter_mut(&mut self) -> &mut JsonFormatter {
        &mut self.formatter
    }

    /// Shorthand for the formatter's [`FieldProjector`].
    pub fn projector_mut(&mut self) -> &mut FieldProjector {
        self.formatter.projector_mut()
    }

    /// Shorthand for the formatter's [`JsonRenderer`].
    pub fn renderer_mut(&mut self) -> &mut JsonRenderer {
        self.formatter.renderer_mut()
    }

    /// Sets the name of the field whose JSON object text is logged as a mapping message.
    ///
    /// ```rust
    /// # use tracing_subscriber::prelude::*;
    /// # let layer = json_logging::JsonLayer::stdout();
    /// # let _guard = tracing_subscriber::registry().with(layer).set_default();
    /// tracing::info!(json = %serde_json::json!({"user": "ada", "cart": 3}));
    /// ```
    pub fn with_map_field(&mut self, name: impl Into<String>) -> &mut Self {
        self.map_field = name.into();
        self
    }

    /// Sets whether the fields of the spans an event is in are added as extra context. Defaults to
    /// true. Fields of the event itself and of inner spans take precedence.
    pub fn with_span_fields(&mut self, span_fields: bool) -> &mut Self {
        self.span_fields = span_fields;
        self
    }
}
