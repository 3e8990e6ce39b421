use std::{fmt, sync::Arc};

use chrono::Timelike as _;
use serde::Serialize;

use crate::{
    error::EncodeError,
    record::OutputRecord,
    serde::{EncodableRecord, EncodeContext, LineFormatter, Separators},
    value::Value,
};

/// Turns values the encoder cannot represent (dates, opaque Rust values) into ones it can.
pub type DefaultStrategy = Arc<dyn Fn(&Value) -> Result<Value, EncodeError> + Send + Sync>;

/// Message of the line written in place of a record that could not be encoded.
pub const FALLBACK_MESSAGE: &str = "Unable to serialise value for logging";

/// Last resort if even the fallback record cannot be encoded.
const FALLBACK_LINE: &str =
    "{\"message\": \"Unable to serialise value for logging\", \"log_record\": null, \"exception\": null}";

/// Options an [`Encoder`] receives for every record.
pub struct EncodeOptions<'a> {
    pub default: &'a (dyn Fn(&Value) -> Result<Value, EncodeError> + Send + Sync),
    pub ensure_ascii: bool,
}

/// The serialization engine used by [`JsonRenderer`].
///
/// Implementations append exactly one JSON document, without a line terminator, to `out`. They
/// must pass every value that is not natively representable through `options.default`.
pub trait Encoder: Send + Sync {
    fn encode(
        &self,
        record: &OutputRecord,
        options: &EncodeOptions<'_>,
        out: &mut Vec<u8>,
    ) -> Result<(), EncodeError>;
}

/// The built-in encoder, a [`serde_json::Serializer`] with configurable separators.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder {
    separators: Separators,
}

impl JsonEncoder {
    pub fn new(separators: Separators) -> Self {
        Self { separators }
    }
}

impl Encoder for JsonEncoder {
    fn encode(
        &self,
        record: &OutputRecord,
        options: &EncodeOptions<'_>,
        out: &mut Vec<u8>,
    ) -> Result<(), EncodeError> {
        let context = EncodeContext::new(options.default);
        let formatter = LineFormatter::new(self.separators, options.ensure_ascii);
        let mut serializer = serde_json::Serializer::with_formatter(&mut *out, formatter);
        EncodableRecord::new(record, &context)
            .serialize(&mut serializer)
            .map_err(|error| context.take_error().unwrap_or_else(|| error.into()))
    }
}

/// The standard default-value strategy: ISO-8601 text for dates and times, an error for anything
/// else.
///
/// Dates become `YYYY-MM-DD`, date-times `YYYY-MM-DDTHH:MM:SS` with `.ffffff` only when there are
/// sub-second digits, and offset-aware timestamps get a `+HH:MM` suffix.
pub fn iso_dates(value: &Value) -> Result<Value, EncodeError> {
    const TIME: &str = "%H:%M:%S";
    const TIME_MICROS: &str = "%H:%M:%S%.6f";

    let text = match value {
        Value::Date(date) => date.format("%Y-%m-%d").to_string(),
        Value::Time(time) => {
            let format = if time.nanosecond() / 1000 == 0 { TIME } else { TIME_MICROS };
            time.format(format).to_string()
        },
        Value::DateTime(datetime) => {
            let format = if datetime.nanosecond() / 1000 == 0 {
                "%Y-%m-%dT%H:%M:%S"
            } else {
                "%Y-%m-%dT%H:%M:%S%.6f"
            };
            datetime.format(format).to_string()
        },
        Value::Timestamp(timestamp) => {
            let format = if timestamp.nanosecond() / 1000 == 0 {
                "%Y-%m-%dT%H:%M:%S%:z"
            } else {
                "%Y-%m-%dT%H:%M:%S%.6f%:z"
            };
            timestamp.format(format).to_string()
        },
        other => return Err(EncodeError::Unserializable(other.type_name().to_owned())),
    };
    Ok(Value::String(text))
}

/// Serializes [`OutputRecord`]s into single JSON lines.
///
/// Rendering cannot fail: when the record cannot be encoded, a fallback document is written
/// instead, holding [`FALLBACK_MESSAGE`], a text dump of the record and the error.
#[derive(Clone)]
pub struct JsonRenderer {
    encoder: Arc<dyn Encoder>,
    default: Option<DefaultStrategy>,
    ensure_ascii: bool,
}

impl Default for JsonRenderer {
    fn default() -> Self {
        Self {
            encoder: Arc::new(JsonEncoder::default()),
            default: None,
            ensure_ascii: true,
        }
    }
}

impl fmt::Debug for JsonRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRenderer")
            .field("custom_default", &self.default.is_some())
            .field("ensure_ascii", &self.ensure_ascii)
            .finish_non_exhaustive()
    }
}

impl JsonRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the serialization engine.
    pub fn with_encoder(&mut self, encoder: impl Encoder + 'static) -> &mut Self {
        self.encoder = Arc::new(encoder);
        self
    }

    /// Sets the strategy for values the encoder cannot represent. It replaces [`iso_dates`]
    /// entirely, so it has to handle dates too if they should still be written.
    pub fn with_default_strategy<F>(&mut self, strategy: F) -> &mut Self
    where
        F: Fn(&Value) -> Result<Value, EncodeError> + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(strategy));
        self
    }

    /// Whether non-ASCII characters are written as `\uXXXX` escapes. Defaults to `true`.
    pub fn with_ensure_ascii(&mut self, ensure_ascii: bool) -> &mut Self {
        self.ensure_ascii = ensure_ascii;
        self
    }

    fn options(&self) -> EncodeOptions<'_> {
        EncodeOptions {
            default: self.default.as_deref().unwrap_or(&iso_dates),
            ensure_ascii: self.ensure_ascii,
        }
    }

    /// Encodes `record` without any fallback and without the line terminator.
    pub fn try_render(&self, record: &OutputRecord) -> Result<String, EncodeError> {
        let mut out = Vec::new();
        self.encoder.encode(record, &self.options(), &mut out)?;
        Ok(into_string(out))
    }

    /// Encodes `record` as one line, terminator included.
    pub fn render(&self, record: &OutputRecord) -> String {
        let mut out = Vec::new();
        self.render_into(record, &mut out);
        into_string(out)
    }

    /// Appends the line for `record` to `out`.
    pub fn render_into(&self, record: &OutputRecord, out: &mut Vec<u8>) {
        let start = out.len();
        if let Err(error) = self.encoder.encode(record, &self.options(), out) {
            out.truncate(start);
            self.render_fallback(record, &error, out);
        }
        out.push(b'\n');
    }

    fn render_fallback(&self, record: &OutputRecord, error: &EncodeError, out: &mut Vec<u8>) {
        let start = out.len();
        let fallback: OutputRecord = [
            ("message", Value::from(FALLBACK_MESSAGE)),
            ("log_record", Value::from(record.repr())),
            ("exception", Value::from(error.describe())),
        ]
        .into_iter()
        .collect();

        if self.encoder.encode(&fallback, &self.options(), out).is_ok() {
            return;
        }
        out.truncate(start);
        if JsonEncoder::default()
            .encode(&fallback, &self.options(), out)
            .is_err()
        {
            out.truncate(start);
            out.extend_from_slice(FALLBACK_LINE.as_bytes());
        }
    }
}

fn into_string(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|error| String::from_utf8_lossy(error.as_bytes()).into_owned())
}
