use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::{record::LogEvent, value::Value};

/// A standard attribute of a [`LogEvent`] that a template can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardField {
    Asctime,
    Created,
    Filename,
    FuncName,
    Levelname,
    Levelno,
    Lineno,
    Module,
    Msecs,
    Message,
    Name,
    Pathname,
    Process,
    ProcessName,
    RelativeCreated,
    Thread,
    ThreadName,
    ExcInfo,
    StackInfo,
}

impl StandardField {
    pub const ALL: [Self; 19] = [
        Self::Asctime,
        Self::Created,
        Self::Filename,
        Self::FuncName,
        Self::Levelname,
        Self::Levelno,
        Self::Lineno,
        Self::Module,
        Self::Msecs,
        Self::Message,
        Self::Name,
        Self::Pathname,
        Self::Process,
        Self::ProcessName,
        Self::RelativeCreated,
        Self::Thread,
        Self::ThreadName,
        Self::ExcInfo,
        Self::StackInfo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Asctime => "asctime",
            Self::Created => "created",
            Self::Filename => "filename",
            Self::FuncName => "funcName",
            Self::Levelname => "levelname",
            Self::Levelno => "levelno",
            Self::Lineno => "lineno",
            Self::Module => "module",
            Self::Msecs => "msecs",
            Self::Message => "message",
            Self::Name => "name",
            Self::Pathname => "pathname",
            Self::Process => "process",
            Self::ProcessName => "processName",
            Self::RelativeCreated => "relativeCreated",
            Self::Thread => "thread",
            Self::ThreadName => "threadName",
            Self::ExcInfo => "exc_info",
            Self::StackInfo => "stack_info",
        }
    }

    /// Current value of this attribute. `started` is when the projector was built, for
    /// `relativeCreated`.
    pub(crate) fn extract(self, event: &LogEvent, started: DateTime<Utc>) -> Value {
        match self {
            Self::Asctime => {
                Value::from(event.timestamp.format("%Y-%m-%d %H:%M:%S,%3f").to_string())
            },
            Self::Created => Value::from(epoch_seconds(event.timestamp)),
            Self::Filename => Value::from(event.filename()),
            Self::FuncName => Value::from(event.function_name.clone()),
            Self::Levelname => Value::from(event.severity.name()),
            Self::Levelno => Value::from(event.severity.number()),
            Self::Lineno => Value::from(event.line),
            Self::Module => Value::from(event.module()),
            Self::Msecs => {
                Value::from(f64::from(event.timestamp.timestamp_subsec_micros()) / 1000.0)
            },
            Self::Message => Value::from(event.message.render()),
            Self::Name => Value::from(event.logger_name.as_str()),
            Self::Pathname => Value::from(event.pathname.clone()),
            Self::Process => Value::from(event.process_id),
            Self::ProcessName => Value::from(event.process_name.clone()),
            Self::RelativeCreated => {
                let elapsed = event.timestamp.signed_duration_since(started);
                Value::from(elapsed.num_microseconds().map_or(0.0, |us| us as f64 / 1000.0))
            },
            Self::Thread => Value::from(event.thread_id.as_str()),
            Self::ThreadName => Value::from(event.thread_name.clone()),
            Self::ExcInfo => Value::from(event.exc_info.clone()),
            Self::StackInfo => Value::from(event.stack_info.clone()),
        }
    }
}

fn epoch_seconds(timestamp: DateTime<Utc>) -> f64 {
    timestamp.timestamp() as f64 + f64::from(timestamp.timestamp_subsec_micros()) / 1_000_000.0
}

impl FromStr for StandardField {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|field| field.name() == s).ok_or(())
    }
}

/// The ordered list of standard fields a formatter writes out.
///
/// Parsed from a format string such as `"%(asctime)s %(levelname)s %(message)s"` or
/// `"{asctime} {levelname} {message}"`. Names that do not match a [`StandardField`] are ignored and
/// a field named twice is written once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTemplate {
    fields: Vec<StandardField>,
}

impl FieldTemplate {
    pub const DEFAULT_FORMAT: &'static str = "%(message)s";

    pub fn parse(format: &str) -> Self {
        let mut fields = Vec::new();
        for name in placeholder_names(format) {
            if let Ok(field) = name.parse::<StandardField>() {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
        }
        Self { fields }
    }

    pub fn from_fields(fields: impl IntoIterator<Item = StandardField>) -> Self {
        let mut template = Self { fields: Vec::new() };
        for field in fields {
            if !template.fields.contains(&field) {
                template.fields.push(field);
            }
        }
        template
    }

    pub fn fields(&self) -> &[StandardField] {
        &self.fields
    }

    pub fn contains(&self, field: StandardField) -> bool {
        self.fields.contains(&field)
    }
}

impl Default for FieldTemplate {
    fn default() -> Self {
        Self::parse(Self::DEFAULT_FORMAT)
    }
}

/// Names inside `%(name)` and `{name}` placeholders, in order of appearance.
fn placeholder_names(format: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = format;
    loop {
        let percent = rest.find("%(");
        let brace = rest.find('{');
        let (start, close) = match (percent, brace) {
            (Some(p), Some(b)) if p < b => (p + 2, ')'),
            (Some(p), None) => (p + 2, ')'),
            (_, Some(b)) => (b + 1, '}'),
            (None, None) => break,
        };
        let Some(len) = rest[start..].find(close) else {
            break;
        };
        let name = rest[start..start + len].trim();
        // `{name:>10}` and `{name!r}` carry a format spec after the name
        let name = name.split([':', '!']).next().unwrap_or(name);
        if !name.is_empty() {
            names.push(name);
        }
        rest = &rest[start + len + 1..];
    }
    names
}
