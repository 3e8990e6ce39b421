use std::{collections::HashMap, fmt, sync::Arc};

use chrono::{DateTime, Utc};

use crate::{
    record::{LogEvent, Message, OutputRecord},
    template::{FieldTemplate, StandardField},
    value::Value,
};

/// A record transform run after all fields have been collected.
///
/// Transforms run in the order they were added, each receiving the output of the previous one, so
/// a transform can build on what an earlier one did.
pub type Processor = Arc<dyn Fn(OutputRecord, &LogEvent) -> OutputRecord + Send + Sync>;

/// Builds the [`OutputRecord`] of a [`LogEvent`].
///
/// The record is assembled in this order:
///
/// 1. the template's standard fields, under their renamed keys,
/// 2. static fields,
/// 3. the entries of a mapping message, keys turned into strings,
/// 4. the timestamp, if a key for it is set,
/// 5. extra fields of the event, never replacing a key already present,
/// 6. `exc_info` and `stack_info`, unless already present,
/// 7. the processors.
#[derive(Clone)]
pub struct FieldProjector {
    template: FieldTemplate,
    renames: HashMap<StandardField, String>,
    static_fields: Vec<(String, Value)>,
    timestamp_key: Option<String>,
    processors: Vec<Processor>,
    started: DateTime<Utc>,
}

impl Default for FieldProjector {
    fn default() -> Self {
        Self::new(FieldTemplate::default())
    }
}

impl fmt::Debug for FieldProjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldProjector")
            .field("template", &self.template)
            .field("renames", &self.renames)
            .field("static_fields", &self.static_fields.len())
            .field("timestamp_key", &self.timestamp_key)
            .field("processors", &self.processors.len())
            .finish_non_exhaustive()
    }
}

impl FieldProjector {
    pub fn new(template: FieldTemplate) -> Self {
        Self {
            template,
            renames: HashMap::new(),
            static_fields: Vec::new(),
            timestamp_key: None,
            processors: Vec::new(),
            started: Utc::now(),
        }
    }

    /// Creates a projector writing the fields named in `format`, see [`FieldTemplate::parse`].
    pub fn with_format(format: &str) -> Self {
        Self::new(FieldTemplate::parse(format))
    }

    pub fn template(&self) -> &FieldTemplate {
        &self.template
    }

    /// Writes the standard `field` under `key` instead of its own name.
    pub fn rename_field(&mut self, field: StandardField, key: impl Into<String>) -> &mut Self {
        self.renames.insert(field, key.into());
        self
    }

    /// Adds a field with the same value to every record.
    pub fn add_static_field(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.static_fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.static_fields.push((key, value)),
        }
        self
    }

    /// Removes a static field added before.
    pub fn remove_static_field(&mut self, key: &str) -> &mut Self {
        self.static_fields.retain(|(k, _)| k != key);
        self
    }

    /// Adds the event time under `key`.
    pub fn with_timestamp(&mut self, key: impl Into<String>) -> &mut Self {
        self.timestamp_key = Some(key.into());
        self
    }

    /// Appends a transform to the processor chain.
    ///
    /// ```rust
    /// let mut projector = json_logging::FieldProjector::default();
    /// projector.add_processor(|mut record, event| {
    ///     record.insert("logger", event.logger_name.as_str());
    ///     record
    /// });
    /// ```
    pub fn add_processor<F>(&mut self, processor: F) -> &mut Self
    where
        F: Fn(OutputRecord, &LogEvent) -> OutputRecord + Send + Sync + 'static,
    {
        self.processors.push(Arc::new(processor));
        self
    }

    /// Key a standard field is written under.
    pub fn key_for(&self, field: StandardField) -> &str {
        self.renames
            .get(&field)
            .map_or_else(|| field.name(), String::as_str)
    }

    pub fn project(&self, event: &LogEvent) -> OutputRecord {
        let mut record = OutputRecord::new();
        let message_key = self.key_for(StandardField::Message);

        for &field in self.template.fields() {
            let value = match field {
                StandardField::ExcInfo => Value::from(event.exc_info.as_deref().map(strip_newline)),
                StandardField::StackInfo => {
                    Value::from(event.stack_info.as_deref().map(strip_newline))
                },
                field => field.extract(event, self.started),
            };
            record.insert(self.key_for(field), value);
        }

        for (key, value) in &self.static_fields {
            record.insert(key.as_str(), value.clone());
        }

        let is_mapping = if let Message::Map(entries) = &event.message {
            for (key, value) in entries {
                record.insert(key.clone().into_string(), value.clone());
            }
            true
        } else {
            false
        };

        if let Some(key) = &self.timestamp_key {
            record.insert(key.as_str(), Value::from(event.timestamp));
        }

        for (key, value) in &event.extra {
            if key.starts_with('_') {
                continue;
            }
            // a mapping message leaves the message slot empty, extra context may still fill it
            let fills_message = is_mapping
                && key == message_key
                && matches!(record.get(message_key), Some(Value::Null));
            if fills_message {
                record.insert(key.as_str(), value.clone());
            } else {
                record.insert_if_absent(key.as_str(), value.clone());
            }
        }

        if let Some(exc_info) = &event.exc_info {
            record.insert_if_absent(self.key_for(StandardField::ExcInfo), strip_newline(exc_info));
        }
        if let Some(stack_info) = &event.stack_info {
            record.insert_if_absent(
                self.key_for(StandardField::StackInfo),
                strip_newline(stack_info),
            );
        }

        self.processors
            .iter()
            .fold(record, |record, processor| processor(record, event))
    }
}

/// Drops one trailing line terminator.
fn strip_newline(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}
