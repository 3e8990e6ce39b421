use std::{fmt, slice, vec};

use chrono::{DateTime, Utc};

use crate::{level::Severity, message, value::Value};

/// Key of a mapping message. Anything that is not a string is written out in its text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Key {
    pub fn into_string(self) -> String {
        match self {
            Self::Str(s) => s,
            Self::Int(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<bool> for Key {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// What was logged: text, a template with arguments, or a mapping of its own.
#[derive(Debug, Clone)]
pub enum Message {
    Text(String),
    Template { template: String, args: Vec<Value> },
    Map(Vec<(Key, Value)>),
}

impl Message {
    pub fn template(template: impl Into<String>, args: impl IntoIterator<Item = Value>) -> Self {
        Self::Template {
            template: template.into(),
            args: args.into_iter().collect(),
        }
    }

    pub fn map<K: Into<Key>, V: Into<Value>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// The message with its arguments filled in, or `None` for mapping messages.
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text.clone()),
            Self::Template { template, args } => Some(message::substitute(template, args)),
            Self::Map(_) => None,
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for Message {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Message {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One log call, with everything known about where and when it happened.
///
/// Built once when the event is logged and only read afterwards.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub message: Message,
    pub severity: Severity,
    pub logger_name: String,
    pub timestamp: DateTime<Utc>,
    pub pathname: Option<String>,
    pub line: Option<u32>,
    pub function_name: Option<String>,
    pub module_path: Option<String>,
    pub process_id: u32,
    pub process_name: Option<String>,
    pub thread_id: String,
    pub thread_name: Option<String>,
    pub exc_info: Option<String>,
    pub stack_info: Option<String>,
    pub extra: Vec<(String, Value)>,
}

impl LogEvent {
    /// Creates an event stamped with the current time, process and thread.
    pub fn new(
        severity: Severity,
        logger_name: impl Into<String>,
        message: impl Into<Message>,
    ) -> Self {
        let thread = std::thread::current();
        Self {
            message: message.into(),
            severity,
            logger_name: logger_name.into(),
            timestamp: Utc::now(),
            pathname: None,
            line: None,
            function_name: None,
            module_path: None,
            process_id: std::process::id(),
            process_name: process_name(),
            thread_id: format!("{:?}", thread.id()),
            thread_name: thread.name().map(ToOwned::to_owned),
            exc_info: None,
            stack_info: None,
            extra: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_location(mut self, pathname: impl Into<String>, line: u32) -> Self {
        self.pathname = Some(pathname.into());
        self.line = Some(line);
        self
    }

    #[must_use]
    pub fn with_exc_info(mut self, exc_info: impl Into<String>) -> Self {
        self.exc_info = Some(exc_info.into());
        self
    }

    #[must_use]
    pub fn with_stack_info(mut self, stack_info: impl Into<String>) -> Self {
        self.stack_info = Some(stack_info.into());
        self
    }

    /// Base name of the source file.
    pub fn filename(&self) -> Option<&str> {
        let path = self.pathname.as_deref()?;
        path.rsplit(['/', '\\']).next()
    }

    /// Last segment of the module path, or the file stem when there is no module path.
    pub fn module(&self) -> Option<&str> {
        if let Some(path) = self.module_path.as_deref() {
            return path.rsplit("::").next();
        }
        let filename = self.filename()?;
        Some(filename.split_once('.').map_or(filename, |(stem, _)| stem))
    }
}

/// Name of the running executable.
pub(crate) fn process_name() -> Option<String> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.file_stem()?.to_string_lossy().into_owned())
}

/// The ordered set of fields written out for one event. Keys are unique and keep their insertion
/// order.
#[derive(Clone, Default)]
pub struct OutputRecord {
    fields: Vec<(String, Value)>,
}

impl OutputRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Sets `key`, keeping its position if it was already present. Returns the old value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.fields.iter().position(|(k, _)| *k == key) {
            Some(index) => Some(std::mem::replace(&mut self.fields[index].1, value)),
            None => {
                self.fields.push((key, value));
                None
            },
        }
    }

    /// Adds `key` only if it is not present yet. Returns whether it was added.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if self.contains_key(&key) {
            return false;
        }
        self.fields.push((key, value.into()));
        true
    }

    /// Removes `key`, keeping the order of the remaining fields.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(index).1)
    }

    pub fn iter(&self) -> slice::Iter<'_, (String, Value)> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Text of the record that cannot fail, see [`Value::repr`].
    pub fn repr(&self) -> String {
        let mut out = String::new();
        let _ = crate::value::write_entries(&mut out, &mut Vec::new(), &self.fields);
        out
    }
}

impl fmt::Debug for OutputRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for OutputRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

impl IntoIterator for OutputRecord {
    type Item = (String, Value);
    type IntoIter = vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a OutputRecord {
    type Item = &'a (String, Value);
    type IntoIter = slice::Iter<'a, (String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
