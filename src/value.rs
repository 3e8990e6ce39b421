use std::{
    any::Any,
    fmt::{self, Write as _},
    sync::{Arc, RwLock},
};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{
    de::{self, MapAccess, SeqAccess, Visitor},
    Deserialize,
    Deserializer,
};

/// A value that can be attached to a log record.
///
/// Besides everything JSON can express natively this also holds dates and times, values shared by
/// reference (which may form cycles) and arbitrary Rust values. Those are turned into JSON by the
/// renderer's default-value strategy, which may fail.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    String(String),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<FixedOffset>),
    Shared(SharedValue),
    Opaque(Opaque),
}

impl Value {
    /// Wraps any Rust value. Custom default-value strategies can get it back with
    /// [`Value::downcast_ref`].
    pub fn opaque<T: Any + fmt::Debug + Send + Sync>(value: T) -> Self {
        Self::Opaque(Opaque::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Opaque(opaque) => (*opaque.inner).as_any().downcast_ref(),
            _ => None,
        }
    }

    /// Whether the value can be encoded without consulting a default-value strategy.
    pub fn is_native(&self) -> bool {
        matches!(
            self,
            Self::Null
                | Self::Bool(_)
                | Self::I64(_)
                | Self::U64(_)
                | Self::F64(_)
                | Self::String(_)
                | Self::Array(_)
                | Self::Object(_)
                | Self::Shared(_)
        )
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::F64(_) => "f64",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Date(_) => "NaiveDate",
            Self::Time(_) => "NaiveTime",
            Self::DateTime(_) => "NaiveDateTime",
            Self::Timestamp(_) => "DateTime",
            Self::Shared(_) => "shared",
            Self::Opaque(opaque) => opaque.type_name,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Debug-like text of the value that cannot fail, even on cycles.
    ///
    /// A shared value already being printed further up shows as `{...}` (or `[...]`), one that is
    /// locked for writing as `<locked>`.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        let _ = Repr::new(self).fmt_into(&mut out, &mut Vec::new());
        out
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(number) => {
                if let Some(n) = number.as_u64() {
                    Self::U64(n)
                } else if let Some(n) = number.as_i64() {
                    Self::I64(n)
                } else {
                    Self::F64(number.as_f64().unwrap_or(f64::NAN))
                }
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(values) => {
                Self::Array(values.into_iter().map(Self::from).collect())
            },
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            },
        }
    }
}

/// Parses JSON text keeping the order of object keys.
impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Value, E> {
        Ok(Value::Bool(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Value, E> {
        Ok(Value::I64(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Value, E> {
        Ok(Value::U64(value))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Value, E> {
        Ok(Value::F64(value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Value, E> {
        Ok(Value::String(value.to_owned()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Value, E> {
        Ok(Value::String(value))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(value) = seq.next_element()? {
            values.push(value);
        }
        Ok(Value::Array(values))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut entries: Vec<(String, Value)> = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some((_, slot)) => *slot = value,
                None => entries.push((key, value)),
            }
        }
        Ok(Value::Object(entries))
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i8 => I64,
    i16 => I64,
    i32 => I64,
    i64 => I64,
    u8 => U64,
    u16 => U64,
    u32 => U64,
    u64 => U64,
    f32 => F64,
    f64 => F64,
    String => String,
    &str => String,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => Timestamp,
    SharedValue => Shared,
}

impl From<DateTime<chrono::Utc>> for Value {
    fn from(value: DateTime<chrono::Utc>) -> Self {
        Self::Timestamp(value.fixed_offset())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Self::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Object(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A value shared by reference. Clones point to the same slot, so a value may end up containing
/// itself.
#[derive(Clone, Default)]
pub struct SharedValue(Arc<RwLock<Value>>);

impl SharedValue {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(Arc::new(RwLock::new(value.into())))
    }

    /// Replaces the shared value. Returns `false` if the lock was poisoned.
    pub fn set(&self, value: impl Into<Value>) -> bool {
        match self.0.write() {
            Ok(mut guard) => {
                *guard = value.into();
                true
            },
            Err(_) => false,
        }
    }

    /// Runs `f` with the shared value if it can be read without blocking.
    pub fn with<R>(&self, f: impl FnOnce(&Value) -> R) -> Option<R> {
        self.0.try_read().ok().map(|guard| f(&guard))
    }

    pub(crate) fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for SharedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("SharedValue { .. }")
    }
}

trait AnyDebug: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Debug + Send + Sync> AnyDebug for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An arbitrary Rust value carried in a record.
#[derive(Clone)]
pub struct Opaque {
    type_name: &'static str,
    inner: Arc<dyn AnyDebug>,
}

impl Opaque {
    fn new<T: Any + fmt::Debug + Send + Sync>(value: T) -> Self {
        let full = std::any::type_name::<T>();
        Self {
            type_name: full.rsplit("::").next().unwrap_or(full),
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

/// Printer behind [`Value::repr`]. `path` holds the shared nodes currently being printed.
pub(crate) struct Repr<'a>(&'a Value);

impl<'a> Repr<'a> {
    pub(crate) fn new(value: &'a Value) -> Self {
        Self(value)
    }

    pub(crate) fn fmt_into(&self, out: &mut String, path: &mut Vec<usize>) -> fmt::Result {
        match self.0 {
            Value::Null => out.push_str("null"),
            Value::Bool(b) => write!(out, "{b}")?,
            Value::I64(n) => write!(out, "{n}")?,
            Value::U64(n) => write!(out, "{n}")?,
            Value::F64(n) => write!(out, "{n:?}")?,
            Value::String(s) => write!(out, "{s:?}")?,
            Value::Array(values) => {
                out.push('[');
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    Repr(value).fmt_into(out, path)?;
                }
                out.push(']');
            },
            Value::Object(entries) => write_entries(out, path, entries)?,
            Value::Date(date) => write!(out, "{date:?}")?,
            Value::Time(time) => write!(out, "{time:?}")?,
            Value::DateTime(datetime) => write!(out, "{datetime:?}")?,
            Value::Timestamp(timestamp) => write!(out, "{timestamp:?}")?,
            Value::Shared(shared) => {
                let address = shared.address();
                let Ok(guard) = shared.0.try_read() else {
                    out.push_str("<locked>");
                    return Ok(());
                };
                if path.contains(&address) {
                    out.push_str(match &*guard {
                        Value::Array(_) => "[...]",
                        _ => "{...}",
                    });
                    return Ok(());
                }
                path.push(address);
                let res = Repr(&*guard).fmt_into(out, path);
                path.pop();
                res?;
            },
            Value::Opaque(opaque) => write!(out, "{opaque:?}")?,
        }
        Ok(())
    }
}

pub(crate) fn write_entries(
    out: &mut String,
    path: &mut Vec<usize>,
    entries: &[(String, Value)],
) -> fmt::Result {
    out.push('{');
    for (i, (key, value)) in entries.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write!(out, "{key:?}: ")?;
        Repr(value).fmt_into(out, path)?;
    }
    out.push('}');
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{SharedValue, Value};

    #[derive(Debug)]
    struct Complex {
        re: f64,
        im: f64,
    }

    #[test]
    fn opaque_downcasts() {
        let value = Value::opaque(Complex { re: 3.0, im: 8.0 });
        assert!(!value.is_native());
        assert_eq!(value.type_name(), "Complex");
        let complex = value.downcast_ref::<Complex>().unwrap();
        assert_eq!((complex.re, complex.im), (3.0, 8.0));
        assert!(value.downcast_ref::<String>().is_none());
    }

    #[test]
    fn repr_of_plain_values() {
        let value: Value = [
            ("text", Value::from("it's")),
            ("n", Value::from(1)),
            ("list", Value::from(vec![true, false])),
            ("day", Value::from(NaiveDate::from_ymd_opt(1789, 7, 14).unwrap())),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            value.repr(),
            r#"{"text": "it's", "n": 1, "list": [true, false], "day": 1789-07-14}"#,
        );
    }

    #[test]
    fn repr_survives_cycles() {
        let shared = SharedValue::new(Value::Object(Vec::new()));
        assert!(shared.set(Value::Object(vec![(
            "self".to_owned(),
            Value::Shared(shared.clone()),
        )])));

        let value = Value::Object(vec![
            ("message".to_owned(), Value::from("Here's a log")),
            ("log_data".to_owned(), Value::Shared(shared)),
        ]);
        assert_eq!(
            value.repr(),
            r#"{"message": "Here's a log", "log_data": {"self": {...}}}"#,
        );
    }

    #[test]
    fn repr_of_shared_twice_is_not_a_cycle() {
        let shared = SharedValue::new(5);
        let value = Value::Array(vec![Value::Shared(shared.clone()), Value::Shared(shared)]);
        assert_eq!(value.repr(), "[5, 5]");
    }

    #[test]
    fn parsed_objects_keep_key_order() {
        let text = r#"{"z": 1, "a": [null, 1.5], "m": {"b": -2, "a": "x"}}"#;
        let value: Value = serde_json::from_str(text).unwrap();
        assert_eq!(value.repr(), text);
    }
}
