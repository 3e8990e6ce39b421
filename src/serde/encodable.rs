use std::cell::RefCell;

use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serialize,
    Serializer,
};

use crate::{error::EncodeError, record::OutputRecord, value::Value};

type Strategy<'a> = &'a (dyn Fn(&Value) -> Result<Value, EncodeError> + Send + Sync);

/// State shared while encoding one record: the default-value strategy, the shared values on the
/// current path, and the first error hit.
pub(crate) struct EncodeContext<'a> {
    default: Strategy<'a>,
    path: RefCell<Vec<usize>>,
    error: RefCell<Option<EncodeError>>,
}

impl<'a> EncodeContext<'a> {
    pub(crate) fn new(default: Strategy<'a>) -> Self {
        Self {
            default,
            path: RefCell::new(Vec::new()),
            error: RefCell::new(None),
        }
    }

    /// The error that made serialization fail, if it came from the value model and not from the
    /// writer.
    pub(crate) fn take_error(&self) -> Option<EncodeError> {
        self.error.borrow_mut().take()
    }

    fn fail<E: serde::ser::Error>(&self, error: EncodeError) -> E {
        let e = E::custom(&error);
        self.error.borrow_mut().get_or_insert(error);
        e
    }

    fn wrap<'v>(&'v self, value: &'v Value) -> Encodable<'v, 'a> {
        Encodable {
            value,
            context: self,
        }
    }
}

pub(crate) struct EncodableRecord<'r, 'a> {
    record: &'r OutputRecord,
    context: &'r EncodeContext<'a>,
}

impl<'r, 'a> EncodableRecord<'r, 'a> {
    pub(crate) fn new(record: &'r OutputRecord, context: &'r EncodeContext<'a>) -> Self {
        Self { record, context }
    }
}

impl Serialize for EncodableRecord<'_, '_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut serializer = serializer.serialize_map(Some(self.record.len()))?;
        for (key, value) in self.record {
            serializer.serialize_entry(key, &self.context.wrap(value))?;
        }
        serializer.end()
    }
}

struct Encodable<'v, 'a> {
    value: &'v Value,
    context: &'v EncodeContext<'a>,
}

impl Serialize for Encodable<'_, '_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let context = self.context;
        match self.value {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::I64(n) => serializer.serialize_i64(*n),
            Value::U64(n) => serializer.serialize_u64(*n),
            Value::F64(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(values) => {
                let mut serializer = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    serializer.serialize_element(&context.wrap(value))?;
                }
                serializer.end()
            },
            Value::Object(entries) => {
                let mut serializer = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    serializer.serialize_entry(key, &context.wrap(value))?;
                }
                serializer.end()
            },
            Value::Shared(shared) => {
                let address = shared.address();
                if context.path.borrow().contains(&address) {
                    return Err(context.fail(EncodeError::CircularReference));
                }
                context.path.borrow_mut().push(address);
                let result = shared.with(|inner| context.wrap(inner).serialize(serializer));
                context.path.borrow_mut().pop();
                result.unwrap_or_else(|| {
                    Err(context.fail(EncodeError::strategy("shared value is locked")))
                })
            },
            other => {
                let substitute =
                    (context.default)(other).map_err(|e| context.fail::<S::Error>(e))?;
                if !substitute.is_native() {
                    return Err(context.fail(EncodeError::Unserializable(
                        substitute.type_name().to_owned(),
                    )));
                }
                context.wrap(&substitute).serialize(serializer)
            },
        }
    }
}
