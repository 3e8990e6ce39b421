use std::io;

use serde_json::ser::Formatter;

mod encodable;

pub(crate) use encodable::{EncodableRecord, EncodeContext};

/// Item and key separators of the emitted JSON text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Separators {
    pub item: &'static str,
    pub key: &'static str,
}

impl Separators {
    /// `{"a": 1, "b": [1, 2]}`
    pub const SPACED: Self = Self {
        item: ", ",
        key: ": ",
    };
    /// `{"a":1,"b":[1,2]}`
    pub const COMPACT: Self = Self {
        item: ",",
        key: ":",
    };

    pub fn compact() -> Self {
        Self::COMPACT
    }
}

impl Default for Separators {
    fn default() -> Self {
        Self::SPACED
    }
}

/// Writes a single line of JSON with the configured separators, optionally escaping everything
/// outside of ASCII.
pub(crate) struct LineFormatter {
    separators: Separators,
    ensure_ascii: bool,
}

impl LineFormatter {
    pub(crate) fn new(separators: Separators, ensure_ascii: bool) -> Self {
        Self {
            separators,
            ensure_ascii,
        }
    }
}

impl Formatter for LineFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(self.separators.item.as_bytes())
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(self.separators.item.as_bytes())
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(self.separators.key.as_bytes())
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if !self.ensure_ascii || fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }

        let mut rest = fragment;
        while let Some(index) = rest.find(|c: char| !c.is_ascii()) {
            writer.write_all(rest[..index].as_bytes())?;
            let mut chars = rest[index..].chars();
            let Some(c) = chars.next() else {
                break;
            };
            let mut units = [0_u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            rest = chars.as_str();
        }
        writer.write_all(rest.as_bytes())
    }
}
