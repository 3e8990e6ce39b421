//! Structured logging for [`tracing`] that writes every event as one line of JSON.
//!
//! An event is turned into a [`LogEvent`], projected into an ordered [`OutputRecord`] by a
//! [`FieldProjector`] and serialized by a [`JsonRenderer`]. Rendering never fails: a record that
//! cannot be encoded is replaced by a fallback line describing the problem.
//!
//! ```rust
//! json_logging::LoggingSetup::default()
//!     .ignore("hyper", json_logging::Severity::Warning)
//!     .init();
//!
//! tracing::info!(user = "ada", "logged in");
//! tracing::info!(json = %serde_json::json!({"cart": 3, "total": 9.5}));
//! ```

mod builder;
mod error;
mod formatter;
pub mod layer;
mod level;
mod message;
mod projector;
mod record;
mod renderer;
mod serde;
mod template;
mod value;
mod visitor;

#[cfg(test)]
mod tests;

pub use builder::{setup, LoggingSetup};
pub use error::{EncodeError, ParseLevelError, SetupError};
pub use formatter::JsonFormatter;
pub use layer::JsonLayer;
pub use level::{LevelSetting, Severity};
pub use projector::{FieldProjector, Processor};
pub use record::{Key, LogEvent, Message, OutputRecord};
pub use renderer::{
    iso_dates,
    DefaultStrategy,
    EncodeOptions,
    Encoder,
    JsonEncoder,
    JsonRenderer,
    FALLBACK_MESSAGE,
};
pub use crate::serde::Separators;
pub use template::{FieldTemplate, StandardField};
pub use value::{Opaque, SharedValue, Value};
