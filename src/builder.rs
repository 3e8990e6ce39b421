use std::{fmt, io};

use tracing::Dispatch;
use tracing_subscriber::{
    filter::Targets,
    fmt::{MakeWriter, TestWriter},
    layer::SubscriberExt,
    Layer,
    Registry,
};

use crate::{
    error::{ParseLevelError, SetupError},
    formatter::JsonFormatter,
    layer::JsonLayer,
    level::LevelSetting,
};

/// Configures a process to log one JSON line per event through exactly one output.
///
/// The root level applies to every logger (`tracing` target) that has no level of its own, and
/// [`ignore`](Self::ignore) sets the level of noisy loggers. Once installed, a summary line with
/// the applied configuration is logged at INFO.
///
/// ```rust
/// use json_logging::{LoggingSetup, Severity};
///
/// LoggingSetup::default()
///     .level(Severity::Info)
///     .ignore("elasticsearch", Severity::Warning)
///     .with_writer(std::io::stderr)
///     .init();
/// ```
pub struct LoggingSetup<W = fn() -> io::Stdout> {
    make_writer: W,
    level: LevelSetting,
    ignore: Vec<(String, LevelSetting)>,
    formatter: Option<JsonFormatter>,
    log_internal_errors: bool,
}

impl Default for LoggingSetup {
    fn default() -> Self {
        Self {
            make_writer: io::stdout,
            level: LevelSetting::default(),
            ignore: Vec::new(),
            formatter: None,
            log_internal_errors: false,
        }
    }
}

/// Creates a [`LoggingSetup`] writing to stdout from level names or numbers, such as `"info"`,
/// `"WARNING"` or `"20"`.
///
/// ```rust
/// # fn main() -> Result<(), json_logging::ParseLevelError> {
/// json_logging::setup("info", [("elasticsearch", "warning")])?.init();
/// # Ok(())
/// # }
/// ```
pub fn setup<'a>(
    level: &str,
    ignore: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<LoggingSetup, ParseLevelError> {
    let mut builder = LoggingSetup::default().level(level.parse::<LevelSetting>()?);
    for (name, level) in ignore {
        builder = builder.ignore(name, level.parse::<LevelSetting>()?);
    }
    Ok(builder)
}

impl<W> LoggingSetup<W>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    /// Builds the dispatcher without installing it and logs the summary line through it.
    ///
    /// Use this with [`tracing::dispatcher::with_default`] for scoped logging, or in tests.
    pub fn finish(self) -> Dispatch {
        let summary = self.summary();
        let dispatch = self.into_dispatch();
        tracing::dispatcher::with_default(&dispatch, || tracing::info!("{summary}"));
        dispatch
    }

    /// Installs the dispatcher as the process-wide default and logs the summary line.
    ///
    /// The process-wide default can only be installed once, later calls return
    /// [`SetupError::AlreadyInstalled`]. With the `tracing-log` feature records of the `log` crate
    /// are logged too; the `log` bridge is only set up once the dispatcher is installed.
    pub fn try_init(self) -> Result<(), SetupError> {
        let summary = self.summary();
        tracing::dispatcher::set_global_default(self.into_dispatch())?;

        #[cfg(feature = "tracing-log")]
        tracing_log::LogTracer::init()?;

        tracing::info!("{summary}");
        Ok(())
    }

    /// Installs the dispatcher as the process-wide default and logs the summary line.
    ///
    /// # Panics
    /// Panics if a process-wide default has already been installed.
    pub fn init(self) {
        self.try_init().expect("Unable to install global subscriber");
    }

    fn into_dispatch(self) -> Dispatch {
        let targets = self.ignore.iter().fold(
            Targets::new().with_default(self.level.to_level_filter()),
            |targets, (name, level)| targets.with_target(name.clone(), level.to_level_filter()),
        );

        let mut layer = JsonLayer::<Registry>::new(self.make_writer);
        layer
            .with_formatter(
                self.formatter
                    .unwrap_or_else(|| JsonFormatter::default().with_module_and_severity()),
            )
            .log_internal_errors(self.log_internal_errors);

        Dispatch::new(tracing_subscriber::registry().with(layer.with_filter(targets)))
    }
}

impl<W> LoggingSetup<W> {
    /// Sets the level of every logger without a level of its own. Defaults to INFO.
    pub fn level(self, level: impl Into<LevelSetting>) -> Self {
        Self {
            level: level.into(),
            ..self
        }
    }

    /// Sets the level of the logger `name` and everything below it, typically to silence a
    /// dependency.
    pub fn ignore(mut self, name: impl Into<String>, level: impl Into<LevelSetting>) -> Self {
        let name = name.into();
        let level = level.into();
        match self.ignore.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = level,
            None => self.ignore.push((name, level)),
        }
        self
    }

    /// Replaces the formatter. By default records get `Module` and `Severity` fields, see
    /// [`JsonFormatter::with_module_and_severity`]; a formatter set here is used as it is.
    pub fn with_formatter(self, formatter: JsonFormatter) -> Self {
        Self {
            formatter: Some(formatter),
            ..self
        }
    }

    /// Sets the [`MakeWriter`] the lines are written to.
    pub fn with_writer<W2>(self, make_writer: W2) -> LoggingSetup<W2>
    where
        W2: for<'writer> MakeWriter<'writer> + 'static,
    {
        LoggingSetup {
            make_writer,
            level: self.level,
            ignore: self.ignore,
            formatter: self.formatter,
            log_internal_errors: self.log_internal_errors,
        }
    }

    /// Writes lines through [`TestWriter`] so `cargo test` captures them.
    pub fn with_test_writer(self) -> LoggingSetup<TestWriter> {
        self.with_writer(TestWriter::default())
    }

    /// Sets whether failures to write a line are reported on stderr. Defaults to false.
    pub fn log_internal_errors(self, log_internal_errors: bool) -> Self {
        Self {
            log_internal_errors,
            ..self
        }
    }

    fn summary(&self) -> String {
        format!(
            "Setup logging with level:{}, ignore: [{}]",
            self.level,
            IgnoreList(&self.ignore),
        )
    }
}

struct IgnoreList<'a>(&'a [(String, LevelSetting)]);

impl fmt::Display for IgnoreList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, level)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={level}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tracing::dispatcher::with_default;

    use super::{setup, LoggingSetup};
    use crate::{formatter::JsonFormatter, level::Severity, tests::MockMakeWriter};

    fn run(builder: LoggingSetup, producer: impl FnOnce()) -> Vec<serde_json::Value> {
        let make_writer = MockMakeWriter::default();
        let dispatch = builder.with_writer(make_writer.clone()).finish();
        with_default(&dispatch, producer);
        make_writer.lines()
    }

    #[test]
    fn summary_line() {
        let lines = run(setup("INFO", [("elasticsearch", "WARNING")]).unwrap(), || {});
        assert_eq!(
            lines,
            [json!({
                "message": "Setup logging with level:INFO, ignore: [elasticsearch=WARNING]",
                "Module": "json_logging::builder",
                "Severity": "INFO",
            })],
        );
    }

    #[test]
    fn names_are_normalized() {
        let upper = run(setup("INFO", [("elasticsearch", "WARNING")]).unwrap(), || {});
        let lower = run(setup("info", [("elasticsearch", "warning")]).unwrap(), || {});
        assert_eq!(upper, lower);
    }

    #[test]
    fn summary_keeps_ignore_order() {
        let builder = LoggingSetup::default()
            .ignore("urllib3", Severity::Error)
            .ignore("elasticsearch", Severity::Warning);
        let lines = run(builder, || {});
        assert_eq!(
            lines[0]["message"],
            "Setup logging with level:INFO, ignore: [urllib3=ERROR, elasticsearch=WARNING]",
        );
    }

    #[test]
    fn ignored_loggers_are_filtered() {
        let lines = run(setup("info", [("elasticsearch", "warning")]).unwrap(), || {
            tracing::info!(target: "elasticsearch", "dropped");
            tracing::warn!(target: "elasticsearch::transport", "kept");
            tracing::info!(target: "app", "also kept");
            tracing::debug!(target: "app", "dropped too");
        });
        let messages = lines
            .iter()
            .map(|line| line["message"].as_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(
            messages,
            [
                "Setup logging with level:INFO, ignore: [elasticsearch=WARNING]",
                "kept",
                "also kept",
            ],
        );
        assert_eq!(lines[1]["Module"], "elasticsearch::transport");
        assert_eq!(lines[1]["Severity"], "WARNING");
    }

    #[test]
    fn numeric_level() {
        let lines = run(setup("30", []).unwrap(), || {
            tracing::info!("dropped");
            tracing::warn!("kept");
        });
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["message"], "kept");
    }

    #[test]
    fn threshold_above_error_drops_errors() {
        let lines = run(setup("45", []).unwrap(), || {
            tracing::error!("error at 40");
        });
        assert!(lines.is_empty());
    }

    #[test]
    fn critical_ignore_silences_logger() {
        let builder = LoggingSetup::default().ignore("es", Severity::Critical);
        let lines = run(builder, || {
            tracing::error!(target: "es", "dropped");
            tracing::error!(target: "app", "kept");
        });
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["message"], "kept");
    }

    #[test]
    fn one_line_per_call() {
        let lines = run(LoggingSetup::default(), || {
            for i in 0..5 {
                tracing::info!(i, "call");
            }
        });
        assert_eq!(lines.len(), 6);
        assert!(lines[1..].iter().all(|line| line["message"] == "call"));
    }

    #[test]
    fn custom_formatter_is_used_as_is() {
        let builder = LoggingSetup::default()
            .with_formatter(JsonFormatter::with_format("%(levelname)s %(message)s"));
        let lines = run(builder, || tracing::error!("oops"));
        assert_eq!(lines[1], json!({"levelname": "ERROR", "message": "oops"}));
    }

    #[test]
    fn unknown_level_names_are_rejected() {
        assert!(setup("loud", []).is_err());
        assert!(setup("info", [("elasticsearch", "quiet")]).is_err());
    }
}
