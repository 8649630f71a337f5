//! Subscriber setup for the CLI and tests.
//!
//! Plain output goes through [`DomainFormat`], which lifts the `domain` field
//! set by the `rg_*!` macros (`val`, `svc`, `sys`) into a `[domain]` prefix.
//! JSON output keeps `domain` as an ordinary field.

use std::fmt::{self as stdfmt, Write as _};
use std::path::{Path, PathBuf};

use anyhow::Result;
use rg_config::{LogFormat, LoggingConfig};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::{DefaultFields, Writer};
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormattedFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::{LookupSpan, Registry};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// FileFields
// ---------------------------------------------------------------------------

/// Field formatter for the log file layer.
///
/// Span fields are cached per formatter type, so a distinct type keeps the
/// console's ANSI-styled span fields out of the file.
#[derive(Default)]
pub struct FileFields(DefaultFields);

impl<'writer> fmt::FormatFields<'writer> for FileFields {
    fn format_fields<R: tracing_subscriber::field::RecordFields>(
        &self,
        writer: Writer<'writer>,
        fields: R,
    ) -> stdfmt::Result {
        self.0.format_fields(writer, fields)
    }
}

// ---------------------------------------------------------------------------
// DomainFormat
// ---------------------------------------------------------------------------

/// One-line event format with the domain in front of the span scope:
///
/// ```text
/// 2026-10-19T08:12:03Z  INFO [val] coalescer{session=plan.toml}: validation delivered generation=3 status=valid
/// ```
///
/// Events without a `domain` field, such as those from dependencies, get no
/// prefix.
pub struct DomainFormat {
    timer: SystemTime,
}

impl DomainFormat {
    pub fn new() -> Self {
        Self { timer: SystemTime }
    }
}

impl Default for DomainFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, N> FormatEvent<S, N> for DomainFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> fmt::FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        let paint = Paint(writer.has_ansi_escapes());

        let mut stamp = String::new();
        if self.timer.format_time(&mut Writer::new(&mut stamp)).is_err() {
            stamp.push_str("<unknown time>");
        }
        paint.write(&mut writer, "2", &stamp)?;

        let level = *event.metadata().level();
        writer.write_char(' ')?;
        paint.write(&mut writer, level_color(level), format_args!("{level:>5}"))?;
        writer.write_char(' ')?;

        let mut fields = EventFields::default();
        event.record(&mut fields);

        if let Some(domain) = &fields.domain {
            paint.write(&mut writer, "1;36", format_args!("[{domain}]"))?;
            writer.write_char(' ')?;
        }

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                paint.write(&mut writer, "1", span.name())?;
                let ext = span.extensions();
                let span_fields = ext
                    .get::<FormattedFields<N>>()
                    .map(|f| f.fields.as_str())
                    .unwrap_or_default();
                write!(writer, "{{{span_fields}}}: ")?;
            }
        }

        writer.write_str(&fields.message)?;
        if !fields.rest.is_empty() {
            writer.write_char(' ')?;
            paint.write(&mut writer, "3", &fields.rest)?;
        }
        writeln!(writer)
    }
}

/// Wraps text in an SGR escape when the writer supports ANSI.
#[derive(Clone, Copy)]
struct Paint(bool);

impl Paint {
    fn write(self, writer: &mut Writer<'_>, sgr: &str, text: impl stdfmt::Display) -> stdfmt::Result {
        if self.0 {
            write!(writer, "\x1b[{sgr}m{text}\x1b[0m")
        } else {
            write!(writer, "{text}")
        }
    }
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::ERROR => "31",
        Level::WARN => "33",
        Level::INFO => "32",
        Level::DEBUG => "34",
        Level::TRACE => "35",
    }
}

// ---------------------------------------------------------------------------
// EventFields
// ---------------------------------------------------------------------------

/// An event's fields split into domain, message and `key=value` rest.
///
/// Numeric and bool fields reach `record_debug` through the default `Visit`
/// methods.
#[derive(Default)]
struct EventFields {
    domain: Option<String>,
    message: String,
    rest: String,
}

impl EventFields {
    fn push(&mut self, name: &str, value: impl stdfmt::Debug) {
        let sep = if self.rest.is_empty() { "" } else { " " };
        let _ = write!(self.rest, "{sep}{name}={value:?}");
    }
}

impl Visit for EventFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "domain" => self.domain = Some(value.to_owned()),
            "message" => self.message.push_str(value),
            name => self.push(name, value),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn stdfmt::Debug) {
        match field.name() {
            "domain" => {
                let domain = format!("{value:?}");
                self.domain = Some(domain.trim_matches('"').to_owned());
            }
            "message" => {
                let _ = write!(self.message, "{value:?}");
            }
            name => self.push(name, value),
        }
    }
}

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

/// Install the global subscriber described by [`LoggingConfig`]: a stderr
/// layer, plus a file layer when `file` is set (relative paths resolve
/// against `base_dir`).
///
/// Hold the returned guard until exit; dropping it flushes the file writer.
/// A set `RUST_LOG` replaces the configured directives.
pub fn init_tracing(config: &LoggingConfig, base_dir: &Path) -> Result<Option<WorkerGuard>> {
    let mut layers: Vec<BoxedLayer> = vec![console_layer(config.format)
        .with_filter(build_filter(config)?)
        .boxed()];

    let mut guard = None;
    if let Some(file) = &config.file {
        let path = resolve_log_path(file, base_dir);
        let (dir, name) = match (path.parent(), path.file_name()) {
            (Some(dir), Some(name)) => (dir, name.to_os_string()),
            _ => anyhow::bail!("log file path has no file name: {}", path.display()),
        };
        std::fs::create_dir_all(dir)?;
        let (writer, file_guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
        layers.push(
            file_layer(config.format, writer)
                .with_filter(build_filter(config)?)
                .boxed(),
        );
        guard = Some(file_guard);
    }

    tracing_subscriber::registry().with(layers).init();
    Ok(guard)
}

fn console_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Plain => fmt::layer()
            .event_format(DomainFormat::new())
            .with_writer(std::io::stderr)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, writer: tracing_appender::non_blocking::NonBlocking) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(false)
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Plain => fmt::layer()
            .event_format(DomainFormat::new())
            .fmt_fields(FileFields::default())
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
    }
}

/// Install a test-writer subscriber at `level`. Safe to call from many
/// tests; only the first call installs anything.
pub fn init_test_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .event_format(DomainFormat::new())
                .with_test_writer()
                .with_filter(filter),
        )
        .try_init();
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if std::env::var("RUST_LOG").is_ok() {
        return Ok(EnvFilter::from_default_env());
    }
    let directives = filter_directives(config);
    EnvFilter::try_new(&directives)
        .map_err(|e| anyhow::anyhow!("invalid log filter '{directives}': {e}"))
}

/// `level[,module=level...]`, modules sorted for a stable result.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();
    let mut directives = config.level.clone();
    for (module, level) in modules {
        let _ = write!(directives, ",{module}={level}");
    }
    directives
}

fn resolve_log_path(file_path: &Path, base_dir: &Path) -> PathBuf {
    if file_path.is_relative() {
        base_dir.join(file_path)
    } else {
        file_path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn directives_from_config() {
        let mut config = LoggingConfig::default();
        assert_eq!(filter_directives(&config), "info");

        config.level = "warn".into();
        config
            .modules
            .insert("rg_runtime::session".into(), "info".into());
        config
            .modules
            .insert("rg_runtime::coalescer".into(), "debug".into());
        assert_eq!(
            filter_directives(&config),
            "warn,rg_runtime::coalescer=debug,rg_runtime::session=info"
        );
    }

    #[test]
    fn log_path_resolution() {
        let base = Path::new("/etc/rollout");
        assert_eq!(
            resolve_log_path(Path::new("logs/a.log"), base),
            PathBuf::from("/etc/rollout/logs/a.log")
        );
        assert_eq!(
            resolve_log_path(Path::new("/var/log/a.log"), base),
            PathBuf::from("/var/log/a.log")
        );
    }

    #[test]
    fn event_fields_split() {
        let mut fields = EventFields::default();
        fields.push("groups", 3u64);
        fields.push("status", "valid");
        assert_eq!(fields.rest, "groups=3 status=\"valid\"");
        assert!(fields.domain.is_none());
    }

    #[test]
    fn plain_format_prefixes_domain() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .event_format(DomainFormat::new())
                .with_ansi(false)
                .with_writer(capture.clone()),
        );
        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("coalescer", session = 7u64);
            let _entered = span.enter();
            tracing::info!(domain = "val", generation = 3u64, "validation delivered");
            tracing::warn!("no domain here");
        });

        let out = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2, "{out}");
        assert!(
            lines[0].ends_with(" INFO [val] coalescer{session=7}: validation delivered generation=3"),
            "{out}"
        );
        assert!(
            lines[1].ends_with(" WARN coalescer{session=7}: no domain here"),
            "{out}"
        );
        assert!(!out.contains('\x1b'));
    }
}
