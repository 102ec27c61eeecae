//! Custom logging formatter with worker-thread prefix and no ANSI colors
//!
//! Benchmarks run many workers against one table, so every line carries the
//! name (or id) of the thread that emitted it:
//!
//! ```text
//! [worker-3] 2026-10-19T12:00:00.123456Z DEBUG inodefs::fs:src/fs.rs:120: created /a/b
//! ```

use std::fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;

/// Event formatter that prefixes the current thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadFormatter;

impl ThreadFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl<S, N> FormatEvent<S, N> for ThreadFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        let current = std::thread::current();
        match current.name() {
            Some(name) => write!(writer, "[{}] ", name)?,
            None => write!(writer, "[{:?}] ", current.id())?,
        }

        let datetime: chrono::DateTime<chrono::Utc> = std::time::SystemTime::now().into();
        write!(writer, "{} ", datetime.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        write!(writer, "{:5} ", meta.level())?;

        // Span chain on one line, root first
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;
                let ext = span.extensions();
                if let Some(fields) = ext.get::<tracing_subscriber::fmt::FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{}}}", fields)?;
                    }
                }
                write!(writer, ":")?;
            }
            write!(writer, " ")?;
        }

        write!(writer, "{}", meta.target())?;

        if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
            write!(writer, ":{}:{}", file, line)?;
        }

        write!(writer, ": ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Install the global subscriber, failing if one is already set
///
/// `RUST_LOG` takes precedence over `level`.
pub fn try_init(level: &str) -> Result<(), TryInitError> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = fmt::layer()
        .event_format(ThreadFormatter::new())
        .with_ansi(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!("Logging initialized at level {}", level);
    Ok(())
}

/// Install the global subscriber
///
/// A second call is a no-op apart from a warning.
pub fn init(level: &str) {
    if let Err(err) = try_init(level) {
        tracing::warn!("Logging already initialized: {}", err);
    }
}
