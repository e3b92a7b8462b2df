//! Structured query logging.
//!
//! A [`QueryLogger`] turns driver-level [`LogEvent`]s into a single
//! [`RenderedLogLine`] and emits it through `tracing` at debug level:
//!
//! ```ignore
//! let logger = QueryLogger::new("read", FormatOptions { with_color: true, with_caller: false });
//! logger.log(&LogEvent::Query(QueryEvent {
//!     source: "src/repo.rs:42".into(),
//!     duration: Duration::from_millis(3),
//!     sql: "SELECT * FROM books WHERE id = ?".into(),
//!     values: vec![BindValue::from(7)],
//!     rows_affected: 1,
//!     callers: vec![],
//! }));
//! ```
//!
//! Rendering is pure and never panics; events that do not line up (more
//! placeholders than values and so on) are rendered as best they can be.

mod clock;
mod placeholder;
mod value;

use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

pub use clock::{Clock, FixedClock, SystemClock};
pub use placeholder::{substitute, PlaceholderMode};
pub use value::{BindValue, ValueError, Valuer};

/// A `file:line` frame supplied by the code issuing a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
}

impl CallSite {
    /// Location of the caller of the `#[track_caller]` chain.
    #[track_caller]
    pub fn capture() -> Self {
        let loc = Location::caller();
        Self {
            file: loc.file(),
            line: loc.line(),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One executed statement.
#[derive(Debug, Clone)]
pub struct QueryEvent {
    pub source: String,
    pub duration: Duration,
    pub sql: String,
    pub values: Vec<BindValue>,
    pub rows_affected: u64,
    pub callers: Vec<CallSite>,
}

/// Event handed to the logger by the query path.
#[derive(Debug, Clone)]
pub enum LogEvent {
    Query(QueryEvent),
    /// First element is the kind, the rest form the message.
    Generic(Vec<String>),
}

impl LogEvent {
    pub fn generic<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LogEvent::Generic(parts.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatOptions {
    pub with_color: bool,
    pub with_caller: bool,
}

/// Output of [`QueryLogger::render`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedLogLine {
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub source: Option<String>,
    pub duration: Option<Duration>,
    pub sql: Option<String>,
    pub rows_affected: Option<u64>,
    pub caller: Option<String>,
    pub message: String,
}

impl RenderedLogLine {
    pub fn latency_nanos(&self) -> Option<u64> {
        self.duration
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    pub fn latency_human(&self) -> Option<String> {
        self.duration.map(|d| format!("{:?}", d))
    }
}

const SQL_KIND: &str = "sql";
const UNKNOWN_KIND: &str = "log";

const YELLOW: &str = "\x1b[33m";
const MAGENTA: &str = "\x1b[35m";
const BLUE: &str = "\x1b[34m";
const ROWS: &str = "\x1b[36;31m";
const RED_BOLD: &str = "\x1b[31;1m";
const RESET: &str = "\x1b[0m";

/// Renders and emits query log lines for one handle.
#[derive(Debug, Clone)]
pub struct QueryLogger {
    label: String,
    options: FormatOptions,
    clock: Arc<dyn Clock>,
}

impl QueryLogger {
    pub fn new(label: impl Into<String>, options: FormatOptions) -> Self {
        Self {
            label: label.into(),
            options,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn options(&self) -> FormatOptions {
        self.options
    }

    pub fn render(&self, event: &LogEvent) -> RenderedLogLine {
        match event {
            LogEvent::Query(query) => self.render_query(query),
            LogEvent::Generic(parts) => self.render_generic(parts),
        }
    }

    /// Render and emit at debug level.
    pub fn log(&self, event: &LogEvent) {
        let line = self.render(event);
        let logged_at = line.timestamp.format("%Y-%m-%d %H:%M:%S");

        if line.kind == SQL_KIND {
            tracing::debug!(
                db_log = %self.label,
                db_type = %line.kind,
                logged_at = %logged_at,
                src = line.source.as_deref().unwrap_or_default(),
                latency = line.latency_nanos().unwrap_or_default(),
                latency_human = line.latency_human().as_deref().unwrap_or_default(),
                rows_affected = line.rows_affected.unwrap_or_default(),
                caller = line.caller.as_deref(),
                "{}",
                line.message
            );
        } else {
            tracing::debug!(
                db_log = %self.label,
                db_type = %line.kind,
                logged_at = %logged_at,
                "{}",
                line.message
            );
        }
    }

    fn render_query(&self, query: &QueryEvent) -> RenderedLogLine {
        let formatted: Vec<String> = query.values.iter().map(BindValue::format_for_log).collect();
        let sql = substitute(&query.sql, &formatted);
        let latency = format!("{:?}", query.duration);

        let message = if self.options.with_color {
            format!(
                "\n{YELLOW}[ {latency} ]{RESET} \n{MAGENTA}[ {} ]{RESET} \n{BLUE}[\n {sql} \n]{RESET} \n{ROWS}[ {} rows affected or returned ]{RESET} \n",
                query.source, query.rows_affected,
            )
        } else {
            format!("\n{latency}\n{}\n{sql}\n{}\n", query.source, query.rows_affected)
        };

        let caller = self.options.with_caller.then(|| {
            query
                .callers
                .iter()
                .map(CallSite::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        });

        RenderedLogLine {
            kind: SQL_KIND.to_string(),
            timestamp: self.clock.now(),
            source: Some(query.source.clone()),
            duration: Some(query.duration),
            sql: Some(sql),
            rows_affected: Some(query.rows_affected),
            caller,
            message,
        }
    }

    fn render_generic(&self, parts: &[String]) -> RenderedLogLine {
        let kind = parts
            .first()
            .filter(|k| !k.is_empty())
            .map(String::as_str)
            .unwrap_or(UNKNOWN_KIND);
        let body = parts.get(1..).unwrap_or_default().join(" ");
        let message = if self.options.with_color {
            format!("{RED_BOLD}{body}{RESET}")
        } else {
            body
        };

        RenderedLogLine {
            kind: kind.to_string(),
            timestamp: self.clock.now(),
            source: None,
            duration: None,
            sql: None,
            rows_affected: None,
            caller: None,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()))
    }

    fn logger(with_color: bool, with_caller: bool) -> QueryLogger {
        QueryLogger::new("read", FormatOptions { with_color, with_caller }).with_clock(clock())
    }

    fn query(sql: &str, values: Vec<BindValue>) -> LogEvent {
        LogEvent::Query(QueryEvent {
            source: "src/repo.rs:10".into(),
            duration: Duration::from_micros(1500),
            sql: sql.into(),
            values,
            rows_affected: 3,
            callers: vec![
                CallSite { file: "src/repo.rs", line: 10 },
                CallSite { file: "src/service.rs", line: 22 },
            ],
        })
    }

    #[test]
    fn renders_sql_line() {
        let line = logger(false, false).render(&query(
            "SELECT * FROM books WHERE id = ? AND title = ?",
            vec![BindValue::from(7), BindValue::from("Dune")],
        ));

        assert_eq!(line.kind, "sql");
        assert_eq!(line.timestamp, Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        assert_eq!(line.source.as_deref(), Some("src/repo.rs:10"));
        assert_eq!(line.sql.as_deref(), Some("SELECT * FROM books WHERE id = 7 AND title = 'Dune'"));
        assert_eq!(line.rows_affected, Some(3));
        assert_eq!(line.latency_nanos(), Some(1_500_000));
        assert_eq!(line.latency_human().as_deref(), Some("1.5ms"));
        assert_eq!(line.caller, None);
        assert_eq!(
            line.message,
            "\n1.5ms\nsrc/repo.rs:10\nSELECT * FROM books WHERE id = 7 AND title = 'Dune'\n3\n"
        );
    }

    #[test]
    fn caller_frames_only_when_enabled() {
        let line = logger(false, true).render(&query("SELECT 1", vec![]));
        assert_eq!(line.caller.as_deref(), Some("src/repo.rs:10\nsrc/service.rs:22"));
    }

    #[test]
    fn color_wraps_message_not_fields() {
        let line = logger(true, false).render(&query("SELECT ?", vec![BindValue::Null]));

        assert!(line.message.contains("\x1b[33m[ 1.5ms ]\x1b[0m"));
        assert!(line.message.contains("\x1b[35m[ src/repo.rs:10 ]\x1b[0m"));
        assert!(line.message.contains("\x1b[34m[\n SELECT NULL \n]\x1b[0m"));
        assert!(line.message.contains("\x1b[36;31m[ 3 rows affected or returned ]\x1b[0m"));
        assert_eq!(line.sql.as_deref(), Some("SELECT NULL"));
        assert!(!line.source.unwrap().contains('\x1b'));
    }

    #[test]
    fn zero_values_leave_sql_unchanged() {
        let line = logger(false, false).render(&query("SELECT COUNT(*) FROM books", vec![]));
        assert_eq!(line.sql.as_deref(), Some("SELECT COUNT(*) FROM books"));
    }

    #[test]
    fn indexed_placeholders_by_number() {
        let line = logger(false, false).render(&query(
            "SELECT * FROM t WHERE b = $2 AND a = $1",
            vec![BindValue::from("a"), BindValue::from(2)],
        ));
        assert_eq!(line.sql.as_deref(), Some("SELECT * FROM t WHERE b = 2 AND a = 'a'"));
    }

    #[test]
    fn generic_event() {
        let line = logger(false, false).render(&LogEvent::generic(["error", "src/repo.rs:10", "boom"]));
        assert_eq!(line.kind, "error");
        assert_eq!(line.message, "src/repo.rs:10 boom");
        assert_eq!(line.sql, None);
    }

    #[test]
    fn malformed_generic_events_do_not_panic() {
        let line = logger(true, true).render(&LogEvent::Generic(vec![]));
        assert_eq!(line.kind, "log");
        assert_eq!(line.message, "\x1b[31;1m\x1b[0m");

        let line = logger(false, false).render(&LogEvent::generic(["info"]));
        assert_eq!(line.kind, "info");
        assert_eq!(line.message, "");
    }

    #[test]
    fn log_emits_without_subscriber() {
        let logger = logger(true, true);
        logger.log(&query("SELECT ?", vec![BindValue::from(1)]));
        logger.log(&LogEvent::generic(["error", "oops"]));
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn log_carries_structured_fields() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            logger(false, false).log(&query("SELECT ?", vec![BindValue::from(1)]));
        });

        let out = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(out.contains("db_log=read"), "{out}");
        assert!(out.contains("db_type=sql"), "{out}");
        assert!(out.contains("rows_affected=3"), "{out}");
        assert!(out.contains("SELECT 1"), "{out}");
    }

    #[test]
    fn call_site_captures_caller() {
        let site = CallSite::capture();
        assert!(site.file.ends_with("mod.rs"));
        assert!(site.to_string().contains(':'));
    }
}
