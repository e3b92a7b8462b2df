//! Connection parameters as read from the application config.
//!
//! Numeric pool settings follow the zero-means-default convention: a value of
//! `0` selects the default rather than a literal zero limit.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};

pub const DEFAULT_MAX_IDLE_CONNS: u32 = 2;
pub const DEFAULT_MAX_OPEN_CONNS: u32 = 5;
pub const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(14_400);
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Relational database product a connection targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Backend {
    Mysql,
    Postgres,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Mysql => "mysql",
            Backend::Postgres => "postgres",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Backend::Mysql),
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            _ => Err(DbError::unsupported_driver(s)),
        }
    }
}

impl TryFrom<String> for Backend {
    type Error = DbError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Backend> for String {
    fn from(backend: Backend) -> Self {
        backend.as_str().to_string()
    }
}

/// Parameters for one database handle.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSpec {
    #[serde(rename = "type", alias = "backend")]
    pub backend: Backend,
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(alias = "dbname")]
    pub database: String,
    pub max_idle_conns: u32,
    pub max_open_conns: u32,
    pub max_lifetime_sec: u64,
    pub read_timeout: String,
    pub write_timeout: String,
    pub search_path: String,
}

impl Default for ConnectionSpec {
    fn default() -> Self {
        Self {
            backend: Backend::Mysql,
            debug: false,
            host: "127.0.0.1".to_string(),
            port: 3306,
            username: String::new(),
            password: String::new(),
            database: String::new(),
            max_idle_conns: 0,
            max_open_conns: 0,
            max_lifetime_sec: 0,
            read_timeout: String::new(),
            write_timeout: String::new(),
            search_path: String::new(),
        }
    }
}

// Hand-written so the password never reaches a log line.
impl fmt::Debug for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSpec")
            .field("backend", &self.backend)
            .field("debug", &self.debug)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("database", &self.database)
            .field("max_idle_conns", &self.max_idle_conns)
            .field("max_open_conns", &self.max_open_conns)
            .field("max_lifetime_sec", &self.max_lifetime_sec)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("search_path", &self.search_path)
            .finish()
    }
}

impl ConnectionSpec {
    /// Effective pool limits with defaults applied.
    pub fn pool_limits(&self) -> PoolLimits {
        PoolLimits {
            max_idle: non_zero_or(self.max_idle_conns, DEFAULT_MAX_IDLE_CONNS),
            max_open: non_zero_or(self.max_open_conns, DEFAULT_MAX_OPEN_CONNS),
            max_lifetime: if self.max_lifetime_sec == 0 {
                DEFAULT_MAX_LIFETIME
            } else {
                Duration::from_secs(self.max_lifetime_sec)
            },
        }
    }

    /// Parsed read/write timeouts; empty or zero values become 10s.
    pub fn timeouts(&self) -> Result<Timeouts> {
        Ok(Timeouts {
            read: parse_timeout("read_timeout", &self.read_timeout)?,
            write: parse_timeout("write_timeout", &self.write_timeout)?,
        })
    }

    /// Backend-specific connection string with the password masked.
    ///
    /// Logged for diagnostics only; the pool is built from typed options. The
    /// MySQL `readTimeout`/`writeTimeout` shown here are not applied as socket
    /// timeouts: the larger of the two bounds pool acquisition, and
    /// `max_idle_conns` becomes the pool's warm minimum rather than an idle cap.
    pub fn connection_string(&self) -> Result<String> {
        let timeouts = self.timeouts()?;
        let dsn = match self.backend {
            Backend::Mysql => format!(
                "mysql://{}:***@{}:{}/{}?charset=utf8mb4&readTimeout={:?}&writeTimeout={:?}",
                self.username, self.host, self.port, self.database, timeouts.read, timeouts.write,
            ),
            Backend::Postgres => {
                let mut dsn = format!(
                    "user={} password=*** host={} port={} dbname={} sslmode=disable",
                    self.username, self.host, self.port, self.database,
                );
                if !self.search_path.trim().is_empty() {
                    dsn.push_str(&format!(" search_path={}", self.search_path.trim()));
                }
                dsn
            }
        };
        Ok(dsn)
    }
}

/// Read and write halves of the relational config, plus logger switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RdbmsConfig {
    pub read: ConnectionSpec,
    pub write: ConnectionSpec,
    pub with_color: bool,
    pub with_caller: bool,
}

/// Pool tuning after defaults are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub max_idle: u32,
    pub max_open: u32,
    pub max_lifetime: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub read: Duration,
    pub write: Duration,
}

fn non_zero_or(value: u32, default: u32) -> u32 {
    if value == 0 {
        default
    } else {
        value
    }
}

fn parse_timeout(field: &'static str, value: &str) -> Result<Duration> {
    if value.trim().is_empty() {
        return Ok(DEFAULT_IO_TIMEOUT);
    }
    let parsed = parse_duration(value).ok_or_else(|| DbError::invalid_duration(field, value))?;
    if parsed.is_zero() {
        Ok(DEFAULT_IO_TIMEOUT)
    } else {
        Ok(parsed)
    }
}

static DURATION_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)(ns|us|µs|ms|s|m|h)").expect("valid regex"));

/// Parse a duration such as `10s`, `1m30s` or `250ms`.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input == "0" {
        return Some(Duration::ZERO);
    }

    let mut consumed = 0;
    let mut total = 0f64;
    for caps in DURATION_PART.captures_iter(input) {
        let whole = caps.get(0)?;
        if whole.start() != consumed {
            return None;
        }
        consumed = whole.end();

        let amount: f64 = caps[1].parse().ok()?;
        let unit_secs = match &caps[2] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        total += amount * unit_secs;
    }

    if consumed == 0 || consumed != input.len() {
        return None;
    }
    Duration::try_from_secs_f64(total).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_pool_settings_fall_back_to_defaults() {
        let spec = ConnectionSpec::default();
        let limits = spec.pool_limits();
        assert_eq!(limits.max_idle, 2);
        assert_eq!(limits.max_open, 5);
        assert_eq!(limits.max_lifetime, Duration::from_secs(14_400));
    }

    #[test]
    fn explicit_pool_settings_are_kept() {
        let spec = ConnectionSpec {
            max_idle_conns: 7,
            max_open_conns: 20,
            max_lifetime_sec: 60,
            ..Default::default()
        };
        let limits = spec.pool_limits();
        assert_eq!(limits.max_idle, 7);
        assert_eq!(limits.max_open, 20);
        assert_eq!(limits.max_lifetime, Duration::from_secs(60));
    }

    #[test]
    fn timeouts_default_to_ten_seconds() {
        let spec = ConnectionSpec {
            write_timeout: "3s".into(),
            ..Default::default()
        };
        let timeouts = spec.timeouts().unwrap();
        assert_eq!(timeouts.read, Duration::from_secs(10));
        assert_eq!(timeouts.write, Duration::from_secs(3));
    }

    #[test]
    fn bad_timeout_is_a_config_error() {
        let spec = ConnectionSpec {
            read_timeout: "ten seconds".into(),
            ..Default::default()
        };
        let err = spec.timeouts().unwrap_err();
        assert!(matches!(err, DbError::InvalidDuration { field: "read_timeout", .. }));
    }

    #[test]
    fn parses_go_durations() {
        assert_eq!(parse_duration("10s"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("1m30s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("1.5h"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("0"), Some(Duration::ZERO));
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("s10"), None);
        assert_eq!(parse_duration("10s!"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn backend_parsing() {
        assert_eq!("mysql".parse::<Backend>().unwrap(), Backend::Mysql);
        assert_eq!("Postgres".parse::<Backend>().unwrap(), Backend::Postgres);
        let err = "oracle".parse::<Backend>().unwrap_err();
        assert!(err.to_string().contains("unsupported sql driver"));
    }

    #[test]
    fn unknown_backend_fails_deserialization() {
        let err = toml::from_str::<ConnectionSpec>("type = \"oracle\"").unwrap_err();
        assert!(err.to_string().contains("unsupported sql driver: oracle"));
    }

    #[test]
    fn deserializes_rdbms_config() {
        let cfg: RdbmsConfig = toml::from_str(
            r#"
            with_color = true

            [read]
            type = "mysql"
            host = "db-ro"
            port = 3307
            username = "u"
            password = "p"
            dbname = "app"
            debug = true

            [write]
            type = "mysql"
            host = "db"
            database = "app"
            max_open_conns = 10
            "#,
        )
        .unwrap();

        assert!(cfg.with_color);
        assert!(!cfg.with_caller);
        assert_eq!(cfg.read.host, "db-ro");
        assert_eq!(cfg.read.port, 3307);
        assert_eq!(cfg.read.database, "app");
        assert!(cfg.read.debug);
        assert_eq!(cfg.write.port, 3306);
        assert_eq!(cfg.write.pool_limits().max_open, 10);
    }

    #[test]
    fn connection_string_masks_password() {
        let spec = ConnectionSpec {
            username: "u".into(),
            password: "secret".into(),
            host: "db".into(),
            database: "app".into(),
            ..Default::default()
        };
        let dsn = spec.connection_string().unwrap();
        assert_eq!(
            dsn,
            "mysql://u:***@db:3306/app?charset=utf8mb4&readTimeout=10s&writeTimeout=10s"
        );
        assert!(!format!("{:?}", spec).contains("secret"));
    }

    #[test]
    fn postgres_connection_string_includes_search_path() {
        let spec = ConnectionSpec {
            backend: Backend::Postgres,
            username: "u".into(),
            host: "db".into(),
            port: 5432,
            database: "app".into(),
            search_path: "gateway".into(),
            ..Default::default()
        };
        let dsn = spec.connection_string().unwrap();
        assert!(dsn.ends_with("sslmode=disable search_path=gateway"));
    }
}
