use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use stubby_gateway::telemetry::LogFormat;

pub const LISTEN_ADDR_ENV: &str = "STUBBY_LISTEN_ADDR";
pub const BASE_URL_ENV: &str = "STUBBY_BASE_URL";
pub const LOG_LEVEL_ENV: &str = "STUBBY_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "STUBBY_LOG_FORMAT";
pub const FILE_STORAGE_PATH_ENV: &str = "STUBBY_FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "STUBBY_DATABASE_DSN";
pub const DELETE_QUEUE_CAPACITY_ENV: &str = "STUBBY_DELETE_QUEUE_CAPACITY";
pub const REQUEST_TIMEOUT_MS_ENV: &str = "STUBBY_REQUEST_TIMEOUT_MS";
pub const DB_MAX_CONNECTIONS_ENV: &str = "STUBBY_DB_MAX_CONNECTIONS";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Parser)]
#[command(name = "stubby-gateway")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Prefix of every short URL handed back to clients.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, env = LOG_LEVEL_ENV, default_value = "info")]
    pub log_level: String,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Append-only log file; used when no database DSN is set.
    #[arg(long, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<PathBuf>,

    #[arg(long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    #[arg(long, env = DELETE_QUEUE_CAPACITY_ENV, default_value_t = 100)]
    pub delete_queue_capacity: usize,

    /// Per-request deadline for store calls, in milliseconds. 0 disables it.
    #[arg(long, env = REQUEST_TIMEOUT_MS_ENV, default_value_t = 5000)]
    pub request_timeout_ms: u64,

    #[arg(long, env = DB_MAX_CONNECTIONS_ENV, default_value_t = 10)]
    pub db_max_connections: u32,
}

impl CLI {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = CLI::try_parse_from(["stubby-gateway"]).unwrap();
        assert_eq!(cli.listen_addr.to_string(), DEFAULT_LISTEN_ADDR);
        assert_eq!(cli.log_format, LogFormat::Text);
        assert_eq!(cli.delete_queue_capacity, 100);
        assert_eq!(cli.request_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let cli = CLI::try_parse_from([
            "stubby-gateway",
            "--request-timeout-ms",
            "0",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.request_timeout(), None);
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
