//! Validated transfer parameters.
//!
//! A `TransferRequest` is assembled by the command line front end and
//! checked once with [`TransferRequest::validate`]; the engine assumes a
//! validated request.

use crate::error::{Result, TransferError};
use crate::retry::{ExponentialBackoff, FixedDelay, RetryBudget, RetryPolicy, DELAY_UNIT};
use ftpgrab_ftp::{
    DataChannelMode, FtpConnectionConfig, FtpSecurityMode, TextEncoding, TransferType,
    DEFAULT_CONNECT_TIMEOUT_SEC, DEFAULT_DATA_TIMEOUT_SEC,
};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_FTP_PORT: u16 = 21;
pub const DEFAULT_IMPLICIT_FTPS_PORT: u16 = 990;

/// `host[:port]/path`, with an optional `ftp://` or `ftps://` scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerUrl {
    pub host: String,
    pub port: Option<u16>,
    /// Always starts with `/`.
    pub path: String,
}

impl ServerUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let rest = ["ftp://", "ftps://"]
            .iter()
            .find_map(|scheme| {
                trimmed
                    .get(..scheme.len())
                    .filter(|p| p.eq_ignore_ascii_case(scheme))
                    .map(|_| &trimmed[scheme.len()..])
            })
            .unwrap_or(trimmed);

        let (authority, path) = rest.split_once('/').ok_or_else(|| {
            TransferError::Configuration(format!(
                "server address '{}' must look like host[:port]/path",
                raw
            ))
        })?;

        let (host, port) = split_host_port(authority)?;
        if host.is_empty() {
            return Err(TransferError::Configuration(format!(
                "server address '{}' has no host",
                raw
            )));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            path: format!("/{}", path),
        })
    }
}

/// Split `host:port`, `[v6]:port`, `[v6]` or a bare host.
fn split_host_port(authority: &str) -> Result<(&str, Option<u16>)> {
    let bad_port = |p: &str| {
        TransferError::Configuration(format!("invalid port '{}' in server address", p))
    };

    if let Some(inner) = authority.strip_prefix('[') {
        let (host, after) = inner
            .split_once(']')
            .ok_or_else(|| TransferError::Configuration("unterminated '[' in host".into()))?;
        return match after.strip_prefix(':') {
            Some(p) => Ok((host, Some(p.parse().map_err(|_| bad_port(p))?))),
            None if after.is_empty() => Ok((host, None)),
            None => Err(bad_port(after)),
        };
    }

    match authority.rsplit_once(':') {
        Some((host, p)) => Ok((host, Some(p.parse().map_err(|_| bad_port(p))?))),
        None => Ok((authority, None)),
    }
}

impl fmt::Display for ServerUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) if self.host.contains(':') => write!(f, "[{}]:{}{}", self.host, port, self.path),
            Some(port) => write!(f, "{}:{}{}", self.host, port, self.path),
            None => write!(f, "{}{}", self.host, self.path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

/// Spacing between download retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub host: String,
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
    pub use_tls: bool,
    /// TLS from the first byte instead of `AUTH TLS`; only with `use_tls`.
    pub implicit_tls: bool,
    pub ignore_certificate: bool,
    pub encoding: TextEncoding,
    pub local_path: PathBuf,
    pub remote_path: String,
    pub direction: Direction,
    pub resume: bool,
    /// -1 = unlimited, 0 = no retry, n = n retries.
    pub retry_limit: i32,
    /// In units of 100 ms.
    pub retry_delay: u32,
    pub backoff: BackoffKind,
    pub start_offset: u64,
    pub data_channel_mode: DataChannelMode,
    pub connect_timeout_sec: u64,
    pub data_timeout_sec: u64,
}

impl Default for TransferRequest {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: None,
            username: "anonymous".into(),
            password: String::new(),
            use_tls: false,
            implicit_tls: false,
            ignore_certificate: false,
            encoding: TextEncoding::Utf8,
            local_path: PathBuf::new(),
            remote_path: "/".into(),
            direction: Direction::Download,
            resume: false,
            retry_limit: 0,
            retry_delay: 10,
            backoff: BackoffKind::Fixed,
            start_offset: 0,
            data_channel_mode: DataChannelMode::Passive,
            connect_timeout_sec: DEFAULT_CONNECT_TIMEOUT_SEC,
            data_timeout_sec: DEFAULT_DATA_TIMEOUT_SEC,
        }
    }
}

impl TransferRequest {
    /// Request addressed at `url` (host, port and remote path taken from it).
    pub fn for_server(url: &ServerUrl, direction: Direction) -> Self {
        Self {
            host: url.host.clone(),
            port: url.port,
            remote_path: url.path.clone(),
            direction,
            ..Default::default()
        }
    }

    /// Check invariants and fill in derived defaults.
    ///
    /// A download without a local destination saves to the remote file's
    /// base name in the current directory.
    pub fn validate(mut self) -> Result<Self> {
        if self.host.trim().is_empty() {
            return Err(TransferError::Configuration("server address is empty".into()));
        }
        if self.retry_limit < -1 {
            return Err(TransferError::Configuration(format!(
                "retry count must be -1 (unlimited) or greater, got {}",
                self.retry_limit
            )));
        }
        if self.connect_timeout_sec == 0 || self.data_timeout_sec == 0 {
            return Err(TransferError::Configuration(
                "timeouts must be at least one second".into(),
            ));
        }
        if self.implicit_tls && !self.use_tls {
            return Err(TransferError::Configuration(
                "implicit TLS requires --ssl".into(),
            ));
        }

        match self.direction {
            Direction::Download => {
                if self.local_path.as_os_str().is_empty() {
                    let name = remote_basename(&self.remote_path);
                    if name.is_empty() {
                        return Err(TransferError::Configuration(format!(
                            "cannot derive a local file name from '{}'",
                            self.remote_path
                        )));
                    }
                    self.local_path = PathBuf::from(name);
                }
            }
            Direction::Upload => {
                if self.local_path.as_os_str().is_empty() {
                    return Err(TransferError::Configuration(
                        "upload needs a local source file".into(),
                    ));
                }
            }
        }
        Ok(self)
    }

    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.use_tls && self.implicit_tls {
            DEFAULT_IMPLICIT_FTPS_PORT
        } else {
            DEFAULT_FTP_PORT
        })
    }

    /// Longest wait for a data chunk or a pre-transfer reply.
    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_timeout_sec)
    }

    /// Upper bound for connecting, securing and logging in.
    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_sec + self.data_timeout_sec)
    }

    pub fn retry_budget(&self) -> RetryBudget {
        RetryBudget::from_limit(self.retry_limit)
    }

    pub fn retry_delay_duration(&self) -> Duration {
        DELAY_UNIT * self.retry_delay
    }

    /// Retry policy described by the request.
    pub fn retry_policy(&self) -> Box<dyn RetryPolicy> {
        match self.backoff {
            BackoffKind::Fixed => {
                Box::new(FixedDelay::new(self.retry_budget(), self.retry_delay_duration()))
            }
            BackoffKind::Exponential => Box::new(ExponentialBackoff::new(
                self.retry_budget(),
                self.retry_delay_duration(),
            )),
        }
    }

    /// Protocol-level connection settings.
    pub fn connection_config(&self) -> FtpConnectionConfig {
        let security = match (self.use_tls, self.implicit_tls) {
            (false, _) => FtpSecurityMode::None,
            (true, false) => FtpSecurityMode::Explicit,
            (true, true) => FtpSecurityMode::Implicit,
        };
        FtpConnectionConfig {
            host: self.host.clone(),
            port: self.effective_port(),
            username: self.username.clone(),
            password: self.password.clone(),
            security,
            transfer_type: TransferType::Binary,
            data_channel_mode: self.data_channel_mode,
            connect_timeout_sec: self.connect_timeout_sec,
            data_timeout_sec: self.data_timeout_sec,
            accept_invalid_certs: self.ignore_certificate,
            encoding: self.encoding,
            active_bind_address: None,
        }
    }
}

/// Last path segment of a remote path, without separators.
pub fn remote_basename(remote_path: &str) -> &str {
    remote_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
}
