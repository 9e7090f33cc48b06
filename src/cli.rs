//! Command-line interface.
//!
//! Turns the `ftpgrab` arguments into a validated [`TransferRequest`].

use clap::{ArgAction, CommandFactory, Parser, ValueEnum};
use ftpgrab_core::{
    BackoffKind, Direction, ServerUrl, TransferError, TransferRequest,
};
use ftpgrab_ftp::{
    DataChannelMode, TextEncoding, DEFAULT_CONNECT_TIMEOUT_SEC, DEFAULT_DATA_TIMEOUT_SEC,
};
use std::path::PathBuf;

const ACTION_TABLE: &str = "\
Available actions:
  download, d, dwn    Download --source (host[:port]/path) to --destination
  upload, u, upl      Upload local --source to --destination (host[:port]/path)
  list, ls            List the directory at --source (host[:port]/path)
  help, h, hlp        Show this message";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Action {
    #[default]
    #[value(aliases = ["d", "dwn"])]
    Download,
    #[value(aliases = ["u", "upl"])]
    Upload,
    #[value(alias = "ls")]
    List,
    #[value(aliases = ["h", "hlp"])]
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CliBackoff {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Delay doubles after every failed attempt.
    Exponential,
}

impl From<CliBackoff> for BackoffKind {
    fn from(b: CliBackoff) -> Self {
        match b {
            CliBackoff::Fixed => BackoffKind::Fixed,
            CliBackoff::Exponential => BackoffKind::Exponential,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CliDataMode {
    #[default]
    Pasv,
    Epsv,
    Port,
    Eprt,
}

impl From<CliDataMode> for DataChannelMode {
    fn from(m: CliDataMode) -> Self {
        match m {
            CliDataMode::Pasv => DataChannelMode::Passive,
            CliDataMode::Epsv => DataChannelMode::ExtendedPassive,
            CliDataMode::Port => DataChannelMode::Active,
            CliDataMode::Eprt => DataChannelMode::ExtendedActive,
        }
    }
}

/// ftpgrab - FTP/FTPS client with resumable, retrying downloads
#[derive(Debug, Parser)]
#[command(
    name = "ftpgrab",
    version,
    about = "FTP/FTPS client with resumable, retrying downloads",
    after_help = ACTION_TABLE
)]
pub struct Cli {
    /// Action to run
    #[arg(short = 'a', long = "action", value_enum, default_value_t = Action::Download)]
    pub action: Action,

    /// Source: server address for download/list, local file for upload
    #[arg(short = 's', long = "source", value_name = "PATH")]
    pub source: Option<String>,

    /// Destination: local file for download, server address for upload
    #[arg(short = 'd', long = "destination", value_name = "PATH")]
    pub destination: Option<String>,

    /// Username
    #[arg(long = "user", default_value = "anonymous")]
    pub user: String,

    /// Password
    #[arg(long = "pass", default_value = "")]
    pub pass: String,

    /// Use TLS (explicit AUTH TLS unless --implicit-tls)
    #[arg(long = "ssl")]
    pub ssl: bool,

    /// Use implicit FTPS (TLS from the first byte); requires --ssl
    #[arg(long = "implicit-tls")]
    pub implicit_tls: bool,

    /// Don't verify the server certificate
    #[arg(short = 'I', long = "ignore-cert")]
    pub ignore_cert: bool,

    /// Control channel and listing encoding
    #[arg(short = 'e', long = "encoding", default_value = "utf-8", value_parser = parse_encoding)]
    pub encoding: TextEncoding,

    /// Continue a download from the local file's length
    #[arg(short = 'c', long = "resume")]
    pub resume: bool,

    /// Start the download from byte N
    #[arg(long = "offset", default_value_t = 0, value_name = "N")]
    pub offset: u64,

    /// Retries after a failed download attempt (-1 = unlimited)
    #[arg(
        short = 'r',
        long = "retries",
        default_value_t = 0,
        allow_negative_numbers = true,
        value_name = "N"
    )]
    pub retries: i32,

    /// Delay between retries, in tenths of a second
    #[arg(short = 'p', long = "delay", default_value_t = 10, value_name = "N")]
    pub delay: u32,

    /// Retry spacing
    #[arg(long = "backoff", value_enum, default_value_t = CliBackoff::Fixed)]
    pub backoff: CliBackoff,

    /// Data channel mode
    #[arg(long = "data-mode", value_enum, default_value_t = CliDataMode::Pasv)]
    pub data_mode: CliDataMode,

    /// Connect timeout in seconds
    #[arg(long = "connect-timeout", default_value_t = DEFAULT_CONNECT_TIMEOUT_SEC, value_name = "SECONDS")]
    pub connect_timeout: u64,

    /// Seconds without a data chunk or a server reply before the attempt fails
    #[arg(long = "data-timeout", default_value_t = DEFAULT_DATA_TIMEOUT_SEC, value_name = "SECONDS")]
    pub data_timeout: u64,

    /// Increase verbosity (can be repeated: -v, -vv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Full help: option list followed by the action table.
    pub fn help_text() -> String {
        Self::command().render_help().to_string()
    }

    /// Build the validated request for a download, upload or list action.
    pub fn to_request(&self) -> Result<TransferRequest, TransferError> {
        let (direction, server, local) = match self.action {
            Action::Download | Action::List => {
                (Direction::Download, &self.source, &self.destination)
            }
            Action::Upload => (Direction::Upload, &self.destination, &self.source),
            Action::Help => {
                return Err(TransferError::Configuration(
                    "help does not take a transfer request".into(),
                ))
            }
        };

        let server = server.as_deref().filter(|s| !s.trim().is_empty()).ok_or_else(|| {
            let flag = match direction {
                Direction::Download => "--source",
                Direction::Upload => "--destination",
            };
            TransferError::Configuration(format!("{} must name a server (host[:port]/path)", flag))
        })?;
        let url = ServerUrl::parse(server)?;

        let mut request = TransferRequest::for_server(&url, direction);
        request.username = self.user.clone();
        request.password = self.pass.clone();
        request.use_tls = self.ssl;
        request.implicit_tls = self.implicit_tls;
        request.ignore_certificate = self.ignore_cert;
        request.encoding = self.encoding;
        request.local_path = local
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_default();
        request.resume = self.resume;
        request.start_offset = self.offset;
        request.retry_limit = self.retries;
        request.retry_delay = self.delay;
        request.backoff = self.backoff.into();
        request.data_channel_mode = self.data_mode.into();
        request.connect_timeout_sec = self.connect_timeout;
        request.data_timeout_sec = self.data_timeout;

        request.validate()
    }
}

fn parse_encoding(s: &str) -> Result<TextEncoding, String> {
    s.parse().map_err(|e: ftpgrab_ftp::FtpError| e.message)
}
