//! Shared types for the FTP crate.

use crate::ftp::encoding::TextEncoding;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

// ─── Connection ──────────────────────────────────────────────────────

/// Security mode for the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpSecurityMode {
    /// Plain-text FTP (port 21).
    None,
    /// Explicit FTPS: starts plain then upgrades via AUTH TLS (port 21).
    Explicit,
    /// Implicit FTPS: TLS from the first byte (port 990).
    Implicit,
}

impl Default for FtpSecurityMode {
    fn default() -> Self {
        Self::None
    }
}

/// Transfer type (RFC 959 TYPE command).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Ascii,
    Binary,
}

impl Default for TransferType {
    fn default() -> Self {
        Self::Binary
    }
}

/// How the data channel is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataChannelMode {
    Passive,
    ExtendedPassive,
    Active,
    ExtendedActive,
}

impl Default for DataChannelMode {
    fn default() -> Self {
        Self::Passive
    }
}

/// Configuration for a single FTP connection.
#[derive(Debug, Clone)]
pub struct FtpConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub security: FtpSecurityMode,
    pub transfer_type: TransferType,
    pub data_channel_mode: DataChannelMode,
    /// Connection timeout in seconds.
    pub connect_timeout_sec: u64,
    /// Data-channel timeout in seconds.
    pub data_timeout_sec: u64,
    /// Accept self-signed / untrusted certificates.
    pub accept_invalid_certs: bool,
    /// Encoding of the control channel and of listing bodies.
    pub encoding: TextEncoding,
    /// Local address to bind for active-mode data connections.
    pub active_bind_address: Option<String>,
}

pub const DEFAULT_CONNECT_TIMEOUT_SEC: u64 = 15;
pub const DEFAULT_DATA_TIMEOUT_SEC: u64 = 30;

impl Default for FtpConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 21,
            username: "anonymous".into(),
            password: String::new(),
            security: FtpSecurityMode::None,
            transfer_type: TransferType::Binary,
            data_channel_mode: DataChannelMode::Passive,
            connect_timeout_sec: DEFAULT_CONNECT_TIMEOUT_SEC,
            data_timeout_sec: DEFAULT_DATA_TIMEOUT_SEC,
            accept_invalid_certs: false,
            encoding: TextEncoding::Utf8,
            active_bind_address: None,
        }
    }
}

// ─── Directory Listing ───────────────────────────────────────────────

/// Type of a remote filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpEntryKind {
    File,
    Directory,
    Symlink,
    Unknown,
}

/// One entry from a directory listing (parsed from LIST or MLSD output).
#[derive(Debug, Clone)]
pub struct FtpEntry {
    pub name: String,
    pub kind: FtpEntryKind,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub permissions: Option<String>,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub link_target: Option<String>,
    /// Raw line from the server (for debugging).
    pub raw: Option<String>,
    /// MLSD fact map (e.g. "type" → "file", "size" → "1234").
    pub facts: HashMap<String, String>,
}

impl FtpEntry {
    /// Entry with only a name, kind and size; everything else empty.
    pub fn new(name: impl Into<String>, kind: FtpEntryKind, size: u64) -> Self {
        Self {
            name: name.into(),
            kind,
            size,
            modified: None,
            permissions: None,
            owner: None,
            group: None,
            link_target: None,
            raw: None,
            facts: HashMap::new(),
        }
    }
}

// ─── FTP Response ────────────────────────────────────────────────────

/// A single FTP response (may be multi-line).
#[derive(Debug, Clone)]
pub struct FtpResponse {
    pub code: u16,
    pub lines: Vec<String>,
}

impl FtpResponse {
    /// Full response text (all lines joined).
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Whether the response code indicates success (1xx–3xx).
    pub fn is_success(&self) -> bool {
        self.code < 400
    }

    /// Whether this is a positive-preliminary reply (1xx).
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Whether this is a positive-completion reply (2xx).
    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Whether this is a positive-intermediate reply (3xx).
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }
}

// ─── Server Capabilities ─────────────────────────────────────────────

/// Parsed FEAT response.
#[derive(Debug, Clone, Default)]
pub struct ServerFeatures {
    pub mlsd: bool,
    pub size: bool,
    pub utf8: bool,
    pub raw_features: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_classes() {
        let r = FtpResponse { code: 150, lines: vec!["150 Opening".into()] };
        assert!(r.is_preliminary());
        assert!(r.is_success());
        assert!(!r.is_completion());

        let r = FtpResponse { code: 350, lines: vec!["350 Restarting".into()] };
        assert!(r.is_intermediate());

        let r = FtpResponse { code: 550, lines: vec!["550 No such file".into()] };
        assert!(!r.is_success());
    }

    #[test]
    fn default_config_is_anonymous_plain_passive() {
        let c = FtpConnectionConfig::default();
        assert_eq!(c.port, 21);
        assert_eq!(c.username, "anonymous");
        assert_eq!(c.security, FtpSecurityMode::None);
        assert_eq!(c.data_channel_mode, DataChannelMode::Passive);
        assert_eq!(c.encoding, TextEncoding::Utf8);
    }
}
