//! # ftpgrab-ftp: FTP/FTPS Client
//!
//! Implementation of the FTP protocol (RFC 959) with the extensions a
//! download/upload client needs:
//! - **RFC 2228 / 4217**: AUTH TLS / FTPS (Explicit & Implicit)
//! - **RFC 3659**: MLSD, SIZE, REST STREAM
//! - **RFC 2389**: FEAT negotiation
//! - **RFC 2428**: EPSV / EPRT (IPv6-ready)
//!
//! Architecture:
//! - `types`: data structures, enums, config
//! - `error`: FTP-specific error type
//! - `encoding`: control-channel text encodings
//! - `protocol`: low-level command/response codec
//! - `connection`: TCP + implicit TLS transport
//! - `tls`: TLS upgrade and FTPS configuration
//! - `transfer`: data channel management (PASV/EPSV/PORT/EPRT)
//! - `parser`: Unix/Windows/MLSD LIST response parsing
//! - `client`: stateful FTP client (login, FEAT, TYPE, LIST, SIZE)
//! - `file_ops`: RETR/STOR data streams with REST offsets

pub mod types;
pub mod error;
pub mod encoding;
pub mod protocol;
pub mod connection;
pub mod tls;
pub mod transfer;
pub mod parser;
pub mod client;
pub mod file_ops;

pub use client::FtpClient;
pub use encoding::TextEncoding;
pub use error::{FtpError, FtpErrorKind, FtpResult};
pub use transfer::DataStream;
pub use types::*;
