//! # ftpgrab – FTP
//!
//! Async FTP/FTPS client used by the ftpgrab transfer engine:
//!   • Plain FTP, explicit FTPS (AUTH TLS) and implicit FTPS
//!   • PASV / EPSV / PORT / EPRT data channels
//!   • REST offsets for resumed downloads, SIZE probing
//!   • Unix / Windows / MLSD directory listing parser
//!   • Configurable control-channel text encoding

pub mod ftp;

pub use ftp::*;
