//! TCP + TLS transport. Establishes the FTP control connection.
//!
//! Handles plain-TCP connect, implicit-FTPS wrapping, and the
//! timeout policy from `FtpConnectionConfig`.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::tls;
use crate::ftp::types::{FtpConnectionConfig, FtpResponse, FtpSecurityMode};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

/// Establish the control connection and return a ready-to-use codec
/// **plus** the server welcome banner.
///
/// For Explicit FTPS the caller must later issue AUTH TLS themselves
/// (handled in `client.rs`).
pub async fn connect(
    config: &FtpConnectionConfig,
    connector: Option<&TlsConnector>,
) -> FtpResult<(FtpCodec, FtpResponse)> {
    let addr = format!("{}:{}", config.host, config.port);
    let dur = Duration::from_secs(config.connect_timeout_sec);

    let tcp = timeout(dur, TcpStream::connect(&addr))
        .await
        .map_err(|_| FtpError::timeout(format!("TCP connect to {} timed out", addr)))?
        .map_err(|e| FtpError::connection_failed(format!("TCP connect to {}: {}", addr, e)))?;

    tcp.set_nodelay(true).ok();
    log::debug!("TCP connected to {}", addr);

    let mut codec = match (config.security, connector) {
        (FtpSecurityMode::Implicit, Some(connector)) => {
            // Implicit FTPS: TLS wraps the socket immediately.
            let tls = tls::handshake(connector, &config.host, tcp).await?;
            FtpCodec::from_tls(tls, config.encoding)
        }
        (FtpSecurityMode::Implicit, None) => {
            return Err(FtpError::invalid_config(
                "Implicit FTPS requested without a TLS connector",
            ))
        }
        // Plain TCP; explicit FTPS upgrades after the banner.
        _ => FtpCodec::from_tcp(tcp, config.encoding),
    };

    let banner = timeout(dur, codec.read_response())
        .await
        .map_err(|_| FtpError::timeout(format!("No greeting from {} within {:?}", addr, dur)))??;
    if !banner.is_completion() {
        return Err(FtpError::connection_failed(format!(
            "Server refused connection: {}",
            banner.text()
        ))
        .with_code(banner.code));
    }
    Ok((codec, banner))
}
