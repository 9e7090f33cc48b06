//! Data-channel management for FTP transfers.
//!
//! Supports four modes (RFC 959 + RFC 2428):
//! - **PASV**: server opens a port, client connects
//! - **EPSV**: extended passive (IPv6-ready)
//! - **PORT**: client opens a port, tells server
//! - **EPRT**: extended active (IPv6-ready)
//!
//! The data socket is TLS-wrapped when the control channel is (PROT P).

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::tls;
use crate::ftp::types::DataChannelMode;
use lazy_static::lazy_static;
use regex::Regex;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

lazy_static! {
    static ref PASV_RE: Regex =
        Regex::new(r"\((\d+),(\d+),(\d+),(\d+),(\d+),(\d+)\)").expect("valid PASV regex");
    static ref EPSV_RE: Regex = Regex::new(r"\|\|\|(\d+)\|").expect("valid EPSV regex");
}

/// Abstraction over a plain or TLS-wrapped data stream.
pub enum DataStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for DataStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DataStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            DataStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for DataStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            DataStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            DataStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DataStream::Plain(s) => Pin::new(s).poll_flush(cx),
            DataStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DataStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            DataStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Where the data connection comes from.
///
/// Passive modes are connected before the transfer command is sent;
/// active modes only get their connection once the server has accepted
/// RETR/STOR, so the listener is kept until `establish`.
pub enum PendingData {
    Connected(TcpStream),
    Listening(TcpListener),
}

/// Prepare a data channel according to the configured mode.
pub async fn prepare_data_channel(
    codec: &mut FtpCodec,
    mode: DataChannelMode,
    host: &str,
    data_timeout: Duration,
    active_bind: Option<&str>,
) -> FtpResult<PendingData> {
    match mode {
        DataChannelMode::Passive => Ok(PendingData::Connected(
            open_pasv(codec, host, data_timeout).await?,
        )),
        DataChannelMode::ExtendedPassive => Ok(PendingData::Connected(
            open_epsv(codec, host, data_timeout).await?,
        )),
        DataChannelMode::Active => Ok(PendingData::Listening(open_port(codec, active_bind).await?)),
        DataChannelMode::ExtendedActive => {
            Ok(PendingData::Listening(open_eprt(codec, active_bind).await?))
        }
    }
}

/// Finish establishing the data channel (accept for active modes) and
/// wrap it in TLS when `connector` is given.
pub async fn establish(
    pending: PendingData,
    host: &str,
    connector: Option<&TlsConnector>,
    data_timeout: Duration,
) -> FtpResult<DataStream> {
    let tcp = match pending {
        PendingData::Connected(tcp) => tcp,
        PendingData::Listening(listener) => {
            let (tcp, peer) = timeout(data_timeout, listener.accept())
                .await
                .map_err(|_| FtpError::data_channel("Active data accept timed out"))?
                .map_err(|e| FtpError::data_channel(format!("Active data accept: {}", e)))?;
            log::debug!("Accepted active data connection from {}", peer);
            tcp
        }
    };

    match connector {
        Some(connector) => {
            let tls = tls::handshake(connector, host, tcp)
                .await
                .map_err(|e| FtpError::tls_failed(format!("Data channel TLS: {}", e.message)))?;
            Ok(DataStream::Tls(Box::new(tls)))
        }
        None => Ok(DataStream::Plain(tcp)),
    }
}

// ─── PASV ────────────────────────────────────────────────────────────

/// Issue `PASV`, parse the response, connect to the returned address.
///
/// Response format: `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)`
async fn open_pasv(codec: &mut FtpCodec, host: &str, data_timeout: Duration) -> FtpResult<TcpStream> {
    let resp = codec.expect_ok("PASV").await?;
    let addr = parse_pasv_response(&resp.text())?;
    // Servers behind NAT sometimes advertise 0.0.0.0; fall back to the control host.
    let target = if addr.ip().is_unspecified() {
        format!("{}:{}", host, addr.port())
    } else {
        addr.to_string()
    };
    let tcp = timeout(data_timeout, TcpStream::connect(&target))
        .await
        .map_err(|_| FtpError::data_channel("PASV data connect timed out"))?
        .map_err(|e| FtpError::data_channel(format!("PASV data connect to {}: {}", target, e)))?;
    Ok(tcp)
}

/// Parse `(h1,h2,h3,h4,p1,p2)` from a 227 response.
pub fn parse_pasv_response(text: &str) -> FtpResult<SocketAddr> {
    let caps = PASV_RE
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse PASV: {}", text)))?;

    let nums: Vec<u8> = (1..=6)
        .map(|i| {
            caps[i]
                .parse::<u8>()
                .map_err(|_| FtpError::protocol_error("PASV number out of range"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let ip = IpAddr::from([nums[0], nums[1], nums[2], nums[3]]);
    let port = (nums[4] as u16) * 256 + (nums[5] as u16);
    Ok(SocketAddr::new(ip, port))
}

// ─── EPSV ────────────────────────────────────────────────────────────

/// Issue `EPSV`, parse port, connect to the *same host* on that port.
///
/// Response format: `229 Entering Extended Passive Mode (|||port|)`
async fn open_epsv(
    codec: &mut FtpCodec,
    host: &str,
    data_timeout: Duration,
) -> FtpResult<TcpStream> {
    let resp = codec.expect_ok("EPSV").await?;
    let port = parse_epsv_response(&resp.text())?;
    let addr = format!("{}:{}", host, port);
    let tcp = timeout(data_timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| FtpError::data_channel("EPSV data connect timed out"))?
        .map_err(|e| FtpError::data_channel(format!("EPSV data connect: {}", e)))?;
    Ok(tcp)
}

pub fn parse_epsv_response(text: &str) -> FtpResult<u16> {
    let caps = EPSV_RE
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse EPSV: {}", text)))?;
    caps[1]
        .parse::<u16>()
        .map_err(|_| FtpError::protocol_error("EPSV port out of range"))
}

// ─── PORT ────────────────────────────────────────────────────────────

/// Bind a local TCP listener and tell the server via `PORT`.
async fn open_port(codec: &mut FtpCodec, bind_addr: Option<&str>) -> FtpResult<TcpListener> {
    let listener = bind_listener(codec, bind_addr, "PORT").await?;
    let local = listener
        .local_addr()
        .map_err(|e| FtpError::data_channel(format!("PORT local_addr: {}", e)))?;

    let ip = match local.ip() {
        IpAddr::V4(v4) => v4,
        _ => return Err(FtpError::data_channel("PORT requires IPv4")),
    };
    let octets = ip.octets();
    let port = local.port();

    let cmd = format!(
        "PORT {},{},{},{},{},{}",
        octets[0],
        octets[1],
        octets[2],
        octets[3],
        port / 256,
        port % 256
    );
    codec.expect_ok(&cmd).await?;
    Ok(listener)
}

// ─── EPRT ────────────────────────────────────────────────────────────

/// Bind a local listener and tell the server via `EPRT`.
///
/// Command format: `EPRT |1|ip|port|` (1 = IPv4, 2 = IPv6)
async fn open_eprt(codec: &mut FtpCodec, bind_addr: Option<&str>) -> FtpResult<TcpListener> {
    let listener = bind_listener(codec, bind_addr, "EPRT").await?;
    let local = listener
        .local_addr()
        .map_err(|e| FtpError::data_channel(format!("EPRT local_addr: {}", e)))?;

    let af = match local.ip() {
        IpAddr::V4(_) => 1,
        IpAddr::V6(_) => 2,
    };
    let cmd = format!("EPRT |{}|{}|{}|", af, local.ip(), local.port());
    codec.expect_ok(&cmd).await?;
    Ok(listener)
}

/// Bind on the explicit address, or on the interface the control
/// connection uses so the advertised address is reachable by the server.
async fn bind_listener(
    codec: &FtpCodec,
    bind_addr: Option<&str>,
    what: &str,
) -> FtpResult<TcpListener> {
    let bind = match bind_addr {
        Some(addr) => addr.to_string(),
        None => codec
            .local_addr
            .map(|a| a.ip().to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string()),
    };
    let bind = if bind.contains(':') && !bind.starts_with('[') {
        format!("[{}]:0", bind)
    } else {
        format!("{}:0", bind)
    };
    TcpListener::bind(&bind)
        .await
        .map_err(|e| FtpError::data_channel(format!("{} bind {}: {}", what, bind, e)))
}
