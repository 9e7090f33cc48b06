//! Stateful FTP client. Owns the control connection and issues commands.
//!
//! Lifecycle: `connect()` → optional AUTH TLS → USER/PASS → FEAT →
//! OPTS UTF8 → TYPE. Transfer commands live in `file_ops.rs`.

use crate::ftp::connection;
use crate::ftp::encoding::TextEncoding;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::parser;
use crate::ftp::protocol::FtpCodec;
use crate::ftp::tls;
use crate::ftp::transfer::{self, DataStream, PendingData};
use crate::ftp::types::*;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

/// A connected, logged-in FTP session.
pub struct FtpClient {
    pub codec: FtpCodec,
    pub config: FtpConnectionConfig,
    pub features: ServerFeatures,
    /// Greeting text sent by the server.
    pub banner: String,
    /// Shared by the control and data channels so TLS sessions resume.
    tls: Option<TlsConnector>,
    transfer_type: Option<TransferType>,
    connected: bool,
}

impl FtpClient {
    /// Connect, secure and authenticate according to `config`.
    pub async fn connect(config: FtpConnectionConfig) -> FtpResult<Self> {
        if config.host.trim().is_empty() {
            return Err(FtpError::invalid_config("Host must not be empty"));
        }

        let tls = match config.security {
            FtpSecurityMode::None => None,
            _ => Some(tls::build_tls_connector(config.accept_invalid_certs)?),
        };

        let (mut codec, banner) = connection::connect(&config, tls.as_ref()).await?;
        log::debug!("Server greeting: {}", banner.text());

        if config.security == FtpSecurityMode::Explicit {
            let resp = codec.execute("AUTH TLS").await?;
            if resp.code != 234 && !resp.is_completion() {
                return Err(FtpError::tls_failed(format!("AUTH TLS rejected: {}", resp.text()))
                    .with_code(resp.code));
            }
            if let Some(connector) = tls.as_ref() {
                codec = tls::upgrade_to_tls(codec, &config.host, connector).await?;
            }
        }
        if config.security != FtpSecurityMode::None {
            codec.expect_ok("PBSZ 0").await?;
            codec.expect_ok("PROT P").await?;
        }

        login(&mut codec, &config.username, &config.password).await?;

        let features = probe_features(&mut codec).await;
        if config.encoding == TextEncoding::Utf8 && features.utf8 {
            // Some servers only switch file names to UTF-8 when asked.
            if let Err(e) = codec.execute("OPTS UTF8 ON").await {
                log::debug!("OPTS UTF8 ON failed: {}", e);
            }
        }

        let mut client = Self {
            codec,
            config,
            features,
            banner: banner.text(),
            tls,
            transfer_type: None,
            connected: true,
        };
        client.set_type(client.config.transfer_type).await?;
        log::info!(
            "Logged in to {}:{} as {}",
            client.config.host,
            client.config.port,
            client.config.username
        );
        Ok(client)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }

    /// Send a NOOP to keep the control connection alive.
    pub async fn noop(&mut self) -> FtpResult<()> {
        self.codec.expect_ok("NOOP").await?;
        Ok(())
    }

    /// Current working directory from a PWD reply.
    pub async fn pwd(&mut self) -> FtpResult<String> {
        let resp = self.codec.expect_ok("PWD").await?;
        parse_pwd(&resp.text())
    }

    /// Switch transfer type; skipped when already active.
    pub async fn set_type(&mut self, tt: TransferType) -> FtpResult<()> {
        if self.transfer_type == Some(tt) {
            return Ok(());
        }
        let cmd = match tt {
            TransferType::Ascii => "TYPE A",
            TransferType::Binary => "TYPE I",
        };
        self.codec.expect_ok(cmd).await?;
        self.transfer_type = Some(tt);
        Ok(())
    }

    // ─── Data channel helpers ────────────────────────────────────

    pub(crate) fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.config.data_timeout_sec)
    }

    /// Negotiate the data channel (PASV/EPSV/PORT/EPRT) before a transfer command.
    pub(crate) async fn prepare_data(&mut self) -> FtpResult<PendingData> {
        let timeout = self.data_timeout();
        transfer::prepare_data_channel(
            &mut self.codec,
            self.config.data_channel_mode,
            &self.config.host,
            timeout,
            self.config.active_bind_address.as_deref(),
        )
        .await
    }

    /// Issue `cmd` over a prepared data channel and return the open stream.
    ///
    /// The server must answer with a 1xx preliminary reply; the matching
    /// completion reply is read by `finish_transfer`.
    pub(crate) async fn open_transfer(&mut self, cmd: &str) -> FtpResult<DataStream> {
        let pending = self.prepare_data().await?;
        let resp = self.codec.execute(cmd).await?;
        if !resp.is_preliminary() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        let timeout = self.data_timeout();
        transfer::establish(pending, &self.config.host, self.tls.as_ref(), timeout).await
    }

    /// Read the completion reply (226/250) that follows a closed data stream.
    pub async fn finish_transfer(&mut self) -> FtpResult<()> {
        let dur = self.data_timeout();
        let resp = timeout(dur, self.codec.read_response())
            .await
            .map_err(|_| FtpError::timeout("No transfer completion reply"))??;
        if !resp.is_completion() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        Ok(())
    }

    // ─── Listing ─────────────────────────────────────────────────

    /// List `path` (empty for the current directory). Prefers MLSD.
    pub async fn list(&mut self, path: &str) -> FtpResult<Vec<FtpEntry>> {
        let verb = if self.features.mlsd { "MLSD" } else { "LIST" };
        let cmd = if path.is_empty() {
            verb.to_string()
        } else {
            format!("{} {}", verb, path)
        };
        let body = self.retrieve_text(&cmd).await?;
        let entries = parser::parse_listing(&body);
        log::debug!("{} returned {} entries", cmd, entries.len());
        Ok(entries)
    }

    /// Run a listing-style command and decode its whole data body.
    async fn retrieve_text(&mut self, cmd: &str) -> FtpResult<String> {
        self.set_type(TransferType::Ascii).await?;
        let mut stream = self.open_transfer(cmd).await?;
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await?;
        drop(stream);
        self.finish_transfer().await?;
        Ok(self.codec.encoding.decode(&buf))
    }

    // ─── SIZE ────────────────────────────────────────────────────

    /// Size of a remote file in bytes (RFC 3659 SIZE).
    pub async fn size(&mut self, path: &str) -> FtpResult<u64> {
        // SIZE reports ASCII-converted sizes in TYPE A.
        self.set_type(TransferType::Binary).await?;
        let resp = self.codec.expect_ok(&format!("SIZE {}", path)).await?;
        parse_size(&resp.text())
    }

    // ─── QUIT / ABOR ─────────────────────────────────────────────

    /// Politely close the session. Errors are logged, not returned.
    pub async fn quit(&mut self) {
        if !self.connected {
            return;
        }
        if let Err(e) = self.codec.execute("QUIT").await {
            log::debug!("QUIT failed: {}", e);
        }
        self.connected = false;
    }

    /// Abort an in-progress transfer.
    ///
    /// Servers answer ABOR with 426 for the interrupted transfer followed
    /// by 226, or with a single 226/225 when nothing was running.
    pub async fn abort(&mut self) -> FtpResult<()> {
        let dur = self.data_timeout();
        let resp = timeout(dur, self.codec.execute("ABOR"))
            .await
            .map_err(|_| FtpError::timeout("No reply to ABOR"))??;
        if resp.code == 426 || resp.code == 451 {
            let _ = timeout(dur, self.codec.read_response()).await;
        }
        Ok(())
    }
}

/// USER/PASS exchange. 331 asks for a password, 230 means no password is needed.
async fn login(codec: &mut FtpCodec, user: &str, pass: &str) -> FtpResult<()> {
    let resp = codec.execute(&format!("USER {}", user)).await?;
    let resp = match resp.code {
        230 => return Ok(()),
        331 | 332 => codec.execute(&format!("PASS {}", pass)).await?,
        _ => {
            return Err(FtpError::auth_failed(format!("USER rejected: {}", resp.text()))
                .with_code(resp.code))
        }
    };
    if !resp.is_completion() {
        return Err(FtpError::auth_failed(format!("Login failed: {}", resp.text()))
            .with_code(resp.code));
    }
    Ok(())
}

/// FEAT is optional (RFC 2389); any failure means "no extensions".
async fn probe_features(codec: &mut FtpCodec) -> ServerFeatures {
    match codec.execute("FEAT").await {
        Ok(resp) if resp.is_completion() => parse_features(&resp.lines),
        Ok(resp) => {
            log::debug!("FEAT not supported: {}", resp.text());
            ServerFeatures::default()
        }
        Err(e) => {
            log::debug!("FEAT failed: {}", e);
            ServerFeatures::default()
        }
    }
}

fn parse_features(lines: &[String]) -> ServerFeatures {
    let raw: Vec<String> = lines
        .iter()
        .skip(1)
        .filter(|l| !l.starts_with("211"))
        .map(|l| l.trim().to_ascii_uppercase())
        .filter(|l| !l.is_empty())
        .collect();
    let has = |feat: &str| raw.iter().any(|l| l.starts_with(feat));
    ServerFeatures {
        mlsd: has("MLSD") || has("MLST"),
        size: has("SIZE"),
        utf8: has("UTF8"),
        raw_features: raw,
    }
}

/// `213 12345` → 12345
fn parse_size(text: &str) -> FtpResult<u64> {
    text.split_whitespace()
        .nth(1)
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse SIZE reply: {}", text)))
}

/// `257 "/some/path" is current directory` → `/some/path`
fn parse_pwd(text: &str) -> FtpResult<String> {
    let start = text.find('"');
    let end = text.rfind('"');
    match (start, end) {
        (Some(s), Some(e)) if e > s => Ok(text[s + 1..e].replace("\"\"", "\"")),
        _ => Err(FtpError::protocol_error(format!("Cannot parse PWD: {}", text))),
    }
}
