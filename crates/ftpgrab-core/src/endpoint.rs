//! The engine's view of a remote server.
//!
//! The engine only talks to `Connector`/`Endpoint`; [`FtpConnector`] is the
//! production implementation on top of `ftpgrab_ftp::FtpClient`.

use async_trait::async_trait;
use ftpgrab_ftp::{FtpClient, FtpConnectionConfig, FtpEntry, FtpError, FtpResult};
use tokio::io::{AsyncRead, AsyncWrite};

pub type ByteSource = Box<dyn AsyncRead + Send + Unpin>;
pub type ByteSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Opens a fresh, authenticated connection per attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> FtpResult<Box<dyn Endpoint>>;
}

/// One live connection.
///
/// A stream returned by `receive_stream`/`send_stream` must be dropped
/// before `finish_*`, `abort` or any other call on the same endpoint.
#[async_trait]
pub trait Endpoint: Send {
    /// Remote file size, `None` when the server cannot tell.
    async fn remote_size(&mut self, path: &str) -> FtpResult<Option<u64>>;

    async fn receive_stream(&mut self, path: &str, offset: u64) -> FtpResult<ByteSource>;

    /// Confirm a fully read download.
    async fn finish_receive(&mut self) -> FtpResult<()>;

    async fn send_stream(&mut self, path: &str) -> FtpResult<ByteSink>;

    /// Confirm a fully written (and shut down) upload.
    async fn finish_send(&mut self) -> FtpResult<()>;

    async fn list_directory(&mut self, path: &str) -> FtpResult<Vec<FtpEntry>>;

    /// Interrupt a running transfer. Best effort.
    async fn abort(&mut self);

    /// Log out and drop the connection. Best effort.
    async fn close(&mut self);
}

/// Connects with `FtpClient` using a fixed configuration.
#[derive(Debug, Clone)]
pub struct FtpConnector {
    config: FtpConnectionConfig,
}

impl FtpConnector {
    pub fn new(config: FtpConnectionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for FtpConnector {
    async fn connect(&self) -> FtpResult<Box<dyn Endpoint>> {
        log::debug!("Connecting to {}:{}", self.config.host, self.config.port);
        let client = FtpClient::connect(self.config.clone()).await?;
        Ok(Box::new(FtpEndpoint { client }))
    }
}

struct FtpEndpoint {
    client: FtpClient,
}

#[async_trait]
impl Endpoint for FtpEndpoint {
    async fn remote_size(&mut self, path: &str) -> FtpResult<Option<u64>> {
        if !self.client.features.size {
            return Ok(None);
        }
        match self.client.size(path).await {
            Ok(size) => Ok(Some(size)),
            Err(e) if size_unknown(&e) => {
                log::debug!("SIZE {} refused: {}", path, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn receive_stream(&mut self, path: &str, offset: u64) -> FtpResult<ByteSource> {
        let stream = self.client.retrieve(path, offset).await?;
        Ok(Box::new(stream))
    }

    async fn finish_receive(&mut self) -> FtpResult<()> {
        self.client.finish_transfer().await
    }

    async fn send_stream(&mut self, path: &str) -> FtpResult<ByteSink> {
        let stream = self.client.store(path).await?;
        Ok(Box::new(stream))
    }

    async fn finish_send(&mut self) -> FtpResult<()> {
        self.client.finish_transfer().await
    }

    async fn list_directory(&mut self, path: &str) -> FtpResult<Vec<FtpEntry>> {
        self.client.list(path).await
    }

    async fn abort(&mut self) {
        if let Err(e) = self.client.abort().await {
            log::debug!("ABOR failed: {}", e);
        }
    }

    async fn close(&mut self) {
        self.client.quit().await;
    }
}

/// SIZE replies that leave the size unknown; RETR decides instead.
fn size_unknown(err: &FtpError) -> bool {
    matches!(err.code, Some(500 | 502 | 504 | 550))
}
