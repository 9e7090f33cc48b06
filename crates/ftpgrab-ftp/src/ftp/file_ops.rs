//! File transfer commands: RETR with an optional REST offset, and STOR.
//!
//! Both return the raw data stream; the caller copies bytes, drops (or
//! shuts down) the stream and then calls `FtpClient::finish_transfer` to
//! collect the server's completion reply.

use crate::ftp::client::FtpClient;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::transfer::DataStream;
use crate::ftp::types::TransferType;

impl FtpClient {
    /// Start downloading `remote_path`, skipping the first `offset` bytes.
    pub async fn retrieve(&mut self, remote_path: &str, offset: u64) -> FtpResult<DataStream> {
        self.set_type(TransferType::Binary).await?;

        if offset > 0 {
            let resp = self.codec.execute(&format!("REST {}", offset)).await?;
            if !resp.is_intermediate() {
                return Err(FtpError::from_reply(resp.code, &resp.text()));
            }
            log::debug!("Server will restart {} at byte {}", remote_path, offset);
        }

        self.open_transfer(&format!("RETR {}", remote_path)).await
    }

    /// Start uploading to `remote_path`, replacing any existing file.
    pub async fn store(&mut self, remote_path: &str) -> FtpResult<DataStream> {
        self.set_type(TransferType::Binary).await?;
        self.open_transfer(&format!("STOR {}", remote_path)).await
    }
}
