//! The resumable transfer engine.
//!
//! A download is one logical transfer spread over as many connections as
//! the retry policy allows. Every byte is counted as confirmed once it has
//! been written to the local file, and the next attempt asks the server for
//! exactly the byte after it, so an interrupted transfer neither re-requests
//! nor skips any range.
//!
//! Uploads always start from byte zero and are never retried.

use crate::endpoint::{Connector, Endpoint};
use crate::error::{AttemptError, Result, TransferError};
use crate::listing::{order_entries, DirectoryEntry};
use crate::progress::{ProgressSample, ProgressSink};
use crate::request::TransferRequest;
use crate::retry::{cancellable_sleep, RetryPolicy};
use ftpgrab_ftp::{FtpError, FtpResult};
use std::future::Future;
use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Bytes moved per read/write.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Upper bound for the polite QUIT after a transfer.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// How a transfer ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// `bytes` moved in this run (excluding the starting offset).
    Completed { bytes: u64, attempts: u32 },
    Cancelled { bytes: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Transferring,
    RetryWait,
    Succeeded,
    Cancelled,
    Failed,
}

/// Run state of one logical transfer. Lives exactly as long as the call.
#[derive(Debug)]
pub struct TransferSession {
    pub id: Uuid,
    pub total_bytes_confirmed: u64,
    pub current_attempt: u32,
    pub last_error: Option<String>,
    pub cancelled: bool,
    pub state: SessionState,
}

impl TransferSession {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            total_bytes_confirmed: 0,
            current_attempt: 0,
            last_error: None,
            cancelled: false,
            state: SessionState::Idle,
        }
    }

    fn enter(&mut self, state: SessionState) {
        log::trace!("[{}] {:?} -> {:?}", self.id, self.state, state);
        self.state = state;
        if state == SessionState::Cancelled {
            self.cancelled = true;
        }
    }
}

/// How a single download attempt ended, short of an error.
enum AttemptEnd {
    Completed,
    Cancelled,
}

pub struct TransferEngine<C> {
    connector: C,
    policy: Option<Box<dyn RetryPolicy>>,
}

impl<C: Connector> TransferEngine<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            policy: None,
        }
    }

    /// Override the retry policy derived from each request.
    pub fn with_policy(mut self, policy: Box<dyn RetryPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    // ─── Download ────────────────────────────────────────────────

    pub async fn download(
        &self,
        request: &TransferRequest,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<TransferOutcome> {
        let (mut file, offset) = open_download_target(request).await?;

        let request_policy;
        let policy: &dyn RetryPolicy = match &self.policy {
            Some(p) => p.as_ref(),
            None => {
                request_policy = request.retry_policy();
                request_policy.as_ref()
            }
        };

        let mut session = TransferSession::new();
        let mut known_size: Option<u64> = None;
        log::info!(
            "[{}] Downloading {} to {} from offset {}",
            session.id,
            request.remote_path,
            request.local_path.display(),
            offset
        );

        loop {
            session.current_attempt += 1;
            let attempt = session.current_attempt;
            let before = session.total_bytes_confirmed;

            let result = self
                .download_attempt(
                    request,
                    &mut file,
                    offset,
                    &mut known_size,
                    &mut session,
                    progress,
                    cancel,
                )
                .await;
            log::info!(
                "[{}] Received {} bytes in attempt {} ({} total)",
                session.id,
                session.total_bytes_confirmed - before,
                attempt,
                session.total_bytes_confirmed
            );

            let cause = match result {
                Ok(AttemptEnd::Completed) => {
                    session.enter(SessionState::Succeeded);
                    progress.finish();
                    return Ok(TransferOutcome::Completed {
                        bytes: session.total_bytes_confirmed,
                        attempts: attempt,
                    });
                }
                Ok(AttemptEnd::Cancelled) => {
                    session.enter(SessionState::Cancelled);
                    progress.finish();
                    return Ok(TransferOutcome::Cancelled {
                        bytes: session.total_bytes_confirmed,
                    });
                }
                Err(cause) => cause,
            };

            log::warn!("[{}] Attempt {} failed: {}", session.id, attempt, describe(&cause));
            session.last_error = Some(describe(&cause));

            // Keep the file positioned right after the last confirmed byte.
            let resume_at = offset + session.total_bytes_confirmed;
            let (cause, retryable) = match file.seek(SeekFrom::Start(resume_at)).await {
                Ok(_) => {
                    let retryable = cause.is_retryable();
                    (cause, retryable)
                }
                Err(e) => (AttemptError::LocalIo(e), false),
            };

            if !(retryable && policy.should_retry(attempt)) {
                session.enter(SessionState::Failed);
                progress.finish();
                return Err(TransferError::TransferFailed {
                    bytes_transferred: session.total_bytes_confirmed,
                    attempts: attempt,
                    cause,
                });
            }

            session.enter(SessionState::RetryWait);
            let delay = policy.delay(attempt);
            log::info!("[{}] Retrying from byte {} in {:?}", session.id, resume_at, delay);
            if !cancellable_sleep(delay, cancel).await {
                session.enter(SessionState::Cancelled);
                progress.finish();
                return Ok(TransferOutcome::Cancelled {
                    bytes: session.total_bytes_confirmed,
                });
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn download_attempt(
        &self,
        request: &TransferRequest,
        file: &mut File,
        offset: u64,
        known_size: &mut Option<u64>,
        session: &mut TransferSession,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> std::result::Result<AttemptEnd, AttemptError> {
        session.enter(SessionState::Connecting);
        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            r = within(request.login_timeout(), "login", self.connector.connect()) => Some(r),
        };
        let mut endpoint = match connected {
            None => return Ok(AttemptEnd::Cancelled),
            Some(r) => r.map_err(AttemptError::Connect)?,
        };

        let result = receive_into(
            endpoint.as_mut(),
            request,
            file,
            offset,
            known_size,
            session,
            progress,
            cancel,
        )
        .await;
        if result.is_ok() {
            close_quietly(endpoint.as_mut()).await;
        }
        // A failed connection is simply dropped.
        result
    }

    // ─── Upload ──────────────────────────────────────────────────

    pub async fn upload(
        &self,
        request: &TransferRequest,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<TransferOutcome> {
        let mut file = open_existing(&request.local_path, File::open(&request.local_path).await)?;
        let total = file.metadata().await?.len();

        let mut session = TransferSession::new();
        session.current_attempt = 1;
        log::info!(
            "[{}] Uploading {} ({} bytes) to {}",
            session.id,
            request.local_path.display(),
            total,
            request.remote_path
        );

        session.enter(SessionState::Connecting);
        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            r = within(request.login_timeout(), "login", self.connector.connect()) => Some(r),
        };
        let mut endpoint = match connected {
            None => {
                session.enter(SessionState::Cancelled);
                return Ok(TransferOutcome::Cancelled { bytes: 0 });
            }
            Some(r) => r.map_err(TransferError::Connection)?,
        };

        session.enter(SessionState::Transferring);
        let result = send_from(
            endpoint.as_mut(),
            request,
            &mut file,
            total,
            &mut session,
            progress,
            cancel,
        )
        .await;
        progress.finish();

        match result {
            Ok(AttemptEnd::Completed) => {
                session.enter(SessionState::Succeeded);
                close_quietly(endpoint.as_mut()).await;
                Ok(TransferOutcome::Completed {
                    bytes: session.total_bytes_confirmed,
                    attempts: 1,
                })
            }
            Ok(AttemptEnd::Cancelled) => {
                session.enter(SessionState::Cancelled);
                close_quietly(endpoint.as_mut()).await;
                Ok(TransferOutcome::Cancelled {
                    bytes: session.total_bytes_confirmed,
                })
            }
            Err(cause) => {
                session.enter(SessionState::Failed);
                log::warn!("[{}] Upload failed: {}", session.id, describe(&cause));
                Err(TransferError::TransferFailed {
                    bytes_transferred: session.total_bytes_confirmed,
                    attempts: 1,
                    cause,
                })
            }
        }
    }

    // ─── Listing ─────────────────────────────────────────────────

    /// One connection, one listing; entries ordered directories, links, files.
    pub async fn list_directory(&self, request: &TransferRequest) -> Result<Vec<DirectoryEntry>> {
        let mut endpoint = within(request.login_timeout(), "login", self.connector.connect())
            .await
            .map_err(TransferError::Connection)?;
        let entries = within(
            request.data_timeout(),
            "LIST",
            endpoint.list_directory(&request.remote_path),
        )
        .await
        .map_err(TransferError::Remote)?;
        close_quietly(endpoint.as_mut()).await;

        Ok(order_entries(entries.into_iter().map(DirectoryEntry::from).collect()))
    }
}

/// Copy one remote stream into `file`, starting at the next unconfirmed byte.
#[allow(clippy::too_many_arguments)]
async fn receive_into(
    endpoint: &mut dyn Endpoint,
    request: &TransferRequest,
    file: &mut File,
    offset: u64,
    known_size: &mut Option<u64>,
    session: &mut TransferSession,
    progress: &mut dyn ProgressSink,
    cancel: &CancellationToken,
) -> std::result::Result<AttemptEnd, AttemptError> {
    let position = offset + session.total_bytes_confirmed;
    let idle = request.data_timeout();

    let size = within(idle, "SIZE", endpoint.remote_size(&request.remote_path))
        .await
        .map_err(AttemptError::Stream)?;
    match (*known_size, size) {
        (Some(before), Some(after)) if before != after => {
            return Err(AttemptError::RemoteChanged { before, after })
        }
        (None, Some(_)) => *known_size = size,
        _ => {}
    }
    if let Some(size) = *known_size {
        if position > size {
            return Err(AttemptError::OffsetBeyondEnd {
                offset: position,
                size,
            });
        }
        if position == size {
            log::info!("[{}] Nothing left to download", session.id);
            progress.report(&ProgressSample::new(position, Some(size)));
            return Ok(AttemptEnd::Completed);
        }
    }

    session.enter(SessionState::Transferring);
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        r = within(idle, "RETR", endpoint.receive_stream(&request.remote_path, position)) => Some(r),
    };
    let mut source = match opened {
        None => {
            endpoint.abort().await;
            return Ok(AttemptEnd::Cancelled);
        }
        Some(r) => r.map_err(AttemptError::Stream)?,
    };

    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            r = tokio::time::timeout(idle, source.read(&mut buf)) => Some(r),
        };
        let n = match read {
            None => {
                drop(source);
                endpoint.abort().await;
                return Ok(AttemptEnd::Cancelled);
            }
            Some(Err(_)) => return Err(AttemptError::Stream(stalled(idle))),
            Some(Ok(r)) => r.map_err(|e| AttemptError::Stream(FtpError::from(e)))?,
        };
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).await.map_err(AttemptError::LocalIo)?;
        session.total_bytes_confirmed += n as u64;
        progress.report(&ProgressSample::new(
            offset + session.total_bytes_confirmed,
            *known_size,
        ));
    }
    drop(source);

    file.flush().await.map_err(AttemptError::LocalIo)?;
    within(idle, "RETR completion", endpoint.finish_receive())
        .await
        .map_err(AttemptError::Stream)?;

    let end = offset + session.total_bytes_confirmed;
    match *known_size {
        Some(expected) if end != expected => Err(AttemptError::SizeMismatch {
            received: end,
            expected,
        }),
        _ => Ok(AttemptEnd::Completed),
    }
}

/// Stream the whole local file to the server.
async fn send_from(
    endpoint: &mut dyn Endpoint,
    request: &TransferRequest,
    file: &mut File,
    total: u64,
    session: &mut TransferSession,
    progress: &mut dyn ProgressSink,
    cancel: &CancellationToken,
) -> std::result::Result<AttemptEnd, AttemptError> {
    let idle = request.data_timeout();
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        r = within(idle, "STOR", endpoint.send_stream(&request.remote_path)) => Some(r),
    };
    let mut sink = match opened {
        None => {
            endpoint.abort().await;
            return Ok(AttemptEnd::Cancelled);
        }
        Some(r) => r.map_err(AttemptError::Stream)?,
    };

    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await.map_err(AttemptError::LocalIo)?;
        if n == 0 {
            break;
        }
        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            r = tokio::time::timeout(idle, sink.write_all(&buf[..n])) => Some(r),
        };
        match written {
            None => {
                drop(sink);
                endpoint.abort().await;
                return Ok(AttemptEnd::Cancelled);
            }
            Some(Err(_)) => return Err(AttemptError::Stream(stalled(idle))),
            Some(Ok(r)) => r.map_err(|e| AttemptError::Stream(FtpError::from(e)))?,
        }
        session.total_bytes_confirmed += n as u64;
        progress.report(&ProgressSample::new(session.total_bytes_confirmed, Some(total)));
    }

    match tokio::time::timeout(idle, sink.shutdown()).await {
        Err(_) => return Err(AttemptError::Stream(stalled(idle))),
        Ok(r) => r.map_err(|e| AttemptError::Stream(FtpError::from(e)))?,
    }
    drop(sink);
    within(idle, "STOR completion", endpoint.finish_send())
        .await
        .map_err(AttemptError::Stream)?;
    Ok(AttemptEnd::Completed)
}

/// Open (resume) or create the download target and return it with the
/// offset the transfer starts from.
async fn open_download_target(request: &TransferRequest) -> Result<(File, u64)> {
    let path = &request.local_path;
    if request.resume {
        let mut file = open_existing(path, OpenOptions::new().write(true).open(path).await)?;
        let len = file.metadata().await?.len();
        if request.start_offset != 0 && request.start_offset != len {
            log::warn!(
                "Ignoring offset {}: resuming from the local file length",
                request.start_offset
            );
        }
        log::info!("Resuming from position {}", len);
        file.seek(SeekFrom::Start(len)).await?;
        return Ok((file, len));
    }

    let mut file = File::create(path).await?;
    if request.start_offset > 0 {
        file.seek(SeekFrom::Start(request.start_offset)).await?;
    }
    Ok((file, request.start_offset))
}

fn open_existing(path: &Path, opened: std::io::Result<File>) -> Result<File> {
    opened.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => TransferError::NotFound {
            path: path.to_path_buf(),
        },
        _ => TransferError::Io(e),
    })
}

/// Await one control exchange, giving up after `limit`.
async fn within<T>(
    limit: Duration,
    what: &str,
    exchange: impl Future<Output = FtpResult<T>>,
) -> FtpResult<T> {
    match tokio::time::timeout(limit, exchange).await {
        Ok(r) => r,
        Err(_) => Err(FtpError::timeout(format!(
            "no answer to {} within {}s",
            what,
            limit.as_secs()
        ))),
    }
}

fn stalled(limit: Duration) -> FtpError {
    FtpError::timeout(format!("data channel idle for {}s", limit.as_secs()))
}

async fn close_quietly(endpoint: &mut dyn Endpoint) {
    if tokio::time::timeout(CLOSE_TIMEOUT, endpoint.close()).await.is_err() {
        log::debug!("Server did not answer QUIT in time");
    }
}

/// The error and its sources on one line, for log output.
fn describe(err: &AttemptError) -> String {
    use std::error::Error;
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
