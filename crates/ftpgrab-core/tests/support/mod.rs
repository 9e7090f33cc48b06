//! In-memory stand-ins for the FTP server used by the engine tests.

use async_trait::async_trait;
use ftpgrab_core::{ByteSink, ByteSource, Connector, Endpoint, ProgressSample, ProgressSink};
use ftpgrab_ftp::{FtpEntry, FtpError, FtpResult};
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// What the next connection does.
#[derive(Debug, Clone)]
pub enum Step {
    /// Connection refused.
    Refuse,
    /// Serve everything.
    Complete,
    /// Reset the data connection after this many bytes.
    DropAfter(usize),
    /// End the stream cleanly after this many bytes.
    Truncate(usize),
    /// Reject the transfer command with a reply code.
    Reject(u16, &'static str),
    /// Never deliver a byte.
    Stall,
    /// Never answer RETR.
    Hang,
}

#[derive(Default)]
pub struct FakeRemote {
    pub data: Vec<u8>,
    pub steps: Mutex<VecDeque<Step>>,
    /// Sizes reported by successive SIZE calls; falls back to `data.len()`.
    pub sizes: Mutex<VecDeque<Option<u64>>>,
    pub report_size: bool,
    pub listing: Vec<FtpEntry>,
    pub connects: Mutex<u32>,
    pub offsets: Mutex<Vec<u64>>,
    pub uploaded: Arc<Mutex<Vec<u8>>>,
    pub events: Mutex<Vec<&'static str>>,
}

impl FakeRemote {
    pub fn new(data: Vec<u8>, steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            data,
            steps: Mutex::new(steps.into()),
            report_size: true,
            ..Default::default()
        })
    }

    pub fn connects(&self) -> u32 {
        *self.connects.lock().unwrap()
    }

    pub fn offsets(&self) -> Vec<u64> {
        self.offsets.lock().unwrap().clone()
    }

    pub fn saw(&self, event: &str) -> bool {
        self.events.lock().unwrap().iter().any(|e| *e == event)
    }
}

pub fn test_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 + 1).collect()
}

#[derive(Clone)]
pub struct FakeConnector(pub Arc<FakeRemote>);

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> FtpResult<Box<dyn Endpoint>> {
        *self.0.connects.lock().unwrap() += 1;
        let step = self.0.steps.lock().unwrap().pop_front().unwrap_or(Step::Complete);
        if let Step::Refuse = step {
            return Err(FtpError::connection_failed("connection refused"));
        }
        Ok(Box::new(FakeEndpoint {
            remote: self.0.clone(),
            step,
        }))
    }
}

struct FakeEndpoint {
    remote: Arc<FakeRemote>,
    step: Step,
}

#[async_trait]
impl Endpoint for FakeEndpoint {
    async fn remote_size(&mut self, _path: &str) -> FtpResult<Option<u64>> {
        if !self.remote.report_size {
            return Ok(None);
        }
        let queued = self.remote.sizes.lock().unwrap().pop_front();
        Ok(queued.unwrap_or(Some(self.remote.data.len() as u64)))
    }

    async fn receive_stream(&mut self, _path: &str, offset: u64) -> FtpResult<ByteSource> {
        self.remote.offsets.lock().unwrap().push(offset);
        let start = (offset as usize).min(self.remote.data.len());
        let rest = self.remote.data[start..].to_vec();
        let reader = match self.step {
            Step::Reject(code, text) => return Err(FtpError::from_reply(code, text)),
            Step::Hang => std::future::pending().await,
            Step::Stall => ScriptedReader::stalled(),
            Step::DropAfter(n) => ScriptedReader::new(rest, Some(n), None),
            Step::Truncate(n) => ScriptedReader::new(rest, None, Some(n)),
            _ => ScriptedReader::new(rest, None, None),
        };
        Ok(Box::new(reader))
    }

    async fn finish_receive(&mut self) -> FtpResult<()> {
        self.remote.events.lock().unwrap().push("finish_receive");
        Ok(())
    }

    async fn send_stream(&mut self, _path: &str) -> FtpResult<ByteSink> {
        if let Step::Reject(code, text) = self.step {
            return Err(FtpError::from_reply(code, text));
        }
        let fail_after = match self.step {
            Step::DropAfter(n) => Some(n),
            _ => None,
        };
        Ok(Box::new(RecordingWriter {
            into: self.remote.uploaded.clone(),
            fail_after,
            written: 0,
        }))
    }

    async fn finish_send(&mut self) -> FtpResult<()> {
        self.remote.events.lock().unwrap().push("finish_send");
        Ok(())
    }

    async fn list_directory(&mut self, _path: &str) -> FtpResult<Vec<FtpEntry>> {
        if let Step::Reject(code, text) = self.step {
            return Err(FtpError::from_reply(code, text));
        }
        Ok(self.remote.listing.clone())
    }

    async fn abort(&mut self) {
        self.remote.events.lock().unwrap().push("abort");
    }

    async fn close(&mut self) {
        self.remote.events.lock().unwrap().push("close");
    }
}

/// Serves bytes in small chunks, then ends, resets or stalls as scripted.
pub struct ScriptedReader {
    data: Vec<u8>,
    pos: usize,
    fail_after: Option<usize>,
    end_after: Option<usize>,
    stalled: bool,
}

impl ScriptedReader {
    const CHUNK: usize = 64;

    fn new(data: Vec<u8>, fail_after: Option<usize>, end_after: Option<usize>) -> Self {
        Self {
            data,
            pos: 0,
            fail_after,
            end_after,
            stalled: false,
        }
    }

    fn stalled() -> Self {
        Self {
            stalled: true,
            ..Self::new(Vec::new(), None, None)
        }
    }
}

impl AsyncRead for ScriptedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.stalled {
            return Poll::Pending;
        }
        let limit = this
            .fail_after
            .or(this.end_after)
            .unwrap_or(this.data.len())
            .min(this.data.len());
        if this.pos >= limit {
            if this.fail_after.is_some() && this.pos < this.data.len() {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                )));
            }
            return Poll::Ready(Ok(()));
        }
        let n = Self::CHUNK.min(limit - this.pos).min(buf.remaining());
        buf.put_slice(&this.data[this.pos..this.pos + n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

struct RecordingWriter {
    into: Arc<Mutex<Vec<u8>>>,
    fail_after: Option<usize>,
    written: usize,
}

impl AsyncWrite for RecordingWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if let Some(limit) = this.fail_after {
            if this.written >= limit {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")));
            }
        }
        let n = match this.fail_after {
            Some(limit) => buf.len().min(limit - this.written),
            None => buf.len(),
        };
        this.into.lock().unwrap().extend_from_slice(&buf[..n]);
        this.written += n;
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Keeps every sample it is given.
#[derive(Default)]
pub struct RecordingProgress {
    pub samples: Vec<ProgressSample>,
    pub finished: bool,
}

impl ProgressSink for RecordingProgress {
    fn report(&mut self, sample: &ProgressSample) {
        self.samples.push(*sample);
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}
