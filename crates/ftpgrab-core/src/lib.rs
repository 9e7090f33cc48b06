//! # ftpgrab-core
//!
//! The transfer engine behind the `ftpgrab` command:
//!   • `request`  – validated transfer parameters and server address parsing
//!   • `retry`    – retry budgets, fixed and exponential delays, cancellable sleep
//!   • `progress` – progress samples and the throttled console reporter
//!   • `endpoint` – connector/endpoint traits and their FTP implementation
//!   • `engine`   – resumable downloads, single-shot uploads, listings
//!   • `listing`  – directory entry ordering and rendering

pub mod endpoint;
pub mod engine;
pub mod error;
pub mod listing;
pub mod progress;
pub mod request;
pub mod retry;

pub use endpoint::{ByteSink, ByteSource, Connector, Endpoint, FtpConnector};
pub use engine::{SessionState, TransferEngine, TransferOutcome, TransferSession, CHUNK_SIZE};
pub use error::{AttemptError, Result, TransferError};
pub use listing::{order_entries, DirectoryEntry, EntryKind};
pub use progress::{ConsoleProgress, NoProgress, ProgressSample, ProgressSink};
pub use request::{BackoffKind, Direction, ServerUrl, TransferRequest};
pub use retry::{cancellable_sleep, ExponentialBackoff, FixedDelay, RetryBudget, RetryPolicy};
pub use tokio_util::sync::CancellationToken;
