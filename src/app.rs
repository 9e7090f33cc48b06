//! Runs one command line action against the transfer engine.

use crate::cli::{Action, Cli};
use ftpgrab_core::{
    CancellationToken, ConsoleProgress, FtpConnector, TransferEngine, TransferError,
    TransferOutcome,
};
use std::error::Error;
use std::io::Write;

/// Process exit code for a cancelled run (128 + SIGINT).
pub const EXIT_CANCELLED: i32 = 130;
pub const EXIT_FAILURE: i32 = 1;

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Cancelled,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Cancelled => EXIT_CANCELLED,
        }
    }
}

impl From<TransferOutcome> for RunStatus {
    fn from(outcome: TransferOutcome) -> Self {
        match outcome {
            TransferOutcome::Completed { .. } => RunStatus::Success,
            TransferOutcome::Cancelled { .. } => RunStatus::Cancelled,
        }
    }
}

pub async fn run(cli: &Cli, cancel: &CancellationToken) -> Result<RunStatus, TransferError> {
    if cli.action == Action::Help {
        println!("{}", Cli::help_text());
        return Ok(RunStatus::Success);
    }

    let request = cli.to_request()?;
    tracing::debug!(
        "{:?} {}:{}{} (local {})",
        cli.action,
        request.host,
        request.effective_port(),
        request.remote_path,
        request.local_path.display()
    );
    let engine = TransferEngine::new(FtpConnector::new(request.connection_config()));

    match cli.action {
        Action::Download => {
            let mut progress = ConsoleProgress::stderr();
            let outcome = engine.download(&request, &mut progress, cancel).await?;
            if let TransferOutcome::Completed { bytes, attempts } = outcome {
                tracing::info!("Received total {} bytes in {} attempt(s)", bytes, attempts);
            }
            Ok(outcome.into())
        }
        Action::Upload => {
            let mut progress = ConsoleProgress::stderr();
            let outcome = engine.upload(&request, &mut progress, cancel).await?;
            if let TransferOutcome::Completed { bytes, .. } = outcome {
                tracing::info!("Sent total {} bytes", bytes);
            }
            Ok(outcome.into())
        }
        Action::List => {
            let entries = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(RunStatus::Cancelled),
                r = engine.list_directory(&request) => r?,
            };
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for entry in &entries {
                writeln!(out, "{}", entry)?;
            }
            Ok(RunStatus::Success)
        }
        Action::Help => Ok(RunStatus::Success),
    }
}

/// `Error: ...`, one `Caused by: ...` per source, then the help hint.
pub fn write_error(err: &dyn Error, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "Error: {}", err)?;
    let mut source = err.source();
    while let Some(cause) = source {
        writeln!(out, "Caused by: {}", cause)?;
        source = cause.source();
    }
    writeln!(out, "Try --help or -a help for more information")
}
