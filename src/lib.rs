//! # ftpgrab
//!
//! Command line front end for the ftpgrab transfer engine:
//!   • `cli`     – argument parsing and request building
//!   • `logging` – tracing subscriber setup
//!   • `app`     – action dispatch, error report and exit codes

pub mod app;
pub mod cli;
pub mod logging;

pub use app::{run, write_error, RunStatus, EXIT_CANCELLED, EXIT_FAILURE};
pub use cli::{Action, Cli};
