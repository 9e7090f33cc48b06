//! Progress reporting.
//!
//! The engine hands every chunk's position to a [`ProgressSink`];
//! [`ConsoleProgress`] turns those samples into throttled status lines.

use std::io::{IsTerminal, Stderr, Write};
use std::time::{Duration, Instant};

/// Minimum spacing between two printed status lines.
pub const REPORT_INTERVAL: Duration = Duration::from_millis(200);

/// Position of a transfer at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    /// Absolute byte offset in the file.
    pub position: u64,
    /// Size of the whole file, when known.
    pub total: Option<u64>,
    pub at: Instant,
}

impl ProgressSample {
    pub fn new(position: u64, total: Option<u64>) -> Self {
        Self {
            position,
            total,
            at: Instant::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total.is_some_and(|t| self.position >= t)
    }
}

/// Receives progress samples. Must never fail or block the transfer.
pub trait ProgressSink: Send {
    fn report(&mut self, sample: &ProgressSample);

    /// Called once when the transfer stops, whatever the outcome.
    fn finish(&mut self) {}
}

/// Discards every sample.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _sample: &ProgressSample) {}
}

/// Prints `eta: D.HH:MM:SS  speed: <rate>  %: <pct>  Pos: <n>` lines.
///
/// The rate is measured between two printed samples; the ETA uses the
/// average rate since the first sample.
pub struct ConsoleProgress<W: Write + Send> {
    out: W,
    redraw: bool,
    interval: Duration,
    first: Option<(Instant, u64)>,
    last: Option<(Instant, u64)>,
    line_open: bool,
}

impl ConsoleProgress<Stderr> {
    /// Report to stderr, redrawing in place when it is a terminal.
    pub fn stderr() -> Self {
        let err = std::io::stderr();
        let redraw = err.is_terminal();
        Self::new(err, redraw)
    }
}

impl<W: Write + Send> ConsoleProgress<W> {
    pub fn new(out: W, redraw: bool) -> Self {
        Self {
            out,
            redraw,
            interval: REPORT_INTERVAL,
            first: None,
            last: None,
            line_open: false,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: &str, end_line: bool) -> std::io::Result<()> {
        if self.redraw {
            write!(self.out, "\r{}\x1b[K", line)?;
            if end_line {
                writeln!(self.out)?;
            }
            self.line_open = !end_line;
        } else {
            writeln!(self.out, "{}", line)?;
        }
        self.out.flush()
    }
}

impl<W: Write + Send> ProgressSink for ConsoleProgress<W> {
    fn report(&mut self, sample: &ProgressSample) {
        let complete = sample.is_complete();
        let (first_at, first_pos) = *self.first.get_or_insert((sample.at, sample.position));
        let (last_at, last_pos) = *self.last.get_or_insert((first_at, first_pos));

        let since_last = sample.at.saturating_duration_since(last_at);
        if !complete && since_last < self.interval {
            return;
        }

        let speed = rate(sample.position.saturating_sub(last_pos), since_last).or_else(|| {
            rate(
                sample.position.saturating_sub(first_pos),
                sample.at.saturating_duration_since(first_at),
            )
        });
        let average = rate(
            sample.position.saturating_sub(first_pos),
            sample.at.saturating_duration_since(first_at),
        );
        let eta = match (sample.total, average) {
            (Some(total), _) if sample.position >= total => Some(Duration::ZERO),
            (Some(total), Some(avg)) if avg > 0.0 => Some(Duration::from_secs_f64(
                (total - sample.position) as f64 / avg,
            )),
            _ => None,
        };
        let percent = sample.total.map(|total| {
            if total == 0 {
                100.0
            } else {
                sample.position as f64 * 100.0 / total as f64
            }
        });

        self.last = Some((sample.at, sample.position));
        let line = format_line(eta, speed, percent, sample.position);
        // Progress output is best effort.
        let _ = self.emit(&line, complete);
    }

    fn finish(&mut self) {
        if self.line_open {
            let _ = writeln!(self.out);
            let _ = self.out.flush();
            self.line_open = false;
        }
    }
}

/// Bytes per second, or `None` over an empty interval.
fn rate(bytes: u64, over: Duration) -> Option<f64> {
    let secs = over.as_secs_f64();
    (secs > 0.0).then(|| bytes as f64 / secs)
}

pub fn format_line(
    eta: Option<Duration>,
    speed: Option<f64>,
    percent: Option<f64>,
    position: u64,
) -> String {
    format!(
        "eta: {}  speed: {}  %: {}  Pos: {}",
        eta.map_or_else(|| "--.--:--:--".to_string(), format_eta),
        speed.map_or_else(|| "-".to_string(), format_speed),
        percent.map_or_else(|| "-".to_string(), |p| format!("{:.2}", p)),
        position
    )
}

/// `DD.HH:MM:SS`
pub fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    format!(
        "{:02}.{:02}:{:02}:{:02}",
        secs / 86_400,
        (secs / 3_600) % 24,
        (secs / 60) % 60,
        secs % 60
    )
}

pub fn format_speed(bytes_per_sec: f64) -> String {
    const UNITS: [&str; 4] = ["KB/s", "MB/s", "GB/s", "TB/s"];
    if bytes_per_sec < 1024.0 {
        return format!("{:.0} B/s", bytes_per_sec);
    }
    let mut value = bytes_per_sec / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
