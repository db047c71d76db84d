// Licensed under the Apache-2.0 license

//! Shared driver plumbing: the logging seam and bounded busy-wait polling.

use core::fmt;

use embedded_hal::delay::DelayNs;
use fugit::MicrosDurationU32;

/// Severity of a log record. Lower values are more severe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        };
        f.write_str(tag)
    }
}

/// Sink for driver diagnostics.
///
/// Drivers are generic over a `Logger` so that a board can route messages to
/// a UART while tests and size-constrained builds compile them away with
/// [`NoOpLogger`].
pub trait Logger {
    fn log(&mut self, level: Level, args: fmt::Arguments<'_>);

    fn error(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    fn warn(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    fn info(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    fn debug(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }
}

/// Logger that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    #[inline(always)]
    fn log(&mut self, _level: Level, _args: fmt::Arguments<'_>) {}
}

/// Logger writing one line per record to any `embedded_io::Write` sink.
///
/// Records above `max_level` are dropped. Write errors are ignored: a broken
/// console must never take the network path down with it.
pub struct UartLogger<W: embedded_io::Write> {
    writer: W,
    max_level: Level,
}

impl<W: embedded_io::Write> UartLogger<W> {
    pub fn new(writer: W, max_level: Level) -> Self {
        Self { writer, max_level }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: embedded_io::Write> Logger for UartLogger<W> {
    fn log(&mut self, level: Level, args: fmt::Arguments<'_>) {
        if level > self.max_level {
            return;
        }
        let _ = self.writer.write_fmt(format_args!("[{level}] {args}\r\n"));
    }
}

/// Granularity of [`poll_with_timeout`].
pub const POLL_INTERVAL_US: u32 = 10;

/// Failure of a bounded poll.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PollError<E> {
    /// The condition did not become ready within the timeout.
    Timeout,
    /// The polled operation failed outright.
    Other(E),
}

/// Repeatedly evaluates `op` until it stops returning `WouldBlock`, sleeping
/// [`POLL_INTERVAL_US`] between attempts, for at most `timeout`.
///
/// `op` is always evaluated at least once, so a zero timeout still observes a
/// condition that is already satisfied.
///
/// # Errors
///
/// Returns `PollError::Timeout` once the budget is spent, or
/// `PollError::Other` as soon as `op` reports a hard failure.
pub fn poll_with_timeout<D, T, E>(
    delay: &mut D,
    timeout: MicrosDurationU32,
    mut op: impl FnMut() -> nb::Result<T, E>,
) -> Result<T, PollError<E>>
where
    D: DelayNs,
{
    let budget = timeout.to_micros();
    let mut waited: u32 = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(nb::Error::Other(e)) => return Err(PollError::Other(e)),
            Err(nb::Error::WouldBlock) => {
                if waited >= budget {
                    return Err(PollError::Timeout);
                }
                delay.delay_us(POLL_INTERVAL_US);
                waited = waited.saturating_add(POLL_INTERVAL_US);
            }
        }
    }
}
