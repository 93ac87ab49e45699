use slog::{o, Discard, Logger};
use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::types::Severity;
use sloggers::Build;

use crate::error::Error;

/// Terminal logger on stderr, so stdout stays free for frame and
/// disassembly output.
pub fn terminal_logger(level: Severity) -> Result<Logger, Error> {
    let mut builder = TerminalLoggerBuilder::new();
    builder.level(level);
    builder.destination(Destination::Stderr);
    builder.build().map_err(|e| Error::Logger(e.to_string()))
}

/// Logger used when the caller doesn't supply one.
pub fn discard_logger() -> Logger {
    Logger::root(Discard, o!())
}
