//! Logging backend for the `log` facade.
//!
//! Renders records as `[elapsed] LEVEL subsystem: message` on stderr, the
//! subsystem being the record target (`fs`, `server`, `disk`). Colors are
//! only emitted when stderr is a terminal. The filter level comes from the
//! `-v` flags at startup; the library itself only ever logs through the
//! `log` macros and never touches this module.

use std::io::{IsTerminal, Write};
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

struct KlogBackend {
    start: Instant,
    color: bool,
}

impl KlogBackend {
    fn level_color(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[0m",
            Level::Debug | Level::Trace => "\x1b[90m",
        }
    }
}

impl Log for KlogBackend {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.start.elapsed();
        let mut err = std::io::stderr().lock();
        let _ = if self.color {
            writeln!(
                err,
                "\x1b[90m[{:>6}.{:03}]\x1b[0m {}{:<5}\x1b[0m \x1b[36m{}:\x1b[0m {}",
                elapsed.as_secs(),
                elapsed.subsec_millis(),
                Self::level_color(record.level()),
                record.level(),
                record.target(),
                record.args()
            )
        } else {
            writeln!(
                err,
                "[{:>6}.{:03}] {:<5} {}: {}",
                elapsed.as_secs(),
                elapsed.subsec_millis(),
                record.level(),
                record.target(),
                record.args()
            )
        };
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install the backend. `verbosity` 0 = info, 1 = debug, 2+ = trace.
/// Safe to call more than once; only the first call wins.
pub fn init(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let backend = Box::leak(Box::new(KlogBackend {
        start: Instant::now(),
        color: std::io::stderr().is_terminal(),
    }));
    if log::set_logger(backend).is_ok() {
        log::set_max_level(level);
    }
}
