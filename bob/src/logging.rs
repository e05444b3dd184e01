//! Minimal `log::Log` implementation: one colored line per record, prefixed
//! by a severity glyph, matching the single-line fatal/warning output the
//! original build tool produced.

use log::{Level, LevelFilter, Log, Metadata, Record};
use tui::Styled;

struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let glyph = match record.level() {
            Level::Error => "✗".red().to_string(),
            Level::Warn => "!".yellow().to_string(),
            Level::Info => "*".green().to_string(),
            Level::Debug | Level::Trace => "·".dark_grey().to_string(),
        };

        eprintln!("{glyph} {}", record.args());
    }

    fn flush(&self) {}
}

static LOGGER: Logger = Logger;

/// Installs the global logger. `verbose` raises the level to show
/// debug-grade diagnostic output.
pub fn init(verbose: bool) {
    log::set_logger(&LOGGER).expect("logger installed exactly once");
    log::set_max_level(if verbose { LevelFilter::Debug } else { LevelFilter::Info });
}
