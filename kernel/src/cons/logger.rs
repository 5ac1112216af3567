use log::{info, Level, LevelFilter, Log, Metadata, Record};

use crate::println;

struct Logger;

impl Log for Logger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color_code = match record.level() {
            Level::Error => 31, // red
            Level::Warn => 93,  // bright yellow
            Level::Info => 34,  // blue
            Level::Debug => 32, // green
            Level::Trace => 90, // bright black
        };
        println!(
            "\u{1B}[{}m[{:>5}] ({}:{}) {}\u{1B}[0m",
            color_code,
            record.level(),
            record.file().unwrap_or("?"),
            record.line().unwrap_or(0),
            record.args(),
        );
    }

    fn flush(&self) {}
}

pub fn init() {
    static LOGGER: Logger = Logger;
    if log::set_logger(&LOGGER).is_err() {
        return;
    }
    log::set_max_level(match option_env!("LOG") {
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("info") => LevelFilter::Info,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        _ => LevelFilter::Off,
    });
    info!("console logger initialized");
}
