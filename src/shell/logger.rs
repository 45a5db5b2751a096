use std::env;

use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// 日志级别的环境变量，取值 error / warn / info / debug / trace
pub const LOG_ENV: &str = "V6FS_LOG";

struct ShellLogger;

static LOGGER: ShellLogger = ShellLogger;

impl Log for ShellLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "ERROR".red().bold(),
            Level::Warn => "WARN ".yellow().bold(),
            Level::Info => "INFO ".green(),
            Level::Debug => "DEBUG".blue(),
            Level::Trace => "TRACE".bright_black(),
        };
        eprintln!("{} {} {}", tag, record.target().bright_black(), record.args());
    }

    fn flush(&self) {}
}

fn level_from_env() -> LevelFilter {
    env::var(LOG_ENV)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(LevelFilter::Warn)
}

pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level_from_env());
    }
}
