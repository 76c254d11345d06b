// Log sink for the raw disk commands
//
// Keeps the most recent records in memory so the shell can show them
// after a failed command; nothing here assumes a console exists.

use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use log::{Level, LevelFilter, Metadata, Record};
use spin::Mutex;

const MAX_LOG_ENTRIES: usize = 64;

/// One captured record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
}

static LOG_BUFFER: Mutex<VecDeque<LogEntry>> = Mutex::new(VecDeque::new());
static LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

struct RingLogger;

static LOGGER: RingLogger = RingLogger;

impl log::Log for RingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        push(record.level(), format!("{}", record.args()));
    }

    fn flush(&self) {}
}

fn push(level: Level, message: String) {
    LOG_COUNT.fetch_add(1, Ordering::SeqCst);
    let mut buf = LOG_BUFFER.lock();
    if buf.len() == MAX_LOG_ENTRIES {
        buf.pop_front();
    }
    buf.push_back(LogEntry { level, message });
}

/// Install the ring as the global logger.
///
/// The host calls this once at startup; until then `log` records are
/// dropped. Fails if another logger was installed first; that logger then
/// keeps receiving records.
pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Most recent records, oldest first.
pub fn recent() -> Vec<LogEntry> {
    LOG_BUFFER.lock().iter().cloned().collect()
}

/// Records seen since start, including those already rotated out.
pub fn log_count() -> usize {
    LOG_COUNT.load(Ordering::SeqCst)
}

pub fn clear() {
    LOG_BUFFER.lock().clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_keeps_newest() {
        for i in 0..MAX_LOG_ENTRIES + 5 {
            push(Level::Info, format!("ring-test {}", i));
        }
        let entries = recent();
        assert!(entries.len() <= MAX_LOG_ENTRIES);
        assert!(!entries.iter().any(|e| e.message == "ring-test 0"));
        assert!(log_count() >= MAX_LOG_ENTRIES + 5);
    }

    #[test]
    fn test_init_routes_log_records() {
        // the only test in the crate that installs a logger
        init(LevelFilter::Debug).unwrap();
        assert_eq!(log::max_level(), LevelFilter::Debug);
        assert!(init(LevelFilter::Info).is_err());

        let before = log_count();
        log::warn!("logger-init-test");
        assert!(log_count() > before);
    }
}
