// Per-chunk progress reporting for long transfers

/// Told how many bytes are left before each chunk is written.
pub trait Progress {
    fn on_chunk(&mut self, remaining: u64);
}

/// Reports nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn on_chunk(&mut self, _remaining: u64) {}
}

/// Reports through the logger at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn on_chunk(&mut self, remaining: u64) {
        log::debug!("remaining_size = {}", remaining);
    }
}

impl<F: FnMut(u64)> Progress for F {
    fn on_chunk(&mut self, remaining: u64) {
        self(remaining)
    }
}
