//! Transfer configuration.
//!
//! Sizes are fixed at build time except for the wipe chunk, which the
//! host may shrink or grow to suit the firmware's block I/O limits.

use crate::error::{Error, ErrorKind, Result};

/// Addressing unit for `sector` arguments, independent of native block size.
pub const SECTOR_SIZE: usize = 512;

/// Bytes read by `loadstring`, terminator included.
pub const MAX_STRING_LENGTH: usize = 128;

/// Default number of bytes written per `wipe` chunk.
pub const WIPE_CHUNK_SIZE: usize = 4096;

/// Slots in the process-wide block cache.
pub const CACHE_SLOTS: usize = 64;

/// Runtime knobs for the transfer engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Bytes written per chunk by the zero-fill loop. Must be non-zero.
    pub chunk_size: usize,
    /// Flush the device once the last chunk is written.
    pub flush_after_wipe: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: WIPE_CHUNK_SIZE,
            flush_after_wipe: true,
        }
    }
}

impl TransferConfig {
    /// Set the chunk size.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Reject settings the transfer engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::new(
                ErrorKind::BadArgument,
                "Chunk size must be non-zero",
            ));
        }
        Ok(())
    }

    /// Enable or disable the trailing flush.
    pub fn flush_after_wipe(mut self, flush: bool) -> Self {
        self.flush_after_wipe = flush;
        self
    }
}
