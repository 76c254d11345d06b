//! Transfer engine
//!
//! Two transfers share the resolver and publisher:
//! - [`read_string`]: one bounded read from the start of a range into an
//!   owned, always-terminated buffer
//! - [`zero_fill`]: overwrite a whole range with zeroes in fixed-size
//!   chunks, so a single small buffer covers partitions of any size
//!
//! Neither retries. A failed medium operation ends the transfer; bytes
//! zeroed before a failing chunk stay zeroed.

use crate::cache::CacheControl;
use crate::config::{TransferConfig, MAX_STRING_LENGTH};
use crate::disk::{alloc_zeroed, DiskAccess, DiskRange};
use crate::error::{Error, ErrorKind, Result};
use crate::progress::Progress;
use alloc::format;
use alloc::string::String;

/// Bytes loaded by [`read_string`], last byte forced to NUL.
#[derive(Clone, PartialEq, Eq)]
pub struct LoadedString {
    buf: [u8; MAX_STRING_LENGTH],
}

impl LoadedString {
    /// Take ownership of raw bytes, terminating them.
    pub fn from_raw(mut buf: [u8; MAX_STRING_LENGTH]) -> Self {
        buf[MAX_STRING_LENGTH - 1] = 0;
        Self { buf }
    }

    /// The whole buffer, terminator included.
    pub fn raw(&self) -> &[u8; MAX_STRING_LENGTH] {
        &self.buf
    }

    /// Bytes before the first NUL.
    pub fn as_bytes(&self) -> &[u8] {
        let len = self
            .buf
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_STRING_LENGTH - 1);
        &self.buf[..len]
    }

    /// String value, with invalid UTF-8 replaced by U+FFFD.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

impl core::fmt::Debug for LoadedString {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("LoadedString")
            .field(&self.to_string_lossy())
            .finish()
    }
}

/// Read [`MAX_STRING_LENGTH`] bytes from the start of `range`.
pub fn read_string<D: DiskAccess + ?Sized>(disk: &mut D, range: DiskRange) -> Result<LoadedString> {
    let len = MAX_STRING_LENGTH as u64;
    if !range.contains(range.start, len) {
        return Err(Error::new(
            ErrorKind::ReadError,
            format!("Range of {} bytes is too small for a {} byte string", range.len, len),
        ));
    }

    let mut buf = [0u8; MAX_STRING_LENGTH];
    disk.read_at(range.start, &mut buf).map_err(|e| {
        log::error!("loadstring: read at {} failed: {}", range.start, e);
        Error::new(ErrorKind::ReadError, format!("Failed to read string: {}", e))
    })?;

    Ok(LoadedString::from_raw(buf))
}

/// Outcome of a completed [`zero_fill`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WipeStats {
    /// Write calls issued
    pub chunks: u64,
    /// Bytes zeroed
    pub bytes: u64,
}

/// Overwrite `range` with zeroes, `config.chunk_size` bytes per write.
///
/// The buffer is allocated before anything else happens, then every
/// cache is dropped exactly once, then the chunks are written in order.
pub fn zero_fill<D, C, P>(
    disk: &mut D,
    range: DiskRange,
    config: &TransferConfig,
    cache: &mut C,
    progress: &mut P,
) -> Result<WipeStats>
where
    D: DiskAccess + ?Sized,
    C: CacheControl + ?Sized,
    P: Progress + ?Sized,
{
    config.validate()?;
    if range.end() > disk.size() {
        return Err(Error::new(
            ErrorKind::OutOfRange,
            format!(
                "Range {}..{} extends past end of disk ({} bytes)",
                range.start,
                range.end(),
                disk.size()
            ),
        ));
    }

    let zero_buf = alloc_zeroed(config.chunk_size).map_err(|e| {
        log::error!("wipe: {}", e);
        Error::new(ErrorKind::OutOfMemory, "Cannot allocate buffer")
    })?;

    cache.invalidate_all();

    let mut offset = range.start;
    let mut remaining = range.len;
    let mut stats = WipeStats::default();

    while remaining > 0 {
        progress.on_chunk(remaining);
        let write_size = remaining.min(zero_buf.len() as u64);

        disk.write_at(offset, &zero_buf[..write_size as usize])
            .map_err(|e| {
                log::error!("wipe: chunk at {} failed: {}", offset, e);
                Error::new(
                    ErrorKind::WriteError,
                    format!("Failed to write zeroes at offset {}: {}", offset, e),
                )
            })?;

        offset += write_size;
        remaining -= write_size;
        stats.chunks += 1;
        stats.bytes += write_size;
    }

    if config.flush_after_wipe {
        disk.flush().map_err(|e| {
            Error::new(
                ErrorKind::WriteError,
                format!("Failed to flush after wipe: {}", e),
            )
        })?;
    }

    Ok(stats)
}
