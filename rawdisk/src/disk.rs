//! Byte-addressed access to block devices
//!
//! [`DiskAccess`] is the narrow read/write capability the transfer engine
//! works against. [`Disk`] implements it on top of any
//! `gpt_disk_io::BlockIo`, turning arbitrary byte ranges into whole-block
//! transfers: reads go through the process-wide [`cache`](crate::cache),
//! partial-block writes are read-modify-write, and every written block is
//! evicted from the cache.

use crate::cache;
use crate::config::SECTOR_SIZE;
use crate::error::{Error, ErrorKind, Result};
use alloc::format;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

/// Identity of an opened disk, used to key cached blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiskId(pub u64);

static NEXT_DISK_ID: AtomicU64 = AtomicU64::new(1);

impl DiskId {
    /// Hand out an id no other disk in this environment has used.
    pub fn allocate() -> Self {
        Self(NEXT_DISK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A byte range on a disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskRange {
    /// First byte
    pub start: u64,
    /// Length in bytes
    pub len: u64,
}

impl DiskRange {
    pub const fn new(start: u64, len: u64) -> Self {
        Self { start, len }
    }

    /// Range covering `count` sectors of `sector_size` bytes from `start`.
    pub fn from_sectors(start: u64, count: u64, sector_size: u64) -> Self {
        Self {
            start: start.saturating_mul(sector_size),
            len: count.saturating_mul(sector_size),
        }
    }

    /// One past the last byte
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True if `[offset, offset + len)` lies inside this range.
    pub fn contains(&self, offset: u64, len: u64) -> bool {
        offset >= self.start
            && offset
                .checked_add(len)
                .map_or(false, |end| end <= self.end())
    }
}

/// Absolute byte offset of `byte_offset` within `sector`.
pub fn sector_offset(sector: u64, byte_offset: u64) -> Result<u64> {
    sector
        .checked_mul(SECTOR_SIZE as u64)
        .and_then(|base| base.checked_add(byte_offset))
        .ok_or_else(|| {
            Error::new(
                ErrorKind::OutOfRange,
                format!("Sector {} offset {} overflows", sector, byte_offset),
            )
        })
}

/// Allocate a zero-filled buffer without aborting on exhaustion.
pub fn alloc_zeroed(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| {
        Error::new(
            ErrorKind::OutOfMemory,
            format!("Cannot allocate {} byte buffer", len),
        )
    })?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Unbuffered byte-granular disk access
pub trait DiskAccess {
    /// Addressable size in bytes
    fn size(&self) -> u64;

    /// Read `dst.len()` bytes starting at absolute byte `offset`.
    fn read_at(&mut self, offset: u64, dst: &mut [u8]) -> Result<()>;

    /// Write all of `src` starting at absolute byte `offset`.
    fn write_at(&mut self, offset: u64, src: &[u8]) -> Result<()>;

    /// Push outstanding writes to the medium.
    fn flush(&mut self) -> Result<()>;

    /// Read using sector + byte offset addressing.
    fn read(&mut self, sector: u64, byte_offset: u64, dst: &mut [u8]) -> Result<()> {
        let offset = sector_offset(sector, byte_offset)?;
        self.read_at(offset, dst)
    }

    /// Write using sector + byte offset addressing.
    fn write(&mut self, sector: u64, byte_offset: u64, src: &[u8]) -> Result<()> {
        let offset = sector_offset(sector, byte_offset)?;
        self.write_at(offset, src)
    }
}

/// A block device opened for raw transfers
pub struct Disk<B: BlockIo> {
    id: DiskId,
    io: B,
    block_size: u64,
    num_blocks: u64,
}

impl<B: BlockIo> Disk<B> {
    /// Wrap a block device, querying its geometry once.
    pub fn new(mut io: B) -> Result<Self> {
        let block_size = io.block_size().to_u64();
        let num_blocks = io.num_blocks().map_err(|e| {
            Error::new(
                ErrorKind::ReadError,
                format!("Cannot query disk size: {}", e),
            )
        })?;

        Ok(Self {
            id: DiskId::allocate(),
            io,
            block_size,
            num_blocks,
        })
    }

    pub fn id(&self) -> DiskId {
        self.id
    }

    /// Native block size in bytes
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn num_blocks(&self) -> u64 {
        self.num_blocks
    }

    /// Access the underlying device, bypassing the cache.
    pub fn io_mut(&mut self) -> &mut B {
        &mut self.io
    }

    /// Give the block device back, dropping any blocks cached for it.
    pub fn into_inner(self) -> B {
        cache::with_cache(|c| c.invalidate_disk(self.id));
        self.io
    }

    fn check_bounds(&self, offset: u64, len: usize, op: &str) -> Result<()> {
        let whole = DiskRange::new(0, self.size());
        if whole.contains(offset, len as u64) {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::OutOfRange,
                format!(
                    "Attempt to {} {} bytes at offset {} outside disk of {} bytes",
                    op,
                    len,
                    offset,
                    self.size()
                ),
            ))
        }
    }

    fn read_block(&mut self, lba: u64, dst: &mut [u8]) -> Result<()> {
        let id = self.id;
        if cache::with_cache(|c| c.lookup(id, lba, dst)) {
            return Ok(());
        }

        self.io.read_blocks(Lba(lba), dst).map_err(|e| {
            Error::new(
                ErrorKind::ReadError,
                format!("Failed to read block {}: {}", lba, e),
            )
        })?;

        cache::with_cache(|c| c.insert(id, lba, dst));
        Ok(())
    }

    fn write_blocks(&mut self, lba: u64, src: &[u8]) -> Result<()> {
        self.io.write_blocks(Lba(lba), src).map_err(|e| {
            Error::new(
                ErrorKind::WriteError,
                format!("Failed to write block {}: {}", lba, e),
            )
        })?;

        let id = self.id;
        let count = src.len() as u64 / self.block_size;
        cache::with_cache(|c| {
            for n in 0..count {
                c.invalidate(id, lba + n);
            }
        });
        Ok(())
    }
}

impl<B: BlockIo> DiskAccess for Disk<B> {
    fn size(&self) -> u64 {
        self.block_size.saturating_mul(self.num_blocks)
    }

    fn read_at(&mut self, offset: u64, dst: &mut [u8]) -> Result<()> {
        self.check_bounds(offset, dst.len(), "read")?;

        let bs = self.block_size as usize;
        let mut block = alloc_zeroed(bs)?;
        let mut done = 0usize;

        while done < dst.len() {
            let pos = offset + done as u64;
            let lba = pos / self.block_size;
            let within = (pos % self.block_size) as usize;
            let n = (bs - within).min(dst.len() - done);

            self.read_block(lba, &mut block)?;
            dst[done..done + n].copy_from_slice(&block[within..within + n]);
            done += n;
        }

        Ok(())
    }

    fn write_at(&mut self, offset: u64, src: &[u8]) -> Result<()> {
        self.check_bounds(offset, src.len(), "write")?;

        let bs = self.block_size as usize;
        let mut block = Vec::new();
        let mut done = 0usize;

        while done < src.len() {
            let pos = offset + done as u64;
            let lba = pos / self.block_size;
            let within = (pos % self.block_size) as usize;
            let left = src.len() - done;

            if within == 0 && left >= bs {
                // Aligned run of whole blocks goes straight to the device
                let run = left / bs * bs;
                self.write_blocks(lba, &src[done..done + run])?;
                done += run;
                continue;
            }

            // Partial block: read-modify-write
            if block.is_empty() {
                block = alloc_zeroed(bs)?;
            }
            let n = (bs - within).min(left);
            self.io.read_blocks(Lba(lba), &mut block).map_err(|e| {
                Error::new(
                    ErrorKind::WriteError,
                    format!("Failed to read block {} for partial write: {}", lba, e),
                )
            })?;
            block[within..within + n].copy_from_slice(&src[done..done + n]);
            self.write_blocks(lba, &block)?;
            done += n;
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.io.flush().map_err(|e| {
            Error::new(ErrorKind::WriteError, format!("Failed to flush disk: {}", e))
        })
    }
}
