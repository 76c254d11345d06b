//! Process-wide block cache
//!
//! Blocks read through [`Disk`](crate::disk::Disk) are kept in a small
//! direct-mapped cache shared by every disk in the environment. Direct
//! writes evict the blocks they touch, but callers that rewrite large
//! ranges must drop the whole cache first so no later read can return
//! pre-write contents.

use crate::config::CACHE_SLOTS;
use crate::disk::DiskId;
use alloc::boxed::Box;
use alloc::vec::Vec;
use spin::Mutex;

struct CacheEntry {
    disk: DiskId,
    lba: u64,
    data: Box<[u8]>,
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Direct-mapped cache of whole blocks keyed by (disk, LBA)
pub struct BlockCache {
    slots: Vec<Option<CacheEntry>>,
    stats: CacheStats,
}

impl BlockCache {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            stats: CacheStats { hits: 0, misses: 0 },
        }
    }

    fn slot_index(disk: DiskId, lba: u64) -> usize {
        (disk.0.wrapping_mul(0x9E37_79B9).wrapping_add(lba) % CACHE_SLOTS as u64) as usize
    }

    /// Copy a cached block into `dst`. Returns false on a miss.
    pub fn lookup(&mut self, disk: DiskId, lba: u64, dst: &mut [u8]) -> bool {
        let index = Self::slot_index(disk, lba);
        match self.slots.get(index) {
            Some(Some(entry))
                if entry.disk == disk && entry.lba == lba && entry.data.len() == dst.len() =>
            {
                dst.copy_from_slice(&entry.data);
                self.stats.hits += 1;
                true
            }
            _ => {
                self.stats.misses += 1;
                false
            }
        }
    }

    /// Store a block, replacing whatever shared its slot.
    ///
    /// Allocation failure is not an error: the block is simply not cached.
    pub fn insert(&mut self, disk: DiskId, lba: u64, data: &[u8]) {
        if self.slots.is_empty() {
            if self.slots.try_reserve_exact(CACHE_SLOTS).is_err() {
                return;
            }
            self.slots.resize_with(CACHE_SLOTS, || None);
        }

        let mut copy = Vec::new();
        if copy.try_reserve_exact(data.len()).is_err() {
            return;
        }
        copy.extend_from_slice(data);

        self.slots[Self::slot_index(disk, lba)] = Some(CacheEntry {
            disk,
            lba,
            data: copy.into_boxed_slice(),
        });
    }

    /// Drop one block if it is cached.
    pub fn invalidate(&mut self, disk: DiskId, lba: u64) {
        let index = Self::slot_index(disk, lba);
        if let Some(slot) = self.slots.get_mut(index) {
            if matches!(slot, Some(entry) if entry.disk == disk && entry.lba == lba) {
                *slot = None;
            }
        }
    }

    /// Drop every block belonging to `disk`.
    pub fn invalidate_disk(&mut self, disk: DiskId) {
        for slot in self.slots.iter_mut() {
            if matches!(slot, Some(entry) if entry.disk == disk) {
                *slot = None;
            }
        }
    }

    /// Drop everything.
    pub fn invalidate_all(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }

    /// Number of cached blocks
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

static CACHE: Mutex<BlockCache> = Mutex::new(BlockCache::new());

/// Run `f` with the process-wide cache locked.
pub fn with_cache<T>(f: impl FnOnce(&mut BlockCache) -> T) -> T {
    f(&mut CACHE.lock())
}

/// Drop every cached block of every disk.
pub fn invalidate_all() {
    log::debug!("disk cache: invalidating all blocks");
    CACHE.lock().invalidate_all();
}

/// Cache invalidation as seen by the transfer engine.
pub trait CacheControl {
    fn invalidate_all(&mut self);
}

/// Forwards to the process-wide cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalCache;

impl CacheControl for GlobalCache {
    fn invalidate_all(&mut self) {
        invalidate_all();
    }
}

impl<T: CacheControl + ?Sized> CacheControl for &mut T {
    fn invalidate_all(&mut self) {
        (**self).invalidate_all();
    }
}
