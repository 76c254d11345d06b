// Opened devices and partition scoping

use crate::disk::{DiskAccess, DiskRange};
use alloc::string::String;

/// A partition on a disk, addressed in bytes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    /// 1-based partition number as written in device names
    pub number: u32,
    pub range: DiskRange,
}

impl Partition {
    pub const fn new(number: u32, range: DiskRange) -> Self {
        Self { number, range }
    }

    /// Build from an inclusive LBA span, as recorded in GPT entries.
    pub fn from_lba(number: u32, start_lba: u64, end_lba: u64, block_size: u64) -> Self {
        let count = end_lba.saturating_sub(start_lba).saturating_add(1);
        Self {
            number,
            range: DiskRange::from_sectors(start_lba, count, block_size),
        }
    }

    pub fn start(&self) -> u64 {
        self.range.start
    }

    pub fn len(&self) -> u64 {
        self.range.len
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// An open device: a disk, optionally scoped to one partition.
///
/// A device without a disk (network boot targets and the like) can be
/// opened but not used for raw transfers.
pub struct Device<D> {
    name: String,
    disk: Option<D>,
    partition: Option<Partition>,
}

impl<D: DiskAccess> Device<D> {
    pub fn new(name: impl Into<String>, disk: D) -> Self {
        Self {
            name: name.into(),
            disk: Some(disk),
            partition: None,
        }
    }

    /// A device with nothing to transfer to or from.
    pub fn without_disk(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            disk: None,
            partition: None,
        }
    }

    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn disk(&self) -> Option<&D> {
        self.disk.as_ref()
    }

    pub fn disk_mut(&mut self) -> Option<&mut D> {
        self.disk.as_mut()
    }

    pub fn partition(&self) -> Option<&Partition> {
        self.partition.as_ref()
    }

    /// Addressable range: the partition if scoped, else the whole disk.
    pub fn range(&self) -> DiskRange {
        match (&self.partition, &self.disk) {
            (Some(part), _) => part.range,
            (None, Some(disk)) => DiskRange::new(0, disk.size()),
            (None, None) => DiskRange::default(),
        }
    }

    /// Split into parts, e.g. to hand the disk back to its owner.
    pub fn into_parts(self) -> (String, Option<D>, Option<Partition>) {
        (self.name, self.disk, self.partition)
    }
}
