//! Device table
//!
//! The host registers its block devices here under short names (`hd0`,
//! `cd0`, ...). Opening a device checks the disk out of the table, so a
//! disk has exactly one owner at a time; closing checks it back in.
//! Partitions are discovered from the GPT at registration time.

use crate::device::{Device, Partition};
use crate::disk::{alloc_zeroed, Disk};
use crate::error::{Error, ErrorKind, Result};
use crate::resolver::{parse_device_name, DeviceResolver};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use gpt_disk_io::{BlockIo, Disk as GptDisk};
use gpt_disk_types::{BlockSize, Lba};

const GPT_SIGNATURE: &[u8; 8] = b"EFI PART";

struct Entry<B: BlockIo> {
    name: String,
    /// None while checked out
    disk: Option<Disk<B>>,
    partitions: Vec<Partition>,
}

/// Named disks available to the shell
pub struct DeviceTable<B: BlockIo> {
    entries: Vec<Entry<B>>,
}

impl<B: BlockIo> DeviceTable<B> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a disk, reading its partitions from the GPT if it has one.
    ///
    /// Returns the number of partitions found.
    pub fn register(&mut self, name: &str, io: B) -> Result<usize> {
        let mut disk = Disk::new(io)?;
        let block_size = disk.block_size();
        let partitions = scan_gpt(disk.io_mut(), block_size)?;
        let count = partitions.len();
        self.insert(name, disk, partitions)?;
        Ok(count)
    }

    /// Register a disk with a partition layout supplied by the caller.
    pub fn register_with_partitions(
        &mut self,
        name: &str,
        io: B,
        partitions: Vec<Partition>,
    ) -> Result<()> {
        let disk = Disk::new(io)?;
        self.insert(name, disk, partitions)
    }

    fn insert(&mut self, name: &str, disk: Disk<B>, partitions: Vec<Partition>) -> Result<()> {
        if name.is_empty() || name.contains([',', '(', ')']) {
            return Err(Error::new(
                ErrorKind::BadArgument,
                format!("Invalid disk name {:?}", name),
            ));
        }
        if self.entries.iter().any(|e| e.name == name) {
            return Err(Error::new(
                ErrorKind::BadArgument,
                format!("Disk {} already registered", name),
            ));
        }

        log::info!(
            "table: registered {} ({} bytes, {} partitions)",
            name,
            disk.block_size() * disk.num_blocks(),
            partitions.len()
        );
        self.entries.push(Entry {
            name: String::from(name),
            disk: Some(disk),
            partitions,
        });
        Ok(())
    }

    /// Remove a disk that is not currently open, returning its device.
    pub fn unregister(&mut self, name: &str) -> Option<B> {
        let index = self
            .entries
            .iter()
            .position(|e| e.name == name && e.disk.is_some())?;
        let entry = self.entries.remove(index);
        entry.disk.map(Disk::into_inner)
    }

    pub fn partitions(&self, name: &str) -> Option<&[Partition]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.partitions.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Disks currently checked out
    pub fn open_count(&self) -> usize {
        self.entries.iter().filter(|e| e.disk.is_none()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<B: BlockIo> DeviceResolver for DeviceTable<B> {
    type Disk = Disk<B>;

    fn open(&mut self, arg: &str) -> Result<Device<Disk<B>>> {
        let name = parse_device_name(arg)?;

        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == name.disk)
            .ok_or_else(|| {
                Error::new(ErrorKind::UnknownDevice, format!("No such disk {}", name.disk))
            })?;

        let partition = match name.partition {
            Some(number) => Some(
                *entry
                    .partitions
                    .iter()
                    .find(|p| p.number == number)
                    .ok_or_else(|| {
                        Error::new(
                            ErrorKind::UnknownDevice,
                            format!("Disk {} has no partition {}", name.disk, number),
                        )
                    })?,
            ),
            None => None,
        };

        let disk = entry.disk.take().ok_or_else(|| {
            Error::new(ErrorKind::UnknownDevice, format!("Disk {} is busy", name.disk))
        })?;

        let device = Device::new(entry.name.clone(), disk);
        Ok(match partition {
            Some(part) => device.with_partition(part),
            None => device,
        })
    }

    fn close(&mut self, device: Device<Disk<B>>) {
        let (name, disk, _) = device.into_parts();
        let Some(disk) = disk else {
            return;
        };

        match self
            .entries
            .iter_mut()
            .find(|e| e.name == name && e.disk.is_none())
        {
            Some(entry) => entry.disk = Some(disk),
            None => log::error!("table: close of {} which is not checked out", name),
        }
    }
}

/// Borrowed device for the GPT scan.
///
/// `gpt_disk_io::Disk` flushes its device when dropped; the scan only
/// reads, so flushing here does nothing.
struct ScanIo<'a, B: BlockIo>(&'a mut B);

impl<B: BlockIo> BlockIo for ScanIo<'_, B> {
    type Error = B::Error;

    fn block_size(&self) -> BlockSize {
        self.0.block_size()
    }

    fn num_blocks(&mut self) -> core::result::Result<u64, Self::Error> {
        self.0.num_blocks()
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> core::result::Result<(), Self::Error> {
        self.0.read_blocks(start_lba, dst)
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> core::result::Result<(), Self::Error> {
        self.0.write_blocks(start_lba, src)
    }

    fn flush(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }
}

/// Read the used entries of the primary GPT.
///
/// A disk without a GPT signature has no partitions; that is not an error.
pub fn scan_gpt<B: BlockIo>(io: &mut B, block_size: u64) -> Result<Vec<Partition>> {
    let read_error = |what: &str| {
        Error::new(
            ErrorKind::ReadError,
            format!("Failed to read GPT {}", what),
        )
    };

    let mut partitions = Vec::new();
    let mut block = alloc_zeroed(block_size as usize)?;

    if io.num_blocks().map_err(|_| read_error("geometry"))? < 2 {
        return Ok(partitions);
    }
    io.read_blocks(Lba(1), &mut block)
        .map_err(|_| read_error("header"))?;
    if &block[..GPT_SIGNATURE.len()] != GPT_SIGNATURE {
        return Ok(partitions);
    }

    let mut gpt = GptDisk::new(ScanIo(io)).map_err(|_| read_error("header"))?;
    let header = gpt
        .read_primary_gpt_header(&mut block)
        .map_err(|_| read_error("header"))?;
    let layout = header
        .get_partition_entry_array_layout()
        .map_err(|_| read_error("entry layout"))?;

    let mut entry_buf = alloc_zeroed(block_size as usize)?;
    let iter = gpt
        .gpt_partition_entry_array_iter(layout, &mut entry_buf)
        .map_err(|_| read_error("entries"))?;

    for (index, entry) in iter.enumerate() {
        let entry = entry.map_err(|_| read_error("entries"))?;
        if !entry.is_used() {
            continue;
        }

        partitions.push(Partition::from_lba(
            index as u32 + 1,
            entry.starting_lba.to_u64(),
            entry.ending_lba.to_u64(),
            block_size,
        ));
    }

    Ok(partitions)
}
