//! Common test utilities: mock block devices, an instrumented resolver
//! and a GPT image builder

#![allow(dead_code)]

use gpt_disk_io::{BlockIo, BlockIoAdapter, Disk as GptDisk};
use gpt_disk_types::{
    guid, BlockSize, GptHeader, GptPartitionEntryArray, GptPartitionType, Lba, LbaLe, U32Le,
};
use rawdisk::cache::CacheControl;
use rawdisk::device::{Device, Partition};
use rawdisk::disk::DiskAccess;
use rawdisk::error::{Error, ErrorKind, Result};
use rawdisk::resolver::DeviceResolver;
use std::cell::RefCell;
use std::io;
use std::rc::Rc;

/// In-memory block device for testing
#[derive(Debug, Clone)]
pub struct MemoryBlockDevice {
    pub data: Vec<u8>,
    pub block_size: usize,
    pub read_calls: usize,
    pub write_calls: usize,
    pub flush_calls: usize,
    /// Fail every write once this many have succeeded
    pub fail_writes_after: Option<usize>,
    pub fail_reads: bool,
}

impl MemoryBlockDevice {
    pub fn new(data: Vec<u8>, block_size: usize) -> Self {
        Self {
            data,
            block_size,
            read_calls: 0,
            write_calls: 0,
            flush_calls: 0,
            fail_writes_after: None,
            fail_reads: false,
        }
    }

    /// `blocks` blocks of 512 bytes, every byte set to `fill`
    pub fn filled(blocks: usize, fill: u8) -> Self {
        Self::new(vec![fill; blocks * 512], 512)
    }
}

impl BlockIo for MemoryBlockDevice {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        BlockSize::new(self.block_size as u32).expect("valid block size")
    }

    fn num_blocks(&mut self) -> std::result::Result<u64, Self::Error> {
        Ok((self.data.len() / self.block_size) as u64)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> std::result::Result<(), Self::Error> {
        assert_eq!(dst.len() % self.block_size, 0, "unaligned read buffer");
        if self.fail_reads {
            return Err(io::Error::new(io::ErrorKind::Other, "injected read failure"));
        }
        let offset = start_lba.0 as usize * self.block_size;
        if offset + dst.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read beyond end of device",
            ));
        }
        self.read_calls += 1;
        dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
        Ok(())
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> std::result::Result<(), Self::Error> {
        assert_eq!(src.len() % self.block_size, 0, "unaligned write buffer");
        if self.fail_writes_after == Some(self.write_calls) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        let offset = start_lba.0 as usize * self.block_size;
        if offset + src.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write beyond end of device",
            ));
        }
        self.write_calls += 1;
        self.data[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> std::result::Result<(), Self::Error> {
        self.flush_calls += 1;
        Ok(())
    }
}

/// Build a 512-byte-block GPT disk with the given inclusive LBA spans.
///
/// Spans must fit between LBA 34 and `num_blocks - 34`.
pub fn gpt_image(num_blocks: u64, spans: &[(u64, u64)]) -> MemoryBlockDevice {
    let mut data = vec![0u8; num_blocks as usize * 512];

    {
        let io = BlockIoAdapter::new(data.as_mut_slice(), BlockSize::BS_512);
        let mut disk = GptDisk::new(io).expect("disk");

        let mut header = GptHeader {
            my_lba: LbaLe::from_u64(1),
            alternate_lba: LbaLe::from_u64(num_blocks - 1),
            first_usable_lba: LbaLe::from_u64(34),
            last_usable_lba: LbaLe::from_u64(num_blocks - 34),
            disk_guid: guid!("12345678-1234-1234-1234-123456789012"),
            partition_entry_lba: LbaLe::from_u64(2),
            number_of_partition_entries: U32Le::from_u32(128),
            ..Default::default()
        };

        disk.write_protective_mbr(&mut [0u8; 512]).expect("mbr");

        let layout = header.get_partition_entry_array_layout().expect("layout");
        let mut entry_buf = vec![0u8; 16384];
        let mut entries = GptPartitionEntryArray::new(layout, BlockSize::BS_512, &mut entry_buf)
            .expect("entry array");

        for (i, (start, end)) in spans.iter().enumerate() {
            let entry = entries
                .get_partition_entry_mut(i as u32)
                .expect("entry slot");
            entry.partition_type_guid = GptPartitionType::BASIC_DATA;
            entry.unique_partition_guid = guid!("12345678-1234-5678-1234-567812345678");
            entry.starting_lba = LbaLe::from_u64(*start);
            entry.ending_lba = LbaLe::from_u64(*end);
        }

        header.partition_entry_array_crc32 = entries.calculate_crc32();
        header.update_header_crc32();

        disk.write_primary_gpt_header(&header, &mut [0u8; 512])
            .expect("header");
        disk.write_gpt_partition_entry_array(&entries)
            .expect("entries");
    }

    MemoryBlockDevice::new(data, 512)
}

/// Things that happened to a recording disk or cache, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Invalidate,
    Read { offset: u64, len: usize },
    Write { offset: u64, len: usize },
    Flush,
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn writes(log: &EventLog) -> Vec<(u64, usize)> {
    log.borrow()
        .iter()
        .filter_map(|e| match *e {
            Event::Write { offset, len } => Some((offset, len)),
            _ => None,
        })
        .collect()
}

/// `DiskAccess` over a byte vector that logs every call
pub struct RecordingDisk {
    pub data: Vec<u8>,
    pub log: EventLog,
    /// 1-based write call that fails
    pub fail_write: Option<usize>,
    pub fail_reads: bool,
    write_count: usize,
}

impl RecordingDisk {
    pub fn new(data: Vec<u8>, log: EventLog) -> Self {
        Self {
            data,
            log,
            fail_write: None,
            fail_reads: false,
            write_count: 0,
        }
    }
}

impl DiskAccess for RecordingDisk {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&mut self, offset: u64, dst: &mut [u8]) -> Result<()> {
        self.log.borrow_mut().push(Event::Read {
            offset,
            len: dst.len(),
        });
        if self.fail_reads {
            return Err(Error::new(ErrorKind::ReadError, "injected read failure"));
        }
        let start = offset as usize;
        dst.copy_from_slice(&self.data[start..start + dst.len()]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, src: &[u8]) -> Result<()> {
        self.log.borrow_mut().push(Event::Write {
            offset,
            len: src.len(),
        });
        self.write_count += 1;
        if self.fail_write == Some(self.write_count) {
            return Err(Error::new(ErrorKind::WriteError, "injected write failure"));
        }
        let start = offset as usize;
        self.data[start..start + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.log.borrow_mut().push(Event::Flush);
        Ok(())
    }
}

/// Cache control that only records invalidations
pub struct RecordingCache {
    pub log: EventLog,
}

impl CacheControl for RecordingCache {
    fn invalidate_all(&mut self) {
        self.log.borrow_mut().push(Event::Invalidate);
    }
}

struct FakeEntry {
    name: String,
    has_disk: bool,
    disk: Option<RecordingDisk>,
    partition: Option<Partition>,
}

/// Resolver over exact names that counts opens and closes
#[derive(Default)]
pub struct FakeResolver {
    entries: Vec<FakeEntry>,
    pub open_attempts: usize,
    pub opens: usize,
    pub closes: usize,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_disk(&mut self, name: &str, disk: RecordingDisk, partition: Option<Partition>) {
        self.entries.push(FakeEntry {
            name: name.to_string(),
            has_disk: true,
            disk: Some(disk),
            partition,
        });
    }

    /// A device that opens but has no disk behind it
    pub fn add_diskless(&mut self, name: &str) {
        self.entries.push(FakeEntry {
            name: name.to_string(),
            has_disk: false,
            disk: None,
            partition: None,
        });
    }

    pub fn disk(&self, name: &str) -> &RecordingDisk {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.disk.as_ref())
            .expect("disk checked in")
    }

    pub fn disk_mut(&mut self, name: &str) -> &mut RecordingDisk {
        self.entries
            .iter_mut()
            .find(|e| e.name == name)
            .and_then(|e| e.disk.as_mut())
            .expect("disk checked in")
    }

    pub fn balanced(&self) -> bool {
        self.opens == self.closes
    }
}

impl DeviceResolver for FakeResolver {
    type Disk = RecordingDisk;

    fn open(&mut self, name: &str) -> Result<Device<RecordingDisk>> {
        self.open_attempts += 1;
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| Error::new(ErrorKind::UnknownDevice, "no such device"))?;

        let device = if entry.has_disk {
            let disk = entry
                .disk
                .take()
                .ok_or_else(|| Error::new(ErrorKind::UnknownDevice, "device busy"))?;
            Device::new(name, disk)
        } else {
            Device::without_disk(name)
        };

        self.opens += 1;
        Ok(match entry.partition {
            Some(part) => device.with_partition(part),
            None => device,
        })
    }

    fn close(&mut self, device: Device<RecordingDisk>) {
        self.closes += 1;
        let (name, disk, _) = device.into_parts();
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == name)
            .expect("closing a device this resolver opened");
        assert!(entry.disk.is_none(), "double close of {}", name);
        entry.disk = disk;
    }
}
