//! Raw Disk Transfers
//!
//! Unbuffered, sector-granular reads and writes against a block device or
//! one of its partitions, with no filesystem layer in between. This is the
//! engine behind the `loadstring` and `wipe` boot-shell commands.
//!
//! # Architecture
//!
//! 1. **Resolver** - maps `(hd0,gpt2)`-style names to an open [`device::Device`],
//!    released exactly once through [`resolver::DeviceHandle`]
//! 2. **Transfer engine** - a single bounded read ([`transfer::read_string`])
//!    or a chunked zero-fill loop ([`transfer::zero_fill`])
//! 3. **Publisher** - loaded strings go to the process-wide environment
//!    ([`env`]); wipes only report success or a typed [`Error`]
//!
//! # Usage
//!
//! ```ignore
//! use rawdisk::{command::Shell, table::DeviceTable};
//!
//! let mut table = DeviceTable::new();
//! table.register("hd0", uefi_block_io)?;
//!
//! let mut shell = Shell::new(table);
//! shell.execute("loadstring", &["(hd0,gpt3)", "distro"])?;
//! shell.execute("wipe", &["(hd0,gpt4)"])?;
//! ```

#![no_std]
#![allow(clippy::new_without_default)]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod cache;
pub mod command;
pub mod config;
pub mod device;
pub mod disk;
pub mod env;
pub mod error;
pub mod logger;
pub mod progress;
pub mod resolver;
pub mod table;
pub mod transfer;

pub use command::{CommandInfo, Shell};
pub use config::TransferConfig;
pub use device::{Device, Partition};
pub use disk::{Disk, DiskAccess, DiskRange};
pub use error::{Error, ErrorKind, Result};
pub use resolver::{DeviceHandle, DeviceResolver};
pub use table::DeviceTable;
pub use transfer::{LoadedString, WipeStats};
