//! Device resolution
//!
//! Turns a user-supplied device argument into an open [`Device`] wrapped
//! in a [`DeviceHandle`]. The handle gives the device back to its
//! resolver exactly once, when it goes out of scope, so every early
//! return in a command releases the device without an explicit close.

use crate::device::Device;
use crate::disk::DiskAccess;
use crate::error::{Error, ErrorKind, Result};
use alloc::format;
use alloc::string::String;
use core::mem;
use core::ops::{Deref, DerefMut};

/// A device argument split into disk and optional partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceName<'a> {
    pub disk: &'a str,
    /// 1-based partition number
    pub partition: Option<u32>,
}

/// Parse `hd0`, `hd0,2`, `(hd0,gpt2)` or `(hd0,msdos1)/ignored/path`.
pub fn parse_device_name(arg: &str) -> Result<DeviceName<'_>> {
    let unknown = || {
        Error::new(
            ErrorKind::UnknownDevice,
            format!("Failed to open device {}", arg),
        )
    };

    let arg_trimmed = arg.trim();
    let name = match arg_trimmed.strip_prefix('(') {
        Some(rest) => {
            let close = rest.find(')').ok_or_else(|| {
                Error::new(ErrorKind::BadArgument, format!("Missing `)' in {}", arg))
            })?;
            &rest[..close]
        }
        None => arg_trimmed,
    };

    let (disk, partition) = match name.split_once(',') {
        Some((disk, part)) => (disk, Some(part)),
        None => (name, None),
    };

    if disk.is_empty() {
        return Err(unknown());
    }

    let partition = match partition {
        Some(token) => {
            let digits = token
                .strip_prefix("gpt")
                .or_else(|| token.strip_prefix("msdos"))
                .unwrap_or(token);
            match digits.parse::<u32>() {
                Ok(n) if n >= 1 => Some(n),
                _ => return Err(unknown()),
            }
        }
        None => None,
    };

    Ok(DeviceName { disk, partition })
}

/// Opens and closes devices on behalf of commands.
pub trait DeviceResolver {
    type Disk: DiskAccess;

    /// Open the device named by a raw command argument.
    fn open(&mut self, name: &str) -> Result<Device<Self::Disk>>;

    /// Release a device obtained from [`open`](Self::open).
    fn close(&mut self, device: Device<Self::Disk>);
}

impl<R: DeviceResolver + ?Sized> DeviceResolver for &mut R {
    type Disk = R::Disk;

    fn open(&mut self, name: &str) -> Result<Device<Self::Disk>> {
        (**self).open(name)
    }

    fn close(&mut self, device: Device<Self::Disk>) {
        (**self).close(device)
    }
}

/// An open device, closed through its resolver on drop.
pub struct DeviceHandle<'r, R: DeviceResolver + ?Sized> {
    resolver: &'r mut R,
    /// Replaced by a diskless placeholder when the handle closes
    device: Device<R::Disk>,
}

impl<'r, R: DeviceResolver + ?Sized> DeviceHandle<'r, R> {
    /// Open `name`.
    ///
    /// A malformed name stays `BadArgument`; every other failure is
    /// reported as `UnknownDevice`.
    pub fn open(resolver: &'r mut R, name: &str) -> Result<Self> {
        let device = resolver.open(name).map_err(|e| {
            log::warn!("resolve: cannot open {}: {}", name, e);
            match e.kind() {
                ErrorKind::BadArgument => e,
                _ => Error::new(
                    ErrorKind::UnknownDevice,
                    format!("Failed to open device {}: {}", name, e),
                ),
            }
        })?;
        log::debug!("resolve: opened {}", device.name());

        Ok(Self {
            resolver,
            device,
        })
    }

    /// Close now instead of at end of scope.
    pub fn close(self) {}
}

impl<R: DeviceResolver + ?Sized> Deref for DeviceHandle<'_, R> {
    type Target = Device<R::Disk>;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

impl<R: DeviceResolver + ?Sized> DerefMut for DeviceHandle<'_, R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.device
    }
}

impl<R: DeviceResolver + ?Sized> Drop for DeviceHandle<'_, R> {
    fn drop(&mut self) {
        let device = mem::replace(&mut self.device, Device::without_disk(String::new()));
        log::trace!("resolve: closing {}", device.name());
        self.resolver.close(device);
    }
}

/// Open `arg` and require a disk behind it.
pub fn resolve_disk<'r, R: DeviceResolver + ?Sized>(
    resolver: &'r mut R,
    arg: &str,
) -> Result<DeviceHandle<'r, R>> {
    let handle = DeviceHandle::open(resolver, arg)?;

    if handle.disk().is_none() {
        return Err(Error::new(
            ErrorKind::DeviceNotDisk,
            format!("Device {} is not disk", arg),
        ));
    }

    Ok(handle)
}

/// Open `arg` and require a disk scoped to a partition.
pub fn resolve_partition<'r, R: DeviceResolver + ?Sized>(
    resolver: &'r mut R,
    arg: &str,
) -> Result<DeviceHandle<'r, R>> {
    let handle = resolve_disk(resolver, arg)?;

    if handle.partition().is_none() {
        return Err(Error::new(
            ErrorKind::InvalidPartition,
            format!("Invalid partition: {} names a whole disk", arg),
        ));
    }

    Ok(handle)
}
