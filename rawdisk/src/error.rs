//! Error types for raw disk commands

use alloc::string::String;
use core::fmt;

/// Result type for raw disk operations
pub type Result<T> = core::result::Result<T, Error>;

/// Category of a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong argument count or malformed argument
    BadArgument,
    /// Command name not known to this module
    UnknownCommand,
    /// Device could not be opened
    UnknownDevice,
    /// Device is open but has no disk behind it
    DeviceNotDisk,
    /// Partition-scoped command on a device without a partition
    InvalidPartition,
    /// Transfer buffer could not be allocated
    OutOfMemory,
    /// Medium read failed
    ReadError,
    /// Medium write failed
    WriteError,
    /// Access past the end of the medium
    OutOfRange,
}

impl ErrorKind {
    /// Get a short human-readable description of the kind
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BadArgument => "bad argument",
            Self::UnknownCommand => "unknown command",
            Self::UnknownDevice => "unknown device",
            Self::DeviceNotDisk => "device is not a disk",
            Self::InvalidPartition => "invalid partition",
            Self::OutOfMemory => "out of memory",
            Self::ReadError => "read error",
            Self::WriteError => "write error",
            Self::OutOfRange => "out of range",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed command: kind plus the message the shell prints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(self.kind.as_str())
        } else {
            f.write_str(&self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_display_prefers_message() {
        let err = Error::new(ErrorKind::UnknownDevice, "Failed to open device hd9");
        assert_eq!(err.to_string(), "Failed to open device hd9");
        assert_eq!(err.kind(), ErrorKind::UnknownDevice);
    }

    #[test]
    fn test_display_falls_back_to_kind() {
        let err = Error::new(ErrorKind::OutOfMemory, "");
        assert_eq!(err.to_string(), "out of memory");
    }
}
