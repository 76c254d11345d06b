//! Shell commands
//!
//! `loadstring <device> <variable>` loads up to 127 bytes from the start
//! of a disk or partition into an environment variable, unchanged.
//!
//! `wipe (device)` zero-fills an entire partition. Whole disks are
//! refused.
//!
//! The host's command dispatcher registers [`COMMANDS`] and forwards
//! invocations to [`Shell::execute`].

use crate::cache::{CacheControl, GlobalCache};
use crate::config::TransferConfig;
use crate::env::{GlobalEnv, VariableStore};
use crate::error::{Error, ErrorKind, Result};
use crate::progress::{LogProgress, Progress};
use crate::resolver::{resolve_disk, resolve_partition, DeviceResolver};
use crate::transfer::{read_string, zero_fill, WipeStats};
use alloc::format;

/// Registration metadata for one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: &'static str,
    pub usage: &'static str,
    pub summary: &'static str,
}

pub const LOADSTRING: CommandInfo = CommandInfo {
    name: "loadstring",
    usage: "loadstring <device> <variable>",
    summary: "Load string from partition",
};

pub const WIPE: CommandInfo = CommandInfo {
    name: "wipe",
    usage: "wipe (device)",
    summary: "Wipe specified partition with zeroes",
};

/// Every command this module provides
pub const COMMANDS: &[CommandInfo] = &[LOADSTRING, WIPE];

fn usage(info: &CommandInfo) -> Error {
    Error::new(ErrorKind::BadArgument, format!("Usage: {}", info.usage))
}

fn not_disk(arg: &str) -> Error {
    Error::new(ErrorKind::DeviceNotDisk, format!("Device {} is not disk", arg))
}

/// Everything a command touches besides its arguments.
pub struct Shell<R, C = GlobalCache, V = GlobalEnv, P = LogProgress> {
    resolver: R,
    cache: C,
    vars: V,
    progress: P,
    config: TransferConfig,
}

impl<R: DeviceResolver> Shell<R> {
    /// Shell over the process-wide cache and environment.
    pub fn new(resolver: R) -> Self {
        Self::with_parts(resolver, GlobalCache, GlobalEnv, LogProgress)
    }
}

impl<R, C, V, P> Shell<R, C, V, P>
where
    R: DeviceResolver,
    C: CacheControl,
    V: VariableStore,
    P: Progress,
{
    pub fn with_parts(resolver: R, cache: C, vars: V, progress: P) -> Self {
        Self {
            resolver,
            cache,
            vars,
            progress,
            config: TransferConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TransferConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut R {
        &mut self.resolver
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn vars(&self) -> &V {
        &self.vars
    }

    pub fn progress(&self) -> &P {
        &self.progress
    }

    /// Run `name` with `args` (command name not included).
    pub fn execute(&mut self, name: &str, args: &[&str]) -> Result<()> {
        match name {
            n if n == LOADSTRING.name => self.loadstring(args),
            n if n == WIPE.name => self.wipe(args).map(|_| ()),
            _ => Err(Error::new(
                ErrorKind::UnknownCommand,
                format!("Unknown command `{}'", name),
            )),
        }
    }

    /// `loadstring <device> <variable>`
    pub fn loadstring(&mut self, args: &[&str]) -> Result<()> {
        if args.len() < 2 {
            return Err(usage(&LOADSTRING));
        }
        let (device_arg, variable) = (args[0], args[1]);

        let loaded = {
            let mut handle = resolve_disk(&mut self.resolver, device_arg)?;
            let range = handle.range();
            let disk = handle.disk_mut().ok_or_else(|| not_disk(device_arg))?;
            read_string(disk, range)?
        };

        let value = loaded.as_bytes();
        log::info!(
            "loadstring: {} = {} bytes from {}",
            variable,
            value.len(),
            device_arg
        );
        self.vars.set(variable, value);
        Ok(())
    }

    /// `wipe (device)`
    pub fn wipe(&mut self, args: &[&str]) -> Result<WipeStats> {
        if args.len() != 1 {
            return Err(usage(&WIPE));
        }
        self.config.validate()?;
        let device_arg = args[0];

        let mut handle = resolve_partition(&mut self.resolver, device_arg)?;
        let range = handle.range();
        log::info!(
            "wipe: zeroing {} bytes of {} at offset {}",
            range.len,
            device_arg,
            range.start
        );

        let disk = handle.disk_mut().ok_or_else(|| not_disk(device_arg))?;
        let stats = zero_fill(
            disk,
            range,
            &self.config,
            &mut self.cache,
            &mut self.progress,
        )?;

        log::info!("wipe: {} done, {} chunks", device_arg, stats.chunks);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_table() {
        let names: alloc::vec::Vec<&str> = COMMANDS.iter().map(|c| c.name).collect();
        assert_eq!(names, ["loadstring", "wipe"]);
        assert!(usage(&WIPE).message().contains("wipe (device)"));
        assert_eq!(usage(&LOADSTRING).kind(), ErrorKind::BadArgument);
    }
}
