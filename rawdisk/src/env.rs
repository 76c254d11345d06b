//! Shell environment variables
//!
//! Process-wide named values. Commands publish results here and later
//! commands (or menu entries) read them back; the newest write always
//! wins. Values are raw bytes: what a command loaded from a disk is
//! stored exactly as read, valid UTF-8 or not.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use spin::Mutex;

static VARIABLES: Mutex<BTreeMap<String, Vec<u8>>> = Mutex::new(BTreeMap::new());

/// Set `name` to `value`, replacing any previous value.
pub fn set(name: &str, value: &[u8]) {
    log::debug!("env: {} = {} bytes", name, value.len());
    VARIABLES.lock().insert(String::from(name), value.to_vec());
}

pub fn get(name: &str) -> Option<Vec<u8>> {
    VARIABLES.lock().get(name).cloned()
}

/// Value of `name` as text, with invalid UTF-8 replaced by U+FFFD.
pub fn get_lossy(name: &str) -> Option<String> {
    get(name).map(|v| String::from_utf8_lossy(&v).into_owned())
}

/// Remove `name`, returning its last value.
pub fn unset(name: &str) -> Option<Vec<u8>> {
    VARIABLES.lock().remove(name)
}

/// Snapshot of every variable, sorted by name.
pub fn snapshot() -> Vec<(String, Vec<u8>)> {
    VARIABLES
        .lock()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Where commands publish named results.
pub trait VariableStore {
    fn set(&mut self, name: &str, value: &[u8]);
    fn get(&self, name: &str) -> Option<Vec<u8>>;
}

/// The process-wide environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalEnv;

impl VariableStore for GlobalEnv {
    fn set(&mut self, name: &str, value: &[u8]) {
        set(name, value);
    }

    fn get(&self, name: &str) -> Option<Vec<u8>> {
        get(name)
    }
}

/// A private environment, for hosts that keep one per shell instance.
impl VariableStore for BTreeMap<String, Vec<u8>> {
    fn set(&mut self, name: &str, value: &[u8]) {
        self.insert(String::from(name), value.to_vec());
    }

    fn get(&self, name: &str) -> Option<Vec<u8>> {
        BTreeMap::get(self, name).cloned()
    }
}

impl<T: VariableStore + ?Sized> VariableStore for &mut T {
    fn set(&mut self, name: &str, value: &[u8]) {
        (**self).set(name, value);
    }

    fn get(&self, name: &str) -> Option<Vec<u8>> {
        (**self).get(name)
    }
}
