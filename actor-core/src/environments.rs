//! Process-wide env key/value store and unique-service-name registry.
//!
//! Both are read-mostly: looked up on nearly every `new_service` and
//! rarely written after boot. A reader-writer lock over an `FnvHashMap`
//! serializes writers while letting readers run concurrently, so no
//! caller ever observes a partially written value.

use fnv::FnvHashMap;
use parking_lot::RwLock;

/// Simple string → string table, analogous to a per-connection
/// `Environments` map but process-scoped and string-valued.
#[derive(Default)]
pub struct EnvTable {
    inner: RwLock<FnvHashMap<String, String>>,
}

impl EnvTable {
    pub fn new() -> Self {
        EnvTable::default()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.inner.read().get(name).cloned()
    }

    pub fn set(&self, name: String, value: String) {
        self.inner.write().insert(name, value);
    }
}

/// Single-writer-at-a-time registry mapping a unique service name to its
/// address. `set` only succeeds the first time a name is claimed.
#[derive(Default)]
pub struct UniqueTable {
    inner: RwLock<FnvHashMap<String, u32>>,
}

impl UniqueTable {
    pub fn new() -> Self {
        UniqueTable::default()
    }

    pub fn get(&self, name: &str) -> u32 {
        if name.is_empty() {
            return 0;
        }
        self.inner.read().get(name).copied().unwrap_or(0)
    }

    /// Returns `true` iff `name` had no prior entry.
    pub fn set(&self, name: String, addr: u32) -> bool {
        if name.is_empty() {
            return false;
        }
        let mut guard = self.inner.write();
        if guard.contains_key(&name) {
            return false;
        }
        guard.insert(name, addr);
        true
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_roundtrips() {
        let env = EnvTable::new();
        assert_eq!(env.get("missing"), None);
        env.set("sid".into(), "1".into());
        assert_eq!(env.get("sid"), Some("1".into()));
    }

    #[test]
    fn unique_name_claimed_once() {
        let table = UniqueTable::new();
        assert!(table.set("db".into(), 0x0100_0001));
        assert!(!table.set("db".into(), 0x0200_0001));
        assert_eq!(table.get("db"), 0x0100_0001);
    }

    #[test]
    fn empty_name_never_registers() {
        let table = UniqueTable::new();
        assert!(!table.set(String::new(), 1));
        assert_eq!(table.get(""), 0);
    }
}
