//! Per-worker service container: local id → service record, plus the
//! `shared` flag the router consults when placing new services.

use fnv::FnvHashMap;

use crate::service::ServiceRecord;

/// Owns every service hosted by one worker.
pub struct ServiceContainer {
    services: FnvHashMap<u32, ServiceRecord>,
    /// `true` when this worker currently hosts zero services — the
    /// router prefers `shared` workers for new placements that don't
    /// name an explicit worker hint.
    shared: bool,
}

impl ServiceContainer {
    pub fn new() -> Self {
        ServiceContainer {
            services: FnvHashMap::default(),
            shared: true,
        }
    }

    pub fn get(&self, local_id: u32) -> Option<&ServiceRecord> {
        self.services.get(&local_id)
    }

    pub fn get_mut(&mut self, local_id: u32) -> Option<&mut ServiceRecord> {
        self.services.get_mut(&local_id)
    }

    pub fn contains(&self, local_id: u32) -> bool {
        self.services.contains_key(&local_id)
    }

    pub fn insert(&mut self, local_id: u32, record: ServiceRecord) {
        self.services.insert(local_id, record);
        self.shared = self.services.is_empty();
    }

    pub fn remove(&mut self, local_id: u32) -> Option<ServiceRecord> {
        let removed = self.services.remove(&local_id);
        self.shared = self.services.is_empty();
        removed
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &ServiceRecord)> {
        self.services.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&u32, &mut ServiceRecord)> {
        self.services.iter_mut()
    }

    pub fn shared(&self) -> bool {
        self.shared
    }

    pub fn set_shared(&mut self, shared: bool) {
        self.shared = shared;
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        ServiceContainer::new()
    }
}
