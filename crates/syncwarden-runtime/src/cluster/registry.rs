use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use syncwarden_core::cluster::{
    validate_endpoint, validate_name, Member, Node, NodeRole, SyncStandbys,
};
use syncwarden_core::error::{Result, WardenError};

/// Occupied slot contents.
#[derive(Debug, Clone)]
struct Entry {
    name: String,
    endpoint: String,
    role: NodeRole,
    is_self: bool,
    sync: bool,
}

/// One registry slot. `entry` is `None` when the slot is free.
#[derive(Debug, Default)]
struct Slot {
    entry: Option<Entry>,
    failure_count: Mutex<u32>,
}

impl Slot {
    fn snapshot(&self) -> Option<Node> {
        let entry = self.entry.as_ref()?;
        let failure_count = *self
            .failure_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        Some(Node {
            name: entry.name.clone(),
            endpoint: entry.endpoint.clone(),
            role: entry.role,
            is_self: entry.is_self,
            sync: entry.sync,
            failure_count,
        })
    }

    fn clear(&mut self) {
        self.entry = None;
        *self
            .failure_count
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner) = 0;
    }
}

/// Densely packed slots: `slots[..count]` are occupied, the rest are free.
#[derive(Debug)]
struct Slots {
    slots: Box<[Slot]>,
    count: usize,
}

impl Slots {
    fn position(&self, name: &str) -> Option<usize> {
        self.slots[..self.count]
            .iter()
            .position(|s| s.entry.as_ref().is_some_and(|e| e.name == name))
    }

    fn occupied(&self) -> impl Iterator<Item = &Slot> {
        self.slots[..self.count].iter()
    }
}

/// Fixed-capacity registry of cluster members.
///
/// Structural operations (add, remove, snapshot, count) take a coarse
/// reader/writer lock. Each slot also carries its own mutex guarding only the
/// consecutive-failure counter, so heartbeat updates run under the shared
/// form of the coarse lock and never block listings.
///
/// Removal moves the last occupied slot into the freed position, so a slot
/// index is not a stable handle. Nodes are always addressed by name.
#[derive(Debug)]
pub struct NodeRegistry {
    inner: RwLock<Slots>,
    capacity: usize,
    local_role: NodeRole,
}

impl NodeRegistry {
    /// Create a registry with `capacity` slots for a process in `local_role`.
    pub fn new(capacity: usize, local_role: NodeRole) -> Self {
        let slots = (0..capacity).map(|_| Slot::default()).collect();
        Self {
            inner: RwLock::new(Slots { slots, count: 0 }),
            capacity,
            local_role,
        }
    }

    /// Maximum number of nodes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Role of the local process, stamped on every new entry.
    pub fn local_role(&self) -> NodeRole {
        self.local_role
    }

    fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a node.
    ///
    /// With `allow_duplicate` an existing entry of the same name is left
    /// untouched and the call succeeds, which lets a restarted node rejoin.
    pub fn add(
        &self,
        name: &str,
        endpoint: &str,
        is_self: bool,
        allow_duplicate: bool,
    ) -> Result<bool> {
        validate_name(name)?;
        validate_endpoint(endpoint)?;

        let mut slots = self.write();

        if slots.position(name).is_some() {
            if allow_duplicate {
                tracing::debug!(node = name, "Node already registered, ignoring duplicate");
                return Ok(true);
            }
            return Err(WardenError::DuplicateName(name.to_string()));
        }

        if is_self && slots.occupied().any(|s| s.entry.as_ref().is_some_and(|e| e.is_self)) {
            return Err(WardenError::InvalidArgument(
                "local node is already registered".to_string(),
            ));
        }

        if slots.count >= self.capacity {
            return Err(WardenError::CapacityExceeded(self.capacity));
        }

        let index = slots.count;
        let slot = &mut slots.slots[index];
        slot.entry = Some(Entry {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            role: self.local_role,
            is_self,
            sync: false,
        });
        *slot
            .failure_count
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner) = 0;
        slots.count += 1;
        let count = slots.count;
        drop(slots);

        tracing::info!(node = name, endpoint, slot = index, count, "Registered node");
        Ok(true)
    }

    /// Remove a node by name.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let mut slots = self.write();

        let index = slots
            .position(name)
            .ok_or_else(|| WardenError::NotFound(name.to_string()))?;

        if slots.slots[index]
            .entry
            .as_ref()
            .is_some_and(|e| e.is_self)
        {
            return Err(WardenError::InvalidArgument(
                "cannot remove the local node".to_string(),
            ));
        }

        // Move the tail into the hole to keep the occupied prefix dense.
        let last = slots.count - 1;
        slots.slots.swap(index, last);
        slots.slots[last].clear();
        slots.count -= 1;
        let count = slots.count;
        drop(slots);

        tracing::info!(node = name, count, "Removed node");
        Ok(true)
    }

    /// Consistent copy of all occupied entries.
    pub fn snapshot(&self) -> Vec<Node> {
        self.read().occupied().filter_map(Slot::snapshot).collect()
    }

    /// Name and endpoint of every member.
    pub fn members(&self) -> Vec<Member> {
        self.snapshot().iter().map(Member::from).collect()
    }

    /// Copy of a single entry.
    pub fn get(&self, name: &str) -> Option<Node> {
        let slots = self.read();
        let index = slots.position(name)?;
        slots.slots[index].snapshot()
    }

    /// Number of occupied slots.
    pub fn count(&self) -> usize {
        self.read().count
    }

    /// Apply one probe outcome to a node's failure counter.
    ///
    /// Returns the updated counter, or `None` when the node was removed
    /// after the round took its snapshot.
    pub fn record_probe_result(&self, name: &str, success: bool) -> Option<u32> {
        let slots = self.read();
        let index = slots.position(name)?;

        let mut failures = slots.slots[index]
            .failure_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if success {
            *failures = 0;
        } else {
            *failures = failures.saturating_add(1);
        }
        Some(*failures)
    }

    /// Refresh the `sync` flags from the parsed `synchronous_standby_names`.
    pub fn mark_sync(&self, standbys: Option<&SyncStandbys>) {
        let mut slots = self.write();
        let count = slots.count;
        for slot in slots.slots[..count].iter_mut() {
            if let Some(entry) = slot.entry.as_mut() {
                entry.sync = !entry.is_self && standbys.is_some_and(|s| s.matches(&entry.name));
            }
        }
    }

    /// Clear every `sync` flag after replication went asynchronous.
    pub fn clear_sync(&self) {
        self.mark_sync(None);
    }

    #[cfg(test)]
    fn is_dense(&self) -> bool {
        let slots = self.read();
        slots.slots[..slots.count].iter().all(|s| s.entry.is_some())
            && slots.slots[slots.count..].iter().all(|s| s.entry.is_none())
    }
}
