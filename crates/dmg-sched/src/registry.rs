use dmg_core::{Allocation, AllocationKey, DtiOffset};

/// Allocations granted through ADDTS or registered by the coordinator itself.
/// Placement is the caller's responsibility: nothing here checks for overlap.
#[derive(Debug, Clone, Default)]
pub struct AllocationRegistry {
    allocations: Vec<Allocation>,
}

impl AllocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the allocation. Returns the offset right after its last block.
    pub fn insert(&mut self, allocation: Allocation) -> DtiOffset {
        let end = allocation.end();
        tracing::debug!("insert {}", allocation);
        self.allocations.push(allocation);
        end
    }

    /// Removes the first allocation matching the key
    pub fn remove(&mut self, key: &AllocationKey) -> Option<Allocation> {
        let idx = self.allocations.iter().position(|a| a.matches(key))?;
        let removed = self.allocations.remove(idx);
        tracing::debug!("remove {}", removed);
        Some(removed)
    }

    /// Removes every non-static allocation that has been announced at least once.
    /// Returns the removed allocations, so their airtime can be returned.
    pub fn purge_non_static_announced(&mut self) -> Vec<Allocation> {
        let (purged, kept): (Vec<Allocation>, Vec<Allocation>) = std::mem::take(&mut self.allocations)
            .into_iter()
            .partition(|a| !a.is_static && a.announced);
        self.allocations = kept;
        for a in &purged {
            tracing::debug!("purge {}", a);
        }
        purged
    }

    /// Removes allocations whose occupied time no longer fits a DTI of `dti`
    pub fn remove_beyond(&mut self, dti: u32, guard: u32) -> Vec<Allocation> {
        let (dropped, kept): (Vec<Allocation>, Vec<Allocation>) = std::mem::take(&mut self.allocations)
            .into_iter()
            .partition(|a| a.occupied_intervals(guard).iter().any(|&(_, end)| end > dti));
        self.allocations = kept;
        dropped
    }

    pub fn mark_all_announced(&mut self) {
        for a in self.allocations.iter_mut() {
            a.announced = true;
        }
    }

    pub fn find(&self, key: &AllocationKey) -> Option<&Allocation> {
        self.allocations.iter().find(|a| a.matches(key))
    }

    pub fn find_mut(&mut self, key: &AllocationKey) -> Option<&mut Allocation> {
        self.allocations.iter_mut().find(|a| a.matches(key))
    }

    pub fn contains(&self, key: &AllocationKey) -> bool {
        self.find(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Allocation> {
        self.allocations.iter()
    }

    pub fn as_slice(&self) -> &[Allocation] {
        &self.allocations
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Occupied intervals of all allocations, each block extended by `guard`
    pub fn occupied_intervals(&self, guard: u32) -> Vec<(DtiOffset, DtiOffset)> {
        self.allocations.iter().flat_map(|a| a.occupied_intervals(guard)).collect()
    }
}
