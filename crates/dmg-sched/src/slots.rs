use dmg_core::DtiOffset;

/// Free, contiguous `[start, end)` part of the DTI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailableSlot {
    pub start: DtiOffset,
    /// Exclusive
    pub end: DtiOffset,
}

impl AvailableSlot {
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn contains(&self, t: DtiOffset) -> bool {
        t >= self.start && t < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotErr {
    EmptyInterval { start: DtiOffset, end: DtiOffset },
    BeyondDti { end: DtiOffset, dti: u32 },
    /// Claimed interval is not entirely inside a single free slot
    NotFree { start: DtiOffset, end: DtiOffset },
    /// Released interval overlaps free time
    AlreadyFree { start: DtiOffset, end: DtiOffset },
    /// Occupied intervals overlap each other
    OccupiedOverlap { first: (DtiOffset, DtiOffset), second: (DtiOffset, DtiOffset) },
    /// Free slots and occupied intervals do not partition the DTI
    PartitionMismatch { expected: Vec<AvailableSlot>, found: Vec<AvailableSlot> },
}

/// Sorted, disjoint, non-touching list of free slots of the DTI.
/// Together with the occupied intervals of all registered allocations it covers `[0, dti)` exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeSlots {
    dti: u32,
    slots: Vec<AvailableSlot>,
}

impl FreeSlots {
    /// Entirely free DTI
    pub fn new(dti: u32) -> Self {
        let slots = if dti > 0 { vec![AvailableSlot { start: 0, end: dti }] } else { vec![] };
        Self { dti, slots }
    }

    /// Derives the free slots from the occupied intervals. Intervals are clipped to the DTI.
    pub fn rebuild<I>(dti: u32, occupied: I) -> Self
    where
        I: IntoIterator<Item = (DtiOffset, DtiOffset)>,
    {
        let mut occupied: Vec<(DtiOffset, DtiOffset)> = occupied.into_iter().collect();
        occupied.sort_unstable();

        let mut slots = Vec::with_capacity(occupied.len() + 1);
        let mut cursor = 0;
        for (start, end) in occupied {
            let start = start.min(dti);
            if start > cursor {
                slots.push(AvailableSlot { start: cursor, end: start });
            }
            cursor = cursor.max(end.min(dti));
        }
        if cursor < dti {
            slots.push(AvailableSlot { start: cursor, end: dti });
        }
        Self { dti, slots }
    }

    pub fn dti(&self) -> u32 {
        self.dti
    }

    pub fn as_slice(&self) -> &[AvailableSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Sum of all free time
    pub fn total_free(&self) -> u32 {
        self.slots.iter().map(|s| s.len()).sum()
    }

    /// Start of the first slot strictly longer than `needed`
    pub fn first_fit(&self, needed: u32) -> Option<DtiOffset> {
        self.slots.iter().find(|s| s.len() > needed).map(|s| s.start)
    }

    /// Index of the slot containing `t`, if `t` is free
    pub fn slot_containing(&self, t: DtiOffset) -> Option<usize> {
        let idx = self.slots.partition_point(|s| s.end <= t);
        match self.slots.get(idx) {
            Some(s) if s.contains(t) => Some(idx),
            _ => None,
        }
    }

    /// Takes `[start, end)` out of the free time. The interval must lie inside one free slot.
    /// Splits the slot when the claim is strictly interior, otherwise shrinks or removes it.
    pub fn claim(&mut self, start: DtiOffset, end: DtiOffset) -> Result<(), SlotErr> {
        if start >= end {
            return Err(SlotErr::EmptyInterval { start, end });
        }
        let Some(idx) = self.slot_containing(start) else {
            return Err(SlotErr::NotFree { start, end });
        };
        let slot = self.slots[idx];
        if end > slot.end {
            return Err(SlotErr::NotFree { start, end });
        }

        match (start == slot.start, end == slot.end) {
            (true, true) => {
                self.slots.remove(idx);
            }
            (true, false) => {
                self.slots[idx].start = end;
            }
            (false, true) => {
                self.slots[idx].end = start;
            }
            (false, false) => {
                self.slots[idx].end = start;
                self.slots.insert(idx + 1, AvailableSlot { start: end, end: slot.end });
            }
        }
        tracing::trace!("claim [{}, {}) from slot [{}, {}), {} slots left", start, end, slot.start, slot.end, self.slots.len());
        Ok(())
    }

    /// Returns `[start, end)` to the free time, merging with neighbouring slots that touch it.
    pub fn release(&mut self, start: DtiOffset, end: DtiOffset) -> Result<(), SlotErr> {
        if start >= end {
            return Err(SlotErr::EmptyInterval { start, end });
        }
        if end > self.dti {
            return Err(SlotErr::BeyondDti { end, dti: self.dti });
        }

        // Slots before idx end at or before start
        let idx = self.slots.partition_point(|s| s.end <= start);
        if let Some(next) = self.slots.get(idx) {
            if next.start < end {
                return Err(SlotErr::AlreadyFree { start, end });
            }
        }

        let merge_prev = idx > 0 && self.slots[idx - 1].end == start;
        let merge_next = idx < self.slots.len() && self.slots[idx].start == end;
        match (merge_prev, merge_next) {
            (true, true) => {
                self.slots[idx - 1].end = self.slots[idx].end;
                self.slots.remove(idx);
            }
            (true, false) => {
                self.slots[idx - 1].end = end;
            }
            (false, true) => {
                self.slots[idx].start = start;
            }
            (false, false) => {
                self.slots.insert(idx, AvailableSlot { start, end });
            }
        }
        tracing::trace!("release [{}, {}), {} slots", start, end, self.slots.len());
        Ok(())
    }

    /// Reopens the tail `[end, end + shrink_by)` freed by shortening a block whose
    /// occupied interval now ends at `end`. Merges with the following slot if it starts right after.
    pub fn reopen_tail(&mut self, end: DtiOffset, shrink_by: u32) -> Result<(), SlotErr> {
        if shrink_by == 0 {
            return Ok(());
        }
        self.release(end, end + shrink_by)
    }

    /// Verifies that the free slots are exactly the complement of `occupied` within the DTI
    pub fn check_partition(&self, occupied: &[(DtiOffset, DtiOffset)]) -> Result<(), SlotErr> {
        let mut sorted = occupied.to_vec();
        sorted.sort_unstable();
        for pair in sorted.windows(2) {
            if pair[1].0 < pair[0].1 {
                return Err(SlotErr::OccupiedOverlap { first: pair[0], second: pair[1] });
            }
        }
        if let Some(last) = sorted.last() {
            if last.1 > self.dti {
                return Err(SlotErr::BeyondDti { end: last.1, dti: self.dti });
            }
        }

        let expected = FreeSlots::rebuild(self.dti, sorted);
        if expected.slots != self.slots {
            return Err(SlotErr::PartitionMismatch { expected: expected.slots, found: self.slots.clone() });
        }
        Ok(())
    }
}
