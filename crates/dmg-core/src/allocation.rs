use core::fmt;

use serde::Deserialize;

use crate::{AID_BROADCAST, Aid, AidFmt, AllocationId, DtiOffset};

/// Largest block duration that fits the allocation block duration field of an SP
pub const MAX_SP_BLOCK_DURATION: u32 = 32767;
/// Largest block duration that fits the allocation block duration field of a CBAP
pub const MAX_CBAP_BLOCK_DURATION: u32 = 65535;
/// Number of blocks field is 8 bits
pub const MAX_NUM_BLOCKS: u8 = 255;

/// Default duration of a beamforming training SP
pub const DEFAULT_BF_SP_DURATION: u32 = 2000;
/// Extra time left after a beamforming training SP before the next allocation
pub const BF_SP_PROTECTION_PERIOD: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AllocationKind {
    /// Service period, exclusive between source and destination
    ServicePeriod,
    /// Contention based access period
    Cbap,
}

impl AllocationKind {
    pub fn max_block_duration(self) -> u32 {
        match self {
            AllocationKind::ServicePeriod => MAX_SP_BLOCK_DURATION,
            AllocationKind::Cbap => MAX_CBAP_BLOCK_DURATION,
        }
    }
}

/// Beamforming control sub-field. Presence marks the SP as a beamforming training SP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BfControl {
    pub initiator_txss: bool,
    pub responder_txss: bool,
}

/// The allocation ID is only meaningful per station pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationKey {
    pub id: AllocationId,
    pub source: Aid,
    pub dest: Aid,
}

impl fmt::Display for AllocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}->{}", self.id, AidFmt(self.source), AidFmt(self.dest))
    }
}

/// One entry of the extended schedule. Offsets and durations in microseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub id: AllocationId,
    pub kind: AllocationKind,
    /// Pseudo-static allocations survive the end-of-interval cleanup
    pub is_static: bool,
    pub source: Aid,
    pub dest: Aid,
    /// Start of the first block, relative to DTI start
    pub start: DtiOffset,
    pub block_duration: u32,
    /// Distance between consecutive block starts. 0 for single and back-to-back blocks.
    pub block_period: u32,
    pub num_blocks: u8,
    pub bf_control: Option<BfControl>,
    /// Set once the allocation has been carried in a beacon
    pub announced: bool,
}

impl Allocation {
    /// Single block allocation, not yet announced
    pub fn single(key: AllocationKey, kind: AllocationKind, is_static: bool, start: DtiOffset, duration: u32) -> Self {
        Allocation {
            id: key.id,
            kind,
            is_static,
            source: key.source,
            dest: key.dest,
            start,
            block_duration: duration,
            block_period: 0,
            num_blocks: 1,
            bf_control: None,
            announced: false,
        }
    }

    /// CBAP open to every station, as used for filling gaps in the DTI
    pub fn broadcast_cbap(start: DtiOffset, duration: u32) -> Self {
        let key = AllocationKey { id: 0, source: AID_BROADCAST, dest: AID_BROADCAST };
        Allocation::single(key, AllocationKind::Cbap, true, start, duration)
    }

    pub fn key(&self) -> AllocationKey {
        AllocationKey { id: self.id, source: self.source, dest: self.dest }
    }

    pub fn is_periodic(&self) -> bool {
        self.num_blocks > 1 && self.block_period > 0
    }

    pub fn matches(&self, key: &AllocationKey) -> bool {
        self.id == key.id && self.source == key.source && self.dest == key.dest
    }

    /// Start offsets of every block. Back-to-back blocks are reported as one span
    /// by `occupied_intervals`, but still have individual starts here.
    pub fn block_starts(&self) -> impl Iterator<Item = DtiOffset> + '_ {
        let step = if self.block_period > 0 { self.block_period } else { self.block_duration };
        (0..self.num_blocks as u32).map(move |i| self.start + i * step)
    }

    /// End of the last block, guard time excluded
    pub fn end(&self) -> DtiOffset {
        if self.is_periodic() {
            self.start + (self.num_blocks as u32 - 1) * self.block_period + self.block_duration
        } else {
            self.start + self.block_duration * self.num_blocks as u32
        }
    }

    /// Intervals `[start, end)` this allocation takes out of the DTI, each extended by `guard`.
    /// A beamforming training SP also keeps its protection period.
    pub fn occupied_intervals(&self, guard: u32) -> Vec<(DtiOffset, DtiOffset)> {
        let tail = match self.bf_control {
            Some(_) => guard + BF_SP_PROTECTION_PERIOD,
            None => guard,
        };
        if self.is_periodic() {
            self.block_starts()
                .map(|s| (s, s + self.block_duration + tail))
                .collect()
        } else {
            vec![(self.start, self.end() + tail)]
        }
    }

    /// Total airtime of all blocks
    pub fn total_duration(&self) -> u32 {
        self.block_duration * self.num_blocks as u32
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match (self.kind, self.bf_control.is_some()) {
            (AllocationKind::Cbap, _) => "CBAP",
            (AllocationKind::ServicePeriod, true) => "BF-SP",
            (AllocationKind::ServicePeriod, false) => "SP",
        };
        write!(f, "{:<5} {} start {} dur {}", kind, self.key(), self.start, self.block_duration)?;
        if self.num_blocks > 1 {
            write!(f, " x{} period {}", self.num_blocks, self.block_period)?;
        }
        if self.is_static {
            write!(f, " static")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> AllocationKey {
        AllocationKey { id: 3, source: 1, dest: 2 }
    }

    #[test]
    fn test_single_block_occupancy() {
        let a = Allocation::single(key(), AllocationKind::ServicePeriod, true, 100, 500);
        assert_eq!(a.end(), 600);
        assert_eq!(a.occupied_intervals(10), vec![(100, 610)]);
        assert!(!a.is_periodic());
    }

    #[test]
    fn test_periodic_occupancy() {
        let mut a = Allocation::single(key(), AllocationKind::ServicePeriod, false, 0, 500);
        a.num_blocks = 3;
        a.block_period = 10000;
        assert!(a.is_periodic());
        assert_eq!(a.block_starts().collect::<Vec<_>>(), vec![0, 10000, 20000]);
        assert_eq!(a.end(), 20500);
        assert_eq!(a.occupied_intervals(5), vec![(0, 505), (10000, 10505), (20000, 20505)]);
        assert_eq!(a.total_duration(), 1500);
    }

    #[test]
    fn test_contiguous_blocks_form_one_span() {
        let mut a = Allocation::single(key(), AllocationKind::ServicePeriod, true, 1000, 200);
        a.num_blocks = 4;
        assert_eq!(a.end(), 1800);
        assert_eq!(a.occupied_intervals(10), vec![(1000, 1810)]);
        assert_eq!(a.block_starts().collect::<Vec<_>>(), vec![1000, 1200, 1400, 1600]);
    }

    #[test]
    fn test_beamforming_sp_keeps_protection() {
        let mut a = Allocation::single(key(), AllocationKind::ServicePeriod, false, 0, DEFAULT_BF_SP_DURATION);
        a.bf_control = Some(BfControl { initiator_txss: true, responder_txss: false });
        assert_eq!(a.occupied_intervals(10), vec![(0, 3010)]);
    }

    #[test]
    fn test_broadcast_cbap() {
        let c = Allocation::broadcast_cbap(2010, 47990);
        assert_eq!(c.kind, AllocationKind::Cbap);
        assert_eq!(c.source, AID_BROADCAST);
        assert_eq!(c.dest, AID_BROADCAST);
        assert_eq!(c.id, 0);
        assert!(c.is_static);
    }
}
