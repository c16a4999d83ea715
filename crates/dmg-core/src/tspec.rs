use serde::Deserialize;

use crate::{Aid, AllocationId, AllocationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AllocationFormat {
    /// Duration negotiated between the minimum and maximum
    Isochronous,
    /// Duration fixed to the minimum
    Asynchronous,
}

/// DMG allocation info field of the TSPEC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationInfo {
    pub id: AllocationId,
    pub kind: AllocationKind,
    pub is_static: bool,
    pub dest: Aid,
    pub format: AllocationFormat,
}

/// DMG TSPEC as carried in an ADDTS request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficSpec {
    pub info: AllocationInfo,
    /// Minimum acceptable allocation, microseconds per block
    pub min_allocation: u32,
    /// Maximum acceptable allocation, microseconds per block
    pub max_allocation: u32,
    /// Number of blocks per beacon interval. 0 means a single block.
    pub allocation_period: u16,
    /// Period expressed as a multiple of the beacon interval instead of a fraction of it
    pub period_is_multiple_of_bi: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TspecErr {
    ZeroDuration,
    MinAboveMax { min: u32, max: u32 },
    AboveCeiling { max: u32, ceiling: u32 },
    MultipleOfBiUnsupported { period: u16 },
}

impl TrafficSpec {
    /// Checks the fields a scheduler relies upon. A failing TSPEC is never admitted.
    pub fn validate(&self) -> Result<(), TspecErr> {
        if self.min_allocation == 0 {
            return Err(TspecErr::ZeroDuration);
        }
        if self.min_allocation > self.max_allocation {
            return Err(TspecErr::MinAboveMax { min: self.min_allocation, max: self.max_allocation });
        }
        let ceiling = self.info.kind.max_block_duration();
        if self.max_allocation > ceiling {
            return Err(TspecErr::AboveCeiling { max: self.max_allocation, ceiling });
        }
        if self.allocation_period != 0 && self.period_is_multiple_of_bi {
            return Err(TspecErr::MultipleOfBiUnsupported { period: self.allocation_period });
        }
        Ok(())
    }

    pub fn is_periodic(&self) -> bool {
        self.allocation_period != 0
    }

    /// Per-block duration the scheduler aims for
    pub fn desired_duration(&self) -> u32 {
        match self.info.format {
            AllocationFormat::Isochronous => (self.min_allocation + self.max_allocation) / 2,
            AllocationFormat::Asynchronous => self.min_allocation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tspec(min: u32, max: u32, format: AllocationFormat) -> TrafficSpec {
        TrafficSpec {
            info: AllocationInfo {
                id: 1,
                kind: AllocationKind::ServicePeriod,
                is_static: true,
                dest: 2,
                format,
            },
            min_allocation: min,
            max_allocation: max,
            allocation_period: 0,
            period_is_multiple_of_bi: false,
        }
    }

    #[test]
    fn test_desired_duration() {
        assert_eq!(tspec(1000, 2001, AllocationFormat::Isochronous).desired_duration(), 1500);
        assert_eq!(tspec(1000, 3000, AllocationFormat::Asynchronous).desired_duration(), 1000);
        assert_eq!(tspec(2000, 2000, AllocationFormat::Isochronous).desired_duration(), 2000);
    }

    #[test]
    fn test_validate() {
        assert_eq!(tspec(1000, 2000, AllocationFormat::Isochronous).validate(), Ok(()));
        assert_eq!(
            tspec(3000, 2000, AllocationFormat::Isochronous).validate(),
            Err(TspecErr::MinAboveMax { min: 3000, max: 2000 })
        );
        assert_eq!(
            tspec(1000, 40000, AllocationFormat::Isochronous).validate(),
            Err(TspecErr::AboveCeiling { max: 40000, ceiling: 32767 })
        );
        assert_eq!(tspec(0, 100, AllocationFormat::Asynchronous).validate(), Err(TspecErr::ZeroDuration));
    }

    #[test]
    fn test_cbap_ceiling_is_larger() {
        let mut t = tspec(1000, 40000, AllocationFormat::Asynchronous);
        t.info.kind = AllocationKind::Cbap;
        assert_eq!(t.validate(), Ok(()));
    }

    #[test]
    fn test_multiple_of_bi_rejected() {
        let mut t = tspec(500, 500, AllocationFormat::Isochronous);
        t.allocation_period = 2;
        t.period_is_multiple_of_bi = true;
        assert_eq!(t.validate(), Err(TspecErr::MultipleOfBiUnsupported { period: 2 }));

        // Flag without a period has no effect
        t.allocation_period = 0;
        assert_eq!(t.validate(), Ok(()));
    }
}
