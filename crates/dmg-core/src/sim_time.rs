use core::fmt;

/// Point in time on the virtual clock, in microseconds since activation
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime {
    us: u64,
}

impl SimTime {
    pub const ZERO: SimTime = SimTime { us: 0 };

    pub fn from_us(us: u64) -> SimTime {
        SimTime { us }
    }

    pub fn as_us(self) -> u64 {
        self.us
    }

    /// Add a number of microseconds
    pub fn add_us(self, us: u32) -> SimTime {
        SimTime { us: self.us + us as u64 }
    }

    /// Difference between two SimTimes in microseconds
    pub fn diff(self, b: Self) -> i64 {
        self.us as i64 - b.us as i64
    }

    /// Age of this SimTime compared to now
    #[inline(always)]
    pub fn age(self, now: SimTime) -> i64 {
        now.diff(self)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:4}.{:06}", self.us / 1_000_000, self.us % 1_000_000)
    }
}

impl fmt::Debug for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:4}.{:06}", self.us / 1_000_000, self.us % 1_000_000)
    }
}
