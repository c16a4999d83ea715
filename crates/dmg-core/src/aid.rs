use core::fmt;

/// Association identifier of a station within the BSS
pub type Aid = u8;

/// Identifier of a logical stream, chosen by the requesting station.
/// Not unique on its own, see `AllocationKey`.
pub type AllocationId = u8;

/// AID used by the PCP/AP itself
pub const AID_AP: Aid = 0;

/// AID meaning "any station". Used for broadcast CBAPs.
pub const AID_BROADCAST: Aid = 255;

/// Wrapper for printing an AID with its sentinel meaning
pub struct AidFmt(pub Aid);

impl fmt::Display for AidFmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            AID_AP => write!(f, "ap"),
            AID_BROADCAST => write!(f, "bcast"),
            aid => write!(f, "sta{}", aid),
        }
    }
}
