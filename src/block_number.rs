use std::fmt::{Display, Formatter};

/// The 16 bit block counter of a transfer. The first DATA block is 1, and the counter wraps from
///  65535 to 0 (not to 1), continuing with 1 afterwards. Block 0 outside of a wrapped transfer
///  is reserved for the ACK that answers a write request.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct BlockNumber(u16);

impl Display for BlockNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl BlockNumber {
    pub const ZERO: BlockNumber = BlockNumber(0);
    pub const FIRST: BlockNumber = BlockNumber(1);

    pub fn from_raw(value: u16) -> Self {
        Self(value)
    }

    pub fn to_raw(&self) -> u16 {
        self.0
    }

    pub fn next(&self) -> BlockNumber {
        BlockNumber(self.0.wrapping_add(1))
    }
}
