use std::fmt::{self, Display};

/// The 32-bit network identifier reported by the controller.
/// Keys all persisted state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HomeId(pub u32);

impl HomeId {
    /// File-name friendly form used for the per-controller config document.
    pub fn as_file_stem(&self) -> String {
        format!("{:08x}", self.0)
    }
}

impl Display for HomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// An 8-bit node identifier within a HomeId. Valid node ids are 1..=232;
/// 0xff is the broadcast/none sentinel used in message construction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u8);

impl NodeId {
    pub const BROADCAST: NodeId = NodeId(0xff);

    /// Highest node id a Z-Wave network can assign.
    pub const MAX: u8 = 232;

    pub fn is_valid(&self) -> bool {
        (1..=Self::MAX).contains(&self.0)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for NodeId {
    fn from(val: u8) -> Self {
        Self(val)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn node_id_validity() {
        assert!(!NodeId(0).is_valid());
        assert!(NodeId(1).is_valid());
        assert!(NodeId(232).is_valid());
        assert!(!NodeId(233).is_valid());
        assert!(!NodeId::BROADCAST.is_valid());
    }

    #[test]
    fn home_id_formatting() {
        assert_eq!(HomeId(0x01020304).to_string(), "0x01020304");
        assert_eq!(HomeId(0x01020304).as_file_stem(), "01020304");
    }
}
