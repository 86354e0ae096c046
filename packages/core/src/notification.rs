use crate::definitions::{HomeId, NodeId};
use crate::values::ValueId;

/// An event record delivered to the consumer.
///
/// Notifications are queued inside the driver thread and flushed at safe
/// points; they never cross the lock boundary live.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    NodeAdded { home_id: HomeId, node_id: NodeId },
    NodeRemoved { home_id: HomeId, node_id: NodeId },
    NodeProtocolInfo { home_id: HomeId, node_id: NodeId },
    NodeNaming { home_id: HomeId, node_id: NodeId },
    NodeEvent { home_id: HomeId, node_id: NodeId, event: u8 },
    NodeQueriesComplete { home_id: HomeId, node_id: NodeId },
    AllNodesQueried { home_id: HomeId },
    AwakeNodesQueried { home_id: HomeId },
    ValueAdded { value_id: ValueId },
    ValueChanged { value_id: ValueId },
    ValueRemoved { value_id: ValueId },
    ValueRefreshed { value_id: ValueId },
    Group { home_id: HomeId, node_id: NodeId, group_index: u8 },
    DriverReady { home_id: HomeId, node_id: NodeId },
    DriverReset { home_id: HomeId },
    PollingEnabled { value_id: ValueId },
    PollingDisabled { value_id: ValueId },
    MsgComplete { home_id: HomeId, node_id: NodeId, success: bool },
}

impl Notification {
    pub fn home_id(&self) -> HomeId {
        use Notification::*;
        match self {
            NodeAdded { home_id, .. }
            | NodeRemoved { home_id, .. }
            | NodeProtocolInfo { home_id, .. }
            | NodeNaming { home_id, .. }
            | NodeEvent { home_id, .. }
            | NodeQueriesComplete { home_id, .. }
            | AllNodesQueried { home_id }
            | AwakeNodesQueried { home_id }
            | Group { home_id, .. }
            | DriverReady { home_id, .. }
            | DriverReset { home_id }
            | MsgComplete { home_id, .. } => *home_id,
            ValueAdded { value_id }
            | ValueChanged { value_id }
            | ValueRemoved { value_id }
            | ValueRefreshed { value_id }
            | PollingEnabled { value_id }
            | PollingDisabled { value_id } => value_id.home_id,
        }
    }
}
