use crate::cc_identity;
use crate::commandclass::{CcContext, CcError, CcEvent, CcResult, CcState, CommandClass};
use zmesh_core::prelude::*;
use zmesh_serial::msg::QueuePriority;

pub const CMD_SET: u8 = 0x01;
pub const CMD_GET: u8 = 0x02;
pub const CMD_REPORT: u8 = 0x03;
pub const CMD_REMOVE: u8 = 0x04;
pub const CMD_GROUPINGS_GET: u8 = 0x05;
pub const CMD_GROUPINGS_REPORT: u8 = 0x06;

/// Association groups: which nodes the device sends its reports to.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Association {
    state: CcState,
}

impl Association {
    /// Starts the discovery of every group: the groupings count, then one
    /// Get per group as the count comes in.
    pub fn request_all_groups(ctx: &mut CcContext) {
        ctx.queue_cc_get(
            "AssociationCmd_GroupingsGet",
            CommandClassId::ASSOCIATION,
            1,
            &[CMD_GROUPINGS_GET],
            QueuePriority::Query,
        );
    }

    pub fn queue_add(ctx: &mut CcContext, group: u8, node: NodeId) {
        ctx.queue_cc(
            "AssociationCmd_Set",
            CommandClassId::ASSOCIATION,
            1,
            &[CMD_SET, group, node.0],
            QueuePriority::Send,
        );
    }

    pub fn queue_remove(ctx: &mut CcContext, group: u8, node: NodeId) {
        ctx.queue_cc(
            "AssociationCmd_Remove",
            CommandClassId::ASSOCIATION,
            1,
            &[CMD_REMOVE, group, node.0],
            QueuePriority::Send,
        );
    }
}

impl CommandClass for Association {
    cc_identity!(CommandClassId::ASSOCIATION, "COMMAND_CLASS_ASSOCIATION");

    fn handle_msg(&mut self, payload: &[u8], _instance: u8, ctx: &mut CcContext) -> CcResult {
        match payload.first() {
            Some(&CMD_GROUPINGS_REPORT) => {
                let count = *payload.get(1).ok_or(CcError::Truncated {
                    cc: self.class_id(),
                })?;
                ctx.event(CcEvent::GroupingsReported { count });
                // One Get per advertised group
                for index in 1..=count {
                    ctx.queue_cc_get(
                        "AssociationCmd_Get",
                        CommandClassId::ASSOCIATION,
                        1,
                        &[CMD_GET, index],
                        QueuePriority::Query,
                    );
                }
                Ok(())
            }
            Some(&CMD_REPORT) => {
                if payload.len() < 4 {
                    return Err(CcError::Truncated {
                        cc: self.class_id(),
                    });
                }
                let index = payload[1];
                let max_associations = payload[2];
                // payload[3] is the reports-to-follow count; each report
                // carries a complete prefix of the member list, so the last
                // one wins
                let nodes = payload[4..].iter().map(|n| NodeId(*n)).collect();
                ctx.event(CcEvent::GroupReported {
                    index,
                    max_associations,
                    nodes,
                });
                Ok(())
            }
            Some(&command) => Err(CcError::UnknownCommand {
                cc: self.class_id(),
                command,
            }),
            None => Err(CcError::Truncated {
                cc: self.class_id(),
            }),
        }
    }
}
