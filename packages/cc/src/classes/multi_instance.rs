use crate::cc_identity;
use crate::commandclass::{CcContext, CcError, CcEvent, CcResult, CcState, CommandClass};
use zmesh_core::prelude::*;
use zmesh_serial::msg::QueuePriority;

pub const CMD_GET: u8 = 0x04;
pub const CMD_REPORT: u8 = 0x05;
pub const CMD_ENCAP: u8 = 0x06;
/// Multi-channel (v2) encapsulation with source and destination endpoints
pub const CMD_CHANNEL_ENCAP: u8 = 0x0d;

/// Instance bookkeeping and the encapsulation both directions flow through
/// for multi-endpoint devices.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MultiInstance {
    state: CcState,
}

impl MultiInstance {
    /// Asks how many instances of `target` the device exposes.
    pub fn queue_instance_get(ctx: &mut CcContext, target: CommandClassId) {
        ctx.queue_cc_get(
            "MultiInstanceCmd_Get",
            CommandClassId::MULTI_INSTANCE,
            1,
            &[CMD_GET, target.0],
            QueuePriority::Query,
        );
    }
}

impl CommandClass for MultiInstance {
    cc_identity!(
        CommandClassId::MULTI_INSTANCE,
        "COMMAND_CLASS_MULTI_INSTANCE"
    );

    fn handle_msg(&mut self, payload: &[u8], _instance: u8, ctx: &mut CcContext) -> CcResult {
        match payload.first() {
            Some(&CMD_REPORT) => {
                if payload.len() < 3 {
                    return Err(CcError::Truncated {
                        cc: self.class_id(),
                    });
                }
                ctx.event(CcEvent::InstanceCountReported {
                    cc: CommandClassId(payload[1]),
                    count: payload[2],
                });
                Ok(())
            }
            Some(&CMD_ENCAP) => {
                if payload.len() < 4 {
                    return Err(CcError::Truncated {
                        cc: self.class_id(),
                    });
                }
                ctx.event(CcEvent::Encapsulated {
                    instance: payload[1],
                    cc: CommandClassId(payload[2]),
                    payload: payload[3..].to_vec(),
                });
                Ok(())
            }
            Some(&CMD_CHANNEL_ENCAP) => {
                if payload.len() < 5 {
                    return Err(CcError::Truncated {
                        cc: self.class_id(),
                    });
                }
                ctx.event(CcEvent::Encapsulated {
                    instance: payload[1],
                    cc: CommandClassId(payload[3]),
                    payload: payload[4..].to_vec(),
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

#[cfg(test)]
mod test {
    use super::*;
    use crate::commandclass::CcOutbox;

    #[test]
    fn encap_is_unwrapped() {
        let mut cc = MultiInstance::default();
        let mut values = ValueStore::new();
        let mut out = CcOutbox::default();
        let mut ctx = CcContext {
            home_id: HomeId(1),
            node_id: NodeId(7),
            controller_node_id: NodeId(1),
            basic_mapping: None,
            values: &mut values,
            out: &mut out,
        };

        // Instance 2's binary switch reporting "on"
        cc.handle_msg(&[CMD_ENCAP, 2, 0x25, 0x03, 0xff], 1, &mut ctx)
            .unwrap();
        assert_eq!(
            out.events,
            vec![CcEvent::Encapsulated {
                instance: 2,
                cc: CommandClassId::SWITCH_BINARY,
                payload: vec![0x03, 0xff],
            }]
        );
    }
}
