use crate::cc_identity;
use crate::commandclass::{
    request_flags, CcContext, CcError, CcEvent, CcResult, CcState, CommandClass,
};
use zmesh_core::prelude::*;
use zmesh_serial::msg::QueuePriority;

pub const CMD_GET: u8 = 0x04;
pub const CMD_REPORT: u8 = 0x05;

/// Manufacturer and product identifiers, the key into device databases.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ManufacturerSpecific {
    state: CcState,
}

impl CommandClass for ManufacturerSpecific {
    cc_identity!(
        CommandClassId::MANUFACTURER_SPECIFIC,
        "COMMAND_CLASS_MANUFACTURER_SPECIFIC"
    );

    fn request_state(&self, flags: u8, instance: u8, ctx: &mut CcContext) {
        if flags & request_flags::STATIC != 0 && instance == 1 {
            ctx.queue_cc_get(
                "ManufacturerSpecificCmd_Get",
                self.class_id(),
                instance,
                &[CMD_GET],
                QueuePriority::Query,
            );
        }
    }

    fn handle_msg(&mut self, payload: &[u8], _instance: u8, ctx: &mut CcContext) -> CcResult {
        match payload.first() {
            Some(&CMD_REPORT) => {
                if payload.len() < 7 {
                    return Err(CcError::Truncated {
                        cc: self.class_id(),
                    });
                }
                ctx.event(CcEvent::ManufacturerInfo {
                    manufacturer_id: u16::from_be_bytes([payload[1], payload[2]]),
                    product_type: u16::from_be_bytes([payload[3], payload[4]]),
                    product_id: u16::from_be_bytes([payload[5], payload[6]]),
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
    fn report_yields_ids() {
        let mut cc = ManufacturerSpecific::default();
        let mut values = ValueStore::new();
        let mut out = CcOutbox::default();
        let mut ctx = CcContext {
            home_id: HomeId(0x01020304),
            node_id: NodeId(7),
            controller_node_id: NodeId(1),
            basic_mapping: None,
            values: &mut values,
            out: &mut out,
        };

        cc.handle_msg(&[CMD_REPORT, 0x00, 0x86, 0x00, 0x03, 0x00, 0x60], 1, &mut ctx)
            .unwrap();
        assert_eq!(
            out.events,
            vec![CcEvent::ManufacturerInfo {
                manufacturer_id: 0x0086,
                product_type: 0x0003,
                product_id: 0x0060,
            }]
        );
    }
}
