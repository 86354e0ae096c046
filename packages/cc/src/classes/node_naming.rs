use crate::cc_identity;
use crate::commandclass::{CcContext, CcError, CcEvent, CcResult, CcState, CommandClass};
use zmesh_core::prelude::*;
use zmesh_serial::msg::QueuePriority;

pub const CMD_NAME_SET: u8 = 0x01;
pub const CMD_NAME_GET: u8 = 0x02;
pub const CMD_NAME_REPORT: u8 = 0x03;
pub const CMD_LOCATION_SET: u8 = 0x04;
pub const CMD_LOCATION_GET: u8 = 0x05;
pub const CMD_LOCATION_REPORT: u8 = 0x06;

/// ASCII character set marker; extended encodings are read as lossy ASCII.
const ENCODING_ASCII: u8 = 0x00;

/// Name and location strings stored on the device itself.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NodeNaming {
    state: CcState,
}

fn decode_string(payload: &[u8]) -> String {
    payload
        .iter()
        .take(16)
        .filter(|b| b.is_ascii() && !b.is_ascii_control())
        .map(|b| *b as char)
        .collect()
}

fn encode_string(name: &str) -> Vec<u8> {
    name.bytes().filter(u8::is_ascii).take(16).collect()
}

impl NodeNaming {
    pub fn queue_name_get(ctx: &mut CcContext) {
        ctx.queue_cc_get(
            "NodeNamingCmd_NameGet",
            CommandClassId::NODE_NAMING,
            1,
            &[CMD_NAME_GET],
            QueuePriority::Query,
        );
    }

    pub fn queue_location_get(ctx: &mut CcContext) {
        ctx.queue_cc_get(
            "NodeNamingCmd_LocationGet",
            CommandClassId::NODE_NAMING,
            1,
            &[CMD_LOCATION_GET],
            QueuePriority::Query,
        );
    }

    pub fn queue_name_set(ctx: &mut CcContext, name: &str) {
        let mut bytes = vec![CMD_NAME_SET, ENCODING_ASCII];
        bytes.extend_from_slice(&encode_string(name));
        ctx.queue_cc(
            "NodeNamingCmd_NameSet",
            CommandClassId::NODE_NAMING,
            1,
            &bytes,
            QueuePriority::Send,
        );
    }

    pub fn queue_location_set(ctx: &mut CcContext, location: &str) {
        let mut bytes = vec![CMD_LOCATION_SET, ENCODING_ASCII];
        bytes.extend_from_slice(&encode_string(location));
        ctx.queue_cc(
            "NodeNamingCmd_LocationSet",
            CommandClassId::NODE_NAMING,
            1,
            &bytes,
            QueuePriority::Send,
        );
    }
}

impl CommandClass for NodeNaming {
    cc_identity!(CommandClassId::NODE_NAMING, "COMMAND_CLASS_NODE_NAMING");

    fn handle_msg(&mut self, payload: &[u8], _instance: u8, ctx: &mut CcContext) -> CcResult {
        match payload.first() {
            Some(&CMD_NAME_REPORT) => {
                if payload.len() < 2 {
                    return Err(CcError::Truncated {
                        cc: self.class_id(),
                    });
                }
                ctx.event(CcEvent::NodeNameReported(decode_string(&payload[2..])));
                Ok(())
            }
            Some(&CMD_LOCATION_REPORT) => {
                if payload.len() < 2 {
                    return Err(CcError::Truncated {
                        cc: self.class_id(),
                    });
                }
                ctx.event(CcEvent::NodeLocationReported(decode_string(&payload[2..])));
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

    #[test]
    fn strings_are_clamped_to_sixteen_chars() {
        assert_eq!(
            encode_string("a very long node name indeed").len(),
            16
        );
        assert_eq!(decode_string(b"Kitchen"), "Kitchen");
    }
}
