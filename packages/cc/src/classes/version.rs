use crate::cc_identity;
use crate::commandclass::{
    request_flags, CcContext, CcError, CcEvent, CcResult, CcState, CommandClass,
};
use zmesh_core::prelude::*;
use zmesh_serial::msg::QueuePriority;

pub const CMD_GET: u8 = 0x11;
pub const CMD_REPORT: u8 = 0x12;
pub const CMD_COMMAND_CLASS_GET: u8 = 0x13;
pub const CMD_COMMAND_CLASS_REPORT: u8 = 0x14;

/// Library/protocol/application versions plus the per-command-class
/// version query driving the Versions interrogation stage.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Version {
    state: CcState,
}

impl Version {
    /// Asks which version of `target` the device implements. A report of 0
    /// means the class was advertised but is not actually there.
    pub fn queue_command_class_get(ctx: &mut CcContext, target: CommandClassId) {
        ctx.queue_cc_get(
            "VersionCmd_CommandClassGet",
            CommandClassId::VERSION,
            1,
            &[CMD_COMMAND_CLASS_GET, target.0],
            QueuePriority::Query,
        );
    }

    fn string_value(&self, ctx: &CcContext, index: u8, label: &'static str) -> Value {
        let id = ctx.value_id(
            ValueGenre::System,
            self.class_id(),
            1,
            index,
            ValueType::String,
        );
        Value::new(id, label, ValueContents::String(String::new())).read_only()
    }
}

impl CommandClass for Version {
    cc_identity!(CommandClassId::VERSION, "COMMAND_CLASS_VERSION");

    fn request_state(&self, flags: u8, instance: u8, ctx: &mut CcContext) {
        if flags & request_flags::STATIC != 0 && instance == 1 {
            ctx.queue_cc_get(
                "VersionCmd_Get",
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
                if payload.len() < 6 {
                    return Err(CcError::Truncated {
                        cc: self.class_id(),
                    });
                }
                let library = self.string_value(ctx, 0, "Library Version");
                ctx.report(library, ValueContents::String(format!("{}", payload[1])));
                let protocol = self.string_value(ctx, 1, "Protocol Version");
                ctx.report(
                    protocol,
                    ValueContents::String(format!("{}.{:02}", payload[2], payload[3])),
                );
                let application = self.string_value(ctx, 2, "Application Version");
                ctx.report(
                    application,
                    ValueContents::String(format!("{}.{:02}", payload[4], payload[5])),
                );
                Ok(())
            }
            Some(&CMD_COMMAND_CLASS_REPORT) => {
                if payload.len() < 3 {
                    return Err(CcError::Truncated {
                        cc: self.class_id(),
                    });
                }
                ctx.event(CcEvent::VersionReported {
                    cc: CommandClassId(payload[1]),
                    version: payload[2],
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
