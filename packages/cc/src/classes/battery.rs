use crate::cc_identity;
use crate::commandclass::{request_flags, CcContext, CcError, CcResult, CcState, CommandClass};
use zmesh_core::prelude::*;
use zmesh_serial::msg::QueuePriority;

pub const CMD_GET: u8 = 0x02;
pub const CMD_REPORT: u8 = 0x03;

/// Remaining battery charge. A report of 0xff is the device's low-battery
/// warning and is published as level 0.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Battery {
    state: CcState,
}

impl Battery {
    fn value_template(&self, instance: u8, ctx: &CcContext) -> Value {
        let id = ctx.value_id(
            ValueGenre::User,
            self.class_id(),
            instance,
            0,
            ValueType::Byte,
        );
        Value::new(id, "Battery Level", ValueContents::Byte(0))
            .with_units("%")
            .read_only()
    }
}

impl CommandClass for Battery {
    cc_identity!(CommandClassId::BATTERY, "COMMAND_CLASS_BATTERY");

    fn create_instance_values(&self, instance: u8, ctx: &mut CcContext) {
        let template = self.value_template(instance, ctx);
        ctx.add_value(template);
    }

    fn request_state(&self, flags: u8, instance: u8, ctx: &mut CcContext) {
        if flags & request_flags::DYNAMIC != 0 {
            ctx.queue_cc_get(
                "BatteryCmd_Get",
                self.class_id(),
                instance,
                &[CMD_GET],
                QueuePriority::Query,
            );
        }
    }

    fn handle_msg(&mut self, payload: &[u8], instance: u8, ctx: &mut CcContext) -> CcResult {
        match payload.first() {
            Some(&CMD_REPORT) => {
                let raw = *payload.get(1).ok_or(CcError::Truncated {
                    cc: self.class_id(),
                })?;
                let level = if raw == 0xff { 0 } else { raw };
                let template = self.value_template(instance, ctx);
                ctx.report(template, ValueContents::Byte(level));
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
