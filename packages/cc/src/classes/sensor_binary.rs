use crate::cc_identity;
use crate::commandclass::{request_flags, CcContext, CcError, CcResult, CcState, CommandClass};
use zmesh_core::prelude::*;
use zmesh_serial::msg::QueuePriority;

pub const CMD_GET: u8 = 0x02;
pub const CMD_REPORT: u8 = 0x03;

/// Idle/triggered state of a binary sensor. Read-only.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SensorBinary {
    state: CcState,
}

impl SensorBinary {
    fn value_template(&self, instance: u8, ctx: &CcContext) -> Value {
        let id = ctx.value_id(
            ValueGenre::User,
            self.class_id(),
            instance,
            0,
            ValueType::Bool,
        );
        Value::new(id, "Sensor", ValueContents::Bool(false)).read_only()
    }
}

impl CommandClass for SensorBinary {
    cc_identity!(CommandClassId::SENSOR_BINARY, "COMMAND_CLASS_SENSOR_BINARY");

    fn create_instance_values(&self, instance: u8, ctx: &mut CcContext) {
        let template = self.value_template(instance, ctx);
        ctx.add_value(template);
    }

    fn request_state(&self, flags: u8, instance: u8, ctx: &mut CcContext) {
        if flags & request_flags::DYNAMIC != 0 {
            ctx.queue_cc_get(
                "SensorBinaryCmd_Get",
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
                let level = *payload.get(1).ok_or(CcError::Truncated {
                    cc: self.class_id(),
                })?;
                let template = self.value_template(instance, ctx);
                ctx.report(template, ValueContents::Bool(level != 0));
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
