use crate::cc_identity;
use crate::commandclass::{request_flags, CcContext, CcError, CcResult, CcState, CommandClass};
use zmesh_core::prelude::*;
use zmesh_serial::msg::QueuePriority;

pub const CMD_SET: u8 = 0x01;
pub const CMD_GET: u8 = 0x02;
pub const CMD_REPORT: u8 = 0x03;

/// The device's indicator light or display.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Indicator {
    state: CcState,
}

impl Indicator {
    fn value_template(&self, instance: u8, ctx: &CcContext) -> Value {
        let id = ctx.value_id(
            ValueGenre::User,
            self.class_id(),
            instance,
            0,
            ValueType::Byte,
        );
        Value::new(id, "Indicator", ValueContents::Byte(0))
    }
}

impl CommandClass for Indicator {
    cc_identity!(CommandClassId::INDICATOR, "COMMAND_CLASS_INDICATOR");

    fn create_instance_values(&self, instance: u8, ctx: &mut CcContext) {
        let template = self.value_template(instance, ctx);
        ctx.add_value(template);
    }

    fn request_state(&self, flags: u8, instance: u8, ctx: &mut CcContext) {
        if flags & request_flags::DYNAMIC != 0 {
            ctx.queue_cc_get(
                "IndicatorCmd_Get",
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

    fn set_value(&self, value: &Value, ctx: &mut CcContext) -> bool {
        if let ValueContents::Byte(level) = value.contents() {
            ctx.queue_cc(
                "IndicatorCmd_Set",
                self.class_id(),
                value.id().instance,
                &[CMD_SET, *level],
                QueuePriority::Send,
            );
            true
        } else {
            false
        }
    }
}
