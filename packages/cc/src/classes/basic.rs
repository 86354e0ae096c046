use crate::cc_identity;
use crate::commandclass::{request_flags, CcContext, CcError, CcEvent, CcResult, CcState, CommandClass};
use zmesh_core::prelude::*;
use zmesh_serial::msg::QueuePriority;

pub const CMD_SET: u8 = 0x01;
pub const CMD_GET: u8 = 0x02;
pub const CMD_REPORT: u8 = 0x03;

/// The lowest common denominator of every device: one byte of level.
///
/// Most device classes map Basic onto a more specific class; in that case
/// incoming reports are routed to the mapped class and no Basic value is
/// published.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Basic {
    state: CcState,
}

impl Basic {
    fn value_template(&self, instance: u8, ctx: &CcContext) -> Value {
        let id = ctx.value_id(
            ValueGenre::Basic,
            self.class_id(),
            instance,
            0,
            ValueType::Byte,
        );
        Value::new(id, "Basic", ValueContents::Byte(0))
    }
}

impl CommandClass for Basic {
    cc_identity!(CommandClassId::BASIC, "COMMAND_CLASS_BASIC");

    fn create_instance_values(&self, instance: u8, ctx: &mut CcContext) {
        if ctx.basic_mapping.is_none() {
            let template = self.value_template(instance, ctx);
            ctx.add_value(template);
        }
    }

    fn request_state(&self, flags: u8, instance: u8, ctx: &mut CcContext) {
        // When Basic is mapped, the mapped class already covers the state
        if flags & request_flags::DYNAMIC != 0 && ctx.basic_mapping.is_none() {
            ctx.queue_cc_get(
                "BasicCmd_Get",
                self.class_id(),
                instance,
                &[CMD_GET],
                QueuePriority::Query,
            );
        }
    }

    fn handle_msg(&mut self, payload: &[u8], instance: u8, ctx: &mut CcContext) -> CcResult {
        match payload.first() {
            // Devices report state both via Report and via unsolicited Set
            Some(&CMD_REPORT) | Some(&CMD_SET) => {
                let level = *payload.get(1).ok_or(CcError::Truncated {
                    cc: self.class_id(),
                })?;
                if ctx.basic_mapping.is_some() {
                    ctx.event(CcEvent::BasicReport { level });
                } else {
                    let template = self.value_template(instance, ctx);
                    ctx.report(template, ValueContents::Byte(level));
                }
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
                "BasicCmd_Set",
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
