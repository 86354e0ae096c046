use crate::cc_identity;
use crate::commandclass::{request_flags, CcContext, CcError, CcResult, CcState, CommandClass};
use zmesh_core::prelude::*;
use zmesh_serial::msg::QueuePriority;

pub const CMD_SET: u8 = 0x01;
pub const CMD_GET: u8 = 0x02;
pub const CMD_REPORT: u8 = 0x03;

/// Whether the device participates in all-on / all-off broadcasts.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SwitchAll {
    state: CcState,
}

fn mode_items() -> Vec<ValueListItem> {
    vec![
        ValueListItem {
            label: "Disabled".into(),
            value: 0x00,
        },
        ValueListItem {
            label: "Off Enabled".into(),
            value: 0x01,
        },
        ValueListItem {
            label: "On Enabled".into(),
            value: 0x02,
        },
        ValueListItem {
            label: "On and Off Enabled".into(),
            value: 0xff,
        },
    ]
}

impl SwitchAll {
    fn value_template(&self, instance: u8, ctx: &CcContext) -> Value {
        let id = ctx.value_id(
            ValueGenre::System,
            self.class_id(),
            instance,
            0,
            ValueType::List,
        );
        Value::new(
            id,
            "Switch All",
            ValueContents::List {
                selection: 0,
                items: mode_items(),
            },
        )
    }
}

impl CommandClass for SwitchAll {
    cc_identity!(CommandClassId::SWITCH_ALL, "COMMAND_CLASS_SWITCH_ALL");

    fn create_instance_values(&self, instance: u8, ctx: &mut CcContext) {
        let template = self.value_template(instance, ctx);
        ctx.add_value(template);
    }

    fn request_state(&self, flags: u8, instance: u8, ctx: &mut CcContext) {
        if flags & request_flags::STATIC != 0 {
            ctx.queue_cc_get(
                "SwitchAllCmd_Get",
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
                let mode = *payload.get(1).ok_or(CcError::Truncated {
                    cc: self.class_id(),
                })?;
                let template = self.value_template(instance, ctx);
                ctx.report(
                    template,
                    ValueContents::List {
                        selection: mode as i32,
                        items: mode_items(),
                    },
                );
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
        if let ValueContents::List { selection, .. } = value.contents() {
            ctx.queue_cc(
                "SwitchAllCmd_Set",
                self.class_id(),
                value.id().instance,
                &[CMD_SET, *selection as u8],
                QueuePriority::Send,
            );
            true
        } else {
            false
        }
    }
}
