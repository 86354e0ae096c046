use crate::cc_identity;
use crate::commandclass::{request_flags, CcContext, CcError, CcResult, CcState, CommandClass};
use zmesh_core::prelude::*;
use zmesh_serial::msg::QueuePriority;

pub const CMD_SET: u8 = 0x01;
pub const CMD_GET: u8 = 0x02;
pub const CMD_REPORT: u8 = 0x03;

/// On/off state of a binary switch.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SwitchBinary {
    state: CcState,
}

impl SwitchBinary {
    fn value_template(&self, instance: u8, ctx: &CcContext) -> Value {
        let id = ctx.value_id(
            ValueGenre::User,
            self.class_id(),
            instance,
            0,
            ValueType::Bool,
        );
        Value::new(id, "Switch", ValueContents::Bool(false))
    }
}

impl CommandClass for SwitchBinary {
    cc_identity!(CommandClassId::SWITCH_BINARY, "COMMAND_CLASS_SWITCH_BINARY");

    fn create_instance_values(&self, instance: u8, ctx: &mut CcContext) {
        let template = self.value_template(instance, ctx);
        ctx.add_value(template);
    }

    fn request_state(&self, flags: u8, instance: u8, ctx: &mut CcContext) {
        if flags & request_flags::DYNAMIC != 0 {
            ctx.queue_cc_get(
                "SwitchBinaryCmd_Get",
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

    fn set_value(&self, value: &Value, ctx: &mut CcContext) -> bool {
        if let ValueContents::Bool(on) = value.contents() {
            let level = if *on { 0xff } else { 0x00 };
            ctx.queue_cc(
                "SwitchBinaryCmd_Set",
                self.class_id(),
                value.id().instance,
                &[CMD_SET, level],
                QueuePriority::Send,
            );
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::commandclass::CcOutbox;

    fn ctx<'a>(values: &'a mut ValueStore, out: &'a mut CcOutbox) -> CcContext<'a> {
        CcContext {
            home_id: HomeId(0x01020304),
            node_id: NodeId(7),
            controller_node_id: NodeId(1),
            basic_mapping: None,
            values,
            out,
        }
    }

    #[test]
    fn report_creates_and_updates_value() {
        let mut cc = SwitchBinary::default();
        let mut values = ValueStore::new();
        let mut out = CcOutbox::default();

        cc.handle_msg(&[CMD_REPORT, 0xff], 1, &mut ctx(&mut values, &mut out))
            .unwrap();

        let ids: Vec<_> = values.ids().collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(
            values.get(&ids[0]).unwrap().contents(),
            &ValueContents::Bool(true)
        );
        assert!(matches!(
            out.notifications[0],
            Notification::ValueAdded { .. }
        ));
        assert!(matches!(
            out.notifications[1],
            Notification::ValueChanged { .. }
        ));
    }

    #[test]
    fn set_builds_set_frame() {
        let cc = SwitchBinary::default();
        let mut values = ValueStore::new();
        let mut out = CcOutbox::default();
        {
            let mut ctx = ctx(&mut values, &mut out);
            cc.create_instance_values(1, &mut ctx);
            let id = ctx.value_id(
                ValueGenre::User,
                CommandClassId::SWITCH_BINARY,
                1,
                0,
                ValueType::Bool,
            );
            let mut value = ctx.values.get(&id).unwrap().clone();
            value.set_local(ValueContents::Bool(true));
            assert!(cc.set_value(&value, &mut ctx));
        }

        let msg = &out.msgs[0];
        assert_eq!(
            msg.payload(),
            &[7, 3, 0x25, CMD_SET, 0xff, transmit_options::DEFAULT]
        );
    }

    #[test]
    fn truncated_report_is_an_error() {
        let mut cc = SwitchBinary::default();
        let mut values = ValueStore::new();
        let mut out = CcOutbox::default();
        assert!(cc
            .handle_msg(&[CMD_REPORT], 1, &mut ctx(&mut values, &mut out))
            .is_err());
    }
}
