use crate::cc_identity;
use crate::commandclass::{
    cc_msg, request_flags, CcContext, CcError, CcEvent, CcResult, CcState, CommandClass,
};
use zmesh_core::prelude::*;
use zmesh_serial::msg::{Msg, QueuePriority};

pub const CMD_INTERVAL_SET: u8 = 0x04;
pub const CMD_INTERVAL_GET: u8 = 0x05;
pub const CMD_INTERVAL_REPORT: u8 = 0x06;
pub const CMD_NOTIFICATION: u8 = 0x07;
pub const CMD_NO_MORE_INFORMATION: u8 = 0x08;

/// Wake-up coordination for sleeping devices: the interval value, the
/// notification that the device is reachable, and the frame that puts it
/// back to sleep.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WakeUp {
    state: CcState,
}

impl WakeUp {
    /// The frame that tells a drained node to go back to sleep. Sending it
    /// flips the node's awake flag back to false.
    pub fn no_more_information_msg(node_id: NodeId) -> Msg {
        cc_msg(
            "WakeUpCmd_NoMoreInformation",
            node_id,
            CommandClassId::WAKE_UP,
            1,
            &[CMD_NO_MORE_INFORMATION],
            QueuePriority::WakeUp,
        )
        .mark_wakeup_no_more_information()
    }

    fn interval_value(&self, ctx: &CcContext) -> Value {
        let id = ctx.value_id(
            ValueGenre::System,
            self.class_id(),
            1,
            0,
            ValueType::Int,
        );
        Value::new(id, "Wake-up Interval", ValueContents::Int(0)).with_units("seconds")
    }
}

impl CommandClass for WakeUp {
    cc_identity!(CommandClassId::WAKE_UP, "COMMAND_CLASS_WAKE_UP");

    fn create_instance_values(&self, instance: u8, ctx: &mut CcContext) {
        if instance == 1 {
            let template = self.interval_value(ctx);
            ctx.add_value(template);
        }
    }

    fn request_state(&self, flags: u8, instance: u8, ctx: &mut CcContext) {
        // The interval is re-requested every session so the target node can
        // be re-bound after a controller change
        if flags & request_flags::SESSION != 0 && instance == 1 {
            ctx.queue_cc_get(
                "WakeUpCmd_IntervalGet",
                self.class_id(),
                instance,
                &[CMD_INTERVAL_GET],
                QueuePriority::Query,
            );
        }
    }

    fn handle_msg(&mut self, payload: &[u8], _instance: u8, ctx: &mut CcContext) -> CcResult {
        match payload.first() {
            Some(&CMD_INTERVAL_REPORT) => {
                if payload.len() < 4 {
                    return Err(CcError::Truncated {
                        cc: self.class_id(),
                    });
                }
                let interval =
                    u32::from_be_bytes([0, payload[1], payload[2], payload[3]]) as i32;
                let template = self.interval_value(ctx);
                ctx.report(template, ValueContents::Int(interval));

                // Version 2 reports carry the node the device wakes up to.
                // If that is not us, re-bind it so we receive the wake-up
                // notifications.
                if let Some(&target) = payload.get(4) {
                    if target != ctx.controller_node_id.0 {
                        let controller = ctx.controller_node_id.0;
                        ctx.queue_cc(
                            "WakeUpCmd_IntervalSet",
                            self.class_id(),
                            1,
                            &[
                                CMD_INTERVAL_SET,
                                payload[1],
                                payload[2],
                                payload[3],
                                controller,
                            ],
                            QueuePriority::Query,
                        );
                    }
                }
                Ok(())
            }
            Some(&CMD_NOTIFICATION) => {
                ctx.event(CcEvent::WakeUpNotification);
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
    fn interval_report_rebinds_other_target() {
        let mut cc = WakeUp::default();
        let mut values = ValueStore::new();
        let mut out = CcOutbox::default();
        {
            let mut ctx = CcContext {
                home_id: HomeId(1),
                node_id: NodeId(9),
                controller_node_id: NodeId(1),
                basic_mapping: None,
                values: &mut values,
                out: &mut out,
            };
            // 600 seconds, bound to node 2 instead of us
            cc.handle_msg(&[CMD_INTERVAL_REPORT, 0x00, 0x02, 0x58, 0x02], 1, &mut ctx)
                .unwrap();
        }

        let value = values.iter().next().unwrap();
        assert_eq!(value.contents(), &ValueContents::Int(600));

        let rebind = &out.msgs[0];
        assert_eq!(
            rebind.payload(),
            &[
                9,
                6,
                0x84,
                CMD_INTERVAL_SET,
                0x00,
                0x02,
                0x58,
                1,
                transmit_options::DEFAULT
            ]
        );
    }

    #[test]
    fn notification_becomes_event() {
        let mut cc = WakeUp::default();
        let mut values = ValueStore::new();
        let mut out = CcOutbox::default();
        let mut ctx = CcContext {
            home_id: HomeId(1),
            node_id: NodeId(9),
            controller_node_id: NodeId(1),
            basic_mapping: None,
            values: &mut values,
            out: &mut out,
        };
        cc.handle_msg(&[CMD_NOTIFICATION], 1, &mut ctx).unwrap();
        assert_eq!(out.events, vec![CcEvent::WakeUpNotification]);
    }

    #[test]
    fn no_more_information_is_marked() {
        let msg = WakeUp::no_more_information_msg(NodeId(9));
        assert!(msg.wakeup_no_more_information);
        assert_eq!(
            msg.payload(),
            &[9, 2, 0x84, CMD_NO_MORE_INFORMATION, transmit_options::DEFAULT]
        );
    }
}
