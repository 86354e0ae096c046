use crate::cc_identity;
use crate::commandclass::{CcContext, CcError, CcResult, CcState, CommandClass};
use zmesh_core::prelude::*;
use zmesh_serial::msg::QueuePriority;

pub const CMD_SET: u8 = 0x04;
pub const CMD_GET: u8 = 0x05;
pub const CMD_REPORT: u8 = 0x06;

/// Device configuration parameters. Parameter numbers are not
/// discoverable, so values appear as the device reports them or as the
/// consumer requests them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Configuration {
    state: CcState,
}

impl Configuration {
    /// Requests the current state of one parameter.
    pub fn queue_param_get(ctx: &mut CcContext, param: u8) {
        ctx.queue_cc_get(
            "ConfigurationCmd_Get",
            CommandClassId::CONFIGURATION,
            1,
            &[CMD_GET, param],
            QueuePriority::Send,
        );
    }

    /// Writes one parameter. `size` must be 1, 2 or 4.
    pub fn queue_param_set(ctx: &mut CcContext, param: u8, value: i32, size: u8) {
        let mut bytes = vec![CMD_SET, param, size];
        let be = value.to_be_bytes();
        bytes.extend_from_slice(&be[4 - size as usize..]);
        ctx.queue_cc(
            "ConfigurationCmd_Set",
            CommandClassId::CONFIGURATION,
            1,
            &bytes,
            QueuePriority::Send,
        );
    }

    fn value_template(&self, ctx: &CcContext, param: u8, ty: ValueType) -> Value {
        let id = ctx.value_id(ValueGenre::Config, self.class_id(), 1, param, ty);
        let initial = match ty {
            ValueType::Byte => ValueContents::Byte(0),
            ValueType::Short => ValueContents::Short(0),
            _ => ValueContents::Int(0),
        };
        Value::new(id, format!("Parameter {}", param), initial)
    }
}

impl CommandClass for Configuration {
    cc_identity!(CommandClassId::CONFIGURATION, "COMMAND_CLASS_CONFIGURATION");

    fn handle_msg(&mut self, payload: &[u8], _instance: u8, ctx: &mut CcContext) -> CcResult {
        match payload.first() {
            Some(&CMD_REPORT) => {
                if payload.len() < 4 {
                    return Err(CcError::Truncated {
                        cc: self.class_id(),
                    });
                }
                let param = payload[1];
                let size = payload[2] & 0x07;
                let data = &payload[3..];
                if data.len() < size as usize {
                    return Err(CcError::Truncated {
                        cc: self.class_id(),
                    });
                }
                let (ty, contents) = match size {
                    1 => (ValueType::Byte, ValueContents::Byte(data[0])),
                    2 => (
                        ValueType::Short,
                        ValueContents::Short(i16::from_be_bytes([data[0], data[1]])),
                    ),
                    4 => (
                        ValueType::Int,
                        ValueContents::Int(i32::from_be_bytes([
                            data[0], data[1], data[2], data[3],
                        ])),
                    ),
                    _ => {
                        return Err(CcError::UnknownCommand {
                            cc: self.class_id(),
                            command: CMD_REPORT,
                        })
                    }
                };
                let template = self.value_template(ctx, param, ty);
                ctx.report(template, contents);
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
        let param = value.id().index;
        match value.contents() {
            ValueContents::Byte(v) => {
                Self::queue_param_set(ctx, param, *v as i32, 1);
                true
            }
            ValueContents::Short(v) => {
                Self::queue_param_set(ctx, param, *v as i32, 2);
                true
            }
            ValueContents::Int(v) => {
                Self::queue_param_set(ctx, param, *v, 4);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::commandclass::CcOutbox;

    fn run(payload: &[u8]) -> (ValueStore, CcOutbox) {
        let mut cc = Configuration::default();
        let mut values = ValueStore::new();
        let mut out = CcOutbox::default();
        {
            let mut ctx = CcContext {
                home_id: HomeId(1),
                node_id: NodeId(7),
                controller_node_id: NodeId(1),
                basic_mapping: None,
                values: &mut values,
                out: &mut out,
            };
            cc.handle_msg(payload, 1, &mut ctx).unwrap();
        }
        (values, out)
    }

    #[test]
    fn report_sizes() {
        let (values, _) = run(&[CMD_REPORT, 3, 1, 0x2a]);
        let value = values.iter().next().unwrap();
        assert_eq!(value.id().index, 3);
        assert_eq!(value.contents(), &ValueContents::Byte(0x2a));

        let (values, _) = run(&[CMD_REPORT, 4, 4, 0x00, 0x01, 0x00, 0x00]);
        let value = values.iter().next().unwrap();
        assert_eq!(value.contents(), &ValueContents::Int(0x10000));
    }

    #[test]
    fn set_encodes_size() {
        let cc = Configuration::default();
        let mut values = ValueStore::new();
        let mut out = CcOutbox::default();
        let mut ctx = CcContext {
            home_id: HomeId(1),
            node_id: NodeId(7),
            controller_node_id: NodeId(1),
            basic_mapping: None,
            values: &mut values,
            out: &mut out,
        };

        let template = cc.value_template(&ctx, 5, ValueType::Short);
        let mut value = template.clone();
        value.set_local(ValueContents::Short(-2));
        assert!(cc.set_value(&value, &mut ctx));

        let msg = &out.msgs[0];
        assert_eq!(
            msg.payload(),
            &[7, 6, 0x70, CMD_SET, 5, 2, 0xff, 0xfe, transmit_options::DEFAULT]
        );
    }
}
