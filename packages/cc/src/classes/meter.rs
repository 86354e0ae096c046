use crate::cc_identity;
use crate::commandclass::{
    request_flags, CcContext, CcError, CcResult, CcState, CommandClass,
};
use zmesh_core::prelude::*;
use zmesh_serial::msg::QueuePriority;

pub const CMD_GET: u8 = 0x01;
pub const CMD_REPORT: u8 = 0x02;
pub const CMD_SUPPORTED_GET: u8 = 0x03;
pub const CMD_SUPPORTED_REPORT: u8 = 0x04;

const METER_TYPE_ELECTRIC: u8 = 0x01;
const METER_TYPE_GAS: u8 = 0x02;
const METER_TYPE_WATER: u8 = 0x03;

/// Accumulated and instantaneous consumption readings. One value per
/// reported scale, keyed by the scale as the value index.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Meter {
    state: CcState,
}

fn scale_units(meter_type: u8, scale: u8) -> &'static str {
    match (meter_type, scale) {
        (METER_TYPE_ELECTRIC, 0) => "kWh",
        (METER_TYPE_ELECTRIC, 1) => "kVAh",
        (METER_TYPE_ELECTRIC, 2) => "W",
        (METER_TYPE_ELECTRIC, 3) => "pulses",
        (METER_TYPE_GAS, 0) | (METER_TYPE_WATER, 0) => "m3",
        (METER_TYPE_GAS, 1) | (METER_TYPE_WATER, 1) => "ft3",
        (METER_TYPE_GAS, 3) | (METER_TYPE_WATER, 3) => "pulses",
        _ => "",
    }
}

/// Renders `size` big-endian bytes with an implied decimal point at
/// `precision` digits from the right.
fn decode_reading(data: &[u8], precision: u8) -> String {
    let mut raw: i64 = if data.first().map(|b| b & 0x80 != 0).unwrap_or(false) {
        -1
    } else {
        0
    };
    for byte in data {
        raw = (raw << 8) | *byte as i64;
    }

    if precision == 0 {
        return raw.to_string();
    }
    let divisor = 10i64.pow(precision as u32);
    let sign = if raw < 0 { "-" } else { "" };
    let magnitude = raw.abs();
    format!(
        "{}{}.{:0width$}",
        sign,
        magnitude / divisor,
        magnitude % divisor,
        width = precision as usize
    )
}

impl Meter {
    fn value_template(&self, ctx: &CcContext, instance: u8, scale: u8, units: &str) -> Value {
        let id = ctx.value_id(
            ValueGenre::User,
            self.class_id(),
            instance,
            scale,
            ValueType::Decimal,
        );
        Value::new(id, "Meter", ValueContents::Decimal("0".into()))
            .with_units(units)
            .read_only()
    }
}

impl CommandClass for Meter {
    cc_identity!(CommandClassId::METER, "COMMAND_CLASS_METER");

    fn request_state(&self, flags: u8, instance: u8, ctx: &mut CcContext) {
        if flags & request_flags::STATIC != 0 && self.version() > 1 {
            ctx.queue_cc_get(
                "MeterCmd_SupportedGet",
                self.class_id(),
                instance,
                &[CMD_SUPPORTED_GET],
                QueuePriority::Query,
            );
        }
        if flags & request_flags::DYNAMIC != 0 {
            ctx.queue_cc_get(
                "MeterCmd_Get",
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
                if payload.len() < 4 {
                    return Err(CcError::Truncated {
                        cc: self.class_id(),
                    });
                }
                let meter_type = payload[1] & 0x1f;
                let properties = payload[2];
                let precision = properties >> 5;
                let scale = (properties >> 3) & 0x03;
                let size = (properties & 0x07) as usize;
                let data = payload
                    .get(3..3 + size)
                    .ok_or(CcError::Truncated {
                        cc: self.class_id(),
                    })?;

                let reading = decode_reading(data, precision);
                let template =
                    self.value_template(ctx, instance, scale, scale_units(meter_type, scale));
                ctx.report(template, ValueContents::Decimal(reading));
                Ok(())
            }
            Some(&CMD_SUPPORTED_REPORT) => {
                if payload.len() < 3 {
                    return Err(CcError::Truncated {
                        cc: self.class_id(),
                    });
                }
                // One Get per supported scale bit, never more
                let scale_bits = payload[2] & 0x0f;
                for scale in 0..4u8 {
                    if scale_bits & (1 << scale) != 0 {
                        ctx.queue_cc_get(
                            "MeterCmd_Get",
                            self.class_id(),
                            instance,
                            &[CMD_GET, scale << 3],
                            QueuePriority::Query,
                        );
                    }
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
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::commandclass::CcOutbox;

    fn ctx<'a>(values: &'a mut ValueStore, out: &'a mut CcOutbox) -> CcContext<'a> {
        CcContext {
            home_id: HomeId(1),
            node_id: NodeId(7),
            controller_node_id: NodeId(1),
            basic_mapping: None,
            values,
            out,
        }
    }

    #[test]
    fn decode_reading_applies_precision() {
        assert_eq!(decode_reading(&[0x01, 0x00], 2), "2.56");
        assert_eq!(decode_reading(&[0x2a], 0), "42");
        assert_eq!(decode_reading(&[0xff, 0x38], 1), "-20.0");
    }

    #[test]
    fn report_creates_scaled_value() {
        let mut cc = Meter::default();
        let mut values = ValueStore::new();
        let mut out = CcOutbox::default();
        // Electric, precision 2, scale 0 (kWh), size 2, reading 2.56
        cc.handle_msg(
            &[CMD_REPORT, 0x01, 0b010_00_010, 0x01, 0x00],
            1,
            &mut ctx(&mut values, &mut out),
        )
        .unwrap();

        let value = values.iter().next().unwrap();
        assert_eq!(value.units, "kWh");
        assert_eq!(value.contents(), &ValueContents::Decimal("2.56".into()));
    }

    #[test]
    fn supported_report_queues_one_get_per_scale() {
        let mut cc = Meter::default();
        let mut values = ValueStore::new();
        let mut out = CcOutbox::default();
        // Scales 0 and 2 supported
        cc.handle_msg(
            &[CMD_SUPPORTED_REPORT, 0x01, 0b0101],
            1,
            &mut ctx(&mut values, &mut out),
        )
        .unwrap();

        assert_eq!(out.msgs.len(), 2);
        assert_eq!(out.msgs[0].payload()[4], 0 << 3);
        assert_eq!(out.msgs[1].payload()[4], 2 << 3);
    }
}
