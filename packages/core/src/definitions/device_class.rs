use crate::definitions::CommandClassId;

/// Catalog entry for a generic/specific device class pair.
///
/// Distilled from the Z-Wave device class database to the classes this
/// driver implements. Mandatory classes are installed as soon as protocol
/// info arrives, before the node reports its own class list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceClassInfo {
    pub label: &'static str,
    pub mandatory: &'static [CommandClassId],
    /// When set, Basic reports from this device are routed into the mapped
    /// command class instead of creating a Basic value.
    pub basic_mapping: Option<CommandClassId>,
}

pub mod generic_class {
    pub const GENERIC_CONTROLLER: u8 = 0x01;
    pub const STATIC_CONTROLLER: u8 = 0x02;
    pub const THERMOSTAT: u8 = 0x08;
    pub const SWITCH_BINARY: u8 = 0x10;
    pub const SWITCH_MULTILEVEL: u8 = 0x11;
    pub const SENSOR_BINARY: u8 = 0x20;
    pub const SENSOR_MULTILEVEL: u8 = 0x21;
    pub const METER: u8 = 0x31;
}

/// Looks up the catalog entry for a (generic, specific) device class pair.
/// Falls back to the generic entry when the specific code is unknown.
pub fn lookup_device_class(generic: u8, specific: u8) -> Option<DeviceClassInfo> {
    use generic_class::*;

    let info = match (generic, specific) {
        (GENERIC_CONTROLLER, _) => DeviceClassInfo {
            label: "Generic Controller",
            mandatory: &[CommandClassId::BASIC],
            basic_mapping: None,
        },
        (STATIC_CONTROLLER, _) => DeviceClassInfo {
            label: "Static Controller",
            mandatory: &[CommandClassId::BASIC],
            basic_mapping: None,
        },
        (THERMOSTAT, _) => DeviceClassInfo {
            label: "Thermostat",
            mandatory: &[CommandClassId::BASIC],
            basic_mapping: None,
        },
        (SWITCH_BINARY, 0x01) => DeviceClassInfo {
            label: "Binary Power Switch",
            mandatory: &[CommandClassId::BASIC, CommandClassId::SWITCH_BINARY],
            basic_mapping: Some(CommandClassId::SWITCH_BINARY),
        },
        (SWITCH_BINARY, _) => DeviceClassInfo {
            label: "Binary Switch",
            mandatory: &[CommandClassId::BASIC, CommandClassId::SWITCH_BINARY],
            basic_mapping: Some(CommandClassId::SWITCH_BINARY),
        },
        (SWITCH_MULTILEVEL, 0x01) => DeviceClassInfo {
            label: "Multilevel Power Switch",
            mandatory: &[CommandClassId::BASIC, CommandClassId::SWITCH_MULTILEVEL],
            basic_mapping: Some(CommandClassId::SWITCH_MULTILEVEL),
        },
        (SWITCH_MULTILEVEL, _) => DeviceClassInfo {
            label: "Multilevel Switch",
            mandatory: &[CommandClassId::BASIC, CommandClassId::SWITCH_MULTILEVEL],
            basic_mapping: Some(CommandClassId::SWITCH_MULTILEVEL),
        },
        (SENSOR_BINARY, _) => DeviceClassInfo {
            label: "Binary Sensor",
            mandatory: &[CommandClassId::BASIC, CommandClassId::SENSOR_BINARY],
            basic_mapping: Some(CommandClassId::SENSOR_BINARY),
        },
        (SENSOR_MULTILEVEL, _) => DeviceClassInfo {
            label: "Multilevel Sensor",
            mandatory: &[CommandClassId::BASIC],
            basic_mapping: None,
        },
        (METER, _) => DeviceClassInfo {
            label: "Meter",
            mandatory: &[CommandClassId::BASIC, CommandClassId::METER],
            basic_mapping: None,
        },
        _ => return None,
    };
    Some(info)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn binary_switch_maps_basic() {
        let info = lookup_device_class(0x10, 0x01).unwrap();
        assert_eq!(info.label, "Binary Power Switch");
        assert!(info.mandatory.contains(&CommandClassId::SWITCH_BINARY));
        assert_eq!(info.basic_mapping, Some(CommandClassId::SWITCH_BINARY));
    }

    #[test]
    fn unknown_class_is_none() {
        assert!(lookup_device_class(0x7f, 0x00).is_none());
    }
}
