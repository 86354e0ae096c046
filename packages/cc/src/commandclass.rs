use crate::classes::*;
use enum_dispatch::enum_dispatch;
use std::collections::BTreeMap;
use thiserror::Error;
use zmesh_core::notification::Notification;
use zmesh_core::prelude::*;
use zmesh_serial::msg::{Msg, QueuePriority};

/// Which slices of a command class's state a `request_state` call asks for.
pub mod request_flags {
    /// One-shot data that never changes (supported modes, scale tables)
    pub const STATIC: u8 = 0x01;
    /// Volatile per-session state (wake-up interval binding)
    pub const SESSION: u8 = 0x02;
    /// Current values
    pub const DYNAMIC: u8 = 0x04;
}

#[derive(Error, Debug)]
pub enum CcError {
    #[error("truncated {cc} frame")]
    Truncated { cc: CommandClassId },
    #[error("unhandled {cc} command 0x{command:02x}")]
    UnknownCommand { cc: CommandClassId, command: u8 },
}

pub type CcResult = Result<(), CcError>;

/// State every command class carries regardless of its payload semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct CcState {
    /// Protocol version the device implements; 1 until the VERSION class
    /// reports otherwise
    pub version: u8,
    /// 1 unless MULTI_INSTANCE reports more
    pub instance_count: u8,
    /// Unrecognized persisted attributes, written back on save
    pub extra: BTreeMap<String, String>,
}

impl Default for CcState {
    fn default() -> Self {
        Self {
            version: 1,
            instance_count: 1,
            extra: BTreeMap::new(),
        }
    }
}

/// Effects a command class wants the driver to apply but cannot reach from
/// inside its own dispatch: cross-class state, node bookkeeping, wake-up
/// handling.
#[derive(Debug, Clone, PartialEq)]
pub enum CcEvent {
    WakeUpNotification,
    VersionReported {
        cc: CommandClassId,
        version: u8,
    },
    InstanceCountReported {
        cc: CommandClassId,
        count: u8,
    },
    /// A frame unwrapped from a multi-instance encapsulation, to be
    /// re-dispatched to the inner class
    Encapsulated {
        instance: u8,
        cc: CommandClassId,
        payload: Vec<u8>,
    },
    ManufacturerInfo {
        manufacturer_id: u16,
        product_type: u16,
        product_id: u16,
    },
    NodeNameReported(String),
    NodeLocationReported(String),
    GroupingsReported {
        count: u8,
    },
    GroupReported {
        index: u8,
        max_associations: u8,
        nodes: Vec<NodeId>,
    },
    /// A Basic report for a device whose Basic class maps onto a specific
    /// class; the node routes it there
    BasicReport {
        level: u8,
    },
}

/// Frames, notifications and events produced while handling one dispatch.
/// Collected here and applied by the driver after the class returns.
#[derive(Debug, Default)]
pub struct CcOutbox {
    pub msgs: Vec<Msg>,
    pub notifications: Vec<Notification>,
    pub events: Vec<CcEvent>,
}

/// Everything a command class may touch while handling a dispatch.
pub struct CcContext<'a> {
    pub home_id: HomeId,
    pub node_id: NodeId,
    pub controller_node_id: NodeId,
    /// The class Basic reports are routed into for this device, if any
    pub basic_mapping: Option<CommandClassId>,
    pub values: &'a mut ValueStore,
    pub out: &'a mut CcOutbox,
}

impl CcContext<'_> {
    pub fn value_id(
        &self,
        genre: ValueGenre,
        cc: CommandClassId,
        instance: u8,
        index: u8,
        ty: ValueType,
    ) -> ValueId {
        ValueId {
            home_id: self.home_id,
            node_id: self.node_id,
            genre,
            command_class_id: cc,
            instance,
            index,
            ty,
        }
    }

    /// Adds a value if it does not exist yet and queues ValueAdded for it.
    pub fn add_value(&mut self, value: Value) {
        let value_id = value.id();
        if self.values.add(value) {
            self.out
                .notifications
                .push(Notification::ValueAdded { value_id });
        }
    }

    /// Applies a device report: creates the value on first sight, then
    /// updates it, queueing ValueAdded/ValueChanged/ValueRefreshed as
    /// appropriate.
    pub fn report(&mut self, template: Value, contents: ValueContents) {
        let value_id = template.id();
        self.add_value(template);
        if let Some(value) = self.values.get_mut(&value_id) {
            let notification = match value.update_from_report(contents) {
                ValueUpdate::Changed => Notification::ValueChanged { value_id },
                ValueUpdate::Refreshed => Notification::ValueRefreshed { value_id },
            };
            self.out.notifications.push(notification);
        }
    }

    pub fn event(&mut self, event: CcEvent) {
        self.out.events.push(event);
    }

    /// Queues a command-class frame that only expects delivery confirmation.
    pub fn queue_cc(
        &mut self,
        description: &'static str,
        cc: CommandClassId,
        instance: u8,
        bytes: &[u8],
        priority: QueuePriority,
    ) {
        let msg = cc_msg(description, self.node_id, cc, instance, bytes, priority);
        self.out.msgs.push(msg);
    }

    /// Queues a Get-style frame whose transaction completes on the matching
    /// ApplicationCommand report.
    pub fn queue_cc_get(
        &mut self,
        description: &'static str,
        cc: CommandClassId,
        instance: u8,
        bytes: &[u8],
        priority: QueuePriority,
    ) {
        let msg = cc_get_msg(description, self.node_id, cc, instance, bytes, priority);
        self.out.msgs.push(msg);
    }
}

/// Builds a `SendData` frame for the given command class bytes. The body is
/// `[node, len, ccid, bytes..., transmit options]`; instances above 1 are
/// wrapped in a multi-instance encapsulation.
pub fn cc_msg(
    description: &'static str,
    node_id: NodeId,
    cc: CommandClassId,
    instance: u8,
    bytes: &[u8],
    priority: QueuePriority,
) -> Msg {
    let mut msg = Msg::request(description, node_id, FunctionType::SendData)
        .with_priority(priority)
        .expect_reply(FunctionType::SendData)
        .with_callback();

    msg.push(node_id.0);
    if instance > 1 {
        msg.push(bytes.len() as u8 + 4);
        msg.push(CommandClassId::MULTI_INSTANCE.0);
        msg.push(crate::classes::multi_instance::CMD_ENCAP);
        msg.push(instance);
        msg.push(cc.0);
    } else {
        msg.push(bytes.len() as u8 + 1);
        msg.push(cc.0);
    }
    msg.extend(bytes);
    msg.push(transmit_options::DEFAULT);
    msg
}

/// Like [`cc_msg`], but the transaction is only complete once the node's
/// report comes back.
pub fn cc_get_msg(
    description: &'static str,
    node_id: NodeId,
    cc: CommandClassId,
    instance: u8,
    bytes: &[u8],
    priority: QueuePriority,
) -> Msg {
    let expected = if instance > 1 {
        CommandClassId::MULTI_INSTANCE
    } else {
        cc
    };
    cc_msg(description, node_id, cc, instance, bytes, priority)
        .expect_reply(FunctionType::ApplicationCommand)
        .expect_command_class(expected)
}

/// The contract every command class variant fulfils. The dispatch layer
/// routes by id and knows nothing about payloads.
#[enum_dispatch]
pub trait CommandClass {
    /// The static 8-bit id of this class
    fn class_id(&self) -> CommandClassId;
    fn name(&self) -> &'static str;
    fn state(&self) -> &CcState;
    fn state_mut(&mut self) -> &mut CcState;

    fn version(&self) -> u8 {
        self.state().version
    }

    fn set_version(&mut self, version: u8) {
        self.state_mut().version = version;
    }

    fn instance_count(&self) -> u8 {
        self.state().instance_count
    }

    fn set_instance_count(&mut self, count: u8) {
        self.state_mut().instance_count = count;
    }

    /// Publishes the per-instance value schema of this class.
    fn create_instance_values(&self, instance: u8, ctx: &mut CcContext) {
        let _ = (instance, ctx);
    }

    /// Queues the frames needed to fetch the requested state slices.
    fn request_state(&self, flags: u8, instance: u8, ctx: &mut CcContext) {
        let _ = (flags, instance, ctx);
    }

    /// Handles an incoming frame of this class. `payload[0]` is the
    /// subcommand.
    fn handle_msg(&mut self, payload: &[u8], instance: u8, ctx: &mut CcContext) -> CcResult;

    /// Translates a consumer value write into a frame. Returns whether the
    /// value was recognized.
    fn set_value(&self, value: &Value, ctx: &mut CcContext) -> bool {
        let _ = (value, ctx);
        false
    }
}

/// The open set of implemented command classes. Unknown ids fail the
/// factory and are logged by the caller.
#[enum_dispatch(CommandClass)]
#[derive(Debug, Clone, PartialEq)]
pub enum CC {
    NoOperation,
    Basic,
    SwitchBinary,
    SwitchMultilevel,
    SwitchAll,
    SensorBinary,
    Meter,
    MultiInstance,
    Configuration,
    ManufacturerSpecific,
    NodeNaming,
    Battery,
    WakeUp,
    Association,
    Version,
    Indicator,
}

impl CC {
    /// Factory for the open set: maps an 8-bit id to a fresh instance.
    pub fn with_id(id: CommandClassId) -> Option<CC> {
        let cc: CC = match id {
            CommandClassId::NO_OPERATION => NoOperation::default().into(),
            CommandClassId::BASIC => Basic::default().into(),
            CommandClassId::SWITCH_BINARY => SwitchBinary::default().into(),
            CommandClassId::SWITCH_MULTILEVEL => SwitchMultilevel::default().into(),
            CommandClassId::SWITCH_ALL => SwitchAll::default().into(),
            CommandClassId::SENSOR_BINARY => SensorBinary::default().into(),
            CommandClassId::METER => Meter::default().into(),
            CommandClassId::MULTI_INSTANCE => MultiInstance::default().into(),
            CommandClassId::CONFIGURATION => Configuration::default().into(),
            CommandClassId::MANUFACTURER_SPECIFIC => ManufacturerSpecific::default().into(),
            CommandClassId::NODE_NAMING => NodeNaming::default().into(),
            CommandClassId::BATTERY => Battery::default().into(),
            CommandClassId::WAKE_UP => WakeUp::default().into(),
            CommandClassId::ASSOCIATION => Association::default().into(),
            CommandClassId::VERSION => Version::default().into(),
            CommandClassId::INDICATOR => Indicator::default().into(),
            _ => return None,
        };
        Some(cc)
    }
}

/// Implements the identity and state plumbing of the [`CommandClass`]
/// contract. Expands inside the trait impl of a class.
#[macro_export]
macro_rules! cc_identity {
    ($id:expr, $name:expr) => {
        fn class_id(&self) -> zmesh_core::definitions::CommandClassId {
            $id
        }

        fn name(&self) -> &'static str {
            $name
        }

        fn state(&self) -> &$crate::commandclass::CcState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut $crate::commandclass::CcState {
            &mut self.state
        }
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn factory_covers_known_ids() {
        let cc = CC::with_id(CommandClassId::SWITCH_BINARY).unwrap();
        assert_eq!(cc.class_id(), CommandClassId::SWITCH_BINARY);
        assert_eq!(cc.version(), 1);
        assert_eq!(cc.instance_count(), 1);

        assert!(CC::with_id(CommandClassId(0x9f)).is_none());
        assert!(CC::with_id(CommandClassId::MARK).is_none());
    }

    #[test]
    fn cc_msg_body_layout() {
        let msg = cc_msg(
            "Switch set",
            NodeId(7),
            CommandClassId::SWITCH_BINARY,
            1,
            &[0x01, 0xff],
            QueuePriority::Send,
        );
        assert_eq!(
            msg.payload(),
            &[7, 3, 0x25, 0x01, 0xff, transmit_options::DEFAULT]
        );
        assert_eq!(msg.expected_reply, Some(FunctionType::SendData));
        assert!(msg.needs_callback_id);
    }

    #[test]
    fn cc_msg_encapsulates_instances() {
        let msg = cc_get_msg(
            "Switch get",
            NodeId(7),
            CommandClassId::SWITCH_BINARY,
            2,
            &[0x02],
            QueuePriority::Query,
        );
        assert_eq!(
            msg.payload(),
            &[
                7,
                5,
                CommandClassId::MULTI_INSTANCE.0,
                crate::classes::multi_instance::CMD_ENCAP,
                2,
                0x25,
                0x02,
                transmit_options::DEFAULT
            ]
        );
        assert_eq!(
            msg.expected_command_class,
            Some(CommandClassId::MULTI_INSTANCE)
        );
    }
}
