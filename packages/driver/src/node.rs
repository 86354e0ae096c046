use crate::queue::WakeUpQueue;
use std::collections::BTreeMap;
use zmesh_cc::classes::switch_binary;
use zmesh_cc::prelude::*;
use zmesh_core::notification::Notification;
use zmesh_core::prelude::*;
use zmesh_logging::NodeLogger;
use zmesh_serial::msg::{Msg, QueuePriority};

/// One device of the mesh: its protocol info, command classes, values,
/// groups, wake-up bookkeeping and the cursor of its interrogation
/// pipeline. Exists exactly while the controller believes the physical
/// node exists.
#[derive(Debug)]
pub struct Node {
    pub id: NodeId,
    pub home_id: HomeId,

    pub basic: u8,
    pub generic: u8,
    pub specific: u8,
    pub device_label: String,

    pub listening: bool,
    pub routing: bool,
    pub max_baud: u32,
    pub protocol_version: u8,
    pub security: u8,

    pub manufacturer_id: String,
    pub product_type: String,
    pub product_id: String,

    pub name: String,
    pub location: String,

    pub protocol_info_received: bool,
    pub node_info_received: bool,

    query_stage: QueryStage,
    /// Outstanding interrogation requests of the current stage
    pub stage_pending: u32,

    /// Whether a non-listening device is currently reachable. Listening
    /// devices are always awake.
    pub awake: bool,
    pub basic_mapping: Option<CommandClassId>,

    pub classes: BTreeMap<CommandClassId, CC>,
    pub groups: BTreeMap<u8, Group>,
    pub values: ValueStore,
    pub wakeup_queue: WakeUpQueue,
    /// Set instead of emitting poll traffic while the node sleeps
    pub poll_required: bool,

    /// Unrecognized persisted attributes, written back on save
    pub extra: BTreeMap<String, String>,
}

impl Node {
    pub fn new(home_id: HomeId, id: NodeId) -> Self {
        Self {
            id,
            home_id,
            basic: 0,
            generic: 0,
            specific: 0,
            device_label: String::new(),
            listening: true,
            routing: false,
            max_baud: 9600,
            protocol_version: 0,
            security: 0,
            manufacturer_id: String::new(),
            product_type: String::new(),
            product_id: String::new(),
            name: String::new(),
            location: String::new(),
            protocol_info_received: false,
            node_info_received: false,
            query_stage: QueryStage::FIRST,
            stage_pending: 0,
            awake: true,
            basic_mapping: None,
            classes: BTreeMap::new(),
            groups: BTreeMap::new(),
            values: ValueStore::new(),
            wakeup_queue: WakeUpQueue::new(),
            poll_required: false,
            extra: BTreeMap::new(),
        }
    }

    pub fn query_stage(&self) -> QueryStage {
        self.query_stage
    }

    /// Moves the cursor forward one stage. The cursor never goes backwards
    /// except through [`Node::reset_queries`].
    pub fn advance_stage(&mut self) -> QueryStage {
        let next = self.query_stage.next();
        debug_assert!(next >= self.query_stage);
        self.query_stage = next;
        self.stage_pending = 0;
        next
    }

    /// Restores a persisted stage. Ignored if it would move backwards.
    pub fn restore_stage(&mut self, stage: QueryStage) {
        if stage > self.query_stage {
            self.query_stage = stage;
        }
    }

    /// Starts interrogation over, for RefreshNodeInfo.
    pub fn reset_queries(&mut self) {
        self.query_stage = QueryStage::FIRST;
        self.stage_pending = 0;
        self.protocol_info_received = false;
        self.node_info_received = false;
    }

    pub fn is_sleeping(&self) -> bool {
        !self.listening && !self.awake
    }

    fn ctx<'a>(
        values: &'a mut ValueStore,
        out: &'a mut CcOutbox,
        home_id: HomeId,
        node_id: NodeId,
        controller: NodeId,
        basic_mapping: Option<CommandClassId>,
    ) -> CcContext<'a> {
        CcContext {
            home_id,
            node_id,
            controller_node_id: controller,
            basic_mapping,
            values,
            out,
        }
    }

    /// Installs a command class and publishes its instance-1 values.
    /// Returns whether the class was new.
    pub fn add_command_class(
        &mut self,
        controller: NodeId,
        id: CommandClassId,
        out: &mut CcOutbox,
    ) -> bool {
        if self.classes.contains_key(&id) {
            return false;
        }
        let Some(cc) = CC::with_id(id) else {
            return false;
        };
        {
            let mut ctx = Self::ctx(
                &mut self.values,
                out,
                self.home_id,
                self.id,
                controller,
                self.basic_mapping,
            );
            cc.create_instance_values(1, &mut ctx);
        }
        self.classes.insert(id, cc);
        true
    }

    pub fn remove_command_class(&mut self, id: CommandClassId, out: &mut CcOutbox) {
        if self.classes.remove(&id).is_some() {
            for value_id in self.values.remove_class(id) {
                out.notifications
                    .push(Notification::ValueRemoved { value_id });
            }
        }
    }

    /// Applies a `GetNodeProtocolInfo` response: protocol flags, device
    /// classes, catalog seeding, and the eager wake-up class for
    /// non-listening devices.
    pub fn apply_protocol_info(
        &mut self,
        controller: NodeId,
        payload: &[u8],
        out: &mut CcOutbox,
    ) {
        if payload.len() < 6 {
            return;
        }
        let caps = payload[0];
        self.listening = caps & 0x80 != 0;
        self.routing = caps & 0x40 != 0;
        self.max_baud = if caps & 0x38 == 0x10 { 40_000 } else { 9_600 };
        self.protocol_version = (caps & 0x07) + 1;
        self.security = payload[1];
        self.basic = payload[3];
        self.generic = payload[4];
        self.specific = payload[5];
        self.protocol_info_received = true;

        if let Some(info) = lookup_device_class(self.generic, self.specific) {
            self.device_label = info.label.to_string();
            self.basic_mapping = info.basic_mapping;
            for id in info.mandatory {
                self.add_command_class(controller, *id, out);
            }
        }

        if !self.listening {
            // A sleeping device cannot be asked for its class list until it
            // wakes, but its wake-up handling must be in place before then
            self.add_command_class(controller, CommandClassId::WAKE_UP, out);
            self.awake = false;
        }

        out.notifications.push(Notification::NodeProtocolInfo {
            home_id: self.home_id,
            node_id: self.id,
        });
    }

    /// Applies the class list of a node-info frame. Classes after the MARK
    /// are controlled, not supported, and are skipped.
    pub fn apply_node_info(&mut self, controller: NodeId, class_list: &[u8], out: &mut CcOutbox) {
        for &raw in class_list {
            let id = CommandClassId(raw);
            if id == CommandClassId::MARK {
                break;
            }
            self.add_command_class(controller, id, out);
        }
        self.node_info_received = true;
    }

    /// Routes an incoming command-class frame to its handler and settles
    /// every event the handlers produced.
    pub fn dispatch_cc(
        &mut self,
        controller: NodeId,
        cc_id: CommandClassId,
        instance: u8,
        payload: &[u8],
        log: &NodeLogger,
    ) -> CcOutbox {
        let mut out = CcOutbox::default();
        self.dispatch_inner(controller, cc_id, instance, payload, &mut out, log);

        // Handlers communicate cross-class effects as events; settling one
        // may produce more (an encapsulated frame unwraps to another
        // dispatch). Wake-up notifications are the driver's to handle and
        // are kept.
        let mut kept = Vec::new();
        let mut pending = std::mem::take(&mut out.events);
        while !pending.is_empty() {
            for event in pending {
                self.apply_event(controller, event, &mut out, &mut kept, log);
            }
            pending = std::mem::take(&mut out.events);
        }
        out.events = kept;
        out
    }

    fn dispatch_inner(
        &mut self,
        controller: NodeId,
        cc_id: CommandClassId,
        instance: u8,
        payload: &[u8],
        out: &mut CcOutbox,
        log: &NodeLogger,
    ) {
        let home_id = self.home_id;
        let node_id = self.id;
        let basic_mapping = self.basic_mapping;
        let Some(cc) = self.classes.get_mut(&cc_id) else {
            log.message(node_id, format!("ignoring frame for unsupported {}", cc_id));
            return;
        };
        let mut ctx = CcContext {
            home_id,
            node_id,
            controller_node_id: controller,
            basic_mapping,
            values: &mut self.values,
            out,
        };
        if let Err(e) = cc.handle_msg(payload, instance, &mut ctx) {
            log.error(node_id, e.to_string());
        }
    }

    fn apply_event(
        &mut self,
        controller: NodeId,
        event: CcEvent,
        out: &mut CcOutbox,
        kept: &mut Vec<CcEvent>,
        log: &NodeLogger,
    ) {
        match event {
            CcEvent::WakeUpNotification => kept.push(CcEvent::WakeUpNotification),

            CcEvent::VersionReported { cc, version } => {
                if version == 0 {
                    // Advertised but not actually implemented
                    log.message(self.id, format!("{} reported version 0, removing", cc));
                    self.remove_command_class(cc, out);
                } else if let Some(class) = self.classes.get_mut(&cc) {
                    class.set_version(version);
                }
            }

            CcEvent::InstanceCountReported { cc, count } => {
                if let Some(class) = self.classes.get_mut(&cc) {
                    class.set_instance_count(count.max(1));
                }
                if let Some(class) = self.classes.get(&cc) {
                    let mut ctx = Self::ctx(
                        &mut self.values,
                        out,
                        self.home_id,
                        self.id,
                        controller,
                        self.basic_mapping,
                    );
                    for instance in 2..=count {
                        class.create_instance_values(instance, &mut ctx);
                    }
                }
            }

            CcEvent::Encapsulated {
                instance,
                cc,
                payload,
            } => {
                self.dispatch_inner(controller, cc, instance, &payload, out, log);
            }

            CcEvent::ManufacturerInfo {
                manufacturer_id,
                product_type,
                product_id,
            } => {
                self.manufacturer_id = format!("{:04x}", manufacturer_id);
                self.product_type = format!("{:04x}", product_type);
                self.product_id = format!("{:04x}", product_id);
            }

            CcEvent::NodeNameReported(name) => {
                if self.name != name {
                    self.name = name;
                    out.notifications.push(Notification::NodeNaming {
                        home_id: self.home_id,
                        node_id: self.id,
                    });
                }
            }

            CcEvent::NodeLocationReported(location) => {
                if self.location != location {
                    self.location = location;
                    out.notifications.push(Notification::NodeNaming {
                        home_id: self.home_id,
                        node_id: self.id,
                    });
                }
            }

            CcEvent::GroupingsReported { .. } => {
                // The per-group queries are already queued by the handler
            }

            CcEvent::GroupReported {
                index,
                max_associations,
                nodes,
            } => {
                let group = self
                    .groups
                    .entry(index)
                    .or_insert_with(|| Group::new(index, max_associations));
                group.max_associations = max_associations;
                if group.set_associations(nodes) {
                    out.notifications.push(Notification::Group {
                        home_id: self.home_id,
                        node_id: self.id,
                        group_index: index,
                    });
                }
            }

            CcEvent::BasicReport { level } => {
                if let Some(mapped) = self.basic_mapping {
                    // All mapped targets share the 0x03 report layout
                    self.dispatch_inner(
                        controller,
                        mapped,
                        1,
                        &[switch_binary::CMD_REPORT, level],
                        out,
                        log,
                    );
                }
            }
        }
    }

    /// Queues the requests of the current interrogation stage. Stages that
    /// have nothing to ask produce no frames; the caller advances the
    /// cursor when the outbox stays empty.
    pub fn run_query_stage(&mut self, controller: NodeId, out: &mut CcOutbox) {
        match self.query_stage {
            QueryStage::ProtocolInfo => {
                if !self.protocol_info_received {
                    let mut msg = Msg::request(
                        "GetNodeProtocolInfo",
                        self.id,
                        FunctionType::GetNodeProtocolInfo,
                    )
                    .with_priority(QueuePriority::Query)
                    .expect_reply(FunctionType::GetNodeProtocolInfo);
                    msg.push(self.id.0);
                    out.msgs.push(msg);
                }
            }

            QueryStage::NodeInfo => {
                if !self.node_info_received {
                    let mut msg =
                        Msg::request("RequestNodeInfo", self.id, FunctionType::RequestNodeInfo)
                            .with_priority(QueuePriority::Query)
                            .expect_reply(FunctionType::ApplicationUpdate);
                    msg.push(self.id.0);
                    out.msgs.push(msg);
                }
            }

            QueryStage::ManufacturerSpecific => {
                if self.manufacturer_id.is_empty() {
                    self.request_class_state(
                        controller,
                        out,
                        request_flags::STATIC,
                        |id| id == CommandClassId::MANUFACTURER_SPECIFIC,
                    );
                }
            }

            QueryStage::Versions => {
                if self.classes.contains_key(&CommandClassId::VERSION) {
                    let targets: Vec<CommandClassId> = self
                        .classes
                        .keys()
                        .copied()
                        .filter(|id| *id != CommandClassId::VERSION)
                        .collect();
                    let mut ctx = Self::ctx(
                        &mut self.values,
                        out,
                        self.home_id,
                        self.id,
                        controller,
                        self.basic_mapping,
                    );
                    for target in targets {
                        Version::queue_command_class_get(&mut ctx, target);
                    }
                }
            }

            QueryStage::Instances => {
                if self.classes.contains_key(&CommandClassId::MULTI_INSTANCE) {
                    let targets: Vec<CommandClassId> = self
                        .classes
                        .keys()
                        .copied()
                        .filter(|id| *id != CommandClassId::MULTI_INSTANCE)
                        .collect();
                    let mut ctx = Self::ctx(
                        &mut self.values,
                        out,
                        self.home_id,
                        self.id,
                        controller,
                        self.basic_mapping,
                    );
                    for target in targets {
                        MultiInstance::queue_instance_get(&mut ctx, target);
                    }
                }
            }

            QueryStage::Static => {
                // Manufacturer and version data already have their own
                // stages
                self.request_class_state(controller, out, request_flags::STATIC, |id| {
                    id != CommandClassId::MANUFACTURER_SPECIFIC && id != CommandClassId::VERSION
                });
            }

            QueryStage::Dynamic => {
                self.request_class_state(controller, out, request_flags::DYNAMIC, |_| true);
            }

            QueryStage::Session => {
                self.request_class_state(controller, out, request_flags::SESSION, |_| true);
            }

            QueryStage::Associations => {
                if self.classes.contains_key(&CommandClassId::ASSOCIATION) {
                    let mut ctx = Self::ctx(
                        &mut self.values,
                        out,
                        self.home_id,
                        self.id,
                        controller,
                        self.basic_mapping,
                    );
                    Association::request_all_groups(&mut ctx);
                }
            }

            QueryStage::Naming => {
                if self.classes.contains_key(&CommandClassId::NODE_NAMING) {
                    let mut ctx = Self::ctx(
                        &mut self.values,
                        out,
                        self.home_id,
                        self.id,
                        controller,
                        self.basic_mapping,
                    );
                    NodeNaming::queue_name_get(&mut ctx);
                    NodeNaming::queue_location_get(&mut ctx);
                }
            }

            QueryStage::Complete => {}
        }
    }

    fn request_class_state(
        &mut self,
        controller: NodeId,
        out: &mut CcOutbox,
        flags: u8,
        filter: impl Fn(CommandClassId) -> bool,
    ) {
        let mut ctx = CcContext {
            home_id: self.home_id,
            node_id: self.id,
            controller_node_id: controller,
            basic_mapping: self.basic_mapping,
            values: &mut self.values,
            out,
        };
        for (id, cc) in self.classes.iter() {
            if !filter(*id) {
                continue;
            }
            let instances = if flags & request_flags::DYNAMIC != 0 {
                cc.instance_count()
            } else {
                1
            };
            for instance in 1..=instances {
                cc.request_state(flags, instance, &mut ctx);
            }
        }
    }

    /// Re-requests every current value; used by the poll pump and when a
    /// sleeping node with a pending poll wakes up.
    pub fn request_dynamic(&mut self, controller: NodeId, out: &mut CcOutbox) {
        self.request_class_state(controller, out, request_flags::DYNAMIC, |_| true);
    }

    /// Runs `f` with a dispatch context over this node's values and the
    /// given outbox.
    pub fn with_cc_context<R>(
        &mut self,
        controller: NodeId,
        out: &mut CcOutbox,
        f: impl FnOnce(&mut CcContext) -> R,
    ) -> R {
        let mut ctx = CcContext {
            home_id: self.home_id,
            node_id: self.id,
            controller_node_id: controller,
            basic_mapping: self.basic_mapping,
            values: &mut self.values,
            out,
        };
        f(&mut ctx)
    }

    /// Re-reads the state behind one value.
    pub fn request_value_refresh(
        &mut self,
        value_id: ValueId,
        controller: NodeId,
        out: &mut CcOutbox,
    ) {
        let basic_mapping = self.basic_mapping;
        let Some(cc) = self.classes.get(&value_id.command_class_id) else {
            return;
        };
        let mut ctx = CcContext {
            home_id: self.home_id,
            node_id: self.id,
            controller_node_id: controller,
            basic_mapping,
            values: &mut self.values,
            out,
        };
        cc.request_state(request_flags::DYNAMIC, value_id.instance, &mut ctx);
    }

    /// Applies a consumer write: optimistic local update, then the class
    /// builds the Set frame. Returns false for unknown, read-only or
    /// type-mismatched values.
    pub fn set_value(
        &mut self,
        value_id: ValueId,
        contents: ValueContents,
        controller: NodeId,
        out: &mut CcOutbox,
    ) -> bool {
        {
            let Some(value) = self.values.get_mut(&value_id) else {
                return false;
            };
            if value.read_only {
                return false;
            }
            if !value.set_local(contents) {
                return false;
            }
        }
        let Some(value) = self.values.get(&value_id).cloned() else {
            return false;
        };

        let basic_mapping = self.basic_mapping;
        let Some(cc) = self.classes.get(&value_id.command_class_id) else {
            return false;
        };
        let mut ctx = CcContext {
            home_id: self.home_id,
            node_id: self.id,
            controller_node_id: controller,
            basic_mapping,
            values: &mut self.values,
            out,
        };
        cc.set_value(&value, &mut ctx)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use zmesh_cc::classes::{basic, multi_instance};
    use zmesh_logging::{NodeLogger, NullSink};

    fn logger() -> NodeLogger {
        NodeLogger::new(Arc::new(NullSink))
    }

    fn listening_switch() -> (Node, CcOutbox) {
        let mut node = Node::new(HomeId(0x01020304), NodeId(7));
        let mut out = CcOutbox::default();
        // listening, routing, 40kbit, version 3; binary power switch
        node.apply_protocol_info(NodeId(1), &[0xd2, 0, 0, 0x04, 0x10, 0x01], &mut out);
        (node, out)
    }

    #[test]
    fn protocol_info_seeds_mandatory_classes() {
        let (node, out) = listening_switch();
        assert!(node.listening);
        assert!(node.routing);
        assert_eq!(node.max_baud, 40_000);
        assert_eq!(node.protocol_version, 3);
        assert_eq!(node.device_label, "Binary Power Switch");
        assert!(node.classes.contains_key(&CommandClassId::BASIC));
        assert!(node.classes.contains_key(&CommandClassId::SWITCH_BINARY));
        assert_eq!(node.basic_mapping, Some(CommandClassId::SWITCH_BINARY));

        // The switch value is published as soon as the class exists
        assert!(out
            .notifications
            .iter()
            .any(|n| matches!(n, Notification::ValueAdded { value_id } if value_id.command_class_id == CommandClassId::SWITCH_BINARY)));
    }

    #[test]
    fn non_listening_node_gets_wakeup_class_and_sleeps() {
        let mut node = Node::new(HomeId(1), NodeId(9));
        let mut out = CcOutbox::default();
        node.apply_protocol_info(NodeId(1), &[0x00, 0, 0, 0x04, 0x10, 0x01], &mut out);
        assert!(!node.listening);
        assert!(node.classes.contains_key(&CommandClassId::WAKE_UP));
        assert!(node.is_sleeping());
    }

    #[test]
    fn node_info_stops_at_mark() {
        let (mut node, _) = listening_switch();
        let mut out = CcOutbox::default();
        node.apply_node_info(
            NodeId(1),
            &[
                CommandClassId::BASIC.0,
                CommandClassId::SWITCH_BINARY.0,
                CommandClassId::MARK.0,
                CommandClassId::BATTERY.0,
            ],
            &mut out,
        );
        // The class after the mark is controlled, not supported
        assert!(!node.classes.contains_key(&CommandClassId::BATTERY));
        assert!(node.node_info_received);
    }

    #[test]
    fn query_stage_never_decreases() {
        let (mut node, _) = listening_switch();
        let mut last = node.query_stage();
        loop {
            let next = node.advance_stage();
            assert!(next >= last);
            last = next;
            if next == QueryStage::Complete {
                break;
            }
        }
        // Only an explicit refresh goes back
        node.reset_queries();
        assert_eq!(node.query_stage(), QueryStage::ProtocolInfo);
    }

    #[test]
    fn version_zero_removes_class() {
        let (mut node, _) = listening_switch();
        let mut out = CcOutbox::default();
        node.add_command_class(NodeId(1), CommandClassId::VERSION, &mut out);

        let log = logger();
        let out = node.dispatch_cc(
            NodeId(1),
            CommandClassId::VERSION,
            1,
            &[
                zmesh_cc::classes::version::CMD_COMMAND_CLASS_REPORT,
                CommandClassId::SWITCH_BINARY.0,
                0,
            ],
            &log,
        );
        assert!(!node.classes.contains_key(&CommandClassId::SWITCH_BINARY));
        assert!(out
            .notifications
            .iter()
            .any(|n| matches!(n, Notification::ValueRemoved { .. })));
    }

    #[test]
    fn basic_report_routes_to_mapped_class() {
        let (mut node, _) = listening_switch();
        let log = logger();
        let out = node.dispatch_cc(
            NodeId(1),
            CommandClassId::BASIC,
            1,
            &[basic::CMD_REPORT, 0xff],
            &log,
        );

        let switch_id = ValueId {
            home_id: node.home_id,
            node_id: node.id,
            genre: ValueGenre::User,
            command_class_id: CommandClassId::SWITCH_BINARY,
            instance: 1,
            index: 0,
            ty: ValueType::Bool,
        };
        assert_eq!(
            node.values.get(&switch_id).unwrap().contents(),
            &ValueContents::Bool(true)
        );
        assert!(out
            .notifications
            .iter()
            .any(|n| matches!(n, Notification::ValueChanged { value_id } if *value_id == switch_id)));
    }

    #[test]
    fn encapsulated_frame_reaches_inner_class() {
        let (mut node, _) = listening_switch();
        let mut out = CcOutbox::default();
        node.add_command_class(NodeId(1), CommandClassId::MULTI_INSTANCE, &mut out);

        let log = logger();
        node.dispatch_cc(
            NodeId(1),
            CommandClassId::MULTI_INSTANCE,
            1,
            &[
                multi_instance::CMD_ENCAP,
                2,
                CommandClassId::SWITCH_BINARY.0,
                switch_binary::CMD_REPORT,
                0xff,
            ],
            &log,
        );

        let instance2 = ValueId {
            home_id: node.home_id,
            node_id: node.id,
            genre: ValueGenre::User,
            command_class_id: CommandClassId::SWITCH_BINARY,
            instance: 2,
            index: 0,
            ty: ValueType::Bool,
        };
        assert_eq!(
            node.values.get(&instance2).unwrap().contents(),
            &ValueContents::Bool(true)
        );
    }

    #[test]
    fn set_value_rejects_read_only() {
        let (mut node, _) = listening_switch();
        let mut out = CcOutbox::default();
        node.add_command_class(NodeId(1), CommandClassId::BATTERY, &mut out);

        let battery_id = ValueId {
            home_id: node.home_id,
            node_id: node.id,
            genre: ValueGenre::User,
            command_class_id: CommandClassId::BATTERY,
            instance: 1,
            index: 0,
            ty: ValueType::Byte,
        };
        let mut out = CcOutbox::default();
        assert!(!node.set_value(battery_id, ValueContents::Byte(50), NodeId(1), &mut out));
        assert!(out.msgs.is_empty());
    }

    #[test]
    fn set_value_builds_frame() {
        let (mut node, _) = listening_switch();
        let switch_id = ValueId {
            home_id: node.home_id,
            node_id: node.id,
            genre: ValueGenre::User,
            command_class_id: CommandClassId::SWITCH_BINARY,
            instance: 1,
            index: 0,
            ty: ValueType::Bool,
        };
        let mut out = CcOutbox::default();
        assert!(node.set_value(switch_id, ValueContents::Bool(true), NodeId(1), &mut out));
        assert_eq!(out.msgs.len(), 1);
        assert_eq!(
            out.msgs[0].payload(),
            &[7, 3, 0x25, 0x01, 0xff, transmit_options::DEFAULT]
        );
    }
}
