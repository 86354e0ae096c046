//! End-to-end scenarios against a scripted mock controller: init,
//! discovery, value writes, sleeping-node coordination, retry exhaustion
//! and re-enumeration after a primary-role transfer.

use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::time::Duration;
use zmesh_core::prelude::*;
use zmesh_driver::controller_command::{controller_change, learn_mode, ControllerCommandKind};
use zmesh_driver::{Manager, ManagerOptions};
use zmesh_logging::{LogSink, NullSink};
use zmesh_serial::frame::DataFrame;
use zmesh_serial::mock::{mock_pair, MockRemote};

const RECV: Duration = Duration::from_millis(2000);
const QUIET: Duration = Duration::from_millis(400);

const HOME: HomeId = HomeId(0x01020304);

fn start(transaction_timeout: Duration) -> (Manager, Receiver<Notification>, MockRemote) {
    let (binding, remote) = mock_pair();
    let manager = Manager::new(
        ManagerOptions::builder()
            .log_sink(Arc::new(NullSink) as Arc<dyn LogSink>)
            .transaction_timeout(transaction_timeout)
            .poll_interval(Duration::from_secs(3600))
            .build(),
    );
    let notifications = manager.notifications();
    manager.add_driver_with("/dev/mock0", binding).unwrap();
    (manager, notifications, remote)
}

fn respond(remote: &MockRemote, function: FunctionType, payload: &[u8]) {
    remote.send_ack();
    remote.send_frame(&DataFrame::new(
        CommandType::Response,
        function,
        payload.to_vec(),
    ));
}

fn request(remote: &MockRemote, function: FunctionType, payload: &[u8]) {
    remote.send_frame(&DataFrame::new(
        CommandType::Request,
        function,
        payload.to_vec(),
    ));
}

fn node_bitmap(nodes: &[u8]) -> Vec<u8> {
    let mut map = vec![0u8; 29];
    for n in nodes {
        let bit = (*n - 1) as usize;
        map[bit / 8] |= 1 << (bit % 8);
    }
    map
}

/// Answers the driver's startup sequence: version, ids, capabilities, soft
/// reset, init data with the given node bitmap.
fn service_init(remote: &MockRemote, nodes: &[u8]) {
    let frame = remote.recv_data(RECV).expect("version query");
    assert_eq!(
        frame.function_type(),
        Some(FunctionType::GetControllerVersion)
    );
    respond(
        remote,
        FunctionType::GetControllerVersion,
        b"Static Controller, 1.0\0\x01",
    );

    let frame = remote.recv_data(RECV).expect("id query");
    assert_eq!(frame.function_type(), Some(FunctionType::MemoryGetId));
    respond(remote, FunctionType::MemoryGetId, &[0x01, 0x02, 0x03, 0x04, 1]);

    let frame = remote.recv_data(RECV).expect("controller caps query");
    assert_eq!(
        frame.function_type(),
        Some(FunctionType::GetControllerCapabilities)
    );
    respond(remote, FunctionType::GetControllerCapabilities, &[0x18]);

    let frame = remote.recv_data(RECV).expect("serial api caps query");
    assert_eq!(
        frame.function_type(),
        Some(FunctionType::GetSerialApiCapabilities)
    );
    respond(
        remote,
        FunctionType::GetSerialApiCapabilities,
        &[1, 0, 0x00, 0x86, 0x00, 0x03, 0x00, 0x60],
    );

    let frame = remote.recv_data(RECV).expect("soft reset");
    assert_eq!(frame.function_type(), Some(FunctionType::SoftReset));
    remote.send_ack();

    let frame = remote.recv_data(RECV).expect("init data query");
    assert_eq!(
        frame.function_type(),
        Some(FunctionType::GetSerialApiInitData)
    );
    respond_init_data(remote, nodes);
}

fn respond_init_data(remote: &MockRemote, nodes: &[u8]) {
    let mut payload = vec![5, 0x08, 29];
    payload.extend_from_slice(&node_bitmap(nodes));
    payload.extend_from_slice(&[0x05, 0x00]);
    respond(remote, FunctionType::GetSerialApiInitData, &payload);
}

/// Per-node script: protocol info payload plus the class list delivered in
/// the node-info frame.
fn node_script(node: u8) -> (Vec<u8>, Vec<u8>) {
    match node {
        // The controller itself: a device class outside the catalog
        1 => (vec![0xd3, 0, 0, 0x01, 0x40, 0x01], vec![]),
        // Listening binary power switch
        7 => (
            vec![0xd3, 0, 0, 0x04, 0x10, 0x01],
            vec![0x20, 0x25, 0xef, 0x20],
        ),
        // Sleeping binary switch with wake-up support
        9 => (
            vec![0x53, 0, 0, 0x04, 0x10, 0x01],
            vec![0x20, 0x25, 0x84],
        ),
        _ => (vec![0xd3, 0, 0, 0x01, 0x40, 0x01], vec![]),
    }
}

/// Plays a compliant controller until the driver goes quiet: answers
/// protocol-info and node-info queries from the script and confirms every
/// SendData, answering Gets with canned reports.
fn service_until_quiet(remote: &MockRemote) {
    while let Some(frame) = remote.recv_data(QUIET) {
        service_one(remote, &frame);
    }
}

fn service_one(remote: &MockRemote, frame: &DataFrame) {
    match frame.function_type() {
        Some(FunctionType::GetNodeProtocolInfo) => {
            let (proto, _) = node_script(frame.payload[0]);
            respond(remote, FunctionType::GetNodeProtocolInfo, &proto);
        }
        Some(FunctionType::RequestNodeInfo) => {
            let node = frame.payload[0];
            let (proto, classes) = node_script(node);
            respond(remote, FunctionType::RequestNodeInfo, &[1]);
            let mut payload = vec![0x84, node, classes.len() as u8 + 3];
            payload.extend_from_slice(&proto[3..6]);
            payload.extend_from_slice(&classes);
            request(remote, FunctionType::ApplicationUpdate, &payload);
        }
        Some(FunctionType::SendData) => {
            let node = frame.payload[0];
            let len = frame.payload[1] as usize;
            let body = frame.payload[2..2 + len].to_vec();
            let callback_id = *frame.payload.last().unwrap();

            respond(remote, FunctionType::SendData, &[1]);
            request(remote, FunctionType::SendData, &[callback_id, 0]);

            // Answer the Gets this test suite can see
            match body.as_slice() {
                // Binary switch get: report "off"
                [0x25, 0x02] => {
                    request(
                        remote,
                        FunctionType::ApplicationCommand,
                        &[0, node, 3, 0x25, 0x03, 0x00],
                    );
                }
                // Basic get: report zero
                [0x20, 0x02] => {
                    request(
                        remote,
                        FunctionType::ApplicationCommand,
                        &[0, node, 3, 0x20, 0x03, 0x00],
                    );
                }
                // Wake-up interval get: 300 s, bound to us already
                [0x84, 0x05] => {
                    request(
                        remote,
                        FunctionType::ApplicationCommand,
                        &[0, node, 6, 0x84, 0x06, 0x00, 0x01, 0x2c, 1],
                    );
                }
                _ => {}
            }
        }
        _ => {
            remote.send_ack();
        }
    }
}

fn drain(notifications: &Receiver<Notification>) -> Vec<Notification> {
    let mut seen = Vec::new();
    while let Ok(notification) = notifications.recv_timeout(QUIET) {
        seen.push(notification);
    }
    seen
}

fn switch_value_id(node: u8) -> ValueId {
    ValueId {
        home_id: HOME,
        node_id: NodeId(node),
        genre: ValueGenre::User,
        command_class_id: CommandClassId::SWITCH_BINARY,
        instance: 1,
        index: 0,
        ty: ValueType::Bool,
    }
}

#[test]
fn s1_init_produces_one_driver_ready() {
    let (_manager, notifications, remote) = start(Duration::from_secs(5));
    service_init(&remote, &[1]);
    service_until_quiet(&remote);

    let seen = drain(&notifications);
    let ready: Vec<_> = seen
        .iter()
        .filter(|n| matches!(n, Notification::DriverReady { .. }))
        .collect();
    assert_eq!(ready.len(), 1);
    assert_eq!(
        ready[0],
        &Notification::DriverReady {
            home_id: HOME,
            node_id: NodeId(1)
        }
    );

    let added: Vec<_> = seen
        .iter()
        .filter_map(|n| match n {
            Notification::NodeAdded { node_id, .. } => Some(*node_id),
            _ => None,
        })
        .collect();
    assert_eq!(added, vec![NodeId(1)]);

    assert!(seen
        .iter()
        .any(|n| matches!(n, Notification::AllNodesQueried { .. })));
}

#[test]
fn s2_discovery_publishes_switch_value() {
    let (_manager, notifications, remote) = start(Duration::from_secs(5));
    service_init(&remote, &[1, 7]);
    service_until_quiet(&remote);

    let seen = drain(&notifications);

    let node_added_pos = seen
        .iter()
        .position(|n| matches!(n, Notification::NodeAdded { node_id, .. } if *node_id == NodeId(7)))
        .expect("NodeAdded(7)");

    let switch_id = switch_value_id(7);
    let value_added_pos = seen
        .iter()
        .position(
            |n| matches!(n, Notification::ValueAdded { value_id } if *value_id == switch_id),
        )
        .expect("ValueAdded for the switch");
    assert!(node_added_pos < value_added_pos);

    // The class after the MARK is controlled only; it must not produce a
    // Basic value for this mapped device either way
    assert!(!seen.iter().any(|n| matches!(
        n,
        Notification::ValueAdded { value_id }
            if value_id.command_class_id == CommandClassId::BASIC && value_id.node_id == NodeId(7)
    )));

    // Any change to the switch value comes after its ValueAdded
    if let Some(changed_pos) = seen.iter().position(
        |n| matches!(n, Notification::ValueChanged { value_id } if *value_id == switch_id),
    ) {
        assert!(value_added_pos < changed_pos);
    }

    assert!(seen
        .iter()
        .any(|n| matches!(n, Notification::NodeQueriesComplete { node_id, .. } if *node_id == NodeId(7))));
}

#[test]
fn s3_set_value_round_trip() {
    let (manager, notifications, remote) = start(Duration::from_secs(5));
    service_init(&remote, &[1, 7]);
    service_until_quiet(&remote);
    let _ = drain(&notifications);

    let accepted = manager
        .set_value(switch_value_id(7), ValueContents::Bool(true))
        .unwrap();
    assert!(accepted);

    // The local copy reflects the write before any confirmation arrives
    assert_eq!(
        manager.get_value(switch_value_id(7)).unwrap(),
        Some(ValueContents::Bool(true))
    );

    let frame = remote.recv_data(RECV).expect("set frame");
    assert_eq!(frame.function_type(), Some(FunctionType::SendData));
    let callback_id = *frame.payload.last().unwrap();
    assert_eq!(
        &frame.payload[..frame.payload.len() - 1],
        &[7, 3, 0x25, 0x01, 0xff, transmit_options::DEFAULT]
    );
    assert_ne!(callback_id, 0);

    remote.send_ack();
    respond(&remote, FunctionType::SendData, &[1]);
    request(&remote, FunctionType::SendData, &[callback_id, 0]);

    let seen = drain(&notifications);
    assert!(seen.iter().any(|n| matches!(
        n,
        Notification::MsgComplete { node_id, success: true, .. } if *node_id == NodeId(7)
    )));
}

#[test]
fn s4_sleeping_node_queues_until_wakeup() {
    let (manager, notifications, remote) = start(Duration::from_secs(5));
    service_init(&remote, &[1, 9]);
    // Answers node 9's protocol info; its node-info request parks in the
    // wake-up queue
    service_until_quiet(&remote);
    let _ = drain(&notifications);

    // Writes for a sleeping node stay off the wire
    let accepted = manager
        .set_value(switch_value_id(9), ValueContents::Bool(true))
        .unwrap();
    assert!(accepted);
    assert!(remote.assert_silent(QUIET));

    // The same payload again must replace, not accumulate
    let accepted = manager
        .set_value(switch_value_id(9), ValueContents::Bool(true))
        .unwrap();
    assert!(accepted);
    assert!(remote.assert_silent(QUIET));

    // The device announces itself
    request(&remote, FunctionType::ApplicationCommand, &[0, 9, 2, 0x84, 0x07]);

    // Queued traffic drains in order: the parked node-info request, the
    // one surviving set, then no-more-information
    let frame = remote.recv_data(RECV).expect("drained node info request");
    assert_eq!(frame.function_type(), Some(FunctionType::RequestNodeInfo));
    service_one(&remote, &frame);

    let frame = remote.recv_data(RECV).expect("drained set");
    assert_eq!(frame.function_type(), Some(FunctionType::SendData));
    assert_eq!(
        &frame.payload[..frame.payload.len() - 1],
        &[9, 3, 0x25, 0x01, 0xff, transmit_options::DEFAULT]
    );
    service_one(&remote, &frame);

    let frame = remote.recv_data(RECV).expect("no more information");
    assert_eq!(frame.function_type(), Some(FunctionType::SendData));
    let body = &frame.payload[2..2 + frame.payload[1] as usize];
    assert_eq!(body, &[0x84, 0x08]);
    service_one(&remote, &frame);

    // Only one copy of the set ever reached the wire; let the rest of the
    // interview play out
    let mut sets = 1;
    while let Some(frame) = remote.recv_data(QUIET) {
        if frame.function_type() == Some(FunctionType::SendData) {
            let len = frame.payload[1] as usize;
            if frame.payload[2..2 + len] == [0x25, 0x01, 0xff] {
                sets += 1;
            }
        }
        service_one(&remote, &frame);
    }
    assert_eq!(sets, 1);
}

#[test]
fn s5_retry_exhaustion_drops_frame() {
    let (manager, notifications, remote) = start(Duration::from_millis(150));
    service_init(&remote, &[1, 7]);
    service_until_quiet(&remote);
    let _ = drain(&notifications);

    manager
        .set_value(switch_value_id(7), ValueContents::Bool(true))
        .unwrap();

    // Three transmissions of the identical frame, no ACK from us
    let first = remote.recv_data(RECV).expect("first attempt");
    let second = remote.recv_data(RECV).expect("second attempt");
    let third = remote.recv_data(RECV).expect("third attempt");
    assert_eq!(first, second);
    assert_eq!(second, third);

    // And not a fourth
    assert!(remote.recv_data(Duration::from_millis(600)).is_none());

    let seen = drain(&notifications);
    assert!(seen.iter().any(|n| matches!(
        n,
        Notification::MsgComplete { node_id, success: false, .. } if *node_id == NodeId(7)
    )));
}

#[test]
fn s6_transfer_primary_role_triggers_reset_and_reenumeration() {
    let (manager, notifications, remote) = start(Duration::from_secs(5));
    service_init(&remote, &[1]);
    service_until_quiet(&remote);
    let _ = drain(&notifications);

    let started = manager
        .begin_controller_command(
            HOME,
            ControllerCommandKind::TransferPrimaryRole,
            None,
            false,
            None,
        )
        .unwrap();
    assert!(started);

    let frame = remote.recv_data(RECV).expect("controller change start");
    assert_eq!(frame.function_type(), Some(FunctionType::ControllerChange));
    let callback_id = *frame.payload.last().unwrap();
    assert_eq!(frame.payload[0], controller_change::START);
    remote.send_ack();

    request(
        &remote,
        FunctionType::ControllerChange,
        &[callback_id, learn_mode::STATUS_STARTED],
    );
    request(
        &remote,
        FunctionType::ControllerChange,
        &[callback_id, learn_mode::STATUS_DONE],
    );

    // The role change re-enumerates: init data now reports node 7 too
    let frame = remote.recv_data(RECV).expect("re-enumeration");
    assert_eq!(
        frame.function_type(),
        Some(FunctionType::GetSerialApiInitData)
    );
    respond_init_data(&remote, &[1, 7]);
    service_until_quiet(&remote);

    let seen = drain(&notifications);
    let resets = seen
        .iter()
        .filter(|n| matches!(n, Notification::DriverReset { .. }))
        .count();
    assert_eq!(resets, 1);

    let reset_pos = seen
        .iter()
        .position(|n| matches!(n, Notification::DriverReset { .. }))
        .unwrap();
    for node in [1u8, 7] {
        let added_pos = seen
            .iter()
            .position(|n| matches!(n, Notification::NodeAdded { node_id, .. } if *node_id == NodeId(node)))
            .unwrap_or_else(|| panic!("NodeAdded({}) after reset", node));
        assert!(added_pos > reset_pos);
    }
}
