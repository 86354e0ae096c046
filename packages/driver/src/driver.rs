use crate::controller_command::{
    ControllerCallback, ControllerCommandKind, ControllerCommandRunner, ControllerState,
    CtrlEffect,
};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::notify::Watchers;
use crate::poll::PollList;
use crate::queue::SendQueues;
use crate::storage::{self, DriverInfo, SavedNode};
use crate::transaction::{CallbackIds, Transaction};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use typed_builder::TypedBuilder;
use zmesh_cc::classes::WakeUp;
use zmesh_cc::prelude::{CcOutbox, Configuration, NodeNaming};
use zmesh_core::prelude::*;
use zmesh_logging::{
    ConsoleSink, ControllerLogger, Direction, DriverLogger, LogSink, Loglevel, NodeLogger,
    SerialLogger,
};
use zmesh_serial::binding::{OpenPortBinding, PortBinding};
use zmesh_serial::frame::SerialFrame;
use zmesh_serial::msg::{Msg, QueuePriority};

const NODE_INFO_RECEIVED: u8 = 0x84;
const NODE_INFO_REQ_FAILED: u8 = 0x81;

/// A link this unreliable is not coming back on its own.
const MAX_FRAMING_ERRORS: u32 = 100;

/// Tunables of one driver. The defaults match a real controller; tests
/// shrink the timeouts.
#[derive(Clone, TypedBuilder)]
pub struct DriverOptions {
    /// Window for ACK, response and callback of one frame
    #[builder(default = Duration::from_secs(5))]
    pub transaction_timeout: Duration,
    /// Transmissions per frame before it is dropped or re-routed
    #[builder(default = 3)]
    pub max_send_attempts: u8,
    /// Full pass of the poll list
    #[builder(default = Duration::from_secs(30))]
    pub poll_interval: Duration,
    /// Where the per-HomeId XML documents live; None disables persistence
    #[builder(default, setter(into))]
    pub config_dir: Option<PathBuf>,
    #[builder(default, setter(into))]
    pub log_sink: Option<Arc<dyn LogSink>>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Requests sent into the driver thread by the consumer API.
pub enum DriverCommand {
    SetValue {
        value_id: ValueId,
        contents: ValueContents,
        reply: Sender<bool>,
    },
    GetValue {
        value_id: ValueId,
        reply: Sender<Option<ValueContents>>,
    },
    RefreshValue {
        value_id: ValueId,
    },
    EnablePoll {
        value_id: ValueId,
        intensity: u8,
    },
    DisablePoll {
        value_id: ValueId,
    },
    SetNodeName {
        node_id: NodeId,
        name: String,
    },
    SetNodeLocation {
        node_id: NodeId,
        location: String,
    },
    RequestConfigParam {
        node_id: NodeId,
        param: u8,
    },
    SetConfigParam {
        node_id: NodeId,
        param: u8,
        value: i32,
        size: u8,
    },
    BeginControllerCommand {
        kind: ControllerCommandKind,
        callback: Option<ControllerCallback>,
        high_power: bool,
        target: Option<NodeId>,
        reply: Sender<bool>,
    },
    CancelControllerCommand,
    RefreshNodeInfo,
    WriteConfig {
        reply: Sender<bool>,
    },
    PollTick,
    Shutdown,
}

/// Handle to one controller: owns the three pumps (the serial I/O thread
/// inside the port binding, the driver thread, the poll thread) and the
/// channels into them.
pub struct Driver {
    device: String,
    cmd_tx: Sender<DriverCommand>,
    runtime_thread: Option<JoinHandle<()>>,
    poll_thread: Option<JoinHandle<()>>,
    poll_stop_tx: Option<Sender<()>>,
    home_id: Arc<Mutex<Option<HomeId>>>,
}

impl Driver {
    pub fn start<B>(
        device: &str,
        binding: B,
        options: DriverOptions,
        watchers: Arc<Watchers>,
    ) -> Result<Driver>
    where
        B: PortBinding,
        B::Open: Send + 'static,
    {
        let (serial_tx, serial_rx) = crossbeam_channel::unbounded();
        let port = binding.open(serial_tx)?;

        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let home_id = Arc::new(Mutex::new(None));
        let poll_len = Arc::new(AtomicUsize::new(0));

        let poll_interval = options.poll_interval;
        let (poll_stop_tx, poll_stop_rx) = crossbeam_channel::bounded::<()>(1);
        let poll_cmd_tx = cmd_tx.clone();
        let poll_len_for_pump = poll_len.clone();
        let poll_thread = thread::spawn(move || {
            loop {
                // Dividing by the list length spreads the polls out instead
                // of bursting one full pass at each interval
                let entries = poll_len_for_pump.load(Ordering::Relaxed).max(1) as u32;
                let period = poll_interval / entries;
                match poll_stop_rx.recv_timeout(period) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
                if poll_cmd_tx.send(DriverCommand::PollTick).is_err() {
                    break;
                }
            }
        });

        let runtime = Runtime::new(
            device.to_string(),
            port,
            options,
            serial_rx,
            cmd_rx,
            watchers,
            home_id.clone(),
            poll_len,
        );
        let runtime_thread = thread::spawn(move || runtime.run());

        Ok(Driver {
            device: device.to_string(),
            cmd_tx,
            runtime_thread: Some(runtime_thread),
            poll_thread: Some(poll_thread),
            poll_stop_tx: Some(poll_stop_tx),
            home_id,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn home_id(&self) -> Option<HomeId> {
        self.home_id.lock().ok().and_then(|guard| *guard)
    }

    pub fn command(&self, cmd: DriverCommand) -> Result<()> {
        self.cmd_tx.send(cmd).map_err(|_| Error::DriverGone)
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.cmd_tx.send(DriverCommand::Shutdown);
        if let Some(stop) = self.poll_stop_tx.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.poll_thread.take() {
            let _ = thread.join();
        }
        if let Some(thread) = self.runtime_thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The driver thread: transaction engine, dispatch, interrogation and
/// notification fan-out. Everything here runs on one thread; the serial
/// port is only touched through the binding's own thread.
struct Runtime<P: OpenPortBinding> {
    device: String,
    port: P,
    options: DriverOptions,
    serial_rx: Receiver<SerialFrame>,
    cmd_rx: Receiver<DriverCommand>,
    watchers: Arc<Watchers>,
    home_id_cell: Arc<Mutex<Option<HomeId>>>,
    poll_len: Arc<AtomicUsize>,

    serial_log: SerialLogger,
    driver_log: DriverLogger,
    controller_log: ControllerLogger,
    node_log: NodeLogger,

    info: DriverInfo,
    library_type: u8,
    saved_nodes: BTreeMap<NodeId, SavedNode>,
    nodes: BTreeMap<NodeId, Node>,

    queues: SendQueues,
    txn: Option<Transaction>,
    callback_ids: CallbackIds,
    pending_notifications: Vec<Notification>,
    controller_cmd: Option<ControllerCommandRunner>,
    poll_list: PollList,

    awake_queried_emitted: bool,
    all_queried_emitted: bool,
    framing_errors: u32,
    shutdown: bool,
}

impl<P: OpenPortBinding> Runtime<P> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        device: String,
        port: P,
        options: DriverOptions,
        serial_rx: Receiver<SerialFrame>,
        cmd_rx: Receiver<DriverCommand>,
        watchers: Arc<Watchers>,
        home_id_cell: Arc<Mutex<Option<HomeId>>>,
        poll_len: Arc<AtomicUsize>,
    ) -> Self {
        let sink: Arc<dyn LogSink> = options
            .log_sink
            .clone()
            .unwrap_or_else(|| Arc::new(ConsoleSink::new(Loglevel::Info)));
        let mut info = DriverInfo::default();
        info.poll_interval_ms = options.poll_interval.as_millis() as u64;

        Self {
            device,
            port,
            options,
            serial_rx,
            cmd_rx,
            watchers,
            home_id_cell,
            poll_len,
            serial_log: SerialLogger::new(sink.clone()),
            driver_log: DriverLogger::new(sink.clone()),
            controller_log: ControllerLogger::new(sink.clone()),
            node_log: NodeLogger::new(sink),
            info,
            library_type: 0,
            saved_nodes: BTreeMap::new(),
            nodes: BTreeMap::new(),
            queues: SendQueues::new(),
            txn: None,
            callback_ids: CallbackIds::new(),
            pending_notifications: Vec::new(),
            controller_cmd: None,
            poll_list: PollList::new(),
            awake_queried_emitted: false,
            all_queried_emitted: false,
            framing_errors: 0,
            shutdown: false,
        }
    }

    fn run(mut self) {
        self.driver_log
            .message(format!("starting driver on {}", self.device));
        self.queue_init_sequence();

        loop {
            self.try_send_next();
            self.flush_notifications();
            if self.shutdown {
                break;
            }

            let timeout = self
                .txn
                .as_ref()
                .map(|txn| txn.deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_millis(500));

            crossbeam_channel::select! {
                recv(self.serial_rx) -> frame => match frame {
                    Ok(frame) => self.handle_serial(frame),
                    Err(_) => {
                        self.driver_log.error("serial port closed unexpectedly");
                        break;
                    }
                },
                recv(self.cmd_rx) -> cmd => match cmd {
                    Ok(cmd) => self.handle_command(cmd),
                    Err(_) => break,
                },
                default(timeout) => self.handle_timeout(),
            }
        }

        self.flush_notifications();
        self.driver_log.message("driver shut down");
        let _ = self.port.close();
    }

    // ---- notifications ----

    fn notify(&mut self, notification: Notification) {
        self.pending_notifications.push(notification);
    }

    /// Safe point: the consumer callback runs here, on the driver thread,
    /// in queue order.
    fn flush_notifications(&mut self) {
        for notification in self.pending_notifications.drain(..) {
            self.watchers.notify(&notification);
        }
    }

    // ---- init ----

    fn queue_init_sequence(&mut self) {
        let queries = [
            ("GetControllerVersion", FunctionType::GetControllerVersion),
            ("MemoryGetId", FunctionType::MemoryGetId),
            (
                "GetControllerCapabilities",
                FunctionType::GetControllerCapabilities,
            ),
            (
                "GetSerialApiCapabilities",
                FunctionType::GetSerialApiCapabilities,
            ),
        ];
        for (name, function) in queries {
            self.queues.push(
                Msg::request(name, NodeId::BROADCAST, function)
                    .with_priority(QueuePriority::Command)
                    .expect_reply(function),
            );
        }
        // The soft reset settles the controller into a known state; it is
        // only confirmed by its ACK
        self.queues.push(
            Msg::request("SoftReset", NodeId::BROADCAST, FunctionType::SoftReset)
                .with_priority(QueuePriority::Command),
        );
        self.queues.push(
            Msg::request(
                "GetSerialApiInitData",
                NodeId::BROADCAST,
                FunctionType::GetSerialApiInitData,
            )
            .with_priority(QueuePriority::Command)
            .expect_reply(FunctionType::GetSerialApiInitData),
        );
    }

    // ---- transmit path ----

    fn try_send_next(&mut self) {
        if self.txn.is_some() || self.shutdown {
            return;
        }
        if let Some(msg) = self.queues.pop_next() {
            self.transmit(msg);
        }
    }

    fn transmit(&mut self, mut msg: Msg) {
        if msg.needs_callback_id && msg.callback_id.is_none() {
            msg.callback_id = Some(self.callback_ids.next());
        }
        msg.send_attempts += 1;

        let frame = msg.frame();
        self.serial_log.data(Direction::Outbound, &frame.to_bytes());
        if self.port.write_frame(&SerialFrame::Data(frame)).is_err() {
            self.driver_log.error("serial write failed, shutting down");
            self.shutdown = true;
            return;
        }
        self.txn = Some(Transaction::arm(msg, self.options.transaction_timeout));
    }

    fn handle_timeout(&mut self) {
        let expired = self
            .txn
            .as_ref()
            .map(|txn| Instant::now() >= txn.deadline)
            .unwrap_or(false);
        if expired {
            self.retry_current("transaction timeout");
        }
    }

    /// NAK, CAN or a timeout: the same frame goes out again, up to the
    /// attempt bound.
    fn retry_current(&mut self, reason: &str) {
        let Some(txn) = self.txn.take() else {
            return;
        };
        let msg = txn.msg;
        if msg.send_attempts >= self.options.max_send_attempts {
            self.driver_log.error(format!(
                "giving up on \"{}\" after {} attempts ({})",
                msg.description, msg.send_attempts, reason
            ));
            self.settle_msg(msg, false);
        } else {
            self.driver_log
                .verbose(format!("resending \"{}\" ({})", msg.description, reason));
            self.transmit(msg);
        }
    }

    fn check_txn_complete(&mut self) {
        let complete = self
            .txn
            .as_ref()
            .map(|txn| txn.is_complete())
            .unwrap_or(false);
        if complete {
            self.finish_current(true);
        }
    }

    fn finish_current(&mut self, success: bool) {
        if let Some(txn) = self.txn.take() {
            self.settle_msg(txn.msg, success);
        }
    }

    /// The transaction is over: notify, flip wake-up state, gate the
    /// interrogation pipeline, and on failure re-route to the wake-up
    /// queue of a sleeping-capable node.
    fn settle_msg(&mut self, msg: Msg, success: bool) {
        let home_id = self.info.home_id;
        if msg.function == FunctionType::SendData && msg.target_node.is_valid() {
            self.notify(Notification::MsgComplete {
                home_id,
                node_id: msg.target_node,
                success,
            });
        }

        if success {
            if msg.wakeup_no_more_information {
                if let Some(node) = self.nodes.get_mut(&msg.target_node) {
                    node.awake = false;
                }
            }
            if msg.stage_query {
                self.on_stage_msg_settled(msg.target_node);
            }
            return;
        }

        let non_listening = self
            .nodes
            .get(&msg.target_node)
            .map(|node| !node.listening)
            .unwrap_or(false);
        if non_listening {
            // The device is asleep. Everything pending for it moves to its
            // wake-up queue in order; a queued no-more-information frame is
            // pointless there and is dropped instead.
            let moved = self.queues.remove_for_node(msg.target_node);
            if let Some(node) = self.nodes.get_mut(&msg.target_node) {
                node.awake = false;
                if !msg.wakeup_no_more_information {
                    node.wakeup_queue.push(msg);
                }
                for queued in moved {
                    if !queued.wakeup_no_more_information {
                        node.wakeup_queue.push(queued);
                    }
                }
            }
        } else if msg.stage_query {
            // A listening node that will not answer: move on rather than
            // wedge the pipeline
            self.on_stage_msg_settled(msg.target_node);
        }
    }

    // ---- serial input ----

    fn handle_serial(&mut self, frame: SerialFrame) {
        match frame {
            SerialFrame::Ack => {
                self.serial_log.control(Direction::Inbound, "ACK");
                let acked = match self.txn.as_mut() {
                    Some(txn) if txn.expecting_ack() => {
                        txn.on_ack();
                        true
                    }
                    _ => false,
                };
                if acked {
                    self.check_txn_complete();
                }
            }
            SerialFrame::Nak => {
                self.serial_log.control(Direction::Inbound, "NAK");
                self.retry_current("NAK");
            }
            SerialFrame::Can => {
                self.serial_log.control(Direction::Inbound, "CAN");
                self.retry_current("CAN");
            }
            SerialFrame::Data(frame) => {
                self.serial_log.data(Direction::Inbound, &frame.to_bytes());
                self.handle_data_frame(frame);
            }
            SerialFrame::Corrupt(bytes) => {
                // Recovered locally: the framer already sent the NAK
                self.framing_errors += 1;
                self.driver_log.verbose(format!(
                    "discarded frame with bad checksum ({} so far)",
                    self.framing_errors
                ));
                if self.framing_errors > MAX_FRAMING_ERRORS {
                    self.driver_log
                        .error("too many framing errors, shutting down");
                    self.shutdown = true;
                }
                let _ = bytes;
            }
            SerialFrame::Garbage(bytes) => {
                self.driver_log
                    .verbose(format!("skipped {} bytes of noise", bytes.len()));
            }
        }
    }

    fn handle_data_frame(&mut self, frame: zmesh_serial::frame::DataFrame) {
        let Some(kind) = frame.kind() else {
            self.driver_log
                .verbose(format!("unknown frame type 0x{:02x}", frame.command_type));
            return;
        };
        let Some(function) = frame.function_type() else {
            self.driver_log
                .verbose(format!("unhandled function 0x{:02x}", frame.function));
            return;
        };
        match kind {
            CommandType::Response => self.handle_response(function, &frame.payload),
            CommandType::Request => self.handle_request(function, &frame.payload),
        }
    }

    fn handle_response(&mut self, function: FunctionType, payload: &[u8]) {
        match function {
            FunctionType::GetControllerVersion => {
                let nul = payload.iter().position(|b| *b == 0).unwrap_or(payload.len());
                self.info.library_version =
                    String::from_utf8_lossy(&payload[..nul]).trim().to_string();
                self.library_type = payload.get(nul + 1).copied().unwrap_or(0);
                self.driver_log.message(format!(
                    "controller library: {} (type {})",
                    self.info.library_version, self.library_type
                ));
            }

            FunctionType::MemoryGetId => {
                if payload.len() >= 5 {
                    self.info.home_id = HomeId(u32::from_be_bytes([
                        payload[0], payload[1], payload[2], payload[3],
                    ]));
                    self.info.controller_node_id = NodeId(payload[4]);
                    if let Ok(mut cell) = self.home_id_cell.lock() {
                        *cell = Some(self.info.home_id);
                    }
                    self.load_config();
                    self.driver_log.message(format!(
                        "home id {}, controller node {}",
                        self.info.home_id, self.info.controller_node_id
                    ));
                    self.notify(Notification::DriverReady {
                        home_id: self.info.home_id,
                        node_id: self.info.controller_node_id,
                    });
                }
            }

            FunctionType::GetControllerCapabilities => {
                if let Some(&caps) = payload.first() {
                    self.info.controller_caps = ControllerCaps(caps);
                }
            }

            FunctionType::GetSerialApiCapabilities => {
                if payload.len() >= 8 {
                    self.driver_log.message(format!(
                        "serial API {}.{}, vendor {:02x}{:02x}",
                        payload[0], payload[1], payload[2], payload[3]
                    ));
                }
            }

            FunctionType::GetSerialApiInitData => {
                self.apply_init_data(payload);
            }

            FunctionType::GetNodeProtocolInfo => {
                let target = self.txn.as_ref().map(|txn| txn.msg.target_node);
                if let Some(node_id) = target {
                    self.apply_protocol_info(node_id, payload);
                }
            }

            FunctionType::SendData => {
                if payload.first() == Some(&0) {
                    // The stack did not accept the frame
                    self.retry_current("SendData rejected");
                    return;
                }
            }

            FunctionType::RequestNodeInfo => {
                if payload.first() == Some(&0) {
                    self.finish_current(false);
                    return;
                }
            }

            FunctionType::IsFailedNode
            | FunctionType::RemoveFailedNode
            | FunctionType::ReplaceFailedNode => {
                if let Some(&status) = payload.first() {
                    if let Some(mut runner) = self.controller_cmd.take() {
                        let effects = runner.on_response(function, status);
                        self.apply_ctrl_effects(runner, effects);
                    }
                }
            }

            _ => {
                self.driver_log
                    .verbose(format!("unhandled response {:?}", function));
            }
        }

        let matched = self
            .txn
            .as_mut()
            .map(|txn| txn.match_response(function))
            .unwrap_or(false);
        if matched {
            self.check_txn_complete();
        }
    }

    fn handle_request(&mut self, function: FunctionType, payload: &[u8]) {
        match function {
            FunctionType::SendData => {
                let (Some(&callback_id), Some(&status)) = (payload.first(), payload.get(1))
                else {
                    return;
                };
                let matched = self
                    .txn
                    .as_mut()
                    .map(|txn| txn.match_callback(function, callback_id))
                    .unwrap_or(false);
                if matched {
                    match TransmitStatus::try_from(status) {
                        Ok(TransmitStatus::Ok) => self.check_txn_complete(),
                        _ => self.finish_current(false),
                    }
                }
            }

            FunctionType::ApplicationCommand => self.handle_application_command(payload),
            FunctionType::ApplicationUpdate => self.handle_application_update(payload),

            FunctionType::AddNodeToNetwork
            | FunctionType::RemoveNodeFromNetwork
            | FunctionType::SetLearnMode
            | FunctionType::CreateNewPrimary
            | FunctionType::ControllerChange
            | FunctionType::RemoveFailedNode
            | FunctionType::ReplaceFailedNode => {
                self.handle_controller_request(function, payload);
            }

            _ => {
                self.driver_log
                    .verbose(format!("unhandled request {:?}", function));
            }
        }
    }

    fn handle_application_command(&mut self, payload: &[u8]) {
        if payload.len() < 4 {
            return;
        }
        let source = NodeId(payload[1]);
        let len = payload[2] as usize;
        let Some(body) = payload.get(3..3 + len) else {
            return;
        };
        if body.is_empty() {
            return;
        }
        let cc = CommandClassId(body[0]);
        let cc_payload = &body[1..];

        let matched = self
            .txn
            .as_mut()
            .map(|txn| txn.match_application_command(source, cc))
            .unwrap_or(false);

        let controller = self.info.controller_node_id;
        let Some(node) = self.nodes.get_mut(&source) else {
            // Frames for nodes we do not know about are dropped, never used
            // to create a node implicitly
            self.driver_log
                .verbose(format!("dropping frame from unknown node {}", source));
            if matched {
                self.check_txn_complete();
            }
            return;
        };

        // Hearing from a device proves it is reachable right now
        node.awake = true;
        let stage_active = node.query_stage() != QueryStage::Complete;
        let out = node.dispatch_cc(controller, cc, 1, cc_payload, &self.node_log);
        self.apply_outbox(source, out, stage_active);

        if matched {
            self.check_txn_complete();
        }
    }

    fn handle_application_update(&mut self, payload: &[u8]) {
        let Some(&state) = payload.first() else {
            return;
        };
        match state {
            NODE_INFO_RECEIVED => {
                if payload.len() < 3 {
                    return;
                }
                let source = NodeId(payload[1]);
                let len = payload[2] as usize;
                let Some(body) = payload.get(3..3 + len) else {
                    return;
                };

                let matched = self
                    .txn
                    .as_mut()
                    .filter(|txn| txn.msg.target_node == source)
                    .map(|txn| txn.match_request(FunctionType::ApplicationUpdate))
                    .unwrap_or(false);

                let controller = self.info.controller_node_id;
                if let Some(node) = self.nodes.get_mut(&source) {
                    node.awake = true;
                    let mut out = CcOutbox::default();
                    if body.len() >= 3 {
                        // The first three bytes repeat the device classes
                        node.apply_node_info(controller, &body[3..], &mut out);
                    }
                    let stage_active = node.query_stage() != QueryStage::Complete;
                    self.apply_outbox(source, out, stage_active);
                } else {
                    self.driver_log
                        .verbose(format!("node info from unknown node {}", source));
                }

                if matched {
                    self.check_txn_complete();
                }
            }

            NODE_INFO_REQ_FAILED => {
                // The failure frame carries node id 0; it belongs to the
                // in-flight RequestNodeInfo
                let applies = self
                    .txn
                    .as_ref()
                    .map(|txn| txn.msg.function == FunctionType::RequestNodeInfo)
                    .unwrap_or(false);
                if applies {
                    self.finish_current(false);
                }
            }

            _ => {
                self.driver_log
                    .verbose(format!("application update state 0x{:02x}", state));
            }
        }
    }

    fn handle_controller_request(&mut self, function: FunctionType, payload: &[u8]) {
        let (Some(&callback_id), Some(&status)) = (payload.first(), payload.get(1)) else {
            return;
        };
        let matched = self
            .txn
            .as_mut()
            .map(|txn| txn.match_callback(function, callback_id))
            .unwrap_or(false);
        if matched {
            self.check_txn_complete();
        }

        let node = payload.get(2).map(|raw| NodeId(*raw));
        if let Some(mut runner) = self.controller_cmd.take() {
            let effects = runner.on_request(function, status, node);
            self.apply_ctrl_effects(runner, effects);
        }
    }

    fn apply_ctrl_effects(
        &mut self,
        mut runner: ControllerCommandRunner,
        effects: Vec<CtrlEffect>,
    ) {
        let home_id = self.info.home_id;
        let mut finished = false;
        for effect in effects {
            match effect {
                CtrlEffect::Notify(state) => {
                    self.controller_log
                        .message(format!("{:?}: {:?}", runner.kind, state));
                    runner.notify(state);
                }
                CtrlEffect::Send(msg) => self.queues.push(msg),
                CtrlEffect::RequestNodeInfo(node_id) => {
                    if !self.nodes.contains_key(&node_id) {
                        self.nodes.insert(node_id, Node::new(home_id, node_id));
                        self.notify(Notification::NodeAdded { home_id, node_id });
                    }
                    self.advance_node_queries(node_id);
                }
                CtrlEffect::ForgetNode(node_id) => {
                    if self.nodes.remove(&node_id).is_some() {
                        self.notify(Notification::NodeRemoved { home_id, node_id });
                    }
                }
                CtrlEffect::RefreshAllNodes => self.refresh_node_info(),
                CtrlEffect::Finished => finished = true,
            }
        }
        if !finished {
            self.controller_cmd = Some(runner);
        }
    }

    // ---- controller state ----

    fn apply_init_data(&mut self, payload: &[u8]) {
        if payload.len() < 3 {
            return;
        }
        self.info.init_caps = InitCaps(payload[1]);
        let bitmap_len = payload[2] as usize;
        let Some(bitmap) = payload.get(3..3 + bitmap_len) else {
            return;
        };
        let home_id = self.info.home_id;

        let mut present = Vec::new();
        for bit in 0..bitmap_len * 8 {
            if bitmap[bit / 8] & (1 << (bit % 8)) != 0 {
                let node_id = NodeId(bit as u8 + 1);
                if node_id.is_valid() {
                    present.push(node_id);
                }
            }
        }

        let known: Vec<NodeId> = self.nodes.keys().copied().collect();
        for node_id in known {
            if !present.contains(&node_id) {
                self.nodes.remove(&node_id);
                self.notify(Notification::NodeRemoved { home_id, node_id });
            }
        }

        for node_id in present {
            if self.nodes.contains_key(&node_id) {
                continue;
            }
            let node = match self.saved_nodes.get(&node_id) {
                Some(saved) => storage::restore_node(saved, home_id),
                None => Node::new(home_id, node_id),
            };
            let value_ids: Vec<ValueId> = node.values.ids().collect();
            self.nodes.insert(node_id, node);
            self.notify(Notification::NodeAdded { home_id, node_id });
            for value_id in value_ids {
                self.notify(Notification::ValueAdded { value_id });
            }
            self.advance_node_queries(node_id);
        }
    }

    fn apply_protocol_info(&mut self, node_id: NodeId, payload: &[u8]) {
        let controller = self.info.controller_node_id;
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return;
        };
        let mut out = CcOutbox::default();
        node.apply_protocol_info(controller, payload, &mut out);
        self.apply_outbox(node_id, out, false);
    }

    /// Routes everything a node or class handler produced: notifications
    /// to the queue, frames to the send queues (counted against the
    /// interrogation stage when one is active), and wake-up events to the
    /// drain logic.
    fn apply_outbox(&mut self, node_id: NodeId, out: CcOutbox, count_stage_msgs: bool) {
        for notification in out.notifications {
            self.notify(notification);
        }

        for mut msg in out.msgs {
            if count_stage_msgs && msg.priority == QueuePriority::Query {
                msg.stage_query = true;
                if let Some(node) = self.nodes.get_mut(&node_id) {
                    node.stage_pending += 1;
                }
            }
            self.route_msg(msg);
        }

        for event in out.events {
            if matches!(event, zmesh_cc::prelude::CcEvent::WakeUpNotification) {
                self.handle_wakeup_notification(node_id);
            }
        }
    }

    /// Frames for a sleeping device park in its wake-up queue instead of
    /// the send queues. Controller-answered queries always go straight out.
    fn route_msg(&mut self, msg: Msg) {
        let needs_radio = matches!(
            msg.function,
            FunctionType::SendData | FunctionType::RequestNodeInfo
        );
        let sleeping = self
            .nodes
            .get(&msg.target_node)
            .map(|node| node.is_sleeping())
            .unwrap_or(false);

        if needs_radio && sleeping && !msg.wakeup_no_more_information {
            if let Some(node) = self.nodes.get_mut(&msg.target_node) {
                node.wakeup_queue.push(msg);
            }
        } else {
            self.queues.push(msg);
        }
    }

    fn handle_wakeup_notification(&mut self, node_id: NodeId) {
        let controller = self.info.controller_node_id;
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return;
        };
        node.awake = true;

        if node.poll_required {
            node.poll_required = false;
            let mut out = CcOutbox::default();
            node.request_dynamic(controller, &mut out);
            for msg in &mut out.msgs {
                msg.priority = QueuePriority::Poll;
            }
            self.apply_outbox(node_id, out, false);
        }

        let Some(node) = self.nodes.get_mut(&node_id) else {
            return;
        };
        let drained = node.wakeup_queue.drain();
        let count = drained.len();
        for mut msg in drained {
            // Drained traffic goes out ahead of new query and poll frames;
            // the move resets the retry budget
            msg.priority = QueuePriority::WakeUp;
            msg.send_attempts = 0;
            self.queues.push(msg);
        }
        self.driver_log.verbose(format!(
            "node {} woke up, moved {} queued frame(s)",
            node_id, count
        ));

        self.queues.push(WakeUp::no_more_information_msg(node_id));
    }

    // ---- interrogation pipeline ----

    /// Runs stages until one issues requests or the pipeline completes.
    fn advance_node_queries(&mut self, node_id: NodeId) {
        loop {
            let controller = self.info.controller_node_id;
            let home_id = self.info.home_id;
            let Some(node) = self.nodes.get_mut(&node_id) else {
                return;
            };
            if node.stage_pending > 0 || node.query_stage() == QueryStage::Complete {
                return;
            }

            let stage = node.query_stage();
            let mut out = CcOutbox::default();
            node.run_query_stage(controller, &mut out);
            let issued = out.msgs.len() as u32;
            node.stage_pending = issued;
            for msg in &mut out.msgs {
                msg.stage_query = true;
            }
            if issued > 0 {
                self.node_log.message(
                    node_id,
                    format!("query stage {} ({} request(s))", stage.label(), issued),
                );
            }
            self.apply_outbox(node_id, out, false);

            if issued > 0 {
                return;
            }
            let Some(node) = self.nodes.get_mut(&node_id) else {
                return;
            };
            if node.advance_stage() == QueryStage::Complete {
                self.notify(Notification::NodeQueriesComplete { home_id, node_id });
                self.check_query_milestones();
                return;
            }
        }
    }

    /// One interrogation request settled; advance the stage once they all
    /// have.
    fn on_stage_msg_settled(&mut self, node_id: NodeId) {
        let home_id = self.info.home_id;
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return;
        };
        node.stage_pending = node.stage_pending.saturating_sub(1);
        if node.stage_pending > 0 || node.query_stage() == QueryStage::Complete {
            return;
        }
        if node.advance_stage() == QueryStage::Complete {
            self.notify(Notification::NodeQueriesComplete { home_id, node_id });
            self.check_query_milestones();
        } else {
            self.advance_node_queries(node_id);
        }
    }

    fn check_query_milestones(&mut self) {
        let home_id = self.info.home_id;
        let awake_done = self
            .nodes
            .values()
            .filter(|node| node.listening)
            .all(|node| node.query_stage() == QueryStage::Complete);
        if awake_done && !self.awake_queried_emitted {
            self.awake_queried_emitted = true;
            self.notify(Notification::AwakeNodesQueried { home_id });
        }

        let all_done = self
            .nodes
            .values()
            .all(|node| node.query_stage() == QueryStage::Complete);
        if all_done && !self.all_queried_emitted {
            self.all_queried_emitted = true;
            self.notify(Notification::AllNodesQueried { home_id });
        }
    }

    /// Deletes every node record and re-enumerates from scratch. Triggered
    /// by a primary-role transfer or by consumer request.
    fn refresh_node_info(&mut self) {
        let home_id = self.info.home_id;
        self.driver_log.message("refreshing all node info");
        self.nodes.clear();
        self.queues.clear();
        self.awake_queried_emitted = false;
        self.all_queried_emitted = false;
        self.notify(Notification::DriverReset { home_id });
        self.queues.push(
            Msg::request(
                "GetSerialApiInitData",
                NodeId::BROADCAST,
                FunctionType::GetSerialApiInitData,
            )
            .with_priority(QueuePriority::Command)
            .expect_reply(FunctionType::GetSerialApiInitData),
        );
    }

    // ---- persistence ----

    fn load_config(&mut self) {
        let Some(dir) = self.options.config_dir.clone() else {
            return;
        };
        match storage::load_network(&dir, self.info.home_id) {
            Ok(Some(saved)) => {
                self.driver_log.message(format!(
                    "restored {} node(s) from config",
                    saved.nodes.len()
                ));
                self.info.poll_interval_ms = saved.info.poll_interval_ms;
                self.info.extra = saved.info.extra;
                self.saved_nodes = saved.nodes.into_iter().map(|n| (n.id, n)).collect();
            }
            Ok(None) => {}
            Err(e) => self.driver_log.error(format!("config load failed: {}", e)),
        }
    }

    fn write_config(&mut self) -> bool {
        let Some(dir) = self.options.config_dir.clone() else {
            return false;
        };
        if self.info.home_id == HomeId(0) {
            return false;
        }
        match storage::save_network(&dir, &self.info, &self.nodes) {
            Ok(path) => {
                self.driver_log
                    .message(format!("wrote config to {}", path.display()));
                true
            }
            Err(e) => {
                self.driver_log.error(format!("config save failed: {}", e));
                false
            }
        }
    }

    // ---- consumer commands ----

    fn handle_command(&mut self, cmd: DriverCommand) {
        match cmd {
            DriverCommand::SetValue {
                value_id,
                contents,
                reply,
            } => {
                let ok = self.do_set_value(value_id, contents);
                let _ = reply.send(ok);
            }

            DriverCommand::GetValue { value_id, reply } => {
                let contents = self
                    .nodes
                    .get(&value_id.node_id)
                    .and_then(|node| node.values.get(&value_id))
                    .map(|value| value.contents().clone());
                let _ = reply.send(contents);
            }

            DriverCommand::RefreshValue { value_id } => {
                let controller = self.info.controller_node_id;
                if let Some(node) = self.nodes.get_mut(&value_id.node_id) {
                    let mut out = CcOutbox::default();
                    node.request_value_refresh(value_id, controller, &mut out);
                    self.apply_outbox(value_id.node_id, out, false);
                }
            }

            DriverCommand::EnablePoll {
                value_id,
                intensity,
            } => {
                let known = self
                    .nodes
                    .get_mut(&value_id.node_id)
                    .and_then(|node| node.values.get_mut(&value_id))
                    .map(|value| value.poll_intensity = intensity)
                    .is_some();
                if known && self.poll_list.enable(value_id, intensity) {
                    self.notify(Notification::PollingEnabled { value_id });
                }
                self.poll_len.store(self.poll_list.len(), Ordering::Relaxed);
            }

            DriverCommand::DisablePoll { value_id } => {
                if let Some(value) = self
                    .nodes
                    .get_mut(&value_id.node_id)
                    .and_then(|node| node.values.get_mut(&value_id))
                {
                    value.poll_intensity = 0;
                }
                if self.poll_list.disable(&value_id) {
                    self.notify(Notification::PollingDisabled { value_id });
                }
                self.poll_len.store(self.poll_list.len(), Ordering::Relaxed);
            }

            DriverCommand::SetNodeName { node_id, name } => {
                let home_id = self.info.home_id;
                let controller = self.info.controller_node_id;
                let mut out = CcOutbox::default();
                let mut renamed = false;
                if let Some(node) = self.nodes.get_mut(&node_id) {
                    if node.name != name {
                        node.name = name.clone();
                        renamed = true;
                    }
                    if node.classes.contains_key(&CommandClassId::NODE_NAMING) {
                        node.with_cc_context(controller, &mut out, |ctx| {
                            NodeNaming::queue_name_set(ctx, &name);
                        });
                    }
                }
                if renamed {
                    self.notify(Notification::NodeNaming { home_id, node_id });
                }
                self.apply_outbox(node_id, out, false);
            }

            DriverCommand::SetNodeLocation { node_id, location } => {
                let home_id = self.info.home_id;
                let controller = self.info.controller_node_id;
                let mut out = CcOutbox::default();
                let mut moved = false;
                if let Some(node) = self.nodes.get_mut(&node_id) {
                    if node.location != location {
                        node.location = location.clone();
                        moved = true;
                    }
                    if node.classes.contains_key(&CommandClassId::NODE_NAMING) {
                        node.with_cc_context(controller, &mut out, |ctx| {
                            NodeNaming::queue_location_set(ctx, &location);
                        });
                    }
                }
                if moved {
                    self.notify(Notification::NodeNaming { home_id, node_id });
                }
                self.apply_outbox(node_id, out, false);
            }

            DriverCommand::RequestConfigParam { node_id, param } => {
                let controller = self.info.controller_node_id;
                if let Some(node) = self.nodes.get_mut(&node_id) {
                    let mut out = CcOutbox::default();
                    node.with_cc_context(controller, &mut out, |ctx| {
                        Configuration::queue_param_get(ctx, param);
                    });
                    self.apply_outbox(node_id, out, false);
                }
            }

            DriverCommand::SetConfigParam {
                node_id,
                param,
                value,
                size,
            } => {
                let controller = self.info.controller_node_id;
                if let Some(node) = self.nodes.get_mut(&node_id) {
                    let mut out = CcOutbox::default();
                    node.with_cc_context(controller, &mut out, |ctx| {
                        Configuration::queue_param_set(ctx, param, value, size);
                    });
                    self.apply_outbox(node_id, out, false);
                }
            }

            DriverCommand::BeginControllerCommand {
                kind,
                callback,
                high_power,
                target,
                reply,
            } => {
                if self.controller_cmd.is_some() {
                    let _ = reply.send(false);
                } else {
                    self.controller_log.message(format!("begin {:?}", kind));
                    let (runner, msg) =
                        ControllerCommandRunner::begin(kind, high_power, target, callback);
                    self.controller_cmd = Some(runner);
                    self.queues.push(msg);
                    let _ = reply.send(true);
                }
            }

            DriverCommand::CancelControllerCommand => {
                if let Some(mut runner) = self.controller_cmd.take() {
                    self.controller_log
                        .message(format!("cancel {:?}", runner.kind));
                    if let Some(stop) = runner.cancel_msg() {
                        self.queues.push(stop);
                    }
                    runner.notify(ControllerState::Normal);
                }
            }

            DriverCommand::RefreshNodeInfo => self.refresh_node_info(),

            DriverCommand::WriteConfig { reply } => {
                let ok = self.write_config();
                let _ = reply.send(ok);
            }

            DriverCommand::PollTick => self.handle_poll_tick(),

            DriverCommand::Shutdown => {
                self.write_config();
                self.shutdown = true;
            }
        }
    }

    fn do_set_value(&mut self, value_id: ValueId, contents: ValueContents) -> bool {
        let controller = self.info.controller_node_id;
        let Some(node) = self.nodes.get_mut(&value_id.node_id) else {
            return false;
        };
        let mut out = CcOutbox::default();
        let ok = node.set_value(value_id, contents, controller, &mut out);
        self.apply_outbox(value_id.node_id, out, false);
        ok
    }

    fn handle_poll_tick(&mut self) {
        let Some(value_id) = self.poll_list.tick() else {
            return;
        };
        let controller = self.info.controller_node_id;
        let Some(node) = self.nodes.get_mut(&value_id.node_id) else {
            self.poll_list.disable(&value_id);
            self.poll_len.store(self.poll_list.len(), Ordering::Relaxed);
            return;
        };
        if node.is_sleeping() {
            // Consumed on the next wake-up instead of going to the wire
            node.poll_required = true;
            return;
        }
        let mut out = CcOutbox::default();
        node.request_value_refresh(value_id, controller, &mut out);
        for msg in &mut out.msgs {
            msg.priority = QueuePriority::Poll;
        }
        self.apply_outbox(value_id.node_id, out, false);
    }
}
