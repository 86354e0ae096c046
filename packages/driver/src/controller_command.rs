use zmesh_core::definitions::{FunctionType, NodeId};
use zmesh_serial::msg::{Msg, QueuePriority};

/// The controller-management operations a consumer can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerCommandKind {
    AddDevice,
    AddController,
    RemoveDevice,
    RemoveController,
    ReceiveConfiguration,
    CreateNewPrimary,
    TransferPrimaryRole,
    HasNodeFailed,
    MarkNodeAsFailed,
    ReplaceFailedNode,
}

/// Progress reported through the command's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Normal,
    Waiting,
    InProgress,
    Completed,
    Failed,
    NodeOk,
    NodeFailed,
}

pub type ControllerCallback = Box<dyn FnMut(ControllerState) + Send>;

pub mod add_node {
    pub const ANY: u8 = 0x01;
    pub const CONTROLLER: u8 = 0x02;
    pub const STOP: u8 = 0x05;
    pub const OPTION_HIGH_POWER: u8 = 0x80;

    pub const STATUS_LEARN_READY: u8 = 0x01;
    pub const STATUS_NODE_FOUND: u8 = 0x02;
    pub const STATUS_ADDING_SLAVE: u8 = 0x03;
    pub const STATUS_ADDING_CONTROLLER: u8 = 0x04;
    pub const STATUS_PROTOCOL_DONE: u8 = 0x05;
    pub const STATUS_DONE: u8 = 0x06;
    pub const STATUS_FAILED: u8 = 0x07;
}

pub mod remove_node {
    pub const ANY: u8 = 0x01;
    pub const STOP: u8 = 0x05;
    pub const OPTION_HIGH_POWER: u8 = 0x80;

    pub const STATUS_LEARN_READY: u8 = 0x01;
    pub const STATUS_NODE_FOUND: u8 = 0x02;
    pub const STATUS_REMOVING_SLAVE: u8 = 0x03;
    pub const STATUS_REMOVING_CONTROLLER: u8 = 0x04;
    pub const STATUS_DONE: u8 = 0x06;
    pub const STATUS_FAILED: u8 = 0x07;
}

pub mod learn_mode {
    pub const START: u8 = 0xff;
    pub const STOP: u8 = 0x00;

    pub const STATUS_STARTED: u8 = 0x01;
    pub const STATUS_DONE: u8 = 0x06;
    pub const STATUS_FAILED: u8 = 0x07;
}

pub mod controller_change {
    pub const START: u8 = 0x02;
    pub const STOP: u8 = 0x05;
}

pub mod create_primary {
    pub const START: u8 = 0x02;
    pub const STOP: u8 = 0x05;
}

pub mod failed_node {
    /// The "failed" node answered, so the command cannot proceed
    pub const OK: u8 = 0x00;
    pub const REMOVED: u8 = 0x01;
    pub const NOT_REMOVED: u8 = 0x02;
    pub const REPLACE_WAITING: u8 = 0x03;
    pub const REPLACE_DONE: u8 = 0x04;
    pub const REPLACE_FAILED: u8 = 0x05;
}

/// Where a multi-step command currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Starting,
    LearnReady,
    Working,
    Stopping,
    Done,
}

/// What the FSM wants the driver to do after consuming an input.
#[derive(Debug)]
pub enum CtrlEffect {
    Notify(ControllerState),
    Send(Msg),
    /// Interrogate a node that was just added or replaced
    RequestNodeInfo(NodeId),
    /// Drop a node that left the network
    ForgetNode(NodeId),
    /// Re-enumerate everything after a role change
    RefreshAllNodes,
    /// The command is finished; discard the runner
    Finished,
}

/// A running controller command: a short FSM driven by REQUEST callbacks
/// carrying status bytes.
pub struct ControllerCommandRunner {
    pub kind: ControllerCommandKind,
    phase: Phase,
    pub target: Option<NodeId>,
    adding_controller: bool,
    callback: Option<ControllerCallback>,
}

fn command_msg(function: FunctionType, bytes: &[u8], callback: bool) -> Msg {
    let mut msg = Msg::request("controller command", NodeId::BROADCAST, function)
        .with_priority(QueuePriority::Command)
        .expect_reply(function);
    if callback {
        msg = msg.with_callback();
    }
    for b in bytes {
        msg.push(*b);
    }
    msg
}

impl ControllerCommandRunner {
    /// Builds the runner and the frame that starts the command.
    pub fn begin(
        kind: ControllerCommandKind,
        high_power: bool,
        target: Option<NodeId>,
        callback: Option<ControllerCallback>,
    ) -> (Self, Msg) {
        use ControllerCommandKind::*;

        let hp = |base: u8| {
            if high_power {
                base | add_node::OPTION_HIGH_POWER
            } else {
                base
            }
        };

        let msg = match kind {
            AddDevice => command_msg(
                FunctionType::AddNodeToNetwork,
                &[hp(add_node::ANY)],
                true,
            ),
            AddController => command_msg(
                FunctionType::AddNodeToNetwork,
                &[hp(add_node::CONTROLLER)],
                true,
            ),
            RemoveDevice | RemoveController => command_msg(
                FunctionType::RemoveNodeFromNetwork,
                &[hp(remove_node::ANY)],
                true,
            ),
            ReceiveConfiguration => command_msg(
                FunctionType::SetLearnMode,
                &[learn_mode::START],
                true,
            ),
            CreateNewPrimary => command_msg(
                FunctionType::CreateNewPrimary,
                &[create_primary::START],
                true,
            ),
            TransferPrimaryRole => command_msg(
                FunctionType::ControllerChange,
                &[controller_change::START],
                true,
            ),
            HasNodeFailed => {
                let mut msg = command_msg(FunctionType::IsFailedNode, &[], false);
                msg.push(target.map(|n| n.0).unwrap_or(0));
                msg
            }
            MarkNodeAsFailed => {
                let mut msg = command_msg(FunctionType::RemoveFailedNode, &[], true);
                msg.push(target.map(|n| n.0).unwrap_or(0));
                msg
            }
            ReplaceFailedNode => {
                let mut msg = command_msg(FunctionType::ReplaceFailedNode, &[], true);
                msg.push(target.map(|n| n.0).unwrap_or(0));
                msg
            }
        };

        (
            Self {
                kind,
                phase: Phase::Starting,
                target,
                adding_controller: false,
                callback,
            },
            msg,
        )
    }

    /// The frame that aborts this command, for CancelControllerCommand.
    pub fn cancel_msg(&self) -> Option<Msg> {
        use ControllerCommandKind::*;
        let msg = match self.kind {
            AddDevice | AddController => command_msg(
                FunctionType::AddNodeToNetwork,
                &[add_node::STOP],
                true,
            ),
            RemoveDevice | RemoveController => command_msg(
                FunctionType::RemoveNodeFromNetwork,
                &[remove_node::STOP],
                true,
            ),
            ReceiveConfiguration => {
                command_msg(FunctionType::SetLearnMode, &[learn_mode::STOP], false)
            }
            CreateNewPrimary => command_msg(
                FunctionType::CreateNewPrimary,
                &[create_primary::STOP],
                true,
            ),
            TransferPrimaryRole => command_msg(
                FunctionType::ControllerChange,
                &[controller_change::STOP],
                true,
            ),
            // The synchronous commands have nothing in flight to stop
            HasNodeFailed | MarkNodeAsFailed | ReplaceFailedNode => return None,
        };
        Some(msg)
    }

    pub fn notify(&mut self, state: ControllerState) {
        if let Some(callback) = self.callback.as_mut() {
            callback(state);
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Feeds a RESPONSE byte of the synchronous failed-node commands.
    pub fn on_response(&mut self, function: FunctionType, status: u8) -> Vec<CtrlEffect> {
        use ControllerCommandKind::*;
        let mut effects = Vec::new();
        match (self.kind, function) {
            (HasNodeFailed, FunctionType::IsFailedNode) => {
                effects.push(CtrlEffect::Notify(if status != 0 {
                    ControllerState::NodeFailed
                } else {
                    ControllerState::NodeOk
                }));
                self.phase = Phase::Done;
                effects.push(CtrlEffect::Finished);
            }
            (MarkNodeAsFailed, FunctionType::RemoveFailedNode) => {
                if status == 0 {
                    // Removal started; the callback request will confirm
                    effects.push(CtrlEffect::Notify(ControllerState::Completed));
                } else {
                    effects.push(CtrlEffect::Notify(ControllerState::Failed));
                    self.phase = Phase::Done;
                    effects.push(CtrlEffect::Finished);
                }
            }
            (ReplaceFailedNode, FunctionType::ReplaceFailedNode) => {
                if status == 0 {
                    effects.push(CtrlEffect::Notify(ControllerState::Waiting));
                } else {
                    effects.push(CtrlEffect::Notify(ControllerState::Failed));
                    self.phase = Phase::Done;
                    effects.push(CtrlEffect::Finished);
                }
            }
            _ => {}
        }
        effects
    }

    /// Feeds a REQUEST callback: `status` is the controller's progress
    /// byte, `node` the subject node when the status carries one.
    pub fn on_request(
        &mut self,
        function: FunctionType,
        status: u8,
        node: Option<NodeId>,
    ) -> Vec<CtrlEffect> {
        use ControllerCommandKind::*;
        match (self.kind, function) {
            (AddDevice | AddController, FunctionType::AddNodeToNetwork) => {
                self.on_add_status(status, node)
            }
            (RemoveDevice | RemoveController, FunctionType::RemoveNodeFromNetwork) => {
                self.on_remove_status(status, node)
            }
            (ReceiveConfiguration, FunctionType::SetLearnMode)
            | (CreateNewPrimary, FunctionType::CreateNewPrimary)
            | (TransferPrimaryRole, FunctionType::ControllerChange) => {
                self.on_learn_status(status)
            }
            (MarkNodeAsFailed, FunctionType::RemoveFailedNode) => {
                self.on_mark_failed_status(status)
            }
            (ReplaceFailedNode, FunctionType::ReplaceFailedNode) => {
                self.on_replace_status(status)
            }
            _ => Vec::new(),
        }
    }

    fn on_add_status(&mut self, status: u8, node: Option<NodeId>) -> Vec<CtrlEffect> {
        use add_node::*;
        let mut effects = Vec::new();
        match status {
            STATUS_LEARN_READY => {
                self.phase = Phase::LearnReady;
                effects.push(CtrlEffect::Notify(ControllerState::Waiting));
            }
            STATUS_NODE_FOUND => {
                self.phase = Phase::Working;
                effects.push(CtrlEffect::Notify(ControllerState::InProgress));
            }
            STATUS_ADDING_SLAVE => {
                self.adding_controller = false;
                self.target = node.filter(|n| n.is_valid());
            }
            STATUS_ADDING_CONTROLLER => {
                self.adding_controller = true;
                self.target = node.filter(|n| n.is_valid());
            }
            STATUS_PROTOCOL_DONE => {
                // Without replication support there is nothing to copy to a
                // new controller; stop straight away
                self.phase = Phase::Stopping;
                effects.push(CtrlEffect::Send(command_msg(
                    FunctionType::AddNodeToNetwork,
                    &[STOP],
                    true,
                )));
            }
            STATUS_DONE => {
                self.phase = Phase::Done;
                if let Some(target) = self.target {
                    effects.push(CtrlEffect::RequestNodeInfo(target));
                }
                effects.push(CtrlEffect::Notify(ControllerState::Completed));
                effects.push(CtrlEffect::Finished);
            }
            STATUS_FAILED => {
                self.phase = Phase::Done;
                effects.push(CtrlEffect::Send(command_msg(
                    FunctionType::AddNodeToNetwork,
                    &[STOP],
                    true,
                )));
                effects.push(CtrlEffect::Notify(ControllerState::Failed));
                effects.push(CtrlEffect::Finished);
            }
            _ => {}
        }
        effects
    }

    fn on_remove_status(&mut self, status: u8, node: Option<NodeId>) -> Vec<CtrlEffect> {
        use remove_node::*;
        let mut effects = Vec::new();
        match status {
            STATUS_LEARN_READY => {
                self.phase = Phase::LearnReady;
                effects.push(CtrlEffect::Notify(ControllerState::Waiting));
            }
            STATUS_NODE_FOUND => {
                self.phase = Phase::Working;
                effects.push(CtrlEffect::Notify(ControllerState::InProgress));
            }
            STATUS_REMOVING_SLAVE | STATUS_REMOVING_CONTROLLER => {
                self.target = node.filter(|n| n.is_valid());
            }
            STATUS_DONE => {
                self.phase = Phase::Done;
                effects.push(CtrlEffect::Send(command_msg(
                    FunctionType::RemoveNodeFromNetwork,
                    &[STOP],
                    true,
                )));
                if let Some(target) = self.target {
                    effects.push(CtrlEffect::ForgetNode(target));
                }
                effects.push(CtrlEffect::Notify(ControllerState::Completed));
                effects.push(CtrlEffect::Finished);
            }
            STATUS_FAILED => {
                self.phase = Phase::Done;
                effects.push(CtrlEffect::Send(command_msg(
                    FunctionType::RemoveNodeFromNetwork,
                    &[STOP],
                    true,
                )));
                effects.push(CtrlEffect::Notify(ControllerState::Failed));
                effects.push(CtrlEffect::Finished);
            }
            _ => {}
        }
        effects
    }

    fn on_learn_status(&mut self, status: u8) -> Vec<CtrlEffect> {
        use learn_mode::*;
        let mut effects = Vec::new();
        match status {
            STATUS_STARTED => {
                self.phase = Phase::Working;
                effects.push(CtrlEffect::Notify(ControllerState::Waiting));
            }
            STATUS_DONE => {
                self.phase = Phase::Done;
                effects.push(CtrlEffect::Notify(ControllerState::Completed));
                // The network may look completely different now
                effects.push(CtrlEffect::RefreshAllNodes);
                effects.push(CtrlEffect::Finished);
            }
            STATUS_FAILED => {
                self.phase = Phase::Done;
                effects.push(CtrlEffect::Notify(ControllerState::Failed));
                effects.push(CtrlEffect::RefreshAllNodes);
                effects.push(CtrlEffect::Finished);
            }
            _ => {}
        }
        effects
    }

    fn on_mark_failed_status(&mut self, status: u8) -> Vec<CtrlEffect> {
        use failed_node::*;
        let mut effects = Vec::new();
        match status {
            REMOVED => {
                self.phase = Phase::Done;
                if let Some(target) = self.target {
                    effects.push(CtrlEffect::ForgetNode(target));
                }
                effects.push(CtrlEffect::Notify(ControllerState::Completed));
                effects.push(CtrlEffect::Finished);
            }
            OK | NOT_REMOVED => {
                self.phase = Phase::Done;
                effects.push(CtrlEffect::Notify(if status == OK {
                    ControllerState::NodeOk
                } else {
                    ControllerState::Failed
                }));
                effects.push(CtrlEffect::Finished);
            }
            _ => {}
        }
        effects
    }

    fn on_replace_status(&mut self, status: u8) -> Vec<CtrlEffect> {
        use failed_node::*;
        let mut effects = Vec::new();
        match status {
            REPLACE_WAITING => {
                self.phase = Phase::Working;
                effects.push(CtrlEffect::Notify(ControllerState::Waiting));
            }
            REPLACE_DONE => {
                self.phase = Phase::Done;
                if let Some(target) = self.target {
                    effects.push(CtrlEffect::RequestNodeInfo(target));
                }
                effects.push(CtrlEffect::Notify(ControllerState::Completed));
                effects.push(CtrlEffect::Finished);
            }
            REPLACE_FAILED => {
                self.phase = Phase::Done;
                effects.push(CtrlEffect::Notify(ControllerState::Failed));
                effects.push(CtrlEffect::Finished);
            }
            _ => {}
        }
        effects
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_callback() -> (ControllerCallback, Arc<Mutex<Vec<ControllerState>>>) {
        let states = Arc::new(Mutex::new(Vec::new()));
        let clone = states.clone();
        let callback: ControllerCallback = Box::new(move |state| {
            clone.lock().unwrap().push(state);
        });
        (callback, states)
    }

    #[test]
    fn add_device_walks_the_table() {
        let (callback, states) = recording_callback();
        let (mut runner, start) = ControllerCommandRunner::begin(
            ControllerCommandKind::AddDevice,
            true,
            None,
            Some(callback),
        );
        assert_eq!(
            start.payload(),
            &[add_node::ANY | add_node::OPTION_HIGH_POWER]
        );

        for effect in runner.on_request(
            FunctionType::AddNodeToNetwork,
            add_node::STATUS_LEARN_READY,
            None,
        ) {
            if let CtrlEffect::Notify(state) = effect {
                runner.notify(state);
            }
        }
        for effect in runner.on_request(
            FunctionType::AddNodeToNetwork,
            add_node::STATUS_NODE_FOUND,
            None,
        ) {
            if let CtrlEffect::Notify(state) = effect {
                runner.notify(state);
            }
        }
        runner.on_request(
            FunctionType::AddNodeToNetwork,
            add_node::STATUS_ADDING_SLAVE,
            Some(NodeId(12)),
        );

        let effects = runner.on_request(
            FunctionType::AddNodeToNetwork,
            add_node::STATUS_PROTOCOL_DONE,
            None,
        );
        assert!(matches!(effects[0], CtrlEffect::Send(_)));

        let effects = runner.on_request(
            FunctionType::AddNodeToNetwork,
            add_node::STATUS_DONE,
            None,
        );
        assert!(matches!(
            effects[0],
            CtrlEffect::RequestNodeInfo(NodeId(12))
        ));
        for effect in effects {
            if let CtrlEffect::Notify(state) = effect {
                runner.notify(state);
            }
        }
        assert!(runner.is_done());
        assert_eq!(
            *states.lock().unwrap(),
            vec![
                ControllerState::Waiting,
                ControllerState::InProgress,
                ControllerState::Completed
            ]
        );
    }

    #[test]
    fn failed_status_stops_and_fails() {
        let (mut runner, _) = ControllerCommandRunner::begin(
            ControllerCommandKind::AddDevice,
            false,
            None,
            None,
        );
        let effects = runner.on_request(
            FunctionType::AddNodeToNetwork,
            add_node::STATUS_FAILED,
            None,
        );
        assert!(matches!(effects[0], CtrlEffect::Send(_)));
        assert!(matches!(effects[1], CtrlEffect::Notify(ControllerState::Failed)));
        assert!(runner.is_done());
    }

    #[test]
    fn transfer_primary_triggers_refresh() {
        let (mut runner, start) = ControllerCommandRunner::begin(
            ControllerCommandKind::TransferPrimaryRole,
            false,
            None,
            None,
        );
        assert_eq!(start.payload(), &[controller_change::START]);

        runner.on_request(FunctionType::ControllerChange, learn_mode::STATUS_STARTED, None);
        let effects =
            runner.on_request(FunctionType::ControllerChange, learn_mode::STATUS_DONE, None);
        assert!(effects
            .iter()
            .any(|e| matches!(e, CtrlEffect::RefreshAllNodes)));
    }

    #[test]
    fn has_node_failed_is_synchronous() {
        let (mut runner, start) = ControllerCommandRunner::begin(
            ControllerCommandKind::HasNodeFailed,
            false,
            Some(NodeId(5)),
            None,
        );
        assert_eq!(start.payload(), &[5]);

        let effects = runner.on_response(FunctionType::IsFailedNode, 1);
        assert!(matches!(
            effects[0],
            CtrlEffect::Notify(ControllerState::NodeFailed)
        ));
        assert!(runner.is_done());
    }

    #[test]
    fn cancel_sends_the_right_stop() {
        let (runner, _) = ControllerCommandRunner::begin(
            ControllerCommandKind::RemoveDevice,
            false,
            None,
            None,
        );
        let stop = runner.cancel_msg().unwrap();
        assert_eq!(stop.function, FunctionType::RemoveNodeFromNetwork);
        assert_eq!(stop.payload(), &[remove_node::STOP]);
    }
}
