use crate::frame::DataFrame;
use zmesh_core::definitions::{CommandClassId, CommandType, FunctionType, NodeId};

/// Send tier of an outbound frame. Lower tiers are drained first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueuePriority {
    /// Controller management and other traffic that must not wait
    Command,
    /// Frames for a sleeping node while it is awake
    WakeUp,
    /// Normal application traffic (Set, explicit Get)
    Send,
    /// Background interrogation of a node's state
    Query,
    /// Periodic state refresh
    Poll,
}

impl QueuePriority {
    pub const ALL: [QueuePriority; 5] = [
        QueuePriority::Command,
        QueuePriority::WakeUp,
        QueuePriority::Send,
        QueuePriority::Query,
        QueuePriority::Poll,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// An outbound frame together with its routing metadata: where it goes,
/// what must come back for the transaction to complete, and which tier it
/// queues in.
///
/// The driver's send queues own a Msg until it is either completed or moved
/// to a node's wake-up queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Msg {
    pub description: &'static str,
    pub target_node: NodeId,
    pub function: FunctionType,
    payload: Vec<u8>,
    pub priority: QueuePriority,
    /// Opcode the peer must echo for the transaction to complete
    pub expected_reply: Option<FunctionType>,
    /// Required command class of an ApplicationCommand reply
    pub expected_command_class: Option<CommandClassId>,
    /// Whether a callback id is appended at transmit time
    pub needs_callback_id: bool,
    pub callback_id: Option<u8>,
    pub send_attempts: u8,
    /// Marks the frame that puts a sleeping node back to sleep; such frames
    /// are dropped rather than moved during wake-up re-routing.
    pub wakeup_no_more_information: bool,
    /// Set by the driver on interrogation requests so their completion can
    /// gate the node's query-stage advance.
    pub stage_query: bool,
}

impl Msg {
    pub fn request(description: &'static str, target_node: NodeId, function: FunctionType) -> Self {
        Self {
            description,
            target_node,
            function,
            payload: Vec::new(),
            priority: QueuePriority::Send,
            expected_reply: None,
            expected_command_class: None,
            needs_callback_id: false,
            callback_id: None,
            send_attempts: 0,
            wakeup_no_more_information: false,
            stage_query: false,
        }
    }

    pub fn with_priority(mut self, priority: QueuePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn expect_reply(mut self, function: FunctionType) -> Self {
        self.expected_reply = Some(function);
        self
    }

    pub fn expect_command_class(mut self, cc: CommandClassId) -> Self {
        self.expected_command_class = Some(cc);
        self
    }

    pub fn with_callback(mut self) -> Self {
        self.needs_callback_id = true;
        self
    }

    pub fn mark_wakeup_no_more_information(mut self) -> Self {
        self.wakeup_no_more_information = true;
        self
    }

    pub fn push(&mut self, byte: u8) {
        self.payload.push(byte);
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.payload.extend_from_slice(bytes);
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Two frames are considered duplicates for wake-up queue suppression
    /// when their on-wire bodies are byte-identical.
    pub fn payload_matches(&self, other: &Msg) -> bool {
        self.target_node == other.target_node
            && self.function == other.function
            && self.payload == other.payload
    }

    /// Builds the wire frame, appending the assigned callback id when one is
    /// required. Assigning the id is the transaction engine's job.
    pub fn frame(&self) -> DataFrame {
        let mut payload = self.payload.clone();
        if self.needs_callback_id {
            payload.push(self.callback_id.unwrap_or(0));
        }
        DataFrame::new(CommandType::Request, self.function, payload)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use zmesh_core::definitions::transmit_options;

    #[test]
    fn priorities_are_ordered() {
        assert!(QueuePriority::Command < QueuePriority::WakeUp);
        assert!(QueuePriority::WakeUp < QueuePriority::Send);
        assert!(QueuePriority::Send < QueuePriority::Query);
        assert!(QueuePriority::Query < QueuePriority::Poll);
        assert_eq!(QueuePriority::Command.index(), 0);
    }

    #[test]
    fn callback_id_is_appended_last() {
        let mut msg = Msg::request("Switch set", NodeId(7), FunctionType::SendData)
            .expect_reply(FunctionType::SendData)
            .with_callback();
        msg.extend(&[7, 3, 0x25, 0x01, 0xff, transmit_options::DEFAULT]);
        msg.callback_id = Some(0x21);

        let frame = msg.frame();
        assert_eq!(
            frame.payload,
            vec![7, 3, 0x25, 0x01, 0xff, transmit_options::DEFAULT, 0x21]
        );
    }

    #[test]
    fn duplicate_detection_ignores_metadata() {
        let mut a = Msg::request("a", NodeId(9), FunctionType::SendData).with_callback();
        a.extend(&[9, 3, 0x25, 0x01, 0xff]);
        let mut b = Msg::request("b", NodeId(9), FunctionType::SendData);
        b.extend(&[9, 3, 0x25, 0x01, 0xff]);
        b.callback_id = Some(5);
        assert!(a.payload_matches(&b));

        let mut c = Msg::request("c", NodeId(9), FunctionType::SendData);
        c.extend(&[9, 3, 0x25, 0x01, 0x00]);
        assert!(!a.payload_matches(&c));
    }
}
