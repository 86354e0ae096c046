use std::time::{Duration, Instant};
use zmesh_core::definitions::{CommandClassId, FunctionType, NodeId};
use zmesh_serial::msg::Msg;

/// Hands out the callback ids that tag asynchronous requests so their
/// completion callbacks can be told apart. The wire reserves 0 for "no
/// callback", so ids run 1..=255 and wrap. With one frame in flight at a
/// time, wrapping after 255 transactions can never collide with a live id.
#[derive(Debug, Default)]
pub struct CallbackIds {
    last: u8,
}

impl CallbackIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id for the next frame put in flight.
    pub fn next(&mut self) -> u8 {
        self.last = match self.last {
            u8::MAX => 1,
            id => id + 1,
        };
        self.last
    }
}

/// The matchers armed while one frame is in flight. A transaction completes
/// only when every still-armed matcher has been satisfied; until then no
/// other frame is written.
#[derive(Debug)]
pub struct Transaction {
    pub msg: Msg,
    expecting_ack: bool,
    expected_reply: Option<FunctionType>,
    expected_callback_id: Option<u8>,
    expected_command_class: Option<CommandClassId>,
    pub deadline: Instant,
}

impl Transaction {
    pub fn arm(msg: Msg, timeout: Duration) -> Self {
        Self {
            expecting_ack: true,
            expected_reply: msg.expected_reply,
            expected_callback_id: if msg.needs_callback_id {
                msg.callback_id
            } else {
                None
            },
            expected_command_class: msg.expected_command_class,
            deadline: Instant::now() + timeout,
            msg,
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.expecting_ack
            && self.expected_reply.is_none()
            && self.expected_callback_id.is_none()
    }

    pub fn expecting_ack(&self) -> bool {
        self.expecting_ack
    }

    pub fn on_ack(&mut self) {
        self.expecting_ack = false;
    }

    /// Offers a RESPONSE frame's opcode. Returns whether it satisfied the
    /// reply matcher. Responses never carry a command class, so a reply
    /// that must match one is not satisfied here.
    pub fn match_response(&mut self, function: FunctionType) -> bool {
        if self.expected_command_class.is_some() {
            return false;
        }
        if self.expected_reply == Some(function) {
            self.expected_reply = None;
            true
        } else {
            false
        }
    }

    /// Offers a REQUEST frame echoing this transaction's opcode with a
    /// callback id.
    pub fn match_callback(&mut self, function: FunctionType, callback_id: u8) -> bool {
        if self.msg.function != function {
            return false;
        }
        if self.expected_callback_id == Some(callback_id) {
            self.expected_callback_id = None;
            // A callback satisfies an expected reply of the same opcode
            if self.expected_reply == Some(function) {
                self.expected_reply = None;
            }
            true
        } else {
            false
        }
    }

    /// Offers an ApplicationCommand frame from `source` carrying class
    /// `cc`.
    pub fn match_application_command(&mut self, source: NodeId, cc: CommandClassId) -> bool {
        if self.expected_reply != Some(FunctionType::ApplicationCommand) {
            return false;
        }
        if self.msg.target_node != source {
            return false;
        }
        if self.expected_command_class != Some(cc) {
            return false;
        }
        self.expected_reply = None;
        self.expected_command_class = None;
        true
    }

    /// Offers a REQUEST frame with the given opcode (no callback id), e.g.
    /// ApplicationUpdate completing a RequestNodeInfo.
    pub fn match_request(&mut self, function: FunctionType) -> bool {
        if self.expected_command_class.is_some() {
            return false;
        }
        if self.expected_reply == Some(function) {
            self.expected_reply = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn callback_ids_skip_zero_on_wrap() {
        let mut ids = CallbackIds::new();
        assert_eq!(ids.next(), 1);
        for _ in 0..253 {
            ids.next();
        }
        assert_eq!(ids.next(), 255);
        // 0 means "no callback" on the wire and is never handed out
        assert_eq!(ids.next(), 1);
    }

    fn send_data_get() -> Msg {
        let mut msg = Msg::request("get", NodeId(7), FunctionType::SendData)
            .expect_reply(FunctionType::ApplicationCommand)
            .expect_command_class(CommandClassId::SWITCH_BINARY)
            .with_callback();
        msg.callback_id = Some(0x0a);
        msg
    }

    #[test]
    fn get_completes_after_ack_callback_and_report() {
        let mut txn = Transaction::arm(send_data_get(), Duration::from_secs(5));
        assert!(!txn.is_complete());

        txn.on_ack();
        assert!(!txn.is_complete());

        // The SendData callback clears the callback matcher only
        assert!(txn.match_callback(FunctionType::SendData, 0x0a));
        assert!(!txn.is_complete());

        // A report from the wrong node or class does not match
        assert!(!txn.match_application_command(NodeId(8), CommandClassId::SWITCH_BINARY));
        assert!(!txn.match_application_command(NodeId(7), CommandClassId::BASIC));

        assert!(txn.match_application_command(NodeId(7), CommandClassId::SWITCH_BINARY));
        assert!(txn.is_complete());
    }

    #[test]
    fn wrong_callback_id_does_not_match() {
        let mut txn = Transaction::arm(send_data_get(), Duration::from_secs(5));
        txn.on_ack();
        assert!(!txn.match_callback(FunctionType::SendData, 0x0b));
    }

    #[test]
    fn plain_query_completes_on_response() {
        let msg = Msg::request("version", NodeId::BROADCAST, FunctionType::GetControllerVersion)
            .expect_reply(FunctionType::GetControllerVersion);
        let mut txn = Transaction::arm(msg, Duration::from_secs(5));
        txn.on_ack();
        assert!(txn.match_response(FunctionType::GetControllerVersion));
        assert!(txn.is_complete());
    }
}
