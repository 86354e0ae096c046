use crate::cc_identity;
use crate::commandclass::{cc_msg, CcContext, CcResult, CcState, CommandClass};
use zmesh_core::prelude::*;
use zmesh_serial::msg::{Msg, QueuePriority};

/// No Operation has no subcommands; a bare frame of it is the canonical
/// reachability probe.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NoOperation {
    state: CcState,
}

impl NoOperation {
    /// The ping used to test whether a node answers at all.
    pub fn ping_msg(node_id: NodeId) -> Msg {
        cc_msg(
            "NoOperation ping",
            node_id,
            CommandClassId::NO_OPERATION,
            1,
            &[],
            QueuePriority::Send,
        )
    }
}

impl CommandClass for NoOperation {
    cc_identity!(
        CommandClassId::NO_OPERATION,
        "COMMAND_CLASS_NO_OPERATION"
    );

    fn handle_msg(&mut self, _payload: &[u8], _instance: u8, _ctx: &mut CcContext) -> CcResult {
        // Nothing to decode
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use zmesh_core::definitions::transmit_options;

    #[test]
    fn ping_body() {
        let msg = NoOperation::ping_msg(NodeId(12));
        assert_eq!(msg.payload(), &[12, 1, 0x00, transmit_options::DEFAULT]);
    }
}
