use std::collections::VecDeque;
use zmesh_core::definitions::NodeId;
use zmesh_serial::msg::{Msg, QueuePriority};

/// The driver's priority-ordered send queues. FIFO within a tier; the next
/// outbound frame is always the head of the highest non-empty tier.
#[derive(Debug, Default)]
pub struct SendQueues {
    tiers: [VecDeque<Msg>; QueuePriority::ALL.len()],
}

impl SendQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Msg) {
        self.tiers[msg.priority.index()].push_back(msg);
    }

    /// Puts a frame back at the head of its tier, ahead of everything else
    /// in it.
    pub fn push_front(&mut self, msg: Msg) {
        self.tiers[msg.priority.index()].push_front(msg);
    }

    pub fn pop_next(&mut self) -> Option<Msg> {
        self.tiers.iter_mut().find_map(|tier| tier.pop_front())
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(|tier| tier.is_empty())
    }

    pub fn len(&self) -> usize {
        self.tiers.iter().map(|tier| tier.len()).sum()
    }

    pub fn clear(&mut self) {
        for tier in &mut self.tiers {
            tier.clear();
        }
    }

    /// Removes every queued frame addressed to the given node, preserving
    /// tier order, for wake-up re-routing.
    pub fn remove_for_node(&mut self, node_id: NodeId) -> Vec<Msg> {
        let mut removed = Vec::new();
        for tier in &mut self.tiers {
            let mut keep = VecDeque::with_capacity(tier.len());
            while let Some(msg) = tier.pop_front() {
                if msg.target_node == node_id {
                    removed.push(msg);
                } else {
                    keep.push_back(msg);
                }
            }
            *tier = keep;
        }
        removed
    }
}

/// Frames parked for a sleeping node until it announces itself.
#[derive(Debug, Default)]
pub struct WakeUpQueue {
    frames: VecDeque<Msg>,
}

impl WakeUpQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a frame, removing any prior frame with a byte-identical
    /// payload first so the newest copy sits at the tail. This keeps the
    /// queue of a rarely waking device from accumulating stale requests
    /// while preserving the order of distinct activity.
    pub fn push(&mut self, msg: Msg) {
        self.frames.retain(|queued| !queued.payload_matches(&msg));
        self.frames.push_back(msg);
    }

    pub fn drain(&mut self) -> Vec<Msg> {
        self.frames.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use zmesh_core::definitions::FunctionType;

    fn msg(priority: QueuePriority, node: u8, byte: u8) -> Msg {
        let mut msg = Msg::request("test", NodeId(node), FunctionType::SendData)
            .with_priority(priority);
        msg.push(byte);
        msg
    }

    #[test]
    fn highest_tier_first_fifo_within() {
        let mut queues = SendQueues::new();
        queues.push(msg(QueuePriority::Query, 1, 1));
        queues.push(msg(QueuePriority::Send, 1, 2));
        queues.push(msg(QueuePriority::Send, 1, 3));
        queues.push(msg(QueuePriority::Command, 1, 4));

        let order: Vec<u8> = std::iter::from_fn(|| queues.pop_next())
            .map(|m| m.payload()[0])
            .collect();
        assert_eq!(order, vec![4, 2, 3, 1]);
    }

    #[test]
    fn remove_for_node_keeps_others() {
        let mut queues = SendQueues::new();
        queues.push(msg(QueuePriority::Send, 7, 1));
        queues.push(msg(QueuePriority::Send, 8, 2));
        queues.push(msg(QueuePriority::Query, 7, 3));

        let removed = queues.remove_for_node(NodeId(7));
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].payload()[0], 1);
        assert_eq!(removed[1].payload()[0], 3);
        assert_eq!(queues.len(), 1);
    }

    #[test]
    fn wakeup_queue_suppresses_duplicates() {
        let mut queue = WakeUpQueue::new();
        queue.push(msg(QueuePriority::Send, 9, 1));
        queue.push(msg(QueuePriority::Send, 9, 2));
        // Identical payload to the first frame: the old copy goes away and
        // the new one becomes the tail
        queue.push(msg(QueuePriority::Send, 9, 1));

        assert_eq!(queue.len(), 2);
        let drained = queue.drain();
        assert_eq!(drained[0].payload()[0], 2);
        assert_eq!(drained[1].payload()[0], 1);
    }

    #[test]
    fn wakeup_queue_preserves_order() {
        let mut queue = WakeUpQueue::new();
        for byte in 1..=4 {
            queue.push(msg(QueuePriority::Send, 9, byte));
        }
        let drained: Vec<u8> = queue.drain().iter().map(|m| m.payload()[0]).collect();
        assert_eq!(drained, vec![1, 2, 3, 4]);
    }
}
