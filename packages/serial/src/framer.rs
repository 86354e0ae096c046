use crate::frame::{SerialControlByte, SerialFrame};
use bytes::{Buf, BytesMut};

/// A frame handed out by the framer, together with the control byte the
/// framer wants written back to the wire for it.
///
/// Data frames with a valid checksum are acknowledged with ACK; frames whose
/// checksum does not verify are answered with NAK and recovered locally.
#[derive(Debug, Clone, PartialEq)]
pub struct FramerEvent {
    pub frame: SerialFrame,
    pub reply: Option<SerialControlByte>,
}

/// Push-parser turning raw byte chunks from the serial device into frames.
///
/// Both the real port binding and the in-memory test binding feed their
/// reads through this, so the ACK/NAK discipline is shared.
#[derive(Debug, Default)]
pub struct Framer {
    buf: BytesMut,
}

impl Framer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<FramerEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        loop {
            let (consumed, frame) = match SerialFrame::parse(&self.buf) {
                Ok((remaining, frame)) => (self.buf.len() - remaining.len(), frame),
                // Wait for more input; anything else cannot happen with a
                // streaming parser that skips garbage
                Err(_) => break,
            };
            self.buf.advance(consumed);

            let reply = match &frame {
                SerialFrame::Data(_) => Some(SerialControlByte::ACK),
                SerialFrame::Corrupt(_) => Some(SerialControlByte::NAK),
                _ => None,
            };
            events.push(FramerEvent { frame, reply });
        }
        events
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frame::DataFrame;

    #[test]
    fn reassembles_split_frames() {
        let mut framer = Framer::new();
        assert!(framer.push(&hex::decode("0103").unwrap()).is_empty());

        let events = framer.push(&hex::decode("0002fe").unwrap());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reply, Some(SerialControlByte::ACK));
        assert!(matches!(events[0].frame, SerialFrame::Data(_)));
    }

    #[test]
    fn acks_good_naks_bad() {
        let mut framer = Framer::new();

        let good = DataFrame {
            command_type: 0x01,
            function: 0x15,
            payload: b"test".to_vec(),
        }
        .to_bytes();
        let mut bad = good.clone();
        let last = bad.len() - 1;
        bad[last] ^= 0xa5;

        let events = framer.push(&good);
        assert_eq!(events[0].reply, Some(SerialControlByte::ACK));

        let events = framer.push(&bad);
        assert!(matches!(events[0].frame, SerialFrame::Corrupt(_)));
        assert_eq!(events[0].reply, Some(SerialControlByte::NAK));
    }

    #[test]
    fn control_bytes_get_no_reply() {
        let mut framer = Framer::new();
        let events = framer.push(&[0x06, 0x18, 0x15]);
        assert_eq!(
            events
                .iter()
                .map(|e| (e.frame.clone(), e.reply))
                .collect::<Vec<_>>(),
            vec![
                (SerialFrame::Ack, None),
                (SerialFrame::Can, None),
                (SerialFrame::Nak, None),
            ]
        );
    }

    #[test]
    fn garbage_is_skipped() {
        let mut framer = Framer::new();
        let events = framer.push(&hex::decode("07080906").unwrap());
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].frame, SerialFrame::Garbage(_)));
        assert_eq!(events[1].frame, SerialFrame::Ack);
    }
}
