use crate::binding::{FrameListener, OpenPortBinding, PortBinding};
use crate::error::{Error, Result};
use crate::frame::{DataFrame, SerialFrame};
use crate::framer::Framer;
use crossbeam_channel::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// In-memory stand-in for the serial port. The test side plays the
/// controller: it injects raw bytes and observes every frame the driver
/// writes, including the automatic ACK/NAK replies of the framer.
pub struct MockBinding {
    inject_rx: Receiver<Vec<u8>>,
    written_tx: Sender<SerialFrame>,
}

/// The controller end of a mock link, held by the test.
pub struct MockRemote {
    inject_tx: Sender<Vec<u8>>,
    written_rx: Receiver<SerialFrame>,
}

/// Creates a connected (driver-side, controller-side) pair.
pub fn mock_pair() -> (MockBinding, MockRemote) {
    let (inject_tx, inject_rx) = crossbeam_channel::unbounded();
    let (written_tx, written_rx) = crossbeam_channel::unbounded();
    (
        MockBinding {
            inject_rx,
            written_tx,
        },
        MockRemote {
            inject_tx,
            written_rx,
        },
    )
}

enum ThreadCommand {
    Stop,
    Send(SerialFrame),
}

pub struct OpenMockBinding {
    thread: JoinHandle<()>,
    thread_tx: Sender<ThreadCommand>,
}

impl PortBinding for MockBinding {
    type Open = OpenMockBinding;

    fn open(self, listener: FrameListener) -> Result<Self::Open> {
        let (thread_tx, thread_rx) = crossbeam_channel::unbounded::<ThreadCommand>();
        let inject_rx = self.inject_rx;
        let written_tx = self.written_tx;

        let thread = thread::spawn(move || {
            let mut framer = Framer::new();
            loop {
                crossbeam_channel::select! {
                    recv(thread_rx) -> cmd => match cmd {
                        Ok(ThreadCommand::Stop) | Err(_) => break,
                        Ok(ThreadCommand::Send(frame)) => {
                            if written_tx.send(frame).is_err() {
                                break;
                            }
                        }
                    },
                    recv(inject_rx) -> chunk => match chunk {
                        Ok(chunk) => {
                            for event in framer.push(&chunk) {
                                if let Some(reply) = event.reply {
                                    let reply = match reply {
                                        crate::frame::SerialControlByte::ACK => SerialFrame::Ack,
                                        crate::frame::SerialControlByte::NAK => SerialFrame::Nak,
                                        crate::frame::SerialControlByte::CAN => SerialFrame::Can,
                                        crate::frame::SerialControlByte::SOF => continue,
                                    };
                                    if written_tx.send(reply).is_err() {
                                        return;
                                    }
                                }
                                if listener.send(event.frame).is_err() {
                                    return;
                                }
                            }
                        }
                        Err(_) => break,
                    },
                }
            }
        });

        Ok(OpenMockBinding { thread, thread_tx })
    }
}

impl OpenPortBinding for OpenMockBinding {
    type Closed = ();

    fn close(self) -> Result<Self::Closed> {
        let _ = self.thread_tx.send(ThreadCommand::Stop);
        let _ = self.thread.join();
        Ok(())
    }

    fn write_frame(&mut self, frame: &SerialFrame) -> Result<()> {
        self.thread_tx
            .send(ThreadCommand::Send(frame.clone()))
            .map_err(|_| Error::PortClosed)
    }
}

impl MockRemote {
    pub fn send_bytes(&self, bytes: &[u8]) {
        let _ = self.inject_tx.send(bytes.to_vec());
    }

    pub fn send_frame(&self, frame: &DataFrame) {
        self.send_bytes(&frame.to_bytes());
    }

    pub fn send_ack(&self) {
        self.send_bytes(&[crate::frame::SerialControlByte::ACK as u8]);
    }

    pub fn send_nak(&self) {
        self.send_bytes(&[crate::frame::SerialControlByte::NAK as u8]);
    }

    pub fn send_can(&self) {
        self.send_bytes(&[crate::frame::SerialControlByte::CAN as u8]);
    }

    /// Next frame the driver wrote, whatever it is.
    pub fn recv_written(&self, timeout: Duration) -> Option<SerialFrame> {
        self.written_rx.recv_timeout(timeout).ok()
    }

    /// Next *data* frame the driver wrote, skipping control bytes.
    pub fn recv_data(&self, timeout: Duration) -> Option<DataFrame> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(std::time::Instant::now())?;
            match self.written_rx.recv_timeout(remaining).ok()? {
                SerialFrame::Data(frame) => return Some(frame),
                _ => continue,
            }
        }
    }

    /// True if no frame is written within the window. Used to assert that
    /// traffic for sleeping nodes stays off the wire.
    pub fn assert_silent(&self, window: Duration) -> bool {
        match self.written_rx.recv_timeout(window) {
            Ok(SerialFrame::Data(_)) => false,
            // Stray control bytes do not count as traffic
            Ok(_) => self.assert_silent(window),
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crossbeam_channel::unbounded;
    use zmesh_core::definitions::{CommandType, FunctionType};

    #[test]
    fn mock_round_trip() {
        let (binding, remote) = mock_pair();
        let (listener_tx, listener_rx) = unbounded();
        let mut open = binding.open(listener_tx).unwrap();

        // Driver writes a frame; the remote sees it
        let frame = DataFrame::new(CommandType::Request, FunctionType::GetSerialApiInitData, vec![]);
        open.write_frame(&SerialFrame::Data(frame.clone())).unwrap();
        assert_eq!(
            remote.recv_data(Duration::from_millis(500)),
            Some(frame.clone())
        );

        // Remote sends bytes; the driver-side listener sees the frame and
        // the remote sees the automatic ACK
        remote.send_frame(&frame);
        assert_eq!(
            listener_rx.recv_timeout(Duration::from_millis(500)),
            Ok(SerialFrame::Data(frame))
        );
        assert_eq!(
            remote.recv_written(Duration::from_millis(500)),
            Some(SerialFrame::Ack)
        );

        open.close().unwrap();
    }
}
