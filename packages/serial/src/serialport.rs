use crate::binding::{FrameListener, OpenPortBinding, PortBinding};
use crate::error::Result;
use crate::framer::Framer;
use ::serialport::SerialPortBuilder;
use crossbeam_channel::{Sender, TryRecvError};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// The real serial transport: a dedicated thread owns the port, feeds reads
/// through the framer, writes the framer's ACK/NAK replies, and forwards
/// complete frames to the listener. Writes arrive over a channel so the
/// port is only ever touched from its own thread.
pub struct SerialPortBinding {
    builder: SerialPortBuilder,
}

#[derive(Debug)]
enum ThreadCommand {
    Stop,
    Send(Vec<u8>),
}

pub struct OpenSerialPortBinding {
    builder: SerialPortBuilder,
    thread: JoinHandle<()>,
    thread_tx: Sender<ThreadCommand>,
}

impl SerialPortBinding {
    pub fn new(path: &str) -> Self {
        // 115200 8-N-1; the short timeout keeps the read loop responsive to
        // pending writes and shutdown
        let builder = ::serialport::new(path, 115_200).timeout(Duration::from_millis(10));
        Self { builder }
    }
}

impl PortBinding for SerialPortBinding {
    type Open = OpenSerialPortBinding;

    fn open(self, listener: FrameListener) -> Result<Self::Open> {
        let mut port = self.builder.clone().open()?;
        let (tx, rx) = crossbeam_channel::unbounded::<ThreadCommand>();

        let thread = thread::spawn(move || {
            let mut framer = Framer::new();
            let mut serial_buf = vec![0u8; 256];

            loop {
                let cmd = match rx.try_recv() {
                    Ok(ThreadCommand::Stop) | Err(TryRecvError::Disconnected) => break,
                    Err(TryRecvError::Empty) => None,
                    Ok(cmd) => Some(cmd),
                };

                match port.read(&mut serial_buf) {
                    Ok(n) => {
                        for event in framer.push(&serial_buf[..n]) {
                            if let Some(reply) = event.reply {
                                if port.write_all(&[reply as u8]).is_err() {
                                    return;
                                }
                            }
                            // Exit when there is no listener anymore
                            if listener.send(event.frame).is_err() {
                                return;
                            }
                        }
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {
                        // No data to read, fall through to pending writes
                    }
                    Err(e) => {
                        eprintln!("serial read failed: {:?}", e);
                        break;
                    }
                }

                if let Some(ThreadCommand::Send(data)) = cmd {
                    if port.write_all(&data).is_err() {
                        break;
                    }
                }
            }
        });

        Ok(OpenSerialPortBinding {
            builder: self.builder,
            thread,
            thread_tx: tx,
        })
    }
}

impl OpenPortBinding for OpenSerialPortBinding {
    type Closed = SerialPortBinding;

    fn close(self) -> Result<Self::Closed> {
        // The thread may already have exited because the listener went away,
        // so a failed send is fine
        let _ = self.thread_tx.send(ThreadCommand::Stop);
        let _ = self.thread.join();

        Ok(SerialPortBinding {
            builder: self.builder,
        })
    }

    fn write_frame(&mut self, frame: &crate::frame::SerialFrame) -> Result<()> {
        self.thread_tx
            .send(ThreadCommand::Send(frame.to_bytes()))
            .map_err(|_| crate::error::Error::PortClosed)
    }
}
