use crate::error::Result;
use crate::frame::SerialFrame;

/// Receives every frame the port produces, control bytes included.
pub type FrameListener = crossbeam_channel::Sender<SerialFrame>;

/// A closed serial transport that can be opened with a listener.
///
/// Implemented by the real serial port and by the in-memory mock, so the
/// driver is generic over where its bytes come from.
pub trait PortBinding {
    type Open: OpenPortBinding;

    fn open(self, listener: FrameListener) -> Result<Self::Open>;
}

/// An open serial transport.
pub trait OpenPortBinding {
    type Closed;

    fn close(self) -> Result<Self::Closed>;
    fn write_frame(&mut self, frame: &SerialFrame) -> Result<()>;
}
