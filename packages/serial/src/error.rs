use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerialPort(#[from] serialport::Error),
    #[error("The port is closed")]
    PortClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
