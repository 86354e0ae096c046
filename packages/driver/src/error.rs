use thiserror::Error;
use zmesh_core::definitions::{HomeId, NodeId};

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    SerialPort(#[from] zmesh_serial::error::Error),
    #[error("no driver for home id {0}")]
    UnknownHomeId(HomeId),
    #[error("no driver for device {0}")]
    UnknownDevice(String),
    #[error("node {0} is not in the node table")]
    UnknownNode(NodeId),
    #[error("a controller command is already in progress")]
    ControllerCommandBusy,
    #[error("the driver has shut down")]
    DriverGone,
    #[error("config store error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
