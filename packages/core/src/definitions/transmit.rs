use derive_try_from_primitive::*;

/// Per-frame transmit option flags appended to every `SendData` body.
pub mod transmit_options {
    pub const ACK: u8 = 0x01;
    pub const LOW_POWER: u8 = 0x02;
    pub const AUTO_ROUTE: u8 = 0x04;
    pub const NO_ROUTE: u8 = 0x10;
    pub const EXPLORE: u8 = 0x20;

    /// What the driver attaches unless a command asks otherwise.
    pub const DEFAULT: u8 = ACK | AUTO_ROUTE;
}

/// Status byte delivered by the `SendData` callback request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum TransmitStatus {
    Ok = 0x00,
    NoAck = 0x01,
    NoRoute = 0x02,
    NoAnswer = 0x03,
}

impl TransmitStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, TransmitStatus::Ok)
    }
}
