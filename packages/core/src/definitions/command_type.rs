use derive_try_from_primitive::*;

/// Whether a Serial API frame is a host-initiated request or a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum CommandType {
    Request = 0x00,
    Response = 0x01,
}
