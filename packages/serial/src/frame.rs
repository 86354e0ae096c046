use crate::parse;
use derive_try_from_primitive::*;
use nom::{
    branch::alt,
    bytes::streaming::{tag, take, take_till1},
    combinator::{map, peek, value},
    number::streaming::be_u8,
    sequence::tuple,
};
use zmesh_core::checksum::xor_sum;
use zmesh_core::definitions::{CommandType, FunctionType};

pub const ACK_BUFFER: [u8; 1] = [SerialControlByte::ACK as u8];
pub const NAK_BUFFER: [u8; 1] = [SerialControlByte::NAK as u8];
pub const CAN_BUFFER: [u8; 1] = [SerialControlByte::CAN as u8];

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum SerialControlByte {
    SOF = 0x01,
    ACK = 0x06,
    NAK = 0x15,
    CAN = 0x18,
}

/// One unit read from or written to the wire: a control byte, a complete
/// data frame, a data frame whose checksum did not verify, or skipped
/// garbage.
#[derive(Clone, Debug, PartialEq)]
pub enum SerialFrame {
    Ack,
    Nak,
    Can,
    Data(DataFrame),
    Corrupt(Vec<u8>),
    Garbage(Vec<u8>),
}

impl SerialFrame {
    /// A serial frame is either a control byte, data starting with SOF, or
    /// skipped garbage. Needs more input for partial data frames.
    pub fn parse(i: parse::Input) -> parse::Result<Self> {
        alt((consume_garbage, parse_control, parse_data))(i)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            SerialFrame::Ack => ACK_BUFFER.to_vec(),
            SerialFrame::Nak => NAK_BUFFER.to_vec(),
            SerialFrame::Can => CAN_BUFFER.to_vec(),
            SerialFrame::Data(frame) => frame.to_bytes(),
            SerialFrame::Corrupt(data) | SerialFrame::Garbage(data) => data.clone(),
        }
    }
}

fn consume_garbage(i: parse::Input) -> parse::Result<SerialFrame> {
    map(
        take_till1(|b| SerialControlByte::try_from(b).is_ok()),
        |g: &[u8]| SerialFrame::Garbage(g.to_vec()),
    )(i)
}

fn parse_control(i: parse::Input) -> parse::Result<SerialFrame> {
    alt((
        value(SerialFrame::Ack, tag(&ACK_BUFFER)),
        value(SerialFrame::Nak, tag(&NAK_BUFFER)),
        value(SerialFrame::Can, tag(&CAN_BUFFER)),
    ))(i)
}

fn parse_data(i: parse::Input) -> parse::Result<SerialFrame> {
    // A data frame is at least SOF, length, type, function, checksum
    peek(take(5usize))(i)?;

    // Ensure it starts with SOF and read the length of the remainder
    let (_, (_, len)) = peek(tuple((tag([SerialControlByte::SOF as u8]), be_u8)))(i)?;

    // Take the whole frame: SOF + len byte + len more bytes
    let (i, data) = take(len as usize + 2)(i)?;

    // A frame needs at least type, function and checksum behind the length
    if len < 3 {
        return Ok((i, SerialFrame::Corrupt(data.to_vec())));
    }

    // The checksum spans the length byte through the last payload byte
    let expected = xor_sum(&data[1..data.len() - 1]);
    let frame = if expected == data[data.len() - 1] {
        SerialFrame::Data(DataFrame::from_wire(data))
    } else {
        SerialFrame::Corrupt(data.to_vec())
    };
    Ok((i, frame))
}

/// A framed Serial API command: `SOF | len | type | function | payload... |
/// checksum`. The type and function bytes are kept raw so unknown commands
/// survive framing and can be logged before being dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct DataFrame {
    pub command_type: u8,
    pub function: u8,
    pub payload: Vec<u8>,
}

impl DataFrame {
    pub fn new(command_type: CommandType, function: FunctionType, payload: Vec<u8>) -> Self {
        Self {
            command_type: command_type as u8,
            function: function as u8,
            payload,
        }
    }

    fn from_wire(data: &[u8]) -> Self {
        Self {
            command_type: data[2],
            function: data[3],
            payload: data[4..data.len() - 1].to_vec(),
        }
    }

    pub fn kind(&self) -> Option<CommandType> {
        CommandType::try_from(self.command_type).ok()
    }

    pub fn function_type(&self) -> Option<FunctionType> {
        FunctionType::try_from(self.function).ok()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload.len() + 5);
        out.push(SerialControlByte::SOF as u8);
        out.push(self.payload.len() as u8 + 3);
        out.push(self.command_type);
        out.push(self.function);
        out.extend_from_slice(&self.payload);
        out.push(xor_sum(&out[1..]));
        out
    }
}

impl From<DataFrame> for SerialFrame {
    fn from(val: DataFrame) -> Self {
        SerialFrame::Data(val)
    }
}
