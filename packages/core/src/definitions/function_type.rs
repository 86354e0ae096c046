use derive_try_from_primitive::*;

/// Function ids of the Serial API commands this driver speaks.
///
/// The full opcode space is much larger; only the functions the driver
/// issues or handles are listed here. Unknown incoming opcodes are dropped
/// after logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum FunctionType {
    GetSerialApiInitData = 0x02,

    /// A command-class frame from another node
    ApplicationCommand = 0x04,

    GetControllerCapabilities = 0x05,
    GetSerialApiCapabilities = 0x07,
    SoftReset = 0x08,

    SendData = 0x13,

    GetControllerVersion = 0x15,

    /// Get Home ID and controller node id
    MemoryGetId = 0x20,

    /// Get protocol info (listening, baud rate, device classes) for a node
    GetNodeProtocolInfo = 0x41,

    /// Carries node-info frames and the results of RequestNodeInfo
    ApplicationUpdate = 0x49,

    AddNodeToNetwork = 0x4a,
    RemoveNodeFromNetwork = 0x4b,
    CreateNewPrimary = 0x4c,
    ControllerChange = 0x4d,
    SetLearnMode = 0x50,

    RequestNodeInfo = 0x60,

    RemoveFailedNode = 0x61,
    IsFailedNode = 0x62,
    ReplaceFailedNode = 0x63,
}

#[test]
fn test_try_from_primitive() {
    assert_eq!(FunctionType::try_from(0x13), Ok(FunctionType::SendData));
    assert!(FunctionType::try_from(0xd9).is_err());
}
