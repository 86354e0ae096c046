/// Compute the XOR "checksum" of the given data.
///
/// Serial API frames carry `0xff XOR b0 XOR b1 ...` over every byte from the
/// length field through the last payload byte.
pub fn xor_sum(data: &[u8]) -> u8 {
    data.iter().fold(0xff, |acc, x| acc ^ x)
}

#[test]
fn test_xor_sum() {
    // SOF-less body of a GetSerialApiInitData request: len=03, type=00, func=02
    let input = hex::decode("030002").unwrap();
    assert_eq!(xor_sum(&input), 0xfe);
}

#[test]
fn test_xor_sum_empty() {
    assert_eq!(xor_sum(&[]), 0xff);
}
