//! Bit-level signal extraction
//!
//! Turns a CAN payload plus a DBC-style bit layout into a raw 64-bit integer.
//! Nothing here fails: a layout that does not fit the payload decodes to 0,
//! or to `None` through [`try_extract`], which the decoder reports as "signal
//! not present in this frame".

use super::catalog::{ByteOrder, SignalSpec, ValueType};

/// Widest representable signal
pub const MAX_SIGNAL_BITS: u16 = 64;

/// Extract a raw signal value from payload bytes.
///
/// * Little endian: result bit `b` comes from payload bit `start_bit + b`,
///   where payload bit `n` is bit `n % 8` of byte `n / 8`.
/// * Big endian (Motorola): `start_bit` addresses the most significant bit.
///   After each bit the position moves down by one inside the byte, and from
///   bit 0 of a byte it jumps forward 15 positions to bit 7 of the next byte.
///
/// Positions at or beyond bit 64 are skipped. Returns 0 when
/// `(start_bit + bit_length) / 8` exceeds the payload length, when the walk
/// reaches a byte past the payload, or when `bit_length` is outside 1..=64.
pub fn extract(
    data: &[u8],
    start_bit: u16,
    bit_length: u16,
    byte_order: ByteOrder,
    value_type: ValueType,
) -> i64 {
    try_extract(data, start_bit, bit_length, byte_order, value_type).unwrap_or(0)
}

/// Same walk as [`extract`], but `None` where [`extract`] falls back to 0
/// because the layout does not fit `data`.
pub fn try_extract(
    data: &[u8],
    start_bit: u16,
    bit_length: u16,
    byte_order: ByteOrder,
    value_type: ValueType,
) -> Option<i64> {
    if bit_length == 0 || bit_length > MAX_SIGNAL_BITS {
        return None;
    }

    let start_bit = start_bit as usize;
    let length = bit_length as usize;

    if (start_bit + length) / 8 > data.len() {
        return None;
    }

    let raw = match byte_order {
        ByteOrder::LittleEndian => extract_little_endian(data, start_bit, length),
        ByteOrder::BigEndian => extract_big_endian(data, start_bit, length),
    }?;

    Some(match value_type {
        ValueType::Unsigned => raw as i64,
        ValueType::Signed => sign_extend(raw, length),
    })
}

/// Extract the signal described by `spec` from `data`.
pub fn extract_signal(data: &[u8], spec: &SignalSpec) -> i64 {
    extract(data, spec.start_bit, spec.bit_length, spec.byte_order, spec.value_type)
}

/// Extract the signal described by `spec`, `None` if it is not in `data`.
pub fn try_extract_signal(data: &[u8], spec: &SignalSpec) -> Option<i64> {
    try_extract(data, spec.start_bit, spec.bit_length, spec.byte_order, spec.value_type)
}

/// True if a payload of `payload_len` bytes carries the whole signal.
pub fn fits(payload_len: usize, spec: &SignalSpec) -> bool {
    layout_fits(payload_len, spec.start_bit, spec.bit_length, spec.byte_order)
}

fn layout_fits(payload_len: usize, start_bit: u16, bit_length: u16, byte_order: ByteOrder) -> bool {
    if bit_length == 0 || bit_length > MAX_SIGNAL_BITS {
        return false;
    }
    let length = bit_length as usize;
    (start_bit as usize + length) / 8 <= payload_len
        && bit_positions(start_bit as usize, length, byte_order)
            .iter()
            .all(|&(bit, _)| bit >= 64 || bit / 8 < payload_len)
}

/// Write `value` into `data` at the given layout, the inverse of [`extract`].
///
/// Only the low `bit_length` bits of `value` are written. Returns false and
/// leaves `data` untouched if the layout does not fit.
pub fn insert(
    data: &mut [u8],
    start_bit: u16,
    bit_length: u16,
    byte_order: ByteOrder,
    value: u64,
) -> bool {
    if !layout_fits(data.len(), start_bit, bit_length, byte_order) {
        return false;
    }

    for (bit, value_bit) in bit_positions(start_bit as usize, bit_length as usize, byte_order) {
        if bit >= 64 {
            continue;
        }
        let mask = 1u8 << (bit % 8);
        if (value >> value_bit) & 1 != 0 {
            data[bit / 8] |= mask;
        } else {
            data[bit / 8] &= !mask;
        }
    }
    true
}

/// Payload bit position paired with the result bit it feeds, in walk order.
fn bit_positions(start_bit: usize, length: usize, byte_order: ByteOrder) -> Vec<(usize, usize)> {
    let mut positions = Vec::with_capacity(length);
    let mut bit = start_bit;
    for i in 0..length {
        match byte_order {
            ByteOrder::LittleEndian => {
                positions.push((bit, i));
                bit += 1;
            }
            ByteOrder::BigEndian => {
                positions.push((bit, length - i - 1));
                bit = next_motorola_bit(bit);
            }
        }
    }
    positions
}

#[inline]
fn next_motorola_bit(bit: usize) -> usize {
    if bit % 8 == 0 {
        bit + 15
    } else {
        bit - 1
    }
}

/// Little-endian (Intel) walk: ascending payload bits feed ascending result bits.
fn extract_little_endian(data: &[u8], start_bit: usize, length: usize) -> Option<u64> {
    let mut result: u64 = 0;
    let mut bit = start_bit;

    for i in 0..length {
        if bit < 64 {
            let byte = *data.get(bit / 8)?;
            if byte & (1 << (bit % 8)) != 0 {
                result |= 1u64 << i;
            }
        }
        bit += 1;
    }

    Some(result)
}

/// Big-endian (Motorola) walk: the first visited bit is the MSB of the result.
fn extract_big_endian(data: &[u8], start_bit: usize, length: usize) -> Option<u64> {
    let mut result: u64 = 0;
    let mut bit = start_bit;

    for i in 0..length {
        if bit < 64 {
            let byte = *data.get(bit / 8)?;
            if byte & (1 << (bit % 8)) != 0 {
                result |= 1u64 << (length - i - 1);
            }
        }
        bit = next_motorola_bit(bit);
    }

    Some(result)
}

/// Sign-extend a value from N bits to 64 bits
///
/// If the value's MSB is 1, fill the upper bits with 1s.
fn sign_extend(value: u64, bit_length: usize) -> i64 {
    if bit_length >= 64 {
        return value as i64;
    }

    let sign_bit = 1u64 << (bit_length - 1);
    if (value & sign_bit) != 0 {
        let mask = !((1u64 << bit_length) - 1);
        (value | mask) as i64
    } else {
        value as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LE: ByteOrder = ByteOrder::LittleEndian;
    const BE: ByteOrder = ByteOrder::BigEndian;

    #[test]
    fn test_little_endian_two_bytes() {
        let data = [0x12, 0x34];
        assert_eq!(extract(&data, 0, 16, LE, ValueType::Unsigned), 0x3412);
    }

    #[test]
    fn test_big_endian_two_bytes() {
        // Motorola start bit addresses the MSB: bit 7 of byte 0
        let data = [0x12, 0x34];
        assert_eq!(extract(&data, 7, 16, BE, ValueType::Unsigned), 0x1234);
    }

    #[test]
    fn test_big_endian_walk_past_payload_is_absent() {
        // From bit 0 the walk jumps into byte 1 and then byte 2, which does not exist
        let data = [0x12, 0x34];
        assert_eq!(extract(&data, 0, 16, BE, ValueType::Unsigned), 0);
    }

    #[test]
    fn test_walk_past_payload_has_no_value() {
        let data = [0x12, 0x34];
        assert_eq!(try_extract(&data, 0, 16, BE, ValueType::Unsigned), None);
        assert_eq!(try_extract(&data, 7, 16, BE, ValueType::Unsigned), Some(0x1234));

        // Bits 4..12 of a single byte: the precondition passes, the walk does not
        let one = [0xFF];
        assert_eq!(try_extract(&one, 4, 8, LE, ValueType::Unsigned), None);
        assert_eq!(extract(&one, 4, 8, LE, ValueType::Unsigned), 0);
    }

    #[test]
    fn test_big_endian_cross_byte_nibbles() {
        // 12-bit signal, MSB at bit 3 of byte 0: low nibble of byte 0 then all of byte 1
        let data = [0xAB, 0xCD, 0x00];
        assert_eq!(extract(&data, 3, 12, BE, ValueType::Unsigned), 0xBCD);
    }

    #[test]
    fn test_little_endian_offset_field() {
        // 4 bits starting at bit 4: high nibble of byte 0
        let data = [0xA5];
        assert_eq!(extract(&data, 4, 4, LE, ValueType::Unsigned), 0xA);
        assert_eq!(extract(&data, 0, 4, LE, ValueType::Unsigned), 0x5);
    }

    #[test]
    fn test_signed_four_bit_minimum() {
        let data = [0b0000_1000];
        assert_eq!(extract(&data, 0, 4, LE, ValueType::Signed), -8);
        assert_eq!(extract(&data, 0, 4, LE, ValueType::Unsigned), 8);
    }

    #[test]
    fn test_sign_extension_matches_twos_complement() {
        for raw in 0u8..16 {
            let data = [raw];
            let unsigned = extract(&data, 0, 4, LE, ValueType::Unsigned);
            let signed = extract(&data, 0, 4, LE, ValueType::Signed);
            if raw & 0x8 == 0 {
                assert_eq!(signed, unsigned);
            } else {
                assert_eq!(signed, unsigned - (1 << 4));
            }
        }
    }

    #[test]
    fn test_sign_extension_across_layouts() {
        let layouts: [(u16, u16, ByteOrder); 10] = [
            (3, 1, LE),
            (8, 8, LE),
            (4, 12, LE),
            (16, 16, LE),
            (0, 32, LE),
            (5, 1, BE),
            (15, 8, BE),
            (3, 12, BE),
            (7, 16, BE),
            (7, 32, BE),
        ];

        for (start, len, order) in layouts {
            let sign_bit = 1u64 << (len - 1);
            for value in [0, 1, sign_bit - 1, sign_bit, sign_bit | 1, (sign_bit << 1) - 1] {
                let mut data = [0u8; 8];
                assert!(insert(&mut data, start, len, order, value), "layout {start}/{len}");

                let unsigned = extract(&data, start, len, order, ValueType::Unsigned);
                let signed = extract(&data, start, len, order, ValueType::Signed);
                assert_eq!(unsigned as u64, value);
                if value & sign_bit == 0 {
                    assert_eq!(signed, unsigned, "layout {start}/{len} {order:?}");
                } else {
                    assert_eq!(signed, unsigned - (1i64 << len), "layout {start}/{len} {order:?}");
                }
            }
        }
    }

    #[test]
    fn test_insufficient_payload_returns_zero() {
        let data = [0xFF];
        assert_eq!(extract(&data, 0, 16, LE, ValueType::Unsigned), 0);
        assert_eq!(extract(&[], 0, 8, LE, ValueType::Unsigned), 0);
    }

    #[test]
    fn test_invalid_width_returns_zero() {
        let data = [0xFF; 8];
        assert_eq!(extract(&data, 0, 0, LE, ValueType::Unsigned), 0);
        assert_eq!(extract(&data, 0, 65, LE, ValueType::Unsigned), 0);
    }

    #[test]
    fn test_full_width_signed() {
        let data = [0xFF; 8];
        assert_eq!(extract(&data, 0, 64, LE, ValueType::Signed), -1);
        assert_eq!(extract(&data, 7, 64, BE, ValueType::Signed), -1);
        assert_eq!(extract(&data, 0, 64, LE, ValueType::Unsigned), -1);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let data = [0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03, 0x04];
        let first = extract(&data, 13, 21, BE, ValueType::Signed);
        for _ in 0..10 {
            assert_eq!(extract(&data, 13, 21, BE, ValueType::Signed), first);
        }
    }

    #[test]
    fn test_insert_then_extract_reproduces_value() {
        let cases: [(u16, u16, ByteOrder, u64); 10] = [
            (3, 1, LE, 1),
            (8, 8, LE, 0xA7),
            (16, 16, LE, 0xBEEF),
            (0, 32, LE, 0xDEAD_BEEF),
            (0, 64, LE, 0x0123_4567_89AB_CDEF),
            (5, 1, BE, 1),
            (15, 8, BE, 0x5A),
            (7, 16, BE, 0x1234),
            (7, 32, BE, 0xCAFE_F00D),
            (7, 64, BE, 0xFEDC_BA98_7654_3210),
        ];

        for (start, len, order, value) in cases {
            let mut data = [0u8; 8];
            assert!(insert(&mut data, start, len, order, value), "layout {start}/{len}");
            let decoded = extract(&data, start, len, order, ValueType::Unsigned) as u64;
            assert_eq!(decoded, value, "layout {start}/{len} {order:?}");
        }
    }

    #[test]
    fn test_insert_rejects_layout_outside_payload() {
        let mut data = [0u8; 2];
        assert!(!insert(&mut data, 8, 16, LE, 0xFFFF));
        assert_eq!(data, [0, 0]);
    }

    #[test]
    fn test_fits_precondition() {
        let spec = SignalSpec::new("Speed", 0, 16, LE, ValueType::Unsigned);
        assert!(fits(2, &spec));
        assert!(!fits(1, &spec));

        let motorola = SignalSpec::new("Be", 0, 16, BE, ValueType::Unsigned);
        assert!(!fits(2, &motorola));
        assert!(fits(3, &motorola));
        assert!(!fits(1, &SignalSpec::new("Le", 4, 8, LE, ValueType::Unsigned)));
    }
}
