pub(crate) fn lower_byte(value: u16) -> u8 {
    (value & 0x00FF) as u8
}

pub(crate) fn upper_byte(value: u16) -> u8 {
    (value >> 8) as u8
}

pub(crate) fn u16_from_bytes(lower: u8, upper: u8) -> u16 {
    u16::from(lower) | (u16::from(upper) << 8)
}
