//! Packing and unpacking of the fixed-layout record fields.
//!
//! Everything on the wire is little-endian, whatever the host is.

/// Types that can be read from / written to a fixed number of bytes.
///
/// Implementations panic if the slice is shorter than the packed size,
/// callers slice records into exact field windows before calling.
pub trait Packable {
    fn unpack_from(input: &[u8]) -> Self;
    fn pack_into(&self, output: &mut [u8]);
}

impl Packable for u8 {
    fn unpack_from(input: &[u8]) -> Self {
        input[0]
    }

    fn pack_into(&self, output: &mut [u8]) {
        output[0] = *self;
    }
}

impl Packable for u16 {
    fn unpack_from(input: &[u8]) -> Self {
        let mut bytes = [0u8; 2];
        bytes.copy_from_slice(&input[..2]);
        u16::from_le_bytes(bytes)
    }

    fn pack_into(&self, output: &mut [u8]) {
        output[..2].copy_from_slice(&self.to_le_bytes());
    }
}

impl Packable for u32 {
    fn unpack_from(input: &[u8]) -> Self {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&input[..4]);
        u32::from_le_bytes(bytes)
    }

    fn pack_into(&self, output: &mut [u8]) {
        output[..4].copy_from_slice(&self.to_le_bytes());
    }
}

impl Packable for f32 {
    fn unpack_from(input: &[u8]) -> Self {
        f32::from_bits(u32::unpack_from(input))
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.to_bits().pack_into(output);
    }
}
