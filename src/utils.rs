use std::ops::{BitAnd, Shl, Shr};

use num::Integer;

/// Make an n_bits-long mask (all ones)
pub fn mask<T>(n_bits: T) -> T
where
    T: Integer + Shl<Output = T>,
{
    (T::one() << n_bits) - T::one()
}

/// Obtain value[end:start] (verilog notation) from value
pub fn extract_field<T>(value: T, end: T, start: T) -> T
where
    T: Copy + Integer + Shl<Output = T> + Shr<Output = T> + BitAnd<Output = T>,
{
    mask(end - start + T::one()) & (value >> start)
}

/// Reinterpret the bits of a u32 as a two's-complement i32
pub fn interpret_u32_as_signed(value: u32) -> i32 {
    i32::from_ne_bytes(value.to_ne_bytes())
}

/// Reinterpret the bits of an i32 as a u32
pub fn interpret_i32_as_unsigned(value: i32) -> u32 {
    u32::from_ne_bytes(value.to_ne_bytes())
}

/// Copy the bit at sign_bit_position into all the higher bits of the
/// result. The bits above the sign bit must already be zero.
pub fn sign_extend(value: u32, sign_bit_position: u32) -> u32 {
    let shift = 31 - sign_bit_position;
    interpret_i32_as_unsigned(interpret_u32_as_signed(value << shift) >> shift)
}
