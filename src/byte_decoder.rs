//! Readers that interpret raw bytes as typed samples.
//!
//! The plain readers are little-endian, the `_swapped` readers big-endian.
//! None of them check bounds: an `offset` past the end of `buffer` panics, so
//! callers must validate the element count against the buffer length first.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// A decoded run of samples together with the extremes seen while decoding.
///
/// `min` starts at `+inf` but `max` starts at `0`, so a run that only holds
/// negative values reports `max == 0.0`. Code that needs the true maximum
/// has to compute it from `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedArray<T> {
    pub values: Vec<T>,
    pub min: f64,
    pub max: f64,
}

#[inline]
pub fn read_uint8(buffer: &[u8], offset: usize) -> u8 {
    buffer[offset]
}

#[inline]
pub fn read_int8(buffer: &[u8], offset: usize) -> i8 {
    buffer[offset] as i8
}

#[inline]
pub fn read_uint16(buffer: &[u8], offset: usize) -> u16 {
    LittleEndian::read_u16(&buffer[offset..])
}

#[inline]
pub fn read_uint16_swapped(buffer: &[u8], offset: usize) -> u16 {
    BigEndian::read_u16(&buffer[offset..])
}

/// Big-endian 24-bit value, masked to the low 24 bits of the result.
#[inline]
pub fn read_uint24_swapped(buffer: &[u8], offset: usize) -> u32 {
    BigEndian::read_u24(&buffer[offset..]) & 0x00FF_FFFF
}

#[inline]
pub fn read_uint32(buffer: &[u8], offset: usize) -> u32 {
    LittleEndian::read_u32(&buffer[offset..])
}

#[inline]
pub fn read_uint32_swapped(buffer: &[u8], offset: usize) -> u32 {
    BigEndian::read_u32(&buffer[offset..])
}

#[inline]
pub fn read_int32(buffer: &[u8], offset: usize) -> i32 {
    LittleEndian::read_i32(&buffer[offset..])
}

#[inline]
pub fn read_int32_swapped(buffer: &[u8], offset: usize) -> i32 {
    BigEndian::read_i32(&buffer[offset..])
}

/// Little-endian IEEE-754 single precision value.
#[inline]
pub fn read_float32(buffer: &[u8], offset: usize) -> f32 {
    float_from_bits(LittleEndian::read_u32(&buffer[offset..]))
}

/// Big-endian IEEE-754 single precision value.
#[inline]
pub fn read_float32_swapped(buffer: &[u8], offset: usize) -> f32 {
    float_from_bits(BigEndian::read_u32(&buffer[offset..]))
}

/// Rebuilds a float from its sign, biased exponent and mantissa.
///
/// Only the all-zero exponent with a zero mantissa is special-cased. Other
/// zero-exponent patterns are read as normalised numbers, and the all-ones
/// exponent overflows to infinity instead of producing NaN.
fn float_from_bits(bits: u32) -> f32 {
    let sign = if bits >> 31 == 0 { 1.0 } else { -1.0 };
    let exponent = ((bits >> 23) & 0xFF) as i32 - 127;
    let mantissa = bits & 0x007F_FFFF;

    if mantissa == 0 && exponent == -127 {
        return 0.0;
    }

    let fraction = 1.0 + f64::from(mantissa) * 2f64.powi(-23);
    (sign * fraction * 2f64.powi(exponent)) as f32
}

fn read_array<T>(
    buffer: &[u8],
    offset: usize,
    count: usize,
    width: usize,
    read: fn(&[u8], usize) -> T,
) -> DecodedArray<T>
where
    T: Copy + Into<f64>,
{
    let mut values = Vec::with_capacity(count);
    let mut min = f64::INFINITY;
    let mut max = 0.0_f64;

    for i in 0..count {
        let value = read(buffer, offset + i * width);
        let as_f64: f64 = value.into();
        max = max.max(as_f64);
        min = min.min(as_f64);
        values.push(value);
    }

    DecodedArray { values, min, max }
}

pub fn read_uint8_array(buffer: &[u8], offset: usize, count: usize) -> DecodedArray<u8> {
    read_array(buffer, offset, count, 1, read_uint8)
}

pub fn read_int8_array(buffer: &[u8], offset: usize, count: usize) -> DecodedArray<i8> {
    read_array(buffer, offset, count, 1, read_int8)
}

pub fn read_uint16_array(buffer: &[u8], offset: usize, count: usize) -> DecodedArray<u16> {
    read_array(buffer, offset, count, 2, read_uint16)
}

pub fn read_uint16_swapped_array(
    buffer: &[u8],
    offset: usize,
    count: usize,
) -> DecodedArray<u16> {
    read_array(buffer, offset, count, 2, read_uint16_swapped)
}

pub fn read_uint32_array(buffer: &[u8], offset: usize, count: usize) -> DecodedArray<u32> {
    read_array(buffer, offset, count, 4, read_uint32)
}

pub fn read_uint32_swapped_array(
    buffer: &[u8],
    offset: usize,
    count: usize,
) -> DecodedArray<u32> {
    read_array(buffer, offset, count, 4, read_uint32_swapped)
}

pub fn read_int32_array(buffer: &[u8], offset: usize, count: usize) -> DecodedArray<i32> {
    read_array(buffer, offset, count, 4, read_int32)
}

pub fn read_float32_array(buffer: &[u8], offset: usize, count: usize) -> DecodedArray<f32> {
    read_array(buffer, offset, count, 4, read_float32)
}

pub fn read_float32_swapped_array(
    buffer: &[u8],
    offset: usize,
    count: usize,
) -> DecodedArray<f32> {
    read_array(buffer, offset, count, 4, read_float32_swapped)
}
