//! NRRD header parsing.
//!
//! A header is a block of `key: value` lines introduced by a `NRRD000X` magic
//! line and terminated by an empty line, after which the binary payload
//! starts. Known keys are parsed into a [`VolumeDescriptor`]; everything else
//! is kept verbatim in [`VolumeDescriptor::properties`].

use std::borrow::Cow;
use std::collections::HashMap;

use log::warn;
use thiserror::Error;

use crate::byte_decoder;
use crate::enums::{ByteOrder, Encoding};

#[derive(Debug, Error, PartialEq)]
pub enum FormatError {
    #[error("Not an NRRD file")]
    NotRecognized,

    #[error("Only raw or gz/gzip encoding is allowed, found '{0}'")]
    UnsupportedEncoding(String),

    #[error("Only short/int/int8/float data is allowed. Found {0}")]
    UnsupportedType(String),

    #[error("Missing header field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid value '{value}' for header field '{field}'")]
    InvalidValue { field: &'static str, value: String },
}

/// Sample type of the payload, selected once from the `type` header field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementType {
    UInt8,
    Int8,
    /// Every 16-bit type token, signed ones included, reads as unsigned.
    UInt16,
    UInt32,
    Int32,
    Float32,
}

/// Reads one sample at a byte offset and widens it to `f32`.
pub type SampleReader = fn(&[u8], usize) -> f32;

impl ElementType {
    /// Map a `type` header value to an element type.
    pub fn from_token(token: &str) -> Result<Self, FormatError> {
        match token {
            "unsigned char" | "uchar" | "uint8" | "uint8_t" => Ok(Self::UInt8),
            "signed char" | "int8" | "int8_t" => Ok(Self::Int8),
            "short" | "short int" | "signed short" | "signed short int" | "int16" | "int16_t"
            | "ushort" | "unsigned short" | "unsigned short int" | "uint16" | "uint16_t" => {
                Ok(Self::UInt16)
            }
            "int" | "signed int" | "int32" | "int32_t" => Ok(Self::Int32),
            "uint" | "unsigned int" | "uint32" | "uint32_t" => Ok(Self::UInt32),
            "float" => Ok(Self::Float32),
            other => Err(FormatError::UnsupportedType(other.to_string())),
        }
    }

    /// Size of each element in bytes.
    pub const fn byte_size(self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::UInt16 => 2,
            Self::UInt32 | Self::Int32 | Self::Float32 => 4,
        }
    }

    /// Pick the reader for this type, swapped when the payload is big-endian.
    ///
    /// Single-byte types ignore the byte order.
    pub fn reader(self, byte_order: ByteOrder) -> SampleReader {
        match (self, byte_order) {
            (Self::UInt8, _) => |b, o| f32::from(byte_decoder::read_uint8(b, o)),
            (Self::Int8, _) => |b, o| f32::from(byte_decoder::read_int8(b, o)),
            (Self::UInt16, ByteOrder::Little) => |b, o| f32::from(byte_decoder::read_uint16(b, o)),
            (Self::UInt16, ByteOrder::Big) => {
                |b, o| f32::from(byte_decoder::read_uint16_swapped(b, o))
            }
            (Self::UInt32, ByteOrder::Little) => |b, o| byte_decoder::read_uint32(b, o) as f32,
            (Self::UInt32, ByteOrder::Big) => |b, o| byte_decoder::read_uint32_swapped(b, o) as f32,
            (Self::Int32, ByteOrder::Little) => |b, o| byte_decoder::read_int32(b, o) as f32,
            (Self::Int32, ByteOrder::Big) => |b, o| byte_decoder::read_int32_swapped(b, o) as f32,
            (Self::Float32, ByteOrder::Little) => byte_decoder::read_float32,
            (Self::Float32, ByteOrder::Big) => byte_decoder::read_float32_swapped,
        }
    }
}

/// Typed representation of a parsed header.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeDescriptor {
    /// Declared dimensionality, 1 to 4.
    pub dimension: usize,
    /// Extents along x, y and z. Missing trailing axes are padded with 1.
    pub sizes: [usize; 3],
    /// One direction vector per axis, its length being the sample spacing.
    pub axis_vectors: [[f32; 3]; 3],
    pub element_type: ElementType,
    pub encoding: Encoding,
    pub byte_order: ByteOrder,
    /// Header fields without a dedicated slot, stored verbatim.
    pub properties: HashMap<String, String>,
}

impl VolumeDescriptor {
    /// Number of samples the payload has to hold, `None` if it overflows.
    pub fn element_count(&self) -> Option<usize> {
        checked_product(&self.sizes)
    }

    /// Euclidean length of each axis vector.
    pub fn spacing(&self) -> [f32; 3] {
        self.axis_vectors
            .map(|v| (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt())
    }
}

/// Product of `extents`, `None` on overflow.
pub fn checked_product(extents: &[usize]) -> Option<usize> {
    extents.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n))
}

const UNIT_VECTORS: [[f32; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Split a file into its header text and the payload after the blank line.
///
/// Returns `None` when no blank line terminates the header. Bytes that are
/// not valid UTF-8 are replaced, the fields themselves are plain ASCII.
pub fn split_header(data: &[u8]) -> Option<(Cow<'_, str>, &[u8])> {
    let (header_end, payload_start) = data.windows(2).enumerate().find_map(|(i, pair)| {
        match pair {
            b"\n\n" => Some((i, i + 2)),
            b"\n\r" if data.get(i + 2) == Some(&b'\n') => Some((i, i + 3)),
            _ => None,
        }
    })?;

    let mut header = &data[..header_end];
    if header.last() == Some(&b'\r') {
        header = &header[..header.len() - 1];
    }
    Some((String::from_utf8_lossy(header), &data[payload_start..]))
}

/// Parse the header text into a [`VolumeDescriptor`].
///
/// # Errors
///
/// Fails if the magic line is missing, the encoding is neither raw nor
/// gzip, the element type is not supported, or `type`/`sizes` are missing or
/// malformed.
pub fn parse_header(text: &str) -> Result<VolumeDescriptor, FormatError> {
    let mut is_nrrd = false;
    let mut element_type = None;
    let mut encoding = None;
    let mut byte_order = ByteOrder::default();
    let mut dimension = None;
    let mut sizes = None;
    let mut vectors = None;
    let mut spacings = None;
    let mut properties = HashMap::new();

    for line in text.lines() {
        if is_magic_line(line) {
            is_nrrd = true;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        let Some((field, data)) = line.split_once(':') else {
            continue;
        };
        let (field, data) = (field.trim(), data.trim());

        match field {
            "type" => element_type = Some(ElementType::from_token(data)?),
            "encoding" => encoding = Some(data.to_string()),
            "endian" => byte_order = parse_endian(data)?,
            "dimension" => dimension = Some(parse_number::<usize>("dimension", data)?),
            "sizes" => sizes = Some(parse_sizes(data)?),
            "space directions" => vectors = Some(parse_space_directions(data)),
            "spacings" => spacings = Some(parse_spacings(data)),
            _ => {
                properties.insert(field.to_string(), data.to_string());
            }
        }
    }

    if !is_nrrd {
        return Err(FormatError::NotRecognized);
    }

    let encoding = match encoding.as_deref() {
        Some("raw") => Encoding::Raw,
        Some("gzip") | Some("gz") => Encoding::Gzip,
        other => {
            return Err(FormatError::UnsupportedEncoding(
                other.unwrap_or_default().to_string(),
            ));
        }
    };
    let element_type = element_type.ok_or(FormatError::MissingField("type"))?;
    let sizes = sizes.ok_or(FormatError::MissingField("sizes"))?;
    let dimension = dimension.unwrap_or(sizes.len());
    if !(1..=4).contains(&dimension) || dimension != sizes.len() {
        return Err(FormatError::InvalidValue {
            field: "dimension",
            value: dimension.to_string(),
        });
    }

    let axis_vectors = match vectors {
        Some(vectors) => complete_vectors(vectors),
        None => scaled_unit_vectors(spacings.as_deref()),
    };

    let mut padded = [1; 3];
    for (slot, size) in padded.iter_mut().zip(&sizes) {
        *slot = *size;
    }
    if checked_product(&sizes).is_none() {
        return Err(FormatError::InvalidValue {
            field: "sizes",
            value: format!("{sizes:?}"),
        });
    }

    Ok(VolumeDescriptor {
        dimension,
        sizes: padded,
        axis_vectors,
        element_type,
        encoding,
        byte_order,
        properties,
    })
}

fn is_magic_line(line: &str) -> bool {
    line.find("NRRD").is_some_and(|start| {
        line[start + 4..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    })
}

fn parse_endian(data: &str) -> Result<ByteOrder, FormatError> {
    match data {
        "little" => Ok(ByteOrder::Little),
        "big" => Ok(ByteOrder::Big),
        other => Err(FormatError::InvalidValue {
            field: "endian",
            value: other.to_string(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, data: &str) -> Result<T, FormatError> {
    data.parse().map_err(|_| FormatError::InvalidValue {
        field,
        value: data.to_string(),
    })
}

fn parse_sizes(data: &str) -> Result<Vec<usize>, FormatError> {
    let sizes = data
        .split_whitespace()
        .map(|token| parse_number::<usize>("sizes", token))
        .collect::<Result<Vec<_>, _>>()?;

    if sizes.is_empty() || sizes.contains(&0) {
        return Err(FormatError::InvalidValue {
            field: "sizes",
            value: data.to_string(),
        });
    }
    Ok(sizes)
}

/// Collect the parenthesised vectors, skipping `none` entries. A malformed
/// group keeps its slot with the unit vector of that axis.
fn parse_space_directions(data: &str) -> Vec<[f32; 3]> {
    let mut vectors = Vec::new();
    let mut rest = data;

    while let Some(open) = rest.find('(') {
        let Some(close) = rest[open..].find(')') else {
            break;
        };
        let group = &rest[open + 1..open + close];
        rest = &rest[open + close + 1..];

        let components: Vec<f32> = group
            .split(',')
            .map(|c| c.trim().parse().unwrap_or(f32::NAN))
            .collect();
        match components.as_slice() {
            [x, y, z] => vectors.push([*x, *y, *z]),
            _ => {
                warn!("malformed space direction '({group})', using unit vector");
                let axis = vectors.len();
                vectors.push(UNIT_VECTORS.get(axis).copied().unwrap_or([0.0; 3]));
            }
        }
    }
    vectors
}

fn parse_spacings(data: &str) -> Vec<f32> {
    data.split_whitespace()
        .map(|token| token.parse().unwrap_or(f32::NAN))
        .collect()
}

fn complete_vectors(vectors: Vec<[f32; 3]>) -> [[f32; 3]; 3] {
    let mut complete = UNIT_VECTORS;
    for (slot, vector) in complete.iter_mut().zip(vectors) {
        *slot = vector;
    }
    complete
}

fn scaled_unit_vectors(spacings: Option<&[f32]>) -> [[f32; 3]; 3] {
    let mut vectors = UNIT_VECTORS;
    let Some(spacings) = spacings else {
        return vectors;
    };

    for (axis, vector) in vectors.iter_mut().enumerate() {
        match spacings.get(axis) {
            Some(spacing) if !spacing.is_nan() => {
                vector.iter_mut().for_each(|c| *c *= spacing);
            }
            Some(_) => warn!("spacing for axis {axis} is not a number, keeping unit length"),
            None => {}
        }
    }
    vectors
}
