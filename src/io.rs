//! Persistence format for layouts and sparse matrices
//!
//! ```text
//! magic      4 bytes  b"SEGM"
//! version    u32 LE
//! layout     u8       SegmentsKind tag
//! org        u8       ElementsOrganization tag
//! index      u8       DType tag of the index type
//! value      u8       DType tag of the value type, 0xFF for bare layouts
//! params     3 x u64 LE, layout specific
//! arrays     u64 LE length, then the elements' native-order bytes
//! ```
//!
//! Arrays are written verbatim in the layout's own order. Reading never
//! converts: a stream for another layout, organization or dtype is rejected
//! with [`Error::IncompatibleLayout`].

use crate::dtype::{DType, SegmentIndex};
use crate::error::{Error, Result};
use crate::segments::{ElementsOrganization, Segments, SegmentsKind};
use bytemuck::Pod;
use std::io::{Read, Write};

/// Stream magic
pub const MAGIC: [u8; 4] = *b"SEGM";

/// Current format version
pub const FORMAT_VERSION: u32 = 1;

const NO_VALUE: u8 = 0xFF;

/// Fixed-size stream header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// Layout variant
    pub kind: SegmentsKind,
    /// Slot placement
    pub organization: ElementsOrganization,
    /// Index type of the metadata arrays
    pub index: DType,
    /// Value type for matrices, `None` for bare layouts
    pub value: Option<DType>,
    /// Layout parameters (alignment, slice size, strip size)
    pub params: [u64; 3],
}

impl Header {
    /// Header describing `layout`
    pub fn for_layout<I: SegmentIndex, S: Segments<I>>(layout: &S, value: Option<DType>) -> Self {
        Self {
            kind: layout.kind(),
            organization: layout.organization(),
            index: I::DTYPE,
            value,
            params: layout.header_params(),
        }
    }

    /// Serialize the header
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&[
            self.kind.tag(),
            self.organization.tag(),
            self.index.tag(),
            self.value.map_or(NO_VALUE, DType::tag),
        ])?;
        for param in self.params {
            writer.write_all(&param.to_le_bytes())?;
        }
        Ok(())
    }

    /// Deserialize a header
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::incompatible(
                "SEGM stream",
                format!("magic {magic:02x?}"),
            ));
        }

        let version = read_u32(reader)?;
        if version != FORMAT_VERSION {
            return Err(Error::incompatible(
                format!("format version {FORMAT_VERSION}"),
                format!("format version {version}"),
            ));
        }

        let mut tags = [0u8; 4];
        reader.read_exact(&mut tags)?;
        let kind = SegmentsKind::from_tag(tags[0])
            .ok_or_else(|| Error::incompatible("layout tag", format!("unknown tag {}", tags[0])))?;
        let organization = ElementsOrganization::from_tag(tags[1]).ok_or_else(|| {
            Error::incompatible("organization tag", format!("unknown tag {}", tags[1]))
        })?;
        let index = DType::from_tag(tags[2])
            .ok_or_else(|| Error::incompatible("index dtype", format!("unknown tag {}", tags[2])))?;
        let value = match tags[3] {
            NO_VALUE => None,
            tag => Some(DType::from_tag(tag).ok_or_else(|| {
                Error::incompatible("value dtype", format!("unknown tag {tag}"))
            })?),
        };

        let mut params = [0u64; 3];
        for param in &mut params {
            *param = read_u64(reader)?;
        }

        Ok(Self {
            kind,
            organization,
            index,
            value,
            params,
        })
    }

    /// Require a layout variant and index type
    pub fn expect_layout<I: SegmentIndex>(&self, kind: SegmentsKind) -> Result<()> {
        if self.kind != kind {
            return Err(Error::incompatible(kind, self.kind));
        }
        if self.index != I::DTYPE {
            return Err(Error::incompatible(
                format!("index type {}", I::DTYPE),
                format!("index type {}", self.index),
            ));
        }
        Ok(())
    }

    /// Require an organization
    pub fn expect_organization(&self, organization: ElementsOrganization) -> Result<()> {
        if self.organization != organization {
            return Err(Error::incompatible(organization, self.organization));
        }
        Ok(())
    }

    /// Require a value type (`None` for bare layouts)
    pub fn expect_value(&self, value: Option<DType>) -> Result<()> {
        if self.value != value {
            let describe = |v: Option<DType>| match v {
                Some(dtype) => format!("matrix of {dtype}"),
                None => "bare layout".to_string(),
            };
            return Err(Error::incompatible(describe(value), describe(self.value)));
        }
        Ok(())
    }

    /// Layout parameter `i` as `usize`
    pub fn param(&self, i: usize) -> Result<usize> {
        usize::try_from(self.params[i])
            .map_err(|_| Error::invalid_argument("params", format!("{} exceeds usize", self.params[i])))
    }
}

/// Write a length-prefixed array
pub fn write_array<T: Pod, W: Write>(writer: &mut W, data: &[T]) -> Result<()> {
    writer.write_all(&(data.len() as u64).to_le_bytes())?;
    writer.write_all(bytemuck::cast_slice(data))?;
    Ok(())
}

/// Read a length-prefixed array
///
/// Bytes are read before the typed buffer is allocated, so a corrupt length
/// ends in an I/O error rather than a huge allocation.
pub fn read_array<T: Pod, R: Read>(reader: &mut R) -> Result<Vec<T>> {
    let len = usize::try_from(read_u64(reader)?)
        .map_err(|_| Error::invalid_argument("array length", "exceeds usize"))?;
    let byte_len = len
        .checked_mul(size_of::<T>())
        .ok_or_else(|| Error::invalid_argument("array length", format!("{len} elements overflow")))?;

    let mut bytes = Vec::new();
    reader.by_ref().take(byte_len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != byte_len {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("array truncated: {} of {byte_len} bytes", bytes.len()),
        )));
    }

    let mut out = vec![T::zeroed(); len];
    bytemuck::cast_slice_mut::<T, u8>(&mut out).copy_from_slice(&bytes);
    Ok(out)
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
