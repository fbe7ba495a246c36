use std::io::Write;

use byteorder::{ByteOrder, NativeEndian, WriteBytesExt};

use super::{next_row_len, WriteProp, Writer};
use crate::errors::{PlyError, PlyResult};
use crate::ply::{DataCursor, ScalarType};

impl Writer {
    pub(crate) fn write_binary_row<T: Write, B: ByteOrder>(
        &self,
        out: &mut T,
        props: &[WriteProp],
    ) -> PlyResult<usize> {
        let mut written = 0;
        for p in props {
            let mut c = p.cursor.borrow_mut();
            match p.length_type {
                None => written += write_binary_scalar::<T, B>(out, p.data_type, &mut c)?,
                Some(lt) => {
                    let len = next_row_len(&mut c)?;
                    written += write_binary_length::<T, B>(out, lt, len)?;
                    for _ in 0..len {
                        written += write_binary_scalar::<T, B>(out, p.data_type, &mut c)?;
                    }
                }
            }
        }
        Ok(written)
    }
}

/// Emits the next scalar of `c` in byte order `B` and advances its offset.
fn write_binary_scalar<T: Write, B: ByteOrder>(
    out: &mut T,
    t: ScalarType,
    c: &mut DataCursor,
) -> PlyResult<usize> {
    let stride = t.stride();
    let off = c.offset;
    if off + stride > c.buffer.len() {
        return Err(PlyError::Argument(
            "Attached buffer too small for the declared element count.".to_string(),
        ));
    }
    let bytes = &c.buffer[off..off + stride];
    match t {
        ScalarType::Char => out.write_i8(bytes[0] as i8)?,
        ScalarType::UChar => out.write_u8(bytes[0])?,
        ScalarType::Short => out.write_i16::<B>(NativeEndian::read_i16(bytes))?,
        ScalarType::UShort => out.write_u16::<B>(NativeEndian::read_u16(bytes))?,
        ScalarType::Int => out.write_i32::<B>(NativeEndian::read_i32(bytes))?,
        ScalarType::UInt => out.write_u32::<B>(NativeEndian::read_u32(bytes))?,
        ScalarType::Float => out.write_f32::<B>(NativeEndian::read_f32(bytes))?,
        ScalarType::Double => out.write_f64::<B>(NativeEndian::read_f64(bytes))?,
        ScalarType::Invalid => {
            return Err(PlyError::Argument(
                "Cannot write a value of invalid type.".to_string(),
            ))
        }
    }
    c.offset += stride;
    Ok(stride)
}

fn write_binary_length<T: Write, B: ByteOrder>(
    out: &mut T,
    t: ScalarType,
    len: usize,
) -> PlyResult<usize> {
    match t {
        ScalarType::Char => out.write_i8(len as i8)?,
        ScalarType::UChar => out.write_u8(len as u8)?,
        ScalarType::Short => out.write_i16::<B>(len as i16)?,
        ScalarType::UShort => out.write_u16::<B>(len as u16)?,
        ScalarType::Int => out.write_i32::<B>(len as i32)?,
        ScalarType::UInt => out.write_u32::<B>(len as u32)?,
        ScalarType::Float | ScalarType::Double | ScalarType::Invalid => {
            return Err(PlyError::Argument(format!(
                "List length type must be an integer type, got '{}'.",
                t
            )))
        }
    }
    Ok(t.stride())
}
