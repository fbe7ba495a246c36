use std::io::Write;

use byteorder::{ByteOrder, NativeEndian};

use super::{next_row_len, WriteProp, Writer};
use crate::errors::{PlyError, PlyResult};
use crate::ply::{DataCursor, ScalarType};

impl Writer {
    /// Writes one element instance: space separated values, one line.
    pub(crate) fn write_ascii_row<T: Write>(
        &self,
        out: &mut T,
        props: &[WriteProp],
    ) -> PlyResult<usize> {
        let mut written = 0;
        let mut first = true;
        for p in props {
            if !first {
                written += out.write(" ".as_bytes())?;
            }
            first = false;
            let mut c = p.cursor.borrow_mut();
            match p.length_type {
                None => written += write_ascii_scalar(out, p.data_type, &mut c)?,
                Some(_) => {
                    let len = next_row_len(&mut c)?;
                    written += out.write(len.to_string().as_bytes())?;
                    for _ in 0..len {
                        written += out.write(" ".as_bytes())?;
                        written += write_ascii_scalar(out, p.data_type, &mut c)?;
                    }
                }
            }
        }
        written += self.write_new_line(out)?;
        Ok(written)
    }
}

/// Formats the next scalar of `c` and advances its offset.
///
/// `to_string` keeps the shortest representation that parses back to the
/// identical value, so ascii round trips are lossless.
fn write_ascii_scalar<T: Write>(out: &mut T, t: ScalarType, c: &mut DataCursor) -> PlyResult<usize> {
    let stride = t.stride();
    let off = c.offset;
    if off + stride > c.buffer.len() {
        return Err(PlyError::Argument(
            "Attached buffer too small for the declared element count.".to_string(),
        ));
    }
    let bytes = &c.buffer[off..off + stride];
    let s = match t {
        ScalarType::Char => (bytes[0] as i8).to_string(),
        ScalarType::UChar => bytes[0].to_string(),
        ScalarType::Short => NativeEndian::read_i16(bytes).to_string(),
        ScalarType::UShort => NativeEndian::read_u16(bytes).to_string(),
        ScalarType::Int => NativeEndian::read_i32(bytes).to_string(),
        ScalarType::UInt => NativeEndian::read_u32(bytes).to_string(),
        ScalarType::Float => NativeEndian::read_f32(bytes).to_string(),
        ScalarType::Double => NativeEndian::read_f64(bytes).to_string(),
        ScalarType::Invalid => {
            return Err(PlyError::Argument(
                "Cannot write a value of invalid type.".to_string(),
            ))
        }
    };
    c.offset += stride;
    Ok(out.write(s.as_bytes())?)
}
