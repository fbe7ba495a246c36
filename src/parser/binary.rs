use std::io::Read;

use byteorder::{ByteOrder, NativeEndian, ReadBytesExt, WriteBytesExt};
use log::trace;

use super::{bind_element, check_fixed_len, eof_to_payload, Parser, Pass, PropScan};
use crate::errors::{PlyError, PlyResult};
use crate::ply::{Header, KeyMap, ScalarType, SharedCursor};
use crate::util::{skip_bytes, LocationTracker};

/// # Binary
impl Parser {
    pub(crate) fn scan_binary_payload<T: Read, B: ByteOrder>(
        &self,
        reader: &mut T,
        location: &mut LocationTracker,
        header: &Header,
        requests: &KeyMap<SharedCursor>,
        pass: Pass,
    ) -> PlyResult<()> {
        for (element_name, element) in &header.elements {
            let bindings = bind_element(element_name, element, requests);
            trace!("scanning element '{}', {} instance(s)", element_name, element.count);
            for _ in 0..element.count {
                for b in &bindings {
                    match b.length_type {
                        None => self.scan_binary_scalar::<T, B>(reader, b, pass)?,
                        Some(lt) => self.scan_binary_list::<T, B>(reader, b, lt, pass)?,
                    }
                }
                location.next_line();
            }
        }
        Ok(())
    }

    fn scan_binary_scalar<T: Read, B: ByteOrder>(
        &self,
        reader: &mut T,
        b: &PropScan,
        pass: Pass,
    ) -> PlyResult<()> {
        let stride = b.data_type.stride();
        match (&b.cursor, pass) {
            (Some(cursor), Pass::Sizing) => {
                cursor.borrow_mut().size_bytes += stride;
                skip_bytes(reader, stride).map_err(eof_to_payload)
            }
            (Some(cursor), Pass::Copy { .. }) => {
                let mut c = cursor.borrow_mut();
                read_scalar_into::<T, B>(reader, b.data_type, &mut c.buffer)
                    .map_err(eof_to_payload)?;
                c.offset += stride;
                Ok(())
            }
            (None, _) => skip_bytes(reader, stride).map_err(eof_to_payload),
        }
    }

    fn scan_binary_list<T: Read, B: ByteOrder>(
        &self,
        reader: &mut T,
        b: &PropScan,
        length_type: ScalarType,
        pass: Pass,
    ) -> PlyResult<()> {
        let len = read_list_length::<T, B>(reader, length_type).map_err(eof_to_payload)?;
        let stride = b.data_type.stride();
        match (&b.cursor, pass) {
            (Some(cursor), Pass::Sizing) => {
                {
                    let mut c = cursor.borrow_mut();
                    check_fixed_len(&c, len)?;
                    c.size_bytes += len * stride;
                    c.list_counts.push(len);
                }
                skip_bytes(reader, len * stride).map_err(eof_to_payload)
            }
            (Some(cursor), Pass::Copy { record_lengths }) => {
                let mut c = cursor.borrow_mut();
                check_fixed_len(&c, len)?;
                if record_lengths {
                    c.list_counts.push(len);
                }
                for _ in 0..len {
                    read_scalar_into::<T, B>(reader, b.data_type, &mut c.buffer)
                        .map_err(eof_to_payload)?;
                }
                c.offset += len * stride;
                Ok(())
            }
            (None, _) => skip_bytes(reader, len * stride).map_err(eof_to_payload),
        }
    }
}

/// Decodes one scalar from the source into the destination buffer.
///
/// The source bytes are in the file's byte order `B`; the destination is
/// always host order, so little- and big-endian sources converge on
/// identical buffers.
fn read_scalar_into<T: Read, B: ByteOrder>(
    reader: &mut T,
    t: ScalarType,
    out: &mut Vec<u8>,
) -> PlyResult<()> {
    match t {
        ScalarType::Char => out.write_i8(reader.read_i8()?)?,
        ScalarType::UChar => out.write_u8(reader.read_u8()?)?,
        ScalarType::Short => out.write_i16::<NativeEndian>(reader.read_i16::<B>()?)?,
        ScalarType::UShort => out.write_u16::<NativeEndian>(reader.read_u16::<B>()?)?,
        ScalarType::Int => out.write_i32::<NativeEndian>(reader.read_i32::<B>()?)?,
        ScalarType::UInt => out.write_u32::<NativeEndian>(reader.read_u32::<B>()?)?,
        ScalarType::Float => out.write_f32::<NativeEndian>(reader.read_f32::<B>()?)?,
        ScalarType::Double => out.write_f64::<NativeEndian>(reader.read_f64::<B>()?)?,
        ScalarType::Invalid => {
            return Err(PlyError::Payload(
                "Property with invalid scalar type.".to_string(),
            ))
        }
    }
    Ok(())
}

fn read_list_length<T: Read, B: ByteOrder>(
    reader: &mut T,
    length_type: ScalarType,
) -> PlyResult<usize> {
    let len: i64 = match length_type {
        ScalarType::Char => reader.read_i8()? as i64,
        ScalarType::UChar => reader.read_u8()? as i64,
        ScalarType::Short => reader.read_i16::<B>()? as i64,
        ScalarType::UShort => reader.read_u16::<B>()? as i64,
        ScalarType::Int => reader.read_i32::<B>()? as i64,
        ScalarType::UInt => reader.read_u32::<B>()? as i64,
        ScalarType::Float | ScalarType::Double | ScalarType::Invalid => {
            return Err(PlyError::Payload(format!(
                "List length prefix must be an integer type, got '{}'.",
                length_type
            )))
        }
    };
    if len < 0 {
        return Err(PlyError::Payload(format!("Negative list length '{}'.", len)));
    }
    Ok(len as usize)
}
