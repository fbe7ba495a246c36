use std::fmt::Debug;
use std::io::BufRead;
use std::slice::Iter;
use std::str::FromStr;

use byteorder::{NativeEndian, WriteBytesExt};
use log::trace;

use super::ply_grammar::grammar;
use super::{bind_element, check_fixed_len, Parser, Pass, PropScan};
use crate::errors::{PlyError, PlyResult};
use crate::ply::{Header, KeyMap, ScalarType, SharedCursor};
use crate::util::LocationTracker;

/// # Ascii
impl Parser {
    pub(crate) fn scan_ascii_payload<T: BufRead>(
        &self,
        reader: &mut T,
        location: &mut LocationTracker,
        header: &Header,
        requests: &KeyMap<SharedCursor>,
        pass: Pass,
    ) -> PlyResult<()> {
        let mut line_str = String::new();
        for (element_name, element) in &header.elements {
            let bindings = bind_element(element_name, element, requests);
            trace!("scanning element '{}', {} instance(s)", element_name, element.count);
            for _ in 0..element.count {
                line_str.clear();
                if reader.read_line(&mut line_str)? == 0 {
                    return Err(PlyError::Payload(format!(
                        "Unexpected end of payload in element '{}'.",
                        element_name
                    )));
                }
                let tokens = match grammar::data_line(&line_str) {
                    Ok(t) => t,
                    Err(e) => {
                        return Err(PlyError::Payload(format!(
                            "Line {}: couldn't tokenize payload line.\n\tString: '{}'\n\tError: {}",
                            location.line_index, line_str, e
                        )))
                    }
                };
                let mut token_it = tokens.iter();
                for b in &bindings {
                    match b.length_type {
                        None => self.scan_ascii_scalar(&mut token_it, b, pass)?,
                        Some(lt) => self.scan_ascii_list(&mut token_it, b, lt, pass)?,
                    }
                }
                location.next_line();
            }
        }
        Ok(())
    }

    fn scan_ascii_scalar(
        &self,
        token_it: &mut Iter<String>,
        b: &PropScan,
        pass: Pass,
    ) -> PlyResult<()> {
        let s = next_token(token_it, b.data_type)?;
        match (&b.cursor, pass) {
            (Some(cursor), Pass::Sizing) => {
                cursor.borrow_mut().size_bytes += b.data_type.stride();
                Ok(())
            }
            (Some(cursor), Pass::Copy { .. }) => {
                let mut c = cursor.borrow_mut();
                parse_scalar_into(s, b.data_type, &mut c.buffer)?;
                c.offset += b.data_type.stride();
                Ok(())
            }
            // token is already consumed, nothing left to do
            (None, _) => Ok(()),
        }
    }

    fn scan_ascii_list(
        &self,
        token_it: &mut Iter<String>,
        b: &PropScan,
        length_type: ScalarType,
        pass: Pass,
    ) -> PlyResult<()> {
        if !length_type.is_integer() {
            return Err(PlyError::Payload(format!(
                "List length prefix must be an integer type, got '{}'.",
                length_type
            )));
        }
        let s = next_token(token_it, length_type)?;
        let len = parse_list_length(s)?;
        let stride = b.data_type.stride();
        match (&b.cursor, pass) {
            (Some(cursor), Pass::Sizing) => {
                {
                    let mut c = cursor.borrow_mut();
                    check_fixed_len(&c, len)?;
                    c.size_bytes += len * stride;
                    c.list_counts.push(len);
                }
                self.consume_tokens(token_it, len)
            }
            (Some(cursor), Pass::Copy { record_lengths }) => {
                let mut c = cursor.borrow_mut();
                check_fixed_len(&c, len)?;
                if record_lengths {
                    c.list_counts.push(len);
                }
                for _ in 0..len {
                    let s = next_token(token_it, b.data_type)?;
                    parse_scalar_into(s, b.data_type, &mut c.buffer)?;
                }
                c.offset += len * stride;
                Ok(())
            }
            (None, _) => self.consume_tokens(token_it, len),
        }
    }

    fn consume_tokens(&self, token_it: &mut Iter<String>, n: usize) -> PlyResult<()> {
        for i in 0..n {
            if token_it.next().is_none() {
                return Err(PlyError::Payload(format!(
                    "Couldn't find a list element at index {}.",
                    i
                )));
            }
        }
        Ok(())
    }
}

fn next_token<'a>(token_it: &mut Iter<'a, String>, expected: ScalarType) -> PlyResult<&'a String> {
    token_it.next().ok_or_else(|| {
        PlyError::Payload(format!(
            "Expected a value of type '{}', but the line ran out of tokens.",
            expected
        ))
    })
}

fn parse<D: FromStr>(s: &str) -> PlyResult<D>
where
    <D as FromStr>::Err: Debug,
{
    s.parse().map_err(|e| {
        PlyError::Payload(format!("Parse error.\n\tValue: '{}'\n\tError: {:?}", s, e))
    })
}

fn parse_list_length(s: &str) -> PlyResult<usize> {
    let len: i64 = parse(s)?;
    if len < 0 {
        return Err(PlyError::Payload(format!("Negative list length '{}'.", len)));
    }
    Ok(len as usize)
}

/// Decodes one ascii token into the destination buffer.
///
/// The 8-bit types are parsed as 32-bit and narrowed; text never holds a
/// raw character, so the usual char-vs-number reading ambiguity does not
/// apply here.
fn parse_scalar_into(s: &str, t: ScalarType, out: &mut Vec<u8>) -> PlyResult<()> {
    match t {
        ScalarType::Char => out.write_i8(parse::<i32>(s)? as i8)?,
        ScalarType::UChar => out.write_u8(parse::<i32>(s)? as u8)?,
        ScalarType::Short => out.write_i16::<NativeEndian>(parse(s)?)?,
        ScalarType::UShort => out.write_u16::<NativeEndian>(parse(s)?)?,
        ScalarType::Int => out.write_i32::<NativeEndian>(parse(s)?)?,
        ScalarType::UInt => out.write_u32::<NativeEndian>(parse(s)?)?,
        ScalarType::Float => out.write_f32::<NativeEndian>(parse(s)?)?,
        ScalarType::Double => out.write_f64::<NativeEndian>(parse(s)?)?,
        ScalarType::Invalid => {
            return Err(PlyError::Payload(
                "Property with invalid scalar type.".to_string(),
            ))
        }
    }
    Ok(())
}
