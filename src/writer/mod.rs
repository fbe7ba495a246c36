//! Emits the canonical header and the payload held by the cursor map.

use std::io::Write;

use byteorder::{BigEndian, LittleEndian};
use log::debug;

use crate::errors::{PlyError, PlyResult};
use crate::ply::{
    request_key, DataCursor, ElementDef, Encoding, Header, KeyMap, PropertyDef, PropertyType,
    ScalarType, SharedCursor,
};

mod ascii;
mod binary;

/// Binding of one declared property to the cursor supplying its data.
pub(crate) struct WriteProp {
    pub(crate) data_type: ScalarType,
    /// `Some` for list properties; holds the length prefix type.
    pub(crate) length_type: Option<ScalarType>,
    pub(crate) cursor: SharedCursor,
}

/// Picks the length of the next list row of `cursor`.
pub(crate) fn next_row_len(cursor: &mut DataCursor) -> PlyResult<usize> {
    if cursor.fixed_list_len != 0 {
        return Ok(cursor.fixed_list_len);
    }
    let i = cursor.row;
    cursor.row += 1;
    cursor.list_counts.get(i).copied().ok_or_else(|| {
        PlyError::Argument("List lengths exhausted before all rows were written.".to_string())
    })
}

/// Canonical header spelling of `t`. `Invalid` never belongs in a header.
fn spelled(t: ScalarType) -> PlyResult<&'static str> {
    if t == ScalarType::Invalid {
        return Err(PlyError::Argument(
            "Cannot write a property of invalid type.".to_string(),
        ));
    }
    Ok(t.name())
}

/// Writes a PLY file to a `Write` sink.
///
/// The header is emitted in canonical form: short type spellings, one
/// space between tokens, comments before obj_info lines, `obj_info` and
/// `comment` text preceded by exactly one space. The payload is read back
/// out of the same cursors `read` or `add_properties_to_element` filled.
/// In most cases `PlyFile::write` should suffice; `write_header` and
/// `write_payload` are public for callers that emit the two parts
/// separately.
pub struct Writer {
    /// Should be fairly efficient, see `as_bytes()` in https://doc.rust-lang.org/src/collections/string.rs.html#1001
    new_line: String,
}

impl Default for Writer {
    fn default() -> Self {
        Writer::new()
    }
}

impl Writer {
    pub fn new() -> Self {
        Writer {
            new_line: "\n".to_string(),
        }
    }
    /// Writes an entire PLY file from `header` and the cursors bound in
    /// `requests`. Every declared property must have a cursor attached.
    ///
    /// Returns number of bytes written.
    pub fn write_ply<T: Write>(
        &self,
        out: &mut T,
        header: &Header,
        requests: &KeyMap<SharedCursor>,
    ) -> PlyResult<usize> {
        debug!("writing {} file", header.encoding);
        for cursor in requests.values() {
            cursor.borrow_mut().rewind();
        }
        let mut written = self.write_header(out, header)?;
        written += self.write_payload(out, header, requests)?;
        out.flush()?;
        Ok(written)
    }

    /// Writes the complete header, from the `ply` magic through the
    /// `end_header` line.
    pub fn write_header<T: Write>(&self, out: &mut T, header: &Header) -> PlyResult<usize> {
        let text = self.render_header(header)?;
        out.write_all(text.as_bytes())?;
        Ok(text.len())
    }

    /// Assembles the whole header in memory first. Headers are tiny next
    /// to payloads, and rendering up front means a malformed definition
    /// fails before a single byte reaches the sink.
    fn render_header(&self, header: &Header) -> PlyResult<String> {
        let mut text = String::new();
        text.push_str("ply");
        text.push_str(&self.new_line);
        text.push_str(&format!("format {} {}", header.encoding.token(), header.version));
        text.push_str(&self.new_line);
        for entry in &header.comments {
            text.push_str("comment ");
            text.push_str(entry);
            text.push_str(&self.new_line);
        }
        for entry in &header.obj_infos {
            text.push_str("obj_info ");
            text.push_str(entry);
            text.push_str(&self.new_line);
        }
        for element in header.elements.values() {
            text.push_str(&format!("element {} {}", element.name, element.count));
            text.push_str(&self.new_line);
            for property in element.properties.values() {
                self.push_property_line(&mut text, property)?;
            }
        }
        text.push_str("end_header");
        text.push_str(&self.new_line);
        Ok(text)
    }

    fn push_property_line(&self, text: &mut String, property: &PropertyDef) -> PlyResult<()> {
        match property.data_type {
            PropertyType::Scalar(item) => {
                text.push_str(&format!("property {} {}", spelled(item)?, property.name));
            }
            PropertyType::List(len_type, item) => {
                if !len_type.is_integer() {
                    return Err(PlyError::Argument(format!(
                        "List length type must be an integer type, got '{}'.",
                        len_type
                    )));
                }
                text.push_str(&format!(
                    "property list {} {} {}",
                    spelled(len_type)?,
                    spelled(item)?,
                    property.name
                ));
            }
        }
        text.push_str(&self.new_line);
        Ok(())
    }

    // ///// Payload

    /// Writes the payload of every element, in declaration order.
    pub fn write_payload<T: Write>(
        &self,
        out: &mut T,
        header: &Header,
        requests: &KeyMap<SharedCursor>,
    ) -> PlyResult<usize> {
        let mut written = 0;
        for (element_name, element) in &header.elements {
            let bindings = self.bind_element(element_name, element, requests)?;
            written += self.write_payload_of_element(out, &bindings, element, header)?;
        }
        Ok(written)
    }
    /// Writes all instances of one element from its bound cursors.
    fn write_payload_of_element<T: Write>(
        &self,
        out: &mut T,
        bindings: &[WriteProp],
        element: &ElementDef,
        header: &Header,
    ) -> PlyResult<usize> {
        let mut written = 0;
        match header.encoding {
            Encoding::Ascii => {
                for _ in 0..element.count {
                    written += self.write_ascii_row(out, bindings)?;
                }
            }
            Encoding::BinaryBigEndian => {
                for _ in 0..element.count {
                    written += self.write_binary_row::<T, BigEndian>(out, bindings)?;
                }
            }
            Encoding::BinaryLittleEndian => {
                for _ in 0..element.count {
                    written += self.write_binary_row::<T, LittleEndian>(out, bindings)?;
                }
            }
        }
        Ok(written)
    }
    fn bind_element(
        &self,
        element_name: &str,
        element: &ElementDef,
        requests: &KeyMap<SharedCursor>,
    ) -> PlyResult<Vec<WriteProp>> {
        element
            .properties
            .values()
            .map(|p| {
                let cursor = requests
                    .get(&request_key(element_name, &p.name))
                    .cloned()
                    .ok_or_else(|| {
                        PlyError::Argument(format!(
                            "No data attached for property '{}' of element '{}'.",
                            p.name, element_name
                        ))
                    })?;
                Ok(match p.data_type {
                    PropertyType::Scalar(t) => WriteProp {
                        data_type: t,
                        length_type: None,
                        cursor,
                    },
                    PropertyType::List(lt, t) => WriteProp {
                        data_type: t,
                        length_type: Some(lt),
                        cursor,
                    },
                })
            })
            .collect()
    }
    fn write_new_line<T: Write>(&self, out: &mut T) -> PlyResult<usize> {
        Ok(out.write(self.new_line.as_bytes())?)
    }
}
