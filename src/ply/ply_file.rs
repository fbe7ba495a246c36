use std::io::{BufRead, Seek, Write};
use std::rc::Rc;

use byteorder::{ByteOrder, NativeEndian};
use log::debug;

use super::registry::request_key;
use super::{
    Comment, DataCursor, ElementDef, Encoding, Header, KeyMap, NamedInsert, ObjInfo, PropertyDef,
    PropertyType, ScalarType, SharedCursor,
};
use crate::errors::{PlyError, PlyResult};
use crate::parser::Parser;
use crate::writer::Writer;

/// One PLY file: header, metadata, and the cursors bound to its payload.
///
/// Reading is pull-based: after `parse_header` the caller names the
/// (element, property) groups it wants, `read` fills the resulting
/// cursors, and no other payload data is stored. Writing is the inverse:
/// `add_properties_to_element` registers authored data and `write` emits
/// the canonical header followed by the payload.
///
/// # Examples
///
/// ```rust
/// # use ply_cursor::ply::PlyFile;
/// let data = b"ply\n\
/// format ascii 1.0\n\
/// element vertex 2\n\
/// property float x\n\
/// property float y\n\
/// end_header\n\
/// 1 2\n\
/// 3 4\n";
/// let mut src = std::io::Cursor::new(&data[..]);
///
/// let mut file = PlyFile::new();
/// file.parse_header(&mut src).unwrap();
/// let xy = file.request_properties_from_element("vertex", &["x", "y"], 0).unwrap();
/// file.read(&mut src).unwrap();
///
/// let xy = xy.borrow();
/// assert_eq!(xy.count, 2);
/// assert_eq!(xy.buffer.len(), 16); // 2 instances x 2 properties x 4 bytes
/// ```
pub struct PlyFile {
    /// All header information: format, elements, comments, obj_infos.
    pub header: Header,
    pub(crate) requests: KeyMap<SharedCursor>,
}

impl PlyFile {
    pub fn new() -> Self {
        PlyFile {
            header: Header::new(),
            requests: KeyMap::new(),
        }
    }

    /// Reads the header from `src`, which must be positioned at the file
    /// start. On success the source is left at the first payload byte.
    pub fn parse_header<T: BufRead>(&mut self, src: &mut T) -> PlyResult<()> {
        self.header = Parser::new().read_header(src)?;
        Ok(())
    }

    /// Read-only view of the parsed element descriptors, in declaration
    /// order.
    pub fn get_elements(&self) -> &KeyMap<ElementDef> {
        &self.header.elements
    }

    pub fn comments(&self) -> &[Comment] {
        &self.header.comments
    }

    pub fn obj_infos(&self) -> &[ObjInfo] {
        &self.header.obj_infos
    }

    pub fn is_binary(&self) -> bool {
        self.header.encoding != Encoding::Ascii
    }

    pub fn is_big_endian(&self) -> bool {
        self.header.encoding == Encoding::BinaryBigEndian
    }

    /// Binds a group of properties of one element to a fresh cursor.
    ///
    /// All named properties must exist on the element, carry the same
    /// scalar type and the same list-ness, and must not have been bound
    /// before; their values are then laid out interleaved, in declaration
    /// order, in the shared buffer.
    ///
    /// A nonzero `list_size_hint` promises that every row of every listed
    /// list property has exactly that many values. The promise buys a
    /// single-pass `read` with an up-front allocation; a row that breaks
    /// it fails the read with a payload error.
    pub fn request_properties_from_element(
        &mut self,
        element_name: &str,
        property_names: &[&str],
        list_size_hint: usize,
    ) -> PlyResult<SharedCursor> {
        if element_name.is_empty() {
            return Err(PlyError::Argument(
                "Element name must not be empty.".to_string(),
            ));
        }
        if property_names.is_empty() {
            return Err(PlyError::Argument(
                "At least one property name is required.".to_string(),
            ));
        }
        let element = self.header.elements.get(element_name).ok_or_else(|| {
            PlyError::Argument(format!("Element '{}' does not exist.", element_name))
        })?;

        let mut group_type: Option<PropertyType> = None;
        for (i, name) in property_names.iter().enumerate() {
            if property_names[..i].contains(name) {
                return Err(PlyError::Argument(format!(
                    "Property '{}' listed twice in one request.",
                    name
                )));
            }
            let prop = element.property(name).ok_or_else(|| {
                PlyError::Argument(format!(
                    "Element '{}' has no property '{}'.",
                    element_name, name
                ))
            })?;
            match group_type {
                None => group_type = Some(prop.data_type),
                Some(t) => {
                    if t.scalar_type() != prop.data_type.scalar_type()
                        || t.is_list() != prop.data_type.is_list()
                    {
                        return Err(PlyError::Argument(format!(
                            "Property '{}' ({:?}) does not match the rest of the request group ({:?}).",
                            name, prop.data_type, t
                        )));
                    }
                }
            }
            if self.requests.contains_key(&request_key(element_name, name)) {
                return Err(PlyError::Argument(format!(
                    "Property '{}' of element '{}' is already bound.",
                    name, element_name
                )));
            }
        }
        let data_type = match group_type {
            Some(t) => t,
            None => {
                return Err(PlyError::Argument(
                    "At least one property name is required.".to_string(),
                ))
            }
        };
        if list_size_hint != 0 && !data_type.is_list() {
            return Err(PlyError::Argument(
                "A list size hint makes no sense for scalar properties.".to_string(),
            ));
        }

        let cursor = DataCursor::new(
            data_type.scalar_type(),
            data_type.is_list(),
            element.count,
            property_names.len(),
            list_size_hint,
        )
        .into_shared();
        for name in property_names {
            self.requests
                .insert(request_key(element_name, name), Rc::clone(&cursor));
        }
        debug!(
            "bound {} propert(ies) of element '{}'",
            property_names.len(),
            element_name
        );
        Ok(cursor)
    }

    /// Fills all bound cursors from the payload.
    ///
    /// `src` must be positioned at the first payload byte, where
    /// `parse_header` left it. Unless every bound list property came with
    /// a size hint, the payload is traversed twice and the source is
    /// seeked back to the payload start once in between.
    pub fn read<T: BufRead + Seek>(&mut self, src: &mut T) -> PlyResult<()> {
        Parser::new().read_payload(src, &self.header, &self.requests)
    }

    /// Attaches authored data to an existing or newly created element.
    ///
    /// `data` holds `count` instances of the named properties,
    /// interleaved, in host byte order. A `list_type` of
    /// `ScalarType::Invalid` declares scalar properties; otherwise
    /// `list_count` is the fixed per-row list length, or 0 for
    /// variable-length rows, in which case each row in `data` starts with
    /// its own length encoded in `list_type`.
    pub fn add_properties_to_element(
        &mut self,
        element_name: &str,
        property_names: &[&str],
        data_type: ScalarType,
        count: usize,
        data: &[u8],
        list_type: ScalarType,
        list_count: usize,
    ) -> PlyResult<SharedCursor> {
        if element_name.is_empty() {
            return Err(PlyError::Argument(
                "Element name must not be empty.".to_string(),
            ));
        }
        if property_names.is_empty() {
            return Err(PlyError::Argument(
                "At least one property name is required.".to_string(),
            ));
        }
        if data_type == ScalarType::Invalid {
            return Err(PlyError::Argument(
                "Cannot attach data of invalid type.".to_string(),
            ));
        }
        let is_list = list_type != ScalarType::Invalid;
        if is_list && !list_type.is_integer() {
            return Err(PlyError::Argument(format!(
                "List length type must be an integer type, got '{}'.",
                list_type
            )));
        }
        if !is_list && list_count != 0 {
            return Err(PlyError::Argument(
                "A list count makes no sense for scalar properties.".to_string(),
            ));
        }
        if let Some(e) = self.header.elements.get(element_name) {
            if e.count != count {
                return Err(PlyError::Argument(format!(
                    "Element '{}' already has {} instance(s), cannot attach {}.",
                    element_name, e.count, count
                )));
            }
        }
        for (i, name) in property_names.iter().enumerate() {
            if name.is_empty() {
                return Err(PlyError::Argument(
                    "Property name must not be empty.".to_string(),
                ));
            }
            if property_names[..i].contains(name) {
                return Err(PlyError::Argument(format!(
                    "Property '{}' listed twice in one attachment.",
                    name
                )));
            }
            if let Some(e) = self.header.elements.get(element_name) {
                if e.property(name).is_some() {
                    return Err(PlyError::Argument(format!(
                        "Element '{}' already declares property '{}'.",
                        element_name, name
                    )));
                }
            }
            if self.requests.contains_key(&request_key(element_name, name)) {
                return Err(PlyError::Argument(format!(
                    "Property '{}' of element '{}' is already bound.",
                    name, element_name
                )));
            }
        }

        let members = property_names.len();
        let stride = data_type.stride();
        let mut cursor = DataCursor::new(data_type, is_list, count, members, list_count);
        if !is_list || list_count != 0 {
            let per_row = if is_list { list_count } else { 1 };
            let expected = count * members * per_row * stride;
            if data.len() != expected {
                return Err(PlyError::Argument(format!(
                    "Attached buffer is {} byte(s), but {} instance(s) of {} propert(ies) of type '{}' need {}.",
                    data.len(), count, members, data_type, expected
                )));
            }
            cursor.buffer = data.to_vec();
            if is_list {
                cursor.list_counts = vec![list_count; count * members];
            }
        } else {
            // each row carries its own length prefix in host byte order
            let mut offset = 0;
            for _ in 0..count * members {
                let len = read_attached_length(data, offset, list_type)?;
                offset += list_type.stride();
                let bytes = len * stride;
                if offset + bytes > data.len() {
                    return Err(PlyError::Argument(
                        "Attached buffer ended inside a list row.".to_string(),
                    ));
                }
                cursor.buffer.extend_from_slice(&data[offset..offset + bytes]);
                cursor.list_counts.push(len);
                offset += bytes;
            }
            if offset != data.len() {
                return Err(PlyError::Argument(format!(
                    "Attached buffer has {} trailing byte(s) after the last list row.",
                    data.len() - offset
                )));
            }
        }
        cursor.size_bytes = cursor.buffer.len();
        cursor.valid = true;

        if !self.header.elements.contains_key(element_name) {
            let mut e = ElementDef::new(element_name.to_string());
            e.count = count;
            self.header.elements.insert_named(e);
        }
        let property_type = if is_list {
            PropertyType::List(list_type, data_type)
        } else {
            PropertyType::Scalar(data_type)
        };
        if let Some(e) = self.header.elements.get_mut(element_name) {
            for name in property_names {
                e.properties
                    .insert_named(PropertyDef::new((*name).to_string(), property_type));
            }
        }

        let shared = cursor.into_shared();
        for name in property_names {
            self.requests
                .insert(request_key(element_name, name), Rc::clone(&shared));
        }
        Ok(shared)
    }

    /// Writes the complete file: canonical header, then the payload from
    /// the attached cursors.
    ///
    /// `binary` selects little-endian binary output; big-endian is never
    /// chosen automatically, only kept when the caller explicitly set the
    /// header's encoding to `BinaryBigEndian`.
    pub fn write<T: Write>(&mut self, out: &mut T, binary: bool) -> PlyResult<usize> {
        self.header.encoding = match (binary, self.header.encoding) {
            (true, Encoding::BinaryBigEndian) => Encoding::BinaryBigEndian,
            (true, _) => Encoding::BinaryLittleEndian,
            (false, _) => Encoding::Ascii,
        };
        Writer::new().write_ply(out, &self.header, &self.requests)
    }
}

impl Default for PlyFile {
    fn default() -> Self {
        PlyFile::new()
    }
}

fn read_attached_length(data: &[u8], offset: usize, t: ScalarType) -> PlyResult<usize> {
    let stride = t.stride();
    if offset + stride > data.len() {
        return Err(PlyError::Argument(
            "Attached buffer ended inside a list length prefix.".to_string(),
        ));
    }
    let bytes = &data[offset..offset + stride];
    let len: i64 = match t {
        ScalarType::Char => bytes[0] as i8 as i64,
        ScalarType::UChar => bytes[0] as i64,
        ScalarType::Short => NativeEndian::read_i16(bytes) as i64,
        ScalarType::UShort => NativeEndian::read_u16(bytes) as i64,
        ScalarType::Int => NativeEndian::read_i32(bytes) as i64,
        ScalarType::UInt => NativeEndian::read_u32(bytes) as i64,
        ScalarType::Float | ScalarType::Double | ScalarType::Invalid => {
            return Err(PlyError::Argument(format!(
                "List length type must be an integer type, got '{}'.",
                t
            )))
        }
    };
    if len < 0 {
        return Err(PlyError::Argument(format!(
            "Negative list length '{}' in attached buffer.",
            len
        )));
    }
    Ok(len as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_header() -> &'static [u8] {
        b"ply\n\
        format ascii 1.0\n\
        element vertex 8\n\
        property float x\n\
        property float y\n\
        property float z\n\
        property uchar red\n\
        element face 6\n\
        property list uchar int vertex_indices\n\
        end_header\n"
    }

    fn parsed_cube() -> PlyFile {
        let mut file = PlyFile::new();
        file.parse_header(&mut &cube_header()[..]).unwrap();
        file
    }

    #[test]
    fn request_group_shares_one_cursor() {
        let mut file = parsed_cube();
        let c = file
            .request_properties_from_element("vertex", &["x", "y", "z"], 0)
            .unwrap();
        assert_eq!(c.borrow().count, 8);
        assert!(!c.borrow().is_list);
        assert_eq!(file.requests.len(), 3);
    }
    #[test]
    fn request_unknown_element_err() {
        let mut file = parsed_cube();
        let r = file.request_properties_from_element("vertices", &["x"], 0);
        assert!(matches!(r, Err(PlyError::Argument(_))));
    }
    #[test]
    fn request_unknown_property_err() {
        let mut file = parsed_cube();
        let r = file.request_properties_from_element("vertex", &["x", "w"], 0);
        assert!(matches!(r, Err(PlyError::Argument(_))));
    }
    #[test]
    fn request_empty_group_err() {
        let mut file = parsed_cube();
        let r = file.request_properties_from_element("vertex", &[], 0);
        assert!(matches!(r, Err(PlyError::Argument(_))));
    }
    #[test]
    fn request_mixed_types_err() {
        let mut file = parsed_cube();
        let r = file.request_properties_from_element("vertex", &["x", "y", "z", "red"], 0);
        assert!(matches!(r, Err(PlyError::Argument(_))));
    }
    #[test]
    fn request_twice_err() {
        let mut file = parsed_cube();
        file.request_properties_from_element("vertex", &["x"], 0)
            .unwrap();
        let r = file.request_properties_from_element("vertex", &["x", "y"], 0);
        assert!(matches!(r, Err(PlyError::Argument(_))));
    }
    #[test]
    fn request_hint_on_scalar_err() {
        let mut file = parsed_cube();
        let r = file.request_properties_from_element("vertex", &["x"], 3);
        assert!(matches!(r, Err(PlyError::Argument(_))));
    }

    #[test]
    fn attach_scalars_creates_element() {
        let mut file = PlyFile::new();
        let data: Vec<u8> = vec![0; 2 * 3 * 4];
        let c = file
            .add_properties_to_element(
                "vertex",
                &["x", "y", "z"],
                ScalarType::Float,
                2,
                &data,
                ScalarType::Invalid,
                0,
            )
            .unwrap();
        assert!(c.borrow().valid);
        assert_eq!(file.header.elements["vertex"].count, 2);
        assert_eq!(file.header.elements["vertex"].properties.len(), 3);
    }
    #[test]
    fn attach_wrong_size_err() {
        let mut file = PlyFile::new();
        let data: Vec<u8> = vec![0; 7];
        let r = file.add_properties_to_element(
            "vertex",
            &["x"],
            ScalarType::Float,
            2,
            &data,
            ScalarType::Invalid,
            0,
        );
        assert!(matches!(r, Err(PlyError::Argument(_))));
    }
    #[test]
    fn attach_variable_list_unpacks_prefixes() {
        let mut file = PlyFile::new();
        // two rows: [0, 1, 2] and [3, 4], uchar prefixes, int values
        let mut data = Vec::new();
        data.push(3u8);
        for v in [0i32, 1, 2] {
            data.extend_from_slice(&v.to_ne_bytes());
        }
        data.push(2u8);
        for v in [3i32, 4] {
            data.extend_from_slice(&v.to_ne_bytes());
        }
        let c = file
            .add_properties_to_element(
                "face",
                &["vertex_indices"],
                ScalarType::Int,
                2,
                &data,
                ScalarType::UChar,
                0,
            )
            .unwrap();
        let c = c.borrow();
        assert_eq!(c.list_counts, vec![3, 2]);
        assert_eq!(c.buffer.len(), 5 * 4);
    }
    #[test]
    fn attach_truncated_list_row_err() {
        let mut file = PlyFile::new();
        let mut data = Vec::new();
        data.push(3u8);
        data.extend_from_slice(&0i32.to_ne_bytes());
        let r = file.add_properties_to_element(
            "face",
            &["vertex_indices"],
            ScalarType::Int,
            1,
            &data,
            ScalarType::UChar,
            0,
        );
        assert!(matches!(r, Err(PlyError::Argument(_))));
    }
    #[test]
    fn attach_float_list_length_type_err() {
        let mut file = PlyFile::new();
        let r = file.add_properties_to_element(
            "face",
            &["vertex_indices"],
            ScalarType::Int,
            0,
            &[],
            ScalarType::Float,
            3,
        );
        assert!(matches!(r, Err(PlyError::Argument(_))));
    }
}
