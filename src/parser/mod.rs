//! Reads the header and scans the payload into the requested cursors.

use std::fmt::Debug;
use std::io;
use std::io::{BufRead, Seek, SeekFrom};
use std::result;

use log::debug;

mod ascii;
mod binary;
mod ply_grammar;

use self::ply_grammar::grammar;
pub use self::ply_grammar::Line;

use byteorder::{BigEndian, LittleEndian};

use crate::errors::{PlyError, PlyResult};
use crate::ply::{
    request_key, Comment, DataCursor, ElementDef, Encoding, Header, KeyMap, ObjInfo, PropertyType,
    ScalarType, SharedCursor, Version,
};
use crate::ply::NamedInsert;
use crate::util::LocationTracker;

fn parse_rethrow<T, E: Debug>(
    location: &LocationTracker,
    line_str: &str,
    e: E,
    message: &str,
) -> PlyResult<T> {
    Err(PlyError::Format(format!(
        "Line {}: {}\n\tString: '{}'\n\tError: {:?}",
        location.line_index, message, line_str, e
    )))
}
fn parse_error<T>(location: &LocationTracker, line_str: &str, message: &str) -> PlyResult<T> {
    Err(PlyError::Format(format!(
        "Line {}: {}\n\tString: '{}'",
        location.line_index, message, line_str
    )))
}

/// Maps an unexpected-EOF io error to a payload error. A payload that ends
/// before the header's promise is a payload problem, not an io problem.
pub(crate) fn eof_to_payload(e: PlyError) -> PlyError {
    match e {
        PlyError::Io(ref io_err) if io_err.kind() == io::ErrorKind::UnexpectedEof => {
            PlyError::Payload("unexpected end of payload".to_string())
        }
        e => e,
    }
}

/// Which of the two payload traversals is running.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Pass {
    /// Accumulate byte totals and list lengths, store no values.
    Sizing,
    /// Decode values into the destination buffers.
    Copy { record_lengths: bool },
}

/// Binding of one declared property to its cursor (if requested), resolved
/// once per element so the instance loop stays free of key lookups.
pub(crate) struct PropScan {
    pub(crate) data_type: ScalarType,
    /// `Some` for list properties; holds the length prefix type.
    pub(crate) length_type: Option<ScalarType>,
    pub(crate) cursor: Option<SharedCursor>,
}

pub(crate) fn bind_element(
    element_name: &str,
    element: &ElementDef,
    requests: &KeyMap<SharedCursor>,
) -> Vec<PropScan> {
    element
        .properties
        .values()
        .map(|p| {
            let cursor = requests.get(&request_key(element_name, &p.name)).cloned();
            match p.data_type {
                PropertyType::Scalar(t) => PropScan {
                    data_type: t,
                    length_type: None,
                    cursor,
                },
                PropertyType::List(lt, t) => PropScan {
                    data_type: t,
                    length_type: Some(lt),
                    cursor,
                },
            }
        })
        .collect()
}

pub(crate) fn check_fixed_len(cursor: &DataCursor, observed: usize) -> PlyResult<()> {
    if cursor.fixed_list_len != 0 && observed != cursor.fixed_list_len {
        return Err(PlyError::Payload(format!(
            "List of length {} contradicts the promised fixed length {}.",
            observed, cursor.fixed_list_len
        )));
    }
    Ok(())
}

/// Reads PLY data from a `BufRead` source.
///
/// `Parser` is stateless; the header it returns and the cursor registry it
/// fills both live on the `PlyFile` that drives it. In most cases the
/// `PlyFile` methods should suffice, but the line- and payload-level
/// methods here are public for callers that need finer control.
///
/// # Examples
///
/// Reading a header from an in-memory source:
///
/// ```rust
/// # use ply_cursor::parser::Parser;
/// let txt = "ply\nformat ascii 1.0\nend_header\n";
/// let mut bytes = txt.as_bytes();
/// let p = Parser::new();
/// let header = p.read_header(&mut bytes).unwrap();
/// assert!(header.elements.is_empty());
/// ```
pub struct Parser;

impl Default for Parser {
    fn default() -> Self {
        Parser::new()
    }
}

// ////////////////////////
// # Header
// ////////////////////////
impl Parser {
    pub fn new() -> Self {
        Parser
    }

    /// Reads the header until and inclusive `end_header`.
    ///
    /// On success the source is positioned exactly at the first payload
    /// byte. Blank lines before the magic number are tolerated.
    pub fn read_header<T: BufRead>(&self, reader: &mut T) -> PlyResult<Header> {
        let mut line = LocationTracker::new();
        self.__read_header(reader, &mut line)
    }
    /// Parses a single header line.
    pub fn read_header_line(&self, line: &str) -> PlyResult<Line> {
        match self.__read_header_line(line) {
            Ok(l) => Ok(l),
            Err(e) => Err(PlyError::Format(format!(
                "Couldn't parse line.\n\tString: {}\n\tError: {:?}",
                line, e
            ))),
        }
    }

    // private
    fn __read_header_line(
        &self,
        line_str: &str,
    ) -> result::Result<Line, peg::error::ParseError<peg::str::LineCol>> {
        grammar::line(line_str)
    }
    fn __read_header<T: BufRead>(
        &self,
        reader: &mut T,
        location: &mut LocationTracker,
    ) -> PlyResult<Header> {
        let mut line_str = String::new();
        loop {
            location.next_line();
            line_str.clear();
            if reader.read_line(&mut line_str)? == 0 {
                return parse_error(
                    location,
                    &line_str,
                    "Expected magic number 'ply', found end of input.",
                );
            }
            if line_str.trim().is_empty() {
                continue;
            }
            match self.__read_header_line(&line_str) {
                Ok(Line::MagicNumber) => break,
                Ok(l) => {
                    return parse_error(
                        location,
                        &line_str,
                        &format!("Expected magic number 'ply', but saw '{:?}'.", l),
                    )
                }
                Err(e) => {
                    return parse_rethrow(location, &line_str, e, "Expected magic number 'ply'.")
                }
            }
        }

        let mut header_form_ver: Option<(Encoding, Version)> = None;
        let mut header_obj_infos = Vec::<ObjInfo>::new();
        let mut header_elements = KeyMap::<ElementDef>::new();
        let mut header_comments = Vec::<Comment>::new();
        'readlines: loop {
            location.next_line();
            line_str.clear();
            if reader.read_line(&mut line_str)? == 0 {
                return parse_error(
                    location,
                    &line_str,
                    "Unexpected end of input before 'end_header'.",
                );
            }
            let line = self.__read_header_line(&line_str);

            match line {
                Err(e) => return parse_rethrow(location, &line_str, e, "Couldn't parse line."),
                Ok(Line::MagicNumber) => {
                    return parse_error(location, &line_str, "Unexpected 'ply' found.")
                }
                Ok(Line::Format(ref t)) => {
                    if !header_elements.is_empty() {
                        return parse_error(
                            location,
                            &line_str,
                            "Format definition must come before any element.",
                        );
                    }
                    if !t.1.is_supported() {
                        return parse_error(
                            location,
                            &line_str,
                            &format!("Unsupported version '{}', expected '1.0'.", t.1),
                        );
                    }
                    match header_form_ver {
                        None => header_form_ver = Some(*t),
                        Some(f) => {
                            if f != *t {
                                return parse_error(
                                    location,
                                    &line_str,
                                    &format!(
                                        "Found contradicting format definition:\n\
                                        \tEncoding: {:?}, Version: {:?}\n\
                                        previous definition:\n\
                                        \tEncoding: {:?}, Version: {:?}",
                                        t.0, t.1, f.0, f.1
                                    ),
                                );
                            }
                        }
                    }
                }
                Ok(Line::ObjInfo(ref o)) => header_obj_infos.push(o.clone()),
                Ok(Line::Comment(ref c)) => header_comments.push(c.clone()),
                Ok(Line::Element(ref e)) => {
                    if header_form_ver.is_none() {
                        return parse_error(
                            location,
                            &line_str,
                            "Element found before format definition.",
                        );
                    }
                    if header_elements.contains_key(&e.name) {
                        return parse_error(
                            location,
                            &line_str,
                            &format!("Element '{}' declared twice.", e.name),
                        );
                    }
                    header_elements.insert_named(e.clone());
                }
                Ok(Line::Property(p)) => {
                    if header_form_ver.is_none() {
                        return parse_error(
                            location,
                            &line_str,
                            "Property found before format definition.",
                        );
                    }
                    if header_elements.is_empty() {
                        return parse_error(
                            location,
                            &line_str,
                            &format!("Property '{:?}' found without preceding element.", p),
                        );
                    } else {
                        let (_, mut e) = header_elements.pop_back().ok_or_else(|| {
                            PlyError::Format("Property found without preceding element.".to_string())
                        })?;
                        if e.properties.contains_key(&p.name) {
                            return parse_error(
                                location,
                                &line_str,
                                &format!(
                                    "Property '{}' declared twice on element '{}'.",
                                    p.name, e.name
                                ),
                            );
                        }
                        e.properties.insert_named(p);
                        header_elements.insert_named(e);
                    }
                }
                Ok(Line::EndHeader) => {
                    location.next_line();
                    break 'readlines;
                }
            };
        }
        let (encoding, version) = match header_form_ver {
            Some(fv) => fv,
            None => return Err(PlyError::Format("No format line found.".to_string())),
        };
        debug!(
            "parsed header: {} element(s), {} encoding",
            header_elements.len(),
            encoding
        );
        Ok(Header {
            encoding,
            version,
            obj_infos: header_obj_infos,
            comments: header_comments,
            elements: header_elements,
        })
    }
}

// //////////////////////
// # Payload
// //////////////////////

impl Parser {
    /// Fills all bound cursors from the payload.
    ///
    /// The source must be positioned at the first payload byte, which is
    /// where `read_header` leaves it. If any bound list property has no
    /// fixed-size promise, the payload is traversed twice: a sizing pass
    /// that only measures, one seek back to the payload start, then a copy
    /// pass into exactly sized buffers. With every bound list size
    /// promised, a single copy pass suffices.
    pub fn read_payload<T: BufRead + Seek>(
        &self,
        reader: &mut T,
        header: &Header,
        requests: &KeyMap<SharedCursor>,
    ) -> PlyResult<()> {
        for cursor in requests.values() {
            cursor.borrow_mut().reset_for_read();
        }
        let two_pass = requests.values().any(|c| {
            let c = c.borrow();
            c.is_list && c.fixed_list_len == 0
        });
        if two_pass {
            debug!("variable length list bound, scanning payload in two passes");
            let payload_start = reader.stream_position()?;
            self.scan_payload(reader, header, requests, Pass::Sizing)?;
            for cursor in requests.values() {
                let mut c = cursor.borrow_mut();
                let needed = c.size_bytes;
                c.buffer.reserve_exact(needed);
            }
            reader.seek(SeekFrom::Start(payload_start))?;
            self.scan_payload(reader, header, requests, Pass::Copy { record_lengths: false })?;
        } else {
            debug!("all bound list sizes promised, scanning payload in one pass");
            for cursor in requests.values() {
                let mut c = cursor.borrow_mut();
                let rows = c.count * c.members;
                let needed = if c.is_list {
                    rows * c.fixed_list_len * c.data_type.stride()
                } else {
                    rows * c.data_type.stride()
                };
                c.size_bytes = needed;
                c.buffer.reserve_exact(needed);
            }
            self.scan_payload(reader, header, requests, Pass::Copy { record_lengths: true })?;
        }
        for cursor in requests.values() {
            cursor.borrow_mut().valid = true;
        }
        Ok(())
    }

    /// internal dispatcher based on the encoding
    fn scan_payload<T: BufRead>(
        &self,
        reader: &mut T,
        header: &Header,
        requests: &KeyMap<SharedCursor>,
        pass: Pass,
    ) -> PlyResult<()> {
        let mut location = LocationTracker::new();
        match header.encoding {
            Encoding::Ascii => self.scan_ascii_payload(reader, &mut location, header, requests, pass),
            Encoding::BinaryBigEndian => {
                self.scan_binary_payload::<T, BigEndian>(reader, &mut location, header, requests, pass)
            }
            Encoding::BinaryLittleEndian => {
                self.scan_binary_payload::<T, LittleEndian>(reader, &mut location, header, requests, pass)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::grammar as g;
    use super::Line;
    use crate::parser::Parser;
    use crate::ply::{ElementDef, Encoding, PropertyDef, PropertyType, ScalarType, Version};
    macro_rules! assert_ok {
        ($e:expr) => {
            match $e {
                Ok(obj) => obj,
                Err(e) => panic!("{}", e),
            }
        };
        ($e:expr , $o:expr) => {
            let obj = assert_ok!($e);
            assert_eq!(obj, $o);
        };
    }
    macro_rules! assert_err {
        ($e:expr) => {
            let result = $e;
            assert!(result.is_err());
        };
    }
    #[test]
    fn parser_header_ok() {
        let p = Parser::new();
        let txt = "ply\nformat ascii 1.0\nend_header\n";
        let mut bytes = txt.as_bytes();
        assert_ok!(p.read_header(&mut bytes));

        let txt = "ply\n\
        format ascii 1.0\n\
        element vertex 8\n\
        property float x\n\
        property float y\n\
        element face 6\n\
        property list uchar int vertex_index\n\
        end_header\n";
        let mut bytes = txt.as_bytes();
        assert_ok!(p.read_header(&mut bytes));
    }
    #[test]
    fn parser_magic_case_insensitive() {
        let p = Parser::new();
        let txt = "PLY\nformat ascii 1.0\nend_header\n";
        let mut bytes = txt.as_bytes();
        assert_ok!(p.read_header(&mut bytes));
    }
    #[test]
    fn parser_blank_lines_before_magic_ok() {
        let p = Parser::new();
        let txt = "\n   \nply\nformat ascii 1.0\nend_header\n";
        let mut bytes = txt.as_bytes();
        assert_ok!(p.read_header(&mut bytes));
    }
    #[test]
    fn parser_missing_magic_err() {
        let p = Parser::new();
        let txt = "format ascii 1.0\nend_header\n";
        let mut bytes = txt.as_bytes();
        assert_err!(p.read_header(&mut bytes));
    }
    #[test]
    fn parser_element_before_format_err() {
        let p = Parser::new();
        let txt = "ply\nelement vertex 8\nformat ascii 1.0\nend_header\n";
        let mut bytes = txt.as_bytes();
        assert_err!(p.read_header(&mut bytes));
    }
    #[test]
    fn parser_version_pinned_err() {
        let p = Parser::new();
        let txt = "ply\nformat ascii 2.0\nend_header\n";
        let mut bytes = txt.as_bytes();
        assert_err!(p.read_header(&mut bytes));
    }
    #[test]
    fn parser_premature_eof_err() {
        let p = Parser::new();
        let txt = "ply\nformat ascii 1.0\nelement vertex 8\n";
        let mut bytes = txt.as_bytes();
        assert_err!(p.read_header(&mut bytes));
    }
    #[test]
    fn parser_crlf_ok() {
        let txt = "ply\r\n\
        format ascii 1.0\r\n\
        comment Hi, I'm your friendly comment.\r\n\
        obj_info And I'm your object information.\r\n\
        element point 2\r\n\
        property int x\r\n\
        property int y\r\n\
        end_header\r\n";
        let mut bytes = txt.as_bytes();
        let p = Parser::new();
        let header = assert_ok!(p.read_header(&mut bytes));
        assert_eq!(header.comments.len(), 1);
        assert_eq!(header.obj_infos.len(), 1);
        assert_eq!(header.elements["point"].count, 2);
    }
    #[test]
    fn magic_number_ok() {
        assert_ok!(g::magic_number("ply"));
        assert_ok!(g::magic_number("PLY"));
    }
    #[test]
    fn magic_number_err() {
        assert_err!(g::magic_number("py"));
        assert_err!(g::magic_number("plyhi"));
        assert_err!(g::magic_number("hiply"));
        assert_err!(g::magic_number(" ply"));
        assert_err!(g::magic_number("ply "));
    }
    #[test]
    fn format_ok() {
        assert_ok!(
            g::format("format ascii 1.0"),
            (Encoding::Ascii, Version { major: 1, minor: 0 })
        );
        assert_ok!(
            g::format("format binary_big_endian 2.1"),
            (Encoding::BinaryBigEndian, Version { major: 2, minor: 1 })
        );
        assert_ok!(
            g::format("format binary_little_endian 1.0"),
            (Encoding::BinaryLittleEndian, Version { major: 1, minor: 0 })
        );
    }
    #[test]
    fn format_err() {
        assert_err!(g::format("format asciii 1.0"));
        assert_err!(g::format("format ascii -1.0"));
        assert_err!(g::format("format ascii 1.0.3"));
        assert_err!(g::format("format ascii 1."));
        assert_err!(g::format("format ascii 1"));
        assert_err!(g::format("format ascii 1.0a"));
    }
    #[test]
    fn comment_ok() {
        assert_ok!(g::comment("comment hi"), "hi");
        assert_ok!(
            g::comment("comment   hi, I'm a comment!"),
            "hi, I'm a comment!"
        );
        assert_ok!(g::comment("comment "), "");
        assert_ok!(g::comment("comment"), "");
        assert_ok!(g::comment("comment\thi"), "hi");
    }
    #[test]
    fn comment_err() {
        assert_err!(g::comment("commentt"));
        assert_err!(g::comment("comment\n"));
        assert_err!(g::comment("comment hi\na comment"));
    }
    #[test]
    fn obj_info_ok() {
        assert_ok!(g::obj_info("obj_info Hi, I can help."), "Hi, I can help.");
        assert_ok!(g::obj_info("obj_info"), "");
        assert_ok!(g::obj_info("obj_info "), "");
    }
    #[test]
    fn element_ok() {
        let mut e = ElementDef::new("vertex".to_string());
        e.count = 8;
        assert_ok!(g::element("element vertex 8"), e);
    }
    #[test]
    fn element_err() {
        assert_err!(g::element("element 8 vertex"));
        assert_err!(g::element("element vertex -8"));
    }
    #[test]
    fn property_ok() {
        assert_ok!(
            g::property("property char c"),
            PropertyDef::new("c".to_string(), PropertyType::Scalar(ScalarType::Char))
        );
        assert_ok!(
            g::property("property int8 c"),
            PropertyDef::new("c".to_string(), PropertyType::Scalar(ScalarType::Char))
        );
    }
    #[test]
    fn property_unknown_type_err() {
        assert_err!(g::property("property int64 c"));
    }
    #[test]
    fn property_list_ok() {
        assert_ok!(
            g::property("property list uchar int c"),
            PropertyDef::new(
                "c".to_string(),
                PropertyType::List(ScalarType::UChar, ScalarType::Int)
            )
        );
    }
    #[test]
    fn line_ok() {
        assert_ok!(g::line("ply "), Line::MagicNumber);
        assert_ok!(
            g::line("format ascii 1.0 "),
            Line::Format((Encoding::Ascii, Version { major: 1, minor: 0 }))
        );
        assert_ok!(g::line("comment a very nice comment "));
        assert_ok!(g::line("element vertex 8 "));
        assert_ok!(g::line("property float x "));
        assert_ok!(g::line("element face 6 "));
        assert_ok!(g::line("property list uchar int vertex_index "));
        assert_ok!(g::line("end_header "));
    }
    #[test]
    fn line_breaks_ok() {
        assert_ok!(g::line("ply \n"), Line::MagicNumber); // Unix, Mac OS X
        assert_ok!(g::line("ply \r"), Line::MagicNumber); // Mac pre OS X
        assert_ok!(g::line("ply \r\n"), Line::MagicNumber); // Windows
    }
    #[test]
    fn data_line_ok() {
        assert_ok!(
            g::data_line("+7 -7 7 +5.21 -5.21 5.21 +0 -0 0 \r\n"),
            vec!["+7", "-7", "7", "+5.21", "-5.21", "5.21", "+0", "-0", "0"]
        );
        assert_ok!(g::data_line("034 8e3 8e-3"), vec!["034", "8e3", "8e-3"]);
        assert_ok!(g::data_line(""), Vec::<String>::new());
    }
    #[test]
    fn data_line_err() {
        assert_err!(g::data_line("++3"));
        assert_err!(g::data_line("+-3"));
        assert_err!(g::data_line("five"));
    }
}
