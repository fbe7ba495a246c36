use std::fmt;
use std::fmt::{Display, Formatter};

use super::KeyMap;
use super::ScalarType;

/// How the payload is encoded.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Encoding {
    #[default]
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

impl Encoding {
    /// The token this encoding carries on the `format` line.
    pub fn token(self) -> &'static str {
        match self {
            Encoding::Ascii => "ascii",
            Encoding::BinaryLittleEndian => "binary_little_endian",
            Encoding::BinaryBigEndian => "binary_big_endian",
        }
    }
}

impl Display for Encoding {
    fn fmt(&self, f: &mut Formatter) -> Result<(), fmt::Error> {
        f.write_str(self.token())
    }
}

/// Format version. Only 1.0 was ever specified, and only 1.0 is accepted
/// on input; the field pair is kept so a rejected header can name what it
/// actually said.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Version {
    pub major: u16,
    pub minor: u8,
}

impl Version {
    pub fn is_supported(self) -> bool {
        self.major == 1 && self.minor == 0
    }
}

impl Default for Version {
    fn default() -> Self {
        Version { major: 1, minor: 0 }
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

pub type ObjInfo = String;
pub type Comment = String;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PropertyType {
    Scalar(ScalarType),
    /// Length type (encodes the per-row count prefix), element type.
    List(ScalarType, ScalarType),
}

impl PropertyType {
    /// The type of the values this property stores, ignoring list-ness.
    pub fn scalar_type(&self) -> ScalarType {
        match *self {
            PropertyType::Scalar(t) => t,
            PropertyType::List(_, t) => t,
        }
    }
    pub fn is_list(&self) -> bool {
        matches!(*self, PropertyType::List(..))
    }
}

/// One field of an element record.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PropertyDef {
    pub name: String,
    pub data_type: PropertyType,
}

impl PropertyDef {
    pub fn new(name: String, data_type: PropertyType) -> Self {
        PropertyDef { name, data_type }
    }
}

/// A named group of structurally identical records.
///
/// Property order is significant: it is both the on-disk layout of each
/// instance and the iteration order during scanning.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ElementDef {
    pub name: String,
    /// Number of instances in the payload.
    pub count: usize,
    pub properties: KeyMap<PropertyDef>,
}

impl ElementDef {
    pub fn new(name: String) -> Self {
        ElementDef {
            name,
            count: 0,
            properties: KeyMap::new(),
        }
    }

    /// Looks up a declared property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.get(name)
    }
}

/// All information found in the header of a PLY file.
///
/// The default is an empty ascii 1.0 header, which is also the starting
/// point of the write path before elements are attached.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Header {
    pub encoding: Encoding,
    pub version: Version,
    pub obj_infos: Vec<ObjInfo>,
    pub elements: KeyMap<ElementDef>,
    pub comments: Vec<Comment>,
}

impl Header {
    pub fn new() -> Self {
        Header::default()
    }
}
