use crate::ply::{
    Comment, ElementDef, Encoding, ObjInfo, PropertyDef, PropertyType, ScalarType, Version,
};

/// One parsed header line.
#[derive(Debug, PartialEq, Clone)]
pub enum Line {
    MagicNumber,
    Format((Encoding, Version)),
    Comment(Comment),
    ObjInfo(ObjInfo),
    Element(ElementDef),
    Property(PropertyDef),
    EndHeader,
}

// Header lines plus the tokenization of ascii payload lines. Keyword
// dispatch stays in the parser; the grammar only validates shape.
peg::parser! {pub grammar grammar() for str {

rule ws() = [' ' | '\t']+

rule eol() = "\r\n" / ['\n' | '\r']

rule count() -> usize
	= digits:$(['0'..='9']+) {? digits.parse().or(Err("count")) }

rule name() -> String
	= n:$(['a'..='z' | 'A'..='Z' | '_']['a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-']*) {
		n.to_string()
	}

/// Whatever follows a `comment` or `obj_info` keyword: one separating
/// space, then free text up to the line end. A bare keyword is allowed.
rule annotation() -> String
	= ws() t:$((!['\n' | '\r'][_])+) { t.to_string() }
	/ ws()? { String::new() }

rule scalar() -> ScalarType
	= token:$(['a'..='z' | '0'..='9']+) {?
		match ScalarType::from_header_token(token) {
			ScalarType::Invalid => Err("scalar type"),
			t => Ok(t),
		}
	}

pub rule magic_number()
	= ['p' | 'P']['l' | 'L']['y' | 'Y']

rule encoding() -> Encoding
	= "ascii" { Encoding::Ascii }
	/ "binary_little_endian" { Encoding::BinaryLittleEndian }
	/ "binary_big_endian" { Encoding::BinaryBigEndian }

rule version() -> Version
	= big:count() "." small:count() {
		Version {
			major: big as u16,
			minor: small as u8,
		}
	}

pub rule format() -> (Encoding, Version)
	= "format" ws() enc:encoding() ws() v:version() { (enc, v) }

pub rule comment() -> Comment
	= "comment" t:annotation() { t }

pub rule obj_info() -> ObjInfo
	= "obj_info" t:annotation() { t }

pub rule element() -> ElementDef
	= "element" ws() id:name() ws() n:count() {
		let mut def = ElementDef::new(id);
		def.count = n;
		def
	}

pub rule property() -> PropertyDef
	= "property" ws() "list" ws() len:scalar() ws() item:scalar() ws() id:name() {
		PropertyDef::new(id, PropertyType::List(len, item))
	}
	/ "property" ws() item:scalar() ws() id:name() {
		PropertyDef::new(id, PropertyType::Scalar(item))
	}

pub rule end_header()
	= "end_header"

pub rule line() -> Line
	= l:bare_line() ws()? eol()? { l }

rule bare_line() -> Line
	= magic_number() { Line::MagicNumber }
	/ end_header()   { Line::EndHeader }
	/ f:format()     { Line::Format(f) }
	/ o:obj_info()   { Line::ObjInfo(o) }
	/ c:comment()    { Line::Comment(c) }
	/ e:element()    { Line::Element(e) }
	/ p:property()   { Line::Property(p) }

rule numeric() -> String
	= t:$(['-' | '+']? ['0'..='9']+ ("." ['0'..='9']+)? (['e' | 'E'] ['-' | '+']? ['0'..='9']+)?) {
		t.to_string()
	}

pub rule data_line() -> Vec<String>
	= ws()? fields:(numeric() ** ws()) ws()? eol()? { fields }

}}
