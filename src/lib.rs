//! Library for reading/writing ascii and binary PLY files into flat,
//! caller-requested buffers.
//!
//! The PLY format describes its payload in an ascii header, so no schema
//! knowledge is needed up front: parse the header, ask for the properties
//! you care about by name, and `read` fills one flat byte buffer per
//! request. Nothing else of the payload is kept, and each requested group
//! costs a single allocation even when the file carries variable length
//! lists (those are measured in a sizing pass first).
//!
//! - Requested properties of one group (say `x`, `y`, `z` of `vertex`)
//!   land interleaved in one buffer, ready for downstream numerical code.
//! - List properties stay flat too: the per-row lengths are reported out
//!   of line in the cursor's `list_counts`.
//! - Writing mirrors reading: attach buffers with
//!   `add_properties_to_element`, then `write` emits the canonical header
//!   and the payload in ascii or little-endian binary.
//!
//! # Examples
//!
//! Reading positions and face indices from a file:
//!
//! ```rust
//! use ply_cursor::ply::PlyFile;
//!
//! let data = b"ply\n\
//! format ascii 1.0\n\
//! element vertex 3\n\
//! property float x\n\
//! property float y\n\
//! property float z\n\
//! element face 1\n\
//! property list uchar int vertex_indices\n\
//! end_header\n\
//! 0 0 0\n\
//! 1 0 0\n\
//! 0 1 0\n\
//! 3 0 1 2\n";
//! let mut src = std::io::Cursor::new(&data[..]);
//!
//! let mut file = PlyFile::new();
//! file.parse_header(&mut src).unwrap();
//!
//! let xyz = file.request_properties_from_element("vertex", &["x", "y", "z"], 0).unwrap();
//! let indices = file.request_properties_from_element("face", &["vertex_indices"], 0).unwrap();
//! file.read(&mut src).unwrap();
//!
//! assert_eq!(xyz.borrow().buffer.len(), 3 * 3 * 4);
//! assert_eq!(indices.borrow().list_counts, vec![3]);
//! ```

pub mod errors;
pub mod parser;
pub mod ply;
pub mod writer;

mod util;

pub use crate::errors::{PlyError, PlyResult};
