//! Definitions used to model PLY files.

mod cursor;
pub use self::cursor::*;

mod descriptors;
pub use self::descriptors::*;

mod registry;
pub use self::registry::*;
pub(crate) use self::registry::request_key;

mod ply_file;
pub use self::ply_file::*;

mod types;
pub use self::types::*;
