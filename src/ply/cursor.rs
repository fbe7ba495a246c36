use std::cell::RefCell;
use std::rc::Rc;

use super::ScalarType;

/// Destination of one property request.
///
/// A cursor binds a request group (one or more properties of the same
/// element, same type, same list-ness) to a flat byte buffer. Scalars are
/// stored back to back in host byte order, in file order; for lists the
/// per-row lengths are kept out of line in `list_counts` so that `buffer`
/// stays a plain typed array.
#[derive(Debug, Clone, PartialEq)]
pub struct DataCursor {
    /// Scalar type of the stored values.
    pub data_type: ScalarType,
    pub is_list: bool,
    /// Number of element instances feeding this cursor.
    pub count: usize,
    /// Flat scalar storage, host byte order, exactly sized after `read`.
    pub buffer: Vec<u8>,
    /// Observed per-row list lengths, in file order.
    pub list_counts: Vec<usize>,
    /// Set once `read` has filled the buffer or authored data was attached.
    pub valid: bool,
    /// Number of property names sharing this cursor (interleaved groups).
    pub(crate) members: usize,
    /// Per-row length promised by the caller; 0 means variable.
    pub(crate) fixed_list_len: usize,
    /// Bytes required, accumulated by the sizing pass.
    pub(crate) size_bytes: usize,
    /// Byte position of the next write (reading) or next read (writing).
    pub(crate) offset: usize,
    /// Index of the next `list_counts` entry the writer consumes.
    pub(crate) row: usize,
}

/// Reference-counted cursor handle.
///
/// The registry holds one entry per requested property name; all names of
/// a request group share the same handle, and the caller keeps a clone to
/// consume the buffer after `read`.
pub type SharedCursor = Rc<RefCell<DataCursor>>;

impl DataCursor {
    pub(crate) fn new(
        data_type: ScalarType,
        is_list: bool,
        count: usize,
        members: usize,
        fixed_list_len: usize,
    ) -> Self {
        DataCursor {
            data_type,
            is_list,
            count,
            buffer: Vec::new(),
            list_counts: Vec::new(),
            valid: false,
            members,
            fixed_list_len,
            size_bytes: 0,
            offset: 0,
            row: 0,
        }
    }

    pub(crate) fn into_shared(self) -> SharedCursor {
        Rc::new(RefCell::new(self))
    }

    /// Number of scalar values currently held.
    pub fn scalar_count(&self) -> usize {
        debug_assert!(self.data_type.stride() > 0);
        self.buffer.len() / self.data_type.stride()
    }

    /// Clears all state a previous `read` may have left behind.
    pub(crate) fn reset_for_read(&mut self) {
        self.buffer.clear();
        self.list_counts.clear();
        self.size_bytes = 0;
        self.offset = 0;
        self.row = 0;
        self.valid = false;
    }

    /// Rewinds the consumption state so `write` can be repeated.
    pub(crate) fn rewind(&mut self) {
        self.offset = 0;
        self.row = 0;
    }
}
