//! Raw column-oriented chunk storage.

use std::ptr::{self, NonNull};
use std::rc::Rc;

use crate::component::{ComponentId, Entity, ENTITY_COMPONENT_ID, MAX_COMPONENTS};
use crate::record::ComponentRecord;
use crate::signature::Signature;
use crate::storage::factory::Arena;

/// Base pointer and per-row stride for one component column. Null when the
/// chunk's signature does not carry the component.
#[derive(Clone, Copy)]
pub(crate) struct ColumnPtr {
    pub ptr: *mut u8,
    pub stride: u16,
}

impl ColumnPtr {
    pub(crate) const NULL: ColumnPtr = ColumnPtr {
        ptr: ptr::null_mut(),
        stride: 0,
    };
}

/// One fixed-capacity block of column storage. Live rows occupy the dense
/// range `[0, len)`; each column keeps its rows contiguous.
///
/// The chunk co-owns the factory arena its columns point into, so the memory
/// never relocates and never outlives the pointers held here.
pub struct Chunk {
    columns: Box<[ColumnPtr; MAX_COMPONENTS]>,
    signature: Signature,
    len: usize,
    capacity: usize,
    _arena: Rc<Arena>,
}

impl Chunk {
    pub(crate) fn new(
        columns: Box<[ColumnPtr; MAX_COMPONENTS]>,
        signature: Signature,
        capacity: usize,
        arena: Rc<Arena>,
    ) -> Self {
        Self {
            columns,
            signature,
            len: 0,
            capacity,
            _arena: arena,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Base pointer and stride of a column, if the chunk carries it.
    pub(crate) fn column(&self, id: ComponentId) -> Option<(*mut u8, u16)> {
        let col = self.columns[id as usize];
        (!col.ptr.is_null()).then_some((col.ptr, col.stride))
    }

    /// Pointer to one component cell of a live row.
    pub(crate) fn component_ptr(&self, id: ComponentId, slot: usize) -> Option<NonNull<u8>> {
        if slot >= self.len {
            return None;
        }
        let (ptr, stride) = self.column(id)?;
        // SAFETY: slot < len <= capacity, so the offset stays inside the column.
        NonNull::new(unsafe { ptr.add(slot * stride as usize) })
    }

    /// Copies every column of `record` into `slot`. The record must carry a
    /// live pointer for every id in the chunk's signature.
    pub(crate) fn write_record(&mut self, slot: usize, record: &ComponentRecord) {
        debug_assert!(slot < self.capacity);
        for id in self.signature.ids() {
            let col = self.columns[id as usize];
            let src = record.ptr(id);
            debug_assert!(!col.ptr.is_null());
            debug_assert!(!src.is_null(), "record is missing component {id}");
            // SAFETY: each cell holds exactly `stride` bytes and the source
            // pointer is live for the duration of the call.
            unsafe {
                ptr::copy_nonoverlapping(
                    src,
                    col.ptr.add(slot * col.stride as usize),
                    col.stride as usize,
                );
            }
        }
    }

    /// Appends a record and returns its slot. Callers check `is_full` first.
    pub(crate) fn push_record(&mut self, record: &ComponentRecord) -> usize {
        debug_assert!(!self.is_full());
        let slot = self.len;
        self.len += 1;
        self.write_record(slot, record);
        slot
    }

    /// Swaps the full contents of two live rows, column by column.
    pub(crate) fn swap_slots(&mut self, a: usize, b: usize) {
        debug_assert!(a < self.len && b < self.len);
        if a == b {
            return;
        }
        for id in self.signature.ids() {
            let col = self.columns[id as usize];
            let stride = col.stride as usize;
            // SAFETY: a != b and both rows are live, so the byte ranges
            // cannot overlap.
            unsafe {
                ptr::swap_nonoverlapping(col.ptr.add(a * stride), col.ptr.add(b * stride), stride);
            }
        }
    }

    /// Drops the last live row.
    pub(crate) fn pop(&mut self) {
        debug_assert!(self.len > 0);
        self.len -= 1;
    }

    /// Entity identifier stored in a live row.
    pub(crate) fn entity_at(&self, slot: usize) -> Entity {
        debug_assert!(slot < self.len);
        let col = self.columns[ENTITY_COMPONENT_ID as usize];
        debug_assert!(!col.ptr.is_null());
        // SAFETY: archetype signatures always carry the identity column and
        // its cells are aligned for Entity.
        unsafe { col.ptr.add(slot * col.stride as usize).cast::<Entity>().read() }
    }
}
