//! Per-entity component pointer records and the migration scratch buffer.

use std::ptr;
use std::slice;

use crate::component::{ComponentId, Entity, ENTITY_COMPONENT_ID, MAX_COMPONENTS};

/// Table of per-component source pointers for one entity, indexed by
/// component id. Slot 0 always points at the entity's own identifier.
///
/// Pointers are borrowed; a record must not outlive the values it points at.
pub struct ComponentRecord {
    ptrs: [*const u8; MAX_COMPONENTS],
}

impl ComponentRecord {
    pub fn new(entity: &Entity) -> Self {
        let mut ptrs = [ptr::null(); MAX_COMPONENTS];
        ptrs[ENTITY_COMPONENT_ID as usize] = (entity as *const Entity).cast();
        Self { ptrs }
    }

    pub fn set_ptr(&mut self, id: ComponentId, ptr: *const u8) {
        debug_assert!((id as usize) < MAX_COMPONENTS);
        self.ptrs[id as usize] = ptr;
    }

    pub fn ptr(&self, id: ComponentId) -> *const u8 {
        self.ptrs[id as usize]
    }
}

/// Reusable byte buffer holding a snapshot of an entity's current component
/// data, so the source archetype can be mutated while the record is being
/// written into the target.
#[derive(Default)]
pub(crate) struct RecordScratch {
    bytes: Vec<u8>,
    entries: Vec<(ComponentId, u32)>,
}

impl RecordScratch {
    pub(crate) fn clear(&mut self) {
        self.bytes.clear();
        self.entries.clear();
    }

    /// Copies `len` bytes from `src` into the buffer. Pointers into the
    /// buffer are only handed out by `fill_record`, after all pushes, so
    /// growth-triggered reallocation is harmless here.
    ///
    /// # Safety
    /// `src` must be valid for reads of `len` bytes.
    pub(crate) unsafe fn push(&mut self, id: ComponentId, src: *const u8, len: usize) {
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(slice::from_raw_parts(src, len));
        self.entries.push((id, offset));
    }

    /// Points `record` at each snapshotted component.
    pub(crate) fn fill_record(&self, record: &mut ComponentRecord) {
        for &(id, offset) in &self.entries {
            // SAFETY: offset was taken from the buffer length at push time.
            record.set_ptr(id, unsafe { self.bytes.as_ptr().add(offset as usize) });
        }
    }
}
