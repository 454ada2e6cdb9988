//! Chunk layout planning and the pre-reserved chunk arena.

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::rc::Rc;

use tracing::trace;

use crate::component::{ComponentRegistry, ComponentTypeInfo, MAX_COMPONENTS};
use crate::error::LayoutError;
use crate::signature::Signature;
use crate::storage::chunk::{Chunk, ColumnPtr};

/// Chunks are carved from the arena at this alignment, so a column offset
/// aligned within the chunk is aligned absolutely.
pub const CHUNK_ALIGN: usize = 64;

#[derive(Debug, Clone, Copy, Default)]
struct ColumnLayout {
    offset: u32,
    stride: u16,
    present: bool,
}

/// Column packing for one signature, computed once and reused by every chunk
/// the factory creates.
#[derive(Debug)]
struct ChunkLayout {
    columns: [ColumnLayout; MAX_COMPONENTS],
    capacity: usize,
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Finds the largest row count whose columns, packed in ascending id order
/// with per-column alignment padding, fit in `budget` bytes. Starts from the
/// padding-free upper bound and decrements until everything fits.
fn plan(
    signature: &Signature,
    registry: &ComponentRegistry,
    budget: usize,
) -> Result<ChunkLayout, LayoutError> {
    if signature.is_empty() {
        return Err(LayoutError::EmptySignature);
    }

    let mut infos: Vec<ComponentTypeInfo> = Vec::with_capacity(signature.len());
    let mut record_bytes = 0usize;
    for id in signature.ids() {
        let info = registry
            .get(id)
            .ok_or(LayoutError::UnregisteredComponent { id })?;
        if info.alignment as usize > CHUNK_ALIGN {
            return Err(LayoutError::AlignmentUnsupported {
                id,
                alignment: info.alignment,
                max: CHUNK_ALIGN,
            });
        }
        record_bytes += info.size as usize;
        infos.push(info);
    }

    let mut columns = [ColumnLayout::default(); MAX_COMPONENTS];
    let mut capacity = budget / record_bytes;
    while capacity > 0 {
        let mut offset = 0usize;
        let mut fits = true;
        for info in &infos {
            offset = align_up(offset, info.alignment as usize);
            let end = offset + info.size as usize * capacity;
            if end > budget {
                fits = false;
                break;
            }
            columns[info.id as usize] = ColumnLayout {
                offset: offset as u32,
                stride: info.size,
                present: true,
            };
            offset = end;
        }
        if fits {
            break;
        }
        capacity -= 1;
    }

    if capacity == 0 {
        let needed = infos.iter().fold(0usize, |acc, info| {
            align_up(acc, info.alignment as usize) + info.size as usize
        });
        return Err(LayoutError::BudgetExceeded { needed, budget });
    }

    Ok(ChunkLayout { columns, capacity })
}

/// One contiguous allocation holding every chunk of an archetype. The
/// factory and every chunk carved from it share ownership, so the memory
/// lives until the last of them is dropped.
pub(crate) struct Arena {
    base: NonNull<u8>,
    layout: Layout,
}

impl Arena {
    fn new(bytes: usize, chunks: usize, stride: usize) -> Result<Self, LayoutError> {
        let layout = Layout::from_size_align(bytes, CHUNK_ALIGN)
            .map_err(|_| LayoutError::ArenaTooLarge { chunks, stride })?;
        // SAFETY: bytes > 0 (stride is at least CHUNK_ALIGN, chunks >= 1).
        let ptr = unsafe { alloc::alloc(layout) };
        let base = match NonNull::new(ptr) {
            Some(base) => base,
            None => alloc::handle_alloc_error(layout),
        };
        Ok(Self { base, layout })
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // SAFETY: allocated with this exact layout in `new`.
        unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) };
    }
}

/// Plans the column layout for one signature and hands out chunks carved
/// from a pre-reserved arena. Chunk memory never relocates, and no chunk is
/// created past the reserved count.
pub struct ChunkFactory {
    signature: Signature,
    layout: ChunkLayout,
    chunk_stride: usize,
    reserved: usize,
    created: usize,
    arena: Rc<Arena>,
}

impl ChunkFactory {
    pub(crate) fn new(
        signature: Signature,
        registry: &ComponentRegistry,
        chunk_bytes: usize,
        reserved_chunks: usize,
    ) -> Result<Self, LayoutError> {
        debug_assert!(chunk_bytes > 0 && reserved_chunks > 0);
        let layout = plan(&signature, registry, chunk_bytes)?;
        let chunk_stride = align_up(chunk_bytes, CHUNK_ALIGN);
        let total = chunk_stride
            .checked_mul(reserved_chunks)
            .ok_or(LayoutError::ArenaTooLarge {
                chunks: reserved_chunks,
                stride: chunk_stride,
            })?;
        let arena = Rc::new(Arena::new(total, reserved_chunks, chunk_stride)?);
        trace!(
            signature = ?signature,
            capacity = layout.capacity,
            reserved_chunks,
            chunk_stride,
            "planned chunk layout"
        );
        Ok(Self {
            signature,
            layout,
            chunk_stride,
            reserved: reserved_chunks,
            created: 0,
            arena,
        })
    }

    /// Rows each chunk holds.
    pub fn chunk_capacity(&self) -> usize {
        self.layout.capacity
    }

    pub fn reserved_chunks(&self) -> usize {
        self.reserved
    }

    pub fn chunks_created(&self) -> usize {
        self.created
    }

    pub fn can_create(&self) -> bool {
        self.created < self.reserved
    }

    /// Carves the next chunk out of the arena, or `None` once the reserved
    /// count is spent.
    pub(crate) fn create(&mut self) -> Option<Chunk> {
        if !self.can_create() {
            return None;
        }
        // SAFETY: created < reserved, so this chunk's byte range lies inside
        // the arena.
        let base = unsafe { self.arena.base.as_ptr().add(self.created * self.chunk_stride) };
        self.created += 1;

        let mut columns = Box::new([ColumnPtr::NULL; MAX_COMPONENTS]);
        for id in self.signature.ids() {
            let col = self.layout.columns[id as usize];
            debug_assert!(col.present);
            columns[id as usize] = ColumnPtr {
                // SAFETY: planned offsets stay within the chunk budget.
                ptr: unsafe { base.add(col.offset as usize) },
                stride: col.stride,
            };
        }
        Some(Chunk::new(
            columns,
            self.signature,
            self.layout.capacity,
            Rc::clone(&self.arena),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentId, Entity, ENTITY_COMPONENT_ID};

    fn registry_with(layouts: &[(ComponentId, u16, u16)]) -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        for &(id, size, alignment) in layouts {
            registry
                .register(ComponentTypeInfo {
                    id,
                    size,
                    alignment,
                })
                .unwrap();
        }
        registry
    }

    #[test]
    fn capacity_is_budget_over_record_bytes_when_padding_is_free() {
        // 4 + 8 = 12 bytes per record, 64-byte budget: upper bound 5.
        // A occupies [0, 20), B aligns to 24 and ends at 64. Fits.
        let registry = registry_with(&[(1, 4, 4), (2, 8, 8)]);
        let layout = plan(&Signature::with(&[1, 2]), &registry, 64).unwrap();
        assert_eq!(layout.capacity, 5);
    }

    #[test]
    fn capacity_decrements_until_padding_fits() {
        // 9 bytes per record, 30-byte budget: upper bound 3, but B's column
        // would end at 8 + 24 = 32. One decrement lands at 2.
        let registry = registry_with(&[(1, 1, 1), (2, 8, 8)]);
        let layout = plan(&Signature::with(&[1, 2]), &registry, 30).unwrap();
        assert_eq!(layout.capacity, 2);
    }

    #[test]
    fn columns_pack_in_ascending_id_order() {
        let registry = registry_with(&[(1, 4, 4), (2, 8, 8)]);
        let layout = plan(&Signature::with(&[1, 2]), &registry, 64).unwrap();
        assert_eq!(layout.columns[1].offset, 0);
        assert_eq!(layout.columns[1].stride, 4);
        assert_eq!(layout.columns[2].offset, 24);
        assert_eq!(layout.columns[2].stride, 8);
        assert!(!layout.columns[3].present);
    }

    #[test]
    fn oversized_record_is_rejected() {
        let registry = registry_with(&[(1, 64, 8)]);
        let err = plan(&Signature::with(&[1]), &registry, 32).unwrap_err();
        assert_eq!(
            err,
            LayoutError::BudgetExceeded {
                needed: 64,
                budget: 32
            }
        );
    }

    #[test]
    fn unregistered_and_empty_signatures_are_rejected() {
        let registry = ComponentRegistry::new();
        assert_eq!(
            plan(&Signature::with(&[9]), &registry, 1024).unwrap_err(),
            LayoutError::UnregisteredComponent { id: 9 }
        );
        assert_eq!(
            plan(&Signature::new(), &registry, 1024).unwrap_err(),
            LayoutError::EmptySignature
        );
    }

    #[test]
    fn factory_stops_at_the_reserved_count() {
        let registry = ComponentRegistry::new();
        let signature = Signature::with(&[ENTITY_COMPONENT_ID]);
        let mut factory = ChunkFactory::new(signature, &registry, 128, 2).unwrap();

        assert_eq!(factory.chunk_capacity(), 128 / std::mem::size_of::<Entity>());
        assert!(factory.can_create());
        assert!(factory.create().is_some());
        assert!(factory.create().is_some());
        assert_eq!(factory.chunks_created(), 2);
        assert!(!factory.can_create());
        assert!(factory.create().is_none());
    }

    #[test]
    fn chunk_bases_are_aligned_and_distinct() {
        let registry = ComponentRegistry::new();
        let signature = Signature::with(&[ENTITY_COMPONENT_ID]);
        let mut factory = ChunkFactory::new(signature, &registry, 100, 2).unwrap();

        let first = factory.create().unwrap();
        let second = factory.create().unwrap();
        let (a, _) = first.column(ENTITY_COMPONENT_ID).unwrap();
        let (b, _) = second.column(ENTITY_COMPONENT_ID).unwrap();
        assert_eq!(a as usize % CHUNK_ALIGN, 0);
        // 100-byte budget rounds up to a 128-byte stride
        assert_eq!(b as usize - a as usize, 128);
    }
}
