//! One archetype: every entity whose component set matches one signature.

use std::collections::HashMap;
use std::ptr::NonNull;

use crate::component::{ComponentId, ComponentRegistry, Entity, ENTITY_COMPONENT_ID};
use crate::error::{LayoutError, StoreError};
use crate::record::{ComponentRecord, RecordScratch};
use crate::signature::Signature;
use crate::storage::chunk::Chunk;
use crate::storage::factory::ChunkFactory;
use crate::store::StoreConfig;

/// Where an entity's record lives within an archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    pub chunk: usize,
    pub slot: usize,
}

/// Chunk list plus an entity-to-row index for one signature. Rows stay dense
/// per chunk; removal swap-fills from the back of the same chunk.
pub struct Archetype {
    signature: Signature,
    factory: ChunkFactory,
    chunks: Vec<Chunk>,
    locations: HashMap<Entity, EntityLocation>,
    count: usize,
}

impl Archetype {
    pub(crate) fn new(
        signature: Signature,
        registry: &ComponentRegistry,
        config: &StoreConfig,
    ) -> Result<Self, LayoutError> {
        debug_assert!(
            signature.contains(ENTITY_COMPONENT_ID),
            "archetype signatures carry the identity column"
        );
        let factory = ChunkFactory::new(
            signature,
            registry,
            config.chunk_bytes,
            config.chunks_per_archetype,
        )?;
        Ok(Self {
            signature,
            factory,
            chunks: Vec::new(),
            locations: HashMap::new(),
            count: 0,
        })
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Live entities across all chunks.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Rows per chunk, fixed at planning time.
    pub fn chunk_capacity(&self) -> usize {
        self.factory.chunk_capacity()
    }

    pub fn location_of(&self, entity: Entity) -> Option<EntityLocation> {
        self.locations.get(&entity).copied()
    }

    /// Stores a record: overwrites in place when the entity already lives
    /// here, appends otherwise.
    pub(crate) fn set(&mut self, entity: Entity, record: &ComponentRecord) -> Result<(), StoreError> {
        if let Some(location) = self.locations.get(&entity).copied() {
            self.chunks[location.chunk].write_record(location.slot, record);
            return Ok(());
        }
        let chunk_index = self
            .chunk_with_room()
            .ok_or(StoreError::CapacityExhausted { entity })?;
        let slot = self.chunks[chunk_index].push_record(record);
        self.locations.insert(
            entity,
            EntityLocation {
                chunk: chunk_index,
                slot,
            },
        );
        self.count += 1;
        Ok(())
    }

    // Recent chunks are the least likely to be full, so scan from the back.
    fn chunk_with_room(&mut self) -> Option<usize> {
        for index in (0..self.chunks.len()).rev() {
            if !self.chunks[index].is_full() {
                return Some(index);
            }
        }
        let chunk = self.factory.create()?;
        self.chunks.push(chunk);
        Some(self.chunks.len() - 1)
    }

    /// Swap-removes an entity, keeping its chunk dense. Returns false when
    /// the entity does not live here.
    pub(crate) fn remove(&mut self, entity: Entity) -> bool {
        let Some(location) = self.locations.remove(&entity) else {
            return false;
        };
        let chunk = &mut self.chunks[location.chunk];
        let last = chunk.len() - 1;
        if location.slot != last {
            let moved = chunk.entity_at(last);
            chunk.swap_slots(location.slot, last);
            self.locations.insert(moved, location);
        }
        chunk.pop();
        self.count -= 1;
        true
    }

    /// Pointer to one component cell of a resident entity.
    pub fn component_ptr(&self, entity: Entity, id: ComponentId) -> Option<NonNull<u8>> {
        let location = self.locations.get(&entity)?;
        self.chunks[location.chunk].component_ptr(id, location.slot)
    }

    /// Copies the entity's full record into `scratch`. Returns false when
    /// the entity does not live here.
    pub(crate) fn snapshot_record(&self, entity: Entity, scratch: &mut RecordScratch) -> bool {
        let Some(location) = self.locations.get(&entity) else {
            return false;
        };
        scratch.clear();
        let chunk = &self.chunks[location.chunk];
        for id in self.signature.ids() {
            let Some((base, stride)) = chunk.column(id) else {
                debug_assert!(false, "signature column missing from chunk");
                continue;
            };
            // SAFETY: the row is live and the cell holds `stride` bytes.
            unsafe {
                scratch.push(
                    id,
                    base.add(location.slot * stride as usize) as *const u8,
                    stride as usize,
                );
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::define_component;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Mass(u64);
    define_component!(Mass, 1, "Mass");

    fn setup(config: StoreConfig) -> (Archetype, ComponentRegistry) {
        let mut registry = ComponentRegistry::new();
        registry.register_type::<Mass>().unwrap();
        let signature = Signature::with(&[ENTITY_COMPONENT_ID, Mass::ID]);
        let archetype = Archetype::new(signature, &registry, &config).unwrap();
        (archetype, registry)
    }

    fn insert(archetype: &mut Archetype, raw: u64, mass: u64) -> Result<(), StoreError> {
        let entity = Entity::from_raw(raw);
        let value = Mass(mass);
        let mut record = ComponentRecord::new(&entity);
        record.set_ptr(Mass::ID, (&value as *const Mass).cast());
        archetype.set(entity, &record)
    }

    fn mass_of(archetype: &Archetype, raw: u64) -> Option<Mass> {
        let ptr = archetype.component_ptr(Entity::from_raw(raw), Mass::ID)?;
        Some(unsafe { ptr.cast::<Mass>().as_ptr().read() })
    }

    #[test]
    fn insert_update_and_read() {
        let (mut archetype, _registry) = setup(StoreConfig::default());
        insert(&mut archetype, 1, 10).unwrap();
        insert(&mut archetype, 2, 20).unwrap();
        assert_eq!(archetype.len(), 2);
        assert_eq!(mass_of(&archetype, 1), Some(Mass(10)));

        // update keeps the row where it was
        let before = archetype.location_of(Entity::from_raw(1)).unwrap();
        insert(&mut archetype, 1, 11).unwrap();
        assert_eq!(archetype.len(), 2);
        assert_eq!(archetype.location_of(Entity::from_raw(1)), Some(before));
        assert_eq!(mass_of(&archetype, 1), Some(Mass(11)));
    }

    #[test]
    fn swap_remove_reindexes_the_moved_entity() {
        let (mut archetype, _registry) = setup(StoreConfig::default());
        for raw in 1..=3 {
            insert(&mut archetype, raw, raw * 100).unwrap();
        }

        assert!(archetype.remove(Entity::from_raw(1)));
        assert_eq!(archetype.len(), 2);
        assert_eq!(archetype.location_of(Entity::from_raw(1)), None);
        // entity 3 was swapped into slot 0
        assert_eq!(
            archetype.location_of(Entity::from_raw(3)),
            Some(EntityLocation { chunk: 0, slot: 0 })
        );
        assert_eq!(mass_of(&archetype, 3), Some(Mass(300)));
        assert_eq!(mass_of(&archetype, 2), Some(Mass(200)));

        assert!(!archetype.remove(Entity::from_raw(1)));
    }

    #[test]
    fn removing_the_last_row_is_a_plain_pop() {
        let (mut archetype, _registry) = setup(StoreConfig::default());
        insert(&mut archetype, 1, 10).unwrap();
        insert(&mut archetype, 2, 20).unwrap();

        assert!(archetype.remove(Entity::from_raw(2)));
        assert_eq!(archetype.len(), 1);
        assert_eq!(mass_of(&archetype, 1), Some(Mass(10)));
    }

    #[test]
    fn inserts_spill_into_a_second_chunk() {
        // Entity (8) + Mass (8): a 64-byte chunk holds 4 rows.
        let config = StoreConfig {
            chunk_bytes: 64,
            chunks_per_archetype: 4,
            ..StoreConfig::default()
        };
        let (mut archetype, _registry) = setup(config);
        assert_eq!(archetype.chunk_capacity(), 4);

        for raw in 0..5 {
            insert(&mut archetype, raw, raw).unwrap();
        }
        assert_eq!(archetype.chunks().len(), 2);
        assert_eq!(
            archetype.location_of(Entity::from_raw(4)),
            Some(EntityLocation { chunk: 1, slot: 0 })
        );
    }

    #[test]
    fn insert_fails_once_every_chunk_is_spent() {
        let config = StoreConfig {
            chunk_bytes: 64,
            chunks_per_archetype: 1,
            ..StoreConfig::default()
        };
        let (mut archetype, _registry) = setup(config);

        for raw in 0..4 {
            insert(&mut archetype, raw, raw).unwrap();
        }
        let err = insert(&mut archetype, 99, 99).unwrap_err();
        assert_eq!(
            err,
            StoreError::CapacityExhausted {
                entity: Entity::from_raw(99)
            }
        );
        assert_eq!(archetype.len(), 4);
        assert_eq!(archetype.location_of(Entity::from_raw(99)), None);
    }

    #[test]
    fn snapshot_copies_every_column() {
        let (mut archetype, _registry) = setup(StoreConfig::default());
        insert(&mut archetype, 7, 77).unwrap();

        let mut scratch = RecordScratch::default();
        assert!(archetype.snapshot_record(Entity::from_raw(7), &mut scratch));

        let probe = Entity::from_raw(7);
        let mut record = ComponentRecord::new(&probe);
        scratch.fill_record(&mut record);
        assert_eq!(
            unsafe { record.ptr(Mass::ID).cast::<Mass>().read() },
            Mass(77)
        );
        assert_eq!(
            unsafe { record.ptr(ENTITY_COMPONENT_ID).cast::<Entity>().read() },
            Entity::from_raw(7)
        );

        assert!(!archetype.snapshot_record(Entity::from_raw(8), &mut scratch));
    }
}
