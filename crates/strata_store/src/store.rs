//! The archetype store: entity records grouped by exact component set.

use std::collections::HashMap;
use std::mem;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::bundle::ComponentSet;
use crate::component::{
    Component, ComponentId, ComponentRegistry, Entity, ENTITY_COMPONENT_ID,
};
use crate::error::{LayoutError, RegistryError, StoreError};
use crate::notify::{ChangeNotifier, SubscriptionId};
use crate::record::{ComponentRecord, RecordScratch};
use crate::signature::Signature;
use crate::storage::archetype::Archetype;

/// Storage parameters, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    /// Byte budget for one chunk's columns.
    pub chunk_bytes: usize,
    /// Chunks pre-reserved per archetype; the hard cap on archetype growth.
    pub chunks_per_archetype: usize,
    /// Expected number of live entities, used to pre-size the entity index.
    pub entity_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: 16 * 1024,
            chunks_per_archetype: 256,
            entity_capacity: 4096,
        }
    }
}

impl StoreConfig {
    fn validate(&self) -> Result<(), StoreError> {
        if self.chunk_bytes == 0 {
            return Err(StoreError::InvalidConfig {
                reason: "chunk_bytes must be nonzero",
            });
        }
        if self.chunks_per_archetype == 0 {
            return Err(StoreError::InvalidConfig {
                reason: "chunks_per_archetype must be nonzero",
            });
        }
        Ok(())
    }
}

// Distinguishes store instances for the lifetime of the process, so a
// subscribed view can tell its own store from a stranger.
static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(0);

/// Groups entities by the exact set of component types they carry.
///
/// Each distinct signature owns one [`Archetype`]; adding or removing a
/// component migrates the entity's whole record between archetypes. The
/// store is single-threaded and every operation completes synchronously.
pub struct ArchetypeStore {
    id: u64,
    config: StoreConfig,
    registry: ComponentRegistry,
    archetypes: HashMap<Signature, Archetype>,
    entities: HashMap<Entity, Signature>,
    notifier: ChangeNotifier,
    scratch: RecordScratch,
}

impl Default for ArchetypeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchetypeStore {
    pub fn new() -> Self {
        Self::build(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: StoreConfig) -> Self {
        Self {
            id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            config,
            registry: ComponentRegistry::new(),
            archetypes: HashMap::new(),
            entities: HashMap::with_capacity(config.entity_capacity),
            notifier: ChangeNotifier::new(),
            scratch: RecordScratch::default(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Process-unique identity of this store instance.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Registers `T` so it can be stored. Must happen before the first
    /// `set_components` naming `T`.
    pub fn register_component<T: Component>(&mut self) -> Result<(), RegistryError> {
        self.registry.register_type::<T>()
    }

    /// Live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Signature of the archetype the entity currently lives in.
    pub fn signature_of(&self, entity: Entity) -> Option<Signature> {
        self.entities.get(&entity).copied()
    }

    pub fn archetype(&self, signature: &Signature) -> Option<&Archetype> {
        self.archetypes.get(signature)
    }

    /// Every archetype whose signature is a superset of `query`.
    pub fn find_archetypes(&self, query: Signature) -> impl Iterator<Item = &Archetype> {
        self.archetypes
            .values()
            .filter(move |archetype| archetype.signature().contains_all(&query))
    }

    /// Looks up the archetype for `signature`, creating it (and firing the
    /// added notification) on first use. The identity column is implied; an
    /// empty signature is an error.
    pub fn get_or_create_archetype(&mut self, signature: Signature) -> Result<&Archetype, StoreError> {
        if signature.is_empty() {
            return Err(StoreError::Layout(LayoutError::EmptySignature));
        }
        let mut signature = signature;
        signature.set(ENTITY_COMPONENT_ID);
        Ok(&*self.ensure_archetype(signature)?)
    }

    pub fn subscribe_added(
        &mut self,
        callback: impl FnMut(&Signature) + 'static,
    ) -> SubscriptionId {
        self.notifier.subscribe_added(callback)
    }

    pub fn subscribe_updated(
        &mut self,
        callback: impl FnMut(&Signature) + 'static,
    ) -> SubscriptionId {
        self.notifier.subscribe_updated(callback)
    }

    pub fn unsubscribe_added(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe_added(id)
    }

    pub fn unsubscribe_updated(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe_updated(id)
    }

    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.entities
            .get(&entity)
            .is_some_and(|signature| signature.contains(T::ID))
    }

    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        let ptr = self.component_ptr(entity, T::ID)?;
        // SAFETY: the column layout matches T's registered size and
        // alignment, and the row stays put for the duration of the borrow.
        Some(unsafe { ptr.cast::<T>().as_ref() })
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let ptr = self.component_ptr(entity, T::ID)?;
        // SAFETY: as above, and the &mut self borrow makes access exclusive.
        Some(unsafe { ptr.cast::<T>().as_mut() })
    }

    fn component_ptr(&self, entity: Entity, id: ComponentId) -> Option<NonNull<u8>> {
        let signature = self.entities.get(&entity)?;
        if !signature.contains(id) {
            return None;
        }
        self.archetypes.get(signature)?.component_ptr(entity, id)
    }

    /// Stores component values for an entity.
    ///
    /// A new entity lands in the archetype for the supplied set (plus the
    /// identity column). An existing entity keeps its other components: the
    /// target signature is the union of old and new, existing values are
    /// carried over, supplied values overwrite. Within one archetype this is
    /// an in-place overwrite; across archetypes the whole record migrates
    /// and the source row is swap-removed.
    ///
    /// On any error the store is left exactly as it was.
    pub fn set_components<S: ComponentSet>(
        &mut self,
        entity: Entity,
        components: S,
    ) -> Result<(), StoreError> {
        let registry = &self.registry;
        let mut missing = None;
        S::for_each_id(&mut |id| {
            if missing.is_none() && !registry.is_registered(id) {
                missing = Some(id);
            }
        });
        if let Some(id) = missing {
            return Err(StoreError::UnregisteredComponent { id });
        }

        let mut signature = S::signature();
        signature.set(ENTITY_COMPONENT_ID);

        let previous = self.entities.get(&entity).copied();
        let mut record = ComponentRecord::new(&entity);
        let mut scratch = mem::take(&mut self.scratch);

        if let Some(prev) = previous {
            signature = signature.union(&prev);
            // A desynced index must not feed null pointers into the copy
            // below, so it is reported instead of assumed away.
            let snapshotted = self
                .archetypes
                .get(&prev)
                .is_some_and(|source| source.snapshot_record(entity, &mut scratch));
            if !snapshotted {
                self.scratch = scratch;
                return Err(StoreError::InconsistentLocation { entity });
            }
            scratch.fill_record(&mut record);
        }
        components.fill_record(&mut record);

        let result = self.apply_record(entity, previous, signature, &record);
        self.scratch = scratch;
        result
    }

    /// Removes one component from an entity, migrating it to the smaller
    /// archetype. Removing the last component removes the entity entirely.
    /// Returns `Ok(false)` when the entity is unknown or does not carry `T`.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<bool, StoreError> {
        let Some(prev) = self.entities.get(&entity).copied() else {
            return Ok(false);
        };
        if !prev.contains(T::ID) {
            return Ok(false);
        }

        let mut next = prev;
        next.clear(T::ID);
        // Only the identity column left: the entity goes away entirely.
        if next.len() <= 1 {
            return Ok(self.remove_entity(entity));
        }

        let mut record = ComponentRecord::new(&entity);
        let mut scratch = mem::take(&mut self.scratch);
        let snapshotted = self
            .archetypes
            .get(&prev)
            .is_some_and(|source| source.snapshot_record(entity, &mut scratch));
        if !snapshotted {
            self.scratch = scratch;
            return Err(StoreError::InconsistentLocation { entity });
        }
        // The snapshot still carries T's bytes; the target archetype only
        // reads the columns of its own signature, so they are ignored.
        scratch.fill_record(&mut record);

        let result = self.apply_record(entity, Some(prev), next, &record);
        self.scratch = scratch;
        result.map(|()| true)
    }

    /// Removes an entity and its whole record. Returns false when unknown.
    pub fn remove_entity(&mut self, entity: Entity) -> bool {
        let Some(signature) = self.entities.remove(&entity) else {
            return false;
        };
        if let Some(archetype) = self.archetypes.get_mut(&signature) {
            archetype.remove(entity);
        }
        self.notifier.notify_updated(&signature);
        true
    }

    /// Inserts the record into its target archetype, then retires the old
    /// row. The insert happens first so a failure leaves the old row (and
    /// the entity index) untouched.
    fn apply_record(
        &mut self,
        entity: Entity,
        previous: Option<Signature>,
        signature: Signature,
        record: &ComponentRecord,
    ) -> Result<(), StoreError> {
        let target = self.ensure_archetype(signature)?;
        if let Err(err) = target.set(entity, record) {
            warn!(entity = entity.raw(), %err, "failed to store entity record");
            return Err(err);
        }

        match previous {
            Some(prev) if prev != signature => {
                if let Some(source) = self.archetypes.get_mut(&prev) {
                    source.remove(entity);
                }
                self.entities.insert(entity, signature);
                self.notifier.notify_updated(&prev);
            }
            Some(_) => {}
            None => {
                self.entities.insert(entity, signature);
            }
        }
        self.notifier.notify_updated(&signature);
        Ok(())
    }

    fn ensure_archetype(&mut self, signature: Signature) -> Result<&mut Archetype, StoreError> {
        if signature.is_empty() {
            return Err(StoreError::Layout(LayoutError::EmptySignature));
        }
        if !self.archetypes.contains_key(&signature) {
            let archetype = Archetype::new(signature, &self.registry, &self.config)?;
            self.archetypes.insert(signature, archetype);
            debug!(signature = ?signature, "created archetype");
            self.notifier.notify_added(&signature);
        }
        Ok(self
            .archetypes
            .get_mut(&signature)
            .expect("archetype exists after insert"))
    }
}
