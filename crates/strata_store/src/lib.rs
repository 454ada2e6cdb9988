//! Archetype-grouped component storage.
//!
//! Entities are grouped by the exact set of component types they carry
//! (their signature). Each group, an archetype, packs its entities
//! column-by-column into fixed-size chunks carved from a pre-reserved
//! arena, so bulk iteration is a linear walk over contiguous columns and
//! component pointers never move.
//!
//! ```
//! use strata_store::{ArchetypeStore, ComponentView, Entity, define_component};
//!
//! #[derive(Clone, Copy)]
//! struct Position { x: f32, y: f32 }
//! define_component!(Position, 1, "Position");
//!
//! let mut store = ArchetypeStore::new();
//! store.register_component::<Position>()?;
//! store.set_components(Entity::from_raw(1), Position { x: 0.0, y: 0.0 })?;
//!
//! let mut view = ComponentView::<(Position,)>::new(&mut store);
//! view.for_each(|(position,)| position.x += 1.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bundle;
pub mod component;
pub mod error;
pub mod notify;
pub mod query;
pub mod record;
pub mod signature;
pub mod storage;
pub mod store;
pub mod view;

pub use bundle::ComponentSet;
pub use component::{
    Component, ComponentId, ComponentRegistry, ComponentTypeInfo, Entity, ENTITY_COMPONENT_ID,
    MAX_COMPONENTS,
};
pub use error::{LayoutError, RegistryError, StoreError};
pub use notify::{ChangeNotifier, SubscriptionId};
pub use query::{ComponentQuery, MAX_QUERY};
pub use record::ComponentRecord;
pub use signature::Signature;
pub use storage::archetype::{Archetype, EntityLocation};
pub use storage::chunk::Chunk;
pub use storage::factory::{ChunkFactory, CHUNK_ALIGN};
pub use store::{ArchetypeStore, StoreConfig};
pub use view::{ComponentView, SubscribedView, ViewIter};
