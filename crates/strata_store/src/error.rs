//! Error types for the storage engine.

use thiserror::Error;

use crate::component::{ComponentId, Entity};

/// Failures while registering component type descriptors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("component id {id} is out of range (max {max})")]
    IdOutOfRange { id: ComponentId, max: usize },

    #[error("component id {id} has zero size")]
    ZeroSized { id: ComponentId },

    #[error("component id {id} alignment {alignment} is not a power of two")]
    InvalidAlignment { id: ComponentId, alignment: u16 },

    #[error("component id {id} layout exceeds the supported maximum")]
    LayoutTooLarge { id: ComponentId },

    #[error("component id {id} is already registered with a different layout")]
    LayoutMismatch { id: ComponentId },
}

/// Failures while planning a chunk layout for a signature.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("cannot plan a chunk layout for an empty signature")]
    EmptySignature,

    #[error("component id {id} is not registered")]
    UnregisteredComponent { id: ComponentId },

    #[error("component id {id} alignment {alignment} exceeds the chunk alignment {max}")]
    AlignmentUnsupported {
        id: ComponentId,
        alignment: u16,
        max: usize,
    },

    #[error("one record needs {needed} bytes, chunk budget is {budget}")]
    BudgetExceeded { needed: usize, budget: usize },

    #[error("chunk arena of {chunks} chunks of {stride} bytes is too large")]
    ArenaTooLarge { chunks: usize, stride: usize },
}

/// Failures surfaced by [`ArchetypeStore`](crate::store::ArchetypeStore)
/// operations. Unknown entities and absent components are reported through
/// `Option`/`Ok(false)` return values, not through this enum.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid store config: {reason}")]
    InvalidConfig { reason: &'static str },

    #[error("component id {id} is not registered")]
    UnregisteredComponent { id: ComponentId },

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("archetype chunk budget exhausted while storing entity {entity:?}")]
    CapacityExhausted { entity: Entity },

    #[error("entity {entity:?} is indexed but has no record in its archetype")]
    InconsistentLocation { entity: Entity },
}
