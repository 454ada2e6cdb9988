//! Chunked column storage: layout planning, chunks, archetypes.

pub mod archetype;
pub mod chunk;
pub mod factory;
