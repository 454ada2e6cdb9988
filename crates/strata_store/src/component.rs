//! Component identity and the store-owned type registry.

use std::mem;

use crate::error::RegistryError;

/// Numeric identity of a component type. Ids are assigned by the caller and
/// must be stable for the lifetime of the store.
pub type ComponentId = u16;

/// Hard cap on distinct component types. Fixes the signature width and the
/// size of per-chunk column tables.
pub const MAX_COMPONENTS: usize = 128;

/// Component id reserved for the entity's own identifier, present in every
/// archetype.
pub const ENTITY_COMPONENT_ID: ComponentId = 0;

/// Opaque entity handle. Allocation of fresh ids happens outside the store;
/// the store only records what each id currently carries.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity(u64);

impl Entity {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Plain-data component type with a caller-assigned id.
///
/// Implementors must be `Copy`: chunk storage moves component bytes with raw
/// copies and never runs destructors.
pub trait Component: Copy + 'static {
    const ID: ComponentId;
    const NAME: &'static str;
}

impl Component for Entity {
    const ID: ComponentId = ENTITY_COMPONENT_ID;
    const NAME: &'static str = "Entity";
}

/// Declares a type as a component with an explicit id.
///
/// ```
/// use strata_store::define_component;
///
/// #[derive(Clone, Copy)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
/// define_component!(Position, 1, "Position");
/// ```
#[macro_export]
macro_rules! define_component {
    ($ty:ty, $id:expr, $name:expr) => {
        impl $crate::Component for $ty {
            const ID: $crate::ComponentId = $id;
            const NAME: &'static str = $name;
        }
    };
}

/// Memory layout descriptor for one registered component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentTypeInfo {
    pub id: ComponentId,
    pub size: u16,
    pub alignment: u16,
}

impl ComponentTypeInfo {
    pub fn of<T: Component>() -> Self {
        Self {
            id: T::ID,
            size: mem::size_of::<T>() as u16,
            alignment: mem::align_of::<T>() as u16,
        }
    }
}

/// Id-indexed table of component layouts. Owned by the store; every chunk
/// layout is planned from what is registered here.
///
/// Slot 0 is pre-registered for [`Entity`] so the identity column can be
/// requested like any other component.
pub struct ComponentRegistry {
    infos: [Option<ComponentTypeInfo>; MAX_COMPONENTS],
    count: usize,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistry {
    pub fn new() -> Self {
        let mut infos = [None; MAX_COMPONENTS];
        infos[ENTITY_COMPONENT_ID as usize] = Some(ComponentTypeInfo::of::<Entity>());
        Self { infos, count: 1 }
    }

    /// Registers a layout descriptor. Re-registering an identical layout is
    /// a no-op; a conflicting layout for an already-used id is an error.
    pub fn register(&mut self, info: ComponentTypeInfo) -> Result<(), RegistryError> {
        if (info.id as usize) >= MAX_COMPONENTS {
            return Err(RegistryError::IdOutOfRange {
                id: info.id,
                max: MAX_COMPONENTS - 1,
            });
        }
        if info.size == 0 {
            return Err(RegistryError::ZeroSized { id: info.id });
        }
        if !info.alignment.is_power_of_two() {
            return Err(RegistryError::InvalidAlignment {
                id: info.id,
                alignment: info.alignment,
            });
        }
        match self.infos[info.id as usize] {
            Some(existing) if existing == info => Ok(()),
            Some(_) => Err(RegistryError::LayoutMismatch { id: info.id }),
            None => {
                self.infos[info.id as usize] = Some(info);
                self.count += 1;
                Ok(())
            }
        }
    }

    /// Registers `T` from its Rust layout.
    pub fn register_type<T: Component>(&mut self) -> Result<(), RegistryError> {
        if mem::size_of::<T>() > u16::MAX as usize || mem::align_of::<T>() > u16::MAX as usize {
            return Err(RegistryError::LayoutTooLarge { id: T::ID });
        }
        self.register(ComponentTypeInfo::of::<T>())
    }

    pub fn get(&self, id: ComponentId) -> Option<ComponentTypeInfo> {
        self.infos.get(id as usize).copied().flatten()
    }

    pub fn is_registered(&self, id: ComponentId) -> bool {
        self.get(id).is_some()
    }

    /// Number of registered component types, including the entity id.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy)]
    struct Position {
        x: f32,
        y: f32,
    }
    define_component!(Position, 1, "Position");

    #[derive(Clone, Copy)]
    struct Marker;
    define_component!(Marker, 2, "Marker");

    #[derive(Clone, Copy)]
    struct FarOut(u8);
    define_component!(FarOut, 9000, "FarOut");

    #[test]
    fn entity_is_preregistered() {
        let registry = ComponentRegistry::new();
        let info = registry.get(ENTITY_COMPONENT_ID).unwrap();
        assert_eq!(info.size as usize, std::mem::size_of::<Entity>());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_and_get() {
        let mut registry = ComponentRegistry::new();
        registry.register_type::<Position>().unwrap();
        let info = registry.get(Position::ID).unwrap();
        assert_eq!(info.size, 8);
        assert_eq!(info.alignment, 4);
        assert!(registry.is_registered(Position::ID));
        assert!(!registry.is_registered(3));

        let position = Position { x: 1.0, y: 2.0 };
        assert_eq!((position.x, position.y), (1.0, 2.0));
    }

    #[test]
    fn identical_reregistration_is_a_noop() {
        let mut registry = ComponentRegistry::new();
        registry.register_type::<Position>().unwrap();
        registry.register_type::<Position>().unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn conflicting_layout_is_rejected() {
        let mut registry = ComponentRegistry::new();
        registry.register_type::<Position>().unwrap();
        let err = registry
            .register(ComponentTypeInfo {
                id: Position::ID,
                size: 16,
                alignment: 8,
            })
            .unwrap_err();
        assert_eq!(err, RegistryError::LayoutMismatch { id: Position::ID });
    }

    #[test]
    fn zero_sized_components_are_rejected() {
        let mut registry = ComponentRegistry::new();
        let err = registry.register_type::<Marker>().unwrap_err();
        assert_eq!(err, RegistryError::ZeroSized { id: Marker::ID });
    }

    #[test]
    fn out_of_range_id_is_rejected() {
        let mut registry = ComponentRegistry::new();
        let err = registry.register_type::<FarOut>().unwrap_err();
        assert_eq!(
            err,
            RegistryError::IdOutOfRange {
                id: FarOut::ID,
                max: MAX_COMPONENTS - 1
            }
        );
    }

    #[test]
    fn bad_alignment_is_rejected() {
        let mut registry = ComponentRegistry::new();
        let err = registry
            .register(ComponentTypeInfo {
                id: 5,
                size: 12,
                alignment: 3,
            })
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::InvalidAlignment {
                id: 5,
                alignment: 3
            }
        );
    }
}
