//! Component sets written to an entity in one call.

use crate::component::{Component, ComponentId};
use crate::record::ComponentRecord;
use crate::signature::Signature;

/// One or more component values stored into an entity atomically.
///
/// Implemented for every [`Component`] and for tuples of up to eight of
/// them, so both `store.set_components(entity, Position { .. })` and
/// `store.set_components(entity, (pos, vel))` work.
pub trait ComponentSet {
    /// Signature with every id in the set.
    fn signature() -> Signature;

    /// Calls `f` once per component id in the set.
    fn for_each_id(f: &mut dyn FnMut(ComponentId));

    /// Points `record` at each value in the set. The record must not
    /// outlive `self`.
    fn fill_record(&self, record: &mut ComponentRecord);
}

impl<T: Component> ComponentSet for T {
    fn signature() -> Signature {
        Signature::with(&[T::ID])
    }

    fn for_each_id(f: &mut dyn FnMut(ComponentId)) {
        f(T::ID);
    }

    fn fill_record(&self, record: &mut ComponentRecord) {
        record.set_ptr(T::ID, (self as *const T).cast());
    }
}

macro_rules! impl_component_set {
    ($(($ty:ident, $index:tt)),+) => {
        impl<$($ty: Component),+> ComponentSet for ($($ty,)+) {
            fn signature() -> Signature {
                let mut signature = Signature::new();
                $(signature.set($ty::ID);)+
                signature
            }

            fn for_each_id(f: &mut dyn FnMut(ComponentId)) {
                $(f($ty::ID);)+
            }

            fn fill_record(&self, record: &mut ComponentRecord) {
                $(record.set_ptr($ty::ID, (&self.$index as *const $ty).cast());)+
            }
        }
    };
}

impl_component_set!((A, 0));
impl_component_set!((A, 0), (B, 1));
impl_component_set!((A, 0), (B, 1), (C, 2));
impl_component_set!((A, 0), (B, 1), (C, 2), (D, 3));
impl_component_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_component_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));
impl_component_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6));
impl_component_set!(
    (A, 0),
    (B, 1),
    (C, 2),
    (D, 3),
    (E, 4),
    (F, 5),
    (G, 6),
    (H, 7)
);
