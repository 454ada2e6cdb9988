//! Typed multi-component queries over chunk columns.

use crate::component::{Component, ComponentId};
use crate::signature::Signature;

/// Most component types one view may request.
pub const MAX_QUERY: usize = 8;

/// A tuple of component types a view iterates together.
///
/// # Safety
/// `write_ids` must report exactly the ids of the tuple's types in tuple
/// order, and `item_at` must only be called with columns laid out in that
/// same order.
pub unsafe trait ComponentQuery {
    /// Borrowed row yielded per entity.
    type Item<'a>;

    /// Number of component types in the tuple.
    const LEN: usize;

    /// Writes the tuple's component ids into `ids[..LEN]`.
    fn write_ids(ids: &mut [ComponentId; MAX_QUERY]);

    /// Signature with every tuple id set.
    fn signature() -> Signature;

    /// Reads one row.
    ///
    /// # Safety
    /// `ptrs[..LEN]` and `strides[..LEN]` must describe live columns of the
    /// tuple's types, in tuple order, with at least `row + 1` live rows, and
    /// the caller must hold exclusive access to those columns for `'a`.
    unsafe fn item_at<'a>(
        ptrs: &[*mut u8; MAX_QUERY],
        strides: &[u16; MAX_QUERY],
        row: usize,
    ) -> Self::Item<'a>;
}

macro_rules! impl_component_query {
    ($len:expr; $(($ty:ident, $index:tt)),+) => {
        unsafe impl<$($ty: Component),+> ComponentQuery for ($($ty,)+) {
            type Item<'a> = ($(&'a mut $ty,)+);

            const LEN: usize = $len;

            fn write_ids(ids: &mut [ComponentId; MAX_QUERY]) {
                $(ids[$index] = $ty::ID;)+
            }

            fn signature() -> Signature {
                let mut signature = Signature::new();
                $(signature.set($ty::ID);)+
                signature
            }

            unsafe fn item_at<'a>(
                ptrs: &[*mut u8; MAX_QUERY],
                strides: &[u16; MAX_QUERY],
                row: usize,
            ) -> Self::Item<'a> {
                ($(
                    &mut *ptrs[$index]
                        .add(row * strides[$index] as usize)
                        .cast::<$ty>(),
                )+)
            }
        }
    };
}

impl_component_query!(1; (A, 0));
impl_component_query!(2; (A, 0), (B, 1));
impl_component_query!(3; (A, 0), (B, 1), (C, 2));
impl_component_query!(4; (A, 0), (B, 1), (C, 2), (D, 3));
impl_component_query!(5; (A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_component_query!(6; (A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));
impl_component_query!(7; (A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6));
impl_component_query!(8; (A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7));

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Hp(u32);
    define_component!(Hp, 4, "Hp");

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Armor(u32);
    define_component!(Armor, 6, "Armor");

    #[test]
    fn ids_and_signature_follow_the_tuple() {
        let mut ids = [0; MAX_QUERY];
        <(Armor, Hp)>::write_ids(&mut ids);
        assert_eq!(&ids[..2], &[Armor::ID, Hp::ID]);
        assert_eq!(<(Armor, Hp)>::LEN, 2);
        assert_eq!(
            <(Armor, Hp)>::signature(),
            Signature::with(&[Hp::ID, Armor::ID])
        );
    }

    #[test]
    fn item_at_walks_columns_by_stride() {
        let mut hp = [Hp(1), Hp(2), Hp(3)];
        let mut armor = [Armor(10), Armor(20), Armor(30)];

        let mut ptrs = [std::ptr::null_mut(); MAX_QUERY];
        let mut strides = [0u16; MAX_QUERY];
        ptrs[0] = hp.as_mut_ptr().cast();
        strides[0] = std::mem::size_of::<Hp>() as u16;
        ptrs[1] = armor.as_mut_ptr().cast();
        strides[1] = std::mem::size_of::<Armor>() as u16;

        let (h, a) = unsafe { <(Hp, Armor)>::item_at(&ptrs, &strides, 1) };
        assert_eq!(*h, Hp(2));
        assert_eq!(*a, Armor(20));
        h.0 = 99;
        assert_eq!(hp[1], Hp(99));
    }
}
