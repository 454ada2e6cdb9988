//! Flattened iteration over matching archetype chunks.

use std::cell::Cell;
use std::marker::PhantomData;
use std::ptr;
use std::rc::Rc;

use crate::component::ComponentId;
use crate::notify::SubscriptionId;
use crate::query::{ComponentQuery, MAX_QUERY};
use crate::store::ArchetypeStore;

/// Base pointers, strides and row count for one non-empty chunk, in query
/// tuple order.
#[derive(Clone, Copy)]
struct IterationMeta {
    ptrs: [*mut u8; MAX_QUERY],
    strides: [u16; MAX_QUERY],
    rows: usize,
}

fn collect_metas<Q: ComponentQuery>(store: &ArchetypeStore) -> Vec<IterationMeta> {
    let mut ids = [0 as ComponentId; MAX_QUERY];
    Q::write_ids(&mut ids);
    let signature = Q::signature();
    assert_eq!(
        signature.len(),
        Q::LEN,
        "a query must not name the same component twice"
    );

    let mut metas = Vec::new();
    for archetype in store.find_archetypes(signature) {
        for chunk in archetype.chunks() {
            if chunk.is_empty() {
                continue;
            }
            let mut meta = IterationMeta {
                ptrs: [ptr::null_mut(); MAX_QUERY],
                strides: [0; MAX_QUERY],
                rows: chunk.len(),
            };
            for (index, &id) in ids[..Q::LEN].iter().enumerate() {
                let (base, stride) = chunk
                    .column(id)
                    .expect("matched archetype carries every queried column");
                meta.ptrs[index] = base;
                meta.strides[index] = stride;
            }
            metas.push(meta);
        }
    }
    metas
}

/// View over every entity whose archetype carries all of `Q`'s components,
/// captured eagerly at construction.
///
/// The view borrows the store mutably, so the captured pointers stay valid
/// and exclusive for the whole pass.
pub struct ComponentView<'s, Q: ComponentQuery> {
    metas: Vec<IterationMeta>,
    _store: PhantomData<&'s mut ArchetypeStore>,
    _query: PhantomData<fn() -> Q>,
}

impl<'s, Q: ComponentQuery> ComponentView<'s, Q> {
    pub fn new(store: &'s mut ArchetypeStore) -> Self {
        Self {
            metas: collect_metas::<Q>(store),
            _store: PhantomData,
            _query: PhantomData,
        }
    }

    /// Total rows the view visits.
    pub fn len(&self) -> usize {
        self.metas.iter().map(|meta| meta.rows).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    pub fn for_each(&mut self, mut f: impl FnMut(Q::Item<'_>)) {
        for meta in &self.metas {
            for row in 0..meta.rows {
                // SAFETY: metas were captured under the exclusive store
                // borrow this view still holds, and row < meta.rows.
                f(unsafe { Q::item_at(&meta.ptrs, &meta.strides, row) });
            }
        }
    }

    pub fn iter(&mut self) -> ViewIter<'_, Q> {
        ViewIter {
            metas: &self.metas,
            chunk: 0,
            row: 0,
            _query: PhantomData,
        }
    }
}

/// Pull-style cursor over a view's rows.
pub struct ViewIter<'v, Q: ComponentQuery> {
    metas: &'v [IterationMeta],
    chunk: usize,
    row: usize,
    _query: PhantomData<fn() -> Q>,
}

impl<'v, Q: ComponentQuery> Iterator for ViewIter<'v, Q> {
    type Item = Q::Item<'v>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.chunk < self.metas.len() {
            let meta = &self.metas[self.chunk];
            if self.row < meta.rows {
                let row = self.row;
                self.row += 1;
                // SAFETY: row < meta.rows, and rows advance monotonically so
                // no two items alias.
                return Some(unsafe { Q::item_at(&meta.ptrs, &meta.strides, row) });
            }
            self.chunk += 1;
            self.row = 0;
        }
        None
    }
}

/// View that keeps its captured metadata between passes and rebuilds lazily,
/// only after an archetype matching the query was created or mutated.
///
/// The dirty flag is shared with two notifier callbacks; they only ever set
/// it, and a rebuild clears it.
pub struct SubscribedView<Q: ComponentQuery> {
    metas: Vec<IterationMeta>,
    store_id: u64,
    dirty: Rc<Cell<bool>>,
    added_token: SubscriptionId,
    updated_token: SubscriptionId,
    _query: PhantomData<fn() -> Q>,
}

impl<Q: ComponentQuery> SubscribedView<Q> {
    pub fn new(store: &mut ArchetypeStore) -> Self {
        let requested = Q::signature();
        assert_eq!(
            requested.len(),
            Q::LEN,
            "a query must not name the same component twice"
        );
        let dirty = Rc::new(Cell::new(true));

        let flag = Rc::clone(&dirty);
        let added_token = store.subscribe_added(move |changed| {
            if changed.contains_all(&requested) {
                flag.set(true);
            }
        });
        let flag = Rc::clone(&dirty);
        let updated_token = store.subscribe_updated(move |changed| {
            if changed.contains_all(&requested) {
                flag.set(true);
            }
        });

        Self {
            metas: Vec::new(),
            store_id: store.id(),
            dirty,
            added_token,
            updated_token,
            _query: PhantomData,
        }
    }

    /// True when the next pass will rebuild the captured metadata.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn for_each(&mut self, store: &mut ArchetypeStore, mut f: impl FnMut(Q::Item<'_>)) {
        self.refresh(store);
        for meta in &self.metas {
            for row in 0..meta.rows {
                // SAFETY: metadata is fresh for the store borrowed
                // exclusively above, and row < meta.rows.
                f(unsafe { Q::item_at(&meta.ptrs, &meta.strides, row) });
            }
        }
    }

    pub fn iter<'a>(&'a mut self, store: &'a mut ArchetypeStore) -> ViewIter<'a, Q> {
        self.refresh(store);
        ViewIter {
            metas: &self.metas,
            chunk: 0,
            row: 0,
            _query: PhantomData,
        }
    }

    /// Drops the view's notifier subscriptions.
    pub fn detach(self, store: &mut ArchetypeStore) {
        self.check_store(store);
        store.unsubscribe_added(self.added_token);
        store.unsubscribe_updated(self.updated_token);
    }

    fn refresh(&mut self, store: &ArchetypeStore) {
        self.check_store(store);
        if self.dirty.replace(false) {
            self.metas = collect_metas::<Q>(store);
        }
    }

    // The dirty flag only tracks the store this view subscribed to, so
    // captured pointers must never be served against any other store.
    fn check_store(&self, store: &ArchetypeStore) {
        assert_eq!(
            store.id(),
            self.store_id,
            "view used with a store it is not subscribed to"
        );
    }
}
