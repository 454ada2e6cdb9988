//! Synchronous archetype change notifications.

use crate::signature::Signature;

/// Token identifying one subscription, returned by `subscribe_*` and spent
/// by `unsubscribe_*`.
pub type SubscriptionId = u64;

type Callback = Box<dyn FnMut(&Signature)>;

/// Ordered callback lists for archetype creation and mutation events.
///
/// Dispatch is synchronous and follows registration order. Callbacks receive
/// the signature of the affected archetype.
#[derive(Default)]
pub struct ChangeNotifier {
    added: Vec<(SubscriptionId, Callback)>,
    updated: Vec<(SubscriptionId, Callback)>,
    next_id: SubscriptionId,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires when a new archetype is created.
    pub fn subscribe_added(&mut self, callback: impl FnMut(&Signature) + 'static) -> SubscriptionId {
        let id = self.next_token();
        self.added.push((id, Box::new(callback)));
        id
    }

    /// Fires when entities are stored into, migrated between, or removed
    /// from an archetype.
    pub fn subscribe_updated(
        &mut self,
        callback: impl FnMut(&Signature) + 'static,
    ) -> SubscriptionId {
        let id = self.next_token();
        self.updated.push((id, Box::new(callback)));
        id
    }

    /// Returns false when the token was never issued or already spent.
    pub fn unsubscribe_added(&mut self, id: SubscriptionId) -> bool {
        let before = self.added.len();
        self.added.retain(|(token, _)| *token != id);
        self.added.len() != before
    }

    pub fn unsubscribe_updated(&mut self, id: SubscriptionId) -> bool {
        let before = self.updated.len();
        self.updated.retain(|(token, _)| *token != id);
        self.updated.len() != before
    }

    pub(crate) fn notify_added(&mut self, signature: &Signature) {
        for (_, callback) in &mut self.added {
            callback(signature);
        }
    }

    pub(crate) fn notify_updated(&mut self, signature: &Signature) {
        for (_, callback) in &mut self.updated {
            callback(signature);
        }
    }

    fn next_token(&mut self) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
