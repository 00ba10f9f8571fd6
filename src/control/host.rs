use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;

/// Room-wide reference to the member currently holding exclusive control.
///
/// At most one occupant at any time, enforced by this being a single slot
/// rather than a flag on each member record. The room's control-transfer
/// operations are the only writers; authorization checks are the readers.
/// Changes are mirrored onto a watch channel so adapters can push host
/// updates to connected clients.
#[derive(Clone)]
pub struct HostSlot {
    inner: Arc<RwLock<Option<String>>>,
    tx: Arc<watch::Sender<Option<String>>>,
}

impl HostSlot {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(RwLock::new(None)),
            tx: Arc::new(tx),
        }
    }

    /// Seat a member as host, replacing any previous occupant.
    pub fn set(&self, member_id: impl Into<String>) {
        let id = member_id.into();
        *self.inner.write() = Some(id.clone());
        self.tx.send_replace(Some(id));
    }

    /// Seat a member if the slot is vacant or already theirs. With `force`
    /// the current occupant is displaced. The check and the seat happen
    /// under one write lock, so two racing claims cannot both win.
    ///
    /// On refusal, returns the id of the sitting host.
    pub fn try_claim(&self, member_id: &str, force: bool) -> Result<(), String> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.as_deref() {
            if existing != member_id && !force {
                return Err(existing.to_string());
            }
        }
        *inner = Some(member_id.to_string());
        drop(inner);
        self.tx.send_replace(Some(member_id.to_string()));
        Ok(())
    }

    /// Vacate the slot.
    pub fn clear(&self) {
        *self.inner.write() = None;
        self.tx.send_replace(None);
    }

    /// Vacate the slot only if the given member holds it. Used when a member
    /// is removed or disconnects.
    pub fn clear_if(&self, member_id: &str) {
        let mut inner = self.inner.write();
        if inner.as_deref() == Some(member_id) {
            *inner = None;
            drop(inner);
            self.tx.send_replace(None);
        }
    }

    /// The current host's id, if any.
    pub fn current(&self) -> Option<String> {
        self.inner.read().clone()
    }

    pub fn is_host(&self, member_id: &str) -> bool {
        self.inner.read().as_deref() == Some(member_id)
    }

    pub fn has_host(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Subscribe to host changes. The receiver yields the occupant after
    /// each transfer or release.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

impl Default for HostSlot {
    fn default() -> Self {
        Self::new()
    }
}
