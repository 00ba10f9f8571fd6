use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::control::MemberProfile;

/// Validate a member id. Ids must be 1-64 chars, alphanumeric/hyphens.
pub fn validate_member_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("member id must not be empty".into());
    }
    if id.len() > 64 {
        return Err(format!("member id too long ({} chars, max 64)", id.len()));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(format!("member id contains invalid characters: {id}"));
    }
    Ok(())
}

/// Member lifecycle events.
#[derive(Debug, Clone)]
pub enum MemberEvent {
    Created { id: String },
    Updated { id: String },
    Removed { id: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("member id already exists: {0}")]
    IdExists(String),
    #[error("member not found: {0}")]
    NotFound(String),
    #[error("invalid member id: {0}")]
    InvalidId(String),
    #[error("member name must not be empty")]
    EmptyName,
}

/// In-memory member registry: id -> capability profile.
///
/// This is the "provided registry" the control core reads from; durable
/// persistence stays outside the crate. Profile updates replace the whole
/// flag set under the write lock, so readers never observe a half-applied
/// update.
#[derive(Clone)]
pub struct MemberRegistry {
    inner: Arc<RwLock<HashMap<String, MemberProfile>>>,
    events_tx: broadcast::Sender<MemberEvent>,
}

impl Default for MemberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemberRegistry {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            events_tx,
        }
    }

    /// Provision a member. With `id = None` a fresh UUID is assigned;
    /// explicit ids must be valid and unused.
    pub fn create(
        &self,
        id: Option<String>,
        profile: MemberProfile,
    ) -> Result<String, RegistryError> {
        if profile.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let mut inner = self.inner.write();
        let assigned = match id {
            Some(id) => {
                validate_member_id(&id).map_err(RegistryError::InvalidId)?;
                if inner.contains_key(&id) {
                    return Err(RegistryError::IdExists(id));
                }
                id
            }
            None => uuid::Uuid::new_v4().to_string(),
        };

        inner.insert(assigned.clone(), profile);
        drop(inner);

        // Ignore error if there are no receivers.
        let _ = self.events_tx.send(MemberEvent::Created {
            id: assigned.clone(),
        });
        Ok(assigned)
    }

    /// Look up a member's profile.
    pub fn get(&self, id: &str) -> Option<MemberProfile> {
        self.inner.read().get(id).cloned()
    }

    /// Snapshot all members.
    pub fn list(&self) -> Vec<(String, MemberProfile)> {
        self.inner
            .read()
            .iter()
            .map(|(id, profile)| (id.clone(), profile.clone()))
            .collect()
    }

    /// Replace a member's profile wholesale.
    pub fn update(&self, id: &str, profile: MemberProfile) -> Result<(), RegistryError> {
        if profile.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let mut inner = self.inner.write();
        match inner.get_mut(id) {
            Some(existing) => {
                *existing = profile;
            }
            None => return Err(RegistryError::NotFound(id.to_string())),
        }
        drop(inner);

        let _ = self
            .events_tx
            .send(MemberEvent::Updated { id: id.to_string() });
        Ok(())
    }

    /// Remove a member, returning the removed profile if it existed.
    pub fn remove(&self, id: &str) -> Option<MemberProfile> {
        let removed = self.inner.write().remove(id);
        if removed.is_some() {
            let _ = self
                .events_tx
                .send(MemberEvent::Removed { id: id.to_string() });
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to member lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<MemberEvent> {
        self.events_tx.subscribe()
    }
}
