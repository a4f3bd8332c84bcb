//! Session record

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SessionError;
use crate::id::SessionId;

/// Authenticated user a session is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub uuid: String,
    pub name: String,
    pub roles: Vec<String>,
}

impl SessionUser {
    pub fn new(uuid: impl Into<String>, name: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            roles,
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.uuid.is_empty() {
            return Err(SessionError::InvalidUser("missing uuid".into()));
        }
        if self.name.is_empty() {
            return Err(SessionError::InvalidUser("missing name".into()));
        }
        Ok(())
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Mutable view on a session's data bag.
///
/// Entries can be added, changed and removed, but the bag itself is never
/// swapped out.
pub struct DataBagMut<'a> {
    entries: &'a mut Map<String, Value>,
}

impl DataBagMut<'_> {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    user: Mutex<Option<Arc<SessionUser>>>,
    data: RwLock<Map<String, Value>>,
    touched_ms: AtomicU64,
}

impl Session {
    pub(crate) fn new(id: SessionId, now_ms: u64) -> Self {
        Self {
            id,
            user: Mutex::new(None),
            data: RwLock::new(Map::new()),
            touched_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn user(&self) -> Option<Arc<SessionUser>> {
        self.user.lock().clone()
    }

    /// Bind a user to this session.
    ///
    /// Once set, the user can't be replaced. Re-assigning a descriptor with
    /// the same `uuid` is accepted and leaves the stored one untouched.
    pub fn set_user(&self, user: SessionUser) -> Result<Arc<SessionUser>, SessionError> {
        user.validate()?;

        let mut slot = self.user.lock();
        if let Some(existing) = slot.as_ref() {
            if existing.uuid == user.uuid {
                return Ok(existing.clone());
            }
            return Err(SessionError::UserConflict {
                existing: existing.uuid.clone(),
                attempted: user.uuid,
            });
        }

        let user = Arc::new(user);
        *slot = Some(user.clone());
        Ok(user)
    }

    pub fn touched(&self) -> u64 {
        self.touched_ms.load(Ordering::Acquire)
    }

    pub fn touched_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.touched() as i64)
            .single()
            .unwrap_or_default()
    }

    /// Move `touched` forward to `now_ms`. Never moves it backwards.
    pub(crate) fn touch(&self, now_ms: u64) -> u64 {
        self.touched_ms.fetch_max(now_ms, Ordering::AcqRel).max(now_ms)
    }

    pub(crate) fn is_expired(&self, now_ms: u64, max_age_ms: u64) -> bool {
        now_ms.saturating_sub(self.touched()) >= max_age_ms
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, touched_ms: u64) {
        self.touched_ms.store(touched_ms, Ordering::Release);
    }

    // Data bag

    pub fn data_get(&self, key: &str) -> Option<Value> {
        self.data.read().get(key).cloned()
    }

    /// Store `value` under `key`, returning the previous value.
    pub fn data_set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.data.write().insert(key.into(), value.into())
    }

    pub fn data_remove(&self, key: &str) -> Option<Value> {
        self.data.write().remove(key)
    }

    pub fn data_contains(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    pub fn data_len(&self) -> usize {
        self.data.read().len()
    }

    pub fn with_data<R>(&self, f: impl FnOnce(&Map<String, Value>) -> R) -> R {
        f(&*self.data.read())
    }

    /// Read-modify-write on the data bag under a single write lock.
    pub fn update_data<R>(&self, f: impl FnOnce(&mut DataBagMut<'_>) -> R) -> R {
        let mut entries = self.data.write();
        f(&mut DataBagMut { entries: &mut *entries })
    }

    pub fn data_snapshot(&self) -> Map<String, Value> {
        self.data.read().clone()
    }
}
