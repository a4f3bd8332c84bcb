//! Session store with counter-triggered lazy expiry

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, trace};

use crate::config::StoreConfig;
use crate::error::SessionError;
use crate::id::{is_valid_session_id, IdGenerator, OsRandom, SessionId};
use crate::metrics::{StoreMetrics, StoreStats};
use crate::record::Session;
use crate::time::{Clock, SystemClock};

/// A mapping slot. Dropped sessions leave a tombstone behind so their id
/// stays reserved until the next sweep removes the key.
enum Slot {
    Live(Arc<Session>),
    Dropped,
}

/// Outcome of [`SessionStore::resolve`].
#[derive(Debug, Clone)]
pub struct Resolved {
    pub session: Arc<Session>,
    /// `true` when a new session was issued and its id must be handed to the client.
    pub created: bool,
}

pub struct SessionStore {
    sessions: DashMap<SessionId, Slot>,
    ids: IdGenerator,
    clock: Arc<dyn Clock>,
    cfg: StoreConfig,
    gc_counter: AtomicU64,
    metrics: StoreMetrics,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl SessionStore {
    pub fn new(cfg: StoreConfig) -> Self {
        Self::with_clock(cfg, Arc::new(SystemClock))
    }

    pub fn with_clock(cfg: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        let ids = IdGenerator::new(Box::new(OsRandom), cfg.max_id_attempts);
        Self::with_parts(cfg, clock, ids)
    }

    pub fn with_parts(cfg: StoreConfig, clock: Arc<dyn Clock>, ids: IdGenerator) -> Self {
        debug!(
            "Initializing session store: max_age={}s, sweep_interval={}, max_id_attempts={}",
            cfg.max_age_secs, cfg.sweep_interval, ids.max_attempts()
        );
        Self {
            sessions: DashMap::new(),
            ids,
            clock,
            cfg,
            gc_counter: AtomicU64::new(0),
            metrics: StoreMetrics::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.cfg
    }

    /// Look up a live session by a client-supplied id and touch it.
    ///
    /// Malformed ids fail with `InvalidIdentifier` before anything else
    /// happens. Every `sweep_interval`-th call (starting with the first)
    /// sweeps expired sessions first. Expiry is only enforced by the sweep,
    /// so an idle session that no sweep has reached yet is still returned.
    /// Unknown and dropped ids yield `Ok(None)`.
    pub fn select(&self, candidate: &str) -> Result<Option<Arc<Session>>, SessionError> {
        if !is_valid_session_id(candidate) {
            self.metrics.inc_invalid_id();
            return Err(SessionError::InvalidIdentifier(candidate.to_string()));
        }

        let calls = self.gc_counter.fetch_add(1, Ordering::Relaxed);
        if calls % self.cfg.sweep_interval.max(1) == 0 {
            self.sweep();
        }

        let found = match self.sessions.get(candidate).as_deref() {
            Some(Slot::Live(session)) => Some(session.clone()),
            Some(Slot::Dropped) | None => None,
        };

        match found {
            Some(session) => {
                session.touch(self.clock.now_ms());
                self.metrics.inc_hit();
                trace!("Session {} selected", candidate);
                Ok(Some(session))
            }
            None => {
                self.metrics.inc_miss();
                trace!("Session {} not found", candidate);
                Ok(None)
            }
        }
    }

    /// Issue a new session under a fresh, unused id.
    pub fn create(&self) -> Result<Arc<Session>, SessionError> {
        let now = self.clock.now_ms();
        let session = self.ids.claim_unique(|candidate| match self.sessions.entry(candidate) {
            Entry::Occupied(_) => {
                self.metrics.inc_collision();
                None
            }
            Entry::Vacant(slot) => {
                let session = Arc::new(Session::new(slot.key().clone(), now));
                slot.insert(Slot::Live(session.clone()));
                Some(session)
            }
        })?;

        self.metrics.inc_created();
        debug!("Session {} created", session.id());
        Ok(session)
    }

    /// Select the session named by `candidate`, or create one when there is
    /// none. A missing or empty candidate always creates.
    pub fn resolve(&self, candidate: Option<&str>) -> Result<Resolved, SessionError> {
        if let Some(candidate) = candidate.filter(|c| !c.is_empty()) {
            if let Some(session) = self.select(candidate)? {
                return Ok(Resolved { session, created: false });
            }
        }

        let session = self.create()?;
        Ok(Resolved { session, created: true })
    }

    pub fn drop_session(&self, session: &Session) {
        self.drop_id(session.id());
    }

    /// Invalidate a session immediately. Unknown or already dropped ids are ignored.
    pub fn drop_id(&self, id: &SessionId) {
        if let Some(mut slot) = self.sessions.get_mut(id) {
            if let Slot::Live(_) = *slot {
                *slot = Slot::Dropped;
                self.metrics.inc_dropped();
                debug!("Session {} dropped", id);
            }
        }
    }

    /// Remove tombstones and every session idle for `max_age` or longer.
    /// Returns the number of removed entries.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let max_age_ms = self.cfg.max_age_ms();

        let mut evicted = 0usize;
        self.sessions.retain(|_, slot| {
            let keep = match slot {
                Slot::Live(session) => !session.is_expired(now, max_age_ms),
                Slot::Dropped => false,
            };
            if !keep {
                evicted += 1;
            }
            keep
        });

        self.metrics.record_sweep(evicted as u64);
        if evicted > 0 {
            info!("Swept {} expired or dropped sessions", evicted);
        } else {
            trace!("Sweep found nothing to evict");
        }
        evicted
    }

    /// Whether `id` is currently present as a key, live or tombstoned.
    pub fn contains_key(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Number of keys in the mapping, tombstones included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|r| matches!(r.value(), Slot::Live(_)))
            .count()
    }

    pub fn stats(&self) -> StoreStats {
        self.metrics
            .snapshot(self.len() as u64, self.live_count() as u64)
    }
}
