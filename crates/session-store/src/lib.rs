//! # Session Store
//!
//! In-process server-side session store: opaque identifiers, per-client
//! state, lazy expiry and collision-free id issuance.

pub mod config;
pub mod error;
pub mod id;
pub mod metrics;
pub mod record;
pub mod store;
pub mod time;

pub use crate::config::StoreConfig;
pub use crate::error::{RandomSourceError, SessionError};
pub use crate::id::{is_valid_session_id, IdGenerator, OsRandom, RandomSource, SessionId};
pub use crate::metrics::{StoreMetrics, StoreStats};
pub use crate::record::{DataBagMut, Session, SessionUser};
pub use crate::store::{Resolved, SessionStore};
pub use crate::time::{Clock, ManualClock, SystemClock};
