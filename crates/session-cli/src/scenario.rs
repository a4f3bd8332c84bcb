use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, ensure, Result};
use serde::Serialize;
use serde_json::Value;
use session_store::{Session, SessionStore, SessionUser, StoreStats};
use tracing::info;

#[derive(Debug, Serialize)]
pub struct DemoReport {
    pub session_id: String,
    pub counter: i64,
    pub user: Option<String>,
    pub touched_advanced: bool,
    pub unknown_id_found: bool,
    pub found_after_drop: bool,
    pub stats: StoreStats,
}

#[derive(Debug, Serialize)]
pub struct LoadReport {
    pub sessions: usize,
    pub workers: usize,
    pub unique_ids: usize,
    pub elapsed_ms: u128,
    pub stats: StoreStats,
}

fn increment(session: &Session, key: &str) -> i64 {
    session.update_data(|data| {
        let next = data.get(key).and_then(Value::as_i64).unwrap_or(0) + 1;
        data.insert(key, next);
        next
    })
}

pub async fn run_demo(store: &SessionStore) -> Result<DemoReport> {
    let session = store.create()?;
    let id = session.id().to_string();
    info!("Created session {}", id);

    increment(&session, "counter");
    increment(&session, "counter");
    session.set_user(SessionUser::new("demo-user", "Demo User", vec!["viewer".into()]))?;
    let touched = session.touched();

    tokio::time::sleep(Duration::from_millis(5)).await;
    let again = store
        .select(&id)?
        .ok_or_else(|| anyhow!("session {} vanished", id))?;
    let counter = again
        .data_get("counter")
        .and_then(|v| v.as_i64())
        .unwrap_or_default();

    let unknown_id_found = store.select("NeverIssued00000")?.is_some();

    store.drop_session(&again);
    let found_after_drop = store.select(&id)?.is_some();

    Ok(DemoReport {
        session_id: id,
        counter,
        user: again.user().map(|u| u.name.clone()),
        touched_advanced: again.touched() > touched,
        unknown_id_found,
        found_after_drop,
        stats: store.stats(),
    })
}

pub async fn run_load(store: Arc<SessionStore>, sessions: usize, workers: usize) -> Result<LoadReport> {
    ensure!(workers > 0, "need at least one worker");
    let per_worker = sessions.div_ceil(workers);
    info!("Running load: {} sessions across {} workers", sessions, workers);

    let started = Instant::now();
    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let store = store.clone();
        let count = per_worker.min(sessions.saturating_sub(worker * per_worker));
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::with_capacity(count);
            for n in 0..count {
                let session = store.create()?;
                increment(&session, "hits");
                store.select(session.id().as_str())?;
                if n % 10 == 9 {
                    store.drop_session(&session);
                }
                ids.push(session.id().clone());
            }
            Ok::<_, session_store::SessionError>(ids)
        }));
    }

    let mut unique = HashSet::with_capacity(sessions);
    for handle in handles {
        for id in handle.await?? {
            ensure!(unique.insert(id.clone()), "duplicate session id issued: {}", id);
        }
    }

    Ok(LoadReport {
        sessions,
        workers,
        unique_ids: unique.len(),
        elapsed_ms: started.elapsed().as_millis(),
        stats: store.stats(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_store::StoreConfig;

    #[tokio::test]
    async fn test_demo_report() {
        let store = SessionStore::new(StoreConfig::default());
        let report = run_demo(&store).await.unwrap();
        assert_eq!(report.counter, 2);
        assert_eq!(report.user.as_deref(), Some("Demo User"));
        assert!(report.touched_advanced);
        assert!(!report.unknown_id_found);
        assert!(!report.found_after_drop);
        assert_eq!(report.stats.created_total, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_load_report() {
        let store = Arc::new(SessionStore::new(StoreConfig::default()));
        let report = run_load(store, 1_000, 3).await.unwrap();
        assert_eq!(report.unique_ids, 1_000);
        assert_eq!(report.stats.created_total, 1_000);
        assert_eq!(report.stats.hits_total, 1_000);
    }

    #[tokio::test]
    async fn test_load_requires_workers() {
        let store = Arc::new(SessionStore::default());
        assert!(run_load(store, 10, 0).await.is_err());
    }
}
