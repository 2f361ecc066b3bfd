//! Public graphs
//!
//! A graph is public when no policy targets it. Enumerating the data store's
//! graphs on every request is wasteful, so the set is cached and recomputed
//! once its TTL has elapsed. Within the TTL a stale set may be served.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::policy::PolicyTable;
use crate::store::SparqlBackend;

/// Named graphs of `data` that no policy targets
pub fn compute_public_graphs(data: &dyn SparqlBackend, policies: &PolicyTable) -> Result<BTreeSet<String>> {
    let protected: BTreeSet<&String> = policies.values().flat_map(|p| p.graphs.iter()).collect();

    let public: BTreeSet<String> = data
        .named_graphs()?
        .into_iter()
        .filter(|g| !protected.contains(g))
        .collect();

    debug!(
        store = %data.label(),
        protected = protected.len(),
        public = public.len(),
        "public graphs computed"
    );

    Ok(public)
}

struct CacheEntry {
    graphs: BTreeSet<String>,
    computed_at: Instant,
    refreshed: DateTime<Utc>,
}

/// TTL cache for the public graph set
pub struct PublicGraphCache {
    ttl: Duration,
    entry: Mutex<Option<CacheEntry>>,
}

impl PublicGraphCache {
    pub fn new(ttl: Duration) -> Self {
        PublicGraphCache {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached set, recomputed with `compute` when missing or expired
    ///
    /// A failed recomputation yields an empty set and is not cached.
    pub fn get_or_refresh<F>(&self, compute: F) -> BTreeSet<String>
    where
        F: FnOnce() -> Result<BTreeSet<String>>,
    {
        self.get_or_refresh_at(Instant::now(), compute)
    }

    pub fn get_or_refresh_at<F>(&self, now: Instant, compute: F) -> BTreeSet<String>
    where
        F: FnOnce() -> Result<BTreeSet<String>>,
    {
        self.try_get_or_refresh_at(now, compute).unwrap_or_else(|e| {
            warn!(error = %e, "public graph enumeration failed; treating no graph as public");
            BTreeSet::new()
        })
    }

    /// Like [`get_or_refresh_at`](Self::get_or_refresh_at) but reports failures
    pub fn try_get_or_refresh_at<F>(&self, now: Instant, compute: F) -> Result<BTreeSet<String>>
    where
        F: FnOnce() -> Result<BTreeSet<String>>,
    {
        // The lock is held while computing so concurrent callers wait for one refresh
        let mut entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(cached) = entry.as_ref() {
            if now.saturating_duration_since(cached.computed_at) < self.ttl {
                return Ok(cached.graphs.clone());
            }
        }

        let graphs = compute()?;
        debug!(graphs = graphs.len(), ttl_secs = self.ttl.as_secs(), "public graph cache refreshed");

        *entry = Some(CacheEntry {
            graphs: graphs.clone(),
            computed_at: now,
            refreshed: Utc::now(),
        });

        Ok(graphs)
    }

    /// Drop the cached set so the next lookup recomputes it
    pub fn invalidate(&self) {
        let mut entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        if entry.take().is_some() {
            debug!("public graph cache invalidated");
        }
    }

    /// Wall-clock time of the last refresh
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.entry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|e| e.refreshed)
    }
}
