//! Read-query cache keyed by resource, path and normalized parameters.
//!
//! Entries younger than the stale window are served from memory. Identical
//! misses running at the same time share one loader future. Mutations call
//! [`QueryCache::invalidate`] for their resource; a load that finishes after its
//! resource was invalidated is handed to its waiters but not stored.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::error::ApiResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub resource: String,
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl QueryKey {
    /// Drops empty parameter values and sorts by name, keeping the relative
    /// order of repeated names (`order_by`).
    pub fn new(
        resource: impl Into<String>,
        path: impl Into<String>,
        params: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let mut params: Vec<(String, String)> = params
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .collect();
        params.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            resource: resource.into(),
            path: path.into(),
            params,
        }
    }
}

type Load = Shared<BoxFuture<'static, ApiResult<Value>>>;

enum Slot {
    Ready { value: Value, fetched_at: Instant },
    Pending { generation: u64, load: Load },
}

pub struct QueryCache {
    slots: Mutex<HashMap<QueryKey, Slot>>,
    stale_time: Duration,
    generation: AtomicU64,
}

impl QueryCache {
    pub fn new(stale_time: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            stale_time,
            generation: AtomicU64::new(0),
        }
    }

    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    /// Cached value for `key`, or the result of `loader` (shared with any
    /// concurrent caller asking for the same key).
    pub async fn fetch<F, Fut>(&self, key: QueryKey, loader: F) -> ApiResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<Value>> + Send + 'static,
    {
        let (generation, load) = {
            let mut slots = self.lock();
            match slots.get(&key) {
                Some(Slot::Ready { value, fetched_at }) if fetched_at.elapsed() < self.stale_time => {
                    debug!(path = %key.path, "query cache hit");
                    return Ok(value.clone());
                }
                Some(Slot::Pending { generation, load }) => (*generation, load.clone()),
                _ => {
                    debug!(path = %key.path, "query cache miss");
                    self.prune(&mut slots);
                    let generation = self.generation.fetch_add(1, Ordering::SeqCst);
                    let load = loader().boxed().shared();
                    slots.insert(
                        key.clone(),
                        Slot::Pending {
                            generation,
                            load: load.clone(),
                        },
                    );
                    (generation, load)
                }
            }
        };

        let outcome = load.await;

        let mut slots = self.lock();
        let still_pending = matches!(
            slots.get(&key),
            Some(Slot::Pending { generation: pending, .. }) if *pending == generation
        );
        if still_pending {
            match &outcome {
                Ok(value) => {
                    slots.insert(
                        key,
                        Slot::Ready {
                            value: value.clone(),
                            fetched_at: Instant::now(),
                        },
                    );
                }
                Err(_) => {
                    slots.remove(&key);
                }
            }
        }
        outcome
    }

    /// Like [`fetch`](Self::fetch) but decodes into `T`.
    pub async fn fetch_as<T, F, Fut>(&self, key: QueryKey, loader: F) -> ApiResult<T>
    where
        T: DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<Value>> + Send + 'static,
    {
        let value = self.fetch(key, loader).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Forgets every entry of `resource`, pending loads included.
    pub fn invalidate(&self, resource: &str) {
        let mut slots = self.lock();
        let before = slots.len();
        slots.retain(|key, _| key.resource != resource);
        debug!(resource, dropped = before - slots.len(), "query cache invalidated");
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops stale entries so keys that are never asked for again do not pile up.
    fn prune(&self, slots: &mut HashMap<QueryKey, Slot>) {
        let stale_time = self.stale_time;
        slots.retain(|_, slot| {
            !matches!(slot, Slot::Ready { fetched_at, .. } if fetched_at.elapsed() >= stale_time)
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<QueryKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
