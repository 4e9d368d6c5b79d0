use std::sync::{Arc, Mutex};

use tracing::instrument;

use crate::cache::LockCache;
use crate::error::GatewayError;
use crate::gateway::KvGateway;
use crate::policy::{millis, Policy};
use crate::record::Lock;
use crate::schema::{LogicalRecord, Schema};
use crate::value::Attributes;
use crate::worker::Worker;
use crate::{ClientBuilder, LockGuard};

/// The protocol engine: acquire / release / touch against a [`KvGateway`],
/// plus the local cache of leases this client instance believes it owns.
///
/// Cloning a `Client` is cheap: every field is an `Arc` (or cheaply-clonable
/// handle) over shared state, so a background task can hold one without
/// borrowing.
#[derive(Debug, Clone)]
pub struct Client {
    pub(crate) gateway: Arc<dyn KvGateway>,
    pub(crate) schema: Arc<Schema>,
    pub(crate) policy: Arc<dyn Policy>,
    pub(crate) owner: Arc<String>,
    pub(crate) cache: LockCache,
    pub(crate) worker: Arc<Mutex<Option<Worker>>>,
}

impl Client {
    /// Returns a new [`ClientBuilder`].
    pub fn builder() -> ClientBuilder {
        <_>::default()
    }

    /// Starts the background heartbeat worker. Idempotent: calling it again
    /// while already running is a no-op.
    pub fn startup(&self) {
        let mut guard = self.worker.lock().unwrap();
        if guard.is_none() {
            *guard = Some(Worker::spawn(self.clone(), self.policy.heartbeat_period()));
        }
    }

    /// Stops the background heartbeat worker and releases every lock still
    /// in the cache, using the policy default delete mode.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let worker = self.worker.lock().unwrap().take();
        if let Some(worker) = worker {
            worker.stop(self.policy.retry_period()).await;
        }
        self.release_all(None).await;
    }

    /// Attempts to acquire `name` without waiting: a single iteration of
    /// [`Client::acquire`].
    #[instrument(skip(self, payload))]
    pub async fn try_acquire(
        &self,
        name: impl Into<String>,
        payload: Option<Vec<u8>>,
    ) -> Option<Lock> {
        self.acquire_inner(name.into(), true, payload).await
    }

    /// Acquires `name`, waiting for any existing holder to release or expire
    /// up to `policy.acquire_timeout()` (extended once by an observed
    /// foreign lease's own duration).
    #[instrument(skip(self, payload))]
    pub async fn acquire(&self, name: impl Into<String>, payload: Option<Vec<u8>>) -> Option<Lock> {
        self.acquire_inner(name.into(), false, payload).await
    }

    /// Like [`Client::acquire`], but wraps the result in a [`LockGuard`] that
    /// releases automatically when dropped.
    pub async fn acquire_guarded(
        &self,
        name: impl Into<String>,
        payload: Option<Vec<u8>>,
    ) -> Option<LockGuard> {
        let lock = self.acquire(name, payload).await?;
        Some(LockGuard::new(self.clone(), lock))
    }

    async fn acquire_inner(&self, name: String, no_wait: bool, payload: Option<Vec<u8>>) -> Option<Lock> {
        if !self.policy.is_name_valid(&name) {
            return None;
        }

        let mut deadline_ms = self.policy.now_ms() + millis(self.policy.acquire_timeout());
        let mut watching: Option<Lock> = None;

        loop {
            if self.policy.now_ms() > deadline_ms {
                return None;
            }

            if let Some(created) = self
                .attempt_once(&name, payload.as_deref(), &mut watching, &mut deadline_ms)
                .await
            {
                self.cache.insert(created.clone());
                return Some(created);
            }

            if no_wait {
                return None;
            }
            tokio::time::sleep(self.policy.retry_period()).await;
        }
    }

    /// One iteration of the acquire retry loop: issues a single `get` and
    /// branches on the five exhaustive cases described in the component
    /// design (no record / stale tombstone / expected takeover / first
    /// sight of a foreign lock / observed rollover).
    async fn attempt_once(
        &self,
        name: &str,
        payload: Option<&[u8]>,
        watching: &mut Option<Lock>,
        deadline_ms: &mut i64,
    ) -> Option<Lock> {
        match self.gateway.get(name).await {
            Err(GatewayError::NotFound(_)) => self.create_new(name, payload).await,
            Err(_) => None, // precondition/transport on a plain read: lost attempt, retry
            Ok(attrs) => {
                let now = self.policy.now_ms();
                let current = self.lock_from_attrs(&attrs, now);

                if !current.is_locked {
                    self.overwrite_tombstone(&current, payload).await
                } else if watching
                    .as_ref()
                    .is_some_and(|w| w.expired(self.policy.now_ms()) && w.version() == current.version())
                {
                    self.take_over(&current, payload).await
                } else if watching.is_none() {
                    *deadline_ms += current.duration_ms;
                    *watching = Some(current);
                    None
                } else if watching.as_ref().is_some_and(|w| w.version() != current.version()) {
                    *watching = Some(current);
                    None
                } else {
                    None // still watching the same live, unexpired lock
                }
            }
        }
    }

    fn new_lock(&self, name: &str, version: String, now_ms: i64, payload: Option<&[u8]>) -> Lock {
        Lock {
            name: name.to_owned(),
            owner: (*self.owner).clone(),
            version: Some(version),
            duration_ms: millis(self.policy.lock_duration()),
            timestamp_ms: now_ms,
            is_locked: true,
            payload: payload.map(<[u8]>::to_vec),
        }
    }

    /// Case 1: no record exists yet.
    async fn create_new(&self, name: &str, payload: Option<&[u8]>) -> Option<Lock> {
        let version = self.policy.new_version();
        let now = self.policy.now_ms();
        let lock = self.new_lock(name, version, now, payload);

        let attrs = self.schema.to_attributes(&LogicalRecord {
            name: Some(name.to_owned()),
            duration_ms: Some(lock.duration_ms),
            is_locked: Some(true),
            owner: Some(lock.owner.clone()),
            version: lock.version.clone(),
            payload: payload.map(<[u8]>::to_vec),
        });

        self.gateway.put_if_absent(attrs).await.ok().map(|()| lock)
    }

    /// Case 2: record exists but was voluntarily released (`is_locked =
    /// false`). Eligible for immediate reuse by any contender.
    async fn overwrite_tombstone(&self, current: &Lock, payload: Option<&[u8]>) -> Option<Lock> {
        let version = self.policy.new_version();
        let now = self.policy.now_ms();
        let lock = self.new_lock(&current.name, version, now, payload);

        let updates = self.schema.to_attributes(&LogicalRecord {
            is_locked: Some(true),
            owner: Some(lock.owner.clone()),
            version: lock.version.clone(),
            duration_ms: Some(lock.duration_ms),
            payload: payload.map(<[u8]>::to_vec),
            ..Default::default()
        });
        let expected = self.schema.to_attributes(&LogicalRecord {
            name: Some(current.name.clone()),
            is_locked: Some(false),
            version: current.version().map(str::to_owned),
            ..Default::default()
        });

        self.gateway
            .update_if(&current.name, updates, expected)
            .await
            .ok()
            .map(|()| lock)
    }

    /// Case 3: the foreign lease has elapsed from this client's viewpoint
    /// and has not been refreshed since we started watching it.
    async fn take_over(&self, current: &Lock, payload: Option<&[u8]>) -> Option<Lock> {
        let version = self.policy.new_version();
        let now = self.policy.now_ms();
        let lock = self.new_lock(&current.name, version, now, payload);

        let updates = self.schema.to_attributes(&LogicalRecord {
            is_locked: Some(true),
            owner: Some(lock.owner.clone()),
            version: lock.version.clone(),
            duration_ms: Some(lock.duration_ms),
            payload: payload.map(<[u8]>::to_vec),
            ..Default::default()
        });
        let expected = self.schema.to_attributes(&LogicalRecord {
            name: Some(current.name.clone()),
            version: current.version().map(str::to_owned),
            ..Default::default()
        });

        self.gateway
            .update_if(&current.name, updates, expected)
            .await
            .ok()
            .map(|()| lock)
    }

    /// Releases `lock`, deleting the record if `delete` (or the policy
    /// default, if `None`) is `true`, otherwise leaving a tombstone.
    ///
    /// Returns `false` without contacting the store if this client no
    /// longer considers `lock` valid (wrong owner, already unlocked,
    /// invalid name, or locally expired).
    #[instrument(skip(self, lock))]
    pub async fn release(&self, lock: &Lock, delete: Option<bool>) -> bool {
        if !self.is_valid_locally(lock) {
            return false;
        }
        let Some(version) = lock.version() else {
            return false;
        };
        let delete = delete.unwrap_or_else(|| self.policy.delete_lock());

        let result = if delete {
            let expected = self.schema.to_attributes(&LogicalRecord {
                name: Some(lock.name.clone()),
                version: Some(version.to_owned()),
                ..Default::default()
            });
            self.gateway.delete_if(&lock.name, expected).await
        } else {
            let updates = self.schema.to_attributes(&LogicalRecord {
                is_locked: Some(false),
                version: Some(self.policy.new_version()),
                ..Default::default()
            });
            let expected = self.schema.to_attributes(&LogicalRecord {
                name: Some(lock.name.clone()),
                version: Some(version.to_owned()),
                owner: Some(lock.owner.clone()),
                ..Default::default()
            });
            self.gateway.update_if(&lock.name, updates, expected).await
        };

        match result {
            Ok(()) => {
                self.cache.remove(&lock.name);
                true
            }
            Err(_) => false,
        }
    }

    /// Releases every lock currently in the cache. Does not short-circuit:
    /// every entry is attempted even if an earlier one fails.
    #[instrument(skip(self))]
    pub async fn release_all(&self, delete: Option<bool>) -> bool {
        let mut all_released = true;
        for lock in self.cache.snapshot() {
            let released = self.release(&lock, delete).await;
            all_released = all_released && released;
        }
        all_released
    }

    /// Refreshes `lock`'s lease. Used by the heartbeat worker; returns
    /// `None` if this client no longer owns the lock or the conditional
    /// update lost its race, in which case the caller is responsible for
    /// evicting it from the cache.
    pub(crate) async fn touch(&self, lock: &Lock) -> Option<Lock> {
        if !self.is_valid_locally(lock) {
            return None;
        }
        let version = lock.version()?;
        let new_version = self.policy.new_version();
        let now = self.policy.now_ms();

        let updates = self.schema.to_attributes(&LogicalRecord {
            version: Some(new_version.clone()),
            duration_ms: Some(lock.duration_ms),
            ..Default::default()
        });
        let expected = self.schema.to_attributes(&LogicalRecord {
            name: Some(lock.name.clone()),
            version: Some(version.to_owned()),
            owner: Some(lock.owner.clone()),
            ..Default::default()
        });

        match self.gateway.update_if(&lock.name, updates, expected).await {
            Ok(()) => {
                let refreshed = Lock {
                    name: lock.name.clone(),
                    owner: lock.owner.clone(),
                    version: Some(new_version),
                    duration_ms: lock.duration_ms,
                    timestamp_ms: now,
                    is_locked: true,
                    payload: lock.payload.clone(),
                };
                self.cache.insert(refreshed.clone());
                Some(refreshed)
            }
            Err(_) => None,
        }
    }

    /// A view-only snapshot of `name`, with the version stripped so callers
    /// cannot round-trip it into a conditional write. `None` if no record
    /// exists, or the live record has been voluntarily released.
    ///
    /// Note the exact semantics: a lock owned by *another* client is still
    /// reported (with `is_locked = true`, a different `owner`). Only a
    /// tombstone or missing record reads as `None`.
    #[instrument(skip(self))]
    pub async fn retrieve(&self, name: &str) -> Option<Lock> {
        if !self.policy.is_name_valid(name) {
            return None;
        }

        let current = match self.cache.get(name) {
            Some(cached) => cached,
            None => {
                let now = self.policy.now_ms();
                let attrs = self.gateway.get(name).await.ok()?;
                self.lock_from_attrs(&attrs, now)
            }
        };

        if !current.is_locked {
            return None;
        }
        Some(current.stripped())
    }

    /// `true` iff [`Client::retrieve`] returns `Some`.
    pub async fn exists(&self, name: &str) -> bool {
        self.retrieve(name).await.is_some()
    }

    fn lock_from_attrs(&self, attrs: &Attributes, now_ms: i64) -> Lock {
        let logical = self.schema.to_logical(attrs);
        Lock {
            name: logical.name.unwrap_or_default(),
            owner: logical.owner.unwrap_or_default(),
            version: logical.version,
            duration_ms: logical.duration_ms.unwrap_or_default(),
            timestamp_ms: now_ms,
            is_locked: logical.is_locked.unwrap_or(false),
            payload: logical.payload,
        }
    }

    fn is_valid_locally(&self, lock: &Lock) -> bool {
        self.policy.is_name_valid(&lock.name)
            && lock.is_locked
            && lock.owner == *self.owner
            && !lock.expired(self.policy.now_ms())
    }
}
