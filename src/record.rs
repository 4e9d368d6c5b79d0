/// An immutable snapshot of a lock's state at a point in time.
///
/// `Lock`s returned from [`crate::Client::acquire`], [`crate::Client::touch`]
/// and friends are values: nothing about them can be mutated in place, so
/// handing a clone to the heartbeat worker's cache snapshot (or to user code)
/// never needs defensive copying of individual fields.
///
/// `timestamp_ms` is never persisted to the backing store; it is stamped by
/// whichever client last read or wrote the record, using that client's own
/// clock, and is used only to compute this client's view of lease expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    pub(crate) name: String,
    pub(crate) owner: String,
    /// `None` only for the stripped snapshots returned by
    /// [`crate::Client::retrieve`] (see its docs for why).
    pub(crate) version: Option<String>,
    pub(crate) duration_ms: i64,
    pub(crate) timestamp_ms: i64,
    pub(crate) is_locked: bool,
    pub(crate) payload: Option<Vec<u8>>,
}

impl Lock {
    /// The name this lock was acquired under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owner id that currently holds (or last held) this lock.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Lease length in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    /// Whether the record is currently held (`false` means a tombstone left
    /// behind by a non-deleting release).
    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    /// The opaque payload published alongside the lock, if any.
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// `true` once `now_ms` has passed this client's view of the lease
    /// expiry (`timestamp_ms + duration_ms`). Purely local: no two clients
    /// are guaranteed to agree on this without synchronized clocks.
    pub(crate) fn expired(&self, now_ms: i64) -> bool {
        now_ms > self.timestamp_ms + self.duration_ms
    }

    /// The version this client observed it at. Only present on records
    /// obtained via acquire/touch for a lock owned by this client; never on
    /// a [`crate::Client::retrieve`] snapshot.
    pub(crate) fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Returns a copy with the version stripped, for handing out via the
    /// read-only `retrieve` API so callers cannot round-trip it into a
    /// conditional write on a lock they do not own.
    pub(crate) fn stripped(mut self) -> Self {
        self.version = None;
        self
    }
}
