use crate::{Client, Lock};

/// Holds an acquired [`Lock`] for the scope of this value.
///
/// Dropping a `LockGuard` spawns a best-effort, fire-and-forget release.
/// Callers who want to observe whether the release actually succeeded
/// should call [`LockGuard::release`] explicitly instead of letting the
/// guard drop.
#[derive(Debug)]
pub struct LockGuard {
    client: Client,
    lock: Option<Lock>,
}

impl LockGuard {
    pub(crate) fn new(client: Client, lock: Lock) -> Self {
        Self {
            client,
            lock: Some(lock),
        }
    }

    /// The held lock.
    pub fn lock(&self) -> &Lock {
        self.lock.as_ref().expect("lock only taken on drop/release")
    }

    /// Releases the lock now, returning whether the store confirmed it.
    /// Consumes the guard so [`Drop`] does not attempt a second release.
    pub async fn release(mut self, delete: Option<bool>) -> bool {
        let lock = self.lock.take().expect("lock only taken once");
        self.client.release(&lock, delete).await
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            let client = self.client.clone();
            tokio::spawn(async move {
                let _ = client.release(&lock, None).await;
            });
        }
    }
}
