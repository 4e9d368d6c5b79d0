use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::Client;

/// The single background task that keeps every lock this client holds
/// alive, renewing them on a fixed cadence rather than spawning one task
/// per lease.
///
/// Each cycle snapshots the cache, calls [`Client::touch`] on every entry,
/// and evicts whatever failed to renew, then sleeps out the remainder of
/// the period before looping. The stop signal is checked between cycles and
/// between each entry's renewal, never inside one, so an in-flight `touch`
/// always finishes cleanly.
#[derive(Debug)]
pub(crate) struct Worker {
    handle: JoinHandle<()>,
    stop: oneshot::Sender<()>,
}

impl Worker {
    pub(crate) fn spawn(client: Client, period: Duration) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run(client, period, stop_rx));
        Self {
            handle,
            stop: stop_tx,
        }
    }

    /// Signals the worker to stop and waits for its current cycle to finish,
    /// up to `timeout`. The worker is abandoned (not forcibly killed) if it
    /// does not stop in time.
    pub(crate) async fn stop(self, timeout: Duration) {
        let _ = self.stop.send(());
        let _ = tokio::time::timeout(timeout, self.handle).await;
    }
}

#[instrument(skip(client, stop))]
async fn run(client: Client, period: Duration, mut stop: oneshot::Receiver<()>) {
    loop {
        if stop.try_recv().is_ok() {
            return;
        }

        let started = tokio::time::Instant::now();
        for lock in client.cache.snapshot() {
            if stop.try_recv().is_ok() {
                return;
            }

            let name = lock.name.clone();
            let version = match lock.version() {
                Some(v) => v.to_owned(),
                None => continue,
            };
            if client.touch(&lock).await.is_none() {
                client.cache.remove_if_version(&name, &version);
            }
        }

        let elapsed = started.elapsed();
        let remaining = period.saturating_sub(elapsed);

        tokio::select! {
            _ = tokio::time::sleep(remaining) => {}
            _ = &mut stop => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fake::FakeGateway;
    use crate::policy::DefaultPolicy;
    use crate::schema::LogicalRecord;
    use crate::Client;

    #[tokio::test]
    async fn worker_cycle_renews_live_leases_and_evicts_lost_ones() {
        let gateway = Arc::new(FakeGateway::new("N"));
        let client = Client::builder()
            .policy(DefaultPolicy::default())
            .build_with_gateway(gateway.clone());

        let renewed = client.acquire("renewed", None).await.expect("should acquire");
        let lost = client.acquire("lost", None).await.expect("should acquire");

        // A concurrent writer steals "lost" out from under the client before
        // the worker gets a chance to renew it.
        let stolen = client.schema.to_attributes(&LogicalRecord {
            name: Some("lost".to_owned()),
            duration_ms: Some(lost.duration_ms),
            is_locked: Some(true),
            owner: Some("other-writer".to_owned()),
            version: Some("stolen".to_owned()),
            payload: None,
        });
        gateway.force_put("lost", stolen);

        let worker = Worker::spawn(client.clone(), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(40)).await;
        worker.stop(Duration::from_secs(1)).await;

        assert!(client.cache.get("lost").is_none(), "a lease the worker could not renew must be evicted");

        let still_cached = client.cache.get("renewed").expect("a healthy lease stays cached");
        assert_ne!(
            still_cached.version(),
            renewed.version(),
            "the worker should have renewed the version at least once"
        );
    }
}
