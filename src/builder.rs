use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{ensure, Context};
use aws_sdk_dynamodb::model::KeyType;

use crate::cache::LockCache;
use crate::gateway::{DynamoDbGateway, KvGateway};
use crate::policy::{DefaultPolicy, Policy};
use crate::schema::Schema;
use crate::Client;

/// [`Client`] builder: wires together a [`Policy`], a [`Schema`], and a
/// gateway (a live `DynamoDbGateway` for production, or any
/// [`KvGateway`] for tests).
pub struct ClientBuilder {
    schema: Schema,
    defaults: DefaultPolicy,
    policy: Option<Arc<dyn Policy>>,
    owner: Option<String>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            schema: Schema::default(),
            defaults: DefaultPolicy::default(),
            policy: None,
            owner: None,
        }
    }
}

impl ClientBuilder {
    /// Sets the backing table name.
    ///
    /// Default `"Locks"`.
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.schema.table_name = table_name.into();
        self
    }

    /// Overrides the backing attribute names for, respectively, the lock
    /// name, lease duration, locked flag, owner, version and payload fields.
    ///
    /// Default `("N", "D", "L", "O", "V", "P")`.
    pub fn attribute_names(
        mut self,
        name: impl Into<String>,
        duration: impl Into<String>,
        is_locked: impl Into<String>,
        owner: impl Into<String>,
        version: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        self.schema.name = name.into();
        self.schema.duration = duration.into();
        self.schema.is_locked = is_locked.into();
        self.schema.owner = owner.into();
        self.schema.version = version.into();
        self.schema.payload = payload.into();
        self
    }

    /// Sets the provisioned read/write capacity used when [`ClientBuilder::build`]
    /// has to create the table itself.
    ///
    /// Default `(1, 1)`.
    pub fn provisioned_capacity(mut self, read: i64, write: i64) -> Self {
        self.schema.read_capacity = read;
        self.schema.write_capacity = write;
        self
    }

    /// Maximum wall time a single `acquire` call may spend before giving up.
    ///
    /// Default `10s`. No effect if [`ClientBuilder::policy`] was used.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.defaults = self.defaults.with_acquire_timeout(timeout);
        self
    }

    /// Sleep between contention polls inside `acquire`.
    ///
    /// Default `10s`. No effect if [`ClientBuilder::policy`] was used.
    pub fn retry_period(mut self, period: Duration) -> Self {
        self.defaults = self.defaults.with_retry_period(period);
        self
    }

    /// Default lease length stamped into newly acquired locks.
    ///
    /// Default `60s`. Validated against [`ClientBuilder::heartbeat_period`]
    /// when the client is built. No effect if [`ClientBuilder::policy`] was
    /// used.
    pub fn lock_duration(mut self, duration: Duration) -> Self {
        self.defaults = self.defaults.with_lock_duration(duration);
        self
    }

    /// Default release mode: `true` deletes the record, `false` leaves a
    /// tombstone (`is_locked = false`) that is immediately reusable.
    ///
    /// Default `true`. No effect if [`ClientBuilder::policy`] was used.
    pub fn delete_lock(mut self, delete: bool) -> Self {
        self.defaults = self.defaults.with_delete_lock(delete);
        self
    }

    /// Cadence of the background heartbeat worker started by
    /// [`Client::startup`].
    ///
    /// Default `10s`. No effect if [`ClientBuilder::policy`] was used.
    ///
    /// # Panics
    /// [`ClientBuilder::build`] and [`ClientBuilder::build_with_gateway`]
    /// panic if this is not less than [`ClientBuilder::lock_duration`].
    pub fn heartbeat_period(mut self, period: Duration) -> Self {
        self.defaults = self.defaults.with_heartbeat_period(period);
        self
    }

    /// Replaces the timing/identity policy wholesale, e.g. to inject a
    /// deterministic clock in tests. Overrides every setting configured via
    /// [`ClientBuilder::acquire_timeout`] and friends.
    pub fn policy(mut self, policy: impl Policy + 'static) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    /// Overrides the owner id stamped into every lock this client acquires.
    ///
    /// Default: a fresh hostname-prefixed UUID per client instance.
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    fn finish(self, gateway: Arc<dyn KvGateway>) -> Client {
        let policy = self.policy.unwrap_or_else(|| Arc::new(self.defaults));
        assert!(
            policy.heartbeat_period() < policy.lock_duration(),
            "heartbeat_period must be less than lock_duration"
        );

        let owner = self.owner.unwrap_or_else(|| policy.new_owner());

        Client {
            gateway,
            schema: Arc::new(self.schema),
            policy,
            owner: Arc::new(owner),
            cache: LockCache::default(),
            worker: Arc::new(Mutex::new(None)),
        }
    }

    /// Builds a [`Client`] against a live DynamoDB table, verifying the
    /// table exists with the expected key schema.
    pub async fn build(self, dynamodb_client: aws_sdk_dynamodb::Client) -> anyhow::Result<Client> {
        let table_name = self.schema.table_name.clone();
        let key_field = self.schema.name.clone();

        ensure_table(&dynamodb_client, &table_name, &key_field)
            .await
            .with_context(|| format!("checking schema of table `{table_name}`"))?;

        let gateway = Arc::new(DynamoDbGateway::new(dynamodb_client, table_name, key_field));
        Ok(self.finish(gateway))
    }

    /// Builds a [`Client`] against any [`KvGateway`], skipping schema
    /// checks. Used in tests with an in-memory gateway.
    pub fn build_with_gateway(self, gateway: Arc<dyn KvGateway>) -> Client {
        self.finish(gateway)
    }
}

/// Checks that `table_name` exists and uses `key_field` as its hash key.
/// Never creates the table itself; lock tables are expected to be
/// provisioned out of band.
async fn ensure_table(client: &aws_sdk_dynamodb::Client, table_name: &str, key_field: &str) -> anyhow::Result<()> {
    let output = client
        .describe_table()
        .table_name(table_name)
        .send()
        .await
        .with_context(|| format!("table `{table_name}` is missing or inaccessible"))?;

    let table = output.table().context("describe_table returned no table")?;
    let keys = table.key_schema().unwrap_or_default();
    ensure!(
        keys.iter()
            .any(|k| k.attribute_name() == Some(key_field) && k.key_type() == Some(&KeyType::Hash)),
        "table `{table_name}` does not use `{key_field}` as its hash key"
    );
    Ok(())
}
