//! An in-memory [`KvGateway`] fake, so the lock client's protocol engine can
//! be exercised without a live DynamoDB.
//!
//! Grounded on the in-memory lock backend pattern used elsewhere in the
//! pack (a `Mutex`-guarded map standing in for the conditional-write store),
//! adapted here to speak the same `get`/`put_if_absent`/`update_if`/
//! `delete_if` vocabulary the real gateway does, including the exact
//! `NotFound` vs `Precondition` distinction the protocol engine depends on.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::gateway::KvGateway;
use crate::value::Attributes;

#[derive(Debug, Default)]
pub struct FakeGateway {
    key_field: String,
    rows: Mutex<HashMap<String, Attributes>>,
}

impl FakeGateway {
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            rows: Mutex::default(),
        }
    }

    /// Test hook: write a row directly, bypassing every conditional check.
    /// Used to simulate a concurrent writer mutating a record out from under
    /// the client under test.
    pub fn force_put(&self, name: &str, attrs: Attributes) {
        self.rows.lock().unwrap().insert(name.to_owned(), attrs);
    }

    fn matches(row: &Attributes, expected: &Attributes) -> bool {
        expected.iter().all(|(field, value)| row.get(field) == Some(value))
    }
}

#[async_trait]
impl KvGateway for FakeGateway {
    async fn get(&self, name: &str) -> Result<Attributes, GatewayError> {
        self.rows
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(name.to_owned()))
    }

    async fn put_if_absent(&self, attrs: Attributes) -> Result<(), GatewayError> {
        let name = attrs
            .get(&self.key_field)
            .and_then(crate::value::Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&name) {
            return Err(GatewayError::Precondition(name));
        }
        rows.insert(name, attrs);
        Ok(())
    }

    async fn update_if(
        &self,
        name: &str,
        updates: Attributes,
        expected: Attributes,
    ) -> Result<(), GatewayError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get(name).ok_or_else(|| GatewayError::NotFound(name.to_owned()))?;
        if !Self::matches(row, &expected) {
            return Err(GatewayError::Precondition(name.to_owned()));
        }
        let mut updated = row.clone();
        updated.extend(updates);
        rows.insert(name.to_owned(), updated);
        Ok(())
    }

    async fn delete_if(&self, name: &str, expected: Attributes) -> Result<(), GatewayError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get(name).ok_or_else(|| GatewayError::NotFound(name.to_owned()))?;
        if !Self::matches(row, &expected) {
            return Err(GatewayError::Precondition(name.to_owned()));
        }
        rows.remove(name);
        Ok(())
    }
}
