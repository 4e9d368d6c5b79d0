use async_trait::async_trait;
use aws_sdk_dynamodb::{
    error::{DeleteItemErrorKind, PutItemErrorKind, UpdateItemErrorKind},
    model::AttributeValue,
    types::SdkError,
};
use tracing::instrument;

use crate::error::GatewayError;
use crate::value::{Attributes, Value};

/// The only four operations the rest of the system may invoke against the
/// backing store. Each is a single-item conditional call; none is
/// transactional across items.
///
/// Kept as a trait (rather than a concrete dynamodb type baked into
/// [`crate::Client`]) so the protocol engine in [`crate::Client`] can be
/// exercised against an in-memory fake without a live DynamoDB, see
/// [`crate::fake::FakeGateway`].
#[async_trait]
pub trait KvGateway: std::fmt::Debug + Send + Sync {
    /// Consistent read. `Err(GatewayError::NotFound)` if no row exists.
    async fn get(&self, name: &str) -> Result<Attributes, GatewayError>;

    /// Write `attrs` only if no row currently exists for `attrs[name]`.
    /// `Err(GatewayError::Precondition)` if one exists.
    async fn put_if_absent(&self, attrs: Attributes) -> Result<(), GatewayError>;

    /// Apply `updates` only if every `(field, value)` in `expected` equals
    /// the currently stored value. `Err(GatewayError::Precondition)`
    /// otherwise.
    async fn update_if(
        &self,
        name: &str,
        updates: Attributes,
        expected: Attributes,
    ) -> Result<(), GatewayError>;

    /// Delete only if `expected` matches the currently stored value.
    /// `Err(GatewayError::Precondition)` otherwise.
    async fn delete_if(&self, name: &str, expected: Attributes) -> Result<(), GatewayError>;
}

/// DynamoDB-backed [`KvGateway`].
#[derive(Debug, Clone)]
pub(crate) struct DynamoDbGateway {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
    key_field: String,
}

impl DynamoDbGateway {
    pub(crate) fn new(client: aws_sdk_dynamodb::Client, table_name: String, key_field: String) -> Self {
        Self {
            client,
            table_name,
            key_field,
        }
    }
}

fn to_av(value: &Value) -> AttributeValue {
    match value {
        Value::S(s) => AttributeValue::S(s.clone()),
        Value::N(n) => AttributeValue::N(n.to_string()),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::B(b) => AttributeValue::B(aws_sdk_dynamodb::types::Blob::new(b.clone())),
    }
}

fn from_av(value: &AttributeValue) -> Option<Value> {
    match value {
        AttributeValue::S(s) => Some(Value::S(s.clone())),
        AttributeValue::N(n) => n.parse().ok().map(Value::N),
        AttributeValue::Bool(b) => Some(Value::Bool(*b)),
        AttributeValue::B(b) => Some(Value::B(b.clone().into_inner())),
        _ => None,
    }
}

/// Builds `#k0 = :v0 AND #k1 = :v1 ...` plus the name/value maps for a set of
/// expected-value conditions.
fn condition_expression(expected: &Attributes) -> (String, Vec<(String, String)>, Vec<(String, AttributeValue)>) {
    let mut clauses = Vec::new();
    let mut names = Vec::new();
    let mut values = Vec::new();
    for (i, (field, value)) in expected.iter().enumerate() {
        let name_placeholder = format!("#k{i}");
        let value_placeholder = format!(":v{i}");
        clauses.push(format!("{name_placeholder} = {value_placeholder}"));
        names.push((name_placeholder, field.clone()));
        values.push((value_placeholder, to_av(value)));
    }
    (clauses.join(" AND "), names, values)
}

/// Builds `SET #u0 = :u0, #u1 = :u1 ...` plus the name/value maps for a set
/// of updates.
fn update_expression(updates: &Attributes) -> (String, Vec<(String, String)>, Vec<(String, AttributeValue)>) {
    let mut clauses = Vec::new();
    let mut names = Vec::new();
    let mut values = Vec::new();
    for (i, (field, value)) in updates.iter().enumerate() {
        let name_placeholder = format!("#u{i}");
        let value_placeholder = format!(":u{i}");
        clauses.push(format!("{name_placeholder} = {value_placeholder}"));
        names.push((name_placeholder, field.clone()));
        values.push((value_placeholder, to_av(value)));
    }
    (format!("SET {}", clauses.join(", ")), names, values)
}

#[async_trait]
impl KvGateway for DynamoDbGateway {
    #[instrument(skip(self))]
    async fn get(&self, name: &str) -> Result<Attributes, GatewayError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(&self.key_field, AttributeValue::S(name.to_owned()))
            .consistent_read(true)
            .send()
            .await;

        match result {
            Ok(output) => {
                let item = output.item().ok_or_else(|| GatewayError::NotFound(name.to_owned()))?;
                let attrs = item
                    .iter()
                    .filter_map(|(k, v)| from_av(v).map(|v| (k.clone(), v)))
                    .collect();
                Ok(attrs)
            }
            Err(err) => Err(GatewayError::Transport(err.into())),
        }
    }

    #[instrument(skip(self, attrs))]
    async fn put_if_absent(&self, attrs: Attributes) -> Result<(), GatewayError> {
        let name = attrs
            .get(&self.key_field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let mut request = self.client.put_item().table_name(&self.table_name);
        for (field, value) in &attrs {
            request = request.item(field, to_av(value));
        }
        let result = request
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", &self.key_field)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError { err, .. })
                if matches!(err.kind, PutItemErrorKind::ConditionalCheckFailedException(_)) =>
            {
                Err(GatewayError::Precondition(name))
            }
            Err(err) => Err(GatewayError::Transport(err.into())),
        }
    }

    #[instrument(skip(self, updates, expected))]
    async fn update_if(
        &self,
        name: &str,
        updates: Attributes,
        expected: Attributes,
    ) -> Result<(), GatewayError> {
        let (update_expr, update_names, update_values) = update_expression(&updates);
        let (cond_expr, cond_names, cond_values) = condition_expression(&expected);

        let mut request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(&self.key_field, AttributeValue::S(name.to_owned()))
            .update_expression(update_expr)
            .condition_expression(cond_expr);

        for (placeholder, field) in update_names.into_iter().chain(cond_names) {
            request = request.expression_attribute_names(placeholder, field);
        }
        for (placeholder, value) in update_values.into_iter().chain(cond_values) {
            request = request.expression_attribute_values(placeholder, value);
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError { err, .. })
                if matches!(err.kind, UpdateItemErrorKind::ConditionalCheckFailedException(_)) =>
            {
                Err(GatewayError::Precondition(name.to_owned()))
            }
            Err(err) => Err(GatewayError::Transport(err.into())),
        }
    }

    #[instrument(skip(self, expected))]
    async fn delete_if(&self, name: &str, expected: Attributes) -> Result<(), GatewayError> {
        let (cond_expr, cond_names, cond_values) = condition_expression(&expected);

        let mut request = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key(&self.key_field, AttributeValue::S(name.to_owned()))
            .condition_expression(cond_expr);

        for (placeholder, field) in cond_names {
            request = request.expression_attribute_names(placeholder, field);
        }
        for (placeholder, value) in cond_values {
            request = request.expression_attribute_values(placeholder, value);
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError { err, .. })
                if matches!(err.kind, DeleteItemErrorKind::ConditionalCheckFailedException(_)) =>
            {
                Err(GatewayError::Precondition(name.to_owned()))
            }
            Err(err) => Err(GatewayError::Transport(err.into())),
        }
    }
}
