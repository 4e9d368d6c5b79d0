use crate::value::{Attributes, Value};

/// The logical fields of a lock record that ever cross the gateway boundary.
///
/// `timestamp` deliberately has no place here: it is client-local and never
/// persisted (see [`crate::Lock`]).
#[derive(Debug, Clone, Default)]
pub(crate) struct LogicalRecord {
    pub name: Option<String>,
    pub duration_ms: Option<i64>,
    pub is_locked: Option<bool>,
    pub owner: Option<String>,
    pub version: Option<String>,
    pub payload: Option<Vec<u8>>,
}

/// Bidirectional mapping between the logical lock fields and the backing
/// table's attribute names, plus the table's identity and provisioned
/// throughput.
///
/// Unknown keys are dropped silently on the way to the store; missing keys
/// become `None` on the way back.
#[derive(Debug, Clone)]
pub struct Schema {
    pub(crate) table_name: String,
    pub(crate) name: String,
    pub(crate) duration: String,
    pub(crate) is_locked: String,
    pub(crate) owner: String,
    pub(crate) version: String,
    pub(crate) payload: String,
    pub(crate) read_capacity: i64,
    pub(crate) write_capacity: i64,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            table_name: "Locks".to_owned(),
            name: "N".to_owned(),
            duration: "D".to_owned(),
            is_locked: "L".to_owned(),
            owner: "O".to_owned(),
            version: "V".to_owned(),
            payload: "P".to_owned(),
            read_capacity: 1,
            write_capacity: 1,
        }
    }
}

impl Schema {
    /// Converts a logical record into the store's attribute-name map, for
    /// use as either the written item or a conditional-write expectation.
    /// Fields left as `None` are omitted.
    pub(crate) fn to_attributes(&self, record: &LogicalRecord) -> Attributes {
        let mut attrs = Attributes::new();
        if let Some(name) = &record.name {
            attrs.insert(self.name.clone(), Value::S(name.clone()));
        }
        if let Some(duration_ms) = record.duration_ms {
            attrs.insert(self.duration.clone(), Value::N(duration_ms));
        }
        if let Some(is_locked) = record.is_locked {
            attrs.insert(self.is_locked.clone(), Value::Bool(is_locked));
        }
        if let Some(owner) = &record.owner {
            attrs.insert(self.owner.clone(), Value::S(owner.clone()));
        }
        if let Some(version) = &record.version {
            attrs.insert(self.version.clone(), Value::S(version.clone()));
        }
        if let Some(payload) = &record.payload {
            attrs.insert(self.payload.clone(), Value::B(payload.clone()));
        }
        attrs
    }

    /// Converts a store attribute-name map back into the logical field set.
    /// Missing attributes become `None`; attributes not recognised by this
    /// schema are dropped silently.
    pub(crate) fn to_logical(&self, attrs: &Attributes) -> LogicalRecord {
        LogicalRecord {
            name: attrs.get(&self.name).and_then(Value::as_str).map(str::to_owned),
            duration_ms: attrs.get(&self.duration).and_then(Value::as_i64),
            is_locked: attrs.get(&self.is_locked).and_then(Value::as_bool),
            owner: attrs
                .get(&self.owner)
                .and_then(Value::as_str)
                .map(str::to_owned),
            version: attrs
                .get(&self.version)
                .and_then(Value::as_str)
                .map(str::to_owned),
            payload: attrs.get(&self.payload).and_then(Value::as_bytes).map(<[u8]>::to_vec),
        }
    }
}
