//! Metric - the unit of telemetry flowing through the relay
//!
//! A `Metric` pairs an opaque JSON payload with an identity string used for
//! "log once" deduplication. Event metrics derive their identity from
//! `group:name`, so two events with the same group and name are considered
//! the same metric regardless of their properties.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ContractError;

/// Payload key holding the event group
pub const EVENT_GROUP_KEY: &str = "event_group";
/// Payload key holding the event name
pub const EVENT_NAME_KEY: &str = "event_name";
/// Payload key holding the event properties object
pub const EVENT_PROPERTY_KEY: &str = "event_property";

/// Build the identity string of an event metric.
pub fn event_identity(group: &str, name: &str) -> String {
    format!("{group}:{name}")
}

/// Immutable telemetry record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    identity: String,
    payload: Value,
}

impl Metric {
    /// Create a metric from an explicit identity and payload
    pub fn new(identity: impl Into<String>, payload: Value) -> Self {
        Self {
            identity: identity.into(),
            payload,
        }
    }

    /// Identity used for deduplication
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Structured payload sent to the collection endpoint
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Consume the metric, returning its payload
    pub fn into_payload(self) -> Value {
        self.payload
    }
}

/// Builder for an event metric
///
/// # Example
///
/// ```
/// use contracts::EventMetric;
/// use serde_json::json;
///
/// let metric = EventMetric::new("App", "Logged In")
///     .unwrap()
///     .with_properties(json!({ "MyAppVersion": "10.13.1" }))
///     .unwrap()
///     .into_metric();
/// assert_eq!(metric.identity(), "App:Logged In");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EventMetric {
    group: String,
    name: String,
    properties: Map<String, Value>,
}

impl EventMetric {
    /// Create an event with no properties
    ///
    /// # Errors
    /// Returns `InvalidMetric` if `group` or `name` is blank.
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Result<Self, ContractError> {
        let group = group.into();
        let name = name.into();

        if group.trim().is_empty() {
            return Err(ContractError::invalid_metric("event group cannot be empty"));
        }
        if name.trim().is_empty() {
            return Err(ContractError::invalid_metric("event name cannot be empty"));
        }

        Ok(Self {
            group,
            name,
            properties: Map::new(),
        })
    }

    /// Merge a JSON object of extra properties into the event
    ///
    /// `null` is accepted and adds nothing.
    ///
    /// # Errors
    /// Returns `InvalidMetric` for any other non-object value.
    pub fn with_properties(mut self, properties: Value) -> Result<Self, ContractError> {
        match properties {
            Value::Null => {}
            Value::Object(map) => {
                for (key, value) in map {
                    self.add_property(key, value);
                }
            }
            other => {
                return Err(ContractError::invalid_metric(format!(
                    "event properties must be an object or null, got {}",
                    json_type_name(&other)
                )));
            }
        }
        Ok(self)
    }

    /// Add a single property
    pub fn add_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Identity of the metric this event produces
    pub fn identity(&self) -> String {
        event_identity(&self.group, &self.name)
    }

    /// Freeze the event into a `Metric`
    pub fn into_metric(self) -> Metric {
        let identity = self.identity();
        let mut payload = Map::with_capacity(3);
        payload.insert(EVENT_GROUP_KEY.to_string(), Value::String(self.group));
        payload.insert(EVENT_NAME_KEY.to_string(), Value::String(self.name));
        payload.insert(EVENT_PROPERTY_KEY.to_string(), Value::Object(self.properties));
        Metric::new(identity, Value::Object(payload))
    }
}

impl From<EventMetric> for Metric {
    fn from(event: EventMetric) -> Self {
        event.into_metric()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
