use std::sync::{Arc, OnceLock};

use serde_json::{Map, Value};

use crate::{cache::StateCache, error::DeviceError};

/// Full state blob returned by one `/tstat` read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TstatSnapshot {
    pub raw: Map<String, Value>,
}

impl TstatSnapshot {
    pub fn from_value(host: &str, value: Value) -> Result<Self, DeviceError> {
        match value {
            Value::Object(raw) => Ok(Self { raw }),
            other => Err(DeviceError::invalid_payload(
                host,
                format!("expected a JSON object, got {other}"),
            )),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }

    pub fn int_field(&self, name: &str) -> Option<i64> {
        match self.field(name)? {
            Value::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64)),
            Value::Bool(flag) => Some(i64::from(*flag)),
            _ => None,
        }
    }

    pub fn number_field(&self, name: &str) -> Option<f64> {
        match self.field(name)? {
            Value::Number(number) => number.as_f64(),
            _ => None,
        }
    }

    /// Truthiness of a raw field; `None` when the field is absent.
    pub fn truthy(&self, name: &str) -> Option<bool> {
        let truthy = match self.field(name)? {
            Value::Null => false,
            Value::Bool(flag) => *flag,
            Value::Number(number) => number.as_f64().is_some_and(|v| v != 0.0),
            Value::String(text) => !text.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(fields) => !fields.is_empty(),
        };
        Some(truthy)
    }
}

/// Operations the sensors need from a thermostat connection. Calls block.
pub trait Thermostat: Send + Sync {
    fn host(&self) -> &str;
    fn get_name(&self) -> Result<String, DeviceError>;
    fn get_raw_state(&self) -> Result<TstatSnapshot, DeviceError>;
}

/// Thermostat handle whose state reads go through the shared cache.
pub struct CachedThermostat {
    device: Arc<dyn Thermostat>,
    cache: Arc<StateCache>,
    name: OnceLock<String>,
}

impl CachedThermostat {
    pub fn new(device: Arc<dyn Thermostat>, cache: Arc<StateCache>) -> Self {
        Self {
            device,
            cache,
            name: OnceLock::new(),
        }
    }

    pub fn host(&self) -> &str {
        self.device.host()
    }

    /// Device name, read once and remembered.
    pub fn name(&self) -> Result<&str, DeviceError> {
        if let Some(name) = self.name.get() {
            return Ok(name.as_str());
        }
        let name = self.device.get_name()?;
        Ok(self.name.get_or_init(|| name).as_str())
    }

    pub fn tstat(&self) -> Result<Arc<TstatSnapshot>, DeviceError> {
        self.cache
            .get_state(self.device.host(), || self.device.get_raw_state())
    }

    pub fn tstat_at(&self, now_ms: u64) -> Result<Arc<TstatSnapshot>, DeviceError> {
        self.cache
            .get_state_at(self.device.host(), now_ms, || self.device.get_raw_state())
    }

    pub fn cache(&self) -> &Arc<StateCache> {
        &self.cache
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;

    use super::fake::FakeThermostat;
    use super::*;

    #[test]
    fn truthiness_follows_raw_value_kind() {
        let snapshot = TstatSnapshot::from_value(
            "10.0.0.1",
            json!({"one": 1, "zero": 0, "yes": true, "no": false, "null": null, "text": "on"}),
        )
        .unwrap();

        assert_eq!(snapshot.truthy("one"), Some(true));
        assert_eq!(snapshot.truthy("zero"), Some(false));
        assert_eq!(snapshot.truthy("yes"), Some(true));
        assert_eq!(snapshot.truthy("no"), Some(false));
        assert_eq!(snapshot.truthy("null"), Some(false));
        assert_eq!(snapshot.truthy("text"), Some(true));
        assert_eq!(snapshot.truthy("missing"), None);
    }

    #[test]
    fn int_field_accepts_whole_floats() {
        let snapshot =
            TstatSnapshot::from_value("10.0.0.1", json!({"a": 2, "b": 1.0, "c": 1.5, "d": "1"}))
                .unwrap();

        assert_eq!(snapshot.int_field("a"), Some(2));
        assert_eq!(snapshot.int_field("b"), Some(1));
        assert_eq!(snapshot.int_field("c"), None);
        assert_eq!(snapshot.int_field("d"), None);
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = TstatSnapshot::from_value("10.0.0.1", json!([1, 2])).unwrap_err();
        assert!(matches!(err, DeviceError::InvalidPayload { .. }));
        assert_eq!(err.host(), "10.0.0.1");
    }

    #[test]
    fn name_is_read_once() {
        let device = Arc::new(FakeThermostat::new("10.0.0.1", "Hallway", json!({})));
        let cached = CachedThermostat::new(device.clone(), Arc::new(StateCache::new()));

        assert_eq!(cached.name().unwrap(), "Hallway");
        assert_eq!(cached.name().unwrap(), "Hallway");
        assert_eq!(device.name_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handles_for_one_host_share_the_cache() {
        let cache = Arc::new(StateCache::new());
        let device = Arc::new(FakeThermostat::new("10.0.0.1", "Hallway", json!({"tstate": 1})));
        let first = CachedThermostat::new(device.clone(), cache.clone());
        let second = CachedThermostat::new(device.clone(), cache);

        let a = first.tstat_at(1_000).unwrap();
        let b = second.tstat_at(2_000).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(device.state_calls(), 1);
    }
}
