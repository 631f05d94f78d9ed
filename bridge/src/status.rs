use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use radiotherm_common::{
    CachedReading, Entity, SensorValue, StateCache, StateSource, ThermostatEntity, TstatSnapshot,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorView {
    pub name: String,
    pub host: String,
    pub state: Option<SensorValue>,
    #[serde(rename = "isOn")]
    pub is_on: Option<bool>,
    pub available: bool,
    #[serde(rename = "unitOfMeasurement")]
    pub unit_of_measurement: Option<&'static str>,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceView {
    pub host: String,
    #[serde(rename = "fetchedAgoMs")]
    pub fetched_ago_ms: u64,
    pub raw: Map<String, Value>,
}

/// Last published poll results, read by the status API.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    pub sensors: Vec<SensorView>,
    pub devices: Vec<DeviceView>,
}

impl StatusBoard {
    pub fn publish(
        &mut self,
        entities: &[Box<dyn ThermostatEntity>],
        cache: &StateCache,
        now_ms: u64,
        updated_at: DateTime<Utc>,
    ) {
        self.sensors = entities
            .iter()
            .map(|entity| sensor_view(entity.as_ref(), updated_at))
            .collect();
        self.devices = cache
            .readings()
            .into_iter()
            .map(|(host, reading)| device_view(host, &reading, now_ms))
            .collect();
    }
}

fn sensor_view(entity: &dyn ThermostatEntity, updated_at: DateTime<Utc>) -> SensorView {
    SensorView {
        name: entity.name().to_string(),
        host: entity.host().to_string(),
        state: entity.value(),
        is_on: entity.is_on(),
        available: entity.available(),
        unit_of_measurement: entity.unit_of_measurement(),
        last_updated: updated_at,
    }
}

fn device_view(host: String, reading: &CachedReading<TstatSnapshot>, now_ms: u64) -> DeviceView {
    DeviceView {
        host,
        fetched_ago_ms: now_ms.saturating_sub(reading.fetched_at_ms),
        raw: reading.snapshot.raw.clone(),
    }
}
