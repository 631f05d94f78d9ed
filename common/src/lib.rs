pub mod cache;
pub mod config;
pub mod device;
pub mod error;
pub mod platform;
pub mod sensor;
pub mod types;

pub use cache::{monotonic_ms, CachedReading, StateCache, STALE_WINDOW_MS};
pub use config::{BridgeConfig, PlatformConfig};
pub use device::{CachedThermostat, Thermostat, TstatSnapshot};
pub use error::DeviceError;
pub use platform::{
    poll_entity, setup_platform, update_before_add, Connector, Discovery, NoDiscovery, Platform,
    StaticDiscovery, BINARY_SENSOR_TYPES, SENSOR_TYPES,
};
pub use sensor::{BasicSensor, BinarySensor, Entity, Pollable, StateSource, ThermostatEntity};
pub use types::{HvacState, SensorValue, Variable};
