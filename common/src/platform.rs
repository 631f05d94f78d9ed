use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    cache::StateCache,
    config::PlatformConfig,
    device::{CachedThermostat, Thermostat},
    error::DeviceError,
    sensor::{BasicSensor, BinarySensor, Entity, Pollable, ThermostatEntity},
    types::Variable,
};

pub const SENSOR_TYPES: [&str; 2] = ["hvac_state", "temperature"];
pub const BINARY_SENSOR_TYPES: [&str; 1] = ["fan"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Sensor,
    BinarySensor,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::BinarySensor => "binary_sensor",
        }
    }

    pub fn variables(self) -> &'static [&'static str] {
        match self {
            Self::Sensor => &SENSOR_TYPES,
            Self::BinarySensor => &BINARY_SENSOR_TYPES,
        }
    }
}

/// Finds a thermostat on the local network when no host is configured.
pub trait Discovery {
    fn discover_address(&self) -> Option<String>;
}

pub struct NoDiscovery;

impl Discovery for NoDiscovery {
    fn discover_address(&self) -> Option<String> {
        None
    }
}

pub struct StaticDiscovery(pub Option<String>);

impl Discovery for StaticDiscovery {
    fn discover_address(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Opens a device handle for a host.
pub trait Connector {
    fn connect(&self, host: &str) -> Result<Arc<dyn Thermostat>, DeviceError>;
}

pub fn resolve_hosts(config: &PlatformConfig, discovery: &dyn Discovery) -> Vec<String> {
    match &config.host {
        Some(hosts) => hosts.clone(),
        None => discovery.discover_address().into_iter().collect(),
    }
}

/// Builds the entities of one platform. Hosts that cannot be reached are
/// logged and skipped; the rest are returned for registration.
pub fn setup_platform(
    platform: Platform,
    config: &PlatformConfig,
    discovery: &dyn Discovery,
    connector: &dyn Connector,
    cache: &Arc<StateCache>,
) -> Vec<Box<dyn ThermostatEntity>> {
    let hosts = resolve_hosts(config, discovery);
    if hosts.is_empty() {
        error!(platform = platform.as_str(), "no radiotherm thermostats detected");
        return Vec::new();
    }

    let mut entities: Vec<Box<dyn ThermostatEntity>> = Vec::new();
    for host in hosts {
        info!(platform = platform.as_str(), "connecting to radiotherm at {host}");
        match connect_entities(platform, &host, connector, cache) {
            Ok(mut built) => entities.append(&mut built),
            Err(err) => error!("unable to connect to radio thermostat {host}: {err}"),
        }
    }
    entities
}

fn connect_entities(
    platform: Platform,
    host: &str,
    connector: &dyn Connector,
    cache: &Arc<StateCache>,
) -> Result<Vec<Box<dyn ThermostatEntity>>, DeviceError> {
    let device = Arc::new(CachedThermostat::new(
        connector.connect(host)?,
        Arc::clone(cache),
    ));

    platform
        .variables()
        .iter()
        .map(|name| -> Result<Box<dyn ThermostatEntity>, DeviceError> {
            let variable = Variable::parse(name);
            let entity: Box<dyn ThermostatEntity> = match platform {
                Platform::Sensor => Box::new(BasicSensor::new(Arc::clone(&device), variable)?),
                Platform::BinarySensor => {
                    Box::new(BinarySensor::new(Arc::clone(&device), variable)?)
                }
            };
            Ok(entity)
        })
        .collect()
}

/// Runs one poll of `entity`, logging a failed fetch. Returns availability.
pub fn poll_entity(entity: &mut dyn ThermostatEntity) -> bool {
    if let Err(err) = entity.update() {
        warn!(sensor = entity.name(), "poll failed: {err}");
    }
    entity.available()
}

/// Polls every entity once before it is handed to the host.
pub fn update_before_add(entities: &mut [Box<dyn ThermostatEntity>]) {
    for entity in entities.iter_mut() {
        poll_entity(entity.as_mut());
    }
}
