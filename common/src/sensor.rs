//! Logical sensors derived from one thermostat snapshot.
//!
//! Every sensor reads through [`CachedThermostat`], so the hvac, temperature
//! and fan entities of one device polled in the same cycle share a fetch.

use std::sync::Arc;

use tracing::debug;

use crate::{
    device::{CachedThermostat, TstatSnapshot},
    error::DeviceError,
    types::{HvacState, SensorValue, Variable},
};

pub const UNIT_FAHRENHEIT: &str = "°F";

pub trait Pollable {
    /// Refreshes the derived state. On a failed fetch the sensor becomes
    /// unavailable and the error is handed back to the scheduler.
    fn update(&mut self) -> Result<(), DeviceError>;

    fn should_poll(&self) -> bool {
        true
    }
}

pub trait StateSource {
    fn value(&self) -> Option<SensorValue>;
    fn is_on(&self) -> Option<bool>;
}

pub trait Entity {
    fn name(&self) -> &str;
    fn unit_of_measurement(&self) -> Option<&'static str>;
    fn available(&self) -> bool;
}

pub trait ThermostatEntity: Pollable + StateSource + Entity + Send {
    fn host(&self) -> &str;
}

struct SensorCore {
    device: Arc<CachedThermostat>,
    variable: Variable,
    name: String,
    state: Option<SensorValue>,
}

impl SensorCore {
    fn new(device: Arc<CachedThermostat>, variable: Variable) -> Result<Self, DeviceError> {
        let name = format!("{}.{}", device.name()?, variable);
        Ok(Self {
            device,
            variable,
            name,
            state: None,
        })
    }

    fn refresh(
        &mut self,
        derive: fn(&TstatSnapshot) -> Option<SensorValue>,
    ) -> Result<(), DeviceError> {
        match self.device.tstat() {
            Ok(snapshot) => {
                self.state = derive(&snapshot);
                if self.state.is_none() {
                    debug!(sensor = %self.name, "state field missing or unrecognized");
                }
                Ok(())
            }
            Err(err) => {
                self.state = None;
                Err(err)
            }
        }
    }
}

fn hvac_state(snapshot: &TstatSnapshot) -> Option<SensorValue> {
    snapshot
        .int_field("tstate")
        .and_then(HvacState::from_code)
        .map(SensorValue::Hvac)
}

fn temperature(snapshot: &TstatSnapshot) -> Option<SensorValue> {
    snapshot.number_field("temp").map(SensorValue::Number)
}

fn fan_state(snapshot: &TstatSnapshot) -> Option<SensorValue> {
    snapshot.truthy("fstate").map(SensorValue::Flag)
}

pub fn unit_for(variable: &Variable) -> Option<&'static str> {
    match variable {
        Variable::Temperature => Some(UNIT_FAHRENHEIT),
        _ => None,
    }
}

/// Sensor reporting `hvac_state` or `temperature`.
pub struct BasicSensor {
    core: SensorCore,
    unit: Option<&'static str>,
}

impl BasicSensor {
    pub fn new(device: Arc<CachedThermostat>, variable: Variable) -> Result<Self, DeviceError> {
        Ok(Self {
            core: SensorCore::new(device, variable)?,
            unit: None,
        })
    }

    pub fn variable(&self) -> &Variable {
        &self.core.variable
    }

    pub fn state(&self) -> Option<SensorValue> {
        self.core.state
    }
}

impl Pollable for BasicSensor {
    fn update(&mut self) -> Result<(), DeviceError> {
        self.unit = unit_for(&self.core.variable);
        match self.core.variable {
            Variable::HvacState => self.core.refresh(hvac_state),
            Variable::Temperature => self.core.refresh(temperature),
            Variable::Fan | Variable::Unsupported(_) => {
                self.core.state = None;
                Ok(())
            }
        }
    }
}

impl StateSource for BasicSensor {
    fn value(&self) -> Option<SensorValue> {
        self.core.state
    }

    fn is_on(&self) -> Option<bool> {
        None
    }
}

impl Entity for BasicSensor {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn unit_of_measurement(&self) -> Option<&'static str> {
        self.unit
    }

    fn available(&self) -> bool {
        self.core.state.is_some()
    }
}

impl ThermostatEntity for BasicSensor {
    fn host(&self) -> &str {
        self.core.device.host()
    }
}

/// On/off sensor; only `fan` is supported.
pub struct BinarySensor {
    core: SensorCore,
}

impl BinarySensor {
    pub fn new(device: Arc<CachedThermostat>, variable: Variable) -> Result<Self, DeviceError> {
        Ok(Self {
            core: SensorCore::new(device, variable)?,
        })
    }

    pub fn variable(&self) -> &Variable {
        &self.core.variable
    }
}

impl Pollable for BinarySensor {
    fn update(&mut self) -> Result<(), DeviceError> {
        match self.core.variable {
            Variable::Fan => self.core.refresh(fan_state),
            _ => {
                self.core.state = None;
                Ok(())
            }
        }
    }
}

impl StateSource for BinarySensor {
    fn value(&self) -> Option<SensorValue> {
        self.core.state
    }

    fn is_on(&self) -> Option<bool> {
        match self.core.state {
            Some(SensorValue::Flag(on)) => Some(on),
            _ => None,
        }
    }
}

impl Entity for BinarySensor {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn unit_of_measurement(&self) -> Option<&'static str> {
        None
    }

    fn available(&self) -> bool {
        self.core.state.is_some()
    }
}

impl ThermostatEntity for BinarySensor {
    fn host(&self) -> &str {
        self.core.device.host()
    }
}
