use std::fmt;

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HvacState {
    Idle,
    Heating,
    Cooling,
}

impl HvacState {
    /// Maps the raw `tstate` code reported by the thermostat.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Idle),
            1 => Some(Self::Heating),
            2 => Some(Self::Cooling),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Heating => "heating",
            Self::Cooling => "cooling",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Variable {
    HvacState,
    Temperature,
    Fan,
    Unsupported(String),
}

impl Variable {
    pub fn parse(name: &str) -> Self {
        match name {
            "hvac_state" => Self::HvacState,
            "temperature" => Self::Temperature,
            "fan" => Self::Fan,
            other => Self::Unsupported(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::HvacState => "hvac_state",
            Self::Temperature => "temperature",
            Self::Fan => "fan",
            Self::Unsupported(name) => name,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorValue {
    Hvac(HvacState),
    Number(f64),
    Flag(bool),
}

impl SensorValue {
    pub fn as_hvac(self) -> Option<HvacState> {
        match self {
            Self::Hvac(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_number(self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(value),
            _ => None,
        }
    }
}

impl Serialize for SensorValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Hvac(state) => serializer.serialize_str(state.as_str()),
            Self::Number(value) => serializer.serialize_f64(*value),
            Self::Flag(true) => serializer.serialize_str("on"),
            Self::Flag(false) => serializer.serialize_str("off"),
        }
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hvac(state) => f.write_str(state.as_str()),
            Self::Number(value) => write!(f, "{value:.1}"),
            Self::Flag(true) => f.write_str("on"),
            Self::Flag(false) => f.write_str("off"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_tstate_codes() {
        assert_eq!(HvacState::from_code(0), Some(HvacState::Idle));
        assert_eq!(HvacState::from_code(1), Some(HvacState::Heating));
        assert_eq!(HvacState::from_code(2), Some(HvacState::Cooling));
    }

    #[test]
    fn unknown_tstate_codes_are_unmapped() {
        assert_eq!(HvacState::from_code(3), None);
        assert_eq!(HvacState::from_code(-1), None);
    }

    #[test]
    fn unknown_variable_names_are_kept() {
        assert_eq!(Variable::parse("fan"), Variable::Fan);
        assert_eq!(
            Variable::parse("humidity"),
            Variable::Unsupported("humidity".to_string())
        );
        assert_eq!(Variable::parse("humidity").as_str(), "humidity");
    }

    #[test]
    fn sensor_values_serialize_as_host_states() {
        let hvac = serde_json::to_value(SensorValue::Hvac(HvacState::Cooling)).unwrap();
        let flag = serde_json::to_value(SensorValue::Flag(true)).unwrap();
        let number = serde_json::to_value(SensorValue::Number(71.5)).unwrap();

        assert_eq!(hvac, serde_json::json!("cooling"));
        assert_eq!(flag, serde_json::json!("on"));
        assert_eq!(number, serde_json::json!(71.5));
    }
}
