use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("thermostat {host} unreachable: {message}")]
    Connectivity { host: String, message: String },
    #[error("thermostat {host} returned an invalid payload: {message}")]
    InvalidPayload { host: String, message: String },
}

impl DeviceError {
    pub fn connectivity(host: impl Into<String>, message: impl ToString) -> Self {
        Self::Connectivity {
            host: host.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_payload(host: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidPayload {
            host: host.into(),
            message: message.to_string(),
        }
    }

    pub fn host(&self) -> &str {
        match self {
            Self::Connectivity { host, .. } | Self::InvalidPayload { host, .. } => host,
        }
    }
}
