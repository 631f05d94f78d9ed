use std::{sync::Arc, time::Duration};

use anyhow::Context;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use radiotherm_common::{Connector, DeviceError, Thermostat, TstatSnapshot};

const PATH_TSTAT: &str = "/tstat";
const PATH_NAME: &str = "/sys/name";

/// Blocking client for the thermostat's local HTTP API.
pub struct HttpThermostat {
    client: Client,
    host: String,
}

impl HttpThermostat {
    pub fn new(client: Client, host: impl Into<String>) -> Self {
        Self {
            client,
            host: host.into(),
        }
    }

    fn get_json(&self, path: &str) -> Result<Value, DeviceError> {
        let url = format!("http://{}{}", self.host, path);
        debug!(url = %url, "querying thermostat");

        let response = self
            .client
            .get(&url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| DeviceError::connectivity(&self.host, err))?;

        response
            .json::<Value>()
            .map_err(|err| DeviceError::invalid_payload(&self.host, err))
    }
}

impl Thermostat for HttpThermostat {
    fn host(&self) -> &str {
        &self.host
    }

    fn get_name(&self) -> Result<String, DeviceError> {
        parse_name(&self.host, self.get_json(PATH_NAME)?)
    }

    fn get_raw_state(&self) -> Result<TstatSnapshot, DeviceError> {
        TstatSnapshot::from_value(&self.host, self.get_json(PATH_TSTAT)?)
    }
}

fn parse_name(host: &str, body: Value) -> Result<String, DeviceError> {
    match body.get("name") {
        Some(Value::String(name)) => Ok(name.clone()),
        _ => Err(DeviceError::invalid_payload(host, "missing `name` field")),
    }
}

pub struct HttpConnector {
    client: Client,
}

impl HttpConnector {
    /// Builds the shared client. Must not be called from inside an async runtime.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build thermostat HTTP client")?;
        Ok(Self { client })
    }
}

impl Connector for HttpConnector {
    fn connect(&self, host: &str) -> Result<Arc<dyn Thermostat>, DeviceError> {
        Ok(Arc::new(HttpThermostat::new(self.client.clone(), host)))
    }
}
