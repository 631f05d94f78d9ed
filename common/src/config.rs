use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Thermostat hosts; a single string or a list. Absent means discovery.
    #[serde(default, deserialize_with = "one_or_many")]
    pub host: Option<Vec<String>>,
}

impl PlatformConfig {
    pub fn with_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            host: Some(hosts.into_iter().map(Into::into).collect()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<OneOrMany>::deserialize(deserializer)?;
    Ok(value.map(|hosts| match hosts {
        OneOrMany::One(host) => vec![host],
        OneOrMany::Many(hosts) => hosts,
    }))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Absent keeps the platform on; an explicit `null` turns it off.
    #[serde(default = "enabled_platform")]
    pub sensor: Option<PlatformConfig>,
    #[serde(default = "enabled_platform")]
    pub binary_sensor: Option<PlatformConfig>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn enabled_platform() -> Option<PlatformConfig> {
    Some(PlatformConfig::default())
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_http_timeout_ms() -> u64 {
    5_000
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            sensor: enabled_platform(),
            binary_sensor: enabled_platform(),
            poll_interval_secs: default_poll_interval_secs(),
            http_timeout_ms: default_http_timeout_ms(),
            bind: default_bind(),
        }
    }
}

impl BridgeConfig {
    pub fn sanitize(&mut self) {
        self.poll_interval_secs = self.poll_interval_secs.clamp(1, 3_600);
        self.http_timeout_ms = self.http_timeout_ms.clamp(250, 60_000);
    }

    /// Applies `RADIOTHERM_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(hosts) = lookup("RADIOTHERM_HOSTS") {
            let hosts: Vec<String> = hosts
                .split(',')
                .map(str::trim)
                .filter(|host| !host.is_empty())
                .map(str::to_string)
                .collect();
            if !hosts.is_empty() {
                self.sensor = Some(PlatformConfig::with_hosts(hosts.clone()));
                self.binary_sensor = Some(PlatformConfig::with_hosts(hosts));
            }
        }

        if let Some(bind) = lookup("RADIOTHERM_BIND") {
            self.bind = bind;
        }

        if let Some(secs) = lookup("RADIOTHERM_POLL_SECS").and_then(|v| v.parse::<u64>().ok()) {
            self.poll_interval_secs = secs;
        }
    }
}
