//! Poll scheduler standing in for the host platform.
//!
//! A tokio interval drives the ticks. The device client blocks, so setup and
//! every cycle run under `spawn_blocking`. Within a cycle each host gets one
//! scoped worker thread that updates that host's entities in turn.

use std::{collections::BTreeMap, sync::Arc, thread, time::Duration};

use chrono::Utc;
use tokio::{sync::RwLock, time::MissedTickBehavior};
use tracing::{debug, error, info};

use radiotherm_common::{
    monotonic_ms, poll_entity, setup_platform, update_before_add, BridgeConfig, Connector,
    Discovery, NoDiscovery, Platform, StateCache, ThermostatEntity,
};

use crate::{http::HttpConnector, status::StatusBoard};

type EntityGroup<'a> = Vec<&'a mut Box<dyn ThermostatEntity>>;

pub struct Poller {
    cache: Arc<StateCache>,
    entities: Vec<Box<dyn ThermostatEntity>>,
}

impl Poller {
    pub fn new(config: &BridgeConfig, discovery: &dyn Discovery, connector: &dyn Connector) -> Self {
        let cache = Arc::new(StateCache::new());
        let entities = register_entities(config, discovery, connector, &cache);
        info!("registered {} radiotherm entities", entities.len());
        Self { cache, entities }
    }

    /// Runs one poll cycle and publishes it. Blocks; call off the async runtime.
    pub fn tick(&mut self, board: &RwLock<StatusBoard>) -> usize {
        let available = poll_cycle(&mut self.entities);
        board
            .blocking_write()
            .publish(&self.entities, &self.cache, monotonic_ms(), Utc::now());
        available
    }
}

pub fn spawn(config: BridgeConfig, board: Arc<RwLock<StatusBoard>>) {
    tokio::spawn(async move {
        let poll_interval = Duration::from_secs(config.poll_interval_secs);
        let timeout = Duration::from_millis(config.http_timeout_ms);

        let setup = tokio::task::spawn_blocking(move || -> anyhow::Result<Poller> {
            let connector = HttpConnector::new(timeout)?;
            Ok(Poller::new(&config, &NoDiscovery, &connector))
        })
        .await;
        let mut poller = match setup {
            Ok(Ok(poller)) => poller,
            Ok(Err(err)) => {
                error!("poller not started: {err:#}");
                return;
            }
            Err(err) => {
                error!("poller setup task failed: {err}");
                return;
            }
        };

        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let board = board.clone();
            let cycle = tokio::task::spawn_blocking(move || {
                let available = poller.tick(&board);
                (poller, available)
            })
            .await;

            match cycle {
                Ok((returned, available)) => {
                    poller = returned;
                    debug!(available, "poll cycle finished");
                }
                Err(err) => {
                    error!("poll cycle task failed: {err}");
                    return;
                }
            }
        }
    });
}

/// Builds the entities of every enabled platform and polls each once before
/// handing them back.
pub fn register_entities(
    config: &BridgeConfig,
    discovery: &dyn Discovery,
    connector: &dyn Connector,
    cache: &Arc<StateCache>,
) -> Vec<Box<dyn ThermostatEntity>> {
    let platforms = [
        (Platform::Sensor, config.sensor.as_ref()),
        (Platform::BinarySensor, config.binary_sensor.as_ref()),
    ];

    platforms
        .into_iter()
        .filter_map(|(platform, platform_config)| Some((platform, platform_config?)))
        .flat_map(|(platform, platform_config)| {
            let mut entities =
                setup_platform(platform, platform_config, discovery, connector, cache);
            update_before_add(&mut entities);
            entities
        })
        .collect()
}

fn group_by_host(entities: &mut [Box<dyn ThermostatEntity>]) -> Vec<EntityGroup<'_>> {
    let mut groups: BTreeMap<String, EntityGroup<'_>> = BTreeMap::new();
    for entity in entities.iter_mut() {
        let host = entity.host().to_string();
        groups.entry(host).or_default().push(entity);
    }
    groups.into_values().collect()
}

/// Updates all entities, one worker per host; returns how many are available.
pub fn poll_cycle(entities: &mut [Box<dyn ThermostatEntity>]) -> usize {
    let groups = group_by_host(entities);
    thread::scope(|scope| {
        let workers: Vec<_> = groups
            .into_iter()
            .map(|group| {
                scope.spawn(move || {
                    group
                        .into_iter()
                        .map(|entity| poll_entity(entity.as_mut()))
                        .filter(|available| *available)
                        .count()
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().unwrap_or(0))
            .sum()
    })
}
