//! Engine configuration

use crate::dispatch::DispatcherConfig;
use crate::error::{EngineError, Result};
use crate::network::SwitchConfig;
use cloudlet_shared::defaults;
use std::time::Duration;

/// Configuration for a `MatchingEngine`
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Matching-engine host; `None` derives it from the carrier name
    pub host: Option<String>,
    /// Matching-engine port, also used for calls that pass port 0
    pub port: u16,
    /// Carrier used for host generation and request stamping
    pub carrier_name: Option<String>,
    /// Domain appended to a carrier name to form its DME host
    pub dme_domain: String,
    /// Dispatcher worker count
    pub worker_threads: usize,
    /// Dispatcher queue capacity
    pub queue_capacity: usize,
    /// Location services policy gate
    pub location_enabled: bool,
    /// Network switching kill switch
    pub network_switching_enabled: bool,
    pub switch_timeout: Duration,
    pub active_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: defaults::DME_PORT,
            carrier_name: None,
            dme_domain: defaults::DME_DOMAIN.into(),
            worker_threads: 1,
            queue_capacity: 64,
            location_enabled: true,
            network_switching_enabled: true,
            switch_timeout: Duration::from_millis(defaults::SWITCH_TIMEOUT_MS),
            active_timeout: Duration::from_millis(defaults::ACTIVE_TIMEOUT_MS),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `CLOUDLET_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `CLOUDLET_*` key
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("CLOUDLET_HOST") {
            config.host = Some(host);
        }
        if let Some(carrier) = lookup("CLOUDLET_CARRIER") {
            config.carrier_name = Some(carrier);
        }
        if let Some(port) = lookup("CLOUDLET_PORT") {
            config.port = parse_number("CLOUDLET_PORT", &port)?;
        }
        if let Some(workers) = lookup("CLOUDLET_WORKERS") {
            config.worker_threads = parse_number("CLOUDLET_WORKERS", &workers)?;
        }
        if let Some(enabled) = lookup("CLOUDLET_LOCATION_ENABLED") {
            config.location_enabled = parse_flag("CLOUDLET_LOCATION_ENABLED", &enabled)?;
        }
        if let Some(enabled) = lookup("CLOUDLET_NETWORK_SWITCHING") {
            config.network_switching_enabled = parse_flag("CLOUDLET_NETWORK_SWITCHING", &enabled)?;
        }

        Ok(config)
    }

    pub fn switch_config(&self) -> SwitchConfig {
        SwitchConfig {
            switch_timeout: self.switch_timeout,
            active_timeout: self.active_timeout,
            enabled: self.network_switching_enabled,
            default_descriptor: None,
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            workers: self.worker_threads,
            queue_capacity: self.queue_capacity,
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| EngineError::InvalidArgument(format!("{} is not a valid number: {:?}", key, value)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EngineError::InvalidArgument(format!(
            "{} is not a valid flag: {:?}",
            key, value
        ))),
    }
}
