//! Engine configuration, read from `REPLENISH_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use replenish_alerts::ReactivationPolicy;
use replenish_observability::LogFormat;

pub const ENV_ALERT_INTERVAL_SECS: &str = "REPLENISH_ALERT_INTERVAL_SECS";
pub const ENV_RUN_ON_START: &str = "REPLENISH_RUN_ON_START";
pub const ENV_REACTIVATION: &str = "REPLENISH_REACTIVATION";
pub const ENV_PO_PREFIX: &str = "REPLENISH_PO_PREFIX";
pub const ENV_PO_NUMBER_ATTEMPTS: &str = "REPLENISH_PO_NUMBER_ATTEMPTS";
pub const ENV_NOTIFICATION_CAPACITY: &str = "REPLENISH_NOTIFICATION_CAPACITY";
pub const ENV_LOG_FORMAT: &str = "REPLENISH_LOG_FORMAT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Period of the background alert evaluation.
    pub alert_interval: Duration,
    /// Run one evaluation pass as soon as the scheduler starts.
    pub run_on_start: bool,
    pub reactivation: ReactivationPolicy,
    pub order_number_prefix: String,
    /// Order-number generation attempts before a uniqueness conflict is surfaced.
    pub order_number_attempts: u32,
    /// Per-subscriber buffer of the notification channel.
    pub notification_capacity: usize,
    pub log_format: LogFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alert_interval: Duration::from_secs(60),
            run_on_start: true,
            reactivation: ReactivationPolicy::Unconditional,
            order_number_prefix: "PO".to_string(),
            order_number_attempts: 3,
            notification_capacity: 256,
            log_format: LogFormat::Json,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Missing keys keep their default;
    /// malformed values are logged and also keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(secs) = parse::<u64, _>(&lookup, ENV_ALERT_INTERVAL_SECS) {
            if secs == 0 {
                warn!(key = ENV_ALERT_INTERVAL_SECS, "interval must be positive; using default");
            } else {
                cfg.alert_interval = Duration::from_secs(secs);
            }
        }
        if let Some(run) = parse_bool(&lookup, ENV_RUN_ON_START) {
            cfg.run_on_start = run;
        }
        if let Some(policy) = parse::<ReactivationPolicy, _>(&lookup, ENV_REACTIVATION) {
            cfg.reactivation = policy;
        }
        if let Some(prefix) = lookup(ENV_PO_PREFIX) {
            let prefix = prefix.trim();
            if prefix.is_empty() {
                warn!(key = ENV_PO_PREFIX, "empty order number prefix; using default");
            } else {
                cfg.order_number_prefix = prefix.to_string();
            }
        }
        if let Some(attempts) = parse::<u32, _>(&lookup, ENV_PO_NUMBER_ATTEMPTS) {
            cfg.order_number_attempts = attempts.max(1);
        }
        if let Some(capacity) = parse::<usize, _>(&lookup, ENV_NOTIFICATION_CAPACITY) {
            cfg.notification_capacity = capacity.max(1);
        }
        if let Some(format) = parse::<LogFormat, _>(&lookup, ENV_LOG_FORMAT) {
            cfg.log_format = format;
        }

        cfg
    }
}

fn parse<T, F>(lookup: &F, key: &'static str) -> Option<T>
where
    T: FromStr,
    T::Err: core::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "ignoring malformed setting");
            None
        }
    }
}

fn parse_bool<F>(lookup: &F, key: &'static str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(key, value = %raw, "ignoring malformed setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> EngineConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        assert_eq!(from(&[]), EngineConfig::default());
        assert_eq!(EngineConfig::default().alert_interval, Duration::from_secs(60));
    }

    #[test]
    fn reads_every_setting() {
        let cfg = from(&[
            (ENV_ALERT_INTERVAL_SECS, "15"),
            (ENV_RUN_ON_START, "no"),
            (ENV_REACTIVATION, "worse_than_resolution"),
            (ENV_PO_PREFIX, "REQ"),
            (ENV_PO_NUMBER_ATTEMPTS, "5"),
            (ENV_NOTIFICATION_CAPACITY, "32"),
            (ENV_LOG_FORMAT, "pretty"),
        ]);
        assert_eq!(cfg.alert_interval, Duration::from_secs(15));
        assert!(!cfg.run_on_start);
        assert_eq!(cfg.reactivation, ReactivationPolicy::WorseThanResolution);
        assert_eq!(cfg.order_number_prefix, "REQ");
        assert_eq!(cfg.order_number_attempts, 5);
        assert_eq!(cfg.notification_capacity, 32);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn malformed_values_fall_back() {
        let cfg = from(&[
            (ENV_ALERT_INTERVAL_SECS, "soon"),
            (ENV_RUN_ON_START, "maybe"),
            (ENV_REACTIVATION, "never"),
            (ENV_PO_NUMBER_ATTEMPTS, "-1"),
        ]);
        assert_eq!(cfg, EngineConfig::default());
    }
}
