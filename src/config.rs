use anyhow::{Context, Result};
use chrono::NaiveTime;
use std::env;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::optimizer::SearchBudget;
use crate::engine::retry::{Backoff, RetryPolicy};
use crate::engine::route_builder::RouteSettings;
use crate::engine::state_machine::TransitionPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    pub host: String,
    pub port: u16,

    pub scheduler: SchedulerConfig,

    pub conflict_retry: RetryPolicy,

    pub whitelist_enabled: bool,
    pub whitelist_ips: Vec<IpAddr>,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub policy: TransitionPolicy,
    pub route: RouteSettings,
    pub store_timeout: Duration,
    pub search_budget: SearchBudget,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: TransitionPolicy::Permissive,
            route: RouteSettings::default(),
            store_timeout: Duration::from_secs(5),
            search_budget: SearchBudget::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let strict: bool = parse_var("STRICT_TRANSITIONS", false)?;
        let day_start = match env::var("DAY_START") {
            Ok(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M")
                .with_context(|| format!("DAY_START must be HH:MM, got '{}'", raw))?,
            Err(_) => RouteSettings::default().day_start,
        };

        let scheduler = SchedulerConfig {
            policy: if strict {
                TransitionPolicy::Strict
            } else {
                TransitionPolicy::Permissive
            },
            route: RouteSettings {
                average_speed_mph: parse_var("AVERAGE_SPEED_MPH", 30.0)?,
                day_start,
            },
            store_timeout: Duration::from_millis(parse_var("STORE_TIMEOUT_MS", 5_000)?),
            search_budget: SearchBudget {
                max_iterations: parse_var("OPTIMIZER_MAX_ITERATIONS", 10_000)?,
                time_limit: Duration::from_millis(parse_var("OPTIMIZER_TIME_LIMIT_MS", 250)?),
            },
        };

        if scheduler.route.average_speed_mph <= 0.0 {
            anyhow::bail!("AVERAGE_SPEED_MPH must be positive");
        }

        let whitelist_ips = env::var("WHITELIST_IPS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|s| s.trim().parse::<IpAddr>().ok())
            .collect();

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", 3296)?,
            scheduler,
            conflict_retry: RetryPolicy {
                max_attempts: parse_var("CONFLICT_RETRY_ATTEMPTS", 3)?,
                backoff: Backoff::Exponential,
                initial_delay_ms: parse_var("CONFLICT_RETRY_DELAY_MS", 25)?,
            },
            whitelist_enabled: parse_var("WHITELIST_ENABLED", false)?,
            whitelist_ips,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}
