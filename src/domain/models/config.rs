use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::agent::Persona;

/// Main configuration structure for cadre
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Fleet composition
    #[serde(default)]
    pub fleet: FleetConfig,

    /// Scheduling and timeout policy
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Context cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Issue synchronizer policy
    #[serde(default)]
    pub sync: SyncConfig,

    /// Remote issue tracker connection
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fleet: FleetConfig::default(),
            scheduler: SchedulerConfig::default(),
            cache: CacheConfig::default(),
            sync: SyncConfig::default(),
            tracker: TrackerConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Number of agents to spawn per persona
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FleetConfig {
    #[serde(default = "default_agents")]
    pub agents: BTreeMap<Persona, usize>,
}

fn default_agents() -> BTreeMap<Persona, usize> {
    BTreeMap::from([
        (Persona::Architect, 1),
        (Persona::Developer, 2),
        (Persona::Qa, 1),
    ])
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            agents: default_agents(),
        }
    }
}

impl FleetConfig {
    pub fn total_agents(&self) -> usize {
        self.agents.values().sum()
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Seconds an agent may hold a task before it is reclaimed
    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,

    /// How often the runner re-polls for ready work
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

const fn default_agent_timeout_secs() -> u64 {
    1800
}

const fn default_poll_interval_ms() -> u64 {
    250
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            agent_timeout_secs: default_agent_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Context cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

/// Issue synchronizer retry and sampling policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Attempts per remote call before the event is deferred
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Number of recent calls averaged into the latency figure
    #[serde(default = "default_latency_window")]
    pub latency_window: usize,

    /// Deferred events beyond this are dropped oldest-first
    #[serde(default = "default_max_deferred")]
    pub max_deferred: usize,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    200
}

const fn default_max_backoff_ms() -> u64 {
    5_000
}

const fn default_latency_window() -> usize {
    50
}

const fn default_max_deferred() -> usize {
    1_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            latency_window: default_latency_window(),
            max_deferred: default_max_deferred(),
        }
    }
}

/// GitHub issue tracker connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TrackerConfig {
    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub repo: String,

    /// Environment variable holding the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Requests per hour allowed by the rate limiter
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u32,
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

const fn default_requests_per_hour() -> u32 {
    4_000
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            token_env: default_token_env(),
            api_base: default_api_base(),
            requests_per_hour: default_requests_per_hour(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".cadre/cadre.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    Daily,
    Hourly,
    Never,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::Daily
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Directory for rolling log files; console only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}
