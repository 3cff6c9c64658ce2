//! Configuration schema.
//!
//! The core consumes configuration read-only; loading it from disk or the
//! environment is the embedder's job. Every section and field is
//! serde-defaulted so a partial TOML document deserializes cleanly.

use crate::reliability::{BreakerConfig, RetryPolicy};
use crate::services::ServiceKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub reliability: ReliabilityConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,

    #[serde(default)]
    pub models: ModelsConfig,
}

// ── Rate limiting ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests admitted per user per window.
    #[serde(default = "default_rate_limit")]
    pub max_requests: u32,
    /// Fixed window length in seconds.
    #[serde(default = "default_rate_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_rate_limit(),
            window_secs: default_rate_window_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

// ── Response cache ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: u64,
    /// TTL applied to long responses, which tend to stay useful longer.
    #[serde(default = "default_cache_long_ttl_secs")]
    pub long_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_entries(),
            default_ttl_secs: default_cache_ttl_secs(),
            long_ttl_secs: default_cache_long_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn long_ttl(&self) -> Duration {
        Duration::from_secs(self.long_ttl_secs)
    }
}

// ── Retry + circuit breaker ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    /// Consecutive failures before a breaker trips open.
    #[serde(default = "default_breaker_threshold")]
    pub breaker_failure_threshold: u32,
    /// Seconds an open breaker waits before admitting a probe.
    #[serde(default = "default_breaker_timeout_secs")]
    pub breaker_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Randomize each backoff to 50-100% of its nominal value.
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            breaker_failure_threshold: default_breaker_threshold(),
            breaker_timeout_secs: default_breaker_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl ReliabilityConfig {
    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.breaker_failure_threshold,
            timeout: Duration::from_secs(self.breaker_timeout_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter,
        }
    }
}

// ── Orchestrator ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// How many recent conversation entries to scan for sticky routing.
    #[serde(default = "default_lookback_messages")]
    pub lookback_messages: usize,
    /// Minimum word count before entity detection can route to web search.
    #[serde(default = "default_entity_min_words")]
    pub entity_min_words: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            lookback_messages: default_lookback_messages(),
            entity_min_words: default_entity_min_words(),
        }
    }
}

// ── Conversation store ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Entries kept per user before the oldest are pruned.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// How often idle per-user lock slots are swept, in seconds.
    #[serde(default = "default_lock_sweep_secs")]
    pub lock_sweep_secs: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            lock_sweep_secs: default_lock_sweep_secs(),
        }
    }
}

impl ConversationConfig {
    pub fn lock_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.lock_sweep_secs)
    }
}

// ── Models ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model identifier for the conversational service.
    #[serde(default = "default_conversational_model")]
    pub conversational: String,
    /// Model identifier for the web-augmented service.
    #[serde(default = "default_web_search_model")]
    pub web_search: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// The web service gets its own prompt so it cites its sources.
    #[serde(default = "default_web_system_prompt")]
    pub web_system_prompt: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            conversational: default_conversational_model(),
            web_search: default_web_search_model(),
            system_prompt: default_system_prompt(),
            web_system_prompt: default_web_system_prompt(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ModelsConfig {
    pub fn system_prompt_for(&self, kind: ServiceKind) -> &str {
        match kind {
            ServiceKind::Conversational => &self.system_prompt,
            ServiceKind::WebSearch => &self.web_system_prompt,
        }
    }

    pub fn model_for(&self, kind: ServiceKind) -> &str {
        match kind {
            ServiceKind::Conversational => &self.conversational,
            ServiceKind::WebSearch => &self.web_search,
        }
    }
}

// ── Defaults ──────────────────────────────────────────────────────

fn default_rate_limit() -> u32 {
    10
}

fn default_rate_window_secs() -> u64 {
    60
}

fn default_cache_entries() -> usize {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_long_ttl_secs() -> u64 {
    600
}

fn default_breaker_threshold() -> u32 {
    5
}

fn default_breaker_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_jitter() -> bool {
    true
}

fn default_lookback_messages() -> usize {
    6
}

fn default_entity_min_words() -> usize {
    10
}

fn default_max_history() -> usize {
    50
}

fn default_lock_sweep_secs() -> u64 {
    3600
}

fn default_conversational_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_web_search_model() -> String {
    "sonar-pro".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

fn default_web_system_prompt() -> String {
    "You are a helpful assistant with access to current web information. \
     When providing citations, include source URLs when available."
        .to_string()
}

fn default_max_tokens() -> u32 {
    8000
}
