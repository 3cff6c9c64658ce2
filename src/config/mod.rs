pub mod schema;

pub use schema::{
    CacheConfig, Config, ConversationConfig, ModelsConfig, OrchestratorConfig, RateLimitConfig,
    ReliabilityConfig,
};
