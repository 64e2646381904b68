// Service exports
pub mod cache;
pub mod lease;
pub mod memory;
pub mod openai;
pub mod postgres;
pub mod traits;

pub use cache::{CachedScorer, ScoreCacheStats};
pub use lease::{LeaseError, LocalLease, RedisLease};
pub use memory::{InMemoryGateway, InMemoryStore};
pub use openai::{OpenAiError, OpenAiScorer};
pub use postgres::{PostgresClient, PostgresError};
pub use traits::{DataGateway, QualitativeScorer, ResultStore, RunLease};
