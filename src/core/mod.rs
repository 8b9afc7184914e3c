use anyhow::Result;
use async_trait::async_trait;

pub mod generator;
pub mod pipeline;
pub mod resolver;
pub mod types;

pub use generator::TripletGenerator;
pub use pipeline::Pipeline;
pub use resolver::EntityResolver;
pub use types::{
    CanonicalEntity, ExtractionResult, RawMention, RelationshipCandidate, ResolvedEntity, Triplet,
};

/// Produces raw entity mentions from free text. Implementations may be NLP
/// models, LLM calls, or test stubs; the pipeline only sees this contract.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    /// Must not fail for well-formed non-empty text; may return an empty
    /// sequence when the text mentions nothing recognizable.
    async fn extract(&self, text: &str) -> Result<Vec<RawMention>>;
}

/// Grounds mention text and looks up directional relationships between two
/// grounded identifiers. Caching, rate limiting, and retry policy all live
/// behind this trait.
#[async_trait]
pub trait KnowledgeBaseClient: Send + Sync {
    /// Resolve a mention string to a canonical identifier and label.
    /// `Ok(None)` is a miss, not an error.
    async fn resolve_entity(&self, text: &str) -> Result<Option<ResolvedEntity>>;

    /// Candidate relations holding from `subject_id` to `object_id`, in that
    /// direction only. An empty vec (never an error) means no relation.
    async fn get_relationships(
        &self,
        subject_id: &str,
        object_id: &str,
    ) -> Result<Vec<RelationshipCandidate>>;
}
