use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::core::types::{ExtractionResult, Triplet};
use crate::core::{EntityExtractor, EntityResolver, KnowledgeBaseClient, TripletGenerator};

/// The triplet-generation pipeline: mention extraction, entity resolution,
/// then pairwise relationship selection.
///
/// Constructed explicitly with its collaborators; holds no hidden state and
/// retains nothing across calls beyond whatever the knowledge-base client
/// caches internally.
pub struct Pipeline {
    extractor: Box<dyn EntityExtractor>,
    kb_client: Box<dyn KnowledgeBaseClient>,
}

impl Pipeline {
    pub fn new(extractor: Box<dyn EntityExtractor>, kb_client: Box<dyn KnowledgeBaseClient>) -> Self {
        Self {
            extractor,
            kb_client,
        }
    }

    /// Return the subject-predicate-object triplets discovered in `text`.
    ///
    /// Fails only when mention extraction itself fails; resolution misses and
    /// absent relationships simply reduce the output.
    pub async fn generate_triplets(&self, text: &str) -> Result<Vec<Triplet>> {
        let mentions = self
            .extractor
            .extract(text)
            .await
            .context("Entity extraction failed")?;
        if mentions.is_empty() {
            debug!("No mentions extracted, nothing to resolve");
            return Ok(Vec::new());
        }

        let entities = EntityResolver::new(self.kb_client.as_ref())
            .resolve(mentions)
            .await;
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Resolved {} canonical entities", entities.len());

        Ok(TripletGenerator::new(self.kb_client.as_ref())
            .generate(&entities)
            .await)
    }

    /// Run the pipeline over one text source, wrapping the outcome with run
    /// metadata. Extraction failures are recorded on the result instead of
    /// propagating.
    pub async fn run(&self, source: &str, text: &str) -> ExtractionResult {
        let start_time = Instant::now();

        info!("Starting triplet extraction for: {}", source);

        match self.generate_triplets(text).await {
            Ok(triplets) => {
                let processing_time = start_time.elapsed().as_secs_f64();
                info!(
                    "Extraction completed: {} triplets in {:.2}s",
                    triplets.len(),
                    processing_time
                );
                ExtractionResult::new(source.to_string(), processing_time).with_triplets(triplets)
            }
            Err(e) => {
                let error_msg = format!("Triplet generation failed: {}", e);
                warn!("{}", error_msg);
                let processing_time = start_time.elapsed().as_secs_f64();
                ExtractionResult::new(source.to_string(), processing_time).with_error(error_msg)
            }
        }
    }
}
