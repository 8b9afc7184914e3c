use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::debug;

use crate::core::types::{CanonicalEntity, RawMention, ResolvedEntity};
use crate::core::KnowledgeBaseClient;

/// Deduplicates raw mentions into canonical entities, resolving ungrounded
/// mentions against the knowledge base along the way.
pub struct EntityResolver<'a> {
    client: &'a dyn KnowledgeBaseClient,
}

impl<'a> EntityResolver<'a> {
    pub fn new(client: &'a dyn KnowledgeBaseClient) -> Self {
        Self { client }
    }

    /// Resolve and merge `mentions` in input order.
    ///
    /// Mentions without an identifier are looked up once per distinct query
    /// text (later duplicates reuse the first answer). Entities sharing a
    /// merge key collapse into one record, keeping first-seen order and
    /// filling only the fields the earlier occurrences left empty. Lookup
    /// failures and empty mention text are skipped, never fatal.
    pub async fn resolve(&self, mentions: Vec<RawMention>) -> Vec<CanonicalEntity> {
        let mut order: Vec<String> = Vec::new();
        let mut merged: HashMap<String, CanonicalEntity> = HashMap::new();
        // Per-run memo so duplicate unresolved mentions cost one lookup.
        let mut lookups: HashMap<String, Option<ResolvedEntity>> = HashMap::new();

        for mention in mentions {
            let mut entity = CanonicalEntity::from(mention);

            if entity.id.is_none() {
                let query = resolution_query(&entity).map(str::to_string);
                if let Some(query) = query {
                    if !lookups.contains_key(&query) {
                        let hit = match self.client.resolve_entity(&query).await {
                            Ok(hit) => hit,
                            Err(err) => {
                                debug!("Failed to resolve entity '{}': {}", query, err);
                                None
                            }
                        };
                        lookups.insert(query.clone(), hit);
                    }

                    if let Some(hit) = lookups.get(&query).and_then(|h| h.as_ref()) {
                        if entity.label.is_none() && !hit.label.is_empty() {
                            entity.label = Some(hit.label.clone());
                        }
                        if !hit.id.is_empty() {
                            entity.id = Some(hit.id.clone());
                        }
                    }
                }
            }

            let Some(key) = entity.merge_key().map(str::to_string) else {
                debug!("Skipping mention with no usable merge key: {:?}", entity);
                continue;
            };

            match merged.entry(key.clone()) {
                Entry::Vacant(slot) => {
                    order.push(key);
                    slot.insert(entity);
                }
                Entry::Occupied(mut slot) => slot.get_mut().fill_gaps(entity),
            }
        }

        order
            .into_iter()
            .filter_map(|key| merged.remove(&key))
            .collect()
    }
}

/// Text sent to the knowledge base for an ungrounded mention: the mention
/// span, falling back to the label when the span is empty.
fn resolution_query(entity: &CanonicalEntity) -> Option<&str> {
    if !entity.mention.is_empty() {
        return Some(&entity.mention);
    }
    entity.label.as_deref().filter(|l| !l.is_empty())
}
