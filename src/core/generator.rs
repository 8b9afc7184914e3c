use tracing::debug;

use crate::core::types::{CanonicalEntity, RelationshipCandidate, Triplet};
use crate::core::KnowledgeBaseClient;

/// The relation chosen for one ordered entity pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedRelation {
    pub id: String,
    pub label: String,
}

/// Enumerates ordered pairs of canonical entities and picks the best
/// knowledge-base relationship for each.
pub struct TripletGenerator<'a> {
    client: &'a dyn KnowledgeBaseClient,
}

impl<'a> TripletGenerator<'a> {
    pub fn new(client: &'a dyn KnowledgeBaseClient) -> Self {
        Self { client }
    }

    /// Generate triplets over the full ordered cross-product of `entities`,
    /// excluding the diagonal.
    ///
    /// Pairs where either entity is ungrounded, or both share an identifier,
    /// are skipped. Each remaining pair is looked up in subject-to-object
    /// direction only; the reverse direction is its own pair in the
    /// enumeration. A pair with no usable candidate emits nothing, and a
    /// failed lookup counts as no relation rather than aborting the run.
    pub async fn generate(&self, entities: &[CanonicalEntity]) -> Vec<Triplet> {
        let mut triplets = Vec::new();

        for (i, subject) in entities.iter().enumerate() {
            let Some(subject_id) = subject.id.as_deref() else {
                continue;
            };

            for (j, object) in entities.iter().enumerate() {
                if i == j {
                    continue;
                }
                let Some(object_id) = object.id.as_deref() else {
                    continue;
                };
                // Distinct entries can still share an id if an upstream merge
                // missed them; never emit a self-referential triplet.
                if subject_id == object_id {
                    continue;
                }

                let candidates = match self.client.get_relationships(subject_id, object_id).await
                {
                    Ok(candidates) => candidates,
                    Err(err) => {
                        debug!(
                            "Relationship lookup failed for ({}, {}): {}",
                            subject_id, object_id, err
                        );
                        continue;
                    }
                };

                let Some(relation) = select_relationship(&candidates) else {
                    continue;
                };

                triplets.push(Triplet {
                    subject: subject.display_label().to_string(),
                    subject_id: subject_id.to_string(),
                    subject_type: subject.entity_type.clone().unwrap_or_default(),
                    predicate: relation.label,
                    predicate_id: relation.id,
                    object: object.display_label().to_string(),
                    object_id: object_id.to_string(),
                    object_type: object.entity_type.clone().unwrap_or_default(),
                });
            }
        }

        triplets
    }
}

/// Pick the candidate whose shortest usable label has the minimum character
/// length; ties go to the first-encountered candidate. Candidates without a
/// relation id or any usable label are discarded.
pub fn select_relationship(candidates: &[RelationshipCandidate]) -> Option<SelectedRelation> {
    let mut best: Option<(&str, &str)> = None;

    for candidate in candidates {
        if candidate.id.is_empty() {
            continue;
        }
        let Some(label) = shortest_label(&candidate.labels) else {
            continue;
        };
        let shorter = best.map_or(true, |(best_label, _)| {
            label.chars().count() < best_label.chars().count()
        });
        if shorter {
            best = Some((label, candidate.id.as_str()));
        }
    }

    best.map(|(label, id)| SelectedRelation {
        id: id.to_string(),
        label: label.to_string(),
    })
}

/// Shortest non-empty label after trimming; ties go to the first occurrence.
fn shortest_label(labels: &[String]) -> Option<&str> {
    let mut shortest: Option<&str> = None;

    for label in labels {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            continue;
        }
        let shorter = shortest.map_or(true, |current| {
            trimmed.chars().count() < current.chars().count()
        });
        if shorter {
            shortest = Some(trimmed);
        }
    }

    shortest
}
