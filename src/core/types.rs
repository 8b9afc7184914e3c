use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Deserializes missing or blank strings to `None` so the core never has to
/// distinguish "absent" from "empty" downstream.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// A raw entity mention as produced by an extractor: a text span, plus
/// whatever grounding the extractor already knows about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMention {
    pub mention: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "blank_as_none")]
    pub entity_type: Option<String>,
}

impl RawMention {
    pub fn new(mention: impl Into<String>) -> Self {
        Self {
            mention: mention.into(),
            label: None,
            id: None,
            entity_type: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }
}

/// A deduplicated, possibly knowledge-base-grounded entity. Unique per merge
/// key within one pipeline run and immutable once the resolver returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub mention: String,
    pub label: Option<String>,
    pub id: Option<String>,
    pub entity_type: Option<String>,
}

impl From<RawMention> for CanonicalEntity {
    fn from(mention: RawMention) -> Self {
        Self {
            mention: mention.mention,
            label: mention.label,
            id: mention.id,
            entity_type: mention.entity_type,
        }
    }
}

impl CanonicalEntity {
    /// Key the resolver deduplicates on: the knowledge-base identifier when
    /// grounded, otherwise the mention (or label) text. `None` means the
    /// record carries no usable key at all and must be skipped.
    pub fn merge_key(&self) -> Option<&str> {
        if let Some(id) = self.id.as_deref() {
            if !id.is_empty() {
                return Some(id);
            }
        }
        if !self.mention.is_empty() {
            return Some(&self.mention);
        }
        self.label.as_deref().filter(|l| !l.is_empty())
    }

    /// Display text for triplet output: the label when present, the raw
    /// mention text otherwise.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.mention)
    }

    /// Fill only the missing fields from a later duplicate. Populated fields
    /// are never overwritten.
    pub fn fill_gaps(&mut self, incoming: CanonicalEntity) {
        if self.label.is_none() {
            self.label = incoming.label;
        }
        if self.id.is_none() {
            self.id = incoming.id;
        }
        if self.entity_type.is_none() {
            self.entity_type = incoming.entity_type;
        }
    }
}

/// A successful knowledge-base lookup for a mention string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub id: String,
    pub label: String,
}

/// One candidate relation holding from a subject to an object, as reported
/// by the knowledge-base client. Labels may contain duplicates or blanks;
/// an empty id makes the candidate unusable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipCandidate {
    pub id: String,
    pub labels: Vec<String>,
}

impl RelationshipCandidate {
    pub fn new(id: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            id: id.into(),
            labels,
        }
    }
}

/// A grounded subject-predicate-object fact, the pipeline's output unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triplet {
    pub subject: String,
    pub subject_id: String,
    pub subject_type: String,
    pub predicate: String,
    pub predicate_id: String,
    pub object: String,
    pub object_id: String,
    pub object_type: String,
}

/// One pipeline run over one text source, with timing and any non-fatal
/// errors collected along the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub id: String,
    pub source: String,
    pub triplets: Vec<Triplet>,
    pub extracted_at: DateTime<Utc>,
    pub processing_time_seconds: f64,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ExtractionResult {
    pub fn new(source: String, processing_time_seconds: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source,
            triplets: Vec::new(),
            extracted_at: Utc::now(),
            processing_time_seconds,
            errors: Vec::new(),
        }
    }

    pub fn with_triplets(mut self, triplets: Vec<Triplet>) -> Self {
        self.triplets = triplets;
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.errors.push(error);
        self
    }
}
