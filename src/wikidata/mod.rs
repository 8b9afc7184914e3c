use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::WikidataSettings;
use crate::core::{KnowledgeBaseClient, RelationshipCandidate, ResolvedEntity};

#[derive(Debug, Error)]
pub enum WikidataError {
    #[error("Wikidata API returned status {0}")]
    Status(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    id: String,
    #[serde(default)]
    label: String,
}

/// Client for Wikidata entity resolution and relationship discovery over the
/// MediaWiki API. Entity documents and property labels are cached per
/// instance so repeated pair lookups against the same subject stay cheap.
pub struct WikidataClient {
    client: reqwest::Client,
    api_url: String,
    entity_data_url: String,
    language: String,
    entity_cache: Mutex<HashMap<String, Value>>,
    property_label_cache: Mutex<HashMap<String, Vec<String>>>,
}

impl WikidataClient {
    pub fn new(settings: WikidataSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            api_url: settings.api_url,
            entity_data_url: settings.entity_data_url.trim_end_matches('/').to_string(),
            language: settings.language,
            entity_cache: Mutex::new(HashMap::new()),
            property_label_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Top `wbsearchentities` hit for `text`, if any.
    async fn search(&self, text: &str) -> Result<Option<ResolvedEntity>, WikidataError> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "wbsearchentities"),
                ("search", text),
                ("language", &self.language),
                ("format", "json"),
                ("limit", "1"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WikidataError::Status(response.status()));
        }

        let payload: SearchResponse = response.json().await?;
        let Some(top) = payload.search.into_iter().next() else {
            return Ok(None);
        };
        if top.id.is_empty() {
            return Ok(None);
        }

        let label = if top.label.is_empty() {
            text.to_string()
        } else {
            top.label
        };

        Ok(Some(ResolvedEntity { id: top.id, label }))
    }

    /// Full entity document for `qid` from `Special:EntityData`, cached.
    async fn fetch_entity(&self, qid: &str) -> Result<Option<Value>, WikidataError> {
        {
            let cache = self.entity_cache.lock().expect("entity cache poisoned");
            if let Some(entity) = cache.get(qid) {
                return Ok(Some(entity.clone()));
            }
        }

        let url = format!("{}/{}.json", self.entity_data_url, qid);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(WikidataError::Status(response.status()));
        }

        let payload: Value = response.json().await?;
        let entity = payload
            .get("entities")
            .and_then(|entities| entities.get(qid))
            .cloned();

        if let Some(entity) = &entity {
            self.entity_cache
                .lock()
                .expect("entity cache poisoned")
                .insert(qid.to_string(), entity.clone());
        }

        Ok(entity)
    }

    /// Human-readable labels for a property id via `wbgetentities`, cached.
    async fn property_labels(&self, pid: &str) -> Result<Vec<String>, WikidataError> {
        {
            let cache = self
                .property_label_cache
                .lock()
                .expect("property label cache poisoned");
            if let Some(labels) = cache.get(pid) {
                return Ok(labels.clone());
            }
        }

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "wbgetentities"),
                ("ids", pid),
                ("format", "json"),
                ("props", "labels"),
                ("languages", &self.language),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WikidataError::Status(response.status()));
        }

        let payload: Value = response.json().await?;
        let mut collected = Vec::new();
        if let Some(labels) = payload
            .get("entities")
            .and_then(|entities| entities.get(pid))
            .and_then(|entity| entity.get("labels"))
            .and_then(Value::as_object)
        {
            for label in labels.values() {
                if let Some(value) = label.get("value").and_then(Value::as_str) {
                    if !value.is_empty() {
                        collected.push(value.to_string());
                    }
                }
            }
        }

        self.property_label_cache
            .lock()
            .expect("property label cache poisoned")
            .insert(pid.to_string(), collected.clone());

        Ok(collected)
    }
}

/// The QID a claim statement points at, when its main snak holds an entity
/// value. Anything else (novalue/somevalue snaks, literals) is `None`.
fn claim_target_qid(statement: &Value) -> Option<String> {
    let mainsnak = statement.get("mainsnak")?;
    if mainsnak.get("snaktype").and_then(Value::as_str) != Some("value") {
        return None;
    }
    let datavalue = mainsnak.get("datavalue")?;
    if datavalue.get("type").and_then(Value::as_str) != Some("wikibase-entityid") {
        return None;
    }
    let numeric_id = datavalue
        .get("value")
        .and_then(|value| value.get("numeric-id"))
        .and_then(Value::as_u64)?;
    Some(format!("Q{}", numeric_id))
}

#[async_trait]
impl KnowledgeBaseClient for WikidataClient {
    async fn resolve_entity(&self, text: &str) -> Result<Option<ResolvedEntity>> {
        if text.is_empty() {
            return Ok(None);
        }
        Ok(self.search(text).await?)
    }

    async fn get_relationships(
        &self,
        subject_id: &str,
        object_id: &str,
    ) -> Result<Vec<RelationshipCandidate>> {
        if subject_id.is_empty() || object_id.is_empty() {
            return Ok(Vec::new());
        }

        let Some(entity) = self.fetch_entity(subject_id).await? else {
            debug!("No entity document for {}", subject_id);
            return Ok(Vec::new());
        };

        let Some(claims) = entity.get("claims").and_then(Value::as_object) else {
            return Ok(Vec::new());
        };

        let mut results = Vec::new();
        for (pid, statements) in claims {
            let Some(statements) = statements.as_array() else {
                continue;
            };

            for statement in statements {
                let Some(target_qid) = claim_target_qid(statement) else {
                    continue;
                };
                if target_qid != object_id {
                    continue;
                }

                let mut labels = self.property_labels(pid).await?;
                if labels.is_empty() {
                    // Better a bare property id than an unlabeled relation.
                    labels = vec![pid.clone()];
                }

                results.push(RelationshipCandidate::new(pid.clone(), labels));
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::*;

    fn settings_for(server: &mockito::Server) -> WikidataSettings {
        WikidataSettings {
            api_url: format!("{}/w/api.php", server.url()),
            entity_data_url: format!("{}/wiki/Special:EntityData", server.url()),
            language: "en".to_string(),
            user_agent: "wikidata_triplet_extractor-tests/1.0".to_string(),
            timeout_seconds: 5,
        }
    }

    #[tokio::test]
    async fn test_resolve_entity_returns_top_hit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/w/api.php")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "wbsearchentities".into()),
                Matcher::UrlEncoded("search".into(), "Alan Turing".into()),
                Matcher::UrlEncoded("limit".into(), "1".into()),
            ]))
            .with_body(
                json!({
                    "search": [
                        {"id": "Q7251", "label": "Alan Turing"},
                        {"id": "Q1234", "label": "Alan Turing (film)"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = WikidataClient::new(settings_for(&server)).unwrap();
        let resolved = client.resolve_entity("Alan Turing").await.unwrap().unwrap();

        assert_eq!(resolved.id, "Q7251");
        assert_eq!(resolved.label, "Alan Turing");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_resolve_entity_miss_and_empty_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/w/api.php")
            .match_query(Matcher::Any)
            .with_body(json!({"search": []}).to_string())
            .create_async()
            .await;

        let client = WikidataClient::new(settings_for(&server)).unwrap();

        assert!(client.resolve_entity("Zzyzx").await.unwrap().is_none());
        assert!(client.resolve_entity("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_relationships_matches_object_claims() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/wiki/Special:EntityData/Q7251.json")
            .with_body(
                json!({
                    "entities": {
                        "Q7251": {
                            "claims": {
                                "P27": [{
                                    "mainsnak": {
                                        "snaktype": "value",
                                        "datavalue": {
                                            "type": "wikibase-entityid",
                                            "value": {"numeric-id": 145}
                                        }
                                    }
                                }],
                                "P19": [{
                                    "mainsnak": {
                                        "snaktype": "value",
                                        "datavalue": {
                                            "type": "wikibase-entityid",
                                            "value": {"numeric-id": 122744}
                                        }
                                    }
                                }],
                                "P569": [{
                                    "mainsnak": {
                                        "snaktype": "value",
                                        "datavalue": {
                                            "type": "time",
                                            "value": {"time": "+1912-06-23T00:00:00Z"}
                                        }
                                    }
                                }]
                            }
                        }
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/w/api.php")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "wbgetentities".into()),
                Matcher::UrlEncoded("ids".into(), "P27".into()),
            ]))
            .with_body(
                json!({
                    "entities": {
                        "P27": {
                            "labels": {
                                "en": {"language": "en", "value": "country of citizenship"}
                            }
                        }
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = WikidataClient::new(settings_for(&server)).unwrap();
        let candidates = client.get_relationships("Q7251", "Q145").await.unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "P27");
        assert_eq!(candidates[0].labels, vec!["country of citizenship".to_string()]);
    }

    #[tokio::test]
    async fn test_get_relationships_falls_back_to_pid_when_unlabeled() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/wiki/Special:EntityData/Q1.json")
            .with_body(
                json!({
                    "entities": {
                        "Q1": {
                            "claims": {
                                "P9999": [{
                                    "mainsnak": {
                                        "snaktype": "value",
                                        "datavalue": {
                                            "type": "wikibase-entityid",
                                            "value": {"numeric-id": 2}
                                        }
                                    }
                                }]
                            }
                        }
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/w/api.php")
            .match_query(Matcher::Any)
            .with_body(json!({"entities": {"P9999": {"labels": {}}}}).to_string())
            .create_async()
            .await;

        let client = WikidataClient::new(settings_for(&server)).unwrap();
        let candidates = client.get_relationships("Q1", "Q2").await.unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].labels, vec!["P9999".to_string()]);
    }

    #[tokio::test]
    async fn test_entity_documents_are_cached_per_instance() {
        let mut server = mockito::Server::new_async().await;
        let entity_mock = server
            .mock("GET", "/wiki/Special:EntityData/Q1.json")
            .with_body(json!({"entities": {"Q1": {"claims": {}}}}).to_string())
            .expect(1)
            .create_async()
            .await;

        let client = WikidataClient::new(settings_for(&server)).unwrap();
        assert!(client.get_relationships("Q1", "Q2").await.unwrap().is_empty());
        assert!(client.get_relationships("Q1", "Q3").await.unwrap().is_empty());

        entity_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_blank_identifiers_yield_no_candidates() {
        let server = mockito::Server::new_async().await;
        let client = WikidataClient::new(settings_for(&server)).unwrap();

        assert!(client.get_relationships("", "Q2").await.unwrap().is_empty());
        assert!(client.get_relationships("Q1", "").await.unwrap().is_empty());
    }
}
