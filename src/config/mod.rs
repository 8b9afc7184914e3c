use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub wikidata: WikidataSettings,
    pub llm: LlmSettings,
    #[serde(default)]
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikidataSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_entity_data_url")]
    pub entity_data_url: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_wikidata_timeout")]
    pub timeout_seconds: u64,
}

impl Default for WikidataSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            entity_data_url: default_entity_data_url(),
            language: default_language(),
            user_agent: default_user_agent(),
            timeout_seconds: default_wikidata_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Json,
    JsonLines,
    Csv,
}

fn default_api_url() -> String {
    "https://www.wikidata.org/w/api.php".to_string()
}
fn default_entity_data_url() -> String {
    "https://www.wikidata.org/wiki/Special:EntityData".to_string()
}
fn default_language() -> String {
    "en".to_string()
}
fn default_user_agent() -> String {
    "WikidataTripletExtractor/1.0".to_string()
}
fn default_wikidata_timeout() -> u64 {
    10
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_llm_timeout() -> u64 {
    120
}

impl Configuration {
    /// Load configuration from a YAML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.wikidata.api_url)
            .with_context(|| format!("Invalid Wikidata API URL: {}", self.wikidata.api_url))?;
        Url::parse(&self.wikidata.entity_data_url).with_context(|| {
            format!(
                "Invalid Wikidata entity data URL: {}",
                self.wikidata.entity_data_url
            )
        })?;
        Url::parse(&self.llm.base_url)
            .with_context(|| format!("Invalid LLM server URL: {}", self.llm.base_url))?;

        if self.wikidata.language.is_empty() {
            anyhow::bail!("No Wikidata language configured");
        }
        if self.llm.model.is_empty() {
            anyhow::bail!("No LLM model configured");
        }

        Ok(())
    }

    /// Create an example configuration
    pub fn example() -> Self {
        Configuration {
            name: "Example Triplet Extraction Config".to_string(),
            description: "Generate Wikidata-grounded triplets from plain text".to_string(),
            wikidata: WikidataSettings::default(),
            llm: LlmSettings {
                base_url: "http://localhost:8000".to_string(),
                api_key: None,
                model: "Qwen/Qwen2.5-32B-Instruct".to_string(),
                temperature: 0.2,
                max_tokens: 2048,
                timeout_seconds: 120,
            },
            output_format: OutputFormat::Json,
        }
    }
}
