pub mod config;
pub mod core;
pub mod extractors;
pub mod utils;
pub mod wikidata;

pub use config::Configuration;
pub use core::{ExtractionResult, Pipeline, Triplet};
pub use extractors::LlmEntityExtractor;
pub use wikidata::WikidataClient;
