use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{error, warn};

use wikidata_triplet_extractor::{
    config::{Configuration, LlmSettings, OutputFormat, WikidataSettings},
    core::{generator::select_relationship, KnowledgeBaseClient, Pipeline, Triplet},
    extractors::LlmEntityExtractor,
    utils::{validate_triplets, TripletSerializer},
    wikidata::WikidataClient,
};

#[derive(Parser)]
#[command(
    name = "wikidata_triplet_extractor",
    about = "Generate Wikidata-grounded subject-predicate-object triplets from free text",
    long_about = None,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract grounded triplets from text files
    Extract {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,

        /// Input text files (UTF-8)
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        /// Output file path; prints to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (overrides config)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormatArg>,

        /// LLM server URL (overrides config)
        #[arg(long)]
        server_url: Option<String>,

        /// API key for the LLM server (overrides config)
        #[arg(long, env = "LLM_API_KEY")]
        api_key: Option<String>,

        /// Model to use (overrides config)
        #[arg(long)]
        model: Option<String>,

        /// Wikidata language code (overrides config)
        #[arg(long)]
        language: Option<String>,

        /// Combine triplets from all inputs into one output
        #[arg(long)]
        merge: bool,

        /// Check triplet invariants before writing output
        #[arg(long)]
        validate: bool,
    },

    /// Resolve a single mention string against Wikidata
    Resolve {
        /// Mention text to resolve
        #[arg(short, long)]
        text: String,

        /// Wikidata language code
        #[arg(long, default_value = "en")]
        language: String,
    },

    /// List relationship candidates between two Wikidata items
    Relations {
        /// Subject QID
        #[arg(short, long)]
        subject: String,

        /// Object QID
        #[arg(short, long)]
        object: String,

        /// Wikidata language code
        #[arg(long, default_value = "en")]
        language: String,
    },

    /// Validate configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Check LLM server status
    CheckServer {
        /// LLM server URL
        #[arg(long, default_value = "http://localhost:8000")]
        server_url: String,

        /// API key for the LLM server
        #[arg(long, env = "LLM_API_KEY")]
        api_key: Option<String>,
    },

    /// Generate example configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long)]
        output: PathBuf,

        /// Configuration format (yaml or json)
        #[arg(short, long, default_value = "yaml")]
        format: ConfigFormat,
    },
}

#[derive(clap::ValueEnum, Clone)]
enum OutputFormatArg {
    Json,
    JsonLines,
    Csv,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(format: OutputFormatArg) -> Self {
        match format {
            OutputFormatArg::Json => Self::Json,
            OutputFormatArg::JsonLines => Self::JsonLines,
            OutputFormatArg::Csv => Self::Csv,
        }
    }
}

#[derive(clap::ValueEnum, Clone)]
enum ConfigFormat {
    Yaml,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Extract {
            config,
            input,
            output,
            format,
            server_url,
            api_key,
            model,
            language,
            merge,
            validate,
        } => {
            extract_command(
                config, input, output, format, server_url, api_key, model, language, merge,
                validate,
            )
            .await
        }
        Commands::Resolve { text, language } => resolve_command(text, language).await,
        Commands::Relations {
            subject,
            object,
            language,
        } => relations_command(subject, object, language).await,
        Commands::Validate { config } => validate_command(config).await,
        Commands::CheckServer {
            server_url,
            api_key,
        } => check_server_command(server_url, api_key).await,
        Commands::GenerateConfig { output, format } => {
            generate_config_command(output, format).await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn extract_command(
    config_path: PathBuf,
    input: Vec<PathBuf>,
    output: Option<PathBuf>,
    format: Option<OutputFormatArg>,
    server_url: Option<String>,
    api_key: Option<String>,
    model_override: Option<String>,
    language: Option<String>,
    merge: bool,
    validate: bool,
) -> Result<()> {
    println!("{}", "Starting triplet extraction...".bright_blue().bold());

    // Load configuration
    let mut config = Configuration::from_file(&config_path)?;

    // Override settings if provided
    if let Some(url) = server_url {
        config.llm.base_url = url;
    }
    if let Some(key) = api_key {
        config.llm.api_key = Some(key);
    }
    if let Some(model) = model_override {
        config.llm.model = model;
    }
    if let Some(language) = language {
        config.wikidata.language = language;
    }
    config.validate()?;

    let output_format = format.map(Into::into).unwrap_or(config.output_format.clone());

    println!(" Configuration: {}", config.name.bright_green());
    println!(" Model: {}", config.llm.model);
    println!(" Inputs: {}", input.len());

    // Create collaborators
    let extractor = LlmEntityExtractor::new(config.llm.clone())?;

    // Check LLM server health before doing any work
    if !extractor.check_health().await? {
        error!(" LLM server is not responding at {}", config.llm.base_url);
        return Err(anyhow::anyhow!("LLM server health check failed"));
    }
    println!(" LLM server is healthy");

    let kb_client = WikidataClient::new(config.wikidata.clone())?;
    let pipeline = Pipeline::new(Box::new(extractor), Box::new(kb_client));

    // Process inputs
    let progress = ProgressBar::new(input.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let mut results = Vec::new();
    for path in &input {
        progress.set_message(path.display().to_string());
        let text = tokio::fs::read_to_string(path).await?;
        results.push(pipeline.run(&path.display().to_string(), &text).await);
        progress.inc(1);
    }
    progress.finish_and_clear();

    let mut has_errors = false;
    for result in &results {
        if !result.errors.is_empty() {
            has_errors = true;
            warn!(" Errors in {}: {}", result.source, result.errors.join(", "));
        }
    }

    // Validate triplets if requested
    if validate {
        for result in &results {
            let issues = validate_triplets(&result.triplets);
            if !issues.is_empty() {
                warn!(" Validation issues in {}: {}", result.source, issues.join(", "));
            }
        }
    }

    // Serialize and write output
    let serializer = TripletSerializer::new();
    if merge || results.len() == 1 {
        let triplets: Vec<Triplet> = results
            .iter()
            .flat_map(|r| r.triplets.iter().cloned())
            .collect();
        let serialized = serializer.serialize(&triplets, &output_format)?;
        write_output(&serialized, output.as_deref()).await?;
    } else {
        for (i, result) in results.iter().enumerate() {
            let serialized = serializer.serialize(&result.triplets, &output_format)?;
            let final_path = output.as_ref().map(|path| numbered_path(path, i + 1));
            write_output(&serialized, final_path.as_deref()).await?;
        }
    }

    // Summary
    let total_triplets: usize = results.iter().map(|r| r.triplets.len()).sum();
    let total_time: f64 = results.iter().map(|r| r.processing_time_seconds).sum();

    println!("\n{}", " Extraction Summary".bright_green().bold());
    println!(
        " Total triplets: {}",
        total_triplets.to_string().bright_cyan()
    );
    println!(" Total processing time: {:.2}s", total_time);

    if has_errors {
        println!(" {} completed with some errors", "Extraction".bright_yellow());
    } else {
        println!(" {} completed successfully!", "Extraction".bright_green());
    }

    Ok(())
}

async fn write_output(serialized: &str, output: Option<&std::path::Path>) -> Result<()> {
    match output {
        Some(path) => {
            tokio::fs::write(path, serialized).await?;
            println!(
                " Output written to: {}",
                path.display().to_string().bright_green()
            );
        }
        None => println!("{}", serialized),
    }
    Ok(())
}

fn numbered_path(path: &std::path::Path, index: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    match path.extension().and_then(|s| s.to_str()) {
        Some(extension) => path.with_file_name(format!("{}_{}.{}", stem, index, extension)),
        None => path.with_file_name(format!("{}_{}", stem, index)),
    }
}

async fn resolve_command(text: String, language: String) -> Result<()> {
    println!("{}", "Resolving against Wikidata...".bright_blue().bold());

    let client = WikidataClient::new(WikidataSettings {
        language,
        ..Default::default()
    })?;

    match client.resolve_entity(&text).await? {
        Some(resolved) => {
            println!(
                " {} -> {} ({})",
                text,
                resolved.label.bright_green(),
                resolved.id.bright_cyan()
            );
        }
        None => println!(" No Wikidata entity found for '{}'", text.bright_yellow()),
    }

    Ok(())
}

async fn relations_command(subject: String, object: String, language: String) -> Result<()> {
    println!(
        "{}",
        format!("Relationships {} -> {}", subject, object)
            .bright_blue()
            .bold()
    );

    let client = WikidataClient::new(WikidataSettings {
        language,
        ..Default::default()
    })?;

    let candidates = client.get_relationships(&subject, &object).await?;
    if candidates.is_empty() {
        println!(" No relationships found");
        return Ok(());
    }

    for candidate in &candidates {
        println!(
            " {} [{}]",
            candidate.id.bright_cyan(),
            candidate.labels.join(", ")
        );
    }

    if let Some(selected) = select_relationship(&candidates) {
        println!(
            "\n Would select: {} ({})",
            selected.label.bright_green(),
            selected.id.bright_cyan()
        );
    }

    Ok(())
}

async fn validate_command(config_path: PathBuf) -> Result<()> {
    println!("{}", " Validating configuration...".bright_blue().bold());

    match Configuration::from_file(&config_path) {
        Ok(config) => match config.validate() {
            Ok(()) => {
                println!(" Configuration is valid!");
                println!(" Name: {}", config.name.bright_green());
                println!(" Language: {}", config.wikidata.language);
                println!(" Wikidata API: {}", config.wikidata.api_url);
                println!(" Model: {}", config.llm.model);
                Ok(())
            }
            Err(e) => {
                error!(" Configuration validation failed: {}", e);
                Err(e)
            }
        },
        Err(e) => {
            error!(" Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

async fn check_server_command(server_url: String, api_key: Option<String>) -> Result<()> {
    println!("{}", " Checking LLM server...".bright_blue().bold());

    let extractor = LlmEntityExtractor::new(LlmSettings {
        base_url: server_url.clone(),
        api_key,
        model: "test".to_string(),
        temperature: 0.2,
        max_tokens: 256,
        timeout_seconds: 30,
    })?;

    if extractor.check_health().await? {
        println!(" Server is healthy at {}", server_url.bright_green());
    } else {
        println!(" Server is not responding at {}", server_url.bright_red());
    }

    Ok(())
}

async fn generate_config_command(output_path: PathBuf, format: ConfigFormat) -> Result<()> {
    println!(
        "{}",
        " Generating example configuration...".bright_blue().bold()
    );

    let config = Configuration::example();

    let content = match format {
        ConfigFormat::Yaml => serde_yaml::to_string(&config)?,
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
    };

    tokio::fs::write(&output_path, content).await?;

    println!(
        " Example configuration generated at: {}",
        output_path.display().to_string().bright_green()
    );
    println!(" Edit the file to customize for your use case");

    Ok(())
}
