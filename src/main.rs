use ragkit::chunking::{Chunk, Document};
use ragkit::cli::{Cli, Commands, ConfigAction};
use ragkit::config::{Config, ConfigValidator};
use ragkit::embedding::EmbeddingAdapter;
use ragkit::error::{RagError, Result};
use ragkit::pipeline::KnowledgeBase;
use std::path::{Path, PathBuf};
use tokio::time::Instant;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Embed { texts, preview } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_embed(&config, texts, preview).await?;
        }
        Commands::Query {
            query,
            docs,
            k,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_query(&config, &query, &docs, k, json).await?;
        }
        Commands::Split {
            file,
            max_length,
            overlap,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_split(&config, &file, max_length, overlap, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "ragkit=debug" } else { "ragkit=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_embed(config: &Config, texts: Vec<String>, preview: usize) -> Result<()> {
    let adapter = EmbeddingAdapter::from_config(config.embedding.clone())?;
    let deadline = config.embedding.deadline().map(|d| Instant::now() + d);

    println!("Embedding {} texts via {}", texts.len(), config.embedding.endpoint_url());

    let batch = adapter.embed_batch_detailed(&texts, deadline).await;
    for (i, (vector, degraded)) in batch.vectors.iter().zip(&batch.degraded).enumerate() {
        let head: Vec<String> = vector
            .iter()
            .take(preview)
            .map(|v| format!("{:.4}", v))
            .collect();
        let status = if *degraded { "✗ degraded" } else { "✓" };
        println!(
            "  [{}] {} dim={} [{}{}]",
            i,
            status,
            vector.len(),
            head.join(", "),
            if vector.len() > preview { ", ..." } else { "" }
        );
    }

    let stats = adapter.stats();
    println!(
        "Batches: {} ok, {} failed, {} retries",
        stats.batches_succeeded, stats.batches_failed, stats.retries
    );

    Ok(())
}

async fn cmd_query(
    config: &Config,
    query: &str,
    docs_dir: &Path,
    k: Option<usize>,
    json: bool,
) -> Result<()> {
    let documents = load_documents(docs_dir)?;
    if documents.is_empty() {
        return Err(RagError::Config(format!(
            "No .txt or .md documents found in {}",
            docs_dir.display()
        )));
    }

    let knowledge_base = KnowledgeBase::from_config(config)?;
    let report = knowledge_base.ingest(&documents).await?;

    let k = k.unwrap_or(config.retrieval.top_k);
    let result = knowledge_base.retrieve(query, k).await?;

    if json {
        let output = serde_json::json!({
            "ingest": report,
            "results": result,
        });
        let rendered = serde_json::to_string_pretty(&output).map_err(|e| RagError::Json {
            source: e,
            context: "Failed to serialize results".to_string(),
        })?;
        println!("{}", rendered);
        return Ok(());
    }

    println!(
        "Indexed {} documents as {} chunks ({} degraded)",
        report.documents, report.chunks, report.degraded_chunks
    );

    if result.is_empty() {
        println!("No results for: {}", query);
        return Ok(());
    }

    println!("Top {} results for: {}", result.len(), query);
    for (rank, scored) in result.iter().enumerate() {
        println!(
            "\n{}. {} (score {:.4})",
            rank + 1,
            scored.id(),
            scored.score
        );
        println!("   {}", scored.chunk.preview(200));
    }

    Ok(())
}

fn cmd_split(
    config: &Config,
    file: &Path,
    max_length: Option<usize>,
    overlap: Option<usize>,
    json: bool,
) -> Result<()> {
    let mut chunking = config.chunking.clone();
    if let Some(max_length) = max_length {
        chunking.max_length = max_length;
    }
    if let Some(overlap) = overlap {
        chunking.overlap = overlap;
    }
    let splitter = chunking.build()?;

    let document = read_document(file)?;
    let chunks: Vec<Chunk> = splitter.split(&document);

    if json {
        let rendered = serde_json::to_string_pretty(&chunks).map_err(|e| RagError::Json {
            source: e,
            context: "Failed to serialize chunks".to_string(),
        })?;
        println!("{}", rendered);
        return Ok(());
    }

    println!(
        "{} chunks (max_length {}, overlap {})",
        chunks.len(),
        chunking.max_length,
        chunking.overlap
    );
    for chunk in &chunks {
        let span = chunk.span();
        println!(
            "\n[{}] chars {}..{} ({} chars)",
            chunk.id(),
            span.start,
            span.end,
            chunk.char_len()
        );
        println!("{}", chunk.text());
    }

    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = load_config(config_path, profile)?;
            let value = match section.as_deref() {
                None => serde_json::to_value(&config),
                Some("embedding") => serde_json::to_value(&config.embedding),
                Some("chunking") => serde_json::to_value(&config.chunking),
                Some("store") => serde_json::to_value(&config.store),
                Some("retrieval") => serde_json::to_value(&config.retrieval),
                Some(other) => {
                    return Err(RagError::Config(format!("Unknown section: {}", other)));
                }
            }
            .and_then(|v| serde_json::to_string_pretty(&v))
            .map_err(|e| RagError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;

            println!("{}", value);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = match profile {
                Some(profile) => Config::load_with_profile(&path, &profile)?,
                None => Config::load(&path)?,
            };
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
        ConfigAction::Path => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'ragkit config init' to create one."
        );
        let mut config = Config::default();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

/// Plain-text documents (.txt / .md) directly inside `dir`, by file name
fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    let entries = std::fs::read_dir(dir).map_err(|e| RagError::Io {
        source: e,
        context: format!("Failed to read directory: {:?}", dir),
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("txt") | Some("md")
                )
        })
        .collect();
    paths.sort();

    paths.iter().map(|path| read_document(path)).collect()
}

fn read_document(path: &Path) -> Result<Document> {
    let text = std::fs::read_to_string(path).map_err(|e| RagError::Io {
        source: e,
        context: format!("Failed to read document: {:?}", path),
    })?;

    let id = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document")
        .to_string();

    Ok(Document::new(id, text).with_metadata("source", path.display().to_string()))
}
