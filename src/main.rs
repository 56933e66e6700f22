use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use material_resolver::catalog::{
    CatalogSource, CsvFileCatalogSource, HttpCatalogSource, JsonFileCatalogSource,
};
use material_resolver::llm::LlmClient;
use material_resolver::{EngineConfig, ExtractedMaterial, MaterialEngine};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "material-resolver")]
#[command(about = "Resolve recyclable materials from Arabic/English text and images")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// JSON config file (values are overridden by env vars and flags)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog file (.json or .csv)
    #[arg(long, global = true)]
    catalog_file: Option<PathBuf>,

    /// Catalog HTTP endpoint
    #[arg(long, global = true)]
    catalog_url: Option<String>,

    /// LLM API key (or set OPENAI_API_KEY env var)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Extractor model
    #[arg(long, global = true)]
    model: Option<String>,

    /// Print JSON instead of a table
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Extract materials from a transcript
    Extract { text: String },
    /// Extract materials from an image file
    Image { path: PathBuf },
    /// Resolve a single term to its catalog material
    Resolve { term: String },
    /// Print the loaded catalog
    Catalog,
}

fn catalog_source(config: &EngineConfig) -> Result<Arc<dyn CatalogSource>> {
    if let Some(path) = &config.catalog_file {
        let is_csv = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        return Ok(if is_csv {
            Arc::new(CsvFileCatalogSource::new(path.clone()))
        } else {
            Arc::new(JsonFileCatalogSource::new(path.clone()))
        });
    }
    if let Some(url) = &config.catalog_url {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        return Ok(Arc::new(HttpCatalogSource::new(url, timeout)?));
    }
    bail!("No catalog configured: pass --catalog-file or --catalog-url (or set MATERIAL_RESOLVER_CATALOG_FILE)")
}

fn print_materials(materials: &[ExtractedMaterial], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(materials)?);
        return Ok(());
    }
    if materials.is_empty() {
        println!("No recyclable materials recognized.");
        return Ok(());
    }
    for m in materials {
        println!("{:<30} {:>8} {}", m.material, m.quantity, m.unit);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = EngineConfig::load(args.config.as_deref())?;
    if let Some(key) = args.api_key {
        config.api_key = Some(key);
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(file) = args.catalog_file {
        config.catalog_file = Some(file);
    }
    if let Some(url) = args.catalog_url {
        config.catalog_url = Some(url);
    }

    let llm = Arc::new(LlmClient::new(&config)?);
    info!("Material resolver starting (model: {})", llm.model());

    let engine = MaterialEngine::new(catalog_source(&config)?, llm.clone(), config.matching.clone())
        .with_captioner(llm);

    match args.command {
        Command::Extract { text } => {
            let materials = engine.extract_materials(&text).await?;
            print_materials(&materials, args.json)?;
        }
        Command::Image { path } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read image {}", path.display()))?;
            let materials = engine.extract_materials_from_image(&bytes).await?;
            print_materials(&materials, args.json)?;
        }
        Command::Resolve { term } => match engine.resolve(&term).await {
            Some(resolution) if args.json => {
                println!("{}", serde_json::to_string_pretty(&resolution)?)
            }
            Some(resolution) => println!(
                "{} [{}] via {:?}",
                resolution.material, resolution.unit, resolution.method
            ),
            None => println!("No catalog material matches '{}'", term),
        },
        Command::Catalog => {
            let index = engine.reload().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(index.entries())?);
            } else {
                println!("{}", index.render_for_prompt());
                println!(
                    "\n{} materials, {} active synonyms (loaded {})",
                    index.len(),
                    index.synonym_count(),
                    index.built_at().format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
        }
    }

    Ok(())
}
