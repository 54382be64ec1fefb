mod galaxy;
mod parser;
mod settings;
mod wiki;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use galaxy::{Cluster, ClusterValue, Galaxy};
use parser::identity::Registry;
use parser::rules::ExtractRules;
use parser::Extraction;
use settings::Settings;
use wiki::WikiClient;

#[derive(Parser)]
#[command(
    name = "intel_agencies",
    about = "Build the intelligence-agency galaxy from Wikipedia"
)]
struct Cli {
    /// Config file (default: ./intel_agencies.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Abort without writing if any section fails to extract
    #[arg(long, global = true)]
    strict: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the page, extract agencies, write galaxy + cluster files
    Run,
    /// Extract from a saved HTML file and print cluster values as JSON
    Extract {
        #[arg(long)]
        html: PathBuf,
        /// Write JSON here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Download the page HTML only
    Fetch {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    let strict = cli.strict || settings.strict;

    match cli.command {
        Commands::Run => run(&settings, strict).await?,
        Commands::Extract { html, out } => {
            let raw = std::fs::read_to_string(&html)
                .with_context(|| format!("Failed to read {}", html.display()))?;
            let registry = load_registry(&settings)?;
            let extraction = extract(&raw, &registry, strict)?;
            let values: Vec<ClusterValue> =
                extraction.agencies.into_iter().map(ClusterValue::from).collect();
            match out {
                Some(path) => {
                    galaxy::write_json(&values, &path)?;
                    println!("Wrote {} agencies to {}", values.len(), path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&values)?),
            }
        }
        Commands::Fetch { out } => {
            let client = WikiClient::new(&settings)?;
            let html = client.fetch_page_html(&settings.page_title).await?;
            match out {
                Some(path) => write_text(&path, &html)?,
                None => println!("{}", html),
            }
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        info!("Done in {:.1}s", elapsed.as_secs_f64());
    }
    Ok(())
}

async fn run(settings: &Settings, strict: bool) -> Result<()> {
    let client = WikiClient::new(settings)?;

    // Nothing is extracted or written when the page cannot be fetched.
    let html = client
        .fetch_page_html(&settings.page_title)
        .await
        .with_context(|| format!("Failed to fetch '{}'", settings.page_title))?;

    let registry = load_registry(settings)?;
    let extraction = extract(&html, &registry, strict)?;

    let authors = client.fetch_authors(&settings.page_title).await?;

    let galaxy = Galaxy::intelligence_agencies(settings.galaxy_uuid);
    galaxy.save_to_file(&settings.galaxy_path())?;

    let mut cluster =
        Cluster::intelligence_agencies(settings.galaxy_uuid, settings.source_url(), authors);
    for agency in extraction.agencies {
        cluster.add_value(agency.into());
    }
    cluster.save_to_file(&settings.cluster_path())?;

    println!(
        "Wrote {} agencies from {} sections ({} failed, {} known identifiers) to {}",
        cluster.values.len(),
        extraction.sections,
        extraction.failures.len(),
        registry.len(),
        settings.cluster_path().display()
    );
    Ok(())
}

fn load_registry(settings: &Settings) -> Result<Registry> {
    let prior = galaxy::load_registry(&settings.cluster_path())?;
    Ok(Registry::from_prior(prior, &settings.galaxy_name))
}

fn extract(html: &str, registry: &Registry, strict: bool) -> Result<Extraction> {
    let extraction = parser::extract_agencies(html, registry, &ExtractRules::default());
    info!(
        sections = extraction.sections,
        agencies = extraction.agencies.len(),
        failures = extraction.failures.len(),
        first_run = registry.is_first_run(),
        "Extraction finished"
    );

    if strict && !extraction.failures.is_empty() {
        let sections: Vec<String> = extraction.failures.iter().map(|f| f.to_string()).collect();
        bail!("Strict mode, nothing written: {}", sections.join("; "));
    }
    Ok(extraction)
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn failed_fetch_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::load(None).unwrap();
        settings.wiki_base_url = "http://127.0.0.1:9".into();
        settings.cluster_dir = dir.path().join("clusters");
        settings.galaxy_dir = dir.path().join("galaxies");
        settings.max_retries = 0;

        let err = run(&settings, false).await.unwrap_err();
        assert!(err.to_string().contains("Failed to fetch"), "{err:#}");
        assert!(!settings.cluster_path().exists());
        assert!(!settings.galaxy_path().exists());
        assert!(!settings.cluster_dir.exists());
    }
}
