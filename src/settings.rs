use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_CONFIG: &str = "intel_agencies";
const ENV_PREFIX: &str = "INTEL";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub wiki_base_url: String,
    pub page_title: String,
    pub cluster_dir: PathBuf,
    pub galaxy_dir: PathBuf,
    pub galaxy_name: String,
    pub galaxy_uuid: Uuid,
    pub user_agent: String,
    pub max_retries: u32,
    pub strict: bool,
}

impl Settings {
    /// Defaults, then `intel_agencies.toml` (or `path`), then `INTEL_*` env.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let builder = Config::builder()
            .set_default("wiki_base_url", "https://en.wikipedia.org")?
            .set_default("page_title", "List of intelligence agencies")?
            .set_default("cluster_dir", "../../clusters")?
            .set_default("galaxy_dir", "../../galaxies")?
            .set_default("galaxy_name", "intelligence-agencies")?
            .set_default("galaxy_uuid", "3ef969e7-96cd-4048-aa83-191ac457d0db")?
            .set_default(
                "user_agent",
                concat!("intel_agencies/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("max_retries", 3_i64)?
            .set_default("strict", false)?;

        let builder = match path {
            Some(p) => builder.add_source(File::from(p)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG).required(false)),
        };

        builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn cluster_path(&self) -> PathBuf {
        self.cluster_dir.join(format!("{}.json", self.galaxy_name))
    }

    pub fn galaxy_path(&self) -> PathBuf {
        self.galaxy_dir.join(format!("{}.json", self.galaxy_name))
    }

    pub fn api_url(&self) -> String {
        format!("{}/w/api.php", self.wiki_base_url.trim_end_matches('/'))
    }

    pub fn source_url(&self) -> String {
        format!(
            "{}/wiki/{}",
            self.wiki_base_url.trim_end_matches('/'),
            self.page_title.replace(' ', "_")
        )
    }
}
