use crate::config::{EngineConfig, EngineConfigFile, QueryPlan, QueryPlanFile};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use topn_core::Dataset;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Toml,
    Json,
}

impl Format {
    fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            Some("toml") => Ok(Format::Toml),
            Some("json") => Ok(Format::Json),
            _ => Err(anyhow::anyhow!(
                "Unsupported file format for '{}'. Use .yaml, .yml, .toml, or .json",
                path.display()
            )),
        }
    }

    fn from_name(format: &str) -> Result<Self> {
        match format.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(Format::Yaml),
            "toml" => Ok(Format::Toml),
            "json" => Ok(Format::Json),
            _ => Err(anyhow::anyhow!("Unsupported format: {}", format)),
        }
    }
}

/// YAML and JSON hold the document at the top level; TOML wraps it in a
/// table (`[engine]`, `[plan]`).
fn decode<T, W>(content: &str, format: Format, unwrap: impl FnOnce(W) -> T) -> Result<T>
where
    T: DeserializeOwned,
    W: DeserializeOwned,
{
    Ok(match format {
        Format::Yaml => serde_yaml::from_str(content)?,
        Format::Json => serde_json::from_str(content)?,
        Format::Toml => unwrap(toml::from_str(content)?),
    })
}

async fn read(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Cannot read '{}'", path.display()))
}

pub async fn parse_config_from_file(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let path = path.as_ref();
    let format = Format::from_path(path)?;
    let contents = read(path).await?;
    let mut config = parse_config(&contents, format)?;
    if let Some(base) = path.parent() {
        config.storage.resolve_relative_to(base);
    }
    debug!("Loaded engine '{}' from {}", config.name, path.display());
    Ok(config)
}

pub fn parse_config_from_str(content: &str, format: &str) -> Result<EngineConfig> {
    parse_config(content, Format::from_name(format)?)
}

fn parse_config(content: &str, format: Format) -> Result<EngineConfig> {
    let config = decode(content, format, |file: EngineConfigFile| file.engine)?;
    config.validate()?;
    Ok(config)
}

pub async fn parse_plan_from_file(path: impl AsRef<Path>) -> Result<QueryPlan> {
    let path = path.as_ref();
    let format = Format::from_path(path)?;
    let contents = read(path).await?;
    parse_plan(&contents, format)
}

pub fn parse_plan_from_str(content: &str, format: &str) -> Result<QueryPlan> {
    parse_plan(content, Format::from_name(format)?)
}

fn parse_plan(content: &str, format: Format) -> Result<QueryPlan> {
    let plan = decode(content, format, |file: QueryPlanFile| file.plan)?;
    plan.validate()?;
    Ok(plan)
}

/// Loads an in-memory store fixture. TOML is not supported for datasets.
pub async fn load_dataset_from_file(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let contents = read(path).await?;

    let dataset = match Format::from_path(path)? {
        Format::Yaml => serde_yaml::from_str(&contents)?,
        Format::Json => serde_json::from_str(&contents)?,
        Format::Toml => anyhow::bail!("Datasets must be YAML or JSON"),
    };
    Ok(dataset)
}
