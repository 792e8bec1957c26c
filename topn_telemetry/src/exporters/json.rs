use anyhow::Result;
use std::path::Path;
use topn_config::PlanResult;
use tracing::debug;

pub struct JsonExporter;

impl JsonExporter {
    pub async fn export(result: &PlanResult, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = Self::to_string(result)?;
        tokio::fs::write(path, json).await?;
        debug!("Wrote plan result '{}' to {}", result.plan_name, path.display());
        Ok(())
    }

    pub fn to_string(result: &PlanResult) -> Result<String> {
        Ok(serde_json::to_string_pretty(result)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<PlanResult> {
        let path = path.as_ref();
        debug!("Loading plan result from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}
