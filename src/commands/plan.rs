use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::PipelineConfig;
use crate::llm::LlmClient;
use crate::research::planner::Planner;

/// Print the plan as JSON on stdout, optionally saving it too.
pub async fn plan(config: &PipelineConfig, question: &str, save: Option<&Path>) -> Result<()> {
    let llm = Arc::new(LlmClient::from_config(config)?);
    let planner = Planner::new(llm, config.plan_options(), config.strict_subquestion_count);

    let plan = planner.plan(question).await;
    let json = serde_json::to_string_pretty(&plan).context("Failed to serialize plan")?;
    println!("{}", json);

    if let Some(path) = save {
        plan.save(path)?;
        info!(path = %path.display(), "Saved plan");
    }
    Ok(())
}
