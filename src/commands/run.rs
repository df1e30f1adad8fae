use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::export;
use crate::research::types::ResearchPlan;
use crate::research::{ResearchOutcome, ResearchPipeline};

pub enum Source {
    Question(String),
    SavedPlan(PathBuf),
}

pub struct Outputs {
    pub pdf: Option<PathBuf>,
    pub text: Option<PathBuf>,
    pub raw: bool,
}

/// Run the pipeline and print the report on stdout.
pub async fn run(config: &PipelineConfig, source: Source, outputs: &Outputs) -> Result<()> {
    if config.search_api_key.is_empty() {
        warn!("No search API key configured, searches will likely fail");
    }
    let pipeline = ResearchPipeline::from_config(config)?;

    let outcome = match source {
        Source::Question(question) => pipeline.run(&question).await,
        Source::SavedPlan(path) => {
            let plan = ResearchPlan::load(&path)?;
            info!(path = %path.display(), question_id = %plan.question_id, "Loaded plan");
            pipeline.run_plan(plan).await
        }
    };

    if outcome.raw_report.origin.is_degraded() {
        warn!(origin = %outcome.raw_report.origin, "Report is a fallback, not model output");
    }

    let body = if outputs.raw {
        &outcome.raw_report.text
    } else {
        &outcome.report
    };
    println!("{}", body);

    export_outcome(&outcome, outputs)
}

fn export_outcome(outcome: &ResearchOutcome, outputs: &Outputs) -> Result<()> {
    let question = &outcome.plan.original_prompt;
    let subquestions = &outcome.plan.subquestions;

    if let Some(path) = &outputs.text {
        export::write_text_report(path, question, subquestions, &outcome.report)
            .with_context(|| format!("Failed to export text report to {}", path.display()))?;
    }
    if let Some(path) = &outputs.pdf {
        export::write_pdf(path, question, subquestions, &outcome.report)
            .with_context(|| format!("Failed to export PDF to {}", path.display()))?;
    }
    Ok(())
}
