pub mod citations;
pub mod constraints;
pub mod fallback;
pub mod normalize;
pub mod planner;
pub mod prompts;
pub mod recovery;
pub mod synthesizer;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::PipelineConfig;
use crate::llm::{Completion, LlmClient};
use crate::search::types::RetrievalResult;
use crate::search::{Retriever, SearchBackend, TavilyClient};

use planner::Planner;
use synthesizer::{Report, Synthesizer};
use types::ResearchPlan;

/// Everything one run produced, stage by stage.
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub plan: ResearchPlan,
    pub retrieval: RetrievalResult,
    pub raw_report: Report,
    /// Normalized text, ready for export.
    pub report: String,
}

/// Planner, retriever and synthesizer wired together. Stages run strictly
/// in order; only retrieval fans out.
pub struct ResearchPipeline {
    planner: Planner,
    retriever: Retriever,
    synthesizer: Synthesizer,
}

impl ResearchPipeline {
    pub fn new(
        llm: Arc<dyn Completion>,
        search: Arc<dyn SearchBackend>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            planner: Planner::new(
                llm.clone(),
                config.plan_options(),
                config.strict_subquestion_count,
            ),
            retriever: Retriever::new(search),
            synthesizer: Synthesizer::new(
                llm,
                config.synthesis_options(),
                config.fallback_report_on_failure,
            ),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let llm = Arc::new(LlmClient::from_config(config)?);
        let search = Arc::new(TavilyClient::from_config(config)?);
        Ok(Self::new(llm, search, config))
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub async fn run(&self, question: &str) -> ResearchOutcome {
        let plan = self.planner.plan(question).await;
        self.run_plan(plan).await
    }

    /// Retrieve, synthesize and normalize for an existing plan.
    pub async fn run_plan(&self, plan: ResearchPlan) -> ResearchOutcome {
        let question = plan.original_prompt.clone();
        let retrieval = self.retriever.search(&plan.subquestions).await;

        let total: usize = retrieval.values().map(Vec::len).sum();
        info!(sources = total, "Retrieval finished");

        let raw_report = self
            .synthesizer
            .synthesize(&question, &plan.subquestions, &retrieval)
            .await;
        let report = normalize::normalize(&raw_report.text);
        info!(
            origin = %raw_report.origin,
            raw_len = raw_report.text.len(),
            report_len = report.len(),
            "Report ready"
        );

        ResearchOutcome {
            plan,
            retrieval,
            raw_report,
            report,
        }
    }
}
