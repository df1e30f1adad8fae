mod plan;
mod run;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use crate::config::PipelineConfig;

/// Deep Researcher - plan, search and write long-form research reports
#[derive(Parser, Debug)]
#[command(name = "deep-researcher")]
#[command(about = "Plan, search and write long-form research reports")]
#[command(version)]
pub struct Cli {
    /// Log at DEBUG instead of INFO
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decompose a question into sub-questions and a search plan
    Plan {
        /// Research question
        #[arg(required = true)]
        question: Vec<String>,

        /// Write the plan as JSON to this path
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Plan, search, write and clean up a report
    Run {
        /// Research question (omit when using --plan)
        question: Vec<String>,

        /// Start from a saved plan instead of planning again
        #[arg(long, conflicts_with = "question")]
        plan: Option<PathBuf>,

        /// Export the report as PDF
        #[arg(long)]
        pdf: Option<PathBuf>,

        /// Export the report as plain text
        #[arg(long)]
        text: Option<PathBuf>,

        /// Print the report before cleanup
        #[arg(long)]
        raw: bool,
    },
}

impl Cli {
    pub async fn execute(self, config: &PipelineConfig) -> Result<()> {
        match self.command {
            Command::Plan { question, save } => {
                plan::plan(config, &join_question(&question)?, save.as_deref()).await
            }
            Command::Run {
                question,
                plan,
                pdf,
                text,
                raw,
            } => {
                let source = match plan {
                    Some(path) => run::Source::SavedPlan(path),
                    None => run::Source::Question(join_question(&question)?),
                };
                let outputs = run::Outputs { pdf, text, raw };
                run::run(config, source, &outputs).await
            }
        }
    }
}

fn join_question(words: &[String]) -> Result<String> {
    let question = words.join(" ").trim().to_string();
    if question.is_empty() {
        bail!("A research question is required");
    }
    Ok(question)
}
