use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Background,
    Definition,
    Analysis,
    Methodology,
    Causal,
    Impact,
    Comparative,
    Historical,
    Trend,
    #[serde(other)]
    Unknown,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Background => "background",
            QuestionType::Definition => "definition",
            QuestionType::Analysis => "analysis",
            QuestionType::Methodology => "methodology",
            QuestionType::Causal => "causal",
            QuestionType::Impact => "impact",
            QuestionType::Comparative => "comparative",
            QuestionType::Historical => "historical",
            QuestionType::Trend => "trend",
            QuestionType::Unknown => "unknown",
        }
    }

    /// Case-insensitive; anything unrecognised is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "background" => QuestionType::Background,
            "definition" => QuestionType::Definition,
            "analysis" => QuestionType::Analysis,
            "methodology" => QuestionType::Methodology,
            "causal" => QuestionType::Causal,
            "impact" => QuestionType::Impact,
            "comparative" => QuestionType::Comparative,
            "historical" => QuestionType::Historical,
            "trend" => QuestionType::Trend,
            _ => QuestionType::Unknown,
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQuestion {
    pub id: String,
    pub text: String,
    /// 1 = highest. `None` when the model left it out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(rename = "type", default = "unknown_type")]
    pub kind: QuestionType,
}

fn unknown_type() -> QuestionType {
    QuestionType::Unknown
}

impl SubQuestion {
    /// Build a sub-question from one item of a model-produced JSON array.
    ///
    /// Accepts objects (`id`, `text`, `priority`, `type`, all optional except
    /// a non-empty `text`) and bare strings. `index` supplies the fallback id.
    pub fn from_value(index: usize, value: &Value) -> Option<Self> {
        let default_id = format!("q{}", index + 1);
        match value {
            Value::String(text) if !text.trim().is_empty() => Some(Self {
                id: default_id,
                text: text.trim().to_string(),
                priority: None,
                kind: QuestionType::Unknown,
            }),
            Value::Object(map) => {
                let text = map
                    .get("text")
                    .or_else(|| map.get("question"))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())?;
                let id = match map.get("id") {
                    Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
                    Some(Value::Number(n)) => format!("q{}", n),
                    _ => default_id,
                };
                let priority = match map.get("priority") {
                    Some(Value::Number(n)) => n.as_u64().and_then(|p| u32::try_from(p).ok()),
                    Some(Value::String(s)) => s.trim().parse().ok(),
                    _ => None,
                };
                let kind = map
                    .get("type")
                    .and_then(Value::as_str)
                    .map(QuestionType::parse)
                    .unwrap_or(QuestionType::Unknown);
                Some(Self {
                    id,
                    text: text.to_string(),
                    priority,
                    kind,
                })
            }
            _ => None,
        }
    }

    /// `q1 (priority 1, background): ...` is the line used in exports.
    pub fn display_line(&self) -> String {
        let priority = self
            .priority
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".to_string());
        format!("{} (priority {}, {}): {}", self.id, priority, self.kind, self.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchTarget {
    Web,
    Academic,
    Archive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum PlanAction {
    Search {
        target: Vec<SearchTarget>,
        query_template: String,
        expected_results: u32,
        depends_on: Vec<String>,
    },
    Synthesize {
        depends_on: Vec<String>,
        method: String,
    },
    Validate {
        depends_on: Vec<String>,
        method: String,
    },
}

/// One descriptive plan step. Steps are numbered from 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub step: u32,
    #[serde(flatten)]
    pub action: PlanAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    pub time_horizon: Option<String>,
    pub source_types: Vec<String>,
    pub domain_focus: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub planner_version: String,
    pub created_at: DateTime<Utc>,
    pub method: String,
    #[serde(default = "unknown_type")]
    pub question_type: QuestionType,
}

/// Full planner output, also the persisted plan artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub question_id: String,
    pub original_prompt: String,
    pub summary: String,
    pub subquestions: Vec<SubQuestion>,
    pub plan: Vec<PlanStep>,
    pub constraints: Constraints,
    pub metadata: PlanMetadata,
}

impl ResearchPlan {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serialize plan")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write plan to {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read plan from {}", path.display()))?;
        serde_json::from_slice(&bytes).context("Failed to parse plan JSON")
    }
}
