use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::llm::{Completion, CompletionFailure, CompletionOptions, Message};

use super::constraints::{derive_constraints, detect_question_type};
use super::prompts;
use super::types::{
    PlanAction, PlanMetadata, PlanStep, QuestionType, ResearchPlan, SearchTarget, SubQuestion,
};

pub const PLANNER_VERSION: &str = "v2-lm-studio";
const QUERY_SUFFIX: &str = " -wiki";
const EXPECTED_RESULTS: u32 = 5;
const SUBQUESTION_RANGE: std::ops::RangeInclusive<usize> = 6..=8;

/// Why the deterministic sub-question set was used instead of model output.
#[derive(Debug, Clone)]
pub enum FallbackReason {
    Completion(CompletionFailure),
    EmptyResponse,
    Unparseable,
    CountOutOfRange(usize),
}

/// Where a set of sub-questions came from.
#[derive(Debug, Clone)]
pub enum SubQuestionOrigin {
    Model,
    Fallback(FallbackReason),
}

impl SubQuestionOrigin {
    pub fn method(&self) -> &'static str {
        match self {
            SubQuestionOrigin::Model => "LM Studio inference",
            SubQuestionOrigin::Fallback(_) => "deterministic fallback",
        }
    }
}

/// Fixed per-type templates for the offline sub-question set.
const FALLBACK_TEMPLATES: &[(QuestionType, &str)] = &[
    (QuestionType::Background, "What is the background of {q}?"),
    (QuestionType::Methodology, "How does {q} work?"),
    (QuestionType::Impact, "What are the impacts of {q}?"),
    (QuestionType::Analysis, "What are the challenges with {q}?"),
    (QuestionType::Comparative, "How does {q} compare to alternatives?"),
    (QuestionType::Historical, "What are the future trends for {q}?"),
];

/// The six sub-questions used whenever the model cannot be used. Pure in `question`.
pub fn fallback_subquestions(question: &str) -> Vec<SubQuestion> {
    FALLBACK_TEMPLATES
        .iter()
        .enumerate()
        .map(|(i, (kind, template))| SubQuestion {
            id: format!("q{}", i + 1),
            text: template.replace("{q}", question),
            priority: Some(i as u32 + 1),
            kind: *kind,
        })
        .collect()
}

/// Parse model output into sub-questions: strict JSON first, then the first
/// bracketed span. `None` if neither yields a non-empty array of usable items.
fn to_subquestions(items: &[Value]) -> Vec<SubQuestion> {
    items
        .iter()
        .enumerate()
        .filter_map(|(i, v)| SubQuestion::from_value(i, v))
        .collect()
}

/// Every well-formed JSON array that starts at a `[` in `text`, in order.
/// Each candidate is parsed up to its own closing bracket, so trailing
/// chatter with more brackets does not spoil it.
fn embedded_arrays(text: &str) -> impl Iterator<Item = Vec<Value>> + '_ {
    text.match_indices('[').filter_map(move |(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Array(items))) => Some(items),
            _ => None,
        }
    })
}

pub fn parse_subquestions(text: &str) -> Option<Vec<SubQuestion>> {
    let subquestions = match serde_json::from_str::<Value>(text.trim()) {
        Ok(parsed) => to_subquestions(parsed.as_array()?),
        Err(_) => embedded_arrays(text)
            .map(|items| to_subquestions(&items))
            .find(|subs| !subs.is_empty())?,
    };

    if subquestions.is_empty() {
        None
    } else {
        Some(subquestions)
    }
}

/// One search step per sub-question, then synthesize, then validate.
pub fn build_plan(subquestions: &[SubQuestion]) -> Vec<PlanStep> {
    let mut plan: Vec<PlanStep> = Vec::with_capacity(subquestions.len() + 2);
    let mut step = 1u32;

    for sq in subquestions {
        let mut target = vec![SearchTarget::Web, SearchTarget::Academic];
        if matches!(sq.kind, QuestionType::Historical | QuestionType::Trend) {
            target.push(SearchTarget::Archive);
        }
        plan.push(PlanStep {
            step,
            action: PlanAction::Search {
                target,
                query_template: format!("{}{}", sq.text, QUERY_SUFFIX),
                expected_results: EXPECTED_RESULTS,
                depends_on: vec![sq.id.clone()],
            },
        });
        step += 1;
    }

    plan.push(PlanStep {
        step,
        action: PlanAction::Synthesize {
            depends_on: subquestions.iter().map(|sq| sq.id.clone()).collect(),
            method: "cross-reference analysis".to_string(),
        },
    });
    step += 1;

    plan.push(PlanStep {
        step,
        action: PlanAction::Validate {
            depends_on: vec!["synthesis".to_string()],
            method: "fact-check against multiple sources".to_string(),
        },
    });

    plan
}

/// Text up to the first `.` (with the period), or the whole question.
fn summarize(question: &str) -> String {
    match question.split_once('.') {
        Some((head, _)) => format!("{}.", head),
        None => question.to_string(),
    }
}

pub struct Planner {
    llm: Arc<dyn Completion>,
    options: CompletionOptions,
    strict_count: bool,
}

impl Planner {
    pub fn new(llm: Arc<dyn Completion>, options: CompletionOptions, strict_count: bool) -> Self {
        Self {
            llm,
            options,
            strict_count,
        }
    }

    pub async fn generate_subquestions(&self, question: &str) -> Vec<SubQuestion> {
        self.request_subquestions(question).await.0
    }

    /// One completion call, no retry. Every failure resolves to the fallback set.
    pub async fn request_subquestions(&self, question: &str) -> (Vec<SubQuestion>, SubQuestionOrigin) {
        let messages = vec![
            Message::system(prompts::PLANNER_SYSTEM_PROMPT),
            Message::user(prompts::planner_user_prompt(question)),
        ];

        let reason = match self.llm.complete(&messages, self.options).await {
            Err(failure) => {
                warn!("Planner completion failed: {}", failure);
                FallbackReason::Completion(failure)
            }
            Ok(text) if text.trim().is_empty() => {
                warn!("Planner completion was empty");
                FallbackReason::EmptyResponse
            }
            Ok(text) => match parse_subquestions(&text) {
                None => {
                    let preview: String = text.chars().take(500).collect();
                    warn!(raw = %preview, "Could not parse sub-questions from model output");
                    FallbackReason::Unparseable
                }
                Some(subs) if self.strict_count && !SUBQUESTION_RANGE.contains(&subs.len()) => {
                    warn!(count = subs.len(), "Sub-question count outside 6-8, rejecting");
                    FallbackReason::CountOutOfRange(subs.len())
                }
                Some(subs) => {
                    debug!(count = subs.len(), "Parsed sub-questions from model output");
                    return (subs, SubQuestionOrigin::Model);
                }
            },
        };

        (
            fallback_subquestions(question),
            SubQuestionOrigin::Fallback(reason),
        )
    }

    /// Sub-questions, plan steps and constraints for one research question.
    pub async fn plan(&self, question: &str) -> ResearchPlan {
        let preview: String = question.chars().take(100).collect();
        info!(question = %preview, "Planning research");

        let (subquestions, origin) = self.request_subquestions(question).await;
        info!(count = subquestions.len(), method = origin.method(), "Sub-questions ready");
        for sq in &subquestions {
            info!("  {}", sq.display_line());
        }

        let plan = build_plan(&subquestions);
        let constraints = derive_constraints(question);
        debug!(steps = plan.len(), ?constraints, "Plan built");

        ResearchPlan {
            question_id: uuid::Uuid::new_v4().to_string(),
            original_prompt: question.to_string(),
            summary: summarize(question),
            subquestions,
            plan,
            constraints,
            metadata: PlanMetadata {
                planner_version: PLANNER_VERSION.to_string(),
                created_at: Utc::now(),
                method: origin.method().to_string(),
                question_type: detect_question_type(question),
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::CompletionResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Returns a fixed result and counts calls.
    pub(crate) struct ScriptedCompletion {
        result: CompletionResult,
        pub calls: AtomicUsize,
        pub last_messages: Mutex<Vec<Message>>,
    }

    impl ScriptedCompletion {
        pub fn new(result: CompletionResult) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
                last_messages: Mutex::new(Vec::new()),
            })
        }

        pub fn ok(text: &str) -> Arc<Self> {
            Self::new(Ok(text.to_string()))
        }

        pub fn unreachable() -> Arc<Self> {
            Self::new(Err(CompletionFailure::ConnectionRefused(
                "connection refused".to_string(),
            )))
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Completion for ScriptedCompletion {
        async fn complete(&self, messages: &[Message], _options: CompletionOptions) -> CompletionResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_messages.lock().unwrap() = messages.to_vec();
            self.result.clone()
        }
    }

    pub(crate) fn test_options() -> CompletionOptions {
        CompletionOptions {
            max_tokens: 128,
            temperature: 0.3,
            timeout: Duration::from_secs(1),
        }
    }

    fn planner(llm: Arc<ScriptedCompletion>, strict: bool) -> Planner {
        Planner::new(llm, test_options(), strict)
    }

    const SIX_ITEMS: &str = r#"[
        {"id":"q1","text":"A?","priority":1,"type":"background"},
        {"id":"q2","text":"B?","priority":2,"type":"methodology"},
        {"id":"q3","text":"C?","priority":3,"type":"impact"},
        {"id":"q4","text":"D?","priority":4,"type":"analysis"},
        {"id":"q5","text":"E?","priority":5,"type":"comparative"},
        {"id":"q6","text":"F?","priority":6,"type":"historical"}
    ]"#;

    #[tokio::test]
    async fn test_unreachable_model_uses_fallback() {
        let llm = ScriptedCompletion::unreachable();
        let p = planner(llm.clone(), false);

        let (subs, origin) = p.request_subquestions("quantum computing").await;
        assert_eq!(subs.len(), 6);
        assert_eq!(llm.call_count(), 1);
        assert!(matches!(
            origin,
            SubQuestionOrigin::Fallback(FallbackReason::Completion(_))
        ));
        assert_eq!(subs[0].text, "What is the background of quantum computing?");
        assert_eq!(subs[5].kind, QuestionType::Historical);
        let ids: Vec<&str> = subs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2", "q3", "q4", "q5", "q6"]);
    }

    #[tokio::test]
    async fn test_fallback_is_deterministic() {
        let p = planner(ScriptedCompletion::unreachable(), false);
        let a = p.generate_subquestions("soil erosion").await;
        let b = p.generate_subquestions("soil erosion").await;
        assert_eq!(a, b);
        assert_eq!(a, fallback_subquestions("soil erosion"));
    }

    #[tokio::test]
    async fn test_empty_response_uses_fallback() {
        let p = planner(ScriptedCompletion::ok("   \n"), false);
        let (subs, origin) = p.request_subquestions("x").await;
        assert_eq!(subs.len(), 6);
        assert!(matches!(
            origin,
            SubQuestionOrigin::Fallback(FallbackReason::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_parses_model_array() {
        let p = planner(ScriptedCompletion::ok(SIX_ITEMS), false);
        let (subs, origin) = p.request_subquestions("x").await;
        assert!(matches!(origin, SubQuestionOrigin::Model));
        assert_eq!(subs.len(), 6);
        assert_eq!(subs[1].text, "B?");
        assert_eq!(subs[1].kind, QuestionType::Methodology);
    }

    #[tokio::test]
    async fn test_extracts_array_from_chatter() {
        let text = format!("Sure! Here you go:\n```json\n{}\n```\nHope that helps.", SIX_ITEMS);
        let p = planner(ScriptedCompletion::ok(&text), false);
        let (subs, origin) = p.request_subquestions("x").await;
        assert!(matches!(origin, SubQuestionOrigin::Model));
        assert_eq!(subs.len(), 6);
    }

    #[tokio::test]
    async fn test_brackets_around_array_ignored() {
        let text = format!(
            "Step [0]: plan below.\n{}\nSee [1] for details, and [2] too.",
            SIX_ITEMS
        );
        let p = planner(ScriptedCompletion::ok(&text), false);
        let (subs, origin) = p.request_subquestions("x").await;
        assert!(matches!(origin, SubQuestionOrigin::Model));
        assert_eq!(subs.len(), 6);
        assert_eq!(subs[5].text, "F?");
    }

    #[tokio::test]
    async fn test_garbage_uses_fallback() {
        let p = planner(ScriptedCompletion::ok("I cannot help with [that"), false);
        let (subs, origin) = p.request_subquestions("x").await;
        assert_eq!(subs.len(), 6);
        assert!(matches!(
            origin,
            SubQuestionOrigin::Fallback(FallbackReason::Unparseable)
        ));

        let p = planner(ScriptedCompletion::ok("[]"), false);
        assert_eq!(p.generate_subquestions("x").await, fallback_subquestions("x"));

        let p = planner(ScriptedCompletion::ok(r#"{"id":"q1","text":"not an array"}"#), false);
        assert_eq!(p.generate_subquestions("x").await, fallback_subquestions("x"));
    }

    #[tokio::test]
    async fn test_single_item_accepted_when_lenient() {
        let single = r#"[{"id":"q1","text":"X","priority":1,"type":"analysis"}]"#;
        let p = planner(ScriptedCompletion::ok(single), false);
        let subs = p.generate_subquestions("x").await;
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].text, "X");
        assert_eq!(subs[0].kind, QuestionType::Analysis);
    }

    #[tokio::test]
    async fn test_single_item_rejected_when_strict() {
        let single = r#"[{"id":"q1","text":"X","priority":1,"type":"analysis"}]"#;
        let p = planner(ScriptedCompletion::ok(single), true);
        let (subs, origin) = p.request_subquestions("x").await;
        assert_eq!(subs.len(), 6);
        assert!(matches!(
            origin,
            SubQuestionOrigin::Fallback(FallbackReason::CountOutOfRange(1))
        ));

        let p = planner(ScriptedCompletion::ok(SIX_ITEMS), true);
        assert_eq!(p.generate_subquestions("x").await.len(), 6);
    }

    #[tokio::test]
    async fn test_prompt_carries_question() {
        let llm = ScriptedCompletion::ok(SIX_ITEMS);
        let p = planner(llm.clone(), false);
        p.generate_subquestions("tidal energy economics").await;

        let messages = llm.last_messages.lock().unwrap().clone();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[1].content.contains("tidal energy economics"));
        assert!(messages[1].content.contains("EXAMPLE"));
    }

    #[test]
    fn test_build_plan_shape() {
        let subs = fallback_subquestions("graphene");
        let plan = build_plan(&subs);

        assert_eq!(plan.len(), subs.len() + 2);
        for (i, step) in plan.iter().enumerate() {
            assert_eq!(step.step as usize, i + 1);
        }
        assert!(matches!(plan[plan.len() - 2].action, PlanAction::Synthesize { .. }));
        match &plan[plan.len() - 1].action {
            PlanAction::Validate { depends_on, .. } => assert_eq!(depends_on, &vec!["synthesis"]),
            other => panic!("expected validate, got {:?}", other),
        }
        match &plan[plan.len() - 2].action {
            PlanAction::Synthesize { depends_on, .. } => assert_eq!(depends_on.len(), 6),
            other => panic!("expected synthesize, got {:?}", other),
        }
    }

    #[test]
    fn test_build_plan_search_targets() {
        let subs = fallback_subquestions("graphene");
        let plan = build_plan(&subs);

        match &plan[0].action {
            PlanAction::Search {
                target,
                query_template,
                expected_results,
                depends_on,
            } => {
                assert_eq!(target, &vec![SearchTarget::Web, SearchTarget::Academic]);
                assert_eq!(query_template, "What is the background of graphene? -wiki");
                assert_eq!(*expected_results, 5);
                assert_eq!(depends_on, &vec!["q1"]);
            }
            other => panic!("expected search, got {:?}", other),
        }
        // q6 is historical and gets the archive target.
        match &plan[5].action {
            PlanAction::Search { target, .. } => assert!(target.contains(&SearchTarget::Archive)),
            other => panic!("expected search, got {:?}", other),
        }
    }

    #[test]
    fn test_build_plan_empty_input() {
        let plan = build_plan(&[]);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].step, 1);
        assert_eq!(plan[1].step, 2);
    }

    #[tokio::test]
    async fn test_plan_output() {
        let p = planner(ScriptedCompletion::unreachable(), false);
        let plan = p.plan("Climate change impacts 2010-2024. Focus on coasts").await;

        assert_eq!(plan.summary, "Climate change impacts 2010-2024.");
        assert_eq!(plan.subquestions.len(), 6);
        assert_eq!(plan.plan.len(), 8);
        assert_eq!(
            plan.constraints.time_horizon.as_deref(),
            Some("2010-01-01 to 2024-12-31")
        );
        assert_eq!(plan.metadata.planner_version, PLANNER_VERSION);
        assert_eq!(plan.metadata.method, "deterministic fallback");
        assert!(uuid::Uuid::parse_str(&plan.question_id).is_ok());
    }

    #[tokio::test]
    async fn test_plan_artifact_roundtrip_on_disk() {
        let p = planner(ScriptedCompletion::ok(SIX_ITEMS), false);
        let plan = p.plan("Why do bees swarm").await;
        assert_eq!(plan.summary, "Why do bees swarm");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        plan.save(&path).unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        for key in [
            "question_id",
            "original_prompt",
            "summary",
            "subquestions",
            "plan",
            "constraints",
            "metadata",
        ] {
            assert!(raw.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(raw["plan"][6]["action"], "synthesize");

        assert_eq!(ResearchPlan::load(&path).unwrap(), plan);
    }
}
