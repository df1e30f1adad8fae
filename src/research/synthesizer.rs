use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::llm::{Completion, CompletionFailure, CompletionOptions, Message};
use crate::search::types::RetrievalResult;

use super::citations::{append_bibliography, build_context, render_context, Citation};
use super::fallback::FallbackKind;
use super::prompts;
use super::recovery::{recover, Recovered};
use super::types::SubQuestion;

/// How the report text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOrigin {
    Model,
    /// Salvaged from a failed response by the named recovery strategy.
    Recovered(&'static str),
    ImmediateFallback,
    ServiceFallback,
    Placeholder,
}

impl ReportOrigin {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, ReportOrigin::Model | ReportOrigin::Recovered(_))
    }
}

impl fmt::Display for ReportOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportOrigin::Model => f.write_str("model"),
            ReportOrigin::Recovered(strategy) => write!(f, "recovered ({})", strategy),
            ReportOrigin::ImmediateFallback => f.write_str("immediate fallback"),
            ReportOrigin::ServiceFallback => f.write_str("service fallback"),
            ReportOrigin::Placeholder => f.write_str("placeholder"),
        }
    }
}

/// Only bodies cut short or left unparsed hold report text. An error page is
/// not a report, however much prose it has.
fn salvage(failure: &CompletionFailure) -> Option<Recovered> {
    match failure {
        CompletionFailure::Timeout { .. } | CompletionFailure::MalformedResponse { .. } => {
            failure.raw_body().and_then(recover)
        }
        CompletionFailure::HttpError { .. } | CompletionFailure::ConnectionRefused(_) => None,
    }
}

/// Raw report text with its bibliography appended. Never empty.
#[derive(Debug, Clone)]
pub struct Report {
    pub text: String,
    pub citations: Vec<Citation>,
    pub origin: ReportOrigin,
}

pub struct Synthesizer {
    llm: Arc<dyn Completion>,
    options: CompletionOptions,
    fallback_report_on_failure: bool,
}

impl Synthesizer {
    pub fn new(
        llm: Arc<dyn Completion>,
        options: CompletionOptions,
        fallback_report_on_failure: bool,
    ) -> Self {
        Self {
            llm,
            options,
            fallback_report_on_failure,
        }
    }

    /// Write the long-form report. Always returns text; failures degrade to
    /// recovered, template or placeholder output.
    pub async fn synthesize(
        &self,
        question: &str,
        subquestions: &[SubQuestion],
        retrieval: &RetrievalResult,
    ) -> Report {
        if retrieval.values().all(Vec::is_empty) {
            info!("No sources to synthesize from, using immediate fallback report");
            return Report {
                text: FallbackKind::Immediate.render(question),
                citations: Vec::new(),
                origin: ReportOrigin::ImmediateFallback,
            };
        }

        let (items, citations) = build_context(subquestions, retrieval);

        let context = render_context(&items);
        let messages = vec![
            Message::system(prompts::SYNTHESIS_SYSTEM_PROMPT),
            Message::user(prompts::synthesis_user_prompt(question, &context)),
        ];

        info!(
            sources = items.len(),
            context_len = context.len(),
            timeout_secs = self.options.timeout.as_secs(),
            "Generating report"
        );

        let (text, origin) = match self.llm.complete(&messages, self.options).await {
            Ok(text) if !text.trim().is_empty() => {
                info!(report_len = text.len(), "Report generated");
                (text, ReportOrigin::Model)
            }
            Ok(_) => {
                warn!("Writer returned an empty report");
                self.unrecoverable("the writing model returned an empty response", question)
            }
            Err(failure) => {
                warn!("Report completion failed: {}", failure);
                match salvage(&failure) {
                    Some(recovered) => {
                        info!(
                            strategy = recovered.strategy,
                            report_len = recovered.text.len(),
                            "Recovered report text from failed response"
                        );
                        (recovered.text, ReportOrigin::Recovered(recovered.strategy))
                    }
                    None => {
                        if let Some(body) = failure.raw_body() {
                            let preview: String = body.chars().take(1000).collect();
                            debug!(raw = %preview, "Nothing recoverable in response body");
                        }
                        self.unrecoverable(&failure.to_string(), question)
                    }
                }
            }
        };

        Report {
            text: append_bibliography(text, &citations),
            citations,
            origin,
        }
    }

    fn unrecoverable(&self, reason: &str, question: &str) -> (String, ReportOrigin) {
        if self.fallback_report_on_failure {
            (
                FallbackKind::ServiceUnavailable.render(question),
                ReportOrigin::ServiceFallback,
            )
        } else {
            (
                format!(
                    "Report generation failed: {}. Sources were retrieved, but no usable report \
                     text could be recovered from the writing model. Please try again or check \
                     the completion server logs.",
                    reason
                ),
                ReportOrigin::Placeholder,
            )
        }
    }
}
