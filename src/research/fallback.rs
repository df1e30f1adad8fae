//! Deterministic report templates used when no model output is usable.
//!
//! Each template set is an immutable table of `(stage, template)` rows; the
//! only parameter is the lowercased research question, substituted for
//! `{topic}`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Introduction,
    Background,
    Analysis,
    Implications,
    FutureDirections,
    Note,
}

/// Which template set to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    /// Retrieval produced nothing, so the model was never called.
    Immediate,
    /// The model was called but its output could not be used.
    ServiceUnavailable,
}

type Template = (Stage, &'static str);

const IMMEDIATE: &[Template] = &[
    (
        Stage::Introduction,
        "The investigation into {topic} is a substantive area of inquiry that merits careful study. \
         This report outlines the main dimensions of the subject and the questions it raises for \
         researchers and practitioners. Interest in the topic has grown steadily as its relevance to \
         policy, industry and everyday life has become clearer. A structured overview helps frame \
         what is known and where the open problems lie.",
    ),
    (
        Stage::Background,
        "Existing knowledge about {topic} has developed through several phases, moving from early \
         conceptual work toward more rigorous empirical study. Foundational ideas established the \
         vocabulary and methods that later work built upon. More recent contributions emphasise \
         interdisciplinary perspectives and better measurement. Placing current work in this \
         context makes it easier to judge which claims are settled and which remain contested.",
    ),
    (
        Stage::Analysis,
        "Examining {topic} reveals a set of interacting factors rather than a single dominant cause. \
         Theoretical frameworks offer useful lenses, although the empirical evidence available for \
         this report was limited. Methodological advances continue to sharpen what can be measured \
         and compared. Together these strands point to relationships that deserve closer and more \
         systematic investigation.",
    ),
    (
        Stage::Implications,
        "The practical implications of {topic} reach beyond academic debate into policy, \
         professional practice and organisational decisions. Applying findings well requires \
         attention to context, resources and the interests of affected stakeholders. Benefits are \
         most likely where evidence is translated carefully rather than adopted wholesale. Decision \
         makers should weigh both the opportunities and the risks before acting.",
    ),
    (
        Stage::FutureDirections,
        "Future work on {topic} should concentrate on the gaps that current evidence leaves open. \
         Longitudinal and comparative studies would show how findings hold across settings and over \
         time. Collaboration across disciplines is likely to yield the most durable insights. New \
         data sources and analytical tools make such work more feasible than before.",
    ),
    (
        Stage::Note,
        "Note: This is an immediate fallback report generated because the search step returned no \
         sources. Try again with different sub-questions or search settings for an analysis grounded \
         in current sources and citations.",
    ),
];

const SERVICE_UNAVAILABLE: &[Template] = &[
    (
        Stage::Introduction,
        "The field of {topic} is a significant area of contemporary research and practice. This \
         report summarises its fundamental aspects and the reasons it attracts sustained attention. \
         Researchers and practitioners increasingly recognise the need to examine its many \
         dimensions in depth. Such inquiry informs both future research and practical decisions.",
    ),
    (
        Stage::Background,
        "Work on {topic} has evolved through distinct stages of development and refinement. Early \
         theoretical foundations gave way to approaches that integrate newer methods and \
         technologies. Shifts in societal needs and available tools have shaped the direction of \
         that work. Understanding this trajectory is essential for interpreting current efforts.",
    ),
    (
        Stage::Analysis,
        "The available material on {topic} points to several recurring findings. Components of the \
         domain are closely interconnected, which favours holistic rather than piecemeal approaches. \
         Studies identify both critical success factors and persistent obstacles. These findings \
         together support more evidence-based decisions.",
    ),
    (
        Stage::Implications,
        "The implications of {topic} extend across many sectors and applications. Implementation \
         challenges differ with organisational structure, resources and stakeholder engagement. \
         Realising the potential benefits requires balancing innovation against practical \
         constraints. Careful strategy can maximise positive outcomes while limiting risk.",
    ),
    (
        Stage::FutureDirections,
        "Subsequent work on {topic} should address current knowledge gaps and emerging \
         opportunities. Methodological innovation and interdisciplinary collaboration will be \
         central to progress. Longitudinal and cross-cultural studies can test how well findings \
         transfer between contexts. Continued effort will support more effective and sustainable \
         solutions.",
    ),
    (
        Stage::Note,
        "Note: This is a fallback report generated because the writing service was unavailable. \
         Please try again for a full analysis with current research data and citations.",
    ),
];

impl FallbackKind {
    fn table(self) -> &'static [Template] {
        match self {
            FallbackKind::Immediate => IMMEDIATE,
            FallbackKind::ServiceUnavailable => SERVICE_UNAVAILABLE,
        }
    }

    /// Render one stage of this template set, if it has one.
    pub fn render_stage(self, stage: Stage, question: &str) -> Option<String> {
        let topic = question.to_lowercase();
        self.table()
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, template)| template.replace("{topic}", &topic))
    }

    /// All stages in order, one paragraph each, blank-line separated.
    pub fn render(self, question: &str) -> String {
        let topic = question.to_lowercase();
        self.table()
            .iter()
            .map(|(_, template)| template.replace("{topic}", &topic))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
