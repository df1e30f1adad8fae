pub const PLANNER_SYSTEM_PROMPT: &str = "You are a research planning expert. Break the research question \
into EXACTLY 6-8 atomic, non-overlapping, answerable subquestions. Return ONLY a JSON array with no \
markdown and no commentary. Each item is an object: {\"id\": \"q1\", \"text\": \"...\", \"priority\": 1, \
\"type\": \"analysis\"}. Allowed types: background, definition, analysis, methodology, causal, impact, \
comparative, historical. Priority 1 is the most important. Keep each subquestion at most 140 characters. \
You MUST produce between 6 and 8 items.";

pub const PLANNER_EXAMPLE: &str = r#"EXAMPLE:
User prompt: "What are the main impacts of artificial intelligence?"
Output JSON:
[
  {"id": "q1", "text": "What are the main types of AI technologies?", "priority": 1, "type": "background"},
  {"id": "q2", "text": "How do AI systems process information?", "priority": 2, "type": "methodology"},
  {"id": "q3", "text": "What are the economic impacts of AI adoption?", "priority": 3, "type": "impact"},
  {"id": "q4", "text": "What ethical challenges does AI deployment raise?", "priority": 4, "type": "analysis"},
  {"id": "q5", "text": "How does AI compare to traditional software approaches?", "priority": 5, "type": "comparative"},
  {"id": "q6", "text": "How has AI research evolved over the last decades?", "priority": 6, "type": "historical"}
]"#;

pub fn planner_user_prompt(question: &str) -> String {
    format!(
        "{}\n\nProduce EXACTLY 6-8 focused subquestions for the research question below. \
         Output ONLY the JSON array.\n\nResearch question:\n{}\n\n\
         Keep items concise, non-overlapping and answerable.",
        PLANNER_EXAMPLE, question
    )
}

pub const SYNTHESIS_SYSTEM_PROMPT: &str = "You are an expert research writer. Write an 8-paragraph \
academic report. Every paragraph has 5-7 sentences and 120-180 words. Paragraph order: \
1) Introduction, 2) Background, 3) Literature Review, 4) Methodology/Approach, 5) Analysis, \
6) Implications, 7) Challenges/Limitations, 8) Conclusion. Use a formal academic tone and cite \
sources inline with the bracketed citation keys you are given, e.g. [Q11]. Do not write headings \
or a question/answer format; produce one flowing narrative.";

pub fn synthesis_user_prompt(question: &str, context: &str) -> String {
    format!(
        "Research Question: {question}\n\n\
         Research Materials with Citations:\n{context}\n\n\
         Write the 8-paragraph report:\n\
         1. Introduction (significance, context)\n\
         2. Background (current state, key concepts)\n\
         3. Literature Review (existing research, perspectives)\n\
         4. Methodology/Approach (analytical framework)\n\
         5. Analysis (findings with citations and evidence)\n\
         6. Implications (practical impact, applications)\n\
         7. Challenges/Limitations (constraints, open problems)\n\
         8. Conclusion (summary, recommendations)\n\n\
         Each paragraph: 5-7 sentences, 120-180 words, with citations. \
         Output only the report text."
    )
}
