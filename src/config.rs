use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::llm::CompletionOptions;

/// Upper bound for any stage timeout. Larger values are clamped.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Runtime knobs for the research pipeline. Defaults target a local
/// LM Studio style server and the public Tavily search API.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub search_url: String,
    pub search_api_key: String,
    pub plan_timeout: Duration,
    pub synthesis_timeout: Duration,
    pub search_timeout: Duration,
    pub plan_max_tokens: u32,
    pub synthesis_max_tokens: u32,
    pub temperature: f32,
    /// Reject model plans with fewer than 6 or more than 8 sub-questions.
    pub strict_subquestion_count: bool,
    /// Use the service-fallback template report instead of a short
    /// placeholder when synthesis cannot be recovered.
    pub fallback_report_on_failure: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            llm_base_url: "http://127.0.0.1:1234/v1".to_string(),
            llm_model: "local-model".to_string(),
            llm_api_key: None,
            search_url: "https://api.tavily.com/search".to_string(),
            search_api_key: String::new(),
            plan_timeout: Duration::from_secs(180),
            synthesis_timeout: Duration::from_secs(600),
            search_timeout: Duration::from_secs(30),
            plan_max_tokens: 1024,
            synthesis_max_tokens: 3072,
            temperature: 0.3,
            strict_subquestion_count: false,
            fallback_report_on_failure: false,
        }
    }
}

impl PipelineConfig {
    /// Overlay environment variables (and `.env`, if loaded) on the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = dotenv::var("LLM_BASE_URL") {
            config.llm_base_url = url;
        }
        if let Ok(model) = dotenv::var("LLM_MODEL") {
            config.llm_model = model;
        }
        config.llm_api_key = dotenv::var("LLM_API_KEY").ok().filter(|k| !k.is_empty());

        if let Ok(url) = dotenv::var("SEARCH_URL") {
            config.search_url = url;
        }
        if let Some(key) = dotenv::var("SEARCH_API_KEY")
            .or_else(|_| dotenv::var("TAVILY_API_KEY"))
            .ok()
        {
            config.search_api_key = key;
        }

        if let Some(timeout) = timeout_var("PLAN_TIMEOUT_SECS") {
            config.plan_timeout = timeout;
        }
        if let Some(timeout) = timeout_var("SYNTHESIS_TIMEOUT_SECS") {
            config.synthesis_timeout = timeout;
        }
        if let Some(timeout) = timeout_var("SEARCH_TIMEOUT_SECS") {
            config.search_timeout = timeout;
        }
        if let Some(n) = parse_var("PLAN_MAX_TOKENS") {
            config.plan_max_tokens = n;
        }
        if let Some(n) = parse_var("SYNTHESIS_MAX_TOKENS") {
            config.synthesis_max_tokens = n;
        }
        if let Some(t) = parse_var("LLM_TEMPERATURE") {
            config.temperature = t;
        }
        if let Some(b) = parse_var("STRICT_SUBQUESTION_COUNT") {
            config.strict_subquestion_count = b;
        }
        if let Some(b) = parse_var("FALLBACK_REPORT_ON_FAILURE") {
            config.fallback_report_on_failure = b;
        }

        config
    }

    pub fn plan_options(&self) -> CompletionOptions {
        CompletionOptions {
            max_tokens: self.plan_max_tokens,
            temperature: self.temperature,
            timeout: self.plan_timeout,
        }
    }

    pub fn synthesis_options(&self) -> CompletionOptions {
        CompletionOptions {
            max_tokens: self.synthesis_max_tokens,
            temperature: self.temperature,
            timeout: self.synthesis_timeout,
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = dotenv::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "Ignoring unparseable config value");
            None
        }
    }
}

fn timeout_var(name: &str) -> Option<Duration> {
    let secs = parse_var::<u64>(name)?;
    let timeout = clamp_timeout(secs);
    if timeout.as_secs() < secs {
        warn!(var = name, secs, max_secs = MAX_TIMEOUT.as_secs(), "Clamping timeout");
    }
    Some(timeout)
}

fn clamp_timeout(secs: u64) -> Duration {
    Duration::from_secs(secs).min(MAX_TIMEOUT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.plan_timeout, Duration::from_secs(180));
        assert_eq!(config.synthesis_timeout, Duration::from_secs(600));
        assert!(config.synthesis_timeout > config.plan_timeout);
        assert!(!config.strict_subquestion_count);
        assert_eq!(config.plan_options().max_tokens, 1024);
        assert_eq!(config.synthesis_options().max_tokens, 3072);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        std::env::set_var("DEEP_RESEARCHER_TEST_GARBAGE", "not-a-number");
        assert_eq!(parse_var::<u64>("DEEP_RESEARCHER_TEST_GARBAGE"), None);
        std::env::set_var("DEEP_RESEARCHER_TEST_NUMBER", " 42 ");
        assert_eq!(parse_var::<u64>("DEEP_RESEARCHER_TEST_NUMBER"), Some(42));
        assert_eq!(parse_var::<u64>("DEEP_RESEARCHER_TEST_UNSET"), None);
    }

    #[test]
    fn test_huge_timeout_clamped() {
        assert_eq!(clamp_timeout(600), Duration::from_secs(600));
        assert_eq!(clamp_timeout(u64::MAX), MAX_TIMEOUT);

        std::env::set_var("DEEP_RESEARCHER_TEST_TIMEOUT", u64::MAX.to_string());
        assert_eq!(timeout_var("DEEP_RESEARCHER_TEST_TIMEOUT"), Some(MAX_TIMEOUT));
        assert_eq!(timeout_var("DEEP_RESEARCHER_TEST_TIMEOUT_UNSET"), None);
    }
}
