//! Engine configuration.

use std::time::Duration;

use crate::error::ConfigError;

/// Tunable knobs for the interview engine.
///
/// Every field has a sensible default; `from_env` overrides from `INTAKE_*`
/// environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tone hint passed to the LLM system prompt.
    pub tone: String,
    /// Maximum number of slots the LLM step may fill per turn (K).
    pub max_autofill: usize,
    /// Confidence the model must report before a finalize flag is honored.
    pub confidence_threshold: f64,
    /// Minimum answered slots a caller may want before offering analysis.
    /// The engine itself does not gate on this; it is surfaced for callers.
    pub min_answers: usize,
    /// Hard character ceiling for a shaped reply.
    pub reply_max_chars: usize,
    /// Character budget for conversation history sent to the LLM step.
    pub history_char_budget: usize,
    /// Timeout for the single LLM call per turn.
    pub llm_timeout: Duration,
    /// Age past which `FileSessionStore::prune_older_than` removes a session.
    pub session_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tone: "warm, consultative, concise, pragmatic".to_string(),
            max_autofill: 1,
            confidence_threshold: 0.68,
            min_answers: 6,
            reply_max_chars: 480,
            history_char_budget: 6_000,
            llm_timeout: Duration::from_secs(20),
            session_ttl: Duration::from_secs(30 * 24 * 3600),
        }
    }
}

impl EngineConfig {
    /// Build a config from `INTAKE_*` environment variables, falling back to
    /// defaults for anything unset. Set but unparseable values are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(tone) = std::env::var("INTAKE_TONE") {
            if !tone.trim().is_empty() {
                config.tone = tone;
            }
        }
        config.max_autofill = parse_var("INTAKE_MAX_AUTOFILL", config.max_autofill)?;
        config.confidence_threshold = parse_var(
            "INTAKE_CONFIDENCE_THRESHOLD",
            config.confidence_threshold,
        )?
        .clamp(0.0, 1.0);
        config.min_answers = parse_var("INTAKE_MIN_ANSWERS", config.min_answers)?.max(1);
        config.reply_max_chars = parse_var("INTAKE_REPLY_MAX_CHARS", config.reply_max_chars)?;
        config.history_char_budget =
            parse_var("INTAKE_HISTORY_CHAR_BUDGET", config.history_char_budget)?;
        config.llm_timeout = Duration::from_secs(parse_var(
            "INTAKE_LLM_TIMEOUT_SECS",
            config.llm_timeout.as_secs(),
        )?);
        config.session_ttl = Duration::from_secs(parse_var(
            "INTAKE_SESSION_TTL_SECS",
            config.session_ttl.as_secs(),
        )?);

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
