//! LLM-assisted extraction and finalization — one bounded-trust call per turn.
//!
//! The model is asked for strict JSON and believed only as far as the schema
//! allows: extracted fields outside the missing-slot list are discarded, the
//! field count is truncated to the configured limit, and finalization needs
//! both the model's say-so and a confidence above threshold. Any transport
//! failure, timeout, or parse problem degrades to a deterministic fallback;
//! nothing in this module ever propagates an error to the turn.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use crate::config::EngineConfig;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::schema::SlotSchema;
use crate::session::Turn;

/// Result of one interview step. Always a complete, valid record.
#[derive(Debug, Clone, PartialEq)]
pub struct InterviewOutcome {
    /// Newly extracted slot values, at most `max_autofill` of them, all
    /// members of the missing-slot list passed in.
    pub added: BTreeMap<String, String>,
    /// The slot to ask about next, if any remain.
    pub next_slot: Option<String>,
    /// The model's proposed question, or a synthesized one. `None` only on
    /// the transport-failure fallback.
    pub next_question: Option<String>,
    /// Whether the interview can end. True only when the model asserts it
    /// AND confidence clears the threshold, or nothing is missing.
    pub finalize: bool,
    /// Model-reported confidence, clamped to [0, 1].
    pub confidence: f64,
}

/// Runs the single LLM call of a turn under the bounded-output contract.
pub struct InterviewStep {
    llm: Arc<dyn LlmProvider>,
    tone: String,
    max_autofill: usize,
    confidence_threshold: f64,
    timeout: Duration,
}

impl InterviewStep {
    pub fn new(llm: Arc<dyn LlmProvider>, config: &EngineConfig) -> Self {
        Self {
            llm,
            tone: config.tone.clone(),
            max_autofill: config.max_autofill,
            confidence_threshold: config.confidence_threshold,
            timeout: config.llm_timeout,
        }
    }

    /// Run one interview step. Never fails; every failure path returns the
    /// deterministic fallback.
    pub async fn step(
        &self,
        description: &str,
        answers: &BTreeMap<String, String>,
        latest_text: &str,
        missing: &[&str],
        history: &[&Turn],
    ) -> InterviewOutcome {
        if missing.is_empty() {
            // The schema is satisfied; no point in a network round trip.
            return InterviewOutcome {
                added: BTreeMap::new(),
                next_slot: None,
                next_question: None,
                finalize: true,
                confidence: 0.0,
            };
        }

        let payload = json!({
            "project_description": description,
            "latest_user_text": latest_text,
            "already_answered": answers,
            "remaining_fields": missing,
            "max_autofill": self.max_autofill,
            "conversation": history
                .iter()
                .map(|t| json!({"role": t.role.to_string(), "content": t.content}))
                .collect::<Vec<_>>(),
        });

        let request = CompletionRequest::new(vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(payload.to_string()),
        ])
        .with_max_tokens(512)
        .with_temperature(0.3);

        let response = match tokio::time::timeout(self.timeout, self.llm.complete(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(model = self.llm.model_name(), error = %e,
                    "interview step call failed, falling back to deterministic path");
                return self.fallback(missing);
            }
            Err(_) => {
                tracing::warn!(model = self.llm.model_name(), timeout = ?self.timeout,
                    "interview step timed out, falling back to deterministic path");
                return self.fallback(missing);
            }
        };

        self.apply(decode_or_default(&response.content), missing)
    }

    /// Safe default when the call cannot be made or trusted at all.
    fn fallback(&self, missing: &[&str]) -> InterviewOutcome {
        InterviewOutcome {
            added: BTreeMap::new(),
            next_slot: missing.first().map(|s| s.to_string()),
            next_question: None,
            finalize: missing.is_empty(),
            confidence: 0.0,
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are an intake analyst running a short project interview.\n\
             Tone: {tone}. Ask at most one crisp, natural question per turn.\n\
             Tasks this turn:\n\
             1) From the user's latest text, infer up to {k} missing fields, only when explicit.\n\
             2) Decide whether enough is known to assess viability (confidence 0..1).\n\
             3) If not finalizing, choose ONE next field from remaining_fields and ask ONE short question.\n\
             Return STRICT JSON only:\n\
             {{ \"added\": {{\"<field>\": \"<value>\"}}, \"confidence\": 0.0, \"finalize\": false, \
             \"next_field\": \"<field or null>\", \"next_question\": \"<one sentence or null>\" }}",
            tone = self.tone,
            k = self.max_autofill,
        )
    }

    /// Validate and bound a decoded model response.
    fn apply(&self, data: Value, missing: &[&str]) -> InterviewOutcome {
        // Keep only extracted fields we actually asked for, in the schema's
        // declaration order (the order of `missing`), truncated to the limit.
        let mut added = BTreeMap::new();
        if let Some(object) = data.get("added").and_then(Value::as_object) {
            for key in missing {
                if added.len() >= self.max_autofill {
                    break;
                }
                if let Some(text) = object.get(*key).and_then(value_as_text) {
                    if !text.trim().is_empty() {
                        added.insert(key.to_string(), text.trim().to_string());
                    }
                }
            }
        }

        // A proposed field outside the missing list is a hallucination.
        let next_slot = data
            .get("next_field")
            .and_then(Value::as_str)
            .filter(|field| missing.contains(field))
            .map(String::from)
            .or_else(|| missing.first().map(|s| s.to_string()));

        let confidence = data
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);

        // Both gates must pass: the model's flag alone is not trusted and
        // confidence alone is not a decision.
        let finalize = data.get("finalize").and_then(Value::as_bool).unwrap_or(false)
            && confidence >= self.confidence_threshold;

        let next_question = data
            .get("next_question")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(String::from)
            .or_else(|| {
                next_slot.as_ref().map(|slot| {
                    format!(
                        "Could you share a quick detail for {}?",
                        SlotSchema::display_name(slot)
                    )
                })
            });

        InterviewOutcome {
            added,
            next_slot,
            next_question,
            finalize,
            confidence,
        }
    }
}

/// Decode model output as JSON, defensively.
///
/// Tries the raw text first, then the region between the first `{` and the
/// last `}` (models like wrapping JSON in prose or fences). Anything else is
/// an empty object; this function never fails.
fn decode_or_default(text: &str) -> Value {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return value;
        }
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                if value.is_object() {
                    return value;
                }
            }
        }
    }
    tracing::warn!("interview step returned non-JSON output, treating as empty");
    json!({})
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
