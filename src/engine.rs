//! Turn handler — orchestrates one interview turn end to end.
//!
//! The engine is stateless between turns; every piece of conversation state
//! lives in the `SessionStore`. Each turn runs a fixed pipeline: load,
//! append the user turn, deterministic extraction over all user text, the
//! optional LLM step over trimmed history, merge, score, select, shape,
//! append the assistant turn, persist. Only the LLM step may be skipped.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::llm::{InterviewOutcome, InterviewStep, LlmProvider};
use crate::schema::SlotSchema;
use crate::session::{Session, SessionState, Turn};
use crate::store::SessionStore;
use crate::{extract, score, select, shape};

/// What one processed turn hands back to the caller.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: String,
    pub reply: String,
    pub readiness: u8,
    pub state: SessionState,
}

/// The intake interview engine.
pub struct IntakeEngine {
    schema: SlotSchema,
    store: Arc<dyn SessionStore>,
    interview: Option<InterviewStep>,
    config: EngineConfig,
}

impl IntakeEngine {
    /// Deterministic-only engine; no LLM calls are ever made.
    pub fn new(store: Arc<dyn SessionStore>, config: EngineConfig) -> Self {
        Self {
            schema: SlotSchema::standard(),
            store,
            interview: None,
            config,
        }
    }

    /// Attach an LLM provider, enabling the per-turn interview step.
    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.interview = Some(InterviewStep::new(provider, &self.config));
        self
    }

    pub fn schema(&self) -> &SlotSchema {
        &self.schema
    }

    /// Start a new interview from a project description.
    ///
    /// The description becomes the first user turn of a fresh session.
    pub async fn start(&self, description: &str) -> Result<TurnOutcome> {
        if description.trim().is_empty() {
            return Err(Error::EmptyDescription);
        }
        let session = Session::new(Session::new_id());
        self.process_turn(session, description).await
    }

    /// Continue an existing interview with the latest user text.
    ///
    /// An unknown id loads as a fresh session rather than failing; storage
    /// gaps degrade to a restart instead of a dead conversation.
    pub async fn continue_turn(&self, id: &str, text: &str) -> Result<TurnOutcome> {
        if id.trim().is_empty() || text.trim().is_empty() {
            return Err(Error::EmptyMessage);
        }
        let session = self.store.load(id).await?;
        self.process_turn(session, text).await
    }

    /// Sweep sessions whose last update is older than the configured TTL.
    pub async fn prune_stale_sessions(&self) -> Result<usize> {
        Ok(self.store.prune_older_than(self.config.session_ttl).await?)
    }

    async fn process_turn(&self, mut session: Session, text: &str) -> Result<TurnOutcome> {
        session.append(Turn::user(text.trim()));

        // Deterministic extraction recomputes from all user text every turn;
        // values only the LLM ever found are carried forward from the cached
        // snapshot rather than lost.
        let mut values = extract::extract(&self.schema, &session.user_text());
        for (key, value) in &session.slot_values {
            if let Some(prior) = value {
                let entry = values.entry(key.clone()).or_insert(None);
                if entry.is_none() {
                    *entry = Some(prior.clone());
                }
            }
        }

        let outcome = self.run_interview_step(&session, text, &values).await;

        if let Some(outcome) = &outcome {
            // LLM-extracted values win for slots touched this turn. The
            // interview step already filtered them to missing slots, so
            // nothing known is overwritten.
            for (key, value) in &outcome.added {
                values.insert(key.clone(), Some(value.clone()));
            }
        }

        let readiness = score::readiness(&self.schema, &values);
        let (_slot, fallback_question) = select::next_question(&self.schema, &values);
        let raw = outcome
            .as_ref()
            .and_then(|o| o.next_question.as_deref())
            .unwrap_or("");

        let reply = shape::shape_reply(
            raw,
            fallback_question,
            session.last_assistant(),
            self.config.reply_max_chars,
        );

        // Finalization is terminal; the state never reverts.
        let finalize = self.schema.missing(&values).is_empty()
            || outcome.as_ref().is_some_and(|o| o.finalize);
        let state = if session.state.is_terminal() || finalize {
            SessionState::ReadyToFinalize
        } else {
            SessionState::GatheringInfo
        };
        if state != session.state {
            tracing::info!(session_id = %session.id, readiness, "interview ready to finalize");
        }

        session.append(Turn::assistant(reply.clone()));
        session.slot_values = values;
        session.state = state;
        self.store.save(&session).await?;

        Ok(TurnOutcome {
            session_id: session.id,
            reply,
            readiness,
            state,
        })
    }

    /// Run the LLM step if a provider is attached and slots are missing.
    /// Returns `None` when the engine is deterministic-only.
    async fn run_interview_step(
        &self,
        session: &Session,
        latest_text: &str,
        values: &crate::session::SlotValues,
    ) -> Option<InterviewOutcome> {
        let interview = self.interview.as_ref()?;

        let missing = self.schema.missing(values);
        let answers: std::collections::BTreeMap<String, String> = values
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
            .collect();
        let description = session
            .turns
            .iter()
            .find(|t| t.role == crate::session::Role::User)
            .map(|t| t.content.as_str())
            .unwrap_or_default();
        let history = session.trimmed_history(self.config.history_char_budget);

        Some(
            interview
                .step(description, &answers, latest_text, &missing, &history)
                .await,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileSessionStore;

    async fn engine() -> (tempfile::TempDir, IntakeEngine) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).await.unwrap();
        let engine = IntakeEngine::new(Arc::new(store), EngineConfig::default());
        (dir, engine)
    }

    #[tokio::test]
    async fn start_rejects_empty_description() {
        let (_dir, engine) = engine().await;
        assert!(matches!(
            engine.start("   ").await,
            Err(Error::EmptyDescription)
        ));
    }

    #[tokio::test]
    async fn continue_rejects_missing_id_or_text() {
        let (_dir, engine) = engine().await;
        assert!(matches!(
            engine.continue_turn("", "hello").await,
            Err(Error::EmptyMessage)
        ));
        assert!(matches!(
            engine.continue_turn("conv_x", "  ").await,
            Err(Error::EmptyMessage)
        ));
    }

    #[tokio::test]
    async fn start_produces_a_question_and_a_persisted_session() {
        let (_dir, engine) = engine().await;
        let outcome = engine
            .start("An app for busy professionals who struggle to plan meals")
            .await
            .unwrap();
        assert!(outcome.session_id.starts_with("conv_"));
        assert_eq!(outcome.reply.matches('?').count(), 1);
        assert_eq!(outcome.state, SessionState::GatheringInfo);
        assert!(outcome.readiness > 0);

        let session = engine.store.load(&outcome.session_id).await.unwrap();
        assert_eq!(session.turns.len(), 2);
        assert_eq!(session.turns[1].content, outcome.reply);
    }

    #[tokio::test]
    async fn unknown_id_continues_as_a_fresh_session() {
        let (_dir, engine) = engine().await;
        let outcome = engine
            .continue_turn("conv_never_seen", "we sell to dentists")
            .await
            .unwrap();
        assert_eq!(outcome.session_id, "conv_never_seen");
        assert_eq!(outcome.state, SessionState::GatheringInfo);
    }

    #[tokio::test]
    async fn readiness_never_decreases_across_turns() {
        let (_dir, engine) = engine().await;
        let start = engine
            .start("A meal-planning app for busy professionals")
            .await
            .unwrap();
        let mut last = start.readiness;
        for text in [
            "the problem is people struggle to find time to cook",
            "budget is $50k and we want to launch in 6 months",
            "we'll grow through seo and content marketing",
        ] {
            let outcome = engine
                .continue_turn(&start.session_id, text)
                .await
                .unwrap();
            assert!(
                outcome.readiness >= last,
                "readiness fell from {last} to {}",
                outcome.readiness
            );
            last = outcome.readiness;
        }
    }

    #[tokio::test]
    async fn deterministic_full_fill_reaches_ready_to_finalize() {
        let (_dir, engine) = engine().await;
        let start = engine
            .start("An app for busy professionals, solving the problem of meal planning")
            .await
            .unwrap();
        let outcome = engine
            .continue_turn(
                &start.session_id,
                "budget is $50k, timeline is 6 months, acquisition via seo, \
                 main risk is churn, kpi is 20% conversion, and we have limited data access",
            )
            .await
            .unwrap();
        assert_eq!(outcome.readiness, 100);
        assert_eq!(outcome.state, SessionState::ReadyToFinalize);
        // The closing question still goes out; finalization is a state, not
        // a goodbye message.
        assert_eq!(outcome.reply.matches('?').count(), 1);
    }

    #[tokio::test]
    async fn finalized_state_is_sticky() {
        let (_dir, engine) = engine().await;
        let start = engine
            .start("An app for busy professionals, solving the problem of meal planning")
            .await
            .unwrap();
        let done = engine
            .continue_turn(
                &start.session_id,
                "budget is $50k, timeline is 6 months, acquisition via seo, \
                 main risk is churn, kpi is 20% conversion, and we have limited data access",
            )
            .await
            .unwrap();
        assert_eq!(done.state, SessionState::ReadyToFinalize);

        let after = engine
            .continue_turn(&start.session_id, "one more thought: pricing")
            .await
            .unwrap();
        assert_eq!(after.state, SessionState::ReadyToFinalize);
    }
}
