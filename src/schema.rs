//! Slot schema — the fixed registry of fields the interview collects.
//!
//! Each slot carries a relative importance weight, the canonical fallback
//! question, and an ordered family of recognition patterns. Patterns are
//! intentionally permissive surface matchers evaluated first-match-wins;
//! anything they miss is left for the LLM step or a later turn.

use regex::Regex;

use crate::session::SlotValues;

/// One named field of the intake.
#[derive(Debug, Clone)]
pub struct Slot {
    /// Stable identifier, also the key in the persisted slot map.
    pub key: &'static str,
    /// Relative importance for readiness scoring and question selection.
    pub weight: f64,
    /// Canonical question asked when this slot is selected.
    pub question: &'static str,
    /// Recognition patterns, evaluated in order against normalized text.
    pub patterns: Vec<Regex>,
}

/// The full slot registry. Built once at startup, read-only afterwards.
#[derive(Debug, Clone)]
pub struct SlotSchema {
    slots: Vec<Slot>,
    closing: &'static str,
}

impl SlotSchema {
    /// Build a schema from an explicit slot list.
    ///
    /// `closing` names the slot whose question is re-asked once everything is
    /// filled; it must be a member of `slots`.
    pub fn new(slots: Vec<Slot>, closing: &'static str) -> Self {
        debug_assert!(slots.iter().any(|s| s.key == closing));
        debug_assert!(slots.iter().all(|s| s.weight > 0.0));
        Self { slots, closing }
    }

    /// The standard nine-slot viability intake.
    pub fn standard() -> Self {
        let slots = vec![
            Slot {
                key: "target",
                weight: 2.0,
                question: "Who exactly is the buyer (role, company size, industry) and what job are they hiring you to do?",
                patterns: patterns(&[
                    r"\b(smb|mid[- ]market|enterprise|consumer|buyers?|developers?)\b",
                    r"\b(professionals?|students?|parents?|freelancers?|founders?|retirees)\b",
                    r"\b(it|ops|finance|marketing|sales) (teams?|leaders?|managers?)\b",
                ]),
            },
            Slot {
                key: "problem",
                weight: 2.0,
                question: "What painful, measurable problem do they have today and how do they handle it now?",
                patterns: patterns(&[
                    r"\b(pain|problem|churn|latency|downtime|overrun|bottlenecks?)\b",
                    r"\b(support (tickets?|backlog)|manual (work|processes?)|inefficienc\w+)\b",
                ]),
            },
            Slot {
                key: "solution",
                weight: 1.8,
                question: "Briefly, what is the solution's core mechanism of value versus the status quo?",
                patterns: patterns(&[
                    r"\b(saas|platform|tool|api|service|app|analytics|agent|automation)\b",
                ]),
            },
            Slot {
                key: "budget",
                weight: 1.2,
                question: "What total budget (order of magnitude) can you commit over the next 6-12 months?",
                patterns: patterns(&[
                    r"\$\s?\d[\d,]*(?:\.\d+)?\s*(?:k|m|mm|million|thousand)?\b",
                    r"\bbudget (?:of |is |around )?\d[\d,]*\s*(?:k|m|million)?\b",
                ]),
            },
            Slot {
                key: "timeline",
                weight: 1.2,
                question: "What is the target go-live date or time window you are driving toward?",
                patterns: patterns(&[
                    r"\bq[1-4]\s*\d{4}\b",
                    r"\b\d+\s*(?:weeks?|months?|quarters?|years?)\b",
                    r"\bby \w+ \d{4}\b",
                    r"\b(?:next year|this year|year[- ]end|end of year|eoy)\b",
                ]),
            },
            Slot {
                key: "channel",
                weight: 1.0,
                question: "Which acquisition channel will likely yield the first scalable traction?",
                patterns: patterns(&[
                    r"\b(seo|sem|paid ads|ad spend|partners?|resellers?|referrals?)\b",
                    r"\b(word of mouth|outbound|inbound|social media|app store|events?)\b",
                ]),
            },
            Slot {
                key: "risks",
                weight: 1.0,
                question: "What is the most material risk to the plan and how would you mitigate it?",
                patterns: patterns(&[
                    r"\b(risks?|dependenc\w+|regulatory|privacy|gdpr|security|capex)\b",
                ]),
            },
            Slot {
                key: "kpi",
                weight: 0.8,
                question: "What single KPI will define success at the end of this phase?",
                patterns: patterns(&[
                    r"\b\d+%\s*(?:conversion|retention|growth|margin)\b",
                    r"\b(roi|payback|ltv|cac|mrr|arr|ebitda|retention|conversion|nps)\b",
                ]),
            },
            Slot {
                key: "constraints",
                weight: 0.6,
                question: "What hard constraints (team, data access, compliance) could block progress?",
                patterns: patterns(&[
                    r"\b(hiring|headcount|data access|integration|compliance gates?)\b",
                    r"\b(budget ceiling|solo founder|part[- ]time|no engineers?)\b",
                ]),
            },
        ];
        Self::new(slots, "risks")
    }

    /// Slots in declaration order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Look up a slot by key.
    pub fn get(&self, key: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.key == key)
    }

    /// Whether `key` names a slot in this schema.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// The designated closing slot, re-asked once every slot is filled.
    pub fn closing_slot(&self) -> &Slot {
        self.get(self.closing)
            .expect("closing slot is a schema member")
    }

    /// Sum of all slot weights.
    pub fn total_weight(&self) -> f64 {
        self.slots.iter().map(|s| s.weight).sum()
    }

    /// A slot map with every key present and no values.
    pub fn empty_values(&self) -> SlotValues {
        self.slots
            .iter()
            .map(|s| (s.key.to_string(), None))
            .collect()
    }

    /// Keys of slots with no value, in declaration order.
    pub fn missing(&self, values: &SlotValues) -> Vec<&'static str> {
        self.slots
            .iter()
            .filter(|s| values.get(s.key).map(Option::is_none).unwrap_or(true))
            .map(|s| s.key)
            .collect()
    }

    /// Human-readable name for a slot key ("acquisition_channel" -> "acquisition channel").
    pub fn display_name(key: &str) -> String {
        key.replace('_', " ")
    }
}

fn patterns(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|s| Regex::new(s).expect("slot pattern compiles"))
        .collect()
}
