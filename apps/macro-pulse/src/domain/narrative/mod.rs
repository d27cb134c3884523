//! Market Narrative Domain
//!
//! Section schema, prompt construction, reply parsing and the repair pass.
//! Everything here is pure; the completion call lives in the synthesizer
//! service.

pub mod parser;
pub mod prompt;
mod repair;
mod sections;

use serde::Serialize;

pub use parser::{ParseStrategy, default_chain, run_chain};
pub use prompt::{
    ChatPrompt, GENERIC_COMMENTARY, NarrativeContext, commentary_prompt, narrative_prompt,
    notable_events, templated_commentary,
};
pub use repair::{RepairReport, repair};
pub use sections::{
    MIN_SECTION_CHARS, NarrativeSections, PartialSections, SectionKey, is_substantial,
};

/// How the published sections were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeOutcome {
    /// Every section came from the reply.
    Generated,
    /// Some sections were repaired.
    Repaired,
    /// Every section is a placeholder.
    Substituted,
}

impl NarrativeOutcome {
    /// Label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Repaired => "repaired",
            Self::Substituted => "substituted",
        }
    }
}

/// Synthesized narrative with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Narrative {
    /// Complete section map.
    pub sections: NarrativeSections,
    /// How the sections were obtained.
    pub outcome: NarrativeOutcome,
    /// Parsing strategy that recovered sections, if any.
    pub strategy: Option<&'static str>,
    /// Sections replaced by the repair pass.
    pub repaired: usize,
    /// Why the model output was not used, if it was not.
    pub failure: Option<String>,
}

impl Narrative {
    /// Parse and repair a model reply.
    #[must_use]
    pub fn from_reply(raw: &str, chain: &[Box<dyn ParseStrategy>]) -> Self {
        let (partial, strategy) = match run_chain(chain, raw) {
            Some((partial, name)) => (partial, Some(name)),
            None => (PartialSections::new(), None),
        };
        let (sections, report) = repair(partial, raw);

        let outcome = if report.is_clean() {
            NarrativeOutcome::Generated
        } else if report.from_placeholder.len() == SectionKey::ALL.len() {
            NarrativeOutcome::Substituted
        } else {
            NarrativeOutcome::Repaired
        };

        let failure = (outcome == NarrativeOutcome::Substituted)
            .then(|| "completion reply contained no usable text".to_string());

        Self {
            sections,
            outcome,
            strategy,
            repaired: report.replaced(),
            failure,
        }
    }

    /// Placeholder narrative, with the reason when one applies.
    #[must_use]
    pub fn substituted(failure: Option<String>) -> Self {
        Self {
            sections: NarrativeSections::placeholders(),
            outcome: NarrativeOutcome::Substituted,
            strategy: None,
            repaired: SectionKey::ALL.len(),
            failure,
        }
    }
}

impl Default for Narrative {
    fn default() -> Self {
        Self::substituted(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labelled_reply_is_generated() {
        let reply = "[Market Focus]\nThe dollar holds firm as yields climb ahead of payrolls.\n\
                     [Key Events]\nNon-farm payrolls at 21:30 dominate the session calendar.\n\
                     [Pair Outlook]\nEURUSD stays capped below 1.0900 while USDJPY holds 150.\n\
                     [Risk Watch]\nA payrolls surprise could trigger sharp two-way volatility.";
        let narrative = Narrative::from_reply(reply, &default_chain());
        assert_eq!(narrative.outcome, NarrativeOutcome::Generated);
        assert_eq!(narrative.strategy, Some("label_anchored"));
        assert_eq!(narrative.repaired, 0);
        assert!(narrative.failure.is_none());
    }

    #[test]
    fn prose_label_phrases_do_not_move_sections() {
        let reply = "[Market Focus]\nThe dollar is firm. Key risks: a hot CPI print could extend the move higher.\n\
                     [Key Events]\nUS CPI at 20:30 leads the calendar: jobless claims follow on Thursday.\n\
                     [Pair Outlook]\nEURUSD capped below 1.0950 while USDJPY holds above 150.\n\
                     [Risk Watch]\nGeopolitical headlines could spark abrupt risk-off flows.";
        let narrative = Narrative::from_reply(reply, &default_chain());

        assert_eq!(narrative.outcome, NarrativeOutcome::Generated);
        assert!(narrative.sections.get(SectionKey::Market).ends_with("extend the move higher."));
        assert!(narrative.sections.get(SectionKey::Events).contains("the calendar: jobless"));
        assert_eq!(
            narrative.sections.get(SectionKey::Outlook),
            "EURUSD capped below 1.0950 while USDJPY holds above 150."
        );
        assert_eq!(
            narrative.sections.get(SectionKey::Risks),
            "Geopolitical headlines could spark abrupt risk-off flows."
        );
    }

    #[test]
    fn four_unlabelled_paragraphs_fill_all_sections() {
        let reply = "The dollar is firm this morning as Treasury yields extend gains.\n\n\
                     Payrolls and jobless claims are the key releases for the session.\n\n\
                     EURUSD remains heavy below resistance while gold consolidates.\n\n\
                     Watch for thin liquidity and headline risk into the weekend close.";
        let narrative = Narrative::from_reply(reply, &default_chain());
        assert_eq!(narrative.strategy, Some("paragraph"));
        assert_eq!(narrative.outcome, NarrativeOutcome::Generated);
        assert!(narrative.sections.is_complete());
        assert!(narrative.sections.get(SectionKey::Risks).starts_with("Watch for thin"));
    }

    #[test]
    fn blank_reply_is_substituted() {
        let narrative = Narrative::from_reply("  ", &default_chain());
        assert_eq!(narrative.outcome, NarrativeOutcome::Substituted);
        assert!(narrative.failure.is_some());
        assert_eq!(narrative.sections, NarrativeSections::placeholders());
    }

    #[test]
    fn partial_reply_is_repaired() {
        let reply = "[Market Focus]\nThe dollar holds firm as yields climb ahead of payrolls.";
        let narrative = Narrative::from_reply(reply, &default_chain());
        assert_eq!(narrative.outcome, NarrativeOutcome::Repaired);
        assert_eq!(narrative.repaired, 3);
        assert!(narrative.sections.is_complete());
    }
}
