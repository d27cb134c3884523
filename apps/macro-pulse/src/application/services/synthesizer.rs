//! Narrative Synthesizer
//!
//! One completion call per refresh for the sectioned report, plus one
//! sequential call per notable event for commentary. Every call has its own
//! deadline. Failures never escape: the report falls back to placeholders
//! and commentary to a template.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::application::ports::{CompletionError, CompletionPort, CompletionRequest};
use crate::domain::calendar::Event;
use crate::domain::narrative::{
    GENERIC_COMMENTARY, Narrative, NarrativeContext, NarrativeOutcome, ParseStrategy,
    commentary_prompt, default_chain, narrative_prompt, templated_commentary,
};
use crate::domain::shared::truncate_chars;
use crate::infrastructure::metrics;

/// Longest commentary kept from a reply.
const MAX_COMMENTARY_CHARS: usize = 280;

/// Synthesizer tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizerSettings {
    /// Model identifier.
    pub model: String,
    /// Reply token limit for the report.
    pub max_tokens: u32,
    /// Reply token limit for one commentary.
    pub commentary_max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Deadline for the report call.
    pub timeout: Duration,
    /// Deadline for each commentary call.
    pub commentary_timeout: Duration,
    /// Notable events used for context and commentary.
    pub top_events: usize,
    /// Signals summarized in the prompt.
    pub top_signals: usize,
}

impl Default for SynthesizerSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 600,
            commentary_max_tokens: 120,
            temperature: 0.4,
            timeout: Duration::from_secs(45),
            commentary_timeout: Duration::from_secs(20),
            top_events: 5,
            top_signals: 6,
        }
    }
}

/// Commentary assignment counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommentaryReport {
    /// Events annotated by the model.
    pub generated: usize,
    /// Notable events that received the template after a failed call.
    pub templated: usize,
    /// Events given the generic line without a call.
    pub generic: usize,
}

/// Builds the narrative and per-event commentary.
pub struct NarrativeSynthesizer {
    completion: Arc<dyn CompletionPort>,
    settings: SynthesizerSettings,
    chain: Vec<Box<dyn ParseStrategy>>,
}

impl NarrativeSynthesizer {
    /// Create a synthesizer with the default parsing chain.
    #[must_use]
    pub fn new(completion: Arc<dyn CompletionPort>, settings: SynthesizerSettings) -> Self {
        Self {
            completion,
            settings,
            chain: default_chain(),
        }
    }

    /// Settings in use.
    #[must_use]
    pub const fn settings(&self) -> &SynthesizerSettings {
        &self.settings
    }

    /// Synthesize the sectioned report. Always returns every section.
    pub async fn synthesize(&self, context: &NarrativeContext<'_>) -> Narrative {
        if !self.completion.is_enabled() {
            tracing::info!("Completion disabled, using placeholder narrative");
            return Narrative::substituted(None);
        }

        let request = CompletionRequest::from_prompt(
            narrative_prompt(context),
            &self.settings.model,
            self.settings.max_tokens,
            self.settings.temperature,
        );

        match self.call(request, self.settings.timeout).await {
            Ok(reply) => {
                let narrative = Narrative::from_reply(&reply, &self.chain);
                if narrative.repaired > 0 {
                    metrics::record_sections_repaired(narrative.repaired as u64);
                }
                if narrative.outcome == NarrativeOutcome::Substituted {
                    metrics::record_completion_failure("narrative", "empty");
                }
                tracing::info!(
                    outcome = narrative.outcome.as_str(),
                    strategy = narrative.strategy.unwrap_or("none"),
                    repaired = narrative.repaired,
                    reply_chars = reply.chars().count(),
                    "Narrative synthesized"
                );
                narrative
            }
            Err(e) => {
                metrics::record_completion_failure("narrative", e.kind());
                tracing::warn!(error = %e, "Narrative completion failed, using placeholders");
                Narrative::substituted(Some(e.to_string()))
            }
        }
    }

    /// Attach commentary to every event in place.
    ///
    /// The earliest `top_events` notable events are annotated one call at a
    /// time; everything else gets [`GENERIC_COMMENTARY`].
    pub async fn annotate(&self, events: &mut [Event]) -> CommentaryReport {
        let mut report = CommentaryReport::default();
        let mut budget = self.settings.top_events;
        let enabled = self.completion.is_enabled();

        for event in events.iter_mut() {
            if !event.importance.is_notable() || budget == 0 {
                event.commentary = Some(GENERIC_COMMENTARY.to_string());
                report.generic += 1;
                continue;
            }
            budget -= 1;

            let generated = if enabled {
                self.comment_on(event).await
            } else {
                None
            };

            if let Some(text) = generated {
                event.commentary = Some(text);
                report.generated += 1;
            } else {
                event.commentary = Some(templated_commentary(event));
                report.templated += 1;
            }
        }

        tracing::debug!(
            generated = report.generated,
            templated = report.templated,
            generic = report.generic,
            "Event commentary attached"
        );
        report
    }

    async fn comment_on(&self, event: &Event) -> Option<String> {
        let request = CompletionRequest::from_prompt(
            commentary_prompt(event),
            &self.settings.model,
            self.settings.commentary_max_tokens,
            self.settings.temperature,
        );

        match self.call(request, self.settings.commentary_timeout).await {
            Ok(reply) if !reply.trim().is_empty() => {
                Some(truncate_chars(reply.trim(), MAX_COMMENTARY_CHARS))
            }
            Ok(_) => {
                metrics::record_completion_failure("commentary", "empty");
                None
            }
            Err(e) => {
                metrics::record_completion_failure("commentary", e.kind());
                tracing::debug!(event = %event.name, error = %e, "Commentary call failed");
                None
            }
        }
    }

    async fn call(
        &self,
        request: CompletionRequest,
        deadline: Duration,
    ) -> Result<String, CompletionError> {
        timeout(deadline, self.completion.complete(request))
            .await
            .unwrap_or(Err(CompletionError::Timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockCompletionPort;
    use crate::domain::calendar::{ActualValue, Importance};
    use crate::domain::market::RateBook;
    use crate::domain::narrative::SectionKey;
    use chrono::NaiveDate;

    fn event(name: &str, importance: Importance) -> Event {
        Event {
            id: 0,
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            time: "21:30".to_string(),
            country: "US".to_string(),
            currency: "USD".to_string(),
            name: name.to_string(),
            forecast: "N/A".to_string(),
            previous: "N/A".to_string(),
            actual: ActualValue::NotApplicable,
            importance,
            commentary: None,
            source: "test".to_string(),
        }
    }

    fn settings() -> SynthesizerSettings {
        SynthesizerSettings {
            top_events: 2,
            timeout: Duration::from_millis(200),
            commentary_timeout: Duration::from_millis(200),
            ..SynthesizerSettings::default()
        }
    }

    fn empty_context(rates: &RateBook) -> NarrativeContext<'_> {
        NarrativeContext {
            signals: &[],
            rates,
            events: &[],
            top_signals: 6,
            top_events: 5,
        }
    }

    #[tokio::test]
    async fn labelled_reply_is_parsed() {
        let mut mock = MockCompletionPort::new();
        mock.expect_is_enabled().return_const(true);
        mock.expect_complete().times(1).returning(|request| {
            assert_eq!(request.model, "gpt-4o-mini");
            Ok("[Market Focus] The dollar holds firm as yields climb higher.\n\
                [Key Events] Payrolls at 21:30 are the main scheduled release.\n\
                [Pair Outlook] EURUSD capped below 1.0900 while USDJPY holds up.\n\
                [Risk Watch] A payrolls surprise may trigger two-way volatility."
                .to_string())
        });

        let synthesizer = NarrativeSynthesizer::new(Arc::new(mock), settings());
        let rates = RateBook::new();
        let narrative = synthesizer.synthesize(&empty_context(&rates)).await;

        assert_eq!(narrative.outcome, NarrativeOutcome::Generated);
        assert!(narrative.sections.get(SectionKey::Events).starts_with("Payrolls"));
    }

    #[tokio::test]
    async fn completion_error_yields_placeholders() {
        let mut mock = MockCompletionPort::new();
        mock.expect_is_enabled().return_const(true);
        mock.expect_complete().returning(|_| {
            Err(CompletionError::Status {
                status: 401,
                body: "bad key".to_string(),
            })
        });

        let synthesizer = NarrativeSynthesizer::new(Arc::new(mock), settings());
        let rates = RateBook::new();
        let narrative = synthesizer.synthesize(&empty_context(&rates)).await;

        assert_eq!(narrative.outcome, NarrativeOutcome::Substituted);
        assert!(narrative.sections.is_complete());
        assert!(narrative.failure.unwrap().contains("401"));
    }

    #[tokio::test]
    async fn disabled_completion_is_never_called() {
        let mut mock = MockCompletionPort::new();
        mock.expect_is_enabled().return_const(false);
        mock.expect_complete().never();

        let synthesizer = NarrativeSynthesizer::new(Arc::new(mock), settings());
        let rates = RateBook::new();
        let narrative = synthesizer.synthesize(&empty_context(&rates)).await;
        assert_eq!(narrative.outcome, NarrativeOutcome::Substituted);
        assert!(narrative.failure.is_none());

        let mut events = vec![event("CPI", Importance::High), event("Claims", Importance::Low)];
        let report = synthesizer.annotate(&mut events).await;
        assert_eq!(report.templated, 1);
        assert_eq!(report.generic, 1);
        assert!(events[0].commentary.as_deref().unwrap().contains("CPI"));
    }

    #[tokio::test]
    async fn commentary_budget_and_fallbacks() {
        let mut mock = MockCompletionPort::new();
        mock.expect_is_enabled().return_const(true);
        mock.expect_complete().times(2).returning(|request| {
            if request.messages[1].content.contains("Event: GDP") {
                Err(CompletionError::Network {
                    message: "reset".to_string(),
                })
            } else {
                Ok("  Strong print supports the dollar.  ".to_string())
            }
        });

        let synthesizer = NarrativeSynthesizer::new(Arc::new(mock), settings());
        let mut events = vec![
            event("CPI", Importance::High),
            event("Holiday", Importance::Low),
            event("GDP", Importance::Medium),
            event("PMI", Importance::High),
        ];
        let report = synthesizer.annotate(&mut events).await;

        assert_eq!(
            report,
            CommentaryReport {
                generated: 1,
                templated: 1,
                generic: 2,
            }
        );
        assert_eq!(
            events[0].commentary.as_deref(),
            Some("Strong print supports the dollar.")
        );
        assert_eq!(events[1].commentary.as_deref(), Some(GENERIC_COMMENTARY));
        assert!(events[2].commentary.as_deref().unwrap().contains("GDP"));
        assert_eq!(events[3].commentary.as_deref(), Some(GENERIC_COMMENTARY));
    }
}
