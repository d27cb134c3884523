//! Reply parsing strategies.
//!
//! Strategies run in order and the chain stops at the first one that
//! recovers any section. Gaps left behind are handled by the repair pass.

use std::sync::OnceLock;

use regex::Regex;

use super::sections::{PartialSections, SectionKey};

/// One way of splitting a reply into sections.
pub trait ParseStrategy: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &'static str;

    /// Recovered sections, or `None` when the strategy found nothing.
    fn parse(&self, text: &str) -> Option<PartialSections>;
}

/// Decorated labels anywhere in the text: `[Label]`, `【Label】`,
/// `**Label**`, `2. Label:`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LabelAnchored;

/// Bare labels that open their own line, optionally as a markdown heading
/// or numbered item.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineAnchored;

/// Blank-line separated paragraphs assigned to sections in order.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParagraphFallback;

impl ParseStrategy for LabelAnchored {
    fn name(&self) -> &'static str {
        "label_anchored"
    }

    fn parse(&self, text: &str) -> Option<PartialSections> {
        split_on_anchors(text, label_patterns())
    }
}

impl ParseStrategy for LineAnchored {
    fn name(&self) -> &'static str {
        "line_anchored"
    }

    fn parse(&self, text: &str) -> Option<PartialSections> {
        split_on_anchors(text, line_patterns())
    }
}

impl ParseStrategy for ParagraphFallback {
    fn name(&self) -> &'static str {
        "paragraph"
    }

    fn parse(&self, text: &str) -> Option<PartialSections> {
        let sections: PartialSections = paragraph_break()
            .split(text)
            .map(str::trim)
            .filter(|p| p.chars().any(char::is_alphanumeric))
            .zip(SectionKey::ALL)
            .map(|(paragraph, key)| (key, paragraph.to_string()))
            .collect();

        (!sections.is_empty()).then_some(sections)
    }
}

/// Default chain: label-anchored, line-anchored, paragraph.
#[must_use]
pub fn default_chain() -> Vec<Box<dyn ParseStrategy>> {
    vec![
        Box::new(LabelAnchored),
        Box::new(LineAnchored),
        Box::new(ParagraphFallback),
    ]
}

/// Run `chain` until a strategy yields sections.
///
/// Returns the sections and the name of the strategy that produced them.
#[must_use]
pub fn run_chain(
    chain: &[Box<dyn ParseStrategy>],
    text: &str,
) -> Option<(PartialSections, &'static str)> {
    if text.trim().is_empty() {
        return None;
    }
    chain
        .iter()
        .find_map(|strategy| strategy.parse(text).map(|sections| (sections, strategy.name())))
}

/// How strongly a label match reads as a section heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum AnchorKind {
    /// Brackets or bold markers around the label.
    Decorated,
    /// Only whitespace precedes the label on its line.
    LineStart,
    /// Bare `label:` in running text.
    Inline,
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    start: usize,
    end: usize,
    key: SectionKey,
    kind: AnchorKind,
}

fn candidate_anchors(text: &str, patterns: &[(SectionKey, Regex)]) -> Vec<Anchor> {
    patterns
        .iter()
        .flat_map(|(key, re)| {
            re.find_iter(text).map(move |m| Anchor {
                start: m.start(),
                end: m.end(),
                key: *key,
                kind: anchor_kind(text, m.start(), m.as_str()),
            })
        })
        .collect()
}

fn anchor_kind(text: &str, start: usize, matched: &str) -> AnchorKind {
    if matched.contains(['[', '【']) || matched.contains("**") {
        return AnchorKind::Decorated;
    }
    let line_prefix = text[..start].rsplit('\n').next().unwrap_or_default();
    if line_prefix.trim().is_empty() {
        AnchorKind::LineStart
    } else {
        AnchorKind::Inline
    }
}

/// Best anchor per key, in text order.
///
/// Inline matches only count when the reply has no heading-like anchor at
/// all; otherwise they stay part of the surrounding body.
fn select_anchors(mut candidates: Vec<Anchor>) -> Vec<Anchor> {
    if candidates.iter().any(|a| a.kind != AnchorKind::Inline) {
        candidates.retain(|a| a.kind != AnchorKind::Inline);
    }
    candidates.sort_by_key(|a| (a.key, a.kind, a.start));

    let mut chosen: Vec<Anchor> = Vec::new();
    for anchor in candidates {
        if chosen.last().is_some_and(|last| last.key == anchor.key) {
            continue;
        }
        chosen.push(anchor);
    }
    chosen.sort_by_key(|a| a.start);
    chosen
}

fn split_on_anchors(text: &str, patterns: &[(SectionKey, Regex)]) -> Option<PartialSections> {
    let anchors = select_anchors(candidate_anchors(text, patterns));
    if anchors.is_empty() {
        return None;
    }

    let mut sections = PartialSections::new();
    for (i, anchor) in anchors.iter().enumerate() {
        let stop = anchors.get(i + 1).map_or(text.len(), |next| next.start);
        if stop <= anchor.end {
            continue;
        }
        let body = text[anchor.end..stop]
            .trim()
            .trim_start_matches([':', '：', '-'])
            .trim();
        if !body.is_empty() {
            sections.insert(anchor.key, body.to_string());
        }
    }

    (!sections.is_empty()).then_some(sections)
}

/// `text` with heading-like section labels removed.
///
/// Inline `label:` phrases are kept since they are usually prose.
pub(crate) fn strip_labels(text: &str) -> String {
    let mut spans: Vec<Anchor> = candidate_anchors(text, label_patterns())
        .into_iter()
        .chain(candidate_anchors(text, line_patterns()))
        .filter(|a| a.kind != AnchorKind::Inline)
        .collect();
    spans.sort_by_key(|a| a.start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        if span.start < cursor {
            cursor = cursor.max(span.end);
            continue;
        }
        out.push_str(&text[cursor..span.start]);
        out.push(' ');
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn alternation(key: SectionKey) -> String {
    key.aliases()
        .iter()
        .map(|alias| regex::escape(alias))
        .collect::<Vec<_>>()
        .join("|")
}

#[allow(clippy::expect_used)] // Patterns are built from constant label tables
fn label_patterns() -> &'static [(SectionKey, Regex)] {
    static PATTERNS: OnceLock<Vec<(SectionKey, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        SectionKey::ALL
            .into_iter()
            .map(|key| {
                let labels = alternation(key);
                let pattern = format!(
                    r"(?i)(?:#{{1,6}}[ \t]*)?(?:\d+[ \t]*[.、)][ \t]*)?(?:[\[【][ \t]*(?:{labels})[ \t]*[\]】]|\*\*[ \t]*(?:{labels})[ \t]*[:：]?[ \t]*\*\*[ \t]*[:：]?|(?:{labels})[ \t]*[:：])"
                );
                (key, Regex::new(&pattern).expect("label pattern is valid"))
            })
            .collect()
    })
}

#[allow(clippy::expect_used)] // Patterns are built from constant label tables
fn line_patterns() -> &'static [(SectionKey, Regex)] {
    static PATTERNS: OnceLock<Vec<(SectionKey, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        SectionKey::ALL
            .into_iter()
            .map(|key| {
                let labels = alternation(key);
                let pattern = format!(
                    r"(?im)^[ \t]*(?:#{{1,6}}[ \t]*)?(?:\d+[ \t]*[.、)][ \t]*)?(?:{labels})[ \t]*(?:[:：]|$)"
                );
                (key, Regex::new(&pattern).expect("line pattern is valid"))
            })
            .collect()
    })
}

#[allow(clippy::expect_used)] // Constant pattern
fn paragraph_break() -> &'static Regex {
    static BREAK: OnceLock<Regex> = OnceLock::new();
    BREAK.get_or_init(|| Regex::new(r"\n[ \t]*\n").expect("paragraph pattern is valid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracketed_labels() {
        let text = "[Market Focus]\nDollar firm ahead of payrolls.\n\n[Key Events]\nNFP at 21:30.\n\
                    [Pair Outlook]\nEURUSD capped at 1.09.\n[Risk Watch]\nThin liquidity.";
        let sections = LabelAnchored.parse(text).unwrap();
        assert_eq!(sections.len(), 4);
        assert_eq!(sections[&SectionKey::Market], "Dollar firm ahead of payrolls.");
        assert_eq!(sections[&SectionKey::Events], "NFP at 21:30.");
        assert_eq!(sections[&SectionKey::Outlook], "EURUSD capped at 1.09.");
        assert_eq!(sections[&SectionKey::Risks], "Thin liquidity.");
    }

    #[test]
    fn mixed_decorations_in_any_order() {
        let text = "**Risk Watch**: Holiday volumes.\n2. Pair Outlook: USDJPY bid.\n\
                    【Key Events】CPI tonight.\n1. [Market Focus] Yields drive FX.";
        let sections = LabelAnchored.parse(text).unwrap();
        assert_eq!(sections[&SectionKey::Risks], "Holiday volumes.");
        assert_eq!(sections[&SectionKey::Outlook], "USDJPY bid.");
        assert_eq!(sections[&SectionKey::Events], "CPI tonight.");
        assert_eq!(sections[&SectionKey::Market], "Yields drive FX.");
    }

    #[test]
    fn chinese_labels_are_recognized() {
        let text = "【市场焦点】美元走强。\n【风险提示】注意流动性。";
        let sections = LabelAnchored.parse(text).unwrap();
        assert_eq!(sections[&SectionKey::Market], "美元走强。");
        assert_eq!(sections[&SectionKey::Risks], "注意流动性。");
    }

    #[test]
    fn line_anchored_requires_line_start() {
        let text = "## Market Focus\nDollar steady.\n\nKey Events\nClaims data.\n\n\
                    Our pair outlook today is mixed.";
        assert!(LabelAnchored.parse(text).is_none());

        let sections = LineAnchored.parse(text).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[&SectionKey::Market], "Dollar steady.");
        assert!(sections[&SectionKey::Events].starts_with("Claims data."));
        assert!(!sections.contains_key(&SectionKey::Outlook));
    }

    #[test]
    fn paragraphs_fill_in_order() {
        let text = "First paragraph about markets.\n\nSecond about events.\n\n\
                    Third about pairs.\n\nFourth about risks.\n\nFifth is ignored.";
        let sections = ParagraphFallback.parse(text).unwrap();
        assert_eq!(sections.len(), 4);
        assert_eq!(sections[&SectionKey::Market], "First paragraph about markets.");
        assert_eq!(sections[&SectionKey::Risks], "Fourth about risks.");
    }

    #[test]
    fn chain_stops_at_first_success() {
        let chain = default_chain();
        let (_, name) = run_chain(&chain, "[Risk Watch] Liquidity thin into the close.").unwrap();
        assert_eq!(name, "label_anchored");

        let (sections, name) = run_chain(&chain, "Just one paragraph of text.").unwrap();
        assert_eq!(name, "paragraph");
        assert_eq!(sections.len(), 1);

        assert!(run_chain(&chain, "   \n ").is_none());
    }

    #[test]
    fn inline_label_phrases_stay_in_body() {
        let text = "[Market Focus]\nThe dollar is firm. Key risks: a hot CPI print could extend the move.\n\
                    [Key Events]\nCPI at 20:30, see the calendar: claims follow.\n\
                    [Pair Outlook]\nEURUSD capped below 1.0950.\n\
                    [Risk Watch]\nGeopolitical headlines could spark risk-off flows.";
        let sections = LabelAnchored.parse(text).unwrap();
        assert_eq!(
            sections[&SectionKey::Market],
            "The dollar is firm. Key risks: a hot CPI print could extend the move."
        );
        assert_eq!(sections[&SectionKey::Events], "CPI at 20:30, see the calendar: claims follow.");
        assert_eq!(sections[&SectionKey::Outlook], "EURUSD capped below 1.0950.");
        assert_eq!(
            sections[&SectionKey::Risks],
            "Geopolitical headlines could spark risk-off flows."
        );
    }

    #[test]
    fn bare_labels_anchor_when_nothing_better_exists() {
        let text = "In brief, Market Overview: dollar steady. Risks: thin liquidity.";
        let sections = LabelAnchored.parse(text).unwrap();
        assert_eq!(sections[&SectionKey::Market], "dollar steady.");
        assert_eq!(sections[&SectionKey::Risks], "thin liquidity.");
    }

    #[test]
    fn strip_labels_keeps_prose() {
        let stripped = strip_labels("[Market Focus]\nKey risks: CPI.\n## Risk Watch\nHeadlines.");
        assert!(!stripped.contains("[Market Focus]"));
        assert!(!stripped.contains("Risk Watch"));
        assert!(stripped.contains("Key risks: CPI."));
        assert!(stripped.contains("Headlines."));
    }
}
