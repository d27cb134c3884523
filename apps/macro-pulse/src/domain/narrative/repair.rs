//! Repair pass: fill every gap the parsing chain left.

use std::collections::BTreeMap;

use super::parser::strip_labels;
use super::sections::{NarrativeSections, PartialSections, SectionKey, is_substantial};

/// What the repair pass had to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Sections filled from a quartile of the raw reply.
    pub from_quartile: Vec<SectionKey>,
    /// Sections filled with the placeholder.
    pub from_placeholder: Vec<SectionKey>,
}

impl RepairReport {
    /// Whether any section was replaced.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.from_quartile.is_empty() && self.from_placeholder.is_empty()
    }

    /// Number of replaced sections.
    #[must_use]
    pub fn replaced(&self) -> usize {
        self.from_quartile.len() + self.from_placeholder.len()
    }
}

/// Complete `partial` so every key holds substantial text.
///
/// A missing or short section takes the matching quartile of `raw`, with
/// section headings removed, when that quartile is substantial, otherwise
/// its placeholder.
#[must_use]
pub fn repair(mut partial: PartialSections, raw: &str) -> (NarrativeSections, RepairReport) {
    let quarters = quartiles(&strip_labels(raw));
    let mut report = RepairReport::default();
    let mut entries = BTreeMap::new();

    for (index, key) in SectionKey::ALL.into_iter().enumerate() {
        let text = match partial.remove(&key) {
            Some(text) if is_substantial(&text) => text.trim().to_string(),
            _ => match quarters.get(index).filter(|q| is_substantial(q)) {
                Some(quarter) => {
                    report.from_quartile.push(key);
                    quarter.clone()
                }
                None => {
                    report.from_placeholder.push(key);
                    key.placeholder().to_string()
                }
            },
        };
        entries.insert(key, text);
    }

    (NarrativeSections::from_complete(entries), report)
}

/// Split `raw` into four contiguous character slices of near-equal length.
fn quartiles(raw: &str) -> Vec<String> {
    let chars: Vec<char> = raw.trim().chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let size = chars.len().div_ceil(4);
    chars
        .chunks(size)
        .map(|chunk| chunk.iter().collect::<String>().trim().to_string())
        .collect()
}
