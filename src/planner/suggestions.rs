//! "Did you mean" suggestions for unresolved names.

use std::collections::BTreeSet;

use strsim::jaro_winkler;

/// Limits applied when ranking suggestions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuggestionConfig {
    pub max_suggestions: usize,
    /// Jaro-Winkler similarity floor, 0.0 to 1.0.
    pub min_score: f64,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            max_suggestions: 6,
            min_score: 0.6,
        }
    }
}

/// Candidates closest to `input`, best first. Equal scores are ordered by name.
pub fn rank_suggestions<I, S>(input: &str, candidates: I, config: &SuggestionConfig) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let needle = input.trim().to_ascii_lowercase();
    let unique: BTreeSet<String> = candidates
        .into_iter()
        .map(|c| c.as_ref().to_string())
        .collect();

    let mut scored: Vec<(f64, String)> = unique
        .into_iter()
        .map(|candidate| (jaro_winkler(&needle, &candidate.to_ascii_lowercase()), candidate))
        .filter(|(score, _)| *score >= config.min_score)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    scored
        .into_iter()
        .take(config.max_suggestions)
        .map(|(_, candidate)| candidate)
        .collect()
}
