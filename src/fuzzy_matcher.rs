use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use strsim::levenshtein;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Fuzzy matcher for material names typed, spoken or captioned with
/// spelling noise and reordered words.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    /// Minimum score (0-100) for a candidate to count as a match
    pub score_threshold: u8,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            score_threshold: 85,
        }
    }
}

impl FuzzyMatcher {
    pub fn new(threshold: u8) -> Self {
        Self {
            score_threshold: threshold,
        }
    }

    /// Normalize a string for fuzzy matching
    /// - Converts to lowercase
    /// - Replaces punctuation with spaces
    /// - Collapses whitespace
    pub fn normalize_string(&self, s: &str) -> String {
        let cleaned: String = s
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        WHITESPACE.replace_all(&cleaned, " ").trim().to_string()
    }

    /// Edit-distance similarity on a 0-100 scale, rounded to an integer.
    pub fn ratio(a: &str, b: &str) -> u8 {
        let max_len = a.chars().count().max(b.chars().count());
        if max_len == 0 {
            return 100;
        }
        let distance = levenshtein(a, b) as f64;
        (100.0 * (1.0 - distance / max_len as f64)).round() as u8
    }

    /// Token-set similarity: order and duplicate insensitive.
    ///
    /// Tokens shared by both sides are compared against each side's
    /// remainder; when one side's tokens are a subset of the other's the
    /// score is 100.
    pub fn token_set_score(&self, s1: &str, s2: &str) -> u8 {
        let norm1 = self.normalize_string(s1);
        let norm2 = self.normalize_string(s2);
        let tokens1: BTreeSet<&str> = norm1.split(' ').filter(|t| !t.is_empty()).collect();
        let tokens2: BTreeSet<&str> = norm2.split(' ').filter(|t| !t.is_empty()).collect();

        if tokens1.is_empty() || tokens2.is_empty() {
            return 0;
        }

        let shared = tokens1.intersection(&tokens2).join(" ");
        let only1 = tokens1.difference(&tokens2).join(" ");
        let only2 = tokens2.difference(&tokens1).join(" ");

        if !shared.is_empty() && (only1.is_empty() || only2.is_empty()) {
            return 100;
        }
        if shared.is_empty() {
            return Self::ratio(&only1, &only2);
        }

        let combined1 = format!("{} {}", shared, only1);
        let combined2 = format!("{} {}", shared, only2);

        Self::ratio(&shared, &combined1)
            .max(Self::ratio(&shared, &combined2))
            .max(Self::ratio(&combined1, &combined2))
    }

    pub fn is_match(&self, s1: &str, s2: &str) -> bool {
        self.token_set_score(s1, s2) >= self.score_threshold
    }

    /// Best-scoring candidate regardless of threshold. Ties keep the
    /// earliest candidate.
    pub fn best_candidate<'a, I>(&self, query: &str, candidates: I) -> Option<(&'a str, u8)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut best: Option<(&'a str, u8)> = None;
        for candidate in candidates {
            let score = self.token_set_score(query, candidate);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((candidate, score));
            }
        }
        best
    }

    /// Best candidate, only if it clears the threshold.
    pub fn find_best_match<'a, I>(&self, query: &str, candidates: I) -> Option<(&'a str, u8)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.best_candidate(query, candidates)
            .filter(|(_, score)| *score >= self.score_threshold)
    }
}
