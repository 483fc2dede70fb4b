//! Color and finish matching against the catalog's known taxonomy.
//!
//! Matching is case-insensitive on whole words: `"Red"` matches
//! `"Opaque Red"` but not `"Redwood"`. Longer phrases take precedence over
//! shorter ones they contain, so `"Silver Lined"` wins over `"Lined"`.

use std::collections::BTreeSet;

/// Color reported when nothing in a name survives cleaning.
pub const UNKNOWN_COLOR: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    needle: String,
    canonical: String,
}

/// Snapshot of known color and finish names, loaded once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonomyCache {
    colors: Vec<Term>,
    finishes: Vec<Term>,
}

impl TaxonomyCache {
    pub fn new<C, F>(colors: C, finishes: F) -> Self
    where
        C: IntoIterator,
        C::Item: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        Self {
            colors: terms(colors),
            finishes: terms(finishes),
        }
    }

    #[must_use]
    pub fn color_count(&self) -> usize {
        self.colors.len()
    }

    #[must_use]
    pub fn finish_count(&self) -> usize {
        self.finishes.len()
    }

    /// Returns the single longest known finish in `name`. Among equally long
    /// matches the earliest in the name wins. Empty when nothing matches.
    #[must_use]
    pub fn match_finishes(&self, name: &str) -> BTreeSet<String> {
        let haystack = collapse_whitespace(name).to_ascii_lowercase();
        self.finishes
            .iter()
            .filter_map(|term| {
                bounded_matches(&haystack, &term.needle)
                    .first()
                    .map(|&(start, _)| (term, start))
            })
            .min_by_key(|(term, start)| (std::cmp::Reverse(term.needle.len()), *start))
            .map(|(term, _)| term.canonical.clone())
            .into_iter()
            .collect()
    }

    /// Returns the known colors in `name` after stripping `noise` phrases
    /// (product code, brand and type words), keeping only the last
    /// comma-separated segment, and removing every known finish.
    ///
    /// When no known color matches, the cleaned residual itself is the color;
    /// an empty residual yields [`UNKNOWN_COLOR`].
    #[must_use]
    pub fn match_colors(&self, name: &str, noise: &[&str]) -> BTreeSet<String> {
        let residual = self.color_residual(name, noise);
        let haystack = residual.to_ascii_lowercase();

        let mut claimed: Vec<(usize, usize)> = Vec::new();
        let mut found = BTreeSet::new();
        for term in &self.colors {
            for (start, end) in bounded_matches(&haystack, &term.needle) {
                if claimed.iter().any(|&(s, e)| start < e && s < end) {
                    continue;
                }
                claimed.push((start, end));
                found.insert(term.canonical.clone());
            }
        }

        if found.is_empty() {
            if residual.is_empty() {
                found.insert(UNKNOWN_COLOR.to_string());
            } else {
                found.insert(residual);
            }
        }
        found
    }

    fn color_residual(&self, name: &str, noise: &[&str]) -> String {
        let noise_needles: Vec<String> = noise
            .iter()
            .map(|n| collapse_whitespace(n).to_ascii_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        let without_noise = remove_phrases(
            &collapse_whitespace(name),
            noise_needles.iter().map(String::as_str),
        );

        let last_segment = without_noise.rsplit(',').next().unwrap_or_default();
        let stripped: String = last_segment
            .chars()
            .map(|c| if matches!(c, '(' | ')' | '.') { ' ' } else { c })
            .collect();

        remove_phrases(
            &collapse_whitespace(&stripped),
            self.finishes.iter().map(|t| t.needle.as_str()),
        )
    }
}

fn terms<I>(items: I) -> Vec<Term>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out: Vec<Term> = Vec::new();
    for item in items {
        let canonical = collapse_whitespace(item.as_ref());
        if canonical.is_empty() {
            continue;
        }
        let needle = canonical.to_ascii_lowercase();
        if out.iter().any(|t| t.needle == needle) {
            continue;
        }
        out.push(Term { needle, canonical });
    }
    out.sort_by(|a, b| {
        b.needle
            .len()
            .cmp(&a.needle.len())
            .then_with(|| a.needle.cmp(&b.needle))
    });
    out
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Byte spans of `needle` in `haystack` that sit on word boundaries.
/// Both arguments must already be ASCII-lowercased.
fn bounded_matches(haystack: &str, needle: &str) -> Vec<(usize, usize)> {
    if needle.is_empty() {
        return Vec::new();
    }
    haystack
        .match_indices(needle)
        .map(|(start, _)| (start, start + needle.len()))
        .filter(|&(start, end)| {
            let before_ok = haystack[..start]
                .chars()
                .next_back()
                .is_none_or(|c| !c.is_alphanumeric());
            let after_ok = haystack[end..]
                .chars()
                .next()
                .is_none_or(|c| !c.is_alphanumeric());
            before_ok && after_ok
        })
        .collect()
}

/// Removes every word-bounded occurrence of each needle, in the order given.
fn remove_phrases<'a>(text: &str, needles: impl IntoIterator<Item = &'a str>) -> String {
    let mut text = text.to_string();
    for needle in needles {
        loop {
            let lower = text.to_ascii_lowercase();
            let Some(&(start, end)) = bounded_matches(&lower, needle).first() else {
                break;
            };
            text.replace_range(start..end, " ");
        }
    }
    collapse_whitespace(&text)
}
