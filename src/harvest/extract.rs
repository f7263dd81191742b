//! Text extraction helpers for the harvest phases.
//!
//! Track titles and descriptions carry the signal for the semantic, label,
//! and contextual phases: key terms for fuzzy search, label names buried in
//! copyright lines, and collaborator credits in "feat." or "@mention" form.

use std::sync::LazyLock;

use regex::Regex;

/// Words too common to be useful as search terms.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been",
];

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z]+\b").expect("invalid word regex"));

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([a-zA-Z0-9_-]+)").expect("invalid mention regex"));

/// "feat. X", "ft. X", "featuring X" up to the next break.
static FEATURING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:feat\.|ft\.|featuring)\s+([A-Za-z0-9\s&,]+?)(?:\s|$|\))")
        .expect("invalid featuring regex")
});

/// "remix by X", "remixed by X", "prod. by X".
static CREDIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:remix by|remixed by|prod\. by)\s+([A-Za-z0-9\s&,]+?)(?:\s|$|\))")
        .expect("invalid credit regex")
});

/// "released by/on Some Name Records".
static RELEASED_ON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"released (?:by|on) ([A-Z][A-Za-z\s]+(?:Records|Music|Label))")
        .expect("invalid label regex")
});

/// Copyright lines, year optional.
static COPYRIGHT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"©\s*(?:\d{4})?\s*([A-Z][A-Za-z\s]+(?:Records|Music|Label))")
        .expect("invalid copyright regex")
});

/// Pull searchable key terms out of free text.
///
/// Lowercases, drops stopwords and anything shorter than three letters,
/// keeps original word order with duplicates intact.
pub fn key_terms(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .filter(|w| w.len() > 2 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Case-insensitive string similarity in `[0, 1]`.
///
/// Ratcliff/Obershelp: twice the matched character count over the combined
/// length, where matches come from recursively splitting around the longest
/// common substring. `0.6` is a practical cutoff for remix and cover title
/// variants.
pub fn string_similarity(s1: &str, s2: &str) -> f64 {
    let a: Vec<char> = s1.to_lowercase().chars().collect();
    let b: Vec<char> = s2.to_lowercase().chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let matched = matching_chars(&a, &b);
    2.0 * matched as f64 / (a.len() + b.len()) as f64
}

/// Characters covered by common blocks, longest-block-first recursion.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    // longest common substring, earliest position on ties
    let mut best = (0usize, 0usize, 0usize);
    let mut prev = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        let mut row = vec![0usize; b.len() + 1];
        for (j, &cb) in b.iter().enumerate() {
            if ca == cb {
                let run = prev[j] + 1;
                row[j + 1] = run;
                if run > best.2 {
                    best = (i + 1 - run, j + 1 - run, run);
                }
            }
        }
        prev = row;
    }

    let (i, j, len) = best;
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + len..], &b[j + len..])
}

/// Detect label names from a track's label field and description text.
pub fn extract_labels(label_field: Option<&str>, description: &str) -> Vec<String> {
    let mut labels = Vec::new();
    if let Some(label) = label_field {
        let label = label.trim();
        if !label.is_empty() {
            labels.push(label.to_string());
        }
    }
    for re in [&*RELEASED_ON_RE, &*COPYRIGHT_RE] {
        for caps in re.captures_iter(description) {
            let name = caps[1].trim().to_string();
            if !name.is_empty() && !labels.contains(&name) {
                labels.push(name);
            }
        }
    }
    labels
}

/// Extract mentioned artists and collaborators from title and description.
///
/// Combines `@mentions` with featuring and production credits; credit
/// matches are split on commas and ampersands so "feat. A, B & C" yields
/// three entities. Order of first appearance, deduplicated.
pub fn extract_entities(title: &str, description: &str) -> Vec<String> {
    let mut entities: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        let name = name.trim().to_string();
        if !name.is_empty() && !entities.contains(&name) {
            entities.push(name);
        }
    };

    for caps in MENTION_RE.captures_iter(description) {
        push(&caps[1]);
    }

    let combined = format!("{title} {description}");
    for re in [&*FEATURING_RE, &*CREDIT_RE] {
        for caps in re.captures_iter(&combined) {
            for artist in caps[1].split(['&', ',']) {
                push(artist);
            }
        }
    }

    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_terms_drops_stopwords_and_short_words() {
        let terms = key_terms("The Road to a Midnight City");
        assert_eq!(terms, vec!["road", "midnight", "city"]);
    }

    #[test]
    fn test_key_terms_ignores_punctuation() {
        let terms = key_terms("night-drive (remix) [2024]");
        assert_eq!(terms, vec!["night", "drive", "remix"]);
    }

    #[test]
    fn test_similarity_identical_and_disjoint() {
        assert_eq!(string_similarity("Night Drive", "night drive"), 1.0);
        assert_eq!(string_similarity("abc", "xyz"), 0.0);
        assert_eq!(string_similarity("", ""), 1.0);
        assert_eq!(string_similarity("abc", ""), 0.0);
    }

    #[test]
    fn test_similarity_catches_remix_variant() {
        let score = string_similarity("night drive (remix)", "night drive remix");
        assert!(score >= 0.6, "expected remix variant above cutoff, got {score}");
    }

    #[test]
    fn test_similarity_rejects_unrelated_title() {
        let score = string_similarity("morning coffee", "night drive (remix)");
        assert!(score < 0.6, "expected unrelated title below cutoff, got {score}");
    }

    #[test]
    fn test_labels_from_field_and_description() {
        let labels = extract_labels(
            Some("Hypercolour Records"),
            "Out now. released on Midnight Music. © 2023 Glasshouse Records",
        );
        assert_eq!(
            labels,
            vec!["Hypercolour Records", "Midnight Music", "Glasshouse Records"]
        );
    }

    #[test]
    fn test_labels_copyright_without_year() {
        let labels = extract_labels(None, "© Floating Points Music");
        assert_eq!(labels, vec!["Floating Points Music"]);
    }

    #[test]
    fn test_no_labels_detected() {
        assert!(extract_labels(None, "just a track, no credits").is_empty());
    }

    #[test]
    fn test_entities_mentions_and_featuring() {
        // the lazy credit capture stops at the first break after a word
        let entities = extract_entities("Skyline feat. Nadia ", "new one with @four_tet, remix by Jono ");
        assert!(entities.contains(&"four_tet".to_string()));
        assert!(entities.contains(&"Nadia".to_string()));
        assert!(entities.contains(&"Jono".to_string()));
    }

    #[test]
    fn test_entities_split_on_comma_and_ampersand() {
        let entities = extract_entities("Collide feat. Ana,Bo&Cy)", "");
        assert!(entities.contains(&"Ana".to_string()));
        assert!(entities.contains(&"Bo".to_string()));
        assert!(entities.contains(&"Cy".to_string()));
    }

    #[test]
    fn test_entities_deduplicated() {
        let entities = extract_entities("feat. Overmono ", "@Overmono ft. Overmono ");
        let count = entities.iter().filter(|e| *e == "Overmono").count();
        assert_eq!(count, 1);
    }
}
