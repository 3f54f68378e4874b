//! Text normalisation helpers: brand/generic split, keyword extraction,
//! attribute detection and keyword-phrase matching.

use serde::{Deserialize, Serialize};

/// Words that describe a product without naming it. Only stripped from the
/// post-comma phrase, and only by exact whole-word match.
const MODIFIER_WORDS: &[&str] = &[
    "simply", "fresh", "pure", "natural", "classic", "original", "premium", "extra",
    "special", "deluxe", "regular", "light",
];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for",
];

/// Dietary attribute flags. `None` means "not mentioned", which matching treats
/// as "no preference" rather than as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gluten_free: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_gmo: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vegan: Option<bool>,
}

impl Attributes {
    /// Fills every flag left unset on `self` from `detected`.
    pub fn or_detected(self, detected: Attributes) -> Attributes {
        Attributes {
            organic: self.organic.or(detected.organic),
            gluten_free: self.gluten_free.or(detected.gluten_free),
            non_gmo: self.non_gmo.or(detected.non_gmo),
            vegan: self.vegan.or(detected.vegan),
        }
    }

    pub fn requires_organic(&self) -> bool {
        self.organic == Some(true)
    }
}

/// Result of splitting a raw favorite/item name on its first comma.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandGeneric {
    pub brand: Option<String>,
    pub generic: String,
}

impl BrandGeneric {
    pub fn has_brand(&self) -> bool {
        self.brand.is_some()
    }
}

/// `"Quaker, Simply Granola"` → brand `Quaker`, generic `Granola`.
/// Without a comma the whole trimmed string is the generic.
pub fn split_brand_generic(raw: &str) -> BrandGeneric {
    let raw = raw.trim();
    let Some((brand, rest)) = raw.split_once(',') else {
        return BrandGeneric {
            brand: None,
            generic: raw.to_string(),
        };
    };

    let brand = brand.trim();
    let rest = rest.trim();
    match (brand.is_empty(), rest.is_empty()) {
        (_, true) => BrandGeneric {
            brand: None,
            generic: brand.to_string(),
        },
        (true, false) => BrandGeneric {
            brand: None,
            generic: extract_generic(rest),
        },
        (false, false) => BrandGeneric {
            brand: Some(brand.to_string()),
            generic: extract_generic(rest),
        },
    }
}

/// Drops pure modifier words from a multi-word phrase. A phrase that would be
/// emptied entirely is returned unchanged.
pub fn extract_generic(phrase: &str) -> String {
    let phrase = phrase.trim();
    let words: Vec<&str> = phrase.split_whitespace().collect();
    if words.len() <= 1 {
        return phrase.to_string();
    }

    let kept: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| !is_modifier(w))
        .collect();

    if kept.is_empty() {
        phrase.to_string()
    } else {
        kept.join(" ")
    }
}

fn is_modifier(word: &str) -> bool {
    MODIFIER_WORDS
        .iter()
        .any(|m| m.eq_ignore_ascii_case(word))
}

/// Lowercased, punctuation-stripped, stop-word-free tokens in first-seen order.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '%' || c.is_whitespace())
        .collect();

    let mut keywords: Vec<String> = Vec::new();
    for token in cleaned.split_whitespace() {
        if STOP_WORDS.contains(&token) || keywords.iter().any(|k| k == token) {
            continue;
        }
        keywords.push(token.to_string());
    }
    keywords
}

pub fn detect_attributes(name: &str) -> Attributes {
    let lower = name.to_lowercase();
    let flag = |present: bool| present.then_some(true);
    Attributes {
        organic: flag(lower.contains("organic")),
        gluten_free: flag(lower.contains("gluten-free") || lower.contains("gluten free")),
        non_gmo: flag(
            lower.contains("non-gmo") || lower.contains("non gmo") || lower.contains("nongmo"),
        ),
        vegan: flag(lower.contains("vegan")),
    }
}

/// Whether `phrase` occurs in `haystack` starting at a word boundary and ending
/// at a word boundary or a plural `s`/`es` suffix. Both inputs must be lowercase.
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    haystack.match_indices(phrase).any(|(idx, matched)| {
        let starts_word = haystack[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        starts_word && ends_word(&haystack[idx + matched.len()..])
    })
}

fn ends_word(rest: &str) -> bool {
    let at_boundary = |s: &str| s.chars().next().map_or(true, |c| !c.is_alphanumeric());
    at_boundary(rest)
        || rest.strip_prefix("es").is_some_and(at_boundary)
        || rest.strip_prefix('s').is_some_and(at_boundary)
}
