//! Text Categorizer: maps a free-text item name onto the fixed taxonomy and
//! decomposes it into brand/generic keywords and dietary attributes.
//!
//! Resolution is two-tier: the keyword table first, the injected fallback
//! classifier only when no keyword phrase matches, Miscellaneous last.

pub mod fallback;
pub mod handlers;
pub mod prompts;
pub mod taxonomy;
pub mod text;

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

pub use fallback::CategoryFallback;
pub use taxonomy::{Category, CategoryTable};
pub use text::Attributes;

use text::{contains_phrase, detect_attributes, extract_keywords, split_brand_generic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorizationMethod {
    KeywordMatch,
    Fallback,
    Default,
}

/// Full output of `Categorizer::categorize`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Categorization {
    pub category: Category,
    pub keywords: Vec<String>,
    pub attributes: Attributes,
    pub brand: Option<String>,
    pub generic: String,
    pub has_brand: bool,
    pub brand_keywords: Vec<String>,
    pub generic_keywords: Vec<String>,
    pub method: CategorizationMethod,
}

#[derive(Clone)]
pub struct Categorizer {
    table: Arc<CategoryTable>,
    fallback: Arc<dyn CategoryFallback>,
}

impl Categorizer {
    pub fn new(table: Arc<CategoryTable>, fallback: Arc<dyn CategoryFallback>) -> Self {
        Self { table, fallback }
    }

    /// Aggregate score per category with at least one matching phrase, in table order.
    /// A phrase contributes its word count, so "ground beef" outweighs "beef".
    pub fn score_categories(&self, name: &str) -> Vec<(Category, u32)> {
        let lower = name.to_lowercase();
        self.table
            .entries()
            .iter()
            .filter_map(|(category, phrases)| {
                let score: u32 = phrases
                    .iter()
                    .filter(|p| contains_phrase(&lower, &p.phrase))
                    .map(|p| p.weight)
                    .sum();
                (score > 0).then_some((*category, score))
            })
            .collect()
    }

    /// Highest-scoring category; ties go to the earliest category in the table.
    pub fn resolve_by_keywords(&self, name: &str) -> Option<Category> {
        let mut best: Option<(Category, u32)> = None;
        for (category, score) in self.score_categories(name) {
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((category, score));
            }
        }
        best.map(|(category, _)| category)
    }

    /// Never fails; the worst case is Miscellaneous.
    pub async fn categorize(&self, raw_name: &str) -> Categorization {
        let raw_name = raw_name.trim();

        let (category, method) = match self.resolve_by_keywords(raw_name) {
            Some(category) => (category, CategorizationMethod::KeywordMatch),
            None => match self
                .fallback
                .categorize_fallback(raw_name, &Category::ALL)
                .await
            {
                Some(category) => (category, CategorizationMethod::Fallback),
                None => (Category::Miscellaneous, CategorizationMethod::Default),
            },
        };
        debug!("Categorized '{raw_name}' as {category} via {method:?}");

        let split = split_brand_generic(raw_name);
        let brand_keywords = split
            .brand
            .as_deref()
            .map(extract_keywords)
            .unwrap_or_default();
        let generic_keywords = extract_keywords(&split.generic);

        Categorization {
            category,
            keywords: extract_keywords(raw_name),
            attributes: detect_attributes(raw_name),
            has_brand: split.has_brand(),
            brand: split.brand,
            generic: split.generic,
            brand_keywords,
            generic_keywords,
            method,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::categorizer::fallback::NoFallback;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    pub(crate) fn keyword_only_categorizer() -> Categorizer {
        Categorizer::new(Arc::new(CategoryTable::builtin()), Arc::new(NoFallback))
    }

    struct FixedFallback {
        answer: Option<Category>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl CategoryFallback for FixedFallback {
        async fn categorize_fallback(&self, _name: &str, _allowed: &[Category]) -> Option<Category> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    fn with_fallback(answer: Option<Category>) -> (Categorizer, Arc<FixedFallback>) {
        let fallback = Arc::new(FixedFallback {
            answer,
            calls: AtomicU32::new(0),
        });
        let categorizer = Categorizer::new(Arc::new(CategoryTable::builtin()), fallback.clone());
        (categorizer, fallback)
    }

    #[tokio::test]
    async fn test_brand_generic_decomposition() {
        let result = keyword_only_categorizer()
            .categorize("Quaker, Simply Granola")
            .await;
        assert_eq!(result.brand.as_deref(), Some("Quaker"));
        assert_eq!(result.generic, "Granola");
        assert!(result.has_brand);
        assert_eq!(result.brand_keywords, vec!["quaker"]);
        assert_eq!(result.generic_keywords, vec!["granola"]);
        assert_eq!(result.keywords, vec!["quaker", "simply", "granola"]);
        assert_eq!(result.category, Category::BreakfastCereal);
    }

    #[tokio::test]
    async fn test_unbranded_name() {
        let result = keyword_only_categorizer().categorize("Granola").await;
        assert_eq!(result.brand, None);
        assert!(!result.has_brand);
        assert_eq!(result.generic, "Granola");
        assert!(result.brand_keywords.is_empty());
        assert_eq!(result.category, Category::BreakfastCereal);
        assert_eq!(result.method, CategorizationMethod::KeywordMatch);
    }

    #[tokio::test]
    async fn test_categorize_is_deterministic() {
        let categorizer = keyword_only_categorizer();
        let first = categorizer.categorize("Organic Chicken Salad").await;
        for _ in 0..5 {
            assert_eq!(categorizer.categorize("Organic Chicken Salad").await, first);
        }
    }

    #[test]
    fn test_multi_word_phrase_outscores_single_words() {
        // Pantry/Pasta "pasta" scores 1; "sauce" + "pasta sauce" scores 3.
        let categorizer = keyword_only_categorizer();
        assert_eq!(
            categorizer.resolve_by_keywords("Marinara Pasta Sauce"),
            Some(Category::OilsSaucesSpices)
        );
        assert_eq!(
            categorizer.resolve_by_keywords("Orange Juice"),
            Some(Category::Beverages)
        );
        assert_eq!(
            categorizer.resolve_by_keywords("Granola Bar"),
            Some(Category::SnacksCandy)
        );
    }

    #[test]
    fn test_tie_goes_to_earliest_table_category() {
        // "chicken" (Meat & Poultry) and "salad" (Deli) both score 1.
        let categorizer = keyword_only_categorizer();
        let scores = categorizer.score_categories("Chicken Salad");
        assert_eq!(
            scores,
            vec![(Category::MeatPoultry, 1), (Category::DeliPrepared, 1)]
        );
        for _ in 0..10 {
            assert_eq!(
                categorizer.resolve_by_keywords("Chicken Salad"),
                Some(Category::MeatPoultry)
            );
        }
    }

    #[test]
    fn test_common_items_resolve() {
        let categorizer = keyword_only_categorizer();
        let cases = [
            ("2% Milk", Category::DairyEggs),
            ("Greek Yogurt", Category::DairyEggs),
            ("Organic Apples", Category::Fruits),
            ("Ground Beef", Category::MeatPoultry),
            ("Whole Wheat Bread", Category::BakeryBread),
            ("Toilet Paper", Category::HouseholdEssentials),
            ("Brown Rice", Category::PastaRiceGrains),
            ("Dry Dog Food", Category::PetSupplies),
        ];
        for (name, expected) in cases {
            assert_eq!(
                categorizer.resolve_by_keywords(name),
                Some(expected),
                "{name}"
            );
        }
    }

    #[tokio::test]
    async fn test_fallback_used_only_when_no_keyword_matches() {
        let (categorizer, fallback) = with_fallback(Some(Category::PersonalCare));

        let matched = categorizer.categorize("Cheddar Cheese").await;
        assert_eq!(matched.category, Category::DairyEggs);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);

        let unmatched = categorizer.categorize("Lip Balm").await;
        assert_eq!(unmatched.category, Category::PersonalCare);
        assert_eq!(unmatched.method, CategorizationMethod::Fallback);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fallback_resolves_to_miscellaneous() {
        let (categorizer, _) = with_fallback(None);
        let result = categorizer.categorize("Zzyzx Widget").await;
        assert_eq!(result.category, Category::Miscellaneous);
        assert_eq!(result.method, CategorizationMethod::Default);
    }

    #[tokio::test]
    async fn test_attributes_detected_on_full_name() {
        let result = keyword_only_categorizer()
            .categorize("Nature's Path, Organic Gluten-Free Granola")
            .await;
        assert_eq!(result.attributes.organic, Some(true));
        assert_eq!(result.attributes.gluten_free, Some(true));
        assert_eq!(result.attributes.vegan, None);
    }
}
