//! Hybrid brand/generic favorite matching.

use thiserror::Error;
use uuid::Uuid;

use crate::categorizer::Attributes;
use crate::models::Favorite;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("favorite {favorite_id} is malformed: {reason}")]
    MalformedFavorite { favorite_id: Uuid, reason: &'static str },
}

/// Whether `favorite` selects an item named `item_name_lower` (already lowercased).
///
/// Branded favorites need a brand keyword and a generic keyword in the name;
/// unbranded ones need only a generic keyword. Keywords match as substrings.
/// An explicit organic favorite additionally requires an organic item.
pub fn favorite_matches(
    favorite: &Favorite,
    item_name_lower: &str,
    item_attributes: &Attributes,
) -> Result<bool, MatchError> {
    if favorite.generic_keywords.is_empty() {
        return Err(MatchError::MalformedFavorite {
            favorite_id: favorite.id,
            reason: "no generic keywords",
        });
    }
    if favorite.has_brand && favorite.brand_keywords.is_empty() {
        return Err(MatchError::MalformedFavorite {
            favorite_id: favorite.id,
            reason: "branded favorite without brand keywords",
        });
    }

    let any_in_name = |keywords: &[String]| {
        keywords
            .iter()
            .any(|k| !k.is_empty() && item_name_lower.contains(k.as_str()))
    };

    if favorite.has_brand && !any_in_name(&favorite.brand_keywords) {
        return Ok(false);
    }
    if !any_in_name(&favorite.generic_keywords) {
        return Ok(false);
    }
    if favorite.attributes.requires_organic() && !item_attributes.requires_organic() {
        return Ok(false);
    }
    Ok(true)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::categorizer::tests::keyword_only_categorizer;

    pub(crate) async fn make_favorite(consumer_id: Uuid, raw: &str) -> Favorite {
        let categorization = keyword_only_categorizer().categorize(raw).await;
        Favorite::from_categorization(consumer_id, raw, categorization, None)
    }

    fn organic() -> Attributes {
        Attributes {
            organic: Some(true),
            ..Attributes::default()
        }
    }

    #[tokio::test]
    async fn test_unbranded_favorite_matches_any_brand() {
        let favorite = make_favorite(Uuid::new_v4(), "Granola").await;
        assert_eq!(
            favorite_matches(&favorite, "organic granola", &organic()),
            Ok(true)
        );
        assert_eq!(
            favorite_matches(&favorite, "nature valley granola bars", &Attributes::default()),
            Ok(true)
        );
    }

    #[tokio::test]
    async fn test_branded_favorite_needs_brand_in_name() {
        let favorite = make_favorite(Uuid::new_v4(), "Quaker, Granola").await;
        assert_eq!(
            favorite_matches(&favorite, "organic granola", &organic()),
            Ok(false)
        );
        assert_eq!(
            favorite_matches(&favorite, "quaker chewy granola", &Attributes::default()),
            Ok(true)
        );
    }

    #[tokio::test]
    async fn test_branded_favorite_needs_generic_in_name() {
        let favorite = make_favorite(Uuid::new_v4(), "Quaker, Granola").await;
        assert_eq!(
            favorite_matches(&favorite, "quaker oats", &Attributes::default()),
            Ok(false)
        );
    }

    #[tokio::test]
    async fn test_organic_favorite_requires_organic_item() {
        let favorite = make_favorite(Uuid::new_v4(), "Organic Granola").await;
        assert!(favorite.attributes.requires_organic());
        assert_eq!(
            favorite_matches(&favorite, "granola", &Attributes::default()),
            Ok(false)
        );
        assert_eq!(
            favorite_matches(&favorite, "organic granola", &organic()),
            Ok(true)
        );
    }

    #[tokio::test]
    async fn test_other_attributes_impose_no_constraint() {
        let favorite = make_favorite(Uuid::new_v4(), "Vegan Granola").await;
        assert_eq!(
            favorite_matches(&favorite, "granola", &Attributes::default()),
            Ok(true)
        );
    }

    #[tokio::test]
    async fn test_malformed_favorites_are_reported() {
        let mut favorite = make_favorite(Uuid::new_v4(), "Quaker, Granola").await;
        favorite.brand_keywords.clear();
        assert!(matches!(
            favorite_matches(&favorite, "quaker granola", &Attributes::default()),
            Err(MatchError::MalformedFavorite { .. })
        ));

        let mut favorite = make_favorite(Uuid::new_v4(), "Granola").await;
        favorite.generic_keywords.clear();
        assert!(favorite_matches(&favorite, "granola", &Attributes::default()).is_err());
    }
}
