//! Fallback classification for names the keyword table cannot resolve.
//!
//! The classifier is an injected capability so local resolution and matching stay
//! testable without network calls. Implementations never raise: any failure is
//! reported as `None` and the caller resolves to Miscellaneous.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::categorizer::prompts::{build_categorize_prompt, CATEGORIZE_SYSTEM};
use crate::categorizer::taxonomy::Category;
use crate::llm_client::LlmClient;

#[async_trait]
pub trait CategoryFallback: Send + Sync {
    async fn categorize_fallback(&self, name: &str, allowed: &[Category]) -> Option<Category>;
}

/// Used when no classifier is configured.
pub struct NoFallback;

#[async_trait]
impl CategoryFallback for NoFallback {
    async fn categorize_fallback(&self, _name: &str, _allowed: &[Category]) -> Option<Category> {
        None
    }
}

/// Asks the LLM for one of the allowed category names.
pub struct LlmCategoryFallback(pub LlmClient);

#[async_trait]
impl CategoryFallback for LlmCategoryFallback {
    async fn categorize_fallback(&self, name: &str, allowed: &[Category]) -> Option<Category> {
        let names: Vec<&str> = allowed.iter().map(|c| c.name()).collect();
        let prompt = build_categorize_prompt(name, &names);

        let response = match self.0.call(&prompt, CATEGORIZE_SYSTEM).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Fallback categorization failed for '{name}': {e}");
                return None;
            }
        };

        let text = response.text().unwrap_or_default();
        let category = parse_category_reply(text, allowed);
        debug!("Fallback categorization for '{name}' returned {text:?} -> {category:?}");
        category
    }
}

/// Accepts the reply only if it names one of the allowed categories exactly
/// (surrounding whitespace and quotes tolerated).
fn parse_category_reply(reply: &str, allowed: &[Category]) -> Option<Category> {
    let cleaned = reply.trim().trim_matches(|c| c == '"' || c == '\'' || c == '.');
    Category::from_name(cleaned).filter(|c| allowed.contains(c))
}
