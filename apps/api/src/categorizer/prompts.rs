/// System prompt for the fallback classifier. The reply is parsed as a bare category name.
pub const CATEGORIZE_SYSTEM: &str = "You are a grocery product categorization expert. \
    You MUST respond with exactly one category name copied verbatim from the list you are given. \
    Do NOT add punctuation, quotes, explanations or apologies.";

pub const CATEGORIZE_PROMPT_TEMPLATE: &str = "\
Classify this grocery product into ONE of these categories:
{categories}

Product: \"{product_name}\"

Rules:
- Return ONLY the exact category name from the list above
- No explanation, just the category name
- If unsure, choose the most likely category

Category:";

pub fn build_categorize_prompt(product_name: &str, categories: &[&str]) -> String {
    CATEGORIZE_PROMPT_TEMPLATE
        .replace("{categories}", &categories.join("\n"))
        .replace("{product_name}", product_name)
}
