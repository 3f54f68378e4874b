//! The fixed 20-category taxonomy and the keyword table used for local resolution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// One of the fixed deal categories. Matching only ever compares these top-level values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Fruits,
    Vegetables,
    MeatPoultry,
    Seafood,
    DairyEggs,
    BakeryBread,
    PantryStaples,
    SnacksCandy,
    FrozenFoods,
    Beverages,
    DeliPrepared,
    BreakfastCereal,
    PastaRiceGrains,
    OilsSaucesSpices,
    BabyKids,
    HealthNutrition,
    HouseholdEssentials,
    PersonalCare,
    PetSupplies,
    Miscellaneous,
}

impl Category {
    pub const ALL: [Category; 20] = [
        Category::Fruits,
        Category::Vegetables,
        Category::MeatPoultry,
        Category::Seafood,
        Category::DairyEggs,
        Category::BakeryBread,
        Category::PantryStaples,
        Category::SnacksCandy,
        Category::FrozenFoods,
        Category::Beverages,
        Category::DeliPrepared,
        Category::BreakfastCereal,
        Category::PastaRiceGrains,
        Category::OilsSaucesSpices,
        Category::BabyKids,
        Category::HealthNutrition,
        Category::HouseholdEssentials,
        Category::PersonalCare,
        Category::PetSupplies,
        Category::Miscellaneous,
    ];

    /// Display name as stored and shown to clients.
    pub fn name(self) -> &'static str {
        match self {
            Category::Fruits => "Fruits",
            Category::Vegetables => "Vegetables",
            Category::MeatPoultry => "Meat & Poultry",
            Category::Seafood => "Seafood",
            Category::DairyEggs => "Dairy & Eggs",
            Category::BakeryBread => "Bakery & Bread",
            Category::PantryStaples => "Pantry Staples",
            Category::SnacksCandy => "Snacks & Candy",
            Category::FrozenFoods => "Frozen Foods",
            Category::Beverages => "Beverages",
            Category::DeliPrepared => "Deli & Prepared Foods",
            Category::BreakfastCereal => "Breakfast & Cereal",
            Category::PastaRiceGrains => "Pasta, Rice & Grains",
            Category::OilsSaucesSpices => "Oils, Sauces & Spices",
            Category::BabyKids => "Baby & Kids",
            Category::HealthNutrition => "Health & Nutrition",
            Category::HouseholdEssentials => "Household Essentials",
            Category::PersonalCare => "Personal Care",
            Category::PetSupplies => "Pet Supplies",
            Category::Miscellaneous => "Miscellaneous",
        }
    }

    /// Exact-name lookup. The slash spellings of the two comma-named categories are
    /// accepted as aliases since clients sending lists cannot always quote commas.
    pub fn from_name(name: &str) -> Option<Category> {
        let name = name.trim();
        match name {
            "Pasta/Rice & Grains" => return Some(Category::PastaRiceGrains),
            "Oils/Sauces & Spices" => return Some(Category::OilsSaucesSpices),
            _ => {}
        }
        Category::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not one of the fixed categories")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::from_name(s).ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Built-in keyword phrases per category, in resolution priority order.
/// Order matters: on a score tie the earliest category in this table wins.
const BUILTIN_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Fruits,
        &[
            "apple", "banana", "orange", "grape", "berry", "berries", "strawberry",
            "strawberries", "blueberry", "blueberries", "raspberry", "raspberries",
            "cherries", "melon", "watermelon", "pear", "peach", "plum",
            "cherry", "mango", "pineapple", "kiwi", "lemon", "lime", "avocado",
        ],
    ),
    (
        Category::Vegetables,
        &[
            "lettuce", "tomato", "carrot", "broccoli", "bell pepper", "onion",
            "cucumber", "spinach", "celery", "potato", "cabbage", "kale", "zucchini",
            "mushroom", "garlic", "cauliflower", "green beans", "sweet potato",
        ],
    ),
    (
        Category::MeatPoultry,
        &[
            "beef", "chicken", "pork", "turkey", "lamb", "steak", "ground beef",
            "chicken breast", "bacon", "sausage", "ham", "veal", "chicken thighs",
        ],
    ),
    (
        Category::Seafood,
        &[
            "fish", "salmon", "tuna", "shrimp", "crab", "lobster", "tilapia", "cod",
            "seafood", "scallops", "clams", "mussels",
        ],
    ),
    (
        Category::DairyEggs,
        &[
            "milk", "cheese", "yogurt", "butter", "cream", "eggs", "dairy", "cheddar",
            "mozzarella", "parmesan", "sour cream", "cottage cheese", "greek yogurt",
            "half and half", "egg",
        ],
    ),
    (
        Category::BakeryBread,
        &[
            "bread", "bagel", "muffin", "cake", "pastry", "donut", "croissant",
            "baguette", "rolls", "tortillas", "pita", "sourdough", "whole wheat bread",
        ],
    ),
    (
        Category::PantryStaples,
        &[
            "flour", "sugar", "canned", "beans", "soup", "peanut butter", "honey",
            "jam", "broth", "baking soda", "baking powder", "canned tomatoes",
        ],
    ),
    (
        Category::SnacksCandy,
        &[
            "chips", "crackers", "candy", "chocolate", "pretzels", "popcorn", "nuts",
            "trail mix", "cookies", "gummies", "potato chips", "granola bar",
        ],
    ),
    (
        Category::FrozenFoods,
        &[
            "frozen", "ice cream", "frozen pizza", "frozen dinner", "popsicle",
            "frozen vegetables", "frozen fruit", "frozen waffles",
        ],
    ),
    (
        Category::Beverages,
        &[
            "juice", "soda", "water", "coffee", "tea", "energy drink", "sports drink",
            "lemonade", "iced tea", "sparkling water", "orange juice", "kombucha",
        ],
    ),
    (
        Category::DeliPrepared,
        &[
            "deli", "rotisserie", "sandwich", "salad", "prepared", "ready-to-eat",
            "cooked chicken", "hummus", "sliced turkey", "rotisserie chicken",
        ],
    ),
    (
        Category::BreakfastCereal,
        &[
            "cereal", "granola", "oatmeal", "oats", "cornflakes", "cheerios",
            "breakfast", "pancake mix", "waffle", "syrup", "maple syrup",
        ],
    ),
    (
        Category::PastaRiceGrains,
        &[
            "pasta", "rice", "spaghetti", "penne", "macaroni", "noodles", "quinoa",
            "couscous", "brown rice", "basmati", "lasagna", "barley",
        ],
    ),
    (
        Category::OilsSaucesSpices,
        &[
            "oil", "olive oil", "vinegar", "sauce", "ketchup", "mustard", "mayonnaise",
            "salsa", "soy sauce", "spice", "seasoning", "pepper flakes", "salt",
            "pasta sauce", "hot sauce", "cinnamon",
        ],
    ),
    (
        Category::BabyKids,
        &[
            "baby", "diaper", "diapers", "formula", "baby food", "wipes", "kids",
            "toddler", "infant formula", "baby wipes",
        ],
    ),
    (
        Category::HealthNutrition,
        &[
            "vitamin", "vitamins", "supplement", "protein", "protein bar",
            "protein powder", "nutrition", "multivitamin", "electrolyte",
        ],
    ),
    (
        Category::HouseholdEssentials,
        &[
            "detergent", "paper towel", "paper towels", "toilet paper", "cleaner",
            "trash bag", "trash bags", "aluminum foil", "dish soap", "sponge",
            "laundry detergent", "bleach",
        ],
    ),
    (
        Category::PersonalCare,
        &[
            "shampoo", "conditioner", "toothpaste", "deodorant", "lotion", "body wash",
            "skincare", "cosmetics", "bar soap", "toothbrush", "razor", "sunscreen",
        ],
    ),
    (
        Category::PetSupplies,
        &[
            "dog", "cat", "pet", "dog food", "cat food", "pet food", "pet treats",
            "cat litter", "litter", "dog treats",
        ],
    ),
];

/// A keyword phrase together with its word count, which is its score weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordPhrase {
    pub phrase: String,
    pub weight: u32,
}

impl KeywordPhrase {
    pub fn new(phrase: &str) -> Self {
        let phrase = phrase.trim().to_lowercase();
        let weight = phrase.split_whitespace().count() as u32;
        Self { phrase, weight }
    }
}

/// Immutable category → keyword table. Built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    entries: Vec<(Category, Vec<KeywordPhrase>)>,
}

impl CategoryTable {
    pub fn builtin() -> Self {
        Self::from_entries(BUILTIN_KEYWORDS.iter().map(|(category, phrases)| {
            (*category, phrases.iter().map(|p| KeywordPhrase::new(p)).collect())
        }))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (Category, Vec<KeywordPhrase>)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn entries(&self) -> &[(Category, Vec<KeywordPhrase>)] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_category_error_names_input() {
        let err = "Pet Rocks".parse::<Category>().unwrap_err();
        assert_eq!(err, UnknownCategory("Pet Rocks".to_string()));
        assert_eq!(
            err.to_string(),
            "'Pet Rocks' is not one of the fixed categories"
        );
    }

    #[test]
    fn test_all_categories_round_trip_through_name() {
        for category in Category::ALL {
            assert_eq!(Category::from_name(category.name()), Some(category));
        }
    }

    #[test]
    fn test_slash_aliases_accepted() {
        assert_eq!(
            Category::from_name("Pasta/Rice & Grains"),
            Some(Category::PastaRiceGrains)
        );
        assert_eq!(
            Category::from_name("Oils/Sauces & Spices"),
            Some(Category::OilsSaucesSpices)
        );
    }

    #[test]
    fn test_unknown_category_rejected() {
        assert!("Alcoholic Beverages".parse::<Category>().is_err());
        assert!(Category::from_name("fruits").is_none());
    }

    #[test]
    fn test_category_serializes_as_display_name() {
        let json = serde_json::to_string(&Category::DairyEggs).unwrap();
        assert_eq!(json, r#""Dairy & Eggs""#);
        let back: Category = serde_json::from_str(r#""Breakfast & Cereal""#).unwrap();
        assert_eq!(back, Category::BreakfastCereal);
    }

    #[test]
    fn test_builtin_table_excludes_miscellaneous() {
        let table = CategoryTable::builtin();
        assert_eq!(table.entries().len(), 19);
        assert!(table
            .entries()
            .iter()
            .all(|(c, _)| *c != Category::Miscellaneous));
    }

    #[test]
    fn test_keyword_phrase_weight_is_word_count() {
        assert_eq!(KeywordPhrase::new("ground beef").weight, 2);
        assert_eq!(KeywordPhrase::new("Milk").phrase, "milk");
        assert_eq!(KeywordPhrase::new("half and half").weight, 3);
    }
}
