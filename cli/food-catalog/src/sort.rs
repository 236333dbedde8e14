//! User facing orderings of a result list.
//!
//! Sorting never touches stored results; [`sort_products`] returns a new,
//! reordered copy. All orderings are stable, so products that compare equal
//! keep their fetch order.

use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{NutritionGrade, Product};

/// How the visible result list is ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SortKey {
    /// The order in which pages arrived from the catalog.
    #[default]
    Server,
    NameAsc,
    NameDesc,
    NutritionAsc,
    NutritionDesc,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error(
    "unknown sort key '{0}', expected one of: name-asc, name-desc, nutrition-asc, nutrition-desc"
)]
pub struct UnknownSortKey(String);

impl SortKey {
    pub const ALL: [SortKey; 5] = [
        SortKey::Server,
        SortKey::NameAsc,
        SortKey::NameDesc,
        SortKey::NutritionAsc,
        SortKey::NutritionDesc,
    ];

    /// The wire form; the server order is the empty string.
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Server => "",
            SortKey::NameAsc => "name-asc",
            SortKey::NameDesc => "name-desc",
            SortKey::NutritionAsc => "nutrition-asc",
            SortKey::NutritionDesc => "nutrition-desc",
        }
    }
}

impl FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        SortKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| UnknownSortKey(s.to_string()))
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for SortKey {
    type Error = UnknownSortKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SortKey> for String {
    fn from(key: SortKey) -> Self {
        key.as_str().to_string()
    }
}

/// A reordered copy of `products`.
pub fn sort_products(products: &[Product], key: SortKey) -> Vec<Product> {
    let mut sorted = products.to_vec();
    match key {
        SortKey::Server => {},
        SortKey::NameAsc => sorted.sort_by(|a, b| compare_names(a, b)),
        SortKey::NameDesc => sorted.sort_by(|a, b| compare_names(b, a)),
        SortKey::NutritionAsc => {
            sorted.sort_by_key(|product| grade_rank_ascending(product.nutrition_grade))
        },
        SortKey::NutritionDesc => {
            sorted.sort_by_key(|product| grade_rank_descending(product.nutrition_grade))
        },
    }
    sorted
}

/// Case-insensitive with byte order as tie-break; a missing name is empty.
fn compare_names(a: &Product, b: &Product) -> Ordering {
    let a = a.name.as_deref().unwrap_or_default();
    let b = b.name.as_deref().unwrap_or_default();
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// A first, unrated products after E.
fn grade_rank_ascending(grade: Option<NutritionGrade>) -> u8 {
    match grade {
        Some(NutritionGrade::A) => 0,
        Some(NutritionGrade::B) => 1,
        Some(NutritionGrade::C) => 2,
        Some(NutritionGrade::D) => 3,
        Some(NutritionGrade::E) => 4,
        None => 5,
    }
}

/// Unrated products first, then E down to A.
fn grade_rank_descending(grade: Option<NutritionGrade>) -> u8 {
    match grade {
        None => 0,
        Some(NutritionGrade::E) => 1,
        Some(NutritionGrade::D) => 2,
        Some(NutritionGrade::C) => 3,
        Some(NutritionGrade::B) => 4,
        Some(NutritionGrade::A) => 5,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    fn product(code: &str, name: Option<&str>, grade: Option<NutritionGrade>) -> Product {
        Product {
            code: code.to_string(),
            name: name.map(str::to_string),
            nutrition_grade: grade,
            ..Default::default()
        }
    }

    fn codes(products: &[Product]) -> Vec<&str> {
        products.iter().map(|p| p.code.as_str()).collect()
    }

    #[test]
    fn missing_grade_placement_differs_by_direction() {
        let products = vec![
            product("banana", Some("Banana"), Some(NutritionGrade::B)),
            product("apple", Some("Apple"), None),
        ];

        assert_eq!(
            codes(&sort_products(&products, SortKey::NutritionAsc)),
            vec!["banana", "apple"]
        );
        assert_eq!(
            codes(&sort_products(&products, SortKey::NutritionDesc)),
            vec!["apple", "banana"]
        );
    }

    #[test]
    fn nutrition_orderings() {
        let products = vec![
            product("c", None, Some(NutritionGrade::C)),
            product("none", None, None),
            product("a", None, Some(NutritionGrade::A)),
            product("e", None, Some(NutritionGrade::E)),
        ];

        assert_eq!(
            codes(&sort_products(&products, SortKey::NutritionAsc)),
            vec!["a", "c", "e", "none"]
        );
        assert_eq!(
            codes(&sort_products(&products, SortKey::NutritionDesc)),
            vec!["none", "e", "c", "a"]
        );
    }

    #[test]
    fn name_orderings_ignore_case() {
        let products = vec![
            product("1", Some("banana"), None),
            product("2", Some("Cherry"), None),
            product("3", None, None),
            product("4", Some("apple"), None),
        ];

        assert_eq!(
            codes(&sort_products(&products, SortKey::NameAsc)),
            vec!["3", "4", "1", "2"]
        );
        assert_eq!(
            codes(&sort_products(&products, SortKey::NameDesc)),
            vec!["2", "1", "4", "3"]
        );
    }

    #[test]
    fn equal_keys_keep_fetch_order() {
        let products = vec![
            product("first", Some("Tea"), Some(NutritionGrade::B)),
            product("second", Some("Tea"), Some(NutritionGrade::B)),
        ];
        for key in SortKey::ALL {
            assert_eq!(codes(&sort_products(&products, key)), vec![
                "first", "second"
            ]);
        }
    }

    #[test]
    fn parses_wire_names() {
        for key in SortKey::ALL {
            assert_eq!(key.as_str().parse(), Ok(key));
        }
        assert_eq!("".parse(), Ok(SortKey::Server));
        assert!("price-asc".parse::<SortKey>().is_err());
        assert_eq!(
            serde_json::to_value(SortKey::NutritionDesc).unwrap(),
            serde_json::json!("nutrition-desc")
        );
    }

    fn arb_product() -> impl Strategy<Value = Product> {
        (
            "[0-9]{1,4}",
            proptest::option::of("[A-Za-z ]{0,6}"),
            proptest::option::of(0..5u8),
        )
            .prop_map(|(code, name, grade)| {
                let grade = grade.map(|g| match g {
                    0 => NutritionGrade::A,
                    1 => NutritionGrade::B,
                    2 => NutritionGrade::C,
                    3 => NutritionGrade::D,
                    _ => NutritionGrade::E,
                });
                product(&code, name.as_deref(), grade)
            })
    }

    proptest! {
        #[test]
        fn sorting_never_changes_the_input(
            products in proptest::collection::vec(arb_product(), 0..12),
            key_index in 0..SortKey::ALL.len(),
        ) {
            let original = products.clone();
            let sorted = sort_products(&products, SortKey::ALL[key_index]);

            prop_assert_eq!(&products, &original);
            prop_assert_eq!(sorted.len(), original.len());
            prop_assert_eq!(sort_products(&products, SortKey::Server), original);
        }
    }
}
