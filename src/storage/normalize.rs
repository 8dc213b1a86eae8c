//! Write-time normalization of slugs and release years
//!
//! Upstream data is loose: slugs arrive padded or upper-cased, occasionally as a
//! one-element list, and years arrive as numbers or numeric strings. Everything
//! is coerced here before it reaches the database.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;

/// Normalizes a slug (trimmed, lowercased)
///
/// Returns None if nothing is left after trimming.
pub fn normalize_slug(raw: &str) -> Option<String> {
    let slug = raw.trim().to_lowercase();
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}

/// A slug as it may appear upstream or in legacy rows: a scalar or a list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SlugField {
    Single(String),
    List(Vec<String>),
}

impl SlugField {
    /// Resolves to a normalized slug
    ///
    /// The list form resolves to its first element. An empty list, or an element
    /// that is blank, yields None.
    pub fn resolve(&self) -> Option<String> {
        match self {
            Self::Single(slug) => normalize_slug(slug),
            Self::List(slugs) => slugs.first().and_then(|slug| normalize_slug(slug)),
        }
    }

    /// Decodes a slug column value
    ///
    /// Older rows may hold a JSON-encoded list instead of a plain slug.
    pub fn from_stored(raw: &str) -> Self {
        if raw.trim_start().starts_with('[') {
            if let Ok(slugs) = serde_json::from_str::<Vec<String>>(raw) {
                return Self::List(slugs);
            }
        }
        Self::Single(raw.to_string())
    }
}

impl fmt::Display for SlugField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(slug) => f.write_str(slug),
            Self::List(slugs) => write!(f, "{:?}", slugs),
        }
    }
}

/// Parses a release year from text
///
/// Non-numeric input is treated as absent.
pub fn parse_year(raw: &str) -> Option<i32> {
    raw.trim().parse::<i32>().ok()
}

/// Coerces a JSON value into a release year
pub fn coerce_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|year| year.fract() == 0.0)
                    .map(|year| year as i64)
            })
            .and_then(|year| i32::try_from(year).ok()),
        Value::String(text) => parse_year(text),
        _ => None,
    }
}

/// Serde adapter for year fields that may be numbers, strings or garbage
pub fn deserialize_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_slug() {
        assert_eq!(normalize_slug("  Foo-Bar "), Some("foo-bar".to_string()));
        assert_eq!(normalize_slug("foo-bar"), Some("foo-bar".to_string()));
        assert_eq!(normalize_slug("   "), None);
        assert_eq!(normalize_slug(""), None);
    }

    #[test]
    fn test_slug_field_list_resolves_to_first() {
        let slug: SlugField = serde_json::from_value(json!(["foo-bar", "other"])).unwrap();
        assert_eq!(slug.resolve(), Some("foo-bar".to_string()));
    }

    #[test]
    fn test_slug_field_invalid_forms() {
        let empty: SlugField = serde_json::from_value(json!([])).unwrap();
        assert_eq!(empty.resolve(), None);

        let blank = SlugField::List(vec![" ".to_string()]);
        assert_eq!(blank.resolve(), None);
    }

    #[test]
    fn test_slug_field_from_stored() {
        assert_eq!(
            SlugField::from_stored("plain-slug"),
            SlugField::Single("plain-slug".to_string())
        );
        assert_eq!(
            SlugField::from_stored(r#"["foo-bar"]"#),
            SlugField::List(vec!["foo-bar".to_string()])
        );
        // Not valid JSON, kept verbatim
        assert_eq!(
            SlugField::from_stored("[broken"),
            SlugField::Single("[broken".to_string())
        );
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2021"), Some(2021));
        assert_eq!(parse_year(" 2021 "), Some(2021));
        assert_eq!(parse_year("abc"), None);
        assert_eq!(parse_year(""), None);
    }

    #[test]
    fn test_coerce_year() {
        assert_eq!(coerce_year(&json!(2021)), Some(2021));
        assert_eq!(coerce_year(&json!("2021")), Some(2021));
        assert_eq!(coerce_year(&json!(2021.0)), Some(2021));
        assert_eq!(coerce_year(&json!(2021.5)), None);
        assert_eq!(coerce_year(&json!("abc")), None);
        assert_eq!(coerce_year(&json!(null)), None);
        assert_eq!(coerce_year(&json!([2021])), None);
    }

    #[test]
    fn test_deserialize_year_adapter() {
        #[derive(Deserialize)]
        struct Item {
            #[serde(default, deserialize_with = "deserialize_year")]
            year: Option<i32>,
        }

        let numeric: Item = serde_json::from_value(json!({"year": "2021"})).unwrap();
        assert_eq!(numeric.year, Some(2021));

        let garbage: Item = serde_json::from_value(json!({"year": "abc"})).unwrap();
        assert_eq!(garbage.year, None);

        let missing: Item = serde_json::from_value(json!({})).unwrap();
        assert_eq!(missing.year, None);
    }
}
