//! Chapter (country/festival) data used for the chapter summary.

use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{FieldValue, SummaryConfig};
use crate::models::record::lookup;

/// An active chapter with its resolved reporting region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub slug: String,
    pub name: String,
    pub region: String,
}

impl Chapter {
    /// Parse a chapter from the `/chapter` listing.
    pub fn from_value(value: &Value, language: &str, summary: &SummaryConfig) -> Result<Self> {
        let slug = lookup(value, "slug")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::api("chapter", "missing slug"))?
            .to_string();

        let name = match lookup(value, "name").map(|v| FieldValue::from_json(v, language)) {
            Some(FieldValue::Text(name)) => name,
            _ => slug.clone(),
        };
        let region = summary.region_for(&name);

        Ok(Self { slug, name, region })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_localized_name() {
        let value = json!({"slug": "xYz", "name": {"en_GB": "Costa Rica"}});
        let chapter = Chapter::from_value(&value, "en_GB", &SummaryConfig::default()).unwrap();
        assert_eq!(chapter.slug, "xYz");
        assert_eq!(chapter.name, "Costa Rica");
        assert_eq!(chapter.region, "AMR");
    }

    #[test]
    fn test_from_value_missing_name_falls_back_to_slug() {
        let value = json!({"slug": "abc"});
        let chapter = Chapter::from_value(&value, "en_GB", &SummaryConfig::default()).unwrap();
        assert_eq!(chapter.name, "abc");
        assert_eq!(chapter.region, "EMEA");
    }

    #[test]
    fn test_from_value_missing_slug() {
        let value = json!({"name": {"en_GB": "Japan"}});
        assert!(Chapter::from_value(&value, "en_GB", &SummaryConfig::default()).is_err());
    }
}
