//! Pipeline identity shared by the scheduler, run ledger and API
use serde::Serialize;
use std::fmt;

/// One of the independently scheduled crawl pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pipeline {
    /// Walks every upstream listing page and upserts the catalog
    Listing,

    /// Fetches detail pages for catalog titles that lack one
    Detail,
}

impl Pipeline {
    /// All pipelines, in scheduling order
    pub const ALL: [Pipeline; 2] = [Pipeline::Listing, Pipeline::Detail];

    /// Converts the pipeline to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Detail => "detail",
        }
    }

    /// Parses a pipeline from its database string representation
    ///
    /// Returns None if the string doesn't match any known pipeline.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "listing" => Some(Self::Listing),
            "detail" => Some(Self::Detail),
            _ => None,
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_string_roundtrip() {
        for pipeline in Pipeline::ALL {
            assert_eq!(
                Pipeline::from_db_string(pipeline.to_db_string()),
                Some(pipeline)
            );
        }
    }

    #[test]
    fn test_unknown_db_string() {
        assert_eq!(Pipeline::from_db_string("episodes"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Pipeline::Listing.to_string(), "listing");
        assert_eq!(Pipeline::Detail.to_string(), "detail");
    }
}
