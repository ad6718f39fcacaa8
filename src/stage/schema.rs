use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::config::{FeedSchema, BOROUGH_NORM};

/// A feed's declared columns checked against the headers it actually has.
/// Resolved once before staging; everything downstream reads presence
/// from here instead of probing the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchema {
    pub feed: String,
    pub present: BTreeSet<String>,
    pub missing: BTreeSet<String>,
}

impl ResolvedSchema {
    pub fn resolve(schema: &FeedSchema, expected: &BTreeSet<String>, headers: &[String]) -> Self {
        let header_set: BTreeSet<&str> = headers.iter().map(String::as_str).collect();
        let (mut present, missing): (BTreeSet<String>, BTreeSet<String>) = expected
            .iter()
            .cloned()
            .partition(|c| header_set.contains(c.as_str()));

        if let Some(b) = &schema.borough_column {
            if present.contains(b) {
                present.insert(BOROUGH_NORM.to_string());
            }
        }

        Self {
            feed: schema.name.clone(),
            present,
            missing,
        }
    }

    pub fn has(&self, column: &str) -> bool {
        self.present.contains(column)
    }

    pub fn log(&self) {
        if self.missing.is_empty() {
            info!(feed = %self.feed, columns = self.present.len(), "schema resolved");
        } else {
            warn!(
                feed = %self.feed,
                missing = ?self.missing,
                "declared columns absent; dependent outputs will be omitted or null"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EtlConfig;

    #[test]
    fn splits_present_and_missing() {
        let cfg = EtlConfig::default();
        let ems = cfg.feed("ems").unwrap();
        let expected = cfg.expected_columns(ems);
        let headers: Vec<String> = ["CAD_INCIDENT_ID", "INCIDENT_DATETIME", "BOROUGH", "ZIPCODE"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let r = ResolvedSchema::resolve(ems, &expected, &headers);
        assert!(r.has("ZIPCODE"));
        assert!(r.has(BOROUGH_NORM));
        assert!(!r.has("FINAL_CALL_TYPE"));
        assert!(r.missing.contains("FINAL_CALL_TYPE"));
        assert!(r.present.is_disjoint(&r.missing));
    }

    #[test]
    fn no_borough_norm_without_borough() {
        let cfg = EtlConfig::default();
        let fire = cfg.feed("fire").unwrap();
        let expected = cfg.expected_columns(fire);
        let r = ResolvedSchema::resolve(fire, &expected, &["ZIPCODE".to_string()]);
        assert!(!r.has(BOROUGH_NORM));
    }
}
