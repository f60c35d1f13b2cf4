//! Static Power-5 conference table, loaded once at startup.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use super::models::AffiliationRecord;

/// Label for teams absent from the reference table.
pub const NON_P5: &str = "Non-P5";

/// School → conference lookup.
#[derive(Debug, Clone, Default)]
pub struct AffiliationTable {
    by_school: HashMap<String, String>,
}

impl AffiliationTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open affiliation table {}", path.display()))?;
        let table = Self::from_reader(file)
            .with_context(|| format!("Failed to parse affiliation table {}", path.display()))?;
        info!("Loaded {} schools from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn from_reader<R: Read>(rdr: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(rdr);
        let mut records = Vec::new();
        for result in reader.deserialize::<AffiliationRecord>() {
            records.push(result?);
        }
        Ok(Self::from_records(records))
    }

    /// Build from records. The first row for a school wins, so a duplicated
    /// school never duplicates its games downstream.
    pub fn from_records(records: impl IntoIterator<Item = AffiliationRecord>) -> Self {
        let mut by_school = HashMap::new();
        for rec in records {
            if by_school.contains_key(&rec.school) {
                warn!("Duplicate affiliation row for '{}' ignored", rec.school);
                continue;
            }
            by_school.insert(rec.school, rec.conference);
        }
        AffiliationTable { by_school }
    }

    pub fn contains(&self, school: &str) -> bool {
        self.by_school.contains_key(school)
    }

    pub fn conference_of(&self, school: &str) -> Option<&str> {
        self.by_school.get(school).map(String::as_str)
    }

    /// Conference label for display, falling back to [`NON_P5`].
    pub fn conference_label(&self, school: &str) -> String {
        self.conference_of(school).unwrap_or(NON_P5).to_string()
    }

    pub fn len(&self) -> usize {
        self.by_school.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_school.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "School,Conference,Mascot\n\
                          Ohio State,Big Ten,Buckeyes\n\
                          Michigan,Big Ten,Wolverines\n\
                          Ole Miss,SEC,Rebels\n";

    #[test]
    fn test_from_reader_ignores_extra_columns() {
        let table = AffiliationTable::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.conference_of("Ole Miss"), Some("SEC"));
    }

    #[test]
    fn test_unknown_school_is_non_p5() {
        let table = AffiliationTable::from_reader(SAMPLE.as_bytes()).unwrap();
        assert!(!table.contains("Tiny College"));
        assert_eq!(table.conference_label("Tiny College"), "Non-P5");
        assert_eq!(table.conference_label("Michigan"), "Big Ten");
    }

    #[test]
    fn test_missing_conference_column_is_error() {
        let bad = "School,Mascot\nOhio State,Buckeyes\n";
        assert!(AffiliationTable::from_reader(bad.as_bytes()).is_err());
    }

    #[test]
    fn test_first_duplicate_wins() {
        let table = AffiliationTable::from_records(vec![
            AffiliationRecord { school: "Utah".into(), conference: "Pac-12".into() },
            AffiliationRecord { school: "Utah".into(), conference: "Big 12".into() },
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.conference_of("Utah"), Some("Pac-12"));
    }

    #[test]
    fn test_load_missing_file_is_error() {
        assert!(AffiliationTable::load("/nonexistent/p5.csv").is_err());
    }
}
