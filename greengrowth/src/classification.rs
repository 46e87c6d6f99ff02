//! The set of qualifying ("green") classification codes, loaded once and used
//! as an exact-match membership predicate during aggregation.

use std::collections::HashSet;
use std::path::Path;

use itertools::Itertools;
use log::info;
use polars::prelude::*;

use crate::error::GreengrowthError;

/// Some exports of the code list carry their header as a data row.
const HEADER_SENTINEL: &str = "IPC_Codes";

#[derive(Debug, Clone)]
pub struct ClassificationSet {
    codes: HashSet<String>,
}

impl ClassificationSet {
    /// Load the code list from a headerless one-column CSV. Entries are
    /// whitespace-trimmed; empty entries and the header sentinel are dropped.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self, GreengrowthError> {
        let path = path.as_ref();
        let df = LazyCsvReader::new(path)
            .with_has_header(false)
            // Codes are opaque strings, never numbers
            .with_infer_schema_length(Some(0))
            .finish()
            .and_then(|lf| lf.collect())
            .map_err(|e| GreengrowthError::DataSource(format!("{}: {e}", path.display())))?;
        let column = df
            .get_columns()
            .first()
            .ok_or_else(|| GreengrowthError::DataSource(format!("{}: no columns", path.display())))?;
        let values = column
            .str()
            .map_err(|e| GreengrowthError::DataSource(format!("{}: {e}", path.display())))?;
        let set = Self::from_codes(values.into_iter().flatten())?;
        info!("loaded {} classification codes from {}", set.len(), path.display());
        Ok(set)
    }

    /// Build a set from raw entries, applying the same cleaning as `from_csv`.
    pub fn from_codes<I, S>(codes: I) -> Result<Self, GreengrowthError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let codes: HashSet<String> = codes
            .into_iter()
            .map(|code| code.as_ref().trim().to_string())
            .filter(|code| !code.is_empty() && code != HEADER_SENTINEL)
            .collect();
        if codes.is_empty() {
            return Err(GreengrowthError::DataSource(
                "classification list is empty".to_string(),
            ));
        }
        Ok(Self { codes })
    }

    /// Exact-match membership; no case or separator normalization is applied.
    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// The set as a sorted series, suitable for `is_in` expressions.
    pub fn to_series(&self) -> Series {
        let codes = self.codes.iter().map(String::as_str).sorted().collect_vec();
        Series::new("green_codes", codes)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_cleans_entries_and_header_sentinel() {
        let set =
            ClassificationSet::from_codes(["  A01B3/00 ", "IPC_Codes", "", "B01D53/14"]).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("A01B3/00"));
        assert!(set.contains("B01D53/14"));
        assert!(!set.contains("IPC_Codes"));
    }

    #[test]
    fn test_membership_is_exact() {
        let set = ClassificationSet::from_codes(["A01B3/00"]).unwrap();
        assert!(!set.contains("a01b3/00"));
        assert!(!set.contains("A01B3-00"));
    }

    #[test]
    fn test_empty_source_fails() {
        let result = ClassificationSet::from_codes(Vec::<String>::new());
        assert!(matches!(result, Err(GreengrowthError::DataSource(_))));
        let all_sentinel = ClassificationSet::from_codes(["IPC_Codes", "  "]);
        assert!(matches!(all_sentinel, Err(GreengrowthError::DataSource(_))));
    }

    #[test]
    fn test_from_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "IPC_Codes").unwrap();
        writeln!(file, "A01B3/00").unwrap();
        writeln!(file, "Y02E10/50").unwrap();
        let set = ClassificationSet::from_csv(file.path()).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("Y02E10/50"));
    }

    #[test]
    fn test_missing_file_fails() {
        let result = ClassificationSet::from_csv("does/not/exist.csv");
        assert!(matches!(result, Err(GreengrowthError::DataSource(_))));
    }

    #[test]
    fn test_to_series_is_sorted() {
        let set = ClassificationSet::from_codes(["B01", "A01"]).unwrap();
        let series = set.to_series();
        assert_eq!(series.len(), 2);
        assert_eq!(series.str().unwrap().get(0), Some("A01"));
    }
}
