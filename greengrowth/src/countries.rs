//! Best-effort normalization of raw jurisdiction codes to ISO 3166 alpha-3.
//!
//! The lookup is a chain: a hand-curated override table first (historical,
//! defunct and variant codes seen in the raw data, including deliberate
//! null-outs for known-garbage values), then an extras table for entities the
//! standard registry no longer carries, then the registry itself. First hit
//! wins; a code no stage knows is reported as unmapped, never as an error.

use std::collections::HashMap;

use log::info;
use polars::prelude::*;

use crate::COL;

/// Raw-code fixes applied before the registry lookup. `None` marks values
/// known to be garbage in the source data.
const RAW_OVERRIDES: &[(&str, Option<&str>)] = &[
    ("AN", Some("AN")),
    ("CS", Some("RS")),
    ("YU", Some("RS")),
    ("SU", Some("RU")),
    ("DD", Some("DE")),
    ("DDR", Some("DE")),
    ("UK", Some("GB")),
    ("USA", Some("US")),
    ("JPX", Some("JP")),
    ("JPx", Some("JP")),
    ("JPS", Some("JP")),
    ("JPC", Some("JP")),
    ("JPK", Some("JP")),
    ("FRx", Some("FR")),
    ("FRX", Some("FR")),
    ("GB1", Some("GB")),
    ("GB2", Some("GB")),
    ("GB3", Some("GB")),
    ("GB4", Some("GB")),
    ("DE1", Some("DE")),
    ("DE2", Some("DE")),
    ("HKX", Some("HK")),
    ("KRX", Some("KR")),
    ("CNX", Some("CN")),
    ("TWX", Some("TW")),
    ("ITX", Some("IT")),
    ("PLX", Some("PL")),
    ("SEx", Some("SE")),
    ("SEX", Some("SE")),
    ("INX", Some("IN")),
    ("CHX", Some("CH")),
    ("NLX", Some("NL")),
    ("MAX", Some("MX")),
    ("MXX", Some("MX")),
    ("MXC", Some("MX")),
    ("BRX", Some("BR")),
    ("BGX", Some("BG")),
    ("ARX", Some("AR")),
    ("ATX", Some("AT")),
    ("AUX", Some("AU")),
    ("ZAX", Some("ZA")),
    ("NZK", Some("NZ")),
    ("NZX", Some("NZ")),
    ("ISX", Some("IS")),
    ("NOX", Some("NO")),
    ("DKX", Some("DK")),
    ("SUX", Some("RU")),
    ("RUX", Some("RU")),
    ("unknown", None),
    ("s", None),
    ("XH", None),
    ("OE", None),
    ("CT", None),
];

/// Alpha-2 to alpha-3 entries for historical and non-ISO entities the
/// standard registry does not carry. Checked before the registry, so these
/// take precedence.
const REGISTRY_EXTRAS: &[(&str, &str)] = &[
    ("XK", "XKX"),
    ("AN", "ANT"),
    ("SU", "SUN"),
    ("YU", "YUG"),
    ("DD", "DDR"),
    ("CS", "SCG"),
];

/// Distinct-code mapping coverage, reported once per normalization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingCoverage {
    pub mapped: usize,
    pub unmapped: usize,
}

pub struct CountryCodeNormalizer {
    overrides: HashMap<&'static str, Option<&'static str>>,
    registry_extras: HashMap<&'static str, &'static str>,
}

impl Default for CountryCodeNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl CountryCodeNormalizer {
    pub fn new() -> Self {
        Self {
            overrides: RAW_OVERRIDES.iter().copied().collect(),
            registry_extras: REGISTRY_EXTRAS.iter().copied().collect(),
        }
    }

    /// Map a raw jurisdiction code to an alpha-3 code, or `None` when no
    /// stage of the chain knows it.
    pub fn normalize(&self, code: &str) -> Option<&'static str> {
        let cleaned: &str = match self.overrides.get(code) {
            Some(None) => return None,
            Some(Some(fixed)) => fixed,
            None => code,
        };
        if let Some(alpha3) = self.registry_extras.get(cleaned).copied() {
            return Some(alpha3);
        }
        rust_iso3166::from_alpha2(cleaned).map(|country| country.alpha3)
    }

    /// Attach a `country` column to the panel by mapping its distinct raw
    /// codes once and joining the mapping back on. Unmapped codes produce a
    /// null `country` and are only reported in aggregate.
    pub fn normalize_panel(
        &self,
        panel: &DataFrame,
    ) -> PolarsResult<(DataFrame, MappingCoverage)> {
        let distinct = panel.column(COL::RAW_COUNTRY)?.str()?.unique()?;
        let mut raw_codes: Vec<&str> = Vec::with_capacity(distinct.len());
        let mut alpha3: Vec<Option<&str>> = Vec::with_capacity(distinct.len());
        let mut coverage = MappingCoverage::default();
        for code in distinct.into_no_null_iter() {
            let mapped = self.normalize(code);
            match mapped {
                Some(_) => coverage.mapped += 1,
                None => coverage.unmapped += 1,
            }
            raw_codes.push(code);
            alpha3.push(mapped);
        }
        info!(
            "country mapping: {} distinct codes mapped, {} unmapped",
            coverage.mapped, coverage.unmapped
        );

        let mapping = df!(
            COL::RAW_COUNTRY => raw_codes,
            COL::COUNTRY => alpha3,
        )?;
        let normalized = panel
            .clone()
            .lazy()
            .join(
                mapping.lazy(),
                [col(COL::RAW_COUNTRY)],
                [col(COL::RAW_COUNTRY)],
                JoinArgs::new(JoinType::Left),
            )
            .collect()?;
        Ok((normalized, coverage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_pass_through() {
        let normalizer = CountryCodeNormalizer::new();
        assert_eq!(normalizer.normalize("US"), Some("USA"));
        assert_eq!(normalizer.normalize("DE"), Some("DEU"));
        assert_eq!(normalizer.normalize("JP"), Some("JPN"));
    }

    #[test]
    fn test_override_precedes_registry() {
        let normalizer = CountryCodeNormalizer::new();
        // "USA" is itself an override key; the override wins over any
        // pass-through interpretation.
        assert_eq!(normalizer.normalize("USA"), Some("USA"));
        assert_eq!(normalizer.normalize("UK"), Some("GBR"));
        // Soviet-era codes are redirected before the registry is consulted
        assert_eq!(normalizer.normalize("SU"), Some("RUS"));
        assert_eq!(normalizer.normalize("YU"), Some("SRB"));
        assert_eq!(normalizer.normalize("DDR"), Some("DEU"));
    }

    #[test]
    fn test_registry_extras() {
        let normalizer = CountryCodeNormalizer::new();
        assert_eq!(normalizer.normalize("XK"), Some("XKX"));
        // AN survives its identity override and resolves via the extras
        assert_eq!(normalizer.normalize("AN"), Some("ANT"));
    }

    #[test]
    fn test_null_outs_and_unknowns() {
        let normalizer = CountryCodeNormalizer::new();
        assert_eq!(normalizer.normalize("unknown"), None);
        assert_eq!(normalizer.normalize("XH"), None);
        assert_eq!(normalizer.normalize("ZZ"), None);
        assert_eq!(normalizer.normalize(""), None);
    }

    #[test]
    fn test_normalize_panel() {
        let panel = df!(
            COL::RAW_COUNTRY => &["US", "UK", "XX", "US"],
            COL::YEAR => &[2006i32, 2006, 2006, 2007],
            COL::IS_GREEN => &[true, false, true, false],
            COL::PATENT_COUNT => &[1i64, 2, 3, 4],
        )
        .unwrap();
        let (normalized, coverage) = CountryCodeNormalizer::new()
            .normalize_panel(&panel)
            .unwrap();
        assert_eq!(coverage, MappingCoverage { mapped: 2, unmapped: 1 });
        assert_eq!(normalized.height(), 4);
        let countries = normalized.column(COL::COUNTRY).unwrap().str().unwrap();
        let mapped: Vec<Option<&str>> = countries.into_iter().collect();
        assert_eq!(mapped, vec![Some("USA"), Some("GBR"), None, Some("USA")]);
    }
}
